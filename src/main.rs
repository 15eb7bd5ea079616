use std::process::ExitCode;

use apnsd::cli::{self, CliApp};

#[tokio::main]
async fn main() -> ExitCode {
    match CliApp::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", cli::error_message(&e));
            ExitCode::from(cli::exit_code(&e))
        }
    }
}
