use crate::errors::{AppError, AppResult, ErrorContextExt};
use crate::gateway::Endpoint;
use directories::BaseDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::error;

// Re-export shared types for convenience
pub use crate::shared::config::{Config, DaemonConfig, GatewayConfig, TlsFilesConfig};

/// Configuration manager for the apnsd service
///
/// Loads the TOML settings file consumed at daemon start. The daemon refuses
/// to run without a complete settings file: a missing file is recreated with
/// defaults and reported as fatal so the operator can fill it in.
///
/// # Example
///
/// ```rust,no_run
/// use apnsd::config::ConfigManager;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = ConfigManager::load(None)?;
///     manager.validate_files()?;
///     println!("Gateway: {}", manager.gateway_endpoint());
///     Ok(())
/// }
/// ```
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the settings file for the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConfigNotFound`] after writing a default file when
    /// none exists, and a parsing error when the file is incomplete.
    pub fn load(config_path: Option<PathBuf>) -> AppResult<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::write_default(&config_path)?;
            error!("Missing settings. Settings file recreated.");
            return Err(AppError::ConfigNotFound { path: config_path });
        }

        let config = Self::read(&config_path)?;
        Ok(ConfigManager {
            config_path,
            config,
        })
    }

    /// Load the settings file if present, otherwise fall back to defaults
    /// without touching the filesystem. Producers use this to find the
    /// daemon socket.
    pub fn load_or_default(config_path: Option<PathBuf>) -> AppResult<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        let config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            Config::default()
        };

        Ok(ConfigManager {
            config_path,
            config,
        })
    }

    /// Defaults only, never reading `config_path`. Used by `init`, which
    /// must work over an unparsable file.
    pub fn defaults(config_path: Option<PathBuf>) -> AppResult<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };
        Ok(ConfigManager {
            config_path,
            config: Config::default(),
        })
    }

    /// Write a default settings file, refusing to clobber an existing one
    /// unless `force` is set.
    pub fn init(config_path: Option<PathBuf>, force: bool) -> AppResult<PathBuf> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(AppError::config(format!(
                "Settings file already exists at {} (use --force to overwrite)",
                config_path.display()
            )));
        }

        Self::write_default(&config_path)?;
        Ok(config_path)
    }

    /// `<config dir>/apnsd/apnsd.toml`
    pub fn default_config_path() -> AppResult<PathBuf> {
        let base_dirs =
            BaseDirs::new().ok_or_else(|| AppError::config("Failed to get base directories"))?;
        Ok(base_dirs.config_dir().join("apnsd").join("apnsd.toml"))
    }

    fn read(path: &Path) -> AppResult<Config> {
        let content = fs::read_to_string(path).in_file_operation(path, "read settings file")?;
        let config: Config = toml::from_str(&content)?;

        if config.gateway.dispatch_interval_ms == 0 {
            let err = AppError::config(format!(
                "gateway.dispatch_interval_ms must be greater than zero in {}",
                path.display()
            ));
            error!("{}", err);
            return Err(err);
        }
        Ok(config)
    }

    fn write_default(path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).in_file_operation(parent, "create settings directory")?;
        }
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| AppError::config_with_source("Failed to serialize default settings", e))?;
        fs::write(path, content).in_file_operation(path, "write default settings")?;
        Ok(())
    }

    /// Fail fast if any certificate or key file is missing.
    pub fn validate_files(&self) -> AppResult<()> {
        let tls = &self.config.tls;
        let required = [
            ("root ca certificate", &tls.root_cert_file),
            ("local certificate", &tls.local_cert_file),
            ("private key", &tls.private_key_file),
        ];

        for (what, path) in required {
            if !path.exists() {
                let err = AppError::missing_file(what, path);
                error!("{}", err);
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn gateway_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.config.gateway.host, self.config.gateway.port)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.config.gateway.dispatch_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.gateway.connect_timeout_secs)
    }
}
