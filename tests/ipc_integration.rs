//! Producer commands against an in-process daemon socket

mod common;

use apnsd::daemon::{DaemonResponse, IpcServer, Shutdown};
use apnsd::errors::AppResult;
use apnsd::gateway::{FeedbackSource, StateHandle};
use apnsd::protocol::FeedbackRecord;
use apnsd::shared::ipc::convenience::{get_daemon_status, push_notification, shutdown_daemon};
use apnsd::SharedQueue;
use async_trait::async_trait;
use common::{device_hex, encode_payload, TestEnvironment};
use std::sync::Arc;
use std::time::Duration;

struct CannedFeedback;

#[async_trait]
impl FeedbackSource for CannedFeedback {
    async fn check(&self) -> AppResult<Vec<FeedbackRecord>> {
        Ok(vec![FeedbackRecord {
            timestamp: 1_700_000_000,
            token: vec![0xCA, 0xFE],
        }])
    }
}

struct RunningSocket {
    queue: Arc<SharedQueue>,
    shutdown: Shutdown,
    task: tokio::task::JoinHandle<AppResult<()>>,
}

fn serve(env: &TestEnvironment, capacity: usize) -> RunningSocket {
    let queue = Arc::new(SharedQueue::with_capacity(capacity));
    let shutdown = Shutdown::new();
    let server = IpcServer::bind(
        &env.socket_path,
        queue.clone(),
        StateHandle::new(),
        Arc::new(CannedFeedback),
        shutdown.clone(),
    )
    .unwrap();

    RunningSocket {
        queue,
        shutdown,
        task: tokio::spawn(server.run()),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_push_command_until_queue_full() {
    let env = Arc::new(TestEnvironment::new());
    let daemon = serve(&env, 1);
    let payload = r#"{"aps":{"alert":"hello"}}"#;

    let cli_env = env.clone();
    tokio::task::spawn_blocking(move || {
        cli_env
            .command()
            .args(["push", &device_hex(0x42), &encode_payload(payload)])
            .expect_success()
            .stdout_is_empty()
            .done();

        cli_env
            .command()
            .args(["push", &device_hex(0x43), &encode_payload(payload)])
            .expect_exit_code(2)
            .stderr_contains("Payload queue is full.")
            .done();
    })
    .await
    .unwrap();

    let entries = daemon.queue.drain_all();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].device.to_hex(), device_hex(0x42));
    assert_eq!(entries[0].json, payload);

    daemon.shutdown.trigger();
    daemon.task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_feedback_command_prints_records() {
    let env = Arc::new(TestEnvironment::new());
    let daemon = serve(&env, 100);

    let cli_env = env.clone();
    tokio::task::spawn_blocking(move || {
        cli_env
            .command()
            .arg("feedback")
            .expect_success()
            .stdout_contains("1700000000 cafe")
            .done();
    })
    .await
    .unwrap();

    daemon.shutdown.trigger();
    daemon.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_status_and_shutdown_over_socket() {
    let env = TestEnvironment::new();
    let daemon = serve(&env, 100);

    let response = push_notification(&env.socket_path, &device_hex(0x01), "{}").await.unwrap();
    assert_eq!(response, DaemonResponse::Ok);

    match get_daemon_status(&env.socket_path).await.unwrap() {
        DaemonResponse::Status {
            queue_size, capacity, ..
        } => {
            assert_eq!(queue_size, 1);
            assert_eq!(capacity, 100);
        }
        other => panic!("unexpected response {:?}", other),
    }

    assert_eq!(shutdown_daemon(&env.socket_path).await.unwrap(), DaemonResponse::Ok);
    tokio::time::timeout(Duration::from_secs(5), daemon.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(daemon.shutdown.is_shutdown());
}
