//! Feedback listener
//!
//! Opens a one-shot session to the feedback endpoint, reads until the peer
//! closes, and hands each expired token to a [`FeedbackSink`]. Unlike the
//! primary connection it has no reconnect or backoff: a failed check is
//! reported to the caller and simply tried again on the next request.

use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::{Connector, TransportError};
use crate::errors::AppResult;
use crate::protocol::{decode_feedback, FeedbackRecord};

/// Receives decoded expired-token records.
pub trait FeedbackSink: Send + Sync {
    fn deliver(&self, record: FeedbackRecord);
}

/// Logs every expired token.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFeedbackSink;

impl FeedbackSink for LoggingFeedbackSink {
    fn deliver(&self, record: FeedbackRecord) {
        match chrono::DateTime::from_timestamp(i64::from(record.timestamp), 0) {
            Some(expired_at) => info!("Expired device token {} (since {})", record.token_hex(), expired_at.to_rfc3339()),
            None => info!("Expired device token {}", record.token_hex()),
        }
    }
}

/// Forwards records to a consumer task.
impl FeedbackSink for flume::Sender<FeedbackRecord> {
    fn deliver(&self, record: FeedbackRecord) {
        if self.send(record).is_err() {
            debug!("Feedback consumer has gone away; dropping record");
        }
    }
}

/// Something that can be asked for the current expired-token list.
#[async_trait]
pub trait FeedbackSource: Send + Sync {
    async fn check(&self) -> AppResult<Vec<FeedbackRecord>>;
}

pub struct FeedbackListener<C: Connector, S: FeedbackSink> {
    connector: C,
    sink: S,
}

impl<C: Connector, S: FeedbackSink> FeedbackListener<C, S> {
    pub fn new(connector: C, sink: S) -> Self {
        Self { connector, sink }
    }
}

#[async_trait]
impl<C: Connector, S: FeedbackSink> FeedbackSource for FeedbackListener<C, S> {
    async fn check(&self) -> AppResult<Vec<FeedbackRecord>> {
        info!("Connecting to {}...", self.connector.endpoint());
        let mut stream = self.connector.connect().await?;

        let mut data = Vec::new();
        match stream.read_to_end(&mut data).await {
            Ok(_) => {}
            // The feedback service tends to hang up without a TLS close_notify
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {}
            Err(e) => return Err(TransportError::Connect(e).into()),
        }

        let records = decode_feedback(&data)?;
        info!("Feedback service reported {} expired tokens", records.len());
        for record in &records {
            self.sink.deliver(record.clone());
        }
        Ok(records)
    }
}
