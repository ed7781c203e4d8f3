//! Forwarding of validated records to the event stream.
//!
//! [`Publisher`] turns a [`Record`] into one stream write keyed by the record's
//! id. It makes exactly one write attempt per call and never retries: a
//! failure comes back as a [`PublishError`] and the pipeline loop decides what
//! to do with it. Resubmitting the same record reuses the same partition key,
//! but produces a second physical entry on the stream.
//!
//! The stream itself sits behind [`StreamSink`]; see [`crate::sinks`] for the
//! available backends.

use crate::error::PublishError;
use crate::models::Record;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Receipt for one accepted stream write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Key the payload was written under
    pub partition_key: String,
    /// Shard that took the write; `None` for unsharded sinks
    pub shard_id: Option<String>,
    /// Position of the write within its shard or file, when the sink reports one
    pub sequence_number: Option<String>,
}

/// A partitioned, append-only stream accepting opaque payloads.
pub trait StreamSink {
    /// Write one payload under `partition_key`. One call, one write attempt.
    async fn put(&self, partition_key: &str, payload: Vec<u8>) -> Result<Ack, PublishError>;
}

/// Serializes records and writes each one to a [`StreamSink`].
#[derive(Debug)]
pub struct Publisher<S> {
    sink: S,
}

impl<S: StreamSink> Publisher<S> {
    /// Wrap a sink.
    ///
    /// # Arguments
    ///
    /// * `sink` - Destination for every published record
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Publish one record, keyed by its id.
    ///
    /// # Returns
    ///
    /// The sink's [`Ack`], or the encode or write error. Nothing is retried.
    #[instrument(level = "debug", skip_all, fields(id = %record.id()))]
    pub async fn publish(&self, record: &Record) -> Result<Ack, PublishError> {
        let t0 = Instant::now();
        let payload = serde_json::to_vec(record)?;
        let res = self.sink.put(record.id(), payload).await;
        let dt = t0.elapsed();

        match &res {
            Ok(ack) => debug!(
                elapsed_ms = dt.as_millis() as u64,
                shard_id = ack.shard_id.as_deref().unwrap_or("-"),
                sequence_number = ack.sequence_number.as_deref().unwrap_or("-"),
                "Record published"
            ),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "Stream write failed"),
        }
        res
    }
}
