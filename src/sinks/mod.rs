//! Stream backends behind [`StreamSink`].
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | AWS Kinesis | [`kinesis`] | `PutRecord` per record; needs the `kinesis` feature |
//! | Local file | [`file`] | one JSON line per record, append-only |
//!
//! [`Sink`] picks one at startup from configuration and dispatches to it, so
//! the pipeline is built against a single concrete type.

pub mod file;
#[cfg(feature = "kinesis")]
pub mod kinesis;

use crate::config::SinkConfig;
use crate::error::PublishError;
use crate::publish::{Ack, StreamSink};
use tracing::info;

pub use file::FileSink;
#[cfg(feature = "kinesis")]
pub use kinesis::KinesisSink;

/// The stream backend selected at startup.
#[derive(Debug)]
pub enum Sink {
    #[cfg(feature = "kinesis")]
    Kinesis(KinesisSink),
    File(FileSink),
}

impl Sink {
    /// Connect the backend described by `config`.
    pub async fn connect(config: &SinkConfig) -> Result<Self, PublishError> {
        match config {
            #[cfg(feature = "kinesis")]
            SinkConfig::Kinesis {
                stream_name,
                region,
                endpoint_url,
            } => {
                let sink = KinesisSink::connect(stream_name, region, endpoint_url.as_deref()).await;
                info!(stream = %stream_name, %region, "Kinesis sink ready");
                Ok(Sink::Kinesis(sink))
            }
            #[cfg(not(feature = "kinesis"))]
            SinkConfig::Kinesis { .. } => Err(PublishError::Stream(
                "this build has no kinesis support".to_string(),
            )),
            SinkConfig::File { path } => {
                let sink = FileSink::open(path).await?;
                info!(path = %sink.path().display(), "File sink ready");
                Ok(Sink::File(sink))
            }
        }
    }
}

impl StreamSink for Sink {
    async fn put(&self, partition_key: &str, payload: Vec<u8>) -> Result<Ack, PublishError> {
        match self {
            #[cfg(feature = "kinesis")]
            Sink::Kinesis(sink) => sink.put(partition_key, payload).await,
            Sink::File(sink) => sink.put(partition_key, payload).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_file_sink_dispatches_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.jsonl");
        let sink = Sink::connect(&SinkConfig::File { path: path.clone() })
            .await
            .unwrap();
        assert!(matches!(sink, Sink::File(_)));

        let ack = sink.put("abc", br#"{"id":"abc"}"#.to_vec()).await.unwrap();
        assert_eq!(ack.partition_key, "abc");

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
