//! AWS Kinesis Data Streams backend.
//!
//! One `PutRecord` call per record. The SDK's own retry layer is switched off
//! so that a failed write surfaces after a single attempt, like every other
//! sink.

use crate::error::PublishError;
use crate::publish::{Ack, StreamSink};
use aws_config::BehaviorVersion;
use aws_sdk_kinesis::Client;
use aws_sdk_kinesis::config::Region;
use aws_sdk_kinesis::config::retry::RetryConfig;
use aws_sdk_kinesis::error::{DisplayErrorContext, SdkError};
use aws_sdk_kinesis::operation::put_record::PutRecordError;
use aws_sdk_kinesis::primitives::Blob;
use std::fmt;

pub struct KinesisSink {
    client: Client,
    stream_name: String,
}

impl KinesisSink {
    /// Load AWS credentials from the default provider chain and build a client
    /// for `region`, optionally pointed at a custom endpoint.
    pub async fn connect(stream_name: &str, region: &str, endpoint_url: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        Self::from_client(Client::new(&sdk_config), stream_name)
    }

    pub fn from_client(client: Client, stream_name: &str) -> Self {
        Self {
            client,
            stream_name: stream_name.to_string(),
        }
    }
}

impl fmt::Debug for KinesisSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KinesisSink")
            .field("stream_name", &self.stream_name)
            .finish()
    }
}

impl StreamSink for KinesisSink {
    async fn put(&self, partition_key: &str, payload: Vec<u8>) -> Result<Ack, PublishError> {
        let out = self
            .client
            .put_record()
            .stream_name(&self.stream_name)
            .partition_key(partition_key)
            .data(Blob::new(payload))
            .send()
            .await
            .map_err(classify)?;

        Ok(Ack {
            partition_key: partition_key.to_string(),
            shard_id: Some(out.shard_id().to_string()),
            sequence_number: Some(out.sequence_number().to_string()),
        })
    }
}

fn classify(err: SdkError<PutRecordError>) -> PublishError {
    let throttled = err.as_service_error().is_some_and(|e| {
        e.is_provisioned_throughput_exceeded_exception() || e.is_kms_throttling_exception()
    });
    let message = DisplayErrorContext(&err).to_string();
    if throttled {
        PublishError::Throttled(message)
    } else {
        PublishError::Stream(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_kinesis::config::Credentials;
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AMZ_JSON: &str = "application/x-amz-json-1.1";

    fn sink_for(server: &MockServer) -> KinesisSink {
        let conf = aws_sdk_kinesis::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(server.uri())
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .build();
        KinesisSink::from_client(Client::from_conf(conf), "news-articles")
    }

    #[tokio::test]
    async fn test_put_record_returns_shard_and_sequence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "Kinesis_20131202.PutRecord"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", AMZ_JSON)
                    .set_body_json(json!({
                        "ShardId": "shardId-000000000001",
                        "SequenceNumber": "49590338271490256608559692538361571095921575989136588898"
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let ack = sink_for(&server)
            .put("abc123", br#"{"id":"abc123"}"#.to_vec())
            .await
            .unwrap();

        assert_eq!(ack.partition_key, "abc123");
        assert_eq!(ack.shard_id.as_deref(), Some("shardId-000000000001"));
        assert_eq!(
            ack.sequence_number.as_deref(),
            Some("49590338271490256608559692538361571095921575989136588898")
        );
    }

    #[tokio::test]
    async fn test_put_record_throughput_exceeded_is_throttled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .insert_header("content-type", AMZ_JSON)
                    .set_body_json(json!({
                        "__type": "ProvisionedThroughputExceededException",
                        "message": "Rate exceeded for shard shardId-000000000001"
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = sink_for(&server)
            .put("abc123", b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Throttled(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_put_record_missing_stream_is_stream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .insert_header("content-type", AMZ_JSON)
                    .set_body_json(json!({
                        "__type": "ResourceNotFoundException",
                        "message": "Stream news-articles under account 000000000000 not found."
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = sink_for(&server)
            .put("abc123", b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Stream(_)), "got {err:?}");
    }
}
