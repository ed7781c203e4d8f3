//! News search API client.
//!
//! # Architecture
//!
//! - [`ArticleSource`]: the seam the pipeline loop depends on
//! - [`NewsApiClient`]: the NewsAPI implementation, one GET per call
//!
//! The client never retries. Every failure is classified into a
//! [`FetchError`] and handed back, so that backoff policy lives in the loop
//! alone. An answer without any articles is a normal, empty result.

use crate::error::FetchError;
use crate::utils::truncate_for_log;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// Key of the article list in a search response.
const ARTICLES_KEY: &str = "articles";

/// Bytes of an unexpected response body kept for diagnostics.
const BODY_PREVIEW_BYTES: usize = 200;

/// Search parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub page_size: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            q: "technology".to_string(),
            page_size: 20,
        }
    }
}

/// Anything that can produce one batch of raw articles per call.
pub trait ArticleSource {
    /// Run one search and return the raw, unvalidated items.
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<Value>, FetchError>;
}

/// Client for the NewsAPI `everything` endpoint.
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl NewsApiClient {
    /// Build a client with its own connection pool and request timeout.
    pub fn new(base_url: Url, api_key: String, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

impl std::fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ArticleSource for NewsApiClient {
    #[instrument(level = "info", skip_all, fields(q = %query.q, page_size = query.page_size))]
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<Value>, FetchError> {
        let t0 = Instant::now();
        let page_size = query.page_size.to_string();

        let response = self
            .http
            .get(self.base_url.clone())
            .query(&[
                ("q", query.q.as_str()),
                ("apiKey", self.api_key.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        let dt = t0.elapsed();

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| truncate_for_log(body.trim(), BODY_PREVIEW_BYTES));
            warn!(
                status = status.as_u16(),
                elapsed_ms = dt.as_millis() as u64,
                %message,
                "Search request rejected"
            );
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let items = parse_articles(&body)?;
        debug!(
            count = items.len(),
            elapsed_ms = dt.as_millis() as u64,
            "Search request succeeded"
        );
        Ok(items)
    }
}

/// Transport errors render their request URL, which carries the API key.
fn transport(err: reqwest::Error) -> FetchError {
    FetchError::Transport(err.without_url())
}

/// Pull the `message` out of a NewsAPI error document, if the body is one.
fn error_message(body: &str) -> Option<String> {
    let doc: Value = serde_json::from_str(body).ok()?;
    doc.get("message")?.as_str().map(str::to_string)
}

/// Extract the raw article list from a successful response body.
fn parse_articles(body: &str) -> Result<Vec<Value>, FetchError> {
    let mut doc: Value = serde_json::from_str(body).map_err(FetchError::Decode)?;

    if doc.get("status").and_then(Value::as_str) == Some("error") {
        let field = |key: &str| {
            doc.get(key)
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string()
        };
        return Err(FetchError::Api {
            code: field("code"),
            message: field("message"),
        });
    }

    let Some(obj) = doc.as_object_mut() else {
        return Err(FetchError::Shape(format!(
            "expected a JSON object, got {}",
            crate::error::JsonKind::of(&doc)
        )));
    };

    match obj.remove(ARTICLES_KEY) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(FetchError::Shape(format!(
            "`{ARTICLES_KEY}` should be an array, got {}",
            crate::error::JsonKind::of(&other)
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Base URL on a local port nothing listens on, so connects are refused.
    pub(crate) fn refused_base_url() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Url::parse(&format!("http://127.0.0.1:{port}/v2/everything")).unwrap()
    }

    async fn client_for(server: &MockServer) -> NewsApiClient {
        let base = Url::parse(&format!("{}/v2/everything", server.uri())).unwrap();
        NewsApiClient::new(base, "test-key".to_string(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_query_parameters_and_returns_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("q", "rust"))
            .and(query_param("apiKey", "test-key"))
            .and(query_param("pageSize", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "totalResults": 2,
                "articles": [{ "title": "a" }, { "title": "b" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let query = SearchQuery {
            q: "rust".to_string(),
            page_size: 5,
        };
        let items = client.fetch(&query).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["title"], "a");
        assert_eq!(items[1]["title"], "b");
    }

    #[tokio::test]
    async fn test_fetch_missing_articles_key_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&server)
            .await;

        let items = client_for(&server)
            .await
            .fetch(&SearchQuery::default())
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "status": "error",
                "code": "rateLimited",
                "message": "You have made too many requests recently."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .fetch(&SearchQuery::default())
            .await
            .unwrap_err();
        match err {
            FetchError::Status { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "You have made too many requests recently.");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_non_json_error_body_is_previewed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .fetch(&SearchQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status: 502, ref message } if message == "Bad Gateway"
        ));
    }

    #[tokio::test]
    async fn test_fetch_transport_failure_is_transport_error() {
        let client =
            NewsApiClient::new(refused_base_url(), "key".into(), Duration::from_secs(5)).unwrap();

        let err = client.fetch(&SearchQuery::default()).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fetch_transport_error_does_not_leak_api_key() {
        let client = NewsApiClient::new(
            refused_base_url(),
            "SUPERSECRETKEY".into(),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.fetch(&SearchQuery::default()).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
        assert!(!err.to_string().contains("SUPERSECRETKEY"), "{err}");
        assert!(!format!("{err:?}").contains("SUPERSECRETKEY"), "{err:?}");
    }

    #[test]
    fn test_parse_articles_api_error_in_ok_body() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#;
        match parse_articles(body).unwrap_err() {
            FetchError::Api { code, message } => {
                assert_eq!(code, "apiKeyInvalid");
                assert_eq!(message, "Your API key is invalid.");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_articles_shape_and_decode_errors() {
        assert!(matches!(
            parse_articles(r#"{"articles": {"title": "x"}}"#),
            Err(FetchError::Shape(_))
        ));
        assert!(matches!(parse_articles("[1, 2]"), Err(FetchError::Shape(_))));
        assert!(matches!(parse_articles("<html>"), Err(FetchError::Decode(_))));
        assert!(parse_articles(r#"{"articles": null}"#).unwrap().is_empty());
        assert!(parse_articles(r#"{"articles": []}"#).unwrap().is_empty());
    }
}
