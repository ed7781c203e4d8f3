//! Validated runtime configuration.
//!
//! [`Config::from_cli`] checks the raw [`Cli`] values once at startup. The
//! resulting [`Config`] is never modified afterwards; any problem found here
//! is a [`ConfigError`] and the loop is not started.

use crate::cadence::CadencePolicy;
use crate::cli::{Cli, SinkKind};
use crate::error::ConfigError;
use crate::fetch::SearchQuery;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Page size limits accepted by the search API.
const PAGE_SIZE_RANGE: std::ops::RangeInclusive<u32> = 1..=100;

/// Where published records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    Kinesis {
        stream_name: String,
        region: String,
        endpoint_url: Option<String>,
    },
    File {
        path: PathBuf,
    },
}

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: Url,
    pub query: SearchQuery,
    pub cadence: CadencePolicy,
    pub request_timeout: Duration,
    pub sink: SinkConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base.as_str())
            .field("query", &self.query)
            .field("cadence", &self.cadence)
            .field("request_timeout", &self.request_timeout)
            .field("sink", &self.sink)
            .finish()
    }
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let api_key = cli
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("NEWSAPI_KEY"))?;

        let api_base = Url::parse(&cli.api_base).map_err(|e| ConfigError::Invalid {
            key: "NEWSAPI_BASE",
            message: format!("{e}: {}", cli.api_base),
        })?;
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "NEWSAPI_BASE",
                message: format!("unsupported scheme `{}`", api_base.scheme()),
            });
        }

        if cli.poll_interval == 0 {
            return Err(ConfigError::Invalid {
                key: "API_FETCH_INTERVAL",
                message: "must be at least 1 second".to_string(),
            });
        }
        if cli.backoff_interval == 0 || cli.backoff_interval >= cli.poll_interval {
            return Err(ConfigError::Invalid {
                key: "API_BACKOFF_INTERVAL",
                message: format!(
                    "must be between 1 and {} seconds (shorter than the poll interval)",
                    cli.poll_interval - 1
                ),
            });
        }
        if cli.request_timeout == 0 {
            return Err(ConfigError::Invalid {
                key: "API_REQUEST_TIMEOUT",
                message: "must be at least 1 second".to_string(),
            });
        }

        if !PAGE_SIZE_RANGE.contains(&cli.page_size) {
            return Err(ConfigError::Invalid {
                key: "NEWS_PAGE_SIZE",
                message: format!(
                    "{} is outside {}..={}",
                    cli.page_size,
                    PAGE_SIZE_RANGE.start(),
                    PAGE_SIZE_RANGE.end()
                ),
            });
        }
        if cli.query.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "NEWS_QUERY",
                message: "must not be blank".to_string(),
            });
        }

        let sink = match cli.sink {
            SinkKind::Kinesis => {
                if !cfg!(feature = "kinesis") {
                    return Err(ConfigError::Invalid {
                        key: "STREAM_SINK",
                        message: "this build has no kinesis support; use `file`".to_string(),
                    });
                }
                if cli.stream_name.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        key: "KINESIS_STREAM_NAME",
                        message: "must not be blank".to_string(),
                    });
                }
                SinkConfig::Kinesis {
                    stream_name: cli.stream_name,
                    region: cli.region,
                    endpoint_url: cli.stream_endpoint,
                }
            }
            SinkKind::File => SinkConfig::File { path: cli.log_file },
        };

        Ok(Self {
            api_key,
            api_base,
            query: SearchQuery {
                q: cli.query,
                page_size: cli.page_size,
            },
            cadence: CadencePolicy {
                poll_interval: Duration::from_secs(cli.poll_interval),
                backoff_interval: Duration::from_secs(cli.backoff_interval),
                backoff_jitter: Duration::from_millis(cli.backoff_jitter_ms),
            },
            request_timeout: Duration::from_secs(cli.request_timeout),
            sink,
        })
    }
}
