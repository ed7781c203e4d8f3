//! Command-line interface definitions for News Tail.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also be supplied through an environment variable, and a
//! `.env` file in the working directory is loaded before parsing.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which stream backend receives the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// AWS Kinesis Data Streams
    Kinesis,
    /// Local append-only JSON-lines file
    File,
}

/// Command-line arguments for the News Tail application.
///
/// # Examples
///
/// ```sh
/// # Tail "technology" into Kinesis every two minutes
/// NEWSAPI_KEY=... news_tail
///
/// # Tail a different query into a local file
/// news_tail --api-key ... --query rust --sink file --log-file ./stream.jsonl
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// NewsAPI key (required)
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Search endpoint URL
    #[arg(long, env = "NEWSAPI_BASE", default_value = "https://newsapi.org/v2/everything")]
    pub api_base: String,

    /// Seconds to wait between successful cycles
    #[arg(long, env = "API_FETCH_INTERVAL", default_value_t = 120)]
    pub poll_interval: u64,

    /// Seconds to wait after a failed cycle; must be shorter than the poll interval
    #[arg(long, env = "API_BACKOFF_INTERVAL", default_value_t = 15)]
    pub backoff_interval: u64,

    /// Maximum random milliseconds added to the backoff interval
    #[arg(long, env = "API_BACKOFF_JITTER_MS", default_value_t = 0)]
    pub backoff_jitter_ms: u64,

    /// Search query
    #[arg(short, long, env = "NEWS_QUERY", default_value = "technology")]
    pub query: String,

    /// Articles requested per cycle (1-100)
    #[arg(short, long, env = "NEWS_PAGE_SIZE", default_value_t = 20)]
    pub page_size: u32,

    /// Per-request timeout for the search API, in seconds
    #[arg(long, env = "API_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Stream backend
    #[arg(long, env = "STREAM_SINK", value_enum, default_value_t = SinkKind::Kinesis)]
    pub sink: SinkKind,

    /// Kinesis stream name
    #[arg(long, env = "KINESIS_STREAM_NAME", default_value = "news-articles")]
    pub stream_name: String,

    /// AWS region of the Kinesis stream
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Custom Kinesis endpoint, e.g. a LocalStack URL
    #[arg(long, env = "KINESIS_ENDPOINT_URL")]
    pub stream_endpoint: Option<String>,

    /// Output file for the `file` sink
    #[arg(long, env = "STREAM_LOG_FILE", default_value = "log.txt")]
    pub log_file: PathBuf,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    /// Parse `args` with every env fallback removed, so the caller's shell
    /// cannot change the outcome.
    pub(crate) fn parse_without_env(args: &[&str]) -> Cli {
        let mut argv = vec!["news_tail"];
        argv.extend_from_slice(args);
        let matches = Cli::command()
            .mut_args(|arg| arg.env(Option::<&'static str>::None))
            .get_matches_from(argv);
        Cli::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let cli = parse_without_env(&["--api-key", "k"]);

        assert_eq!(cli.api_key.as_deref(), Some("k"));
        assert_eq!(cli.api_base, "https://newsapi.org/v2/everything");
        assert_eq!(cli.poll_interval, 120);
        assert_eq!(cli.backoff_interval, 15);
        assert_eq!(cli.query, "technology");
        assert_eq!(cli.page_size, 20);
        assert_eq!(cli.sink, SinkKind::Kinesis);
        assert_eq!(cli.stream_name, "news-articles");
        assert_eq!(cli.log_file, PathBuf::from("log.txt"));
        assert_eq!(cli.stream_endpoint, None);
    }

    #[test]
    fn test_cli_without_api_key_parses_to_none() {
        assert_eq!(parse_without_env(&[]).api_key, None);
    }

    #[test]
    fn test_cli_short_flags_and_file_sink() {
        let cli = parse_without_env(&[
            "--api-key",
            "k",
            "-q",
            "rust",
            "-p",
            "50",
            "--sink",
            "file",
            "--log-file",
            "/tmp/stream.jsonl",
        ]);

        assert_eq!(cli.query, "rust");
        assert_eq!(cli.page_size, 50);
        assert_eq!(cli.sink, SinkKind::File);
        assert_eq!(cli.log_file, PathBuf::from("/tmp/stream.jsonl"));
    }
}
