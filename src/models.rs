//! The canonical article record that flows from the validator to the stream.
//!
//! A [`Record`] is built exactly once by [`Record::new`], which assigns the
//! identifier and ingestion time. Its fields are private and only exposed
//! through read-only accessors, so nothing downstream can change it.
//!
//! The serialized form uses camelCase field names and writes absent optional
//! fields as `null`, keeping the payload schema stable for stream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source name used when the upstream item does not name its publisher.
pub const SOURCE_NAME_UNKNOWN: &str = "Unknown Source";

/// Optional article fields handed to [`Record::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// One validated news article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    id: String,
    source_name: String,
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
    author: Option<String>,
    published_at: Option<DateTime<Utc>>,
    ingested_at: DateTime<Utc>,
}

impl Record {
    /// Build a record with a fresh id, stamped with the current UTC time.
    ///
    /// # Arguments
    ///
    /// * `source_name` - Publisher name, already defaulted by the validator
    /// * `fields` - The optional article fields, copied as given
    ///
    /// # Returns
    ///
    /// A record whose id is a random v4 UUID in 32-char hex form.
    pub fn new(source_name: impl Into<String>, fields: ArticleFields) -> Self {
        let ArticleFields {
            title,
            body,
            url,
            author,
            published_at,
        } = fields;

        Self {
            id: Uuid::new_v4().simple().to_string(),
            source_name: source_name.into(),
            title,
            body,
            url,
            author,
            published_at,
            ingested_at: Utc::now(),
        }
    }

    /// Unique id, also used as the stream partition key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Publisher name, or [`SOURCE_NAME_UNKNOWN`].
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Headline as sent upstream.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Article text from the upstream `content` field.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Link to the article.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Byline as sent upstream.
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Upstream publication time, normalized to UTC.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// When this process built the record.
    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }
}
