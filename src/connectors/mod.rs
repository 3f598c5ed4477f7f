//! C2: Connectors.
//!
//! Every connector shares one contract (`fetch`), ported from
//! `news_collector/ingestion/base_connector.py`'s abstract base. Connectors
//! are independent — one connector's failure never fails another; that
//! independence is enforced by the orchestrator (`ingestion`), not here.

pub mod rss;
pub mod search_api;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use crate::core::types::RawArticleRecord;

#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Error taxonomy for logging only (spec.md §4.2 supplement) — the
/// orchestrator still collapses every variant into one failure-count
/// increment per source. Ported from the teacher's search-engine
/// `EngineError`.
#[derive(Debug)]
pub enum ConnectorError {
    Blocked { reason: String },
    Transient(String),
    Fatal(String),
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorError::Blocked { reason } => write!(f, "blocked: {reason}"),
            ConnectorError::Transient(e) => write!(f, "transient: {e}"),
            ConnectorError::Fatal(e) => write!(f, "fatal: {e}"),
        }
    }
}

impl std::error::Error for ConnectorError {}

pub fn detect_block_reason(status: StatusCode, body: &str) -> Option<String> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some("http_429".to_string());
    }
    if status == StatusCode::FORBIDDEN {
        return Some("http_403".to_string());
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return Some("http_503".to_string());
    }

    let lower = body.to_lowercase();
    for (needle, label) in [
        ("unusual traffic", "unusual_traffic"),
        ("captcha", "captcha"),
        ("recaptcha", "captcha"),
        ("verify you are human", "captcha"),
        ("access denied", "access_denied"),
    ] {
        if lower.contains(needle) {
            return Some(label.to_string());
        }
    }
    None
}

/// Shared connector contract: `fetch(keywords, limit, time_window) -> raw
/// records`. Connectors must tolerate empty `keywords` (no keyword filter).
#[async_trait]
pub trait Connector: Send + Sync {
    async fn fetch(
        &self,
        keywords: &[String],
        limit: usize,
        time_window: Option<TimeWindow>,
    ) -> anyhow::Result<Vec<RawArticleRecord>>;
}
