//! Search-API connector. Ported from
//! `news_collector/ingestion/api_connector.py`: composes a provider URL from
//! keywords and a pagination descriptor, sends credentials in headers,
//! parses a JSON envelope (`items` or `articles`) into raw records, and
//! enforces a per-connector rate limit with minute/hour/day counters and
//! daily rollover.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use url::Url;

use super::{Connector, TimeWindow};
use crate::core::types::{RateLimit, RawArticleRecord, SourceDescriptor};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const PAGE_SIZE: usize = 20;

#[derive(Debug)]
struct RateLimitState {
    minute_count: u32,
    minute_started: DateTime<Utc>,
    hour_count: u32,
    hour_started: DateTime<Utc>,
    day_count: u32,
    day_started: DateTime<Utc>,
}

impl RateLimitState {
    fn new(now: DateTime<Utc>) -> Self {
        RateLimitState {
            minute_count: 0,
            minute_started: now,
            hour_count: 0,
            hour_started: now,
            day_count: 0,
            day_started: now,
        }
    }

    /// Rolls each counter over once its window has elapsed, then reports
    /// whether the daily quota has already been exhausted.
    fn tick(&mut self, now: DateTime<Utc>, limits: &RateLimit) -> bool {
        if now - self.minute_started >= ChronoDuration::minutes(1) {
            self.minute_count = 0;
            self.minute_started = now;
        }
        if now - self.hour_started >= ChronoDuration::hours(1) {
            self.hour_count = 0;
            self.hour_started = now;
        }
        if now - self.day_started >= ChronoDuration::days(1) {
            self.day_count = 0;
            self.day_started = now;
        }

        if self.day_count >= limits.daily_quota {
            return true;
        }
        self.minute_count += 1;
        self.hour_count += 1;
        self.day_count += 1;
        false
    }
}

pub struct SearchApiConnector {
    client: reqwest::Client,
    source: SourceDescriptor,
    credential_header: String,
    credential_value: String,
    rate_state: Mutex<RateLimitState>,
}

impl SearchApiConnector {
    pub fn new(
        client: reqwest::Client,
        source: SourceDescriptor,
        credential_header: impl Into<String>,
        credential_value: impl Into<String>,
    ) -> Self {
        SearchApiConnector {
            rate_state: Mutex::new(RateLimitState::new(Utc::now())),
            client,
            source,
            credential_header: credential_header.into(),
            credential_value: credential_value.into(),
        }
    }

    /// Widens an inclusive `[from, to]` window by one day on each side so
    /// that a provider's exclusive `after:`/`before:` semantics still cover
    /// the caller's inclusive boundaries.
    fn widen_window(window: TimeWindow) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            window.from - ChronoDuration::days(1),
            window.to + ChronoDuration::days(1),
        )
    }

    fn build_url(&self, keywords: &[String], page: usize, window: Option<TimeWindow>) -> String {
        let query = keywords.join(" ");
        let mut url = Url::parse(&self.source.base_url).unwrap_or_else(|_| {
            Url::parse("https://invalid.example.test/").expect("static URL always parses")
        });
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &query)
                .append_pair("page", &page.to_string())
                .append_pair("size", &PAGE_SIZE.to_string());
            if let Some(window) = window {
                let (after, before) = Self::widen_window(window);
                pairs
                    .append_pair("after", &after.to_rfc3339())
                    .append_pair("before", &before.to_rfc3339());
            }
        }
        url.to_string()
    }

    fn parse_envelope(&self, body: &str) -> Vec<RawArticleRecord> {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return Vec::new();
        };
        let items = value
            .get("items")
            .or_else(|| value.get("articles"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let fetched_at = Utc::now();
        items
            .into_iter()
            .filter_map(|item| {
                let url = item
                    .get("url")
                    .or_else(|| item.get("link"))
                    .and_then(|v| v.as_str())?
                    .to_string();
                let title = item
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let description = item
                    .get("description")
                    .or_else(|| item.get("content"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                let published = item
                    .get("publishedAt")
                    .or_else(|| item.get("published_at"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                let author = item
                    .get("author")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());

                Some(RawArticleRecord {
                    id: RawArticleRecord::content_id(&self.source.id, &url),
                    source_id: self.source.id.clone(),
                    source_name: self.source.name.clone(),
                    raw_payload: std::collections::HashMap::new(),
                    raw_html: None,
                    extracted_text: description.clone(),
                    url,
                    fetched_at,
                    http_status: Some(200),
                    response_latency_ms: None,
                    language_hint: None,
                    title_hint: Some(title),
                    summary_hint: description,
                    published_hint: published,
                    author_hint: author,
                    category_hint: None,
                    tier_hint: Some(self.source.tier),
                    view_count: None,
                    share_count: None,
                    comment_count: None,
                    like_count: None,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Connector for SearchApiConnector {
    async fn fetch(
        &self,
        keywords: &[String],
        limit: usize,
        time_window: Option<TimeWindow>,
    ) -> anyhow::Result<Vec<RawArticleRecord>> {
        let mut collected = Vec::new();
        let mut page = 1usize;

        loop {
            let exhausted = {
                let mut state = self.rate_state.lock().unwrap();
                state.tick(Utc::now(), &self.source.rate_limit)
            };
            if exhausted {
                tracing::warn!(source_id = %self.source.id, "daily quota exhausted; returning partial results");
                break;
            }

            let url = self.build_url(keywords, page, time_window);
            let response = self
                .client
                .get(&url)
                .header(&self.credential_header, &self.credential_value)
                .timeout(FETCH_TIMEOUT)
                .send()
                .await?;
            let body = response.text().await.unwrap_or_default();
            let page_records = self.parse_envelope(&body);

            if page_records.is_empty() {
                break;
            }
            collected.extend(page_records);
            if collected.len() >= limit {
                break;
            }
            page += 1;
        }

        collected.truncate(limit.max(1));
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IngestionKind, Tier};
    use std::collections::BTreeSet;

    fn make_source() -> SourceDescriptor {
        SourceDescriptor {
            id: "newsapi".to_string(),
            name: "NewsAPI".to_string(),
            ingestion_kind: IngestionKind::Api,
            base_url: "https://example.test/v2/search".to_string(),
            default_locale: "en_US".to_string(),
            supported_locales: BTreeSet::new(),
            supported_categories: BTreeSet::new(),
            tier: Tier::Tier2,
            credibility_base_score: 70.0,
            rate_limit: RateLimit::default(),
            crawl_delay_seconds: 1,
            user_agent: "test-agent".to_string(),
            provides_metadata: Default::default(),
            is_active: true,
            last_crawled: None,
            last_success: None,
            failure_count: 0,
        }
    }

    fn make_connector() -> SearchApiConnector {
        SearchApiConnector::new(
            reqwest::Client::new(),
            make_source(),
            "X-Api-Key",
            "secret",
        )
    }

    #[test]
    fn parses_items_envelope() {
        let connector = make_connector();
        let body = r#"{"items": [{"title": "A", "url": "https://example.test/a", "description": "d"}]}"#;
        let records = connector.parse_envelope(body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://example.test/a");
    }

    #[test]
    fn parses_articles_envelope_as_fallback() {
        let connector = make_connector();
        let body = r#"{"articles": [{"title": "A", "link": "https://example.test/b"}]}"#;
        let records = connector.parse_envelope(body);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn skips_items_without_a_url() {
        let connector = make_connector();
        let body = r#"{"items": [{"title": "no url"}]}"#;
        assert!(connector.parse_envelope(body).is_empty());
    }

    #[test]
    fn malformed_json_yields_zero_records() {
        let connector = make_connector();
        assert!(connector.parse_envelope("not json").is_empty());
    }

    #[test]
    fn rate_limit_rolls_over_the_minute_window() {
        let mut state = RateLimitState::new(Utc::now());
        let limits = RateLimit {
            requests_per_minute: 1,
            requests_per_hour: 1000,
            daily_quota: 10_000,
        };
        assert!(!state.tick(Utc::now(), &limits));
        let later = Utc::now() + ChronoDuration::minutes(2);
        assert!(!state.tick(later, &limits));
        assert_eq!(state.minute_count, 1);
    }

    #[test]
    fn daily_quota_signals_exhaustion() {
        let mut state = RateLimitState::new(Utc::now());
        let limits = RateLimit {
            requests_per_minute: 1000,
            requests_per_hour: 1000,
            daily_quota: 2,
        };
        assert!(!state.tick(Utc::now(), &limits));
        assert!(!state.tick(Utc::now(), &limits));
        assert!(state.tick(Utc::now(), &limits));
    }

    #[test]
    fn widens_window_by_one_day_each_side() {
        let from = Utc::now();
        let to = from + ChronoDuration::days(3);
        let (widened_from, widened_to) = SearchApiConnector::widen_window(TimeWindow { from, to });
        assert_eq!(widened_from, from - ChronoDuration::days(1));
        assert_eq!(widened_to, to + ChronoDuration::days(1));
    }
}
