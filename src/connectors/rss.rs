//! RSS 2.0 / Atom connector. Ported from
//! `news_collector/ingestion/rss_connector.py`: one GET with a fixed
//! timeout, tolerant parsing of both feed dialects, case-insensitive
//! substring keyword filtering over `title ∪ description`. Bad XML yields
//! zero records, never an error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::{Connector, TimeWindow};
use crate::core::types::{RawArticleRecord, SourceDescriptor};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

#[derive(Debug, Default, Clone)]
struct FeedEntry {
    title: String,
    link: String,
    description: String,
    published: Option<String>,
    author: Option<String>,
}

pub struct RssConnector {
    client: reqwest::Client,
    source: SourceDescriptor,
}

impl RssConnector {
    pub fn new(client: reqwest::Client, source: SourceDescriptor) -> Self {
        RssConnector { client, source }
    }

    fn strip_html(text: &str) -> String {
        let stripped = TAG_RE.replace_all(text, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Tolerant RSS2/Atom reader: collects the fields we care about from
    /// whichever of `<item>`/`<entry>` appears, ignoring everything else.
    /// Malformed XML simply yields however many entries were parsed before
    /// the error, never propagates as an error itself.
    fn parse_entries(xml: &str) -> Vec<FeedEntry> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut entries = Vec::new();
        let mut current: Option<FeedEntry> = None;
        let mut in_item = false;
        let mut field = String::new();
        let mut text_buffer = String::new();
        let mut atom_link_href: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if name == "item" || name == "entry" {
                        in_item = true;
                        current = Some(FeedEntry::default());
                        atom_link_href = None;
                    } else if in_item && name == "link" {
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                            if key == "href" {
                                atom_link_href = Some(String::from_utf8_lossy(&attr.value).to_string());
                            }
                        }
                    }
                    field = name;
                }
                Ok(Event::Text(e)) => {
                    text_buffer = e.unescape().unwrap_or_default().to_string();
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if (name == "item" || name == "entry") && in_item {
                        if let Some(entry) = current.take() {
                            entries.push(entry);
                        }
                        in_item = false;
                    } else if in_item {
                        if let Some(entry) = current.as_mut() {
                            match field.as_str() {
                                "title" => entry.title = text_buffer.clone(),
                                "link" => {
                                    if let Some(href) = atom_link_href.take() {
                                        entry.link = href;
                                    } else {
                                        entry.link = text_buffer.clone();
                                    }
                                }
                                "description" | "summary" | "content" => {
                                    entry.description = text_buffer.clone()
                                }
                                "pubDate" | "published" | "updated" => {
                                    entry.published = Some(text_buffer.clone())
                                }
                                "author" | "dc:creator" => entry.author = Some(text_buffer.clone()),
                                _ => {}
                            }
                        }
                    }
                    text_buffer.clear();
                }
                Ok(Event::Eof) => break,
                Err(_) => break,
                _ => {}
            }
        }

        entries
    }

    fn matches_keywords(entry: &FeedEntry, keywords: &[String]) -> bool {
        if keywords.is_empty() {
            return true;
        }
        let haystack = format!("{} {}", entry.title, entry.description).to_lowercase();
        keywords
            .iter()
            .any(|k| haystack.contains(&k.to_lowercase()))
    }
}

#[async_trait]
impl Connector for RssConnector {
    async fn fetch(
        &self,
        keywords: &[String],
        limit: usize,
        _time_window: Option<TimeWindow>,
    ) -> anyhow::Result<Vec<RawArticleRecord>> {
        let started = std::time::Instant::now();
        let response = self
            .client
            .get(&self.source.base_url)
            .header("User-Agent", &self.source.user_agent)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let entries = Self::parse_entries(&body);
        let fetched_at = Utc::now();

        let records = entries
            .into_iter()
            .filter(|e| !e.link.is_empty())
            .filter(|e| Self::matches_keywords(e, keywords))
            .take(limit.max(1))
            .map(|e| RawArticleRecord {
                id: RawArticleRecord::content_id(&self.source.id, &e.link),
                source_id: self.source.id.clone(),
                source_name: self.source.name.clone(),
                raw_payload: std::collections::HashMap::new(),
                raw_html: Some(e.description.clone()),
                extracted_text: Some(Self::strip_html(&e.description)),
                url: e.link,
                fetched_at,
                http_status: Some(status.as_u16()),
                response_latency_ms: Some(elapsed_ms),
                language_hint: None,
                title_hint: Some(Self::strip_html(&e.title)),
                summary_hint: Some(Self::strip_html(&e.description)),
                published_hint: e.published,
                author_hint: e.author,
                category_hint: None,
                tier_hint: Some(self.source.tier),
                view_count: None,
                share_count: None,
                comment_count: None,
                like_count: None,
            })
            .collect();

        Ok(records)
    }
}
