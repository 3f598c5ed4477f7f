//! C4: Normalizer.
//!
//! Turns a `RawArticleRecord` into a `NormalizedArticle`: video/broadcast
//! filtering, HTML cleanup, tolerant date parsing, category inference,
//! image-URL extraction, and tier attribution. Ported from
//! `news_collector/normalizer/news_normalizer.py`. Timestamps are
//! `chrono::DateTime<Utc>` throughout — the naive-arithmetic bug the
//! original source carries in its date-window filter has no equivalent
//! code path here (see DESIGN.md).

use std::collections::HashSet;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::core::types::{Category, NormalizedArticle, RawArticleRecord, Tier};

/// Fixed pattern set for broadcast/live-program titles. Kept at
/// normalization time rather than as a per-source manifest override — an
/// open design choice noted, not built (spec.md §9).
static VIDEO_NEWS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\d{1,2}:\d{2}\s*~\s*\d{1,2}:\d{2}").unwrap(),
        Regex::new(r"(?i)^\[.*live.*\]").unwrap(),
        Regex::new(r"(?i)\[생방송\]").unwrap(),
        Regex::new(r"(?i)^\d{1,2}월\s*\d{1,2}일\s*방송").unwrap(),
        Regex::new(r"(?i)다시보기").unwrap(),
    ]
});

static SCRIPT_STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</\1>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static IMG_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

/// Keyword -> canonical category. Data, not code (spec.md §9): extending
/// this list never requires re-deriving any invariant.
static CATEGORY_MAPPING: Lazy<Vec<(Category, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            Category::Politics,
            vec!["politics", "정치", "국회", "대통령", "정당", "election"],
        ),
        (
            Category::Economy,
            vec!["economy", "경제", "증시", "주식", "금리", "market", "finance"],
        ),
        (
            Category::Society,
            vec!["society", "사회", "사건", "사고", "법원"],
        ),
        (
            Category::It,
            vec!["it", "tech", "기술", "인공지능", "ai", "software"],
        ),
        (
            Category::Science,
            vec!["science", "과학", "연구", "research"],
        ),
        (
            Category::Culture,
            vec!["culture", "문화", "예술", "art", "music"],
        ),
        (
            Category::Sports,
            vec!["sports", "스포츠", "축구", "야구", "football", "soccer"],
        ),
        (
            Category::International,
            vec!["international", "world", "국제", "해외"],
        ),
        (
            Category::Entertainment,
            vec!["entertainment", "연예", "celebrity", "k-pop", "kpop"],
        ),
    ]
});

pub struct NormalizeOptions<'a> {
    pub source_tier: Option<Tier>,
    pub target_date: Option<DateTime<Utc>>,
    pub date_tolerance_days: i64,
    pub default_locale: &'a str,
    pub default_country: &'a str,
}

impl<'a> Default for NormalizeOptions<'a> {
    fn default() -> Self {
        NormalizeOptions {
            source_tier: None,
            target_date: None,
            date_tolerance_days: 1,
            default_locale: "en",
            default_country: "US",
        }
    }
}

#[derive(Debug, Default)]
pub struct NormalizeBatchStats {
    pub video_filtered: usize,
    pub date_filtered: usize,
    pub malformed: usize,
}

fn is_video_title(title: &str) -> bool {
    VIDEO_NEWS_PATTERNS.iter().any(|re| re.is_match(title))
}

fn clean_html(raw: &str) -> String {
    let no_script = SCRIPT_STYLE_RE.replace_all(raw, "");
    let no_tags = TAG_RE.replace_all(&no_script, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    let collapsed = WHITESPACE_RE.replace_all(&decoded, " ");
    collapsed
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tolerant publish-date parser: ISO 8601 then RFC 2822, falling back to the
/// fetch instant. Always timezone-aware — never a naive datetime.
fn parse_published(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return fallback;
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    fallback
}

fn infer_category(category_hint: Option<&str>, title: &str) -> Option<Category> {
    let haystack = format!(
        "{} {}",
        category_hint.unwrap_or_default(),
        title
    )
    .to_lowercase();

    for (category, keywords) in CATEGORY_MAPPING.iter() {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return Some(*category);
        }
    }
    None
}

fn extract_image_urls(raw_html: Option<&str>) -> Vec<String> {
    let Some(html) = raw_html else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for cap in IMG_SRC_RE.captures_iter(html) {
        let url = cap[1].to_string();
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }
    urls
}

/// Normalizes a single record. Returns `None` when the video/broadcast
/// filter or date-window filter drops it; a record's failure to normalize
/// never aborts the batch — the caller counts this via `stats`.
pub fn normalize_one(
    record: &RawArticleRecord,
    options: &NormalizeOptions,
    stats: &mut NormalizeBatchStats,
) -> Option<NormalizedArticle> {
    let title_raw = record.title_hint.clone().unwrap_or_default();
    if title_raw.is_empty() || record.url.is_empty() {
        stats.malformed += 1;
        return None;
    }

    if is_video_title(&title_raw) {
        stats.video_filtered += 1;
        return None;
    }

    let title = clean_html(&title_raw);
    let body = clean_html(
        record
            .extracted_text
            .as_deref()
            .or(record.raw_html.as_deref())
            .unwrap_or_default(),
    );
    let summary = record.summary_hint.as_deref().map(clean_html);

    let published_at = parse_published(record.published_hint.as_deref(), record.fetched_at);

    if let Some(target_date) = options.target_date {
        let delta = (published_at - target_date).num_days().abs();
        if delta > options.date_tolerance_days {
            stats.date_filtered += 1;
            return None;
        }
    }

    let category = infer_category(record.category_hint.as_deref(), &title);
    let image_urls = extract_image_urls(record.raw_html.as_deref());

    let tier = options
        .source_tier
        .or(record.tier_hint)
        .unwrap_or(Tier::Tier2);

    let now = Utc::now();
    Some(NormalizedArticle {
        id: Uuid::new_v4(),
        raw_record_id: record.id.clone(),
        source_id: record.source_id.clone(),
        source_name: record.source_name.clone(),
        source_tier: tier,
        title,
        body,
        summary,
        author: record.author_hint.clone(),
        published_at,
        language: record
            .language_hint
            .clone()
            .unwrap_or_else(|| options.default_locale.to_string()),
        country: options.default_country.to_string(),
        category,
        tags: Vec::new(),
        url: record.url.clone(),
        image_urls,
        view_count: record.view_count,
        share_count: record.share_count,
        comment_count: record.comment_count,
        like_count: record.like_count,
        crawled_at: record.fetched_at,
        normalized_at: now,
        cluster_id: None,
    })
}

/// Normalizes a whole batch, logging video-filtered and date-filtered
/// counts. A per-record failure never aborts the batch.
pub fn normalize_batch(
    records: &[RawArticleRecord],
    options: &NormalizeOptions,
) -> (Vec<NormalizedArticle>, NormalizeBatchStats) {
    let mut stats = NormalizeBatchStats::default();
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        if let Some(article) = normalize_one(record, options, &mut stats) {
            out.push(article);
        }
    }
    tracing::info!(
        video_filtered = stats.video_filtered,
        date_filtered = stats.date_filtered,
        malformed = stats.malformed,
        kept = out.len(),
        "normalized batch"
    );
    (out, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn raw(title: &str, url: &str, html: Option<&str>) -> RawArticleRecord {
        RawArticleRecord {
            id: "id1".to_string(),
            source_id: "src".to_string(),
            source_name: "Src".to_string(),
            raw_payload: HashMap::new(),
            raw_html: html.map(|s| s.to_string()),
            extracted_text: html.map(clean_html),
            url: url.to_string(),
            fetched_at: Utc::now(),
            http_status: Some(200),
            response_latency_ms: None,
            language_hint: None,
            title_hint: Some(title.to_string()),
            summary_hint: None,
            published_hint: Some("2024-01-01T10:00:00Z".to_string()),
            author_hint: None,
            category_hint: None,
            tier_hint: None,
            view_count: None,
            share_count: None,
            comment_count: None,
            like_count: None,
        }
    }

    #[test]
    fn drops_video_titles() {
        let mut stats = NormalizeBatchStats::default();
        let record = raw("09:00 ~ 10:00 morning show", "https://example.test/a", None);
        let result = normalize_one(&record, &NormalizeOptions::default(), &mut stats);
        assert!(result.is_none());
        assert_eq!(stats.video_filtered, 1);
    }

    #[test]
    fn strips_script_and_tags_and_decodes_entities() {
        let html = "<script>evil()</script><p>Rates &amp; markets</p>";
        let cleaned = clean_html(html);
        assert!(!cleaned.contains("evil"));
        assert!(!cleaned.contains('<'));
        assert!(cleaned.contains("Rates & markets"));
    }

    #[test]
    fn falls_back_to_fetch_instant_on_unparseable_date() {
        let mut record = raw("Some headline here", "https://example.test/b", None);
        record.published_hint = Some("not a date".to_string());
        let fetched = record.fetched_at;
        let mut stats = NormalizeBatchStats::default();
        let article = normalize_one(&record, &NormalizeOptions::default(), &mut stats).unwrap();
        assert_eq!(article.published_at, fetched);
    }

    #[test]
    fn infers_category_from_title_keywords() {
        assert_eq!(
            infer_category(None, "Central bank raises interest rates, markets react"),
            Some(Category::Economy)
        );
        assert_eq!(infer_category(None, "completely unrelated filler text"), None);
    }

    #[test]
    fn extracts_and_dedupes_image_urls_preserving_order() {
        let html = r#"<img src="a.jpg"><p>x</p><img src="b.jpg"><img src="a.jpg">"#;
        let urls = extract_image_urls(Some(html));
        assert_eq!(urls, vec!["a.jpg".to_string(), "b.jpg".to_string()]);
    }

    #[test]
    fn date_window_filter_uses_timezone_aware_arithmetic() {
        let record = raw("Headline about markets today", "https://example.test/c", None);
        let options = NormalizeOptions {
            target_date: Some(Utc::now() + ChronoDuration::days(10)),
            date_tolerance_days: 1,
            ..Default::default()
        };
        let mut stats = NormalizeBatchStats::default();
        let result = normalize_one(&record, &options, &mut stats);
        assert!(result.is_none());
        assert_eq!(stats.date_filtered, 1);
    }

    #[test]
    fn tier_attribution_falls_back_to_source_hint_then_tier2() {
        let mut record = raw("Headline about markets today", "https://example.test/d", None);
        record.tier_hint = Some(Tier::Tier1);
        let mut stats = NormalizeBatchStats::default();
        let article = normalize_one(&record, &NormalizeOptions::default(), &mut stats).unwrap();
        assert_eq!(article.source_tier, Tier::Tier1);

        record.tier_hint = None;
        let article2 = normalize_one(&record, &NormalizeOptions::default(), &mut stats).unwrap();
        assert_eq!(article2.source_tier, Tier::Tier2);
    }
}
