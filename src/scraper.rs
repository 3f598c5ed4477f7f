//! C11: Content Scraper (optional collaborator). Ported from
//! `news_collector/ingestion/content_scraper.py::ContentScraper`.
//!
//! Fetches the full article body at a URL when the RSS/API summary is too
//! short, using the same readability pipeline the teacher's HTML scraper
//! uses, then strips the Korean-news boilerplate patterns the original
//! `_clean_body`/`_is_valid_news_image` ported from. Never writes to the
//! registry; purely a per-URL enrichment step the pipeline may skip.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use moka::future::Cache;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

pub const MIN_BODY_LENGTH_FOR_SCRAPE: usize = 150;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_RETRIES: u32 = 2;
const MAX_IMAGES: usize = 5;
const DEFAULT_HOST_RATE_PER_SEC: f64 = 2.0;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Default)]
pub struct ScrapedContent {
    pub url: String,
    pub full_body: String,
    pub title: Option<String>,
    pub images: Vec<String>,
    pub success: bool,
    pub error: Option<String>,
    pub latency_ms: u64,
}

/// Per-host leaky bucket. One bucket per host, refilled lazily on use —
/// matches the teacher's `_wait_if_needed` single-counter delay, generalised
/// to a bucket so concurrent scrapes against different hosts don't contend.
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(refill_per_sec: f64) -> Self {
        TokenBucket {
            tokens: refill_per_sec,
            capacity: refill_per_sec,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Returns the delay the caller must wait before the next request.
    fn acquire(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Duration::ZERO
        } else {
            let deficit = 1.0 - self.tokens;
            self.tokens = 0.0;
            Duration::from_secs_f64(deficit / self.refill_per_sec)
        }
    }
}

/// Thread-safe content scraper: per-host rate limiting, per-URL TTL cache
/// (the teacher's `moka::future::Cache` pattern from `stdio_service.rs`'s
/// `search_cache`/`scrape_cache`), bounded retries. Idempotent — repeated
/// calls for the same URL within the cache TTL return the same result
/// without re-fetching.
pub struct ContentScraper {
    client: Client,
    rate_limiters: Mutex<HashMap<String, TokenBucket>>,
    cache: Cache<String, ScrapedContent>,
    host_rate_per_sec: f64,
    max_retries: u32,
}

impl ContentScraper {
    pub fn new() -> Self {
        ContentScraper::with_limits(DEFAULT_HOST_RATE_PER_SEC, DEFAULT_CACHE_TTL, MAX_RETRIES)
    }

    pub fn with_limits(host_rate_per_sec: f64, cache_ttl: Duration, max_retries: u32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("failed to build scraper HTTP client");

        ContentScraper {
            client,
            rate_limiters: Mutex::new(HashMap::new()),
            cache: Cache::builder().max_capacity(10_000).time_to_live(cache_ttl).build(),
            host_rate_per_sec,
            max_retries,
        }
    }

    /// Whether `body` is short enough that scraping the original URL is
    /// worth attempting.
    pub fn should_scrape(&self, body: &str) -> bool {
        body.trim().chars().count() < MIN_BODY_LENGTH_FOR_SCRAPE
    }

    async fn throttle(&self, host: &str) {
        let wait = {
            let mut limiters = self.rate_limiters.lock().unwrap();
            limiters
                .entry(host.to_string())
                .or_insert_with(|| TokenBucket::new(self.host_rate_per_sec))
                .acquire()
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Fetches and extracts the full body for one URL. Never panics or
    /// propagates a hard error — failures come back as `success: false`.
    pub async fn scrape(&self, url: &str) -> ScrapedContent {
        if url.is_empty() {
            return ScrapedContent {
                error: Some("empty url".to_string()),
                ..Default::default()
            };
        }

        if let Some(cached) = self.cache.get(url).await {
            debug!("cache hit for {}", url);
            return cached;
        }

        let resolved = resolve_redirect_url(url);
        let host = Url::parse(&resolved)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        let started = Instant::now();
        let mut result = self.fetch_with_retries(url, &resolved, &host).await;
        result.latency_ms = started.elapsed().as_millis() as u64;

        if result.success {
            self.cache.insert(url.to_string(), result.clone()).await;
        }
        result
    }

    async fn fetch_with_retries(&self, original_url: &str, resolved_url: &str, host: &str) -> ScrapedContent {
        let mut last_error = String::new();
        for attempt in 0..self.max_retries {
            self.throttle(host).await;

            match self.fetch_once(original_url, resolved_url).await {
                Ok(content) => return content,
                Err(e) => {
                    last_error = e;
                    debug!(
                        "scrape attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        self.max_retries,
                        original_url,
                        last_error
                    );
                }
            }
        }
        ScrapedContent {
            url: original_url.to_string(),
            error: Some(last_error),
            ..Default::default()
        }
    }

    async fn fetch_once(&self, original_url: &str, resolved_url: &str) -> Result<ScrapedContent, String> {
        let response = self
            .client
            .get(resolved_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let html = response.text().await.map_err(|e| e.to_string())?;

        let base = Url::parse(resolved_url).map_err(|e| e.to_string())?;
        let product = readability::extractor::extract(&mut html.as_bytes(), &base)
            .map_err(|e| format!("readability extraction failed: {e}"))?;

        let full_body = clean_body(&html2md::parse_html(&product.content));
        if full_body.is_empty() {
            return Err("empty extracted body".to_string());
        }

        let mut images = extract_images(&html, &base);
        images.truncate(MAX_IMAGES);

        Ok(ScrapedContent {
            url: original_url.to_string(),
            full_body,
            title: if product.title.is_empty() { None } else { Some(product.title) },
            images,
            success: true,
            error: None,
            latency_ms: 0,
        })
    }
}

impl Default for ContentScraper {
    fn default() -> Self {
        ContentScraper::new()
    }
}

/// Unwraps Google News' redirect-wrapped article URLs. The teacher's pack
/// has no `googlenewsdecoder`-equivalent crate; without a real decoder we
/// leave the URL unchanged, matching the original's own "decoder
/// unavailable" fallback path rather than inventing a fake one.
fn resolve_redirect_url(url: &str) -> String {
    if url.contains("news.google.com/rss/articles/") || url.contains("news.google.com/articles/") {
        debug!("google news redirect URL left unresolved (no decoder available): {}", url);
    }
    url.to_string()
}

static WHITESPACE_RUNS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACE_RUNS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static BYLINE_EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w.]+@[\w.]+\.[\w.]+").unwrap());
static RELATED_LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\n\s*-\s*[^\n]+){2,}").unwrap());

static BOILERPLATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)for the full context.{0,40}read the (full )?article").unwrap(),
        Regex::new(r"(?i)see the (full )?article for more details\.?").unwrap(),
        Regex::new(r"(?i)this (summary|content) was generated automatically\.?").unwrap(),
        Regex::new(r"(?i)summarized by ai\.?").unwrap(),
    ]
});

static AD_COPYRIGHT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?im)^Copyright\s*©.*$").unwrap(),
        Regex::new(r"(?im)^All [Rr]ights [Rr]eserved.*$").unwrap(),
        Regex::new(r"(?im)^\s*©\s*\d{4}.*$").unwrap(),
        Regex::new(r"(?im)^\(end\)\s*$").unwrap(),
    ]
});

/// Boilerplate stripping ported from `_clean_body`: whitespace collapse,
/// byline/email removal, related-article list removal, copyright footers.
fn clean_body(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut cleaned = WHITESPACE_RUNS_RE.replace_all(text, "\n\n").into_owned();
    cleaned = SPACE_RUNS_RE.replace_all(&cleaned, " ").into_owned();
    cleaned = BYLINE_EMAIL_RE.replace_all(&cleaned, "").into_owned();
    cleaned = RELATED_LIST_RE.replace_all(&cleaned, "").into_owned();

    for pattern in BOILERPLATE_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    for pattern in AD_COPYRIGHT_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    cleaned = WHITESPACE_RUNS_RE.replace_all(&cleaned, "\n\n").into_owned();
    cleaned.trim().to_string()
}

static IMG_SRC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).unwrap());
static OG_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+property=["']og:image["'][^>]+content=["']([^"']+)["']"#).unwrap()
});

fn extract_images(html: &str, base: &Url) -> Vec<String> {
    let mut seen = Vec::new();
    for re in [&*IMG_SRC_RE, &*OG_IMAGE_RE] {
        for cap in re.captures_iter(html) {
            if let Some(raw) = cap.get(1) {
                if let Some(normalized) = normalize_image_url(raw.as_str(), base) {
                    if is_valid_news_image(&normalized) && !seen.contains(&normalized) {
                        seen.push(normalized);
                    }
                }
            }
        }
    }
    seen
}

fn normalize_image_url(raw: &str, base: &Url) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    if let Some(stripped) = raw.strip_prefix("//") {
        return Some(format!("https://{stripped}"));
    }
    base.join(raw).ok().map(|u| u.to_string())
}

static SIZE_HINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_-](\d+)x(\d+)").unwrap());

const VALID_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];
const EXCLUDED_IMAGE_EXTENSIONS: &[&str] = &[".svg", ".ico", ".cur", ".gif"];
const IMAGE_HOST_HINTS: &[&str] = &["imgnews", "img", "image", "photo", "cdn", "media", "pimg", "dimg"];
const EXCLUDED_URL_PATTERNS: &[&str] = &[
    "icon", "logo", "btn", "button", "badge", "bookmark", "print", "copy",
    "_bg", "bg_", "banner", "ad_", "ads_", "/ad/", "/ads/", "adsense", "advert", "sponsor",
    "pixel", "tracker", "spacer", "blank", "loading", "spinner", "1x1", "1px", "transparent",
    "sprite", "emoji", "placeholder", "avatar", "profile", "journalist", "reporter", "byline",
    "thumb_", "_thumb", "/thumb/", "small_", "_small", "mini_", "_mini",
    "sns", "share", "social", "kakao", "facebook", "twitter", "instagram", "youtube", "tiktok",
    "comment", "reply", "like", "dislike", "vote", "reaction",
    "/related/", "/recommend/", "/popular/",
];

/// Rejects icon/logo/ad/social-button/avatar images and anything below a
/// 100x100 size hint embedded in the URL, per `_is_valid_news_image`.
fn is_valid_news_image(url: &str) -> bool {
    if !url.starts_with("http") {
        return false;
    }
    if url.contains("{{") || url.contains("}}") || url.contains("{%") {
        return false;
    }

    let lower = url.to_lowercase();
    let path = lower.split('?').next().unwrap_or(&lower);

    if EXCLUDED_IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }

    let has_valid_ext = VALID_IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext));
    let is_image_host = IMAGE_HOST_HINTS.iter().any(|hint| lower.contains(hint));
    if !has_valid_ext && !is_image_host {
        return false;
    }

    if EXCLUDED_URL_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        return false;
    }

    if let Some(caps) = SIZE_HINT_RE.captures(&lower) {
        let width: u32 = caps[1].parse().unwrap_or(u32::MAX);
        let height: u32 = caps[2].parse().unwrap_or(u32::MAX);
        if width < 100 || height < 100 {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_scrape_flags_short_bodies_only() {
        let scraper = ContentScraper::new();
        assert!(scraper.should_scrape("too short"));
        assert!(!scraper.should_scrape(&"x".repeat(200)));
    }

    #[test]
    fn clean_body_strips_byline_email_and_copyright() {
        let raw = "Real content here.\n\nreporter@example.com\n\nCopyright © 2026 Example News\nAll Rights Reserved.";
        let cleaned = clean_body(raw);
        assert!(!cleaned.contains("@example.com"));
        assert!(!cleaned.to_lowercase().contains("copyright"));
        assert!(cleaned.contains("Real content here"));
    }

    #[test]
    fn clean_body_collapses_related_article_lists() {
        let raw = "Body text.\n\n- Related one - Outlet A\n- Related two - Outlet B\n- Related three - Outlet C";
        let cleaned = clean_body(raw);
        assert!(!cleaned.contains("Related one"));
    }

    #[test]
    fn valid_news_image_rejects_icons_and_tiny_sizes() {
        assert!(!is_valid_news_image("https://example.test/icon-logo.png"));
        assert!(!is_valid_news_image("https://example.test/photo-50x50.jpg"));
        assert!(is_valid_news_image("https://cdn.example.test/photo-640x480.jpg"));
    }

    #[test]
    fn valid_news_image_rejects_non_image_extensions() {
        assert!(!is_valid_news_image("https://example.test/icon.svg"));
        assert!(!is_valid_news_image("https://example.test/anim.gif"));
    }

    #[test]
    fn normalize_image_url_resolves_relative_paths() {
        let base = Url::parse("https://example.test/articles/1").unwrap();
        assert_eq!(
            normalize_image_url("/img/photo.jpg", &base).unwrap(),
            "https://example.test/img/photo.jpg"
        );
        assert_eq!(
            normalize_image_url("//cdn.example.test/photo.jpg", &base).unwrap(),
            "https://cdn.example.test/photo.jpg"
        );
    }

    #[test]
    fn token_bucket_throttles_when_exhausted() {
        let mut bucket = TokenBucket::new(1.0);
        assert!(bucket.acquire().is_zero());
        assert!(!bucket.acquire().is_zero());
    }
}
