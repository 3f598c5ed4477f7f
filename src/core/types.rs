use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed category vocabulary. Callers filtering by category must match one
/// of these exactly; the normalizer's keyword dictionary maps onto the same
/// set (see `normalize::infer_category`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Politics,
    Economy,
    Society,
    It,
    Science,
    Culture,
    Sports,
    International,
    Entertainment,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Politics => "politics",
            Category::Economy => "economy",
            Category::Society => "society",
            Category::It => "it",
            Category::Science => "science",
            Category::Culture => "culture",
            Category::Sports => "sports",
            Category::International => "international",
            Category::Entertainment => "entertainment",
        };
        f.write_str(s)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "politics" => Ok(Category::Politics),
            "economy" => Ok(Category::Economy),
            "society" => Ok(Category::Society),
            "it" => Ok(Category::It),
            "science" => Ok(Category::Science),
            "culture" => Ok(Category::Culture),
            "sports" => Ok(Category::Sports),
            "international" => Ok(Category::International),
            "entertainment" => Ok(Category::Entertainment),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Coarse credibility class assigned to a source in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Whitelist,
    Tier1,
    Tier2,
    Tier3,
    Blacklist,
}

impl Tier {
    /// Tier -> weight mapping used by the ranker's source-trust fallback.
    /// Distinct from `scoring::credibility`'s own tier_scores table (see
    /// DESIGN.md — the two mappings are intentionally independent, mirroring
    /// the two separate tables in the observed source).
    pub fn weight(self) -> f64 {
        match self {
            Tier::Whitelist => 1.00,
            Tier::Tier1 => 0.95,
            Tier::Tier2 => 0.80,
            Tier::Tier3 => 0.60,
            Tier::Blacklist => 0.00,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Whitelist => "whitelist",
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
            Tier::Tier3 => "tier3",
            Tier::Blacklist => "blacklist",
        };
        f.write_str(s)
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whitelist" => Ok(Tier::Whitelist),
            "tier1" => Ok(Tier::Tier1),
            "tier2" => Ok(Tier::Tier2),
            "tier3" => Ok(Tier::Tier3),
            "blacklist" => Ok(Tier::Blacklist),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionKind {
    Rss,
    Api,
    WebCrawl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPreset {
    Quality,
    Trending,
    Credible,
    Latest,
}

impl Default for RankingPreset {
    fn default() -> Self {
        RankingPreset::Quality
    }
}

impl FromStr for RankingPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quality" => Ok(RankingPreset::Quality),
            "trending" => Ok(RankingPreset::Trending),
            "credible" => Ok(RankingPreset::Credible),
            "latest" => Ok(RankingPreset::Latest),
            other => Err(format!("unknown ranking preset: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    None,
    Day,
    Source,
}

impl Default for GroupBy {
    fn default() -> Self {
        GroupBy::None
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(GroupBy::None),
            "day" => Ok(GroupBy::Day),
            "source" => Ok(GroupBy::Source),
            other => Err(format!("unknown group_by: {other}")),
        }
    }
}

/// Ported from `QuerySpec` in the original source. Immutable after
/// construction; invalid field combinations are reported by `validate()`
/// rather than by panicking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub locale: String,
    pub country: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub category: Vec<Category>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub preset: RankingPreset,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub verified_sources_only: bool,
    #[serde(default = "default_true")]
    pub diversity: bool,
}

fn default_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        RequestDescriptor {
            date_from: None,
            date_to: None,
            locale: "en_US".to_string(),
            country: None,
            language: None,
            category: Vec::new(),
            keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            preset: RankingPreset::default(),
            group_by: GroupBy::default(),
            limit: default_limit(),
            offset: 0,
            verified_sources_only: false,
            diversity: true,
        }
    }
}

impl RequestDescriptor {
    /// Returns every violated invariant; empty means the request is valid.
    /// Ported from `QuerySpec.validate()` — collects all failures instead of
    /// raising on the first one, so the caller sees the complete picture.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.limit == 0 || self.limit > 100 {
            violations.push(format!("limit must be in 1..=100, got {}", self.limit));
        }
        if self.keywords.len() > 10 {
            violations.push(format!(
                "keywords must have at most 10 entries, got {}",
                self.keywords.len()
            ));
        }
        if self.category.len() > 5 {
            violations.push(format!(
                "category must have at most 5 entries, got {}",
                self.category.len()
            ));
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                violations.push(format!("date_from ({from}) must be <= date_to ({to})"));
            }
        }

        violations
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub daily_quota: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        RateLimit {
            requests_per_minute: 60,
            requests_per_hour: 1000,
            daily_quota: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ProvidesMetadata {
    #[serde(default)]
    pub author: bool,
    #[serde(default)]
    pub views: bool,
    #[serde(default)]
    pub shares: bool,
    #[serde(default)]
    pub comments: bool,
    #[serde(default = "default_true")]
    pub publish_date: bool,
}

/// Loaded once from the source manifest at startup; mutable runtime fields
/// (`is_active`, `failure_count`, the two timestamps) are owned and mutated
/// exclusively by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub ingestion_kind: IngestionKind,
    pub base_url: String,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default)]
    pub supported_locales: BTreeSet<String>,
    #[serde(default)]
    pub supported_categories: BTreeSet<Category>,
    pub tier: Tier,
    #[serde(default = "default_credibility_base")]
    pub credibility_base_score: f64,
    #[serde(default)]
    pub rate_limit: RateLimit,
    #[serde(default = "default_crawl_delay")]
    pub crawl_delay_seconds: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub provides_metadata: ProvidesMetadata,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub last_crawled: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_count: u32,
}

fn default_locale() -> String {
    "en_US".to_string()
}

fn default_credibility_base() -> f64 {
    70.0
}

fn default_crawl_delay() -> u32 {
    1
}

fn default_user_agent() -> String {
    "newscred-pipeline/0.1".to_string()
}

/// Tier -> {description, base credibility, weight}, loaded from the
/// manifest's separate tier-definition block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierDefinition {
    pub description: String,
    #[serde(default = "default_credibility_base")]
    pub base_credibility: f64,
    #[serde(default = "default_tier_weight")]
    pub weight: f64,
}

fn default_tier_weight() -> f64 {
    0.8
}

/// The output of a connector, before normalization. `raw_payload` carries
/// whatever provider-specific fields didn't make it into a named field.
#[derive(Debug, Clone)]
pub struct RawArticleRecord {
    pub id: String,
    pub source_id: String,
    pub source_name: String,
    pub raw_payload: HashMap<String, String>,
    pub raw_html: Option<String>,
    pub extracted_text: Option<String>,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub http_status: Option<u16>,
    pub response_latency_ms: Option<u64>,
    pub language_hint: Option<String>,
    pub title_hint: Option<String>,
    pub summary_hint: Option<String>,
    pub published_hint: Option<String>,
    pub author_hint: Option<String>,
    pub category_hint: Option<String>,
    pub tier_hint: Option<Tier>,
    pub view_count: Option<u64>,
    pub share_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub like_count: Option<u64>,
}

impl RawArticleRecord {
    /// Stable content id: a hash of `source_id + url`, mirroring
    /// `RawNewsRecord.__post_init__`'s MD5-of-identity scheme.
    pub fn content_id(source_id: &str, url: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        source_id.hash(&mut hasher);
        url.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// Canonical article representation shared by every stage from the
/// normalizer onward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedArticle {
    pub id: Uuid,
    pub raw_record_id: String,
    pub source_id: String,
    pub source_name: String,
    pub source_tier: Tier,
    pub title: String,
    pub body: String,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub language: String,
    pub country: String,
    pub category: Option<Category>,
    pub tags: Vec<String>,
    pub url: String,
    pub image_urls: Vec<String>,
    pub view_count: Option<u64>,
    pub share_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub like_count: Option<u64>,
    pub crawled_at: DateTime<Utc>,
    pub normalized_at: DateTime<Utc>,
    pub cluster_id: Option<Uuid>,
}

/// A normalized article extended with every per-axis score computed by
/// C6-C9, then filled in by the ranker with `final_score`/`rank_position`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: NormalizedArticle,

    pub integrity_score: f64,
    pub title_body_consistency: f64,
    pub contamination_score: f64,
    pub spam_score: f64,
    pub integrity_flags: BTreeSet<String>,

    pub credibility_score: f64,
    pub quality_score: f64,
    pub evidence_score: f64,
    pub sensationalism_penalty: f64,

    pub popularity_score: f64,
    pub trending_velocity: f64,

    pub relevance_score: f64,

    pub final_score: f64,
    pub rank_position: Option<usize>,
    pub policy_flags: BTreeSet<String>,
}
