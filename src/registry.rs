//! C1: Source Registry.
//!
//! Loads a declarative manifest once at startup and serves as the single
//! piece of mutable shared state in the pipeline. Ported from
//! `news_collector/registry/source_registry.py`: reads are lock-free over an
//! immutable snapshot plus per-source health behind a `RwLock`, mirroring
//! `AppState`'s use of `tokio::sync::{Semaphore, Mutex}` for shared runtime
//! state.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::core::types::{Category, IngestionKind, SourceDescriptor, Tier, TierDefinition};

/// On-disk shape of the source manifest (see `manifests/sources.example.toml`).
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    sources: Vec<SourceDescriptor>,
    #[serde(default)]
    tier_definitions: HashMap<String, TierDefinition>,
}

#[derive(Debug, Default, Clone)]
pub struct RegistryStats {
    pub tier_counts: BTreeMap<String, usize>,
    pub kind_counts: BTreeMap<String, usize>,
}

/// Value-semantic table of sources behind a narrow read/write interface.
/// Reads (`get`, `get_active_sources`, `select_sources`, ...) take a shared
/// lock; the three health-tracking mutators take an exclusive one. A
/// missing manifest yields an empty registry — every operation returns
/// empty results rather than erroring, per the configuration-error design.
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, SourceDescriptor>>,
    tier_definitions: HashMap<String, TierDefinition>,
    max_consecutive_failures: u32,
}

impl SourceRegistry {
    pub fn empty(max_consecutive_failures: u32) -> Self {
        SourceRegistry {
            sources: RwLock::new(HashMap::new()),
            tier_definitions: HashMap::new(),
            max_consecutive_failures,
        }
    }

    /// Loads the manifest at `path`. A missing or unparseable file logs a
    /// warning and returns an empty registry, never an error — manifest
    /// trouble is a configuration error, not a connector/request failure.
    pub fn load_from_path(path: &std::path::Path, max_consecutive_failures: u32) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    "source manifest {} not readable ({}); starting with empty registry",
                    path.display(),
                    e
                );
                return Self::empty(max_consecutive_failures);
            }
        };

        match toml::from_str::<Manifest>(&contents) {
            Ok(manifest) => {
                let mut sources = HashMap::new();
                for source in manifest.sources {
                    sources.insert(source.id.clone(), source);
                }
                tracing::info!(
                    "loaded {} sources from {}",
                    sources.len(),
                    path.display()
                );
                SourceRegistry {
                    sources: RwLock::new(sources),
                    tier_definitions: manifest.tier_definitions,
                    max_consecutive_failures,
                }
            }
            Err(e) => {
                tracing::warn!(
                    "failed to parse source manifest {}: {} — starting with empty registry",
                    path.display(),
                    e
                );
                Self::empty(max_consecutive_failures)
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<SourceDescriptor> {
        self.sources.read().await.get(id).cloned()
    }

    pub fn get_tier_definition(&self, tier: &str) -> Option<&TierDefinition> {
        self.tier_definitions.get(tier)
    }

    pub async fn get_all(&self) -> Vec<SourceDescriptor> {
        self.sources.read().await.values().cloned().collect()
    }

    pub async fn get_active_sources(&self) -> Vec<SourceDescriptor> {
        self.sources
            .read()
            .await
            .values()
            .filter(|s| s.is_active && s.tier != Tier::Blacklist)
            .cloned()
            .collect()
    }

    pub async fn get_by_tier(&self, tier: Tier) -> Vec<SourceDescriptor> {
        self.sources
            .read()
            .await
            .values()
            .filter(|s| s.tier == tier)
            .cloned()
            .collect()
    }

    pub async fn get_by_ingestion_kind(&self, kind: IngestionKind) -> Vec<SourceDescriptor> {
        self.sources
            .read()
            .await
            .values()
            .filter(|s| s.ingestion_kind == kind)
            .cloned()
            .collect()
    }

    pub async fn get_by_category(&self, category: Category) -> Vec<SourceDescriptor> {
        self.sources
            .read()
            .await
            .values()
            .filter(|s| {
                s.supported_categories.is_empty() || s.supported_categories.contains(&category)
            })
            .cloned()
            .collect()
    }

    pub async fn get_by_locale(&self, locale: &str) -> Vec<SourceDescriptor> {
        self.sources
            .read()
            .await
            .values()
            .filter(|s| s.supported_locales.is_empty() || s.supported_locales.contains(locale))
            .cloned()
            .collect()
    }

    /// Verified = whitelist ∪ tier1.
    pub async fn get_verified_sources(&self) -> Vec<SourceDescriptor> {
        self.sources
            .read()
            .await
            .values()
            .filter(|s| matches!(s.tier, Tier::Whitelist | Tier::Tier1))
            .cloned()
            .collect()
    }

    /// Selection contract (spec.md §4.1): active, non-blacklisted sources
    /// whose supported-category set intersects `categories` (empty means
    /// category-agnostic, always included), whose supported-locale set
    /// contains `locale` (when given), and whose kind matches `kind` (when
    /// given). Sorted by descending base credibility, ties broken by id.
    pub async fn select_sources(
        &self,
        categories: &[Category],
        locale: Option<&str>,
        verified_only: bool,
        kind: Option<IngestionKind>,
    ) -> Vec<SourceDescriptor> {
        let mut selected: Vec<SourceDescriptor> = self
            .sources
            .read()
            .await
            .values()
            .filter(|s| s.is_active && s.tier != Tier::Blacklist)
            .filter(|s| {
                categories.is_empty()
                    || s.supported_categories.is_empty()
                    || categories
                        .iter()
                        .any(|c| s.supported_categories.contains(c))
            })
            .filter(|s| match locale {
                Some(loc) => s.supported_locales.is_empty() || s.supported_locales.contains(loc),
                None => true,
            })
            .filter(|s| !verified_only || matches!(s.tier, Tier::Whitelist | Tier::Tier1))
            .filter(|s| kind.map(|k| s.ingestion_kind == k).unwrap_or(true))
            .cloned()
            .collect();

        selected.sort_by(|a, b| {
            b.credibility_base_score
                .partial_cmp(&a.credibility_base_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        selected
    }

    /// Resets the failure counter and bumps both timestamps. No-op for
    /// unknown ids.
    pub async fn record_success(&self, id: &str) {
        let mut sources = self.sources.write().await;
        if let Some(source) = sources.get_mut(id) {
            let now = Utc::now();
            source.failure_count = 0;
            source.last_crawled = Some(now);
            source.last_success = Some(now);
        }
    }

    /// Increments the failure counter, auto-deactivating once it reaches
    /// `max_consecutive_failures`. No-op for unknown ids.
    pub async fn record_failure(&self, id: &str) {
        let mut sources = self.sources.write().await;
        if let Some(source) = sources.get_mut(id) {
            source.failure_count += 1;
            source.last_crawled = Some(Utc::now());
            if source.failure_count >= self.max_consecutive_failures {
                source.is_active = false;
                tracing::warn!(
                    source_id = id,
                    failures = source.failure_count,
                    "auto-deactivating source after consecutive failures"
                );
            }
        }
    }

    /// Restores `is_active` and zeroes the failure counter. Fails (returns
    /// `false`) for blacklisted sources or unknown ids.
    pub async fn reactivate(&self, id: &str) -> bool {
        let mut sources = self.sources.write().await;
        match sources.get_mut(id) {
            Some(source) if source.tier != Tier::Blacklist => {
                source.is_active = true;
                source.failure_count = 0;
                true
            }
            _ => false,
        }
    }

    pub async fn get_stats(&self) -> RegistryStats {
        let sources = self.sources.read().await;
        let mut stats = RegistryStats::default();
        for source in sources.values() {
            *stats.tier_counts.entry(source.tier.to_string()).or_insert(0) += 1;
            let kind = match source.ingestion_kind {
                IngestionKind::Rss => "rss",
                IngestionKind::Api => "api",
                IngestionKind::WebCrawl => "web_crawl",
            };
            *stats.kind_counts.entry(kind.to_string()).or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn source(id: &str, tier: Tier, credibility: f64) -> SourceDescriptor {
        SourceDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            ingestion_kind: IngestionKind::Rss,
            base_url: "https://example.test/feed".to_string(),
            default_locale: "en_US".to_string(),
            supported_locales: BTreeSet::new(),
            supported_categories: BTreeSet::new(),
            tier,
            credibility_base_score: credibility,
            rate_limit: Default::default(),
            crawl_delay_seconds: 1,
            user_agent: "test-agent".to_string(),
            provides_metadata: Default::default(),
            is_active: true,
            last_crawled: None,
            last_success: None,
            failure_count: 0,
        }
    }

    #[tokio::test]
    async fn selection_sorts_by_descending_credibility_then_id() {
        let registry = SourceRegistry::empty(5);
        {
            let mut sources = registry.sources.write().await;
            sources.insert("b".into(), source("b", Tier::Tier1, 80.0));
            sources.insert("a".into(), source("a", Tier::Tier1, 80.0));
            sources.insert("c".into(), source("c", Tier::Whitelist, 95.0));
        }
        let selected = registry.select_sources(&[], None, false, None).await;
        let ids: Vec<&str> = selected.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn auto_deactivates_after_threshold() {
        let registry = SourceRegistry::empty(3);
        {
            let mut sources = registry.sources.write().await;
            sources.insert("x".into(), source("x", Tier::Tier2, 70.0));
        }
        registry.record_failure("x").await;
        registry.record_failure("x").await;
        assert!(registry.get("x").await.unwrap().is_active);
        registry.record_failure("x").await;
        assert!(!registry.get("x").await.unwrap().is_active);

        let selected = registry.select_sources(&[], None, false, None).await;
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn reactivate_fails_for_blacklist() {
        let registry = SourceRegistry::empty(5);
        {
            let mut sources = registry.sources.write().await;
            sources.insert("bad".into(), source("bad", Tier::Blacklist, 0.0));
        }
        assert!(!registry.reactivate("bad").await);
    }

    #[tokio::test]
    async fn operations_are_noop_for_unknown_ids() {
        let registry = SourceRegistry::empty(5);
        registry.record_success("ghost").await;
        registry.record_failure("ghost").await;
        assert!(!registry.reactivate("ghost").await);
        assert!(registry.get("ghost").await.is_none());
    }
}
