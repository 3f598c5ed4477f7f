//! Dot-addressed pipeline configuration.
//!
//! Mirrors `news_collector/utils/config_manager.py`: a TOML manifest loaded
//! once at startup, every key overridable by a `NEWS_COLLECTOR_`-prefixed
//! environment variable (path joined with `_`, uppercased). Missing file is
//! not an error — the pipeline falls back to `PipelineConfig::default()`.

const ENV_PREFIX: &str = "NEWS_COLLECTOR_";

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DefaultsConfig {
    pub locale: String,
    pub timezone: String,
    pub country: String,
    pub language: String,
    pub limit: usize,
    pub offset: usize,
    pub popularity_type: String,
    pub group_by: String,
    pub diversity: bool,
    pub verified_sources_only: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            locale: "en_US".to_string(),
            timezone: "UTC".to_string(),
            country: "US".to_string(),
            language: "en".to_string(),
            limit: 20,
            offset: 0,
            popularity_type: "latest".to_string(),
            group_by: "none".to_string(),
            diversity: true,
            verified_sources_only: false,
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SourceDiversityConfig {
    pub max_same_source_in_top_n: usize,
}

impl Default for SourceDiversityConfig {
    fn default() -> Self {
        SourceDiversityConfig {
            max_same_source_in_top_n: 3,
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ScoringConfig {
    pub integrity_threshold: f64,
    pub credibility_threshold: f64,
    pub source_diversity: SourceDiversityConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            integrity_threshold: 0.5,
            credibility_threshold: 0.6,
            source_diversity: SourceDiversityConfig::default(),
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SourceManagementConfig {
    pub max_consecutive_failures: u32,
}

impl Default for SourceManagementConfig {
    fn default() -> Self {
        SourceManagementConfig {
            max_consecutive_failures: 5,
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub defaults: DefaultsConfig,
    pub scoring: ScoringConfig,
    pub source_management: SourceManagementConfig,
}

/// Loads `newscred.toml` from a handful of candidate paths, applying
/// `NEWS_COLLECTOR_`-prefixed env var overrides over every leaf afterward.
///
/// Search order (first found wins): `./newscred.toml`, `../newscred.toml`,
/// `NEWSCRED_CONFIG` env var path. Missing file or parse error both fall
/// back silently to `PipelineConfig::default()` — a configuration error
/// never prevents the pipeline from running, per the error-handling design.
pub fn load_pipeline_config() -> PipelineConfig {
    let mut candidates = vec![
        std::path::PathBuf::from("newscred.toml"),
        std::path::PathBuf::from("../newscred.toml"),
    ];
    if let Ok(env_path) = std::env::var("NEWSCRED_CONFIG") {
        candidates.insert(0, std::path::PathBuf::from(env_path));
    }

    let mut config = 'load: {
        for path in &candidates {
            let Ok(contents) = std::fs::read_to_string(path) else {
                continue;
            };
            match toml::from_str::<PipelineConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("loaded pipeline config from {}", path.display());
                    break 'load cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "failed to parse {}: {} — falling back to defaults",
                        path.display(),
                        e
                    );
                    break 'load PipelineConfig::default();
                }
            }
        }
        PipelineConfig::default()
    };

    apply_env_overrides(&mut config);
    config
}

fn env_override(path: &str) -> Option<String> {
    let key = format!("{ENV_PREFIX}{}", path.to_uppercase().replace('.', "_"));
    std::env::var(key).ok()
}

macro_rules! override_parsed {
    ($field:expr, $path:expr) => {
        if let Some(v) = env_override($path) {
            match v.parse() {
                Ok(parsed) => $field = parsed,
                Err(_) => tracing::warn!("ignoring malformed env override for {}", $path),
            }
        }
    };
}

fn apply_env_overrides(config: &mut PipelineConfig) {
    override_parsed!(config.defaults.locale, "defaults.locale");
    override_parsed!(config.defaults.timezone, "defaults.timezone");
    override_parsed!(config.defaults.country, "defaults.country");
    override_parsed!(config.defaults.language, "defaults.language");
    override_parsed!(config.defaults.limit, "defaults.limit");
    override_parsed!(config.defaults.offset, "defaults.offset");
    override_parsed!(config.defaults.popularity_type, "defaults.popularity_type");
    override_parsed!(config.defaults.group_by, "defaults.group_by");
    override_parsed!(config.defaults.diversity, "defaults.diversity");
    override_parsed!(
        config.defaults.verified_sources_only,
        "defaults.verified_sources_only"
    );
    override_parsed!(
        config.scoring.integrity_threshold,
        "scoring.integrity_threshold"
    );
    override_parsed!(
        config.scoring.credibility_threshold,
        "scoring.credibility_threshold"
    );
    override_parsed!(
        config.scoring.source_diversity.max_same_source_in_top_n,
        "scoring.source_diversity.max_same_source_in_top_n"
    );
    override_parsed!(
        config.source_management.max_consecutive_failures,
        "source_management.max_consecutive_failures"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.scoring.source_diversity.max_same_source_in_top_n, 3);
        assert_eq!(cfg.source_management.max_consecutive_failures, 5);
    }

    #[test]
    fn env_override_wins_over_file_default() {
        std::env::set_var("NEWS_COLLECTOR_SCORING_INTEGRITY_THRESHOLD", "0.75");
        let mut cfg = PipelineConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.scoring.integrity_threshold, 0.75);
        std::env::remove_var("NEWS_COLLECTOR_SCORING_INTEGRITY_THRESHOLD");
    }
}
