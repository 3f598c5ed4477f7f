pub mod connectors;
pub mod core;
pub mod dedup;
pub mod ingestion;
pub mod integrity;
pub mod normalize;
pub mod pipeline;
pub mod ranker;
pub mod registry;
pub mod scoring;
pub mod scraper;

pub use core::config::PipelineConfig;
pub use core::error::{PipelineError, PipelineResult};
pub use core::types;
pub use core::types::*;
pub use registry::SourceRegistry;
