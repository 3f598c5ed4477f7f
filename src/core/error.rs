use thiserror::Error;

/// Errors that can cross the pipeline boundary. Everything else (connector
/// failures, malformed records, scraper errors) is recovered locally and
/// never reaches a caller — see the error handling notes in each module.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0:?}")]
    InvalidRequest(Vec<String>),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
