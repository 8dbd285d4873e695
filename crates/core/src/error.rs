use thiserror::Error;

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Run-level failures. Record-level problems never surface here; they are
/// collected as [`crate::types::RecordRejection`] entries instead.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Empty batch: no valid records after normalization ({rejected} rejected)")]
    EmptyBatch { rejected: usize },

    #[error("Orphan reference: outlet '{outlet_id}' in {category} is not in the normalized record set")]
    OrphanReference { category: String, outlet_id: String },

    #[error("Analysis timed out after {0} ms")]
    Timeout(u64),

    #[error("Classification worker failed: {0}")]
    Worker(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
