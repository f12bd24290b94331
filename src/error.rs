use thiserror::Error;

/// Failures that leave the core. Malformed month labels and unknown scope IDs
/// are recovered locally and never show up here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read data source: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed CSV in data source: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to fetch snapshot: {0}")]
    Fetch(String),
    #[error("region directory unavailable: {0}")]
    Directory(String),
    #[error("access denied for regions: {}", regions.join(", "))]
    Unauthorized { regions: Vec<String> },
}

pub type Result<T> = std::result::Result<T, Error>;
