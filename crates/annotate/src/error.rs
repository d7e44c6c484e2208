use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error while scanning: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tag key pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
