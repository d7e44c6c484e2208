#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),
    #[error("Invalid language spec {language}: {reason}")]
    InvalidLanguage { language: String, reason: String },
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
