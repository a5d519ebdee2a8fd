use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lookup request failed: HTTP {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("{0}")]
    InvalidResponse(String),

    #[error("Must provide valid app privacy policy url to create a consent form: {0}")]
    InvalidPrivacyUrl(String),

    #[error("At least one publisher id is required")]
    NoPublisherIds,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ConsentError>;
