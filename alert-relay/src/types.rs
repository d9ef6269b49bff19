// Use the interfaces crate for core types
pub use interfaces::defs::{
    AlertRecord, NewAlertSet, Notification, SourceDescriptor, SourceKind, TriggerResponse,
    WatermarkMap, WatermarkUpdateSet,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Alert-Relay/1.0".to_string(),
            timeout_seconds: 30,
            max_redirects: 5,
        }
    }
}

/// Raw response of one feed request, before any interpretation.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub content_type: Option<String>,
    /// HTTP status; anything outside 2xx makes the payload unusable.
    pub status: u16,
    pub body: String,
}

impl FetchedPayload {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false)
    }
}

/// Result of fetching and normalizing one source. A failed source is
/// `NoData`; it never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Records(Vec<AlertRecord>),
    NoData,
}

impl FeedOutcome {
    pub fn records(&self) -> &[AlertRecord] {
        match self {
            FeedOutcome::Records(records) => records,
            FeedOutcome::NoData => &[],
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, FeedOutcome::NoData)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Watermark store error: {0}")]
    Watermark(String),

    #[error("Notification error: {0}")]
    Notify(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
