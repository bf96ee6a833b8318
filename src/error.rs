use thiserror::Error;

/// Main error type for the radar
#[derive(Error, Debug)]
pub enum RadarError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market data errors
    #[error("Market data provider error: {0}")]
    Provider(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // Enrichment errors (whale analyzer, advisor)
    #[error("Enrichment failed: {service} - {reason}")]
    Enrichment { service: String, reason: String },

    // Notification errors
    #[error("Notification failed: {0}")]
    Notification(String),

    // Persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Unsupported state version: found {found}, expected {expected}")]
    StateVersion { found: u32, expected: u32 },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Scheduler errors
    #[error("Scanner channel closed")]
    ChannelClosed,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RadarError {
    /// Provider failures abort a cycle but never the scheduler
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            RadarError::Provider(_) | RadarError::Http(_) | RadarError::RateLimited(_)
        )
    }

    pub fn enrichment(service: &str, reason: impl std::fmt::Display) -> Self {
        RadarError::Enrichment {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for RadarError
pub type Result<T> = std::result::Result<T, RadarError>;
