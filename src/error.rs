//! Error types for Review Harvest.

/// Top-level error type for the campaign engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Customer store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Customer not found: {id}")]
    NotFound { id: i64 },

    #[error("Duplicate customer: phone {phone} already exists for user {user_id}")]
    Duplicate { user_id: i64, phone: String },
}

/// Browser session errors.
///
/// `Blocked` is the one fatal-for-session condition: it must propagate up to
/// the orchestrator and stop the campaign. Everything else the session
/// absorbs into negative returns (false / None).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Chat surface block indicator detected: {indicator}")]
    Blocked { indicator: String },

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("Session not connected")]
    NotConnected,
}

impl From<thirtyfour::error::WebDriverError> for SessionError {
    fn from(e: thirtyfour::error::WebDriverError) -> Self {
        SessionError::WebDriver(e.to_string())
    }
}

/// Messaging provider errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Provider operation not implemented: {operation}. {hint}")]
    NotImplemented { operation: String, hint: String },

    #[error("Provider not connected")]
    NotConnected,
}

impl ProviderError {
    /// True when the underlying cause is the fatal block indicator.
    pub fn is_blocked(&self) -> bool {
        matches!(self, ProviderError::Session(SessionError::Blocked { .. }))
    }
}

/// Result type alias for the campaign engine.
pub type Result<T> = std::result::Result<T, Error>;
