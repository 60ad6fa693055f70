use crate::extractor::{DEFAULT_ISSUE_PATTERN, IssueKeyExtractor};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("At least one connector auth token is required")]
    NoAuthTokens,

    #[error("Connector auth tokens cannot be empty")]
    EmptyAuthToken,

    #[error("Backend request timeout cannot be 0")]
    InvalidTimeout,

    #[error("Backend fetch concurrency cannot be 0")]
    InvalidConcurrency,

    #[error("Invalid issue pattern: {0}")]
    InvalidIssuePattern(#[from] regex::Error),
}

/// Jira connector configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for card and action requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    /// Bearer tokens accepted from callers of the connector
    pub auth: AuthConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

impl Config {
    /// Validates the connector configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.auth.validate()?;
        self.backend.validate()?;
        self.extractor.build()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, PartialEq)]
pub struct AuthConfig {
    pub tokens: Vec<String>,
}

impl AuthConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.tokens.is_empty() {
            return Err(ValidationError::NoAuthTokens);
        }
        if self.tokens.iter().any(|token| token.trim().is_empty()) {
            return Err(ValidationError::EmptyAuthToken);
        }
        Ok(())
    }
}

// Tokens are secrets; config gets logged at startup.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tokens", &format_args!("[{} redacted]", self.tokens.len()))
            .finish()
    }
}

/// Settings for calls to the issue tracker
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Upper bound for one backend call, including reading the response body
    pub request_timeout_secs: u64,
    /// Process-wide limit on issue fetches running at the same time
    pub max_concurrent_fetches: usize,
    /// Idle connections kept per backend host in the shared pool
    pub pool_max_idle_per_host: usize,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ValidationError::InvalidConcurrency);
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            max_concurrent_fetches: 8,
            pool_max_idle_per_host: 16,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Regex locating issue keys in free text. The first capture group, if
    /// any, is taken as the key.
    pub issue_pattern: String,
}

impl ExtractorConfig {
    pub fn build(&self) -> Result<IssueKeyExtractor, ValidationError> {
        Ok(IssueKeyExtractor::new(&self.issue_pattern)?)
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            issue_pattern: DEFAULT_ISSUE_PATTERN.to_string(),
        }
    }
}
