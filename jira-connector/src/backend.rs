use crate::credentials::Credentials;
use crate::errors::BackendError;
use async_trait::async_trait;

/// An issue as fetched from the tracker, reduced to what a card displays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub project: Option<String>,
    pub components: Vec<String>,
    pub reporter: Option<String>,
    pub assignee: Option<String>,
    /// Oldest first, as the tracker returns them
    pub comments: Vec<IssueComment>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IssueComment {
    pub author: String,
    pub body: String,
}

/// Result of fetching one issue.
///
/// `NotFound` covers both a missing issue and one the caller cannot see.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Success(Issue),
    NotFound,
    BackendError(BackendError),
}

/// The calls the connector makes against the issue tracker.
///
/// Every call is a single logical request made with the caller's credentials.
/// Implementations bound each call in time and report expiry as
/// [`BackendError::Timeout`]; they never retry.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_issue(&self, credentials: &Credentials, key: &str) -> FetchOutcome;

    /// Checks that the credentials are accepted.
    async fn probe_auth(&self, credentials: &Credentials) -> Result<(), BackendError>;

    async fn post_comment(
        &self,
        credentials: &Credentials,
        issue_id: &str,
        body: &str,
    ) -> Result<(), BackendError>;

    async fn add_watcher(
        &self,
        credentials: &Credentials,
        issue_id: &str,
        principal: &str,
    ) -> Result<(), BackendError>;

    /// Name of the user the credentials belong to.
    async fn current_principal(&self, credentials: &Credentials) -> Result<String, BackendError>;
}
