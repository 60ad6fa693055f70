//! Single-call operations on one issue.

use crate::backend::Backend;
use crate::credentials::Credentials;
use crate::errors::ConnectorError;

pub async fn add_comment(
    backend: &dyn Backend,
    credentials: &Credentials,
    issue_id: &str,
    body: &str,
) -> Result<(), ConnectorError> {
    if body.trim().is_empty() {
        return Err(ConnectorError::BadRequest(
            "Comment body cannot be empty".to_string(),
        ));
    }
    backend.post_comment(credentials, issue_id, body).await?;
    tracing::info!(issue_key = issue_id, backend = credentials.host(), "Comment added");
    Ok(())
}

/// Jira's watcher API wants a user name, so the caller's own is looked up
/// first.
pub async fn add_watcher(
    backend: &dyn Backend,
    credentials: &Credentials,
    issue_id: &str,
) -> Result<(), ConnectorError> {
    let principal = backend.current_principal(credentials).await?;
    backend.add_watcher(credentials, issue_id, &principal).await?;
    tracing::info!(issue_key = issue_id, backend = credentials.host(), "Watcher added");
    Ok(())
}

pub async fn probe(backend: &dyn Backend, credentials: &Credentials) -> Result<(), ConnectorError> {
    backend.probe_auth(credentials).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BackendError;
    use crate::testutils::{FakeBackend, fake_credentials};
    use http::StatusCode;

    #[tokio::test]
    async fn test_add_watcher_resolves_principal_first() {
        let backend = FakeBackend::new();
        add_watcher(&backend, &fake_credentials(), "APF-27")
            .await
            .unwrap();
        assert_eq!(backend.calls(), vec!["myself", "watch APF-27 rob"]);
    }

    #[tokio::test]
    async fn test_add_watcher_stops_when_principal_fails() {
        let backend = FakeBackend::new()
            .failing_actions(BackendError::Status(StatusCode::UNAUTHORIZED));
        let err = add_watcher(&backend, &fake_credentials(), "APF-27")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Backend(BackendError::Status(StatusCode::UNAUTHORIZED))
        ));
        assert_eq!(backend.calls(), vec!["myself"]);
    }

    #[tokio::test]
    async fn test_empty_comment_is_rejected_before_backend() {
        let backend = FakeBackend::new();
        let err = add_comment(&backend, &fake_credentials(), "APF-27", "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::BadRequest(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_probe() {
        let backend = FakeBackend::new();
        probe(&backend, &fake_credentials()).await.unwrap();

        let backend =
            FakeBackend::new().failing_actions(BackendError::Status(StatusCode::FORBIDDEN));
        assert!(probe(&backend, &fake_credentials()).await.is_err());
    }
}
