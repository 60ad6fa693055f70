//! Jira REST v2 implementation of [`Backend`].
//!
//! All calls go through one shared `reqwest` client, so connections to a
//! Jira host are pooled across requests. The `Authorization` value supplied
//! by the caller is forwarded as is.

use crate::backend::{Backend, FetchOutcome, Issue, IssueComment};
use crate::config::BackendConfig;
use crate::credentials::Credentials;
use crate::errors::BackendError;
use crate::metrics_defs::BACKEND_REQUEST;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use shared::counter;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

const API_PREFIX: &str = "rest/api/2";

pub struct JiraClient {
    http: Client,
    request_timeout: Duration,
}

impl JiraClient {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            request_timeout: config.request_timeout(),
        })
    }

    fn request(&self, method: Method, credentials: &Credentials, path: &str) -> RequestBuilder {
        self.http
            .request(method, credentials.endpoint(&format!("{API_PREFIX}/{path}")))
            .header(AUTHORIZATION, credentials.authorization())
            .header(ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.request_timeout)
            } else {
                BackendError::Transport(e.to_string())
            }
        })
    }

    /// Runs one backend call under the request timeout. The timeout covers
    /// reading the response body, not only receiving the headers.
    async fn bounded<T>(
        &self,
        call: &'static str,
        fut: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        let result = timeout(self.request_timeout, fut)
            .await
            .unwrap_or(Err(BackendError::Timeout(self.request_timeout)));

        counter!(BACKEND_REQUEST, "call" => call, "outcome" => outcome_label(&result))
            .increment(1);
        result
    }
}

fn outcome_label<T>(result: &Result<T, BackendError>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(BackendError::Status(status)) => status.as_str().to_string(),
        Err(BackendError::Timeout(_)) => "timeout".to_string(),
        Err(BackendError::Transport(_)) => "transport".to_string(),
        Err(BackendError::Decode(_)) => "decode".to_string(),
    }
}

fn expect_success(response: &Response) -> Result<(), BackendError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(BackendError::Status(status))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    response
        .json()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl Backend for JiraClient {
    async fn fetch_issue(&self, credentials: &Credentials, key: &str) -> FetchOutcome {
        tracing::debug!(backend = credentials.host(), issue_key = key, "Fetching issue");

        let result = self
            .bounded("fetch_issue", async {
                let request = self.request(Method::GET, credentials, &format!("issue/{key}"));
                let response = self.send(request).await?;
                match response.status() {
                    StatusCode::NOT_FOUND => Ok(None),
                    status if status.is_success() => {
                        let issue: JiraIssue = decode(response).await?;
                        Ok(Some(Issue::from(issue)))
                    }
                    status => Err(BackendError::Status(status)),
                }
            })
            .await;

        match result {
            Ok(Some(issue)) => FetchOutcome::Success(issue),
            Ok(None) => FetchOutcome::NotFound,
            Err(e) => FetchOutcome::BackendError(e),
        }
    }

    async fn probe_auth(&self, credentials: &Credentials) -> Result<(), BackendError> {
        self.bounded("probe_auth", async {
            let response = self
                .send(self.request(Method::HEAD, credentials, "myself"))
                .await?;
            expect_success(&response)
        })
        .await
    }

    async fn post_comment(
        &self,
        credentials: &Credentials,
        issue_id: &str,
        body: &str,
    ) -> Result<(), BackendError> {
        self.bounded("post_comment", async {
            let request = self
                .request(Method::POST, credentials, &format!("issue/{issue_id}/comment"))
                .json(&CommentRequest { body });
            let response = self.send(request).await?;
            expect_success(&response)
        })
        .await
    }

    async fn add_watcher(
        &self,
        credentials: &Credentials,
        issue_id: &str,
        principal: &str,
    ) -> Result<(), BackendError> {
        self.bounded("add_watcher", async {
            // The watchers endpoint takes a bare JSON string
            let request = self
                .request(Method::POST, credentials, &format!("issue/{issue_id}/watchers"))
                .json(principal);
            let response = self.send(request).await?;
            expect_success(&response)
        })
        .await
    }

    async fn current_principal(&self, credentials: &Credentials) -> Result<String, BackendError> {
        self.bounded("current_principal", async {
            let response = self
                .send(self.request(Method::GET, credentials, "myself"))
                .await?;
            expect_success(&response)?;
            let myself: Myself = decode(response).await?;
            Ok(myself.name)
        })
        .await
    }
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct Myself {
    name: String,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Deserialize)]
struct JiraFields {
    summary: Option<String>,
    description: Option<String>,
    status: Option<Named>,
    priority: Option<Named>,
    project: Option<Named>,
    #[serde(default)]
    components: Vec<Named>,
    reporter: Option<JiraUser>,
    assignee: Option<JiraUser>,
    comment: Option<CommentPage>,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct JiraUser {
    name: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

impl JiraUser {
    fn into_display_name(self) -> Option<String> {
        self.display_name.or(self.name)
    }
}

#[derive(Deserialize)]
struct CommentPage {
    #[serde(default)]
    comments: Vec<JiraComment>,
}

#[derive(Deserialize)]
struct JiraComment {
    author: Option<JiraUser>,
    body: Option<String>,
}

impl From<JiraIssue> for Issue {
    fn from(issue: JiraIssue) -> Self {
        let fields = issue.fields;
        let comments = fields
            .comment
            .map(|page| page.comments)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|comment| {
                Some(IssueComment {
                    author: comment
                        .author
                        .and_then(JiraUser::into_display_name)
                        .unwrap_or_default(),
                    body: comment.body?,
                })
            })
            .collect();

        Issue {
            key: issue.key,
            summary: fields.summary.unwrap_or_default(),
            description: fields.description.filter(|d| !d.trim().is_empty()),
            status: fields.status.map(|s| s.name),
            priority: fields.priority.map(|p| p.name),
            project: fields.project.map(|p| p.name),
            components: fields.components.into_iter().map(|c| c.name).collect(),
            reporter: fields.reporter.and_then(JiraUser::into_display_name),
            assignee: fields.assignee.and_then(JiraUser::into_display_name),
            comments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockJira, MockResponse, issue_json};
    use url::Url;

    fn test_client(timeout_secs: u64) -> JiraClient {
        JiraClient::new(&BackendConfig {
            request_timeout_secs: timeout_secs,
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_issue_success() {
        let jira = MockJira::start(|_, path| match path {
            "/rest/api/2/issue/APF-27" => {
                MockResponse::json(StatusCode::OK, issue_json("APF-27", "Card layout broken"))
            }
            _ => MockResponse::status(StatusCode::NOT_FOUND),
        })
        .await;

        let outcome = test_client(5)
            .fetch_issue(&jira.credentials("Bearer abc"), "APF-27")
            .await;

        let FetchOutcome::Success(issue) = outcome else {
            panic!("expected an issue, got {outcome:?}");
        };
        assert_eq!(issue.key, "APF-27");
        assert_eq!(issue.summary, "Card layout broken");
        assert_eq!(issue.status.as_deref(), Some("In Progress"));
        assert_eq!(issue.project.as_deref(), Some("All Platform"));
        assert_eq!(issue.components, vec!["UI", "Backend"]);
        assert_eq!(issue.reporter.as_deref(), Some("Rob Worsnop"));
        assert_eq!(issue.assignee, None);
        assert_eq!(issue.comments.len(), 2);
        assert_eq!(issue.comments[0].author, "Harsha S");

        let requests = jira.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_fetch_issue_statuses() {
        let jira = MockJira::start(|_, path| match path {
            "/rest/api/2/issue/BOGUS-999" => MockResponse::status(StatusCode::NOT_FOUND),
            "/rest/api/2/issue/POISON-1" => MockResponse::status(StatusCode::INTERNAL_SERVER_ERROR),
            "/rest/api/2/issue/AUTH-1" => MockResponse::status(StatusCode::UNAUTHORIZED),
            _ => MockResponse::json(StatusCode::OK, serde_json::json!({"unexpected": true})),
        })
        .await;
        let client = test_client(5);
        let credentials = jira.credentials("Bearer abc");

        assert!(matches!(
            client.fetch_issue(&credentials, "BOGUS-999").await,
            FetchOutcome::NotFound
        ));
        assert!(matches!(
            client.fetch_issue(&credentials, "POISON-1").await,
            FetchOutcome::BackendError(BackendError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
        assert!(matches!(
            client.fetch_issue(&credentials, "AUTH-1").await,
            FetchOutcome::BackendError(BackendError::Status(StatusCode::UNAUTHORIZED))
        ));
        assert!(matches!(
            client.fetch_issue(&credentials, "GARBLED-1").await,
            FetchOutcome::BackendError(BackendError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_issue_timeout() {
        let jira = MockJira::start(|_, _| {
            MockResponse::json(StatusCode::OK, issue_json("SLOW-1", "slow"))
                .delayed(Duration::from_secs(3))
        })
        .await;

        let outcome = test_client(1)
            .fetch_issue(&jira.credentials("Bearer abc"), "SLOW-1")
            .await;
        assert!(matches!(
            outcome,
            FetchOutcome::BackendError(BackendError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Nothing listens on port 1
        let credentials = Credentials::new(Url::parse("http://127.0.0.1:1").unwrap(), "Bearer abc");
        let result = test_client(5).probe_auth(&credentials).await;
        assert!(matches!(result, Err(BackendError::Transport(_))));
    }

    #[tokio::test]
    async fn test_probe_auth() {
        let jira = MockJira::start(|method, path| {
            assert_eq!(*method, Method::HEAD);
            assert_eq!(path, "/rest/api/2/myself");
            MockResponse::status(StatusCode::OK)
        })
        .await;
        assert!(
            test_client(5)
                .probe_auth(&jira.credentials("Bearer abc"))
                .await
                .is_ok()
        );

        let jira = MockJira::start(|_, _| MockResponse::status(StatusCode::UNAUTHORIZED)).await;
        assert_eq!(
            test_client(5)
                .probe_auth(&jira.credentials("Bearer bogus"))
                .await,
            Err(BackendError::Status(StatusCode::UNAUTHORIZED))
        );
    }

    #[tokio::test]
    async fn test_post_comment() {
        let jira = MockJira::start(|_, _| MockResponse::status(StatusCode::CREATED)).await;

        test_client(5)
            .post_comment(&jira.credentials("Bearer abc"), "1234", "Hello")
            .await
            .unwrap();

        let requests = jira.requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].path, "/rest/api/2/issue/1234/comment");
        assert_eq!(requests[0].body, r#"{"body":"Hello"}"#);
    }

    #[tokio::test]
    async fn test_current_principal_and_add_watcher() {
        let jira = MockJira::start(|method, path| match path {
            "/rest/api/2/myself" if *method == Method::GET => MockResponse::json(
                StatusCode::OK,
                serde_json::json!({"name": "harshas", "displayName": "Harsha S"}),
            ),
            "/rest/api/2/issue/1234/watchers" if *method == Method::POST => {
                MockResponse::status(StatusCode::NO_CONTENT)
            }
            _ => MockResponse::status(StatusCode::NOT_FOUND),
        })
        .await;
        let client = test_client(5);
        let credentials = jira.credentials("Bearer abc");

        let principal = client.current_principal(&credentials).await.unwrap();
        assert_eq!(principal, "harshas");

        client
            .add_watcher(&credentials, "1234", &principal)
            .await
            .unwrap();

        let requests = jira.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].body, r#""harshas""#);
        assert!(
            requests
                .iter()
                .all(|r| r.authorization.as_deref() == Some("Bearer abc"))
        );
    }
}
