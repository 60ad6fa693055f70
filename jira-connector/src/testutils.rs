use crate::backend::{Backend, FetchOutcome, Issue};
use crate::credentials::Credentials;
use crate::errors::BackendError;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// What the mock Jira answers for one request
pub struct MockResponse {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// In-process HTTP server standing in for a Jira instance
pub struct MockJira {
    pub base_url: Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockJira {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Method, &str) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let respond = Arc::new(respond);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let respond = respond.clone();
                let recorded = recorded.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let respond = respond.clone();
                        let recorded = recorded.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes())
                                .unwrap_or_default();
                            let path = parts.uri.path().to_string();

                            recorded.lock().unwrap().push(RecordedRequest {
                                method: parts.method.clone(),
                                path: path.clone(),
                                authorization: parts
                                    .headers
                                    .get(AUTHORIZATION)
                                    .and_then(|v| v.to_str().ok())
                                    .map(str::to_string),
                                body: String::from_utf8_lossy(&body).into_owned(),
                            });

                            let mock = respond(&parts.method, &path);
                            if !mock.delay.is_zero() {
                                tokio::time::sleep(mock.delay).await;
                            }

                            let mut response = Response::new(Full::new(Bytes::from(mock.body)));
                            *response.status_mut() = mock.status;
                            response
                                .headers_mut()
                                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        Self {
            base_url: Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            requests,
        }
    }

    pub fn credentials(&self, authorization: &str) -> Credentials {
        Credentials::new(self.base_url.clone(), authorization)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Jira REST v2 representation of an issue, trimmed to the fields the
/// connector reads.
pub fn issue_json(key: &str, summary: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "10027",
        "key": key,
        "fields": {
            "summary": summary,
            "description": "Steps to reproduce are in the attachment.",
            "status": {"name": "In Progress"},
            "priority": {"name": "Major"},
            "project": {"key": "APF", "name": "All Platform"},
            "components": [{"name": "UI"}, {"name": "Backend"}],
            "reporter": {"name": "rob", "displayName": "Rob Worsnop"},
            "assignee": null,
            "comment": {
                "comments": [
                    {"author": {"name": "harshas", "displayName": "Harsha S"}, "body": "First"},
                    {"author": {"name": "rob", "displayName": "Rob Worsnop"}, "body": "Second"}
                ]
            }
        }
    })
}

/// In-memory tracker with scripted outcomes per issue key. Keys without a
/// script are not found.
#[derive(Default)]
pub struct FakeBackend {
    issues: HashMap<String, (FetchOutcome, Duration)>,
    action_error: Option<BackendError>,
    inflight: AtomicUsize,
    max_inflight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(self, key: &str, delay: Duration) -> Self {
        let issue = Issue {
            key: key.to_string(),
            summary: format!("Summary of {key}"),
            ..Default::default()
        };
        self.with_outcome(key, FetchOutcome::Success(issue), delay)
    }

    pub fn with_outcome(mut self, key: &str, outcome: FetchOutcome, delay: Duration) -> Self {
        self.issues.insert(key.to_string(), (outcome, delay));
        self
    }

    /// Makes probe, comment, watcher and principal calls fail.
    pub fn failing_actions(mut self, error: BackendError) -> Self {
        self.action_error = Some(error);
        self
    }

    pub fn max_inflight(&self) -> usize {
        self.max_inflight.load(Ordering::SeqCst)
    }

    /// Every call made, in order, e.g. `fetch APF-1` or `watch APF-1 rob`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(call);
        match &self.action_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_issue(&self, _credentials: &Credentials, key: &str) -> FetchOutcome {
        self.calls.lock().unwrap().push(format!("fetch {key}"));
        let current = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight.fetch_max(current, Ordering::SeqCst);

        let (outcome, delay) = self
            .issues
            .get(key)
            .cloned()
            .unwrap_or((FetchOutcome::NotFound, Duration::ZERO));
        tokio::time::sleep(delay).await;

        self.inflight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn probe_auth(&self, _credentials: &Credentials) -> Result<(), BackendError> {
        self.record("probe".to_string())
    }

    async fn post_comment(
        &self,
        _credentials: &Credentials,
        issue_id: &str,
        body: &str,
    ) -> Result<(), BackendError> {
        self.record(format!("comment {issue_id} {body}"))
    }

    async fn add_watcher(
        &self,
        _credentials: &Credentials,
        issue_id: &str,
        principal: &str,
    ) -> Result<(), BackendError> {
        self.record(format!("watch {issue_id} {principal}"))
    }

    async fn current_principal(&self, _credentials: &Credentials) -> Result<String, BackendError> {
        self.record("myself".to_string())?;
        Ok("rob".to_string())
    }
}

pub fn fake_credentials() -> Credentials {
    Credentials::new(Url::parse("https://jira.acme.com").unwrap(), "Bearer abc")
}
