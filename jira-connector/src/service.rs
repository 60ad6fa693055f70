use crate::actions;
use crate::aggregator::Aggregator;
use crate::auth::ConnectorAuth;
use crate::cards::{CONNECTOR_NAME, CardContext};
use crate::credentials::{Credentials, required_header};
use crate::errors::ConnectorError;
use crate::extractor::IssueKeyExtractor;
use crate::i18n::Language;
use crate::metrics_defs::REQUEST_DURATION;
use crate::translate::error_response;
use http::header::{ACCEPT_LANGUAGE, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use serde::Deserialize;
use serde_json::json;
use shared::http::{empty_body, full_body, make_json_response};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Public URL prefix the connector is reached under, e.g.
/// `https://hero/connectors/jira/`. Action URLs in cards are built on it.
pub const ROUTING_PREFIX_HEADER: &str = "x-routing-prefix";

const MAX_BODY_BYTES: usize = 1024 * 1024;
const CONNECTOR_IMAGE: &[u8] = include_bytes!("../static/connector.png");

type ConnectorResponse = Response<BoxBody<Bytes, ConnectorError>>;

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Discovery,
    Image,
    Cards,
    Comment(String),
    Watch(String),
    TestAuth,
}

impl Route {
    fn resolve(method: &Method, path: &str) -> Result<Route, ConnectorError> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let (route, allowed) = match segments.as_slice() {
            [""] => (Route::Discovery, Method::GET),
            ["images", "connector.png"] => (Route::Image, Method::GET),
            ["cards", "requests"] => (Route::Cards, Method::POST),
            ["test-auth"] => (Route::TestAuth, Method::HEAD),
            ["api", "v1", "issues", id, action] if is_issue_id(id) => match *action {
                "comment" => (Route::Comment(id.to_string()), Method::POST),
                "watchers" => (Route::Watch(id.to_string()), Method::POST),
                _ => return Err(ConnectorError::NoRouteMatched),
            },
            _ => return Err(ConnectorError::NoRouteMatched),
        };

        if *method != allowed {
            return Err(ConnectorError::MethodNotAllowed);
        }
        Ok(route)
    }

    fn name(&self) -> &'static str {
        match self {
            Route::Discovery => "discovery",
            Route::Image => "image",
            Route::Cards => "cards",
            Route::Comment(_) => "comment",
            Route::Watch(_) => "watch",
            Route::TestAuth => "test_auth",
        }
    }
}

fn is_issue_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[derive(Debug, Deserialize)]
struct CardRequest {
    tokens: Option<CardTokens>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardTokens {
    issue_id: Option<Vec<String>>,
}

/// The connector's HTTP front: authenticates the caller, reads the backend
/// headers and dispatches to the card and action operations.
#[derive(Clone)]
pub struct ConnectorService {
    inner: Arc<Inner>,
}

struct Inner {
    auth: ConnectorAuth,
    aggregator: Aggregator,
    extractor: IssueKeyExtractor,
}

impl ConnectorService {
    pub fn new(auth: ConnectorAuth, aggregator: Aggregator, extractor: IssueKeyExtractor) -> Self {
        Self {
            inner: Arc::new(Inner {
                auth,
                aggregator,
                extractor,
            }),
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> ConnectorResponse
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let start = Instant::now();
        let route = Route::resolve(req.method(), req.uri().path());
        let route_name = route.as_ref().map_or("unknown", Route::name);

        let result = match route {
            Ok(route) => self.dispatch(route, req).await,
            Err(e) => Err(e),
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if matches!(e, ConnectorError::Backend(_) | ConnectorError::InternalError(_)) {
                    tracing::warn!(route = route_name, error = %e, "Request failed");
                } else {
                    tracing::debug!(route = route_name, error = %e, "Request rejected");
                }
                error_response(&e)
            }
        };

        shared::histogram!(
            REQUEST_DURATION,
            "route" => route_name,
            "status" => response.status().as_u16().to_string()
        )
        .record(start.elapsed().as_secs_f64());
        response
    }

    async fn dispatch<B>(
        &self,
        route: Route,
        req: Request<B>,
    ) -> Result<ConnectorResponse, ConnectorError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match route {
            Route::Discovery => Ok(self.discovery(req.headers())),
            Route::Image => Ok(image_response()),
            route => self.authenticated(route, req).await,
        }
    }

    async fn authenticated<B>(
        &self,
        route: Route,
        req: Request<B>,
    ) -> Result<ConnectorResponse, ConnectorError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        // Connector credentials are checked before anything that could reach
        // the backend.
        self.inner.auth.verify(req.headers())?;
        let credentials = Credentials::from_headers(req.headers())?;
        let backend = self.inner.aggregator.backend().as_ref();

        match route {
            Route::Cards => self.cards(req, &credentials).await,
            Route::Comment(issue_id) => {
                let body = read_body(req).await?;
                let comment = form_field(&body, "body").ok_or_else(|| {
                    ConnectorError::BadRequest("Missing form field 'body'".to_string())
                })?;
                actions::add_comment(backend, &credentials, &issue_id, &comment).await?;
                Ok(empty_response(StatusCode::CREATED))
            }
            Route::Watch(issue_id) => {
                actions::add_watcher(backend, &credentials, &issue_id).await?;
                Ok(empty_response(StatusCode::NO_CONTENT))
            }
            Route::TestAuth => {
                actions::probe(backend, &credentials).await?;
                Ok(empty_response(StatusCode::NO_CONTENT))
            }
            Route::Discovery | Route::Image => Err(ConnectorError::NoRouteMatched),
        }
    }

    async fn cards<B>(
        &self,
        req: Request<B>,
        credentials: &Credentials,
    ) -> Result<ConnectorResponse, ConnectorError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let routing_prefix = required_header(req.headers(), ROUTING_PREFIX_HEADER)?.to_string();
        let language = Language::from_accept_language(
            req.headers()
                .get(ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok()),
        );

        let body = read_body(req).await?;
        let request: CardRequest = serde_json::from_slice(&body)
            .map_err(|e| ConnectorError::BadRequest(format!("Invalid card request: {e}")))?;

        let listed = request.tokens.and_then(|tokens| tokens.issue_id);
        if listed.is_none() && request.text.is_none() {
            return Err(ConnectorError::BadRequest(
                "Card request needs tokens.issue_id or text".to_string(),
            ));
        }

        let mut keys = listed.unwrap_or_default();
        if let Some(text) = &request.text {
            keys.extend(self.inner.extractor.extract(text));
        }
        // Keys end up in backend URL paths and action URLs
        keys.retain(|key| is_issue_id(key));
        tracing::debug!(keys = keys.len(), backend = credentials.host(), "Card request");

        let ctx = CardContext {
            base_url: credentials.base_url(),
            routing_prefix: &routing_prefix,
            language,
        };
        let cards = self.inner.aggregator.cards(keys, credentials, &ctx).await?;
        let cards = serde_json::to_value(&cards)
            .map_err(|e| ConnectorError::InternalError(e.to_string()))?;

        Ok(make_json_response(StatusCode::OK, &json!({ "cards": cards })))
    }

    fn discovery(&self, headers: &HeaderMap) -> ConnectorResponse {
        let prefix = headers
            .get(ROUTING_PREFIX_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|p| p.trim_end_matches('/').to_string() + "/")
            .unwrap_or_else(|| "/".to_string());

        make_json_response(
            StatusCode::OK,
            &json!({
                "name": CONNECTOR_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "image": {"href": format!("{prefix}images/connector.png")},
                "test_auth": {"href": format!("{prefix}test-auth")},
                "object_types": {
                    "card": {
                        "fields": {
                            "issue_id": {
                                "regex": self.inner.extractor.pattern(),
                                "capture_group": 1
                            }
                        },
                        "href": format!("{prefix}cards/requests")
                    }
                },
                "actions": {
                    "comment": {"href": format!("{prefix}api/v1/issues/{{issue_id}}/comment")},
                    "watch": {"href": format!("{prefix}api/v1/issues/{{issue_id}}/watchers")}
                }
            }),
        )
    }
}

async fn read_body<B>(req: Request<B>) -> Result<Bytes, ConnectorError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                ConnectorError::PayloadTooLarge(MAX_BODY_BYTES)
            } else {
                ConnectorError::BadRequest(format!("Could not read request body: {e}"))
            }
        })
}

fn form_field(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.trim().is_empty())
}

fn image_response() -> ConnectorResponse {
    let mut response = Response::new(full_body(CONNECTOR_IMAGE));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
    response
}

fn empty_response(status: StatusCode) -> ConnectorResponse {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}

impl Service<Request<Incoming>> for ConnectorService {
    type Response = ConnectorResponse;
    type Error = ConnectorError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
