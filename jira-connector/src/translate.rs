//! Rendering of connector errors into HTTP responses.
//!
//! Every failure the connector reports goes through [`error_response`].

use crate::errors::{BackendError, ConnectorError};
use http::{HeaderValue, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use serde_json::json;
use shared::http::{make_boxed_error_response, make_json_response};

/// Carries the status code the issue tracker answered with.
pub const BACKEND_STATUS_HEADER: &str = "x-backend-status";

pub fn error_response<E>(error: &ConnectorError) -> Response<BoxBody<Bytes, E>>
where
    E: Send + 'static,
{
    match error {
        ConnectorError::MissingConnectorCredential
        | ConnectorError::InvalidConnectorCredential => {
            make_json_response(StatusCode::UNAUTHORIZED, &json!({"error": "unauthorized"}))
        }
        ConnectorError::MissingRequestHeader(_)
        | ConnectorError::InvalidRequestHeader(..)
        | ConnectorError::BadRequest(_) => make_json_response(
            StatusCode::BAD_REQUEST,
            &json!({"message": error.to_string()}),
        ),
        ConnectorError::Backend(backend) => backend_error_response(backend),
        ConnectorError::PayloadTooLarge(_) => {
            make_boxed_error_response(StatusCode::PAYLOAD_TOO_LARGE)
        }
        ConnectorError::NoRouteMatched => make_boxed_error_response(StatusCode::NOT_FOUND),
        ConnectorError::MethodNotAllowed => {
            make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED)
        }
        ConnectorError::InvalidConfig(_)
        | ConnectorError::HttpClientError(_)
        | ConnectorError::InternalError(_)
        | ConnectorError::Io(_) => make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn backend_error_response<E>(error: &BackendError) -> Response<BoxBody<Bytes, E>>
where
    E: Send + 'static,
{
    let mut response = match error {
        // The caller's Jira credentials were rejected; this is their mistake,
        // not an upstream outage.
        BackendError::Status(StatusCode::UNAUTHORIZED) => make_json_response(
            StatusCode::BAD_REQUEST,
            &json!({"error": "invalid_connector_token"}),
        ),
        BackendError::Status(status) if status.is_client_error() || status.is_server_error() => {
            make_boxed_error_response(*status)
        }
        // Redirects and other oddities the client did not follow
        BackendError::Status(_) => make_boxed_error_response(StatusCode::BAD_GATEWAY),
        BackendError::Timeout(_) => make_boxed_error_response(StatusCode::GATEWAY_TIMEOUT),
        BackendError::Transport(_) | BackendError::Decode(_) => {
            make_boxed_error_response(StatusCode::BAD_GATEWAY)
        }
    };

    if let Some(status) = error.backend_status() {
        response
            .headers_mut()
            .insert(BACKEND_STATUS_HEADER, HeaderValue::from(status.as_u16()));
    }
    response
}
