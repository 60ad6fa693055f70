use crate::errors::ConnectorError;
use http::HeaderMap;
use std::fmt;
use url::Url;

/// Value of the `Authorization` header to send to Jira, e.g. `Bearer abc`
pub const AUTHORIZATION_HEADER: &str = "x-jira-authorization";
/// Base URL of the Jira instance, e.g. `https://jira.acme.com`
pub const BASE_URL_HEADER: &str = "x-jira-base-url";

/// Per-request backend address and authorization.
///
/// Built from the inbound headers of one request and dropped with it. The
/// authorization value never shows up in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    base_url: Url,
    authorization: String,
}

impl Credentials {
    pub fn new(base_url: Url, authorization: impl Into<String>) -> Self {
        Self {
            base_url,
            authorization: authorization.into(),
        }
    }

    /// Reads the backend headers. When several are missing, the authorization
    /// header is the one reported.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ConnectorError> {
        let authorization = required_header(headers, AUTHORIZATION_HEADER)?;
        let base_url = required_header(headers, BASE_URL_HEADER)?;

        let base_url = Url::parse(base_url).map_err(|e| {
            ConnectorError::InvalidRequestHeader(BASE_URL_HEADER, e.to_string())
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConnectorError::InvalidRequestHeader(
                BASE_URL_HEADER,
                format!("unsupported scheme {}", base_url.scheme()),
            ));
        }
        // Paths are appended to the base URL as text
        if base_url.query().is_some() || base_url.fragment().is_some() {
            return Err(ConnectorError::InvalidRequestHeader(
                BASE_URL_HEADER,
                "query and fragment are not allowed".to_string(),
            ));
        }

        Ok(Self::new(base_url, authorization))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    /// Host of the backend, used to identify it in logs
    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or("unknown")
    }

    /// Absolute URL of `path` below the base URL, keeping any path prefix the
    /// base URL carries (Jira is often served under `/jira`).
    pub fn endpoint(&self, path: &str) -> String {
        join_url(self.base_url.as_str(), path)
    }
}

/// Joins `base` and `path` with exactly one `/` between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url.as_str())
            .field("authorization", &"<redacted>")
            .finish()
    }
}

/// Returns the value of a header that must be present and non-empty.
pub fn required_header<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<&'a str, ConnectorError> {
    let value = headers
        .get(name)
        .ok_or(ConnectorError::MissingRequestHeader(name))?
        .to_str()
        .map_err(|e| ConnectorError::InvalidRequestHeader(name, e.to_string()))?
        .trim();

    if value.is_empty() {
        return Err(ConnectorError::MissingRequestHeader(name));
    }
    Ok(value)
}
