use crate::config::AuthConfig;
use crate::errors::ConnectorError;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use std::collections::HashSet;

/// Checks the bearer token callers of the connector present.
#[derive(Clone)]
pub struct ConnectorAuth {
    tokens: HashSet<String>,
}

impl ConnectorAuth {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            tokens: config.tokens.iter().map(|t| t.trim().to_string()).collect(),
        }
    }

    pub fn verify(&self, headers: &HeaderMap) -> Result<(), ConnectorError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(ConnectorError::MissingConnectorCredential)?
            .to_str()
            .map_err(|_| ConnectorError::InvalidConnectorCredential)?;

        let token = value
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .ok_or(ConnectorError::InvalidConnectorCredential)?;

        if token.is_empty() {
            return Err(ConnectorError::MissingConnectorCredential);
        }
        if !self.tokens.contains(token) {
            return Err(ConnectorError::InvalidConnectorCredential);
        }
        Ok(())
    }
}
