//! Passive capture of the web player's own API credentials.

use serde::{Deserialize, Serialize};

/// Tokens the remote API expects on every query.
///
/// Stored under `authToken`/`clientToken` in extension storage.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        self.auth_token.is_some() && self.client_token.is_some()
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HttpHeader {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl HttpHeader {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }
}

/// Accumulates tokens seen on requests to the query endpoint.
#[derive(Debug, Default)]
pub struct CredentialCapture {
    endpoint: String,
    current: Credentials,
    persisted: Option<Credentials>,
}

impl CredentialCapture {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn current(&self) -> &Credentials {
        &self.current
    }

    /// Records tokens carried by one outgoing request.
    ///
    /// Returns the pair to persist once both tokens are known and the pair
    /// differs from the last one returned.
    pub fn observe(&mut self, url: &str, headers: &[HttpHeader]) -> Option<Credentials> {
        if !url.contains(&self.endpoint) {
            return None;
        }

        for header in headers {
            let Some(value) = header.value.as_deref() else {
                continue;
            };
            if header.name.eq_ignore_ascii_case("authorization") {
                if let Some(token) = strip_bearer(value) {
                    self.current.auth_token = Some(token.to_string());
                }
            } else if header.name.eq_ignore_ascii_case("client-token") {
                self.current.client_token = Some(value.to_string());
            }
        }

        if !self.current.is_complete() || self.persisted.as_ref() == Some(&self.current) {
            return None;
        }
        self.persisted = Some(self.current.clone());
        self.persisted.clone()
    }
}

fn strip_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
