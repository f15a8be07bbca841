use gloo_net::http::Request;
use serde_json::Value;
use web_sys::{RequestCredentials, RequestMode};

use crate::client::Transport;
use crate::error::{Result, SyncError};

/// `fetch` with the page's cookies, as the web player itself sends it.
pub struct FetchTransport;

fn network(err: gloo_net::Error) -> SyncError {
    SyncError::Network(err.to_string())
}

impl Transport for FetchTransport {
    async fn post_query(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<Value> {
        let mut builder = Request::post(endpoint)
            .credentials(RequestCredentials::Include)
            .mode(RequestMode::Cors);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).map_err(network)?.send().await.map_err(network)?;
        if !response.ok() {
            return Err(SyncError::Status(response.status()));
        }

        let text = response.text().await.map_err(network)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
