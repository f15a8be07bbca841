//! Error types for the saved-state sync engine.

use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The request never produced a response (CORS, offline, aborted).
    #[error("network request failed: {0}")]
    Network(String),

    /// The remote side answered with a non-success status, typically an
    /// auth rejection when credentials have not been captured yet.
    #[error("remote returned status {0}")]
    Status(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A browser API call threw.
    #[error("browser API error: {0}")]
    Js(String),

    #[error("invalid settings: {0}")]
    Config(String),
}

impl SyncError {
    pub fn from_js(value: JsValue) -> Self {
        let message = value
            .as_string()
            .or_else(|| {
                js_sys::JSON::stringify(&value)
                    .ok()
                    .and_then(|s| s.as_string())
            })
            .unwrap_or_else(|| format!("{value:?}"));
        SyncError::Js(message)
    }
}

impl From<serde_wasm_bindgen::Error> for SyncError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        SyncError::Js(err.to_string())
    }
}
