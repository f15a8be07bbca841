//! Bindings to the `browser.*` WebExtension API.

use js_sys::{Array, Reflect, Uint8Array};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::config::{SyncConfig, SETTINGS_STORAGE_KEY};
use crate::credentials::{Credentials, HttpHeader};
use crate::error::{Result, SyncError};
use crate::relay::RelaySignal;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["browser", "storage", "local"], js_name = get, catch)]
    async fn storage_local_get(keys: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["browser", "storage", "local"], js_name = set, catch)]
    async fn storage_local_set(items: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["browser", "runtime"], js_name = getURL)]
    pub fn runtime_get_url(path: &str) -> String;

    #[wasm_bindgen(js_namespace = ["browser", "runtime", "onMessage"], js_name = addListener)]
    fn runtime_on_message(listener: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(js_namespace = ["browser", "tabs"], js_name = sendMessage, catch)]
    async fn tabs_send_message(tab_id: i32, message: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["browser", "webRequest", "onBeforeSendHeaders"], js_name = addListener)]
    fn on_before_send_headers(listener: &Closure<dyn FnMut(JsValue)>, filter: JsValue, extra_info: Array);

    #[wasm_bindgen(js_namespace = ["browser", "webRequest", "onBeforeRequest"], js_name = addListener)]
    fn on_before_request(listener: &Closure<dyn FnMut(JsValue)>, filter: JsValue, extra_info: Array);
}

#[derive(Serialize)]
struct RequestFilter<'a> {
    urls: [&'a str; 1],
}

/// The subset of webRequest details the background reads.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub url: String,
    #[serde(default = "no_tab")]
    pub tab_id: i32,
    #[serde(default)]
    pub request_headers: Vec<HttpHeader>,
}

fn no_tab() -> i32 {
    -1
}

pub async fn load_credentials() -> Result<Credentials> {
    let keys = Array::of2(&"authToken".into(), &"clientToken".into());
    let stored = storage_local_get(keys.into())
        .await
        .map_err(SyncError::from_js)?;
    Ok(serde_wasm_bindgen::from_value(stored)?)
}

pub async fn store_credentials(credentials: &Credentials) -> Result<()> {
    let items = serde_wasm_bindgen::to_value(credentials)?;
    storage_local_set(items).await.map_err(SyncError::from_js)?;
    Ok(())
}

/// Reads the optional settings override; anything unusable means defaults.
pub async fn load_config() -> SyncConfig {
    let raw = match storage_local_get(SETTINGS_STORAGE_KEY.into()).await {
        Ok(stored) => Reflect::get(&stored, &SETTINGS_STORAGE_KEY.into())
            .ok()
            .and_then(|value| value.as_string()),
        Err(err) => {
            log::warn!("could not read settings: {}", SyncError::from_js(err));
            None
        }
    };
    SyncConfig::from_json_or_default(raw.as_deref())
}

/// Registers `handler` for relay messages; other messages are ignored.
pub fn on_relay_signal(mut handler: impl FnMut(RelaySignal) + 'static) {
    let listener = Closure::<dyn FnMut(JsValue)>::new(move |message: JsValue| {
        if let Ok(signal) = serde_wasm_bindgen::from_value::<RelaySignal>(message) {
            handler(signal);
        }
    });
    runtime_on_message(&listener);
    listener.forget();
}

pub async fn send_to_tab(tab_id: i32, signal: RelaySignal) -> Result<()> {
    let message = serde_wasm_bindgen::to_value(&signal)?;
    tabs_send_message(tab_id, message)
        .await
        .map_err(SyncError::from_js)?;
    Ok(())
}

fn request_filter(host_pattern: &str) -> Result<JsValue> {
    Ok(serde_wasm_bindgen::to_value(&RequestFilter {
        urls: [host_pattern],
    })?)
}

/// Observes request headers without blocking the request.
pub fn observe_request_headers(
    host_pattern: &str,
    mut handler: impl FnMut(RequestDetails) + 'static,
) -> Result<()> {
    let listener = Closure::<dyn FnMut(JsValue)>::new(move |details: JsValue| {
        match serde_wasm_bindgen::from_value::<RequestDetails>(details) {
            Ok(details) => handler(details),
            Err(err) => log::warn!("unreadable request details: {err}"),
        }
    });
    on_before_send_headers(
        &listener,
        request_filter(host_pattern)?,
        Array::of1(&"requestHeaders".into()),
    );
    listener.forget();
    Ok(())
}

/// Observes request bodies without blocking the request. The handler gets
/// the details and the raw body bytes, if the request had any.
pub fn observe_request_bodies(
    host_pattern: &str,
    mut handler: impl FnMut(RequestDetails, Option<Vec<u8>>) + 'static,
) -> Result<()> {
    let listener = Closure::<dyn FnMut(JsValue)>::new(move |details: JsValue| {
        let body = raw_body(&details);
        match serde_wasm_bindgen::from_value::<RequestDetails>(details) {
            Ok(details) => handler(details, body),
            Err(err) => log::warn!("unreadable request details: {err}"),
        }
    });
    on_before_request(
        &listener,
        request_filter(host_pattern)?,
        Array::of1(&"requestBody".into()),
    );
    listener.forget();
    Ok(())
}

fn raw_body(details: &JsValue) -> Option<Vec<u8>> {
    let body = Reflect::get(details, &"requestBody".into()).ok()?;
    if body.is_undefined() || body.is_null() {
        return None;
    }
    let parts: Array = Reflect::get(&body, &"raw".into()).ok()?.dyn_into().ok()?;
    let mut bytes = Vec::new();
    for part in parts.iter() {
        let chunk = Reflect::get(&part, &"bytes".into()).ok()?;
        if chunk.is_undefined() {
            continue;
        }
        bytes.extend(Uint8Array::new(&chunk).to_vec());
    }
    Some(bytes)
}
