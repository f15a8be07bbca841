//! Background wiring: credential capture and the signal relay.

use std::cell::RefCell;

use leptos::task::spawn_local;

use crate::credentials::CredentialCapture;
use crate::error::Result;
use crate::relay::classify_request;
use crate::web::browser;

pub async fn run() -> Result<()> {
    let config = browser::load_config().await;

    let capture = RefCell::new(CredentialCapture::new(config.api.query_endpoint.clone()));
    browser::observe_request_headers(&config.api.host_pattern, move |details| {
        let Some(credentials) = capture
            .borrow_mut()
            .observe(&details.url, &details.request_headers)
        else {
            return;
        };
        spawn_local(async move {
            if let Err(err) = browser::store_credentials(&credentials).await {
                log::warn!("could not store credentials: {err}");
            }
        });
    })?;

    let operations = config.operations;
    browser::observe_request_bodies(&config.api.host_pattern, move |details, body| {
        if details.tab_id < 0 {
            return;
        }
        let signal = match classify_request(&details.url, body.as_deref(), &operations) {
            Ok(Some(signal)) => signal,
            Ok(None) => return,
            Err(err) => {
                log::warn!("unreadable request body for {}: {err}", details.url);
                return;
            }
        };
        let tab_id = details.tab_id;
        spawn_local(async move {
            // The tab may have no content script (yet); nothing to do then.
            if let Err(err) = browser::send_to_tab(tab_id, signal).await {
                log::debug!("tab {tab_id} did not take {signal:?}: {err}");
            }
        });
    })?;

    log::info!("watching {}", config.api.host_pattern);
    Ok(())
}
