//! Browser side: WebExtension bindings and the two entry points.

pub mod background;
pub mod browser;
pub mod content;
pub mod observer;
pub mod page;
pub mod transport;

use std::future::Future;

use leptos::task::{spawn_local, Executor};
use wasm_bindgen::prelude::*;

use crate::error::Result;

fn launch(context: &'static str, run: impl Future<Output = Result<()>> + 'static) {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
    if Executor::init_wasm_bindgen().is_err() {
        log::debug!("task executor already initialized");
    }
    spawn_local(async move {
        if let Err(err) = run.await {
            log::error!("{context} failed to start: {err}");
        }
    });
}

#[wasm_bindgen]
pub fn start_content_script() {
    launch("content script", content::run());
}

#[wasm_bindgen]
pub fn start_background() {
    launch("background", background::run());
}
