//! Content-script wiring: page observers → debounced passes → hearts.

use std::rc::Rc;

use leptos::task::spawn_local;

use crate::error::Result;
use crate::reconciler::{Reconciler, SyncContext};
use crate::relay::RelaySignal;
use crate::web::browser;
use crate::web::observer::{BrowserDebouncer, BrowserTimers, ChangeDetector};
use crate::web::page::PageView;
use crate::web::transport::FetchTransport;

pub async fn run() -> Result<()> {
    let config = browser::load_config().await;
    let delay = config.debounce_ms;
    let ctx = Rc::new(SyncContext::new(config));
    let reconciler = Rc::new(Reconciler::new(Rc::clone(&ctx), FetchTransport));
    let page = Rc::new(PageView::new(Rc::clone(&reconciler)));

    let rows = {
        let page = Rc::clone(&page);
        Rc::new(BrowserDebouncer::new(BrowserTimers, delay, move || {
            spawn_local(rows_pass(Rc::clone(&page)));
        }))
    };
    let now_playing = {
        let page = Rc::clone(&page);
        Rc::new(BrowserDebouncer::new(BrowserTimers, delay, move || {
            spawn_local(now_playing_pass(Rc::clone(&page), false));
        }))
    };

    let detector = ChangeDetector::new(&ctx.config, Rc::clone(&rows), Rc::clone(&now_playing))?;
    detector.start()?;

    browser::on_relay_signal(move |signal| match signal {
        RelaySignal::ReconcileNeeded => rows.trigger(),
        RelaySignal::RefreshNeeded => {
            if reconciler.on_refresh_signal() {
                rows.trigger();
                now_playing.cancel();
                spawn_local(now_playing_pass(Rc::clone(&page), true));
            }
        }
    });

    log::info!("content script ready");
    Ok(())
}

/// Credentials may have been refreshed by the background since last time.
async fn sync_credentials(ctx: &SyncContext) {
    ctx.reload_credentials(browser::load_credentials()).await;
}

async fn rows_pass(page: Rc<PageView>) {
    sync_credentials(page.reconciler().context()).await;
    let report = page.reconciler().reconcile_rows(&*page).await;
    log::debug!("reconcile pass finished: {report:?}");
}

async fn now_playing_pass(page: Rc<PageView>, bypass_cache: bool) {
    sync_credentials(page.reconciler().context()).await;
    page.reconciler()
        .reconcile_now_playing(&*page, bypass_cache)
        .await;
}
