//! The host page: reading track rows and painting heart toggles into them.

use std::rc::Rc;

use leptos::prelude::document;
use leptos::task::spawn_local;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement, HtmlImageElement, MouseEvent};

use crate::config::{Selectors, SyncConfig};
use crate::dom::SectionKind;
use crate::error::{Result, SyncError};
use crate::reconciler::{Reconciler, TrackRow, TrackView};
use crate::toggle::{HeartIcon, ToggleKind, ToggleState, ToggleVisual};
use crate::track::TrackId;
use crate::web::browser;
use crate::web::transport::FetchTransport;

const ATTR_TRACK: &str = "data-track-uri";
const ATTR_SAVED: &str = "data-heart-saved";
const ATTR_KIND: &str = "data-heart-kind";

pub type PageReconciler = Reconciler<FetchTransport>;

/// A row (or the now-playing widget) and the native add control inside it.
#[derive(Clone, Debug)]
pub struct RowHandle {
    pub host: Element,
    pub add_control: Element,
}

#[derive(Clone, Debug)]
struct IconUrls {
    saved: String,
    unsaved: String,
}

impl IconUrls {
    fn url(&self, icon: HeartIcon) -> &str {
        match icon {
            HeartIcon::Filled => &self.saved,
            HeartIcon::Outline => &self.unsaved,
        }
    }
}

pub struct PageView {
    reconciler: Rc<PageReconciler>,
    icons: Rc<IconUrls>,
}

impl PageView {
    pub fn new(reconciler: Rc<PageReconciler>) -> Self {
        let config = &reconciler.context().config;
        let icons = IconUrls {
            saved: browser::runtime_get_url(&config.icons.saved),
            unsaved: browser::runtime_get_url(&config.icons.unsaved),
        };
        Self {
            reconciler,
            icons: Rc::new(icons),
        }
    }

    pub fn reconciler(&self) -> &Rc<PageReconciler> {
        &self.reconciler
    }

    fn config(&self) -> &SyncConfig {
        &self.reconciler.context().config
    }

    fn paint_heart(&self, row: &TrackRow<RowHandle>, state: ToggleState) -> Result<()> {
        let RowHandle { host, add_control } = &row.handle;
        hide_native_control(add_control)?;

        let selector = format!(".{}", self.config().icons.class_name);
        let heart = match host.query_selector(&selector).map_err(SyncError::from_js)? {
            Some(existing) => existing
                .dyn_into::<HtmlImageElement>()
                .map_err(|_| SyncError::Js(format!("{selector} is not an image")))?,
            None => self.create_heart(&row.handle, state.kind)?,
        };

        write_state(&heart, &row.track_id, state)?;
        apply_visual(&heart, state.visual(is_hovered(host)), &self.icons)
    }

    fn create_heart(&self, handle: &RowHandle, kind: ToggleKind) -> Result<HtmlImageElement> {
        let heart = document()
            .create_element("img")
            .map_err(SyncError::from_js)?
            .dyn_into::<HtmlImageElement>()
            .map_err(|_| SyncError::Js("created element is not an image".to_string()))?;
        heart.set_class_name(&self.config().icons.class_name);

        let style = heart.style();
        let placement: &[(&str, &str)] = match kind {
            ToggleKind::Row => &[("position", "absolute"), ("right", "90px")],
            ToggleKind::NowPlaying => &[("margin-right", "8px")],
        };
        for (name, value) in placement
            .iter()
            .chain(&[("width", "19px"), ("height", "18px"), ("cursor", "pointer")])
        {
            style.set_property(name, value).map_err(SyncError::from_js)?;
        }

        let parent = handle
            .add_control
            .parent_element()
            .ok_or_else(|| SyncError::Js("add control has no parent".to_string()))?;
        parent.prepend_with_node_1(&heart).map_err(SyncError::from_js)?;

        self.wire_click(&heart, &handle.host)?;
        if kind == ToggleKind::Row {
            wire_hover(&heart, &handle.host, &self.icons)?;
        }
        Ok(heart)
    }

    fn wire_click(&self, heart: &HtmlImageElement, host: &Element) -> Result<()> {
        let reconciler = Rc::clone(&self.reconciler);
        let icons = Rc::clone(&self.icons);
        let target = heart.clone();
        let host = host.clone();
        let on_click = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
            event.stop_propagation();
            on_heart_click(&reconciler, &target, &host, &icons);
        });
        heart
            .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
            .map_err(SyncError::from_js)?;
        on_click.forget();
        Ok(())
    }
}

impl TrackView for PageView {
    type Row = RowHandle;

    fn visible_rows(&self) -> Vec<TrackRow<RowHandle>> {
        let config = self.config();
        let selectors = &config.selectors;
        let Some(section) = current_section(selectors) else {
            return Vec::new();
        };
        let Ok(rows) = section.query_selector_all(&selectors.track_row) else {
            return Vec::new();
        };

        (0..rows.length())
            .filter_map(|idx| rows.item(idx))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .filter_map(|host| {
                let link = find(&host, &selectors.track_link)?;
                let add_control = find(&host, &selectors.add_control)?;
                let track_id =
                    TrackId::from_href(&link.get_attribute("href")?, &config.track_query_keys)?;
                Some(TrackRow {
                    handle: RowHandle { host, add_control },
                    track_id,
                })
            })
            .collect()
    }

    fn now_playing(&self) -> Option<TrackRow<RowHandle>> {
        let config = self.config();
        let selectors = &config.selectors;
        let host = document().query_selector(&selectors.now_playing).ok().flatten()?;
        let link = find(&host, &selectors.now_playing_link)?;
        let add_control = find(&host, &selectors.now_playing_add_control)?;
        let track_id = TrackId::from_href(&link.get_attribute("href")?, &config.track_query_keys)?;
        Some(TrackRow {
            handle: RowHandle { host, add_control },
            track_id,
        })
    }

    fn paint(&self, row: &TrackRow<RowHandle>, state: ToggleState) {
        if let Err(err) = self.paint_heart(row, state) {
            log::warn!("could not paint heart for {}: {err}", row.track_id);
        }
    }
}

/// The first supported section present on the page.
pub fn current_section(selectors: &Selectors) -> Option<Element> {
    let document = document();
    SectionKind::ALL
        .into_iter()
        .find_map(|kind| document.query_selector(kind.selector(selectors)).ok().flatten())
}

fn find(root: &Element, selector: &str) -> Option<Element> {
    root.query_selector(selector).ok().flatten()
}

fn is_hovered(host: &Element) -> bool {
    host.matches(":hover").unwrap_or(false)
}

/// The native control stays in the DOM; the host page still owns it.
fn hide_native_control(control: &Element) -> Result<()> {
    let Some(control) = control.dyn_ref::<HtmlElement>() else {
        return Ok(());
    };
    let style = control.style();
    style.set_property("opacity", "0").map_err(SyncError::from_js)?;
    style
        .set_property("pointer-events", "none")
        .map_err(SyncError::from_js)?;
    Ok(())
}

fn write_state(heart: &HtmlImageElement, track_id: &TrackId, state: ToggleState) -> Result<()> {
    heart
        .set_attribute(ATTR_TRACK, track_id.as_str())
        .map_err(SyncError::from_js)?;
    heart
        .set_attribute(ATTR_KIND, state.kind.as_attr())
        .map_err(SyncError::from_js)?;
    heart
        .set_attribute(ATTR_SAVED, if state.saved { "true" } else { "false" })
        .map_err(SyncError::from_js)?;
    Ok(())
}

fn read_state(heart: &HtmlImageElement) -> Option<(TrackId, ToggleState)> {
    let track_id = TrackId::from_uri(&heart.get_attribute(ATTR_TRACK)?)?;
    let kind = ToggleKind::from_attr(&heart.get_attribute(ATTR_KIND)?)?;
    let saved = heart.get_attribute(ATTR_SAVED).as_deref() == Some("true");
    Some((track_id, ToggleState { kind, saved }))
}

fn apply_visual(heart: &HtmlImageElement, visual: ToggleVisual, icons: &IconUrls) -> Result<()> {
    heart.set_src(icons.url(visual.icon));
    let style = heart.style();
    if visual.visible {
        style.remove_property("opacity").map_err(SyncError::from_js)?;
    } else {
        style.set_property("opacity", "0").map_err(SyncError::from_js)?;
    }
    Ok(())
}

fn wire_hover(heart: &HtmlImageElement, host: &Element, icons: &Rc<IconUrls>) -> Result<()> {
    for (event, hovered) in [("mouseenter", true), ("mouseleave", false)] {
        let heart = heart.clone();
        let icons = Rc::clone(icons);
        let listener = Closure::<dyn FnMut(MouseEvent)>::new(move |_: MouseEvent| {
            if let Some((_, state)) = read_state(&heart) {
                if let Err(err) = apply_visual(&heart, state.visual(hovered), &icons) {
                    log::debug!("hover repaint failed: {err}");
                }
            }
        });
        host.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
            .map_err(SyncError::from_js)?;
        listener.forget();
    }
    Ok(())
}

/// Flips the heart at once, then asks the remote library to follow.
///
/// The heart stays clickable while the call is in flight; a second click
/// simply flips it back and sends the opposite call.
fn on_heart_click(
    reconciler: &Rc<PageReconciler>,
    heart: &HtmlImageElement,
    host: &Element,
    icons: &Rc<IconUrls>,
) {
    let Some((track_id, state)) = read_state(heart) else {
        return;
    };
    let (next, _) = state.clicked();
    if let Err(err) = write_state(heart, &track_id, next)
        .and_then(|_| apply_visual(heart, next.visual(true), icons))
    {
        log::warn!("could not flip heart for {track_id}: {err}");
        return;
    }

    let reconciler = Rc::clone(reconciler);
    let heart = heart.clone();
    let host = host.clone();
    let icons = Rc::clone(icons);
    spawn_local(async move {
        let result = reconciler
            .apply_click(&track_id, next.saved, browser::load_credentials())
            .await;
        if let Err(err) = result {
            log::warn!("could not update {track_id}: {err}");
        }
        if let Some((_, latest)) = read_state(&heart) {
            if let Err(err) = apply_visual(&heart, latest.visual(is_hovered(&host)), &icons) {
                log::debug!("heart repaint failed: {err}");
            }
        }
    });
}
