//! MutationObserver plumbing for the change detector.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use js_sys::Array;
use leptos::prelude::{document, set_timeout_with_handle, TimeoutHandle};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, MutationObserver, MutationObserverInit, MutationRecord, Node};

use crate::config::{Selectors, SyncConfig};
use crate::debounce::{Debouncer, TimerHost};
use crate::dom::{should_reconcile, NodeClass, SectionEvent, SectionKind, SectionTracker, Transition};
use crate::error::{Result, SyncError};
use crate::web::page::current_section;

/// `setTimeout`-backed timers.
pub struct BrowserTimers;

impl TimerHost for BrowserTimers {
    type Handle = TimeoutHandle;

    fn arm(&self, delay_ms: u32, fire: Box<dyn FnOnce()>) -> Option<TimeoutHandle> {
        set_timeout_with_handle(fire, Duration::from_millis(delay_ms.into())).ok()
    }

    fn cancel(&self, handle: TimeoutHandle) {
        handle.clear();
    }
}

pub type BrowserDebouncer = Debouncer<BrowserTimers>;

type ObserverCallback = Closure<dyn FnMut(Array, MutationObserver)>;

fn new_observer(callback: impl FnMut(Array, MutationObserver) + 'static) -> Result<MutationObserver> {
    let callback = ObserverCallback::new(callback);
    let observer =
        MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(SyncError::from_js)?;
    callback.forget();
    Ok(observer)
}

fn records(batch: &Array) -> impl Iterator<Item = MutationRecord> + '_ {
    batch
        .iter()
        .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
}

fn added_elements(record: &MutationRecord) -> Vec<Element> {
    let nodes = record.added_nodes();
    (0..nodes.length())
        .filter_map(|idx| nodes.item(idx))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn classify(element: &Element, selectors: &Selectors) -> NodeClass {
    NodeClass::classify(selectors, |selector| element.matches(selector).unwrap_or(false))
}

fn holds(element: &Element, selector: &str) -> bool {
    element.matches(selector).unwrap_or(false)
        || element.query_selector(selector).ok().flatten().is_some()
}

fn find_within(element: &Element, selector: &str) -> Option<Element> {
    if element.matches(selector).unwrap_or(false) {
        return Some(element.clone());
    }
    element.query_selector(selector).ok().flatten()
}

fn find_section(element: &Element, selectors: &Selectors) -> Option<Element> {
    SectionKind::ALL
        .into_iter()
        .find_map(|kind| find_within(element, kind.selector(selectors)))
}

fn section_events(batch: &Array, selectors: &Selectors) -> Vec<SectionEvent> {
    let mut events = Vec::new();
    for record in records(batch) {
        match record.type_().as_str() {
            "childList" => events.extend(added_elements(&record).iter().map(|element| {
                SectionEvent::Inserted {
                    holds_track_link: holds(element, &selectors.track_link),
                }
            })),
            "attributes" => {
                let Some(target) = record.target().and_then(|node| node.dyn_into::<Element>().ok())
                else {
                    continue;
                };
                events.push(SectionEvent::AttributeChanged {
                    target: classify(&target, selectors),
                    attribute: record.attribute_name(),
                });
            }
            _ => {}
        }
    }
    events
}

fn subtree_options(watch_href: bool) -> MutationObserverInit {
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);
    if watch_href {
        options.set_attributes(true);
        options.set_attribute_filter(&Array::of1(&"href".into()));
    }
    options
}

/// Watches the page for track-list sections and the now-playing widget.
///
/// At most one section is observed at a time: moving to a new section
/// disconnects the section observer before it is pointed at the new one.
pub struct ChangeDetector {
    selectors: Selectors,
    rows: Rc<BrowserDebouncer>,
    now_playing: Rc<BrowserDebouncer>,
    section_observer: MutationObserver,
    widget_observer: MutationObserver,
    section: RefCell<SectionTracker<Element>>,
    widget: RefCell<SectionTracker<Element>>,
}

impl ChangeDetector {
    pub fn new(
        config: &SyncConfig,
        rows: Rc<BrowserDebouncer>,
        now_playing: Rc<BrowserDebouncer>,
    ) -> Result<Rc<Self>> {
        let selectors = config.selectors.clone();

        let section_observer = {
            let selectors = selectors.clone();
            let rows = Rc::clone(&rows);
            new_observer(move |batch, _| {
                if should_reconcile(&section_events(&batch, &selectors)) {
                    rows.trigger();
                }
            })?
        };
        let widget_observer = {
            let now_playing = Rc::clone(&now_playing);
            new_observer(move |_, _| now_playing.trigger())?
        };

        Ok(Rc::new(Self {
            selectors,
            rows,
            now_playing,
            section_observer,
            widget_observer,
            section: RefCell::new(SectionTracker::default()),
            widget: RefCell::new(SectionTracker::default()),
        }))
    }

    /// Observes the body for new sections and picks up what is already
    /// on the page.
    pub fn start(self: &Rc<Self>) -> Result<()> {
        let body: Node = document()
            .body()
            .ok_or_else(|| SyncError::Js("document has no body".to_string()))?
            .into();

        let detector = Rc::clone(self);
        let root_observer = new_observer(move |batch, _| {
            for record in records(&batch) {
                for element in added_elements(&record) {
                    detector.on_inserted(&element);
                }
            }
        })?;
        root_observer
            .observe_with_options(&body, &subtree_options(false))
            .map_err(SyncError::from_js)?;

        if let Some(section) = current_section(&self.selectors) {
            self.watch_section(section);
        }
        let widget = document()
            .query_selector(&self.selectors.now_playing)
            .ok()
            .flatten();
        if let Some(widget) = widget {
            self.watch_widget(widget);
        }
        Ok(())
    }

    fn on_inserted(&self, element: &Element) {
        if let Some(section) = find_section(element, &self.selectors) {
            self.watch_section(section);
        }
        if let Some(widget) = find_within(element, &self.selectors.now_playing) {
            self.watch_widget(widget);
        }
    }

    fn watch_section(&self, section: Element) {
        let transition = self.section.borrow_mut().track(section.clone());
        let Transition::Switched { detached } = transition else {
            return;
        };
        if detached.is_some() {
            self.section_observer.disconnect();
        }
        if let Err(err) = self
            .section_observer
            .observe_with_options(&section, &subtree_options(true))
        {
            log::warn!("could not observe section: {}", SyncError::from_js(err));
            self.section.borrow_mut().release();
            return;
        }
        if let NodeClass::Section(kind) = classify(&section, &self.selectors) {
            log::info!("tracking {kind:?} section");
        }
        self.rows.trigger();
    }

    fn watch_widget(&self, widget: Element) {
        let transition = self.widget.borrow_mut().track(widget.clone());
        let Transition::Switched { detached } = transition else {
            return;
        };
        if detached.is_some() {
            self.widget_observer.disconnect();
        }
        if let Err(err) = self
            .widget_observer
            .observe_with_options(&widget, &subtree_options(true))
        {
            log::warn!("could not observe now-playing widget: {}", SyncError::from_js(err));
            self.widget.borrow_mut().release();
            return;
        }
        self.now_playing.trigger();
    }
}
