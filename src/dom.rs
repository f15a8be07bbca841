//! Host-page node classification and the tracked-section state machine.
//!
//! The browser layer turns elements into [`NodeClass`] values and mutation
//! records into [`SectionEvent`]s; everything that decides what to do with
//! them lives here.

use crate::config::Selectors;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Playlist,
    Album,
    Artist,
}

impl SectionKind {
    /// Lookup order when resolving the visible section.
    pub const ALL: [SectionKind; 3] = [SectionKind::Playlist, SectionKind::Album, SectionKind::Artist];

    pub fn selector(self, selectors: &Selectors) -> &str {
        match self {
            SectionKind::Playlist => &selectors.playlist_section,
            SectionKind::Album => &selectors.album_section,
            SectionKind::Artist => &selectors.artist_section,
        }
    }
}

/// What a host-page element is, as far as syncing is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeClass {
    Section(SectionKind),
    Row,
    TrackLink,
    AddControl,
    NowPlaying,
    Other,
}

impl NodeClass {
    /// Classifies an element given a selector matcher.
    ///
    /// `matches` answers whether the element matches a CSS selector; the
    /// first matching class wins, sections first.
    pub fn classify(selectors: &Selectors, mut matches: impl FnMut(&str) -> bool) -> Self {
        if let Some(kind) = SectionKind::ALL
            .into_iter()
            .find(|kind| matches(kind.selector(selectors)))
        {
            return NodeClass::Section(kind);
        }
        if matches(&selectors.track_link) || matches(&selectors.now_playing_link) {
            NodeClass::TrackLink
        } else if matches(&selectors.track_row) {
            NodeClass::Row
        } else if matches(&selectors.add_control) || matches(&selectors.now_playing_add_control) {
            NodeClass::AddControl
        } else if matches(&selectors.now_playing) {
            NodeClass::NowPlaying
        } else {
            NodeClass::Other
        }
    }
}

/// One relevant change inside the observed section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SectionEvent {
    /// An element was inserted; `holds_track_link` is true when it is, or
    /// contains, a track link.
    Inserted { holds_track_link: bool },
    AttributeChanged {
        target: NodeClass,
        attribute: Option<String>,
    },
}

/// True when a batch of section mutations warrants a reconcile pass.
pub fn should_reconcile(events: &[SectionEvent]) -> bool {
    events.iter().any(|event| match event {
        SectionEvent::Inserted { holds_track_link } => *holds_track_link,
        SectionEvent::AttributeChanged { target, attribute } => {
            *target == NodeClass::TrackLink && attribute.as_deref() == Some("href")
        }
    })
}

#[derive(Debug, PartialEq, Eq)]
pub enum Transition<H> {
    Unchanged,
    /// Tracking moved to a new section; `detached` must stop being observed
    /// before the new one is.
    Switched { detached: Option<H> },
}

/// Holds the one section currently under observation.
#[derive(Debug)]
pub struct SectionTracker<H> {
    current: Option<H>,
}

impl<H> Default for SectionTracker<H> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<H: PartialEq> SectionTracker<H> {
    pub fn current(&self) -> Option<&H> {
        self.current.as_ref()
    }

    pub fn track(&mut self, candidate: H) -> Transition<H> {
        if self.current.as_ref() == Some(&candidate) {
            return Transition::Unchanged;
        }
        let detached = self.current.replace(candidate);
        Transition::Switched { detached }
    }

    /// Forgets the current section, e.g. when the page dropped it.
    pub fn release(&mut self) -> Option<H> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_first_matching_selector() {
        let selectors = Selectors::default();
        let album = NodeClass::classify(&selectors, |sel| sel == selectors.album_section);
        assert_eq!(album, NodeClass::Section(SectionKind::Album));

        let link = NodeClass::classify(&selectors, |sel| sel == selectors.track_link);
        assert_eq!(link, NodeClass::TrackLink);

        let add = NodeClass::classify(&selectors, |sel| sel == selectors.add_control);
        assert_eq!(add, NodeClass::AddControl);

        assert_eq!(NodeClass::classify(&selectors, |_| false), NodeClass::Other);
    }

    #[test]
    fn reconcile_on_track_link_insert_or_href_change() {
        assert!(!should_reconcile(&[]));
        assert!(!should_reconcile(&[SectionEvent::Inserted {
            holds_track_link: false
        }]));
        assert!(should_reconcile(&[
            SectionEvent::Inserted {
                holds_track_link: false
            },
            SectionEvent::Inserted {
                holds_track_link: true
            },
        ]));
        assert!(should_reconcile(&[SectionEvent::AttributeChanged {
            target: NodeClass::TrackLink,
            attribute: Some("href".to_string()),
        }]));
        assert!(!should_reconcile(&[SectionEvent::AttributeChanged {
            target: NodeClass::Row,
            attribute: Some("href".to_string()),
        }]));
        assert!(!should_reconcile(&[SectionEvent::AttributeChanged {
            target: NodeClass::TrackLink,
            attribute: Some("class".to_string()),
        }]));
    }

    #[test]
    fn tracker_switches_only_on_a_new_section() {
        let mut tracker = SectionTracker::default();
        assert_eq!(tracker.track(1), Transition::Switched { detached: None });
        assert_eq!(tracker.track(1), Transition::Unchanged);
        assert_eq!(tracker.track(2), Transition::Switched { detached: Some(1) });
        assert_eq!(tracker.current(), Some(&2));
        assert_eq!(tracker.release(), Some(2));
        assert_eq!(tracker.track(2), Transition::Switched { detached: None });
    }
}
