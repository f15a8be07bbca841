use crate::client::LibraryMutation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleKind {
    /// Heart on a track-list row; hidden until hover while unsaved.
    Row,
    /// Heart in the now-playing widget; always shown.
    NowPlaying,
}

impl ToggleKind {
    pub fn as_attr(self) -> &'static str {
        match self {
            ToggleKind::Row => "row",
            ToggleKind::NowPlaying => "now-playing",
        }
    }

    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "row" => Some(ToggleKind::Row),
            "now-playing" => Some(ToggleKind::NowPlaying),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartIcon {
    Filled,
    Outline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleVisual {
    pub icon: HeartIcon,
    pub visible: bool,
}

/// State carried by one heart control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleState {
    pub kind: ToggleKind,
    pub saved: bool,
}

impl ToggleState {
    pub fn row(saved: bool) -> Self {
        Self {
            kind: ToggleKind::Row,
            saved,
        }
    }

    pub fn now_playing(saved: bool) -> Self {
        Self {
            kind: ToggleKind::NowPlaying,
            saved,
        }
    }

    pub fn visual(self, hovered: bool) -> ToggleVisual {
        let icon = if self.saved {
            HeartIcon::Filled
        } else {
            HeartIcon::Outline
        };
        let visible = match self.kind {
            ToggleKind::NowPlaying => true,
            ToggleKind::Row => self.saved || hovered,
        };
        ToggleVisual { icon, visible }
    }

    /// The optimistic state after a click, and the call that makes it true.
    pub fn clicked(self) -> (Self, LibraryMutation) {
        let next = Self {
            saved: !self.saved,
            ..self
        };
        let mutation = if next.saved {
            LibraryMutation::Add
        } else {
            LibraryMutation::Remove
        };
        (next, mutation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsaved_row_shows_only_on_hover() {
        let state = ToggleState::row(false);
        assert_eq!(
            state.visual(false),
            ToggleVisual {
                icon: HeartIcon::Outline,
                visible: false
            }
        );
        assert!(state.visual(true).visible);
    }

    #[test]
    fn saved_and_now_playing_always_show() {
        assert!(ToggleState::row(true).visual(false).visible);
        assert_eq!(ToggleState::row(true).visual(false).icon, HeartIcon::Filled);
        assert!(ToggleState::now_playing(false).visual(false).visible);
    }

    #[test]
    fn clicks_alternate_between_add_and_remove() {
        let (saved, mutation) = ToggleState::row(false).clicked();
        assert!(saved.saved);
        assert_eq!(mutation, LibraryMutation::Add);

        let (unsaved, mutation) = saved.clicked();
        assert_eq!(unsaved, ToggleState::row(false));
        assert_eq!(mutation, LibraryMutation::Remove);
    }

    #[test]
    fn kind_attribute_round_trips() {
        for kind in [ToggleKind::Row, ToggleKind::NowPlaying] {
            assert_eq!(ToggleKind::from_attr(kind.as_attr()), Some(kind));
        }
        assert_eq!(ToggleKind::from_attr("sidebar"), None);
    }
}
