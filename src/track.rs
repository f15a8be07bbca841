use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

const TRACK_URI_PREFIX: &str = "spotify:track:";

/// A `spotify:track:<id>` URI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(String);

impl TrackId {
    pub fn from_base62(id: &str) -> Option<Self> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(format!("{TRACK_URI_PREFIX}{id}")))
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        uri.strip_prefix(TRACK_URI_PREFIX).and_then(Self::from_base62)
    }

    /// Resolves a link target to a track.
    ///
    /// Accepts `/track/<id>` (anything after `?` or `#` ignored) and links
    /// carrying the full URI in one of `query_keys`, e.g.
    /// `/album/x?uri=spotify%3Atrack%3A<id>`.
    pub fn from_href<S: AsRef<str>>(href: &str, query_keys: &[S]) -> Option<Self> {
        static RE_TRACK_PATH: OnceLock<Regex> = OnceLock::new();
        let re_track_path =
            RE_TRACK_PATH.get_or_init(|| Regex::new(r"^/track/([^/?#]+)").unwrap());

        if let Some(cap) = re_track_path.captures(href) {
            return cap.get(1).and_then(|m| Self::from_base62(m.as_str()));
        }

        let (_, query) = href.split_once('?')?;
        let query = query.split('#').next().unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| query_keys.iter().any(|k| k.as_ref() == &**key))
            .find_map(|(_, value)| Self::from_uri(&value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 2] = ["uri", "highlight"];

    #[test]
    fn resolves_path_encoded_link() {
        let id = TrackId::from_href("/track/abc123", &KEYS).unwrap();
        assert_eq!(id.as_str(), "spotify:track:abc123");

        let id = TrackId::from_href("/track/abc123?si=deadbeef", &KEYS).unwrap();
        assert_eq!(id.to_string(), "spotify:track:abc123");
    }

    #[test]
    fn resolves_query_encoded_link() {
        let id = TrackId::from_href("/album/42?uri=spotify%3Atrack%3Axyz789", &KEYS).unwrap();
        assert_eq!(id.as_str(), "spotify:track:xyz789");

        let id = TrackId::from_href("/album/42?foo=1&highlight=spotify:track:q1w2e3#top", &KEYS)
            .unwrap();
        assert_eq!(id.as_str(), "spotify:track:q1w2e3");
    }

    #[test]
    fn rejects_foreign_links() {
        assert_eq!(TrackId::from_href("/album/abc123", &KEYS), None);
        assert_eq!(TrackId::from_href("/track/", &KEYS), None);
        assert_eq!(TrackId::from_href("/album/1?uri=spotify%3Aalbum%3Axyz", &KEYS), None);
        assert_eq!(TrackId::from_href("/album/1?other=spotify%3Atrack%3Axyz", &KEYS), None);
        assert_eq!(TrackId::from_href("https://open.spotify.com/track/abc", &KEYS), None);
    }
}
