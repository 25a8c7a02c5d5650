//! URL shape classification.

use url::Url;

use super::profile::ManifestProfile;

/// The three shapes a raw video URL can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlShape {
    /// Already a manifest/index URL; used as-is.
    Canonical,
    /// A media-segment URL carrying provider/document identifiers.
    Convertible,
    /// Neither; passed to the engine unchanged.
    Opaque,
}

impl UrlShape {
    /// Returns the stable lowercase label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Canonical => "canonical",
            Self::Convertible => "convertible",
            Self::Opaque => "opaque",
        }
    }
}

impl std::fmt::Display for UrlShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a raw URL string.
///
/// Leading and trailing whitespace is ignored. Total over all inputs: anything
/// that does not parse as an absolute http(s) URL is [`UrlShape::Opaque`].
///
/// # Examples
///
/// ```
/// use spdl_core::{ManifestProfile, UrlShape, classify};
///
/// let profile = ManifestProfile::default();
/// let url = "https://contoso.sharepoint.com/_api/v2.1/videomanifest.ashx?provider=spo&docid=A&part=index";
/// assert_eq!(classify(url, &profile), UrlShape::Canonical);
/// assert_eq!(classify("not a url", &profile), UrlShape::Opaque);
/// ```
#[must_use]
pub fn classify(raw: &str, profile: &ManifestProfile) -> UrlShape {
    match Url::parse(raw.trim()) {
        Ok(url) => classify_parsed(&url, profile),
        Err(_) => UrlShape::Opaque,
    }
}

pub(crate) fn classify_parsed(url: &Url, profile: &ManifestProfile) -> UrlShape {
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return UrlShape::Opaque;
    }

    let last = last_path_segment(url).to_ascii_lowercase();
    let part = query_value(url, &profile.part_key);

    let segment_part = part.as_deref().is_some_and(|p| profile.is_segment_part(p));
    let manifest_path = contains_marker(&last, &profile.manifest_marker);
    let transcode_path = profile
        .transcode_markers
        .iter()
        .any(|marker| contains_marker(&last, marker));
    let segment_path = profile
        .segment_path_markers
        .iter()
        .any(|marker| contains_marker(&last, marker));

    if (segment_part && (manifest_path || transcode_path)) || segment_path {
        return UrlShape::Convertible;
    }

    let index_part = part
        .as_deref()
        .is_some_and(|p| p.eq_ignore_ascii_case(&profile.index_part));
    if manifest_path || index_part {
        UrlShape::Canonical
    } else {
        UrlShape::Opaque
    }
}

pub(crate) fn last_path_segment(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("")
}

/// First value of `key` in the query string, matched case-insensitively.
pub(crate) fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.into_owned())
}

fn contains_marker(segment_lower: &str, marker: &str) -> bool {
    !marker.is_empty() && segment_lower.contains(&marker.to_ascii_lowercase())
}
