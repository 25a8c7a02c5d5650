//! Media-segment to manifest URL rewriting.

use url::Url;
use url::form_urlencoded;

use super::classify::{UrlShape, classify_parsed, last_path_segment};
use super::profile::ManifestProfile;

/// Rebuilds the manifest (index) URL for a media-segment URL.
///
/// Returns `raw` unchanged when the input is already canonical, does not
/// parse, lacks a provider or document identifier, names no manifest or
/// transcode endpoint, or when the rebuilt URL fails the sanity check
/// (accepted host, re-classifies as [`UrlShape::Canonical`]).
///
/// Parameters other than the single-segment keys are kept in their original
/// order, access tokens included. No network access is performed.
///
/// # Examples
///
/// ```
/// use spdl_core::{ManifestProfile, rewrite};
///
/// let profile = ManifestProfile::default();
/// let segment = "https://tenant.sharepoint.com/_api/v2.1/videotranscode.ashx?provider=spo&docid=ABC123&part=mediasegment&format=dash&segment=4";
/// assert_eq!(
///     rewrite(segment, &profile),
///     "https://tenant.sharepoint.com/_api/v2.1/videomanifest.ashx?provider=spo&docid=ABC123&part=index&format=dash"
/// );
/// ```
#[must_use]
pub fn rewrite(raw: &str, profile: &ManifestProfile) -> String {
    match build_manifest_url(raw.trim(), profile) {
        Some(rebuilt) => rebuilt,
        None => raw.to_string(),
    }
}

fn build_manifest_url(input: &str, profile: &ManifestProfile) -> Option<String> {
    let mut url = Url::parse(input).ok()?;
    if classify_parsed(&url, profile) == UrlShape::Canonical {
        return None;
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !has_identifier(&pairs, |k| profile.is_provider_key(k))
        || !has_identifier(&pairs, |k| profile.is_document_key(k))
    {
        return None;
    }

    let last = last_path_segment(&url).to_string();
    let new_last = manifest_segment(&last, profile)?;
    if new_last != last {
        let path = url.path().to_string();
        let head = path.rsplit_once('/').map_or("", |(head, _)| head);
        url.set_path(&format!("{head}/{new_last}"));
    }

    let query = rebuild_query(&pairs, profile);
    url.set_query(Some(&query));

    let rebuilt = url.to_string();
    let reparsed = Url::parse(&rebuilt).ok()?;
    let host_ok = reparsed
        .host_str()
        .is_some_and(|host| profile.accepts_host(host));
    if !host_ok || classify_parsed(&reparsed, profile) != UrlShape::Canonical {
        return None;
    }
    Some(rebuilt)
}

fn has_identifier(pairs: &[(String, String)], is_key: impl Fn(&str) -> bool) -> bool {
    pairs
        .iter()
        .any(|(k, v)| is_key(k) && !v.trim().is_empty())
}

/// Last path segment with its transcode marker swapped for the manifest marker.
///
/// `None` when the segment carries neither kind of marker.
fn manifest_segment(last: &str, profile: &ManifestProfile) -> Option<String> {
    let lower = last.to_ascii_lowercase();
    if lower.contains(&profile.manifest_marker.to_ascii_lowercase()) {
        return Some(last.to_string());
    }
    profile.transcode_markers.iter().find_map(|marker| {
        let marker = marker.to_ascii_lowercase();
        if marker.is_empty() {
            return None;
        }
        let start = lower.find(&marker)?;
        let end = start + marker.len();
        Some(format!(
            "{}{}{}",
            &last[..start],
            profile.manifest_marker,
            &last[end..]
        ))
    })
}

fn rebuild_query(pairs: &[(String, String)], profile: &ManifestProfile) -> String {
    let mut out: Vec<(&str, &str)> = Vec::with_capacity(pairs.len() + 2);
    let mut part_set = false;
    let mut format_set = false;

    for (key, value) in pairs {
        if profile.is_segment_key(key) {
            continue;
        }
        if key.eq_ignore_ascii_case(&profile.part_key) {
            if !part_set {
                out.push((key.as_str(), profile.index_part.as_str()));
                part_set = true;
            }
            continue;
        }
        if key.eq_ignore_ascii_case(&profile.format_key) {
            if !format_set {
                out.push((key.as_str(), profile.manifest_format.as_str()));
                format_set = true;
            }
            continue;
        }
        out.push((key.as_str(), value.as_str()));
    }
    if !part_set {
        out.push((profile.part_key.as_str(), profile.index_part.as_str()));
    }
    if !format_set {
        out.push((profile.format_key.as_str(), profile.manifest_format.as_str()));
    }

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(out)
        .finish()
}
