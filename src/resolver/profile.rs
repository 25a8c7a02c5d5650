//! Alias and marker data describing the origin service's URL vocabulary.
//!
//! The origin service names its query parameters and endpoints with keys that
//! change over time (`docid` became `docId` at some point, for example). None of
//! this is hard-coded in the classifier or rewriter: both read it from a
//! [`ManifestProfile`], and the binary can extend the alias lists from its
//! config file.

use serde::Deserialize;

/// Query keys and path markers used to recognize and rebuild manifest URLs.
///
/// All key and marker comparisons are ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestProfile {
    /// Query keys that carry the provider identifier.
    pub provider_keys: Vec<String>,
    /// Query keys that carry the document identifier.
    pub document_keys: Vec<String>,
    /// Query key that selects which part of the video is returned.
    pub part_key: String,
    /// Part value of a manifest request.
    pub index_part: String,
    /// Part values of a single media-segment request.
    pub segment_parts: Vec<String>,
    /// Query key selecting the streaming format.
    pub format_key: String,
    /// Streaming format requested from the manifest endpoint.
    pub manifest_format: String,
    /// Query keys only meaningful for one segment fetch; dropped when rewriting.
    pub segment_keys: Vec<String>,
    /// Last-path-segment marker of the manifest endpoint.
    pub manifest_marker: String,
    /// Last-path-segment markers of transcode / segment endpoints.
    pub transcode_markers: Vec<String>,
    /// Last-path-segment markers that name a media segment by themselves.
    pub segment_path_markers: Vec<String>,
    /// Host suffixes a rewritten URL must still match.
    pub host_suffixes: Vec<String>,
}

impl Default for ManifestProfile {
    fn default() -> Self {
        Self {
            provider_keys: vec!["provider".to_string()],
            document_keys: vec!["docid".to_string()],
            part_key: "part".to_string(),
            index_part: "index".to_string(),
            segment_parts: vec!["mediasegment".to_string()],
            format_key: "format".to_string(),
            manifest_format: "dash".to_string(),
            segment_keys: vec!["segment".to_string(), "segmenttime".to_string()],
            manifest_marker: "videomanifest".to_string(),
            transcode_markers: vec!["videotranscode".to_string(), "mediasegment".to_string()],
            segment_path_markers: vec!["mediasegment".to_string()],
            host_suffixes: vec![".sharepoint.com".to_string(), ".svc.ms".to_string()],
        }
    }
}

/// Additional aliases loaded from configuration.
///
/// Extensions are appended to the defaults; they never remove a built-in alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileExtension {
    /// Extra provider identifier keys.
    pub provider_keys: Vec<String>,
    /// Extra document identifier keys.
    pub document_keys: Vec<String>,
    /// Extra accepted host suffixes.
    pub host_suffixes: Vec<String>,
}

impl ManifestProfile {
    /// Returns a profile with the given aliases appended to this one.
    ///
    /// Blank entries and entries already present (case-insensitively) are skipped.
    #[must_use]
    pub fn extended(mut self, extension: &ProfileExtension) -> Self {
        merge_aliases(&mut self.provider_keys, &extension.provider_keys);
        merge_aliases(&mut self.document_keys, &extension.document_keys);
        merge_aliases(&mut self.host_suffixes, &extension.host_suffixes);
        self
    }

    pub(crate) fn is_provider_key(&self, key: &str) -> bool {
        contains_ignore_case(&self.provider_keys, key)
    }

    pub(crate) fn is_document_key(&self, key: &str) -> bool {
        contains_ignore_case(&self.document_keys, key)
    }

    pub(crate) fn is_segment_key(&self, key: &str) -> bool {
        contains_ignore_case(&self.segment_keys, key)
    }

    pub(crate) fn is_segment_part(&self, value: &str) -> bool {
        contains_ignore_case(&self.segment_parts, value)
    }

    /// Checks `host` against the accepted suffixes.
    ///
    /// A suffix `.example.com` also accepts the bare `example.com`.
    pub(crate) fn accepts_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.host_suffixes.iter().any(|suffix| {
            let suffix = suffix.to_ascii_lowercase();
            host.ends_with(&suffix) || host == suffix.trim_start_matches('.')
        })
    }
}

fn contains_ignore_case(list: &[String], needle: &str) -> bool {
    list.iter().any(|entry| entry.eq_ignore_ascii_case(needle))
}

fn merge_aliases(target: &mut Vec<String>, extra: &[String]) {
    for alias in extra {
        let alias = alias.trim();
        if alias.is_empty() || contains_ignore_case(target, alias) {
            continue;
        }
        target.push(alias.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_only_ships_observed_aliases() {
        let profile = ManifestProfile::default();
        assert_eq!(profile.provider_keys, vec!["provider"]);
        assert_eq!(profile.document_keys, vec!["docid"]);
    }

    #[test]
    fn test_document_key_matches_case_insensitively() {
        let profile = ManifestProfile::default();
        assert!(profile.is_document_key("docId"));
        assert!(profile.is_document_key("DOCID"));
        assert!(!profile.is_document_key("doc"));
    }

    #[test]
    fn test_extended_appends_without_duplicates() {
        let extension = ProfileExtension {
            provider_keys: vec!["Provider".to_string(), "prov".to_string()],
            document_keys: vec!["  ".to_string(), "itemid".to_string()],
            host_suffixes: vec![],
        };
        let profile = ManifestProfile::default().extended(&extension);
        assert_eq!(profile.provider_keys, vec!["provider", "prov"]);
        assert_eq!(profile.document_keys, vec!["docid", "itemid"]);
    }

    #[test]
    fn test_accepts_host_suffix_and_bare_domain() {
        let profile = ManifestProfile::default();
        assert!(profile.accepts_host("contoso.sharepoint.com"));
        assert!(profile.accepts_host("CONTOSO-my.SharePoint.com"));
        assert!(profile.accepts_host("southcentralus1-mediap.svc.ms"));
        assert!(profile.accepts_host("sharepoint.com"));
        assert!(!profile.accepts_host("sharepoint.com.evil.example"));
        assert!(!profile.accepts_host("notsharepoint.com"));
    }
}
