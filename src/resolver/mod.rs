//! Resolution of raw video links into manifest URLs.
//!
//! Resolution is a pure, offline pipeline:
//!
//! 1. [`classify`] decides the [`UrlShape`] of the trimmed input.
//! 2. [`rewrite`] rebuilds the manifest URL for media-segment links.
//! 3. [`resolve`] runs both and explains the decision in a [`Resolution`].
//!
//! All alias and marker vocabulary lives in [`ManifestProfile`]. Nothing in
//! this module fails: input that cannot be improved is passed through.

mod classify;
mod manifest;
mod profile;

pub use classify::{UrlShape, classify};
pub use manifest::rewrite;
pub use profile::{ManifestProfile, ProfileExtension};

use tracing::debug;

/// Outcome of resolving a raw URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// URL to hand to the download engine.
    pub url: String,
    /// Shape of the input as classified.
    pub shape: UrlShape,
    /// Whether `url` differs from the trimmed input.
    pub changed: bool,
    /// One-line explanation for front ends.
    pub note: &'static str,
}

/// Classifies `raw`, rewrites it when possible, and explains what happened.
///
/// Opaque input gets a best-effort rewrite too; it only sticks when the
/// rebuilt URL passes the rewriter's sanity check.
///
/// # Examples
///
/// ```
/// use spdl_core::{ManifestProfile, UrlShape, resolve};
///
/// let profile = ManifestProfile::default();
/// let resolution = resolve(" https://example.com/video.mp4 ", &profile);
/// assert_eq!(resolution.shape, UrlShape::Opaque);
/// assert_eq!(resolution.url, "https://example.com/video.mp4");
/// assert!(!resolution.changed);
/// ```
#[tracing::instrument(level = "debug", skip(raw, profile))]
#[must_use]
pub fn resolve(raw: &str, profile: &ManifestProfile) -> Resolution {
    let input = raw.trim();
    let shape = classify(input, profile);

    let (url, note) = match shape {
        UrlShape::Canonical => (
            input.to_string(),
            "URL already looks like a usable videomanifest.",
        ),
        UrlShape::Convertible => {
            let rebuilt = rewrite(input, profile);
            if rebuilt == input {
                (
                    rebuilt,
                    "Missing provider/docId or unsupported host; cannot auto-build a manifest. Capture videomanifest via DevTools.",
                )
            } else {
                (
                    rebuilt,
                    "Converted mediasegment URL to videomanifest (DASH index).",
                )
            }
        }
        UrlShape::Opaque => {
            let rebuilt = rewrite(input, profile);
            if rebuilt == input {
                (rebuilt, "Non-mediap pipeline URL; using as-is.")
            } else {
                (
                    rebuilt,
                    "Built videomanifest URL from provider/docId parameters.",
                )
            }
        }
    };

    let changed = url != input;
    debug!(shape = %shape, changed, "Resolved input URL");
    Resolution {
        url,
        shape,
        changed,
        note,
    }
}
