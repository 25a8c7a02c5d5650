//! Output template construction for the engine.

use std::path::{Component, Path};

/// Template used when no custom name is given.
///
/// Titles are bounded to 150 bytes; the video id keeps names unique.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(title).150B [%(id)s].%(ext)s";

/// Placeholder the engine replaces with the merged file's extension.
const EXTENSION_PLACEHOLDER: &str = ".%(ext)s";

/// Builds the engine output template for an optional custom name.
///
/// A blank name falls back to [`DEFAULT_OUTPUT_TEMPLATE`]. A name with an
/// extension is used as-is; otherwise the engine's extension is appended.
#[must_use]
pub fn output_template(custom_name: Option<&str>) -> String {
    let Some(name) = custom_output_name(custom_name) else {
        return DEFAULT_OUTPUT_TEMPLATE.to_string();
    };
    let escaped = name.replace('%', "%%");
    if Path::new(&name).extension().is_some() {
        escaped
    } else {
        format!("{escaped}{EXTENSION_PLACEHOLDER}")
    }
}

/// Trimmed, sanitized custom name, or `None` when blank.
#[must_use]
pub(crate) fn custom_output_name(custom_name: Option<&str>) -> Option<String> {
    let name = custom_name?.trim();
    if name.is_empty() {
        return None;
    }
    Some(sanitize_output_name(name))
}

/// Replaces path separators and characters illegal in file names with `_`.
///
/// Names that are pure dot segments (`.`, `..`) have their dots replaced too,
/// so the result always stays inside the output directory.
pub(crate) fn sanitize_output_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if is_safe_name(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_safe_name(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
