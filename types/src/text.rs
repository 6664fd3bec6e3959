//! Small text helpers shared across crates.

use std::path::Path;

/// Human-facing name for a file path: the stem, falling back to the full
/// file name, falling back to the whole path.
#[must_use]
pub fn file_stem_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when
/// anything was cut.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}…")
    } else {
        truncated
    }
}
