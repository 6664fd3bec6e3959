//! Resource-library persistence: a JSON file, written atomically.
//!
//! Uses a temp file + rename so a crash mid-save never truncates the
//! library.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use reverie_types::Resource;

/// Default library location under the platform data directory.
#[must_use]
pub fn default_library_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("reverie").join("resources.json"))
}

/// Load the library; a missing file is an empty library, a corrupt one is
/// an error (better to refuse than to silently overwrite user data).
pub fn load_resources(path: &Path) -> anyhow::Result<Vec<Resource>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read resource library at {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse resource library at {}", path.display()))
}

pub fn save_resources(path: &Path, resources: &[Resource]) -> anyhow::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let payload = serde_json::to_vec_pretty(resources).context("failed to encode library")?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    temp.write_all(&payload).context("failed to write library")?;
    temp.persist(path)
        .with_context(|| format!("failed to persist library to {}", path.display()))?;
    tracing::debug!(path = %path.display(), count = resources.len(), "Saved resource library");
    Ok(())
}
