use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::error::{PipelineError, Result};

/// File-name suffixes picked up when walking a directory, in output order.
/// Matching is case-sensitive.
pub const AUDIO_SUFFIXES: [&str; 3] = [".wav", ".mp3", ".m4a"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Collect the audio files under `root` as absolute paths.
///
/// * directory → recursive walk; every `.wav` first, then `.mp3`, then
///   `.m4a`, each group in traversal order (not sorted)
/// * anything else → a one-element list, whatever its extension
///
/// Unreadable entries below the root are skipped. Only an inaccessible root
/// is an error.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let discovery_error = |source: std::io::Error| PipelineError::Discovery {
        path: root.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(root).map_err(discovery_error)?;
    let root = std::path::absolute(root).map_err(discovery_error)?;

    if !metadata.is_dir() {
        return Ok(vec![root]);
    }

    let mut groups: Vec<Vec<PathBuf>> = vec![Vec::new(); AUDIO_SUFFIXES.len()];

    for entry in WalkDir::new(&root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(discovery_error(err.into())),
            Err(err) => {
                debug!("skipping unreadable entry: {err}");
                continue;
            }
        };

        // Follows symlinks, so linked audio files are still picked up.
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(group) = AUDIO_SUFFIXES.iter().position(|s| name.ends_with(s)) {
            groups[group].push(entry.into_path());
        }
    }

    Ok(groups.concat())
}
