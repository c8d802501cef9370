//! Writing rendered bindings to disk

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use debugwire_utils::{DebugwireError, Result};

use crate::render::{GeneratedFile, GENERATED_MARKER};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<PathBuf>,
    /// Previously generated files no longer produced
    pub removed: Vec<PathBuf>,
}

/// Write `files` into `dir`, replacing existing files of the same name and
/// deleting stale generated `.rs` files. Files without the generated
/// marker are never touched.
pub fn write_to_dir(dir: &Path, files: &[GeneratedFile]) -> Result<WriteSummary> {
    fs::create_dir_all(dir).map_err(|e| DebugwireError::FileWrite {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut summary = WriteSummary::default();
    let produced: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();

    for file in files {
        let path = dir.join(&file.name);
        fs::write(&path, &file.contents).map_err(|e| DebugwireError::FileWrite {
            path: path.clone(),
            source: e,
        })?;
        debug!("Wrote {}", path.display());
        summary.written.push(path);
    }

    let entries = fs::read_dir(dir).map_err(|e| DebugwireError::FileRead {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let path = entry?.path();
        let is_rust = path.extension().is_some_and(|ext| ext == "rs");
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !is_rust || produced.contains(name) || !is_generated(&path) {
            continue;
        }
        fs::remove_file(&path).map_err(|e| DebugwireError::FileWrite {
            path: path.clone(),
            source: e,
        })?;
        info!("Removed stale generated file {}", path.display());
        summary.removed.push(path);
    }
    summary.removed.sort();

    Ok(summary)
}

/// Whether the file's first line is the generated marker
pub fn is_generated(path: &Path) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut first = String::new();
    match BufReader::new(file).read_line(&mut first) {
        Ok(_) => first.starts_with(GENERATED_MARKER),
        Err(_) => false,
    }
}
