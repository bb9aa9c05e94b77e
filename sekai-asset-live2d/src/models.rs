//! Model directory scan

use crate::param_ids::ParamIdMap;
use sekai_asset_core::{AssetError, DiagnosticSink, DiagnosticSource, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MOC3_EXTENSION: &str = "moc3";

/// Every `*.moc3` file below `dir`, in a stable order
pub fn find_moc3_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => AssetError::Io(io),
            None => AssetError::format(format!("directory loop below {}", dir.display())),
        })?;
        let is_moc3 = entry.path().extension().is_some_and(|ext| ext == MOC3_EXTENSION);
        if entry.file_type().is_file() && is_moc3 {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Merge the name tables of every model below `dir`
///
/// Unreadable models are reported to `sink` and skipped.
pub fn load_param_ids(dir: &Path, sink: &dyn DiagnosticSink) -> Result<ParamIdMap> {
    let mut ids = ParamIdMap::new();
    let files = find_moc3_files(dir)?;
    for path in &files {
        match ParamIdMap::from_moc3_file(path) {
            Ok(model) => ids.merge(model),
            Err(e) => sink.warn(
                DiagnosticSource::ParamIds,
                format!("skipping model {}: {}", path.display(), e),
            ),
        }
    }
    tracing::debug!(models = files.len(), ids = ids.len(), "loaded parameter ids");
    Ok(ids)
}
