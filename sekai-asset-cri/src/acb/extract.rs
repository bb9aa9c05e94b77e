//! ACB extraction
//!
//! Glues the header table, the resolved tracks and the AFS2 archives
//! (embedded and streaming) together and hands back one buffer per track.

use super::tracks::{Track, resolve_tracks};
use crate::afs2::Afs2Archive;
use crate::utf::UtfTable;
use sekai_asset_core::{
    AssetError, DiagnosticSink, DiagnosticSource, Result, TracingSink,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// Finds streaming archives referenced by an ACB
pub trait AwbLocator: Send + Sync {
    /// Contents of the archive file named `file_name`, `None` when absent
    fn locate(&self, file_name: &str) -> Result<Option<Vec<u8>>>;
}

/// Never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAwbLocator;

impl AwbLocator for NoAwbLocator {
    fn locate(&self, _file_name: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Looks for sibling files in one directory
#[derive(Debug, Clone)]
pub struct DirectoryAwbLocator {
    dir: PathBuf,
}

impl DirectoryAwbLocator {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Probe next to an ACB file
    pub fn beside(acb_path: &Path) -> Self {
        Self::new(acb_path.parent().unwrap_or_else(|| Path::new(".")))
    }
}

impl AwbLocator for DirectoryAwbLocator {
    fn locate(&self, file_name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(file_name);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }
}

/// One track with its audio bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTrack {
    /// `{track name}{extension}`
    pub file_name: String,
    pub track: Track,
    pub data: Vec<u8>,
}

/// ACB extractor with an injected archive locator and diagnostics sink
pub struct AcbExtractor {
    locator: Box<dyn AwbLocator>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for AcbExtractor {
    fn default() -> Self {
        Self {
            locator: Box::new(NoAwbLocator),
            sink: Arc::new(TracingSink),
        }
    }
}

impl std::fmt::Debug for AcbExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcbExtractor").finish_non_exhaustive()
    }
}

impl AcbExtractor {
    pub fn new(locator: Box<dyn AwbLocator>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { locator, sink }
    }

    pub fn with_locator(mut self, locator: Box<dyn AwbLocator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Extract every resolvable track; per-track failures are reported and skipped
    #[instrument(skip_all, fields(len = acb.len()))]
    pub fn extract(&self, acb: &[u8]) -> Result<Vec<ExtractedTrack>> {
        let header = UtfTable::parse(acb)?;
        let tracks = resolve_tracks(&header)?;

        let embedded = if header.has_field("AwbFile") {
            header.data(0, "AwbFile")?
        } else {
            &[][..]
        };
        let memory = if embedded.is_empty() {
            None
        } else {
            Some(Afs2Archive::parse(embedded)?)
        };

        let stream_blobs = self.load_stream_archives(&header);
        let mut streams = Vec::with_capacity(stream_blobs.len());
        for (name, blob) in &stream_blobs {
            match Afs2Archive::parse(blob) {
                Ok(archive) => streams.push(archive),
                Err(e) => self.sink.warn(
                    DiagnosticSource::Acb,
                    format!("skipping streaming archive {}: {}", name, e),
                ),
            }
        }

        let mut extracted = Vec::with_capacity(tracks.len());
        for track in tracks {
            match track_data(&track, memory.as_ref(), &streams) {
                Ok(data) => {
                    let file_name = format!("{}{}", track.name, track.encoding.extension());
                    extracted.push(ExtractedTrack {
                        file_name,
                        track,
                        data: data.to_vec(),
                    });
                }
                Err(e) => self.sink.warn(
                    DiagnosticSource::Acb,
                    format!("track {} (waveform {}): {}", track.name, track.waveform_id, e),
                ),
            }
        }

        tracing::debug!(tracks = extracted.len(), "extracted ACB");
        Ok(extracted)
    }

    /// `{Name}.awb` for every StreamAwbHash row that the locator can find
    fn load_stream_archives(&self, header: &UtfTable<'_>) -> Vec<(String, Vec<u8>)> {
        let hashes = match stream_hash_table(header) {
            Some(table) => table,
            None => return Vec::new(),
        };

        let mut found = Vec::new();
        for row in 0..hashes.row_count() {
            let name = match hashes.string(row, "Name") {
                Ok(name) => format!("{}.awb", name),
                Err(e) => {
                    tracing::debug!(row, error = %e, "StreamAwbHash row without name");
                    continue;
                }
            };
            match self.locator.locate(&name) {
                Ok(Some(blob)) => found.push((name, blob)),
                Ok(None) => tracing::debug!(%name, "streaming archive not present"),
                Err(e) => self.sink.warn(
                    DiagnosticSource::Acb,
                    format!("reading streaming archive {}: {}", name, e),
                ),
            }
        }
        found
    }
}

/// Missing, empty or unparsable hash tables all mean "no streaming archives"
fn stream_hash_table<'h>(header: &'h UtfTable<'_>) -> Option<UtfTable<'h>> {
    if !header.has_field("StreamAwbHash") {
        return None;
    }
    let blob = header.data(0, "StreamAwbHash").ok()?;
    if blob.is_empty() {
        return None;
    }
    match UtfTable::parse(blob) {
        Ok(table) => Some(table),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable StreamAwbHash");
            None
        }
    }
}

fn track_data<'a>(
    track: &Track,
    memory: Option<&Afs2Archive<'a>>,
    streams: &[Afs2Archive<'a>],
) -> Result<&'a [u8]> {
    let archive = if track.is_streamed {
        usize::try_from(track.stream_port)
            .ok()
            .and_then(|port| streams.get(port))
            .ok_or_else(|| {
                AssetError::not_found(format!(
                    "streaming archive for port {}",
                    track.stream_port
                ))
            })?
    } else {
        memory.ok_or_else(|| AssetError::not_found("embedded AWB archive"))?
    };
    archive.file_data_for_cue_id(track.waveform_id)
}

/// Write each track into `dir`, returning the written paths
pub fn write_tracks(dir: &Path, tracks: &[ExtractedTrack]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    tracks
        .iter()
        .map(|t| {
            let path = dir.join(&t.file_name);
            fs::write(&path, &t.data)?;
            Ok(path)
        })
        .collect()
}

/// Read an ACB file, probe for sibling `.awb` files and write every track into `dir`
pub fn extract_acb_file(
    path: &Path,
    dir: &Path,
    sink: Arc<dyn DiagnosticSink>,
) -> Result<Vec<PathBuf>> {
    let bytes = fs::read(path)?;
    let extractor =
        AcbExtractor::new(Box::new(DirectoryAwbLocator::beside(path)), sink);
    let tracks = extractor.extract(&bytes)?;
    write_tracks(dir, &tracks)
}
