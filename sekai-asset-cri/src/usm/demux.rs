//! USM block walker
//!
//! Header blocks are visited in their fixed order, then data chunks are
//! appended to the video or audio stream until `#CONTENTS END`.

use super::mask::{UsmKey, UsmMask};
use super::table::{UsmRow, read_table};
use encoding_rs::SHIFT_JIS;
use sekai_asset_core::{
    AssetError, BinaryReader, ByteOrder, DiagnosticSink, DiagnosticSource, Result, TracingSink,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

pub const SIG_CRID: &[u8; 4] = b"CRID";
pub const SIG_VIDEO: &[u8; 4] = b"@SFV";
pub const SIG_AUDIO: &[u8; 4] = b"@SFA";

const HEADER_END: &[u8] = b"#HEADER END";
const METADATA_END: &[u8] = b"#METADATA END";
const CONTENTS_END: &[u8] = b"#CONTENTS END";

/// Metadata tables and markers sit this far into their block
const TABLE_OFFSET: usize = 0x20;
/// Payload position inside a data chunk
const PAYLOAD_OFFSET: usize = 0x20;

/// Demuxed elementary streams of one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsmStreams {
    /// Declared source file name
    pub filename: String,
    pub video: Vec<u8>,
    /// `None` for video-only containers
    pub audio: Option<Vec<u8>>,
}

impl UsmStreams {
    /// File name without directories or extension
    pub fn stem(&self) -> String {
        let normalized = self.filename.replace('\\', "/");
        Path::new(&normalized)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "movie".to_string())
    }
}

/// USM demuxer with an optional mask key
pub struct UsmDemuxer {
    mask: Option<UsmMask>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for UsmDemuxer {
    fn default() -> Self {
        Self {
            mask: None,
            sink: Arc::new(TracingSink),
        }
    }
}

impl std::fmt::Debug for UsmDemuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsmDemuxer")
            .field("masked", &self.mask.is_some())
            .finish_non_exhaustive()
    }
}

impl UsmDemuxer {
    pub fn new(key: Option<UsmKey>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            mask: key.map(UsmMask::new),
            sink,
        }
    }

    pub fn with_key(mut self, key: UsmKey) -> Self {
        self.mask = Some(UsmMask::new(key));
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    #[instrument(skip_all, fields(len = data.len()))]
    pub fn demux(&self, data: &[u8]) -> Result<UsmStreams> {
        let mut reader = BinaryReader::new(data, ByteOrder::Big);
        let mut offset = 0usize;

        let size = expect_block(&mut reader, offset, SIG_CRID)?;
        let entries = read_table_at(data, offset)?;
        let filename = self.decode_filename(&entries)?;
        offset = next_block(offset, size);

        let size = expect_block(&mut reader, offset, SIG_VIDEO)?;
        let video_meta = read_table_at(data, offset)?;
        tracing::trace!(rows = video_meta.len(), "video stream metadata");
        offset = next_block(offset, size);

        let has_audio = block_signature(data, offset) == Some(&SIG_AUDIO[..]);
        if has_audio {
            let size = expect_block(&mut reader, offset, SIG_AUDIO)?;
            let audio_meta = read_table_at(data, offset)?;
            tracing::trace!(rows = audio_meta.len(), "audio stream metadata");
            offset = next_block(offset, size);
        }

        let size = expect_block(&mut reader, offset, SIG_VIDEO)?;
        expect_marker(&reader, offset, HEADER_END)?;
        offset = next_block(offset, size);
        if has_audio {
            let size = expect_block(&mut reader, offset, SIG_AUDIO)?;
            expect_marker(&reader, offset, HEADER_END)?;
            offset = next_block(offset, size);
        }

        let size = expect_block(&mut reader, offset, SIG_VIDEO)?;
        let seek_table = read_table_at(data, offset)?;
        tracing::trace!(rows = seek_table.len(), "video seek table");
        offset = next_block(offset, size);

        let size = expect_block(&mut reader, offset, SIG_VIDEO)?;
        expect_marker(&reader, offset, METADATA_END)?;
        offset = next_block(offset, size);

        let mut streams = UsmStreams {
            filename,
            video: Vec::new(),
            audio: has_audio.then(Vec::new),
        };
        self.read_chunks(&mut reader, offset, &mut streams)?;

        tracing::debug!(
            filename = %streams.filename,
            video = streams.video.len(),
            audio = streams.audio.as_ref().map(Vec::len),
            "demuxed USM"
        );
        Ok(streams)
    }

    fn read_chunks(
        &self,
        reader: &mut BinaryReader<'_>,
        mut offset: usize,
        streams: &mut UsmStreams,
    ) -> Result<()> {
        loop {
            if offset.saturating_add(PAYLOAD_OFFSET) > reader.len() {
                self.sink.warn(
                    DiagnosticSource::Usm,
                    format!(
                        "{}: stream ended at {:#x} without #CONTENTS END",
                        streams.filename, offset
                    ),
                );
                return Ok(());
            }

            reader.set_position(offset as u64)?;
            let signature = reader.read_slice(4)?;
            let size = reader.read_u32()? as usize;
            let header_size = reader.read_u16()? as usize;
            let footer_size = reader.read_u16()? as usize;
            reader.skip(3)?;
            let data_type = reader.read_u8()? & 0b11;
            reader.skip(16)?;

            if reader.peek_slice(CONTENTS_END.len()) == Some(CONTENTS_END) {
                return Ok(());
            }

            let payload_len = size
                .checked_sub(header_size + footer_size)
                .ok_or_else(|| {
                    AssetError::format(format!(
                        "chunk at {:#x}: size {} smaller than header {} + footer {}",
                        offset, size, header_size, footer_size
                    ))
                })?;
            let payload = reader.slice_at(offset + PAYLOAD_OFFSET, payload_len)?;
            let encrypted = data_type == 0;

            if signature == SIG_VIDEO {
                let mut content = payload.to_vec();
                if let (true, Some(mask)) = (encrypted, &self.mask) {
                    mask.unmask_video(&mut content);
                }
                streams.video.extend_from_slice(&content);
            } else if signature == SIG_AUDIO {
                match streams.audio.as_mut() {
                    Some(audio) => {
                        let mut content = payload.to_vec();
                        if let (true, Some(mask)) = (encrypted, &self.mask) {
                            mask.unmask_audio(&mut content);
                        }
                        audio.extend_from_slice(&content);
                    }
                    None => self.sink.warn(
                        DiagnosticSource::Usm,
                        format!(
                            "{}: audio chunk at {:#x} without an audio stream",
                            streams.filename, offset
                        ),
                    ),
                }
            } else {
                tracing::trace!(
                    signature = %String::from_utf8_lossy(signature),
                    offset,
                    "skipping chunk"
                );
            }

            offset = next_block(offset, size);
        }
    }

    fn decode_filename(&self, entries: &[UsmRow]) -> Result<String> {
        let raw = entries
            .last()
            .and_then(|row| row.get("filename"))
            .and_then(|value| value.as_bytes())
            .ok_or_else(|| AssetError::format("CRID table has no filename"))?;
        let (name, _, had_errors) = SHIFT_JIS.decode(raw);
        if had_errors {
            self.sink.warn(
                DiagnosticSource::Usm,
                format!("file name {:?} is not valid Shift-JIS", name),
            );
        }
        Ok(name.into_owned())
    }
}

fn next_block(offset: usize, size: usize) -> usize {
    offset.saturating_add(8).saturating_add(size)
}

fn block_signature(data: &[u8], offset: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(4)?)
}

fn expect_block(reader: &mut BinaryReader<'_>, offset: usize, signature: &[u8; 4]) -> Result<usize> {
    reader.set_position(offset as u64)?;
    reader.expect_signature(signature)?;
    Ok(reader.read_u32()? as usize)
}

fn expect_marker(reader: &BinaryReader<'_>, offset: usize, marker: &[u8]) -> Result<()> {
    let found = reader.slice_at(offset + TABLE_OFFSET, marker.len())?;
    if found != marker {
        return Err(AssetError::invalid_signature(
            String::from_utf8_lossy(marker).into_owned(),
            String::from_utf8_lossy(found).into_owned(),
        ));
    }
    Ok(())
}

fn read_table_at(data: &[u8], offset: usize) -> Result<Vec<UsmRow>> {
    let start = offset + TABLE_OFFSET;
    let block = data
        .get(start..)
        .ok_or_else(|| AssetError::not_enough_data(start, data.len()))?;
    read_table(block)
}

/// Demux a USM file into `dir` as `{stem}.m2v` and, with audio, `{stem}.adx`
pub fn extract_usm_file(
    path: &Path,
    dir: &Path,
    key: Option<UsmKey>,
    sink: Arc<dyn DiagnosticSink>,
) -> Result<Vec<PathBuf>> {
    let bytes = fs::read(path)?;
    let streams = UsmDemuxer::new(key, sink).demux(&bytes)?;
    let stem = streams.stem();

    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(2);
    let video_path = dir.join(format!("{}.m2v", stem));
    fs::write(&video_path, &streams.video)?;
    written.push(video_path);
    if let Some(audio) = &streams.audio {
        let audio_path = dir.join(format!("{}.adx", stem));
        fs::write(&audio_path, audio)?;
        written.push(audio_path);
    }
    Ok(written)
}
