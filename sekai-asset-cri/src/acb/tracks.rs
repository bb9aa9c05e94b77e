//! ACB track resolution
//!
//! Walks Cue → (Sequence) → Track → command bytecode → Synth → Waveform
//! and produces one [`Track`] per waveform reference, named after the cue.

use super::command::{Command, CommandIter};
use crate::utf::UtfTable;
use sekai_asset_core::{AssetError, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Track event index meaning "no event"
pub const NO_EVENT: u64 = 0xFFFF;

/// Cue reference types this resolver understands
pub const REFERENCE_TYPE_SEQUENCE: u64 = 3;
pub const REFERENCE_TYPE_BLOCK_SEQUENCE: u64 = 8;

/// Waveform encode type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Encoding {
    Adx,
    Hca,
    Vag,
    Atrac3,
    Bcwav,
    Dsp,
    Unknown(u64),
}

impl Encoding {
    pub fn from_tag(tag: u64) -> Self {
        match tag {
            0 => Encoding::Adx,
            2 => Encoding::Hca,
            7 => Encoding::Vag,
            8 => Encoding::Atrac3,
            9 => Encoding::Bcwav,
            13 => Encoding::Dsp,
            other => Encoding::Unknown(other),
        }
    }

    /// File name suffix; unknown tags fall back to the bare decimal tag
    pub fn extension(&self) -> String {
        match self {
            Encoding::Adx => ".adx".to_string(),
            Encoding::Hca => ".hca".to_string(),
            Encoding::Vag => ".vag".to_string(),
            Encoding::Atrac3 => ".at3".to_string(),
            Encoding::Bcwav => ".bcwav".to_string(),
            Encoding::Dsp => ".dsp".to_string(),
            Encoding::Unknown(tag) => tag.to_string(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Unknown(tag) => write!(f, "unknown({})", tag),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A waveform reference reachable from a cue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    /// The cue's `ReferenceIndex`
    pub cue_id: u64,
    /// Disambiguated display name
    pub name: String,
    /// AWB cue id of the blob
    pub waveform_id: u64,
    pub encoding: Encoding,
    pub is_streamed: bool,
    /// Index of the streaming archive, -1 for in-memory waveforms
    pub stream_port: i64,
}

/// The sub-tables embedded in row 0 of an ACB header table
#[derive(Debug)]
pub struct AcbTables<'h> {
    pub cues: UtfTable<'h>,
    pub cue_names: UtfTable<'h>,
    pub waveforms: UtfTable<'h>,
    pub synths: UtfTable<'h>,
    pub tracks: UtfTable<'h>,
    pub events: UtfTable<'h>,
    /// Absent or empty means flat mode
    pub sequences: Option<UtfTable<'h>>,
}

impl<'h> AcbTables<'h> {
    pub fn from_header(header: &'h UtfTable<'_>) -> Result<Self> {
        let events = match optional_blob(header, "TrackEventTable")? {
            Some(blob) => blob,
            None => header.data(0, "CommandTable")?,
        };
        let sequences = match optional_blob(header, "SequenceTable")? {
            Some(blob) => Some(UtfTable::parse(blob)?).filter(|t| !t.is_empty()),
            None => None,
        };

        Ok(Self {
            cues: UtfTable::parse(header.data(0, "CueTable")?)?,
            cue_names: UtfTable::parse(header.data(0, "CueNameTable")?)?,
            waveforms: UtfTable::parse(header.data(0, "WaveformTable")?)?,
            synths: UtfTable::parse(header.data(0, "SynthTable")?)?,
            tracks: UtfTable::parse(header.data(0, "TrackTable")?)?,
            events: UtfTable::parse(events)?,
            sequences,
        })
    }
}

/// Non-empty blob of an optional header column
fn optional_blob<'h>(header: &'h UtfTable<'_>, field: &str) -> Result<Option<&'h [u8]>> {
    if !header.has_field(field) {
        return Ok(None);
    }
    let blob = header.data(0, field)?;
    Ok(if blob.is_empty() { None } else { Some(blob) })
}

/// Resolve every track of an ACB header table
pub fn resolve_tracks(header: &UtfTable<'_>) -> Result<Vec<Track>> {
    let tables = AcbTables::from_header(header)?;
    TrackResolver::new(&tables)?.resolve()
}

struct TrackResolver<'t, 'h> {
    tables: &'t AcbTables<'h>,
    names: HashMap<u64, String>,
    used: HashSet<String>,
    resolved: Vec<Track>,
}

impl<'t, 'h> TrackResolver<'t, 'h> {
    fn new(tables: &'t AcbTables<'h>) -> Result<Self> {
        let mut names = HashMap::new();
        for row in 0..tables.cue_names.row_count() {
            let index = tables.cue_names.uint(row, "CueIndex")?;
            let name = tables.cue_names.string(row, "CueName")?;
            names.insert(index, name.to_string());
        }
        Ok(Self {
            tables,
            names,
            used: HashSet::new(),
            resolved: Vec::new(),
        })
    }

    fn resolve(mut self) -> Result<Vec<Track>> {
        let tables = self.tables;
        let cues = &tables.cues;
        for cue in 0..cues.row_count() {
            let reference_type = cues.uint(cue, "ReferenceType")?;
            if reference_type != REFERENCE_TYPE_SEQUENCE
                && reference_type != REFERENCE_TYPE_BLOCK_SEQUENCE
            {
                return Err(AssetError::unsupported(format!(
                    "cue ReferenceType {}",
                    reference_type
                )));
            }
            let reference_index = cues.uint(cue, "ReferenceIndex")?;

            match &tables.sequences {
                Some(sequences) => {
                    let row = reference_index as usize;
                    let count = sequences.uint(row, "NumTracks")? as usize;
                    let indices = sequences.data(row, "TrackIndex")?;
                    for i in 0..count {
                        let pair = indices.get(i * 2..i * 2 + 2).ok_or_else(|| {
                            AssetError::format(format!(
                                "sequence {} lists {} tracks but has {} index bytes",
                                row,
                                count,
                                indices.len()
                            ))
                        })?;
                        let track = u16::from_be_bytes([pair[0], pair[1]]) as usize;
                        self.run_track(reference_index, track)?;
                    }
                }
                None => {
                    for track in 0..tables.tracks.row_count() {
                        self.run_track(reference_index, track)?;
                    }
                }
            }
        }
        Ok(self.resolved)
    }

    fn run_track(&mut self, reference_index: u64, track: usize) -> Result<()> {
        let tables = self.tables;
        let event_index = tables.tracks.uint(track, "EventIndex")?;
        if event_index == NO_EVENT {
            return Ok(());
        }
        let blob = tables.events.data(event_index as usize, "Command")?;
        for command in CommandIter::new(blob) {
            match command? {
                Command::SetWaveform { synth_index } => {
                    self.add_waveform(reference_index, synth_index as usize)?;
                }
                Command::SetStartOffset(offset) => {
                    tracing::trace!(track, offset, "ignoring start offset");
                }
                Command::Other { .. } => {}
            }
        }
        Ok(())
    }

    fn add_waveform(&mut self, reference_index: u64, synth: usize) -> Result<()> {
        let tables = self.tables;
        let items = tables.synths.data(synth, "ReferenceItems")?;
        if items.len() < 4 {
            return Ok(());
        }
        let kind = u16::from_be_bytes([items[0], items[1]]);
        let waveform = u16::from_be_bytes([items[2], items[3]]) as usize;
        if kind != 1 {
            return Ok(());
        }

        let waveforms = &tables.waveforms;
        let is_streamed = waveforms.uint(waveform, "Streaming")? != 0;
        let encoding = Encoding::from_tag(waveforms.uint(waveform, "EncodeType")?);
        let (waveform_id, stream_port) = if is_streamed {
            (
                waveforms.uint(waveform, "StreamAwbId")?,
                waveforms.int(waveform, "StreamAwbPortNo")?,
            )
        } else {
            (waveforms.uint(waveform, "MemoryAwbId")?, -1)
        };

        let base = self
            .names
            .get(&reference_index)
            .cloned()
            .unwrap_or_else(|| format!("UNKNOWN-{}", reference_index));
        let name = disambiguate(&self.used, base, waveform_id);
        self.used.insert(name.clone());

        tracing::debug!(%name, waveform_id, %encoding, is_streamed, "resolved track");
        self.resolved.push(Track {
            cue_id: reference_index,
            name,
            waveform_id,
            encoding,
            is_streamed,
            stream_port,
        });
        Ok(())
    }
}

/// `name`, else `name-{id}`, else `name-{id+1}`
fn disambiguate(used: &HashSet<String>, name: String, waveform_id: u64) -> String {
    if !used.contains(&name) {
        return name;
    }
    let candidate = format!("{}-{}", name, waveform_id);
    if used.contains(&candidate) {
        format!("{}-{}", name, waveform_id + 1)
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_disambiguation() {
        let mut used = HashSet::new();
        let mut names = Vec::new();
        for id in [5, 5, 6] {
            let name = disambiguate(&used, "bgm".to_string(), id);
            used.insert(name.clone());
            names.push(name);
        }
        assert_eq!(names, vec!["bgm", "bgm-5", "bgm-6"]);
    }

    #[test]
    fn test_taken_variant_bumps_id() {
        let used: HashSet<String> = ["se".to_string(), "se-3".to_string()].into();
        assert_eq!(disambiguate(&used, "se".to_string(), 3), "se-4");
    }

    #[test]
    fn test_extensions() {
        assert_eq!(Encoding::from_tag(2).extension(), ".hca");
        assert_eq!(Encoding::from_tag(7).extension(), ".vag");
        assert_eq!(Encoding::from_tag(8).extension(), ".at3");
        assert_eq!(Encoding::from_tag(13).extension(), ".dsp");
        assert_eq!(Encoding::from_tag(19).extension(), "19");
    }
}
