//! Parameter id recovery from moc3 name tables
//!
//! Curve ids of a restored clip are CRC32 hashes of the bound path. A moc3
//! file carries the part and parameter names in fixed 64-byte slots, so
//! hashing every name (bare and with its hierarchy prefix) gives the map
//! back to readable ids.

use crate::motion::Motion3;
use sekai_asset_core::{BinaryReader, ByteOrder, DiagnosticSink, DiagnosticSource, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Width of one name slot
pub const NAME_SLOT_SIZE: usize = 64;

const PARTS_RANGE_OFFSET: u64 = 0x4C;
const PARAMETERS_RANGE_OFFSET: u64 = 0x108;
const PARTS_PREFIX: &[u8] = b"Parts/";
const PARAMETERS_PREFIX: &[u8] = b"Parameters/";

/// Decimal CRC32 string to part or parameter name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamIdMap {
    ids: BTreeMap<String, String>,
}

impl ParamIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read both name tables of a moc3 file
    pub fn from_moc3(data: &[u8]) -> Result<Self> {
        let mut map = Self::new();
        let mut reader = BinaryReader::new(data, ByteOrder::Little);
        map.read_table(&mut reader, PARTS_RANGE_OFFSET, PARTS_PREFIX)?;
        map.read_table(&mut reader, PARAMETERS_RANGE_OFFSET, PARAMETERS_PREFIX)?;
        tracing::debug!(ids = map.len(), "read moc3 name tables");
        Ok(map)
    }

    pub fn from_moc3_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_moc3(&data)
    }

    fn read_table(
        &mut self,
        reader: &mut BinaryReader<'_>,
        range_offset: u64,
        prefix: &[u8],
    ) -> Result<()> {
        reader.set_position(range_offset)?;
        let base = reader.read_u32()? as usize;
        let end = reader.read_u32()? as usize;

        let mut cursor = base;
        while end.saturating_sub(cursor) > NAME_SLOT_SIZE {
            let raw = reader.cstring_at(cursor)?;
            let name = std::str::from_utf8(raw)?;

            let mut prefixed = Vec::with_capacity(prefix.len() + raw.len());
            prefixed.extend_from_slice(prefix);
            prefixed.extend_from_slice(raw);

            self.insert(crc32fast::hash(raw), name);
            self.insert(crc32fast::hash(&prefixed), name);
            cursor += NAME_SLOT_SIZE;
        }
        Ok(())
    }

    fn insert(&mut self, hash: u32, name: &str) {
        self.ids.insert(hash.to_string(), name.to_string());
    }

    /// Merge another map, later names win on collisions
    pub fn merge(&mut self, other: ParamIdMap) {
        self.ids.extend(other.ids);
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.ids.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ids.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rewrite the curve ids of `motion`; unknown ids stay as they are
    ///
    /// Returns the number of ids that could not be resolved.
    pub fn correct(&self, name: &str, motion: &mut Motion3, sink: &dyn DiagnosticSink) -> usize {
        let mut misses = 0;
        for curve in &mut motion.curves {
            match self.ids.get(&curve.id) {
                Some(resolved) => curve.id = resolved.clone(),
                None => {
                    misses += 1;
                    sink.warn(
                        DiagnosticSource::ParamIds,
                        format!("unable to find key {} in file {}", curve.id, name),
                    );
                }
            }
        }
        misses
    }
}

impl Extend<(String, String)> for ParamIdMap {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.ids.extend(iter);
    }
}

impl FromIterator<(String, String)> for ParamIdMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
