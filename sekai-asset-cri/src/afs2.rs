//! AFS2 archive reader
//!
//! A cue-indexed blob archive: little-endian header, a cue id table,
//! then `file_count + 1` offsets whose successive differences give the
//! entry sizes. Offsets are aligned up to the declared alignment.

use binrw::BinRead;
use sekai_asset_core::{AssetError, BinaryReader, ByteOrder, Result};
use std::io::Cursor;

/// Cue ids start right after the fixed header
pub const ENTRY_TABLE_OFFSET: u64 = 0x10;

/// Fixed AFS2 header
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little, magic = b"AFS2")]
pub struct Afs2Header {
    /// Byte 1 is the offset width, byte 2 the cue id width
    pub version: [u8; 4],
    pub file_count: u32,
    pub alignment: u32,
}

impl Afs2Header {
    pub fn offset_width(&self) -> usize {
        self.version[1] as usize
    }

    pub fn cue_id_width(&self) -> usize {
        self.version[2] as usize
    }
}

/// One blob of the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Afs2Entry {
    pub cue_id: u64,
    /// Aligned start offset
    pub offset: u64,
    pub size: u64,
}

/// A parsed archive borrowing its backing buffer
#[derive(Debug, Clone)]
pub struct Afs2Archive<'a> {
    data: &'a [u8],
    header: Afs2Header,
    entries: Vec<Afs2Entry>,
}

impl<'a> Afs2Archive<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = Afs2Header::read(&mut Cursor::new(data))?;
        let offset_width = checked_width(header.offset_width(), "offset")?;
        let cue_id_width = checked_width(header.cue_id_width(), "cue id")?;
        let alignment = header.alignment.max(1) as u64;
        let mask = if offset_width == 4 { 0xFFFF_FFFF } else { 0xFFFF };

        let count = header.file_count as usize;
        let mut reader = BinaryReader::new(data, ByteOrder::Little);
        reader.set_position(ENTRY_TABLE_OFFSET)?;

        let table_len = count * cue_id_width + (count + 1) * offset_width;
        if !reader.has_bytes(table_len) {
            return Err(AssetError::not_enough_data(table_len, reader.remaining()));
        }

        let cue_ids = (0..count)
            .map(|_| reader.read_uint_sized(cue_id_width))
            .collect::<Result<Vec<_>>>()?;
        let aligned = (0..=count)
            .map(|_| {
                let raw = reader.read_uint_sized(offset_width)? & mask;
                Ok(raw.div_ceil(alignment) * alignment)
            })
            .collect::<Result<Vec<_>>>()?;

        let entries = cue_ids
            .iter()
            .zip(aligned.windows(2))
            .map(|(&cue_id, pair)| Afs2Entry {
                cue_id,
                offset: pair[0],
                size: pair[1].saturating_sub(pair[0]),
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            files = count,
            alignment,
            offset_width,
            "parsed AFS2 archive"
        );

        Ok(Self {
            data,
            header,
            entries,
        })
    }

    pub fn header(&self) -> &Afs2Header {
        &self.header
    }

    pub fn entries(&self) -> &[Afs2Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes of one entry, clamped to the end of the buffer
    pub fn file_data(&self, entry: &Afs2Entry) -> Result<&'a [u8]> {
        let len = self.data.len() as u64;
        if entry.offset > len {
            return Err(AssetError::format(format!(
                "AFS2 entry {} starts at {:#x} past end of {:#x}-byte archive",
                entry.cue_id, entry.offset, len
            )));
        }
        let end = entry.offset.saturating_add(entry.size).min(len);
        Ok(&self.data[entry.offset as usize..end as usize])
    }

    /// Exact cue id match; single-blob archives (first cue id 0) answer every id
    pub fn file_data_for_cue_id(&self, cue_id: u64) -> Result<&'a [u8]> {
        if let Some(entry) = self.entries.iter().find(|e| e.cue_id == cue_id) {
            return self.file_data(entry);
        }
        match self.entries.first() {
            Some(first) if first.cue_id == 0 => self.file_data(first),
            _ => Err(AssetError::not_found(format!(
                "cue id {} not in AFS2 archive",
                cue_id
            ))),
        }
    }
}

fn checked_width(width: usize, what: &str) -> Result<usize> {
    match width {
        2 | 4 => Ok(width),
        other => Err(AssetError::unsupported(format!(
            "AFS2 {} width {}",
            what, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(cue_ids: &[u16], raw_offsets: &[u32], alignment: u32, len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"AFS2");
        out.extend_from_slice(&[1, 4, 2, 0]);
        out.extend_from_slice(&(cue_ids.len() as u32).to_le_bytes());
        out.extend_from_slice(&alignment.to_le_bytes());
        for id in cue_ids {
            out.extend_from_slice(&id.to_le_bytes());
        }
        for offset in raw_offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        let pattern = (0..len).map(|i| (i % 251) as u8);
        out.extend(pattern.skip(out.len()));
        out
    }

    #[test]
    fn test_offsets_are_aligned() {
        let data = archive(&[16, 17], &[0, 100, 250], 32, 300);
        let afs = Afs2Archive::parse(&data).unwrap();

        let offsets: Vec<u64> = afs.entries().iter().map(|e| e.offset).collect();
        let sizes: Vec<u64> = afs.entries().iter().map(|e| e.size).collect();
        assert_eq!(offsets, vec![0, 128]);
        assert_eq!(sizes, vec![128, 128]);

        let blob = afs.file_data_for_cue_id(17).unwrap();
        assert_eq!(blob, &data[128..256]);
    }

    #[test]
    fn test_reads_are_clamped() {
        let data = archive(&[16, 17], &[0, 100, 250], 32, 250);
        let afs = Afs2Archive::parse(&data).unwrap();
        assert_eq!(afs.file_data_for_cue_id(17).unwrap().len(), 250 - 128);
    }

    #[test]
    fn test_missing_cue() {
        let data = archive(&[16, 17], &[0, 100, 250], 32, 300);
        let afs = Afs2Archive::parse(&data).unwrap();
        assert!(matches!(
            afs.file_data_for_cue_id(5),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn test_single_blob_fallback() {
        let data = archive(&[0], &[0x20, 0x60], 32, 0x60);
        let afs = Afs2Archive::parse(&data).unwrap();
        assert_eq!(afs.file_data_for_cue_id(42).unwrap(), &data[0x20..0x60]);
    }

    #[test]
    fn test_bad_magic_and_widths() {
        let mut data = archive(&[1], &[0, 4], 4, 32);
        data[0] = b'X';
        assert!(matches!(Afs2Archive::parse(&data), Err(AssetError::Format(_))));

        let mut data = archive(&[1], &[0, 4], 4, 32);
        data[5] = 3;
        assert!(matches!(
            Afs2Archive::parse(&data),
            Err(AssetError::UnsupportedFormat(_))
        ));
    }
}
