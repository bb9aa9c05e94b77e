//! Eager UTF reader for USM metadata blocks
//!
//! USM tables are read from a buffer that starts at the first schema byte
//! (`@UTF` + 0x20), so every header offset is rebased by -24. All cells are
//! materialized immediately; strings stay raw bytes because CRID file names
//! are Shift-JIS.

use crate::utf::types::{
    OFFSET_BASE, SCHEMA_OFFSET, StorageKind, TYPE_MASK, TypeTag, UtfHeader, check_row_count,
};
use binrw::BinRead;
use indexmap::IndexMap;
use sekai_asset_core::{AssetError, BinaryReader, ByteOrder, Result};
use std::io::Cursor;

/// Distance between header-relative offsets and body-relative offsets
pub const REBASE: usize = SCHEMA_OFFSET - OFFSET_BASE;

#[derive(Debug, Clone, PartialEq)]
pub enum UsmValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    String(Vec<u8>),
    Data(Vec<u8>),
}

impl UsmValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            UsmValue::String(b) | UsmValue::Data(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            UsmValue::UInt(v) => Some(*v),
            UsmValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

pub type UsmRow = IndexMap<String, UsmValue>;

/// Read the table whose `@UTF` magic starts `block`
pub fn read_table(block: &[u8]) -> Result<Vec<UsmRow>> {
    let header = UtfHeader::read(&mut Cursor::new(block))?;
    let body_len = (header.table_size as usize)
        .checked_sub(REBASE)
        .ok_or_else(|| AssetError::format(format!("USM table size {} too small", header.table_size)))?;
    let body = block
        .get(SCHEMA_OFFSET..SCHEMA_OFFSET + body_len)
        .ok_or_else(|| AssetError::not_enough_data(SCHEMA_OFFSET + body_len, block.len()))?;

    let strings = rebase(header.string_table_offset as usize)?;
    let data = rebase(header.data_offset as usize)?;
    let rows_at = rebase(header.row_offset as usize)?;

    let mut reader = BinaryReader::new(body, ByteOrder::Big);
    let mut columns = Vec::with_capacity(header.field_count as usize);
    let mut constants = Vec::new();
    for _ in 0..header.field_count {
        let tag = reader.read_u8()?;
        let name_offset = reader.read_u32()? as usize;
        let storage = StorageKind::from_tag(tag)?;
        let type_tag = TypeTag::try_from(tag & TYPE_MASK)?;
        let name = String::from_utf8_lossy(reader.cstring_at(strings + name_offset)?).into_owned();
        if storage == StorageKind::Constant {
            constants.push((name.clone(), read_cell(&mut reader, type_tag, strings, data)?));
        }
        columns.push((name, type_tag, storage));
    }

    let row_width = columns
        .iter()
        .filter(|(_, _, storage)| *storage == StorageKind::PerRow)
        .map(|(_, type_tag, _)| type_tag.width())
        .sum();
    let region = if strings >= rows_at {
        strings - rows_at
    } else {
        body.len().saturating_sub(rows_at)
    };
    check_row_count(header.row_count, row_width, region)?;

    reader.set_position(rows_at as u64)?;
    let mut rows = Vec::with_capacity(header.row_count as usize);
    for _ in 0..header.row_count {
        let mut row = UsmRow::with_capacity(columns.len());
        for (name, type_tag, storage) in &columns {
            match storage {
                StorageKind::PerRow => {
                    row.insert(name.clone(), read_cell(&mut reader, *type_tag, strings, data)?);
                }
                StorageKind::Zero => {
                    row.insert(name.clone(), zero_cell(*type_tag));
                }
                StorageKind::Constant => {}
            }
        }
        for (name, value) in &constants {
            row.insert(name.clone(), value.clone());
        }
        rows.push(row);
    }
    Ok(rows)
}

fn rebase(offset: usize) -> Result<usize> {
    offset
        .checked_sub(REBASE)
        .ok_or_else(|| AssetError::format(format!("USM table offset {:#x} before schema", offset)))
}

fn read_cell(
    reader: &mut BinaryReader<'_>,
    type_tag: TypeTag,
    strings: usize,
    data: usize,
) -> Result<UsmValue> {
    Ok(match type_tag {
        TypeTag::U8 => UsmValue::UInt(reader.read_u8()? as u64),
        TypeTag::I8 => UsmValue::Int(reader.read_i8()? as i64),
        TypeTag::U16 => UsmValue::UInt(reader.read_u16()? as u64),
        TypeTag::I16 => UsmValue::Int(reader.read_i16()? as i64),
        TypeTag::U32 => UsmValue::UInt(reader.read_u32()? as u64),
        TypeTag::I32 => UsmValue::Int(reader.read_i32()? as i64),
        TypeTag::U64 => UsmValue::UInt(reader.read_u64()?),
        TypeTag::I64 => UsmValue::Int(reader.read_i64()?),
        TypeTag::F32 => UsmValue::Float(reader.read_f32()? as f64),
        TypeTag::F64 => UsmValue::Float(reader.read_f64()?),
        TypeTag::String => {
            let offset = reader.read_u32()? as usize;
            UsmValue::String(reader.cstring_at(strings + offset)?.to_vec())
        }
        TypeTag::Data => {
            let offset = reader.read_u32()? as usize;
            let len = reader.read_u32()? as usize;
            UsmValue::Data(reader.slice_at(data + offset, len)?.to_vec())
        }
    })
}

fn zero_cell(type_tag: TypeTag) -> UsmValue {
    match type_tag {
        TypeTag::I8 | TypeTag::I16 | TypeTag::I32 | TypeTag::I64 => UsmValue::Int(0),
        TypeTag::F32 | TypeTag::F64 => UsmValue::Float(0.0),
        TypeTag::String => UsmValue::String(Vec::new()),
        TypeTag::Data => UsmValue::Data(Vec::new()),
        _ => UsmValue::UInt(0),
    }
}
