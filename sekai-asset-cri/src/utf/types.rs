//! UTF table data structures
//!
//! Column descriptors, the closed set of column types and storage kinds,
//! and the value model with deferred string/data references.

use binrw::BinRead;
use indexmap::IndexMap;
use sekai_asset_core::{AssetError, Result};
use serde::Serialize;

/// `@UTF`
pub const UTF_MAGIC: [u8; 4] = *b"@UTF";

/// The schema starts right after the fixed header
pub const SCHEMA_OFFSET: usize = 0x20;

/// Every offset stored in the header is relative to this position
pub const OFFSET_BASE: usize = 8;

pub const STORAGE_MASK: u8 = 0xF0;
pub const TYPE_MASK: u8 = 0x0F;

/// Column value type (low nibble of the column tag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum TypeTag {
    U8 = 0x0,
    I8 = 0x1,
    U16 = 0x2,
    I16 = 0x3,
    U32 = 0x4,
    I32 = 0x5,
    U64 = 0x6,
    I64 = 0x7,
    F32 = 0x8,
    F64 = 0x9,
    String = 0xA,
    Data = 0xB,
}

impl TypeTag {
    /// Number of bytes a value of this type occupies in a row or in the schema
    pub fn width(self) -> usize {
        match self {
            TypeTag::U8 | TypeTag::I8 => 1,
            TypeTag::U16 | TypeTag::I16 => 2,
            TypeTag::U32 | TypeTag::I32 | TypeTag::F32 | TypeTag::String => 4,
            TypeTag::U64 | TypeTag::I64 | TypeTag::F64 | TypeTag::Data => 8,
        }
    }

    /// Value carried by zero-storage columns
    pub fn default_value(self) -> Value {
        match self {
            TypeTag::U8 | TypeTag::U16 | TypeTag::U32 | TypeTag::U64 => Value::UInt(0),
            TypeTag::I8 | TypeTag::I16 | TypeTag::I32 | TypeTag::I64 => Value::Int(0),
            TypeTag::F32 => Value::Float(0.0),
            TypeTag::F64 => Value::Double(0.0),
            TypeTag::String => Value::String(Lazy::Resolved(String::new())),
            TypeTag::Data => Value::Data(Lazy::Resolved(Vec::new())),
        }
    }
}

impl TryFrom<u8> for TypeTag {
    type Error = AssetError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x0 => TypeTag::U8,
            0x1 => TypeTag::I8,
            0x2 => TypeTag::U16,
            0x3 => TypeTag::I16,
            0x4 => TypeTag::U32,
            0x5 => TypeTag::I32,
            0x6 => TypeTag::U64,
            0x7 => TypeTag::I64,
            0x8 => TypeTag::F32,
            0x9 => TypeTag::F64,
            0xA => TypeTag::String,
            0xB => TypeTag::Data,
            other => {
                return Err(AssetError::unsupported(format!(
                    "UTF column type {:#x}",
                    other
                )));
            }
        })
    }
}

/// Where a column's value lives (high nibble of the column tag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageKind {
    /// No stored bytes; every row gets the type's default value
    Zero,
    /// Stored once in the schema and copied into every row
    Constant,
    /// Stored in every row
    PerRow,
}

impl StorageKind {
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag & STORAGE_MASK {
            0x10 => Ok(StorageKind::Zero),
            0x30 | 0x70 => Ok(StorageKind::Constant),
            0x50 => Ok(StorageKind::PerRow),
            other => Err(AssetError::unsupported(format!(
                "UTF column storage {:#x}",
                other
            ))),
        }
    }

    pub fn tag_bits(self) -> u8 {
        match self {
            StorageKind::Zero => 0x10,
            StorageKind::Constant => 0x30,
            StorageKind::PerRow => 0x50,
        }
    }
}

/// A string or byte blob that may still point into the table buffer
#[derive(Debug, Clone, PartialEq)]
pub enum Lazy<T> {
    Resolved(T),
    /// Absolute byte range inside the owning buffer, already bounds-checked
    Deferred { offset: usize, len: usize },
}

impl<T> Lazy<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Lazy::Resolved(_))
    }
}

/// One cell of a table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(Lazy<String>),
    Data(Lazy<Vec<u8>>),
}

impl Value {
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::String(Lazy::Resolved(s.into()))
    }

    pub fn data<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Value::Data(Lazy::Resolved(bytes.into()))
    }

    /// Integer view; signed values must be non-negative
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether every string/data payload has been copied out of the buffer
    pub fn is_resolved(&self) -> bool {
        match self {
            Value::String(lazy) => lazy.is_resolved(),
            Value::Data(lazy) => lazy.is_resolved(),
            _ => true,
        }
    }
}

/// Column descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub type_tag: TypeTag,
    pub storage: StorageKind,
}

/// Field name to value, in schema order with constants last
pub type Row = IndexMap<String, Value>;

/// Most rows a table may declare when its rows occupy no bytes
pub const MAX_EMPTY_ROWS: u32 = 0x10000;

/// Reject a declared row count that the row region cannot hold
pub fn check_row_count(row_count: u32, row_width: usize, region: usize) -> Result<()> {
    if row_width == 0 {
        if row_count > MAX_EMPTY_ROWS {
            return Err(AssetError::format(format!(
                "UTF table declares {} rows without stored cells",
                row_count
            )));
        }
        return Ok(());
    }
    let needed = row_count as u64 * row_width as u64;
    if needed > region as u64 {
        return Err(AssetError::format(format!(
            "UTF table declares {} rows of {} bytes but the row region holds {:#x} bytes",
            row_count, row_width, region
        )));
    }
    Ok(())
}

/// Parsed fixed header; offsets are relative to [`OFFSET_BASE`]
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[br(big, magic = b"@UTF")]
pub struct UtfHeader {
    pub table_size: u32,
    pub version: u16,
    pub row_offset: u16,
    pub string_table_offset: u32,
    pub data_offset: u32,
    pub table_name_offset: u32,
    pub field_count: u16,
    pub row_size: u16,
    pub row_count: u32,
}
