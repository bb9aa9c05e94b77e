//! UTF table encoding
//!
//! Produces buffers in the exact layout [`UtfTable::parse`](super::UtfTable::parse)
//! reads: fixed header, schema (with inline constants), packed rows, string
//! table starting with `<NULL>`, then the 8-byte aligned data region.

use super::types::*;
use byteorder::{BigEndian, WriteBytesExt};
use indexmap::IndexMap;
use sekai_asset_core::{AssetError, Result};

#[derive(Debug, Clone)]
struct Column {
    name: String,
    type_tag: TypeTag,
    storage: StorageKind,
    constant: Option<Value>,
}

#[derive(Debug, Default)]
struct StringPool {
    bytes: Vec<u8>,
    offsets: IndexMap<String, u32>,
}

impl StringPool {
    fn add(&mut self, s: &str) -> u32 {
        if let Some(offset) = self.offsets.get(s) {
            return *offset;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }
}

/// Builder for UTF table buffers
#[derive(Debug, Clone)]
pub struct UtfTableBuilder {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl UtfTableBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add a per-row column
    pub fn column<S: Into<String>>(mut self, name: S, type_tag: TypeTag) -> Self {
        self.columns.push(Column {
            name: name.into(),
            type_tag,
            storage: StorageKind::PerRow,
            constant: None,
        });
        self
    }

    /// Add a column stored once in the schema
    pub fn constant<S: Into<String>>(mut self, name: S, type_tag: TypeTag, value: Value) -> Self {
        self.columns.push(Column {
            name: name.into(),
            type_tag,
            storage: StorageKind::Constant,
            constant: Some(value),
        });
        self
    }

    /// Add a column without stored bytes
    pub fn zero<S: Into<String>>(mut self, name: S, type_tag: TypeTag) -> Self {
        self.columns.push(Column {
            name: name.into(),
            type_tag,
            storage: StorageKind::Zero,
            constant: None,
        });
        self
    }

    /// Append a row; values follow the per-row columns in declaration order
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let mut strings = StringPool::default();
        let mut data = Vec::new();
        strings.add("<NULL>");
        let name_offset = strings.add(&self.name);

        let mut schema = Vec::new();
        for column in &self.columns {
            schema.write_u8(column.storage.tag_bits() | column.type_tag as u8)?;
            schema.write_u32::<BigEndian>(strings.add(&column.name))?;
            if let Some(value) = &column.constant {
                write_value(&mut schema, column.type_tag, value, &mut strings, &mut data)?;
            }
        }

        let per_row: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| c.storage == StorageKind::PerRow)
            .collect();
        let row_size: usize = per_row.iter().map(|c| c.type_tag.width()).sum();

        let mut rows = Vec::with_capacity(row_size * self.rows.len());
        for (index, values) in self.rows.iter().enumerate() {
            if values.len() != per_row.len() {
                return Err(AssetError::format(format!(
                    "row {} has {} values for {} columns",
                    index,
                    values.len(),
                    per_row.len()
                )));
            }
            for (column, value) in per_row.iter().zip(values) {
                write_value(&mut rows, column.type_tag, value, &mut strings, &mut data)?;
            }
        }

        let rows_start = SCHEMA_OFFSET + schema.len();
        let strings_start = rows_start + rows.len();
        let data_start = (strings_start + strings.bytes.len()).div_ceil(8) * 8;
        let total = data_start + data.len();

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&UTF_MAGIC);
        out.write_u32::<BigEndian>(to_u32(total - OFFSET_BASE)?)?;
        out.write_u16::<BigEndian>(1)?;
        out.write_u16::<BigEndian>(to_u16(rows_start - OFFSET_BASE, "row offset")?)?;
        out.write_u32::<BigEndian>(to_u32(strings_start - OFFSET_BASE)?)?;
        out.write_u32::<BigEndian>(to_u32(data_start - OFFSET_BASE)?)?;
        out.write_u32::<BigEndian>(name_offset)?;
        out.write_u16::<BigEndian>(to_u16(self.columns.len(), "field count")?)?;
        out.write_u16::<BigEndian>(to_u16(row_size, "row size")?)?;
        out.write_u32::<BigEndian>(to_u32(self.rows.len())?)?;
        out.extend_from_slice(&schema);
        out.extend_from_slice(&rows);
        out.extend_from_slice(&strings.bytes);
        out.resize(data_start, 0);
        out.extend_from_slice(&data);
        Ok(out)
    }
}

fn write_value(
    out: &mut Vec<u8>,
    type_tag: TypeTag,
    value: &Value,
    strings: &mut StringPool,
    data: &mut Vec<u8>,
) -> Result<()> {
    match type_tag {
        TypeTag::U8 => out.write_u8(narrow(unsigned(value)?)?)?,
        TypeTag::I8 => out.write_i8(narrow(signed(value)?)?)?,
        TypeTag::U16 => out.write_u16::<BigEndian>(narrow(unsigned(value)?)?)?,
        TypeTag::I16 => out.write_i16::<BigEndian>(narrow(signed(value)?)?)?,
        TypeTag::U32 => out.write_u32::<BigEndian>(narrow(unsigned(value)?)?)?,
        TypeTag::I32 => out.write_i32::<BigEndian>(narrow(signed(value)?)?)?,
        TypeTag::U64 => out.write_u64::<BigEndian>(unsigned(value)?)?,
        TypeTag::I64 => out.write_i64::<BigEndian>(signed(value)?)?,
        TypeTag::F32 => out.write_f32::<BigEndian>(float(value)? as f32)?,
        TypeTag::F64 => out.write_f64::<BigEndian>(float(value)?)?,
        TypeTag::String => match value {
            Value::String(Lazy::Resolved(s)) => out.write_u32::<BigEndian>(strings.add(s))?,
            _ => return Err(AssetError::format("string column needs a resolved string")),
        },
        TypeTag::Data => match value {
            Value::Data(Lazy::Resolved(bytes)) => {
                out.write_u32::<BigEndian>(to_u32(data.len())?)?;
                out.write_u32::<BigEndian>(to_u32(bytes.len())?)?;
                data.extend_from_slice(bytes);
            }
            _ => return Err(AssetError::format("data column needs resolved bytes")),
        },
    }
    Ok(())
}

fn unsigned(value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| AssetError::format(format!("{:?} is not an unsigned integer", value)))
}

fn signed(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| AssetError::format(format!("{:?} is not an integer", value)))
}

fn float(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| AssetError::format(format!("{:?} is not a float", value)))
}

fn narrow<T, U>(value: T) -> Result<U>
where
    T: Copy + std::fmt::Display,
    U: TryFrom<T>,
{
    U::try_from(value).map_err(|_| AssetError::format(format!("{} does not fit the column", value)))
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| AssetError::format("table larger than 4 GiB"))
}

fn to_u16(value: usize, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| AssetError::format(format!("{} {} exceeds u16", what, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utf::UtfTable;

    #[test]
    fn test_round_trip_with_constant_broadcast() {
        let bytes = UtfTableBuilder::new("Waveform")
            .column("MemoryAwbId", TypeTag::U16)
            .column("EncodeType", TypeTag::U8)
            .column("Gain", TypeTag::F32)
            .column("Offset", TypeTag::I64)
            .column("Extra", TypeTag::Data)
            .constant("Streaming", TypeTag::U8, Value::UInt(0))
            .constant("Label", TypeTag::String, Value::string("wave"))
            .zero("StreamAwbPortNo", TypeTag::U16)
            .row(vec![
                Value::UInt(4),
                Value::UInt(2),
                Value::Float(0.5),
                Value::Int(-3),
                Value::data(vec![1u8, 2, 3]),
            ])
            .row(vec![
                Value::UInt(9),
                Value::UInt(0),
                Value::Float(1.0),
                Value::Int(7),
                Value::data(Vec::<u8>::new()),
            ])
            .build()
            .unwrap();

        let table = UtfTable::parse(&bytes).unwrap();
        let rows = table.materialize().unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0]["MemoryAwbId"], Value::UInt(4));
        assert_eq!(rows[0]["Gain"], Value::Float(0.5));
        assert_eq!(rows[0]["Offset"], Value::Int(-3));
        assert_eq!(rows[0]["Extra"], Value::data(vec![1u8, 2, 3]));
        assert_eq!(rows[1]["MemoryAwbId"], Value::UInt(9));
        assert_eq!(rows[1]["Extra"], Value::data(Vec::<u8>::new()));
        for row in &rows {
            assert_eq!(row["Streaming"], Value::UInt(0));
            assert_eq!(row["Label"], Value::string("wave"));
            assert_eq!(row["StreamAwbPortNo"], Value::UInt(0));
        }
    }

    #[test]
    fn test_row_arity_is_checked() {
        let result = UtfTableBuilder::new("T")
            .column("A", TypeTag::U8)
            .row(vec![])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_value_range_is_checked() {
        let result = UtfTableBuilder::new("T")
            .column("A", TypeTag::U8)
            .row(vec![Value::UInt(256)])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_header_layout() {
        let bytes = UtfTableBuilder::new("Empty").build().unwrap();
        assert_eq!(&bytes[..4], b"@UTF");
        let table = UtfTable::parse(&bytes).unwrap();
        assert_eq!(table.name(), "Empty");
        assert!(table.is_empty());
        assert_eq!(bytes.len() % 8, 0);
    }
}
