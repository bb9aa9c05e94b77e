//! UTF table parsing
//!
//! Header, schema and rows are decoded in one pass. String and data cells
//! stay [`Lazy::Deferred`] until a caller asks for them; their ranges are
//! checked against the buffer while parsing so resolution cannot fail on
//! bounds later.

use super::types::*;
use binrw::BinRead;
use sekai_asset_core::{AssetError, BinaryReader, ByteOrder, Result};
use std::io::Cursor;

/// Absolute positions of the three regions addressed by the header
#[derive(Debug, Clone, Copy)]
struct Layout {
    rows: usize,
    strings: usize,
    data: usize,
}

impl Layout {
    fn new(header: &UtfHeader, len: usize) -> Result<Self> {
        let layout = Self {
            rows: header.row_offset as usize + OFFSET_BASE,
            strings: header.string_table_offset as usize + OFFSET_BASE,
            data: header.data_offset as usize + OFFSET_BASE,
        };
        for (what, offset) in [
            ("row", layout.rows),
            ("string table", layout.strings),
            ("data", layout.data),
        ] {
            if offset > len {
                return Err(AssetError::format(format!(
                    "UTF {} offset {:#x} outside {:#x}-byte buffer",
                    what, offset, len
                )));
            }
        }
        Ok(layout)
    }

    /// Rows run up to the string table, or to the end when it comes first
    fn row_region(&self, len: usize) -> usize {
        if self.strings >= self.rows {
            self.strings - self.rows
        } else {
            len - self.rows
        }
    }
}

/// A parsed UTF table borrowing its backing buffer
#[derive(Debug, Clone)]
pub struct UtfTable<'a> {
    data: &'a [u8],
    header: UtfHeader,
    name: String,
    fields: Vec<Field>,
    rows: Vec<Row>,
}

impl<'a> UtfTable<'a> {
    /// Parse a table from the start of `data`
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = UtfHeader::read(&mut Cursor::new(data))?;
        let layout = Layout::new(&header, data.len())?;
        let mut reader = BinaryReader::new(data, ByteOrder::Big);

        let name = string_at(&reader, layout.strings + header.table_name_offset as usize)?;

        reader.set_position(SCHEMA_OFFSET as u64)?;
        let mut fields = Vec::with_capacity(header.field_count as usize);
        let mut constants = Vec::new();
        for _ in 0..header.field_count {
            let tag = reader.read_u8()?;
            let name_offset = reader.read_u32()? as usize;
            let storage = StorageKind::from_tag(tag)?;
            let type_tag = TypeTag::try_from(tag & TYPE_MASK)?;
            let field_name = string_at(&reader, layout.strings + name_offset)?;

            if storage == StorageKind::Constant {
                let value = read_value(&mut reader, type_tag, &layout)?;
                constants.push((field_name.clone(), value));
            }
            fields.push(Field {
                name: field_name,
                type_tag,
                storage,
            });
        }

        let row_width = fields
            .iter()
            .filter(|f| f.storage == StorageKind::PerRow)
            .map(|f| f.type_tag.width())
            .sum();
        check_row_count(header.row_count, row_width, layout.row_region(data.len()))?;

        reader.set_position(layout.rows as u64)?;
        let mut rows = Vec::with_capacity(header.row_count as usize);
        for _ in 0..header.row_count {
            let mut row = Row::with_capacity(fields.len());
            for field in &fields {
                match field.storage {
                    StorageKind::PerRow => {
                        let value = read_value(&mut reader, field.type_tag, &layout)?;
                        row.insert(field.name.clone(), value);
                    }
                    StorageKind::Zero => {
                        row.insert(field.name.clone(), field.type_tag.default_value());
                    }
                    StorageKind::Constant => {}
                }
            }
            for (field_name, value) in &constants {
                row.insert(field_name.clone(), value.clone());
            }
            rows.push(row);
        }

        tracing::trace!(
            table = %name,
            fields = fields.len(),
            rows = rows.len(),
            "parsed UTF table"
        );

        Ok(Self {
            data,
            header,
            name,
            fields,
            rows,
        })
    }

    pub fn header(&self) -> &UtfHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw cell lookup
    pub fn get(&self, row: usize, field: &str) -> Result<&Value> {
        let cells = self.rows.get(row).ok_or_else(|| {
            AssetError::format(format!(
                "row {} out of range in table {} ({} rows)",
                row,
                self.name,
                self.rows.len()
            ))
        })?;
        cells.get(field).ok_or_else(|| {
            AssetError::format(format!("table {} has no field {}", self.name, field))
        })
    }

    /// String cell, borrowed from the buffer when still deferred
    pub fn string(&self, row: usize, field: &str) -> Result<&str> {
        match self.get(row, field)? {
            Value::String(lazy) => self.lazy_str(lazy),
            _ => Err(self.type_mismatch(field, "string")),
        }
    }

    /// Data cell, borrowed from the buffer when still deferred
    pub fn data(&self, row: usize, field: &str) -> Result<&[u8]> {
        match self.get(row, field)? {
            Value::Data(lazy) => self.lazy_bytes(lazy),
            _ => Err(self.type_mismatch(field, "data")),
        }
    }

    pub fn uint(&self, row: usize, field: &str) -> Result<u64> {
        self.get(row, field)?
            .as_u64()
            .ok_or_else(|| self.type_mismatch(field, "unsigned integer"))
    }

    pub fn int(&self, row: usize, field: &str) -> Result<i64> {
        self.get(row, field)?
            .as_i64()
            .ok_or_else(|| self.type_mismatch(field, "integer"))
    }

    pub fn float(&self, row: usize, field: &str) -> Result<f64> {
        self.get(row, field)?
            .as_f64()
            .ok_or_else(|| self.type_mismatch(field, "float"))
    }

    /// Copy a deferred value out of the buffer
    pub fn resolve(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::String(lazy) => Value::string(self.lazy_str(lazy)?),
            Value::Data(lazy) => Value::data(self.lazy_bytes(lazy)?),
            other => other.clone(),
        })
    }

    /// Every row with all strings and blobs owned
    pub fn materialize(&self) -> Result<Vec<Row>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve(v)?)))
                    .collect::<Result<Row>>()
            })
            .collect()
    }

    fn lazy_str<'s>(&'s self, lazy: &'s Lazy<String>) -> Result<&'s str> {
        match lazy {
            Lazy::Resolved(s) => Ok(s.as_str()),
            Lazy::Deferred { offset, len } => Ok(std::str::from_utf8(self.span(*offset, *len)?)?),
        }
    }

    fn lazy_bytes<'s>(&'s self, lazy: &'s Lazy<Vec<u8>>) -> Result<&'s [u8]> {
        match lazy {
            Lazy::Resolved(b) => Ok(b.as_slice()),
            Lazy::Deferred { offset, len } => self.span(*offset, *len),
        }
    }

    fn span(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.data
            .get(offset..offset + len)
            .ok_or_else(|| AssetError::not_enough_data(offset + len, self.data.len()))
    }

    fn type_mismatch(&self, field: &str, expected: &str) -> AssetError {
        AssetError::format(format!(
            "field {} of table {} is not a {}",
            field, self.name, expected
        ))
    }
}

fn string_at(reader: &BinaryReader<'_>, offset: usize) -> Result<String> {
    Ok(std::str::from_utf8(reader.cstring_at(offset)?)?.to_string())
}

fn read_value(reader: &mut BinaryReader<'_>, type_tag: TypeTag, layout: &Layout) -> Result<Value> {
    Ok(match type_tag {
        TypeTag::U8 => Value::UInt(reader.read_u8()? as u64),
        TypeTag::I8 => Value::Int(reader.read_i8()? as i64),
        TypeTag::U16 => Value::UInt(reader.read_u16()? as u64),
        TypeTag::I16 => Value::Int(reader.read_i16()? as i64),
        TypeTag::U32 => Value::UInt(reader.read_u32()? as u64),
        TypeTag::I32 => Value::Int(reader.read_i32()? as i64),
        TypeTag::U64 => Value::UInt(reader.read_u64()?),
        TypeTag::I64 => Value::Int(reader.read_i64()?),
        TypeTag::F32 => Value::Float(reader.read_f32()?),
        TypeTag::F64 => Value::Double(reader.read_f64()?),
        TypeTag::String => {
            let offset = layout.strings + reader.read_u32()? as usize;
            let len = reader.cstring_at(offset)?.len();
            Value::String(Lazy::Deferred { offset, len })
        }
        TypeTag::Data => {
            let offset = layout.data + reader.read_u32()? as usize;
            let len = reader.read_u32()? as usize;
            reader.slice_at(offset, len)?;
            Value::Data(Lazy::Deferred { offset, len })
        }
    })
}
