//! UTF table reader
//!
//! The self-describing columnar table used as the schema layer of ACB
//! and USM containers. A table is a big-endian header, a schema of
//! tagged columns, packed rows, a NUL-terminated string table and a
//! data region for byte blobs.

pub mod builder;
pub mod parser;
pub mod types;

pub use builder::UtfTableBuilder;
pub use parser::UtfTable;
pub use types::{Field, Lazy, Row, StorageKind, TypeTag, UtfHeader, Value};
