//! Sekai Asset Core
//!
//! Building blocks shared by the container readers and the motion decoder:
//! the error taxonomy, a cursor-based binary reader, the field value tree
//! handed over by an asset reader, and the diagnostics sink.

pub mod diagnostics;
pub mod error;
pub mod reader;
pub mod value;

// Re-export main types
pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticSink, DiagnosticSource, TracingSink,
};
pub use error::{AssetError, ErrorKind, ErrorSeverity, Result};
pub use reader::{BinaryReader, ByteOrder};
pub use value::{FieldAccess, FieldMap, UnityValue};
