//! Sekai Asset
//!
//! Extraction of Project SEKAI game assets: CRI audio and movie containers
//! and Live2D motions stored as Unity animation clips.
//!
//! # Features
//!
//! - **ACB / AWB**: cue banks resolved to one HCA or ADX file per track
//! - **USM**: movie containers demuxed into MPEG video and ADX audio, with the
//!   per-title XOR mask removed
//! - **Live2D**: `AnimationClip` curves restored as motion3 documents, with
//!   parameter ids recovered from the model's moc3 file
//!
//! # Examples
//!
//! ```rust,no_run
//! use sekai_asset::{TracingSink, load_param_ids};
//! use sekai_asset::live2d::{DumpReader, MotionRestorer, restore_bundle_file};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(TracingSink);
//! let ids = load_param_ids(Path::new("live2d/model"), sink.as_ref())?;
//! let restorer = MotionRestorer::new(Arc::new(ids), sink);
//! restore_bundle_file(&DumpReader, &restorer, Path::new("21miku_motion_base.json"), Path::new("out"))?;
//!
//! # Ok::<(), sekai_asset::AssetError>(())
//! ```

// Re-export from core and format crates
pub use sekai_asset_core::{
    AssetError, BinaryReader, ByteOrder, CollectingSink, Diagnostic, DiagnosticSink,
    DiagnosticSource, ErrorKind, FieldMap, Result, TracingSink, UnityValue,
};

pub use sekai_asset_cri::{acb, afs2, usm, utf};
pub use sekai_asset_live2d as live2d;

pub use sekai_asset_cri::{AcbExtractor, UsmDemuxer, UsmKey};
pub use sekai_asset_live2d::{
    MOC3_EXTENSION, Motion3, MotionRestorer, ParamIdMap, find_moc3_files, load_param_ids,
};
