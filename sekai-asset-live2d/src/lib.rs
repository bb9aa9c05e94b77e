//! Sekai Asset Live2D
//!
//! Restores Live2D motions from Unity `AnimationClip` objects: streamed,
//! dense and constant curves are decoded, grouped per bound parameter and
//! re-encoded as motion3 documents. Curve ids are CRC32 hashes; a
//! [`ParamIdMap`] read from the model's moc3 file turns them back into
//! names.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sekai_asset_live2d::{DumpReader, MotionRestorer, ParamIdMap, restore_bundle_file};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let ids = ParamIdMap::from_moc3_file("models/21miku/21miku.moc3")?;
//! let restorer = MotionRestorer::default().with_param_ids(Arc::new(ids));
//! let written = restore_bundle_file(
//!     &DumpReader,
//!     &restorer,
//!     Path::new("motion/21miku_motion_base.json"),
//!     Path::new("out"),
//! )?;
//! println!("wrote {} files", written.len());
//! # Ok::<(), sekai_asset_core::AssetError>(())
//! ```

pub mod build_motion;
pub mod clip;
pub mod models;
pub mod motion;
pub mod param_ids;
pub mod source;
pub mod streamed;

// Re-export main types
pub use build_motion::{
    BuildMotionOutput, MotionIndex, MotionRef, MotionRestorer, RestoredMotion, motion_save_dir,
    restore_bundle_file,
};
pub use clip::{AnimationClip, AnimationEvent, DenseClip, GenericBinding};
pub use models::{MOC3_EXTENSION, find_moc3_files, load_param_ids};
pub use motion::{Motion3, Scalar, Target, restore_motion};
pub use param_ids::ParamIdMap;
pub use source::{
    AssetContainer, AssetReader, DumpContainer, DumpObject, DumpReader, PPtr, TypedObject,
};
pub use streamed::{StreamedFrame, StreamedKey, decode_streamed};

pub use sekai_asset_core::{AssetError, Result};
