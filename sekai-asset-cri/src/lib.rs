//! Sekai Asset CRI
//!
//! Readers for CRI middleware containers:
//!
//! - [`utf`]: the columnar UTF table every other format is built on
//! - [`afs2`]: the AWB blob archive
//! - [`acb`]: cue banks, resolved down to one audio file per track
//! - [`usm`]: movie containers, demuxed into video and audio streams
//!
//! # Example
//!
//! ```rust,no_run
//! use sekai_asset_cri::acb::AcbExtractor;
//!
//! let bytes = std::fs::read("se_common.acb")?;
//! for track in AcbExtractor::default().extract(&bytes)? {
//!     println!("{} ({} bytes)", track.file_name, track.data.len());
//! }
//! # Ok::<(), sekai_asset_core::AssetError>(())
//! ```

pub mod acb;
pub mod afs2;
pub mod usm;
pub mod utf;

// Re-export main types
pub use acb::{AcbExtractor, AwbLocator, DirectoryAwbLocator, ExtractedTrack, Track};
pub use afs2::{Afs2Archive, Afs2Entry};
pub use usm::{UsmDemuxer, UsmKey, UsmStreams};
pub use utf::{UtfTable, UtfTableBuilder};

pub use sekai_asset_core::{AssetError, Result};
