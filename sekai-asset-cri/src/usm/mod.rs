//! USM movie containers
//!
//! [`UsmDemuxer`] splits a container into its video (`.m2v`) and audio
//! (`.adx`) elementary streams, removing the payload mask when a key is
//! known.

pub mod demux;
pub mod mask;
pub mod table;

pub use demux::{UsmDemuxer, UsmStreams, extract_usm_file};
pub use mask::{UsmKey, UsmMask, seed_table};
pub use table::{UsmRow, UsmValue, read_table};
