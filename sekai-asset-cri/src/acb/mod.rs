//! ACB (CRI Atom Cue Bank) support
//!
//! An ACB is a UTF table whose first row embeds further UTF tables (cues,
//! synths, tracks, waveforms, command bytecode) plus an optional AFS2
//! archive of in-memory waveforms. Streamed waveforms live in sibling
//! `.awb` files.

pub mod command;
pub mod extract;
pub mod tracks;

pub use command::{Command, CommandIter};
pub use extract::{
    AcbExtractor, AwbLocator, DirectoryAwbLocator, ExtractedTrack, NoAwbLocator,
    extract_acb_file, write_tracks,
};
pub use tracks::{AcbTables, Encoding, Track, resolve_tracks};
