//! Motion restoration
//!
//! An [`AnimationClip`] is decoded into per-curve tracks and re-encoded as a
//! motion3 document:
//!
//! 1. [`decode_streamed`] turns the streamed words into frames and
//!    back-solves in-slopes.
//! 2. [`collect_tracks`] merges streamed, dense and constant curves into
//!    tracks keyed by their bound id.
//! 3. [`build_motion3`] classifies every keyframe pair into motion3 segments.

pub mod builder;
pub mod curves;
pub mod motion3;

pub use builder::build_motion3;
pub use curves::{CurveSample, CurveTrack, ScriptLookup, TrackList, collect_tracks, script_target};
pub use motion3::{Motion3, Motion3Curve, Motion3Meta, Motion3UserData, Scalar, Target, format_float};

use crate::clip::AnimationClip;
use crate::streamed::decode_streamed;
use sekai_asset_core::Result;

/// Decode every curve of `clip` and build its motion3 document
pub fn restore_motion<S: ScriptLookup + ?Sized>(clip: &AnimationClip, scripts: &S) -> Result<Motion3> {
    let frames = decode_streamed(&clip.streamed)?;
    let tracks = collect_tracks(clip, &frames, scripts)?;
    tracing::debug!(
        clip = %clip.name,
        frames = frames.len(),
        tracks = tracks.len(),
        "restored motion tracks"
    );
    Ok(build_motion3(clip, &tracks))
}
