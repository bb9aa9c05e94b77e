//! Track list to motion3 segments

use super::curves::{CurveSample, CurveTrack, TrackList};
use super::motion3::{
    MOTION3_VERSION, Motion3, Motion3Curve, Motion3Meta, Motion3UserData, SEGMENT_BEZIER,
    SEGMENT_INVERSE_STEPPED, SEGMENT_LINEAR, SEGMENT_STEPPED, Scalar, format_float,
};
use crate::clip::AnimationClip;

/// Gap of a single-frame hold at 100 fps
pub const HOLD_GAP: f64 = 0.01;
/// Tolerance of the hold gap and of zero slopes
pub const SLOPE_EPSILON: f64 = 1e-4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Totals {
    segments: usize,
    points: usize,
}

/// Build the motion3 document for `clip` from its grouped tracks
pub fn build_motion3(clip: &AnimationClip, tracks: &TrackList) -> Motion3 {
    let mut totals = Totals::default();
    let curves: Vec<Motion3Curve> = tracks
        .values()
        .map(|track| encode_track(track, &mut totals))
        .collect();

    let user_data: Vec<Motion3UserData> = clip
        .events
        .iter()
        .map(|event| Motion3UserData {
            time: format_float(event.time),
            value: event.data.clone(),
        })
        .collect();
    let total_user_data_size = clip.events.iter().map(|e| e.data.chars().count()).sum();

    Motion3 {
        version: MOTION3_VERSION,
        meta: Motion3Meta {
            duration: format_float(clip.stop_time),
            fps: clip.sample_rate,
            looped: true,
            are_beziers_restricted: true,
            curve_count: curves.len(),
            user_data_count: user_data.len(),
            total_segment_count: totals.segments,
            total_point_count: totals.points,
            total_user_data_size,
        },
        curves,
        user_data,
    }
}

fn encode_track(track: &CurveTrack, totals: &mut Totals) -> Motion3Curve {
    let samples = &track.samples;
    let mut segments = Vec::with_capacity(2 + samples.len().saturating_sub(1) * 3);

    if let Some(first) = samples.first() {
        segments.push(Scalar::Int(0));
        segments.push(format_float(first.value));
        totals.segments += 1;
        totals.points += 1;
    }

    for j in 1..samples.len() {
        let current = &samples[j];
        let previous = &samples[j - 1];

        if let Some(next) = samples.get(j + 1) {
            if is_hold(previous, current) && next.value == current.value {
                segments.extend([
                    Scalar::Int(SEGMENT_INVERSE_STEPPED),
                    format_float(next.time),
                    format_float(next.value),
                ]);
                totals.points += 1;
                totals.segments += 1;
                continue;
            }
        }

        if current.in_slope == f64::INFINITY {
            segments.extend([
                Scalar::Int(SEGMENT_STEPPED),
                format_float(current.time),
                format_float(current.value),
            ]);
        } else if previous.out_slope == 0.0 && current.in_slope.abs() < SLOPE_EPSILON {
            segments.extend([
                Scalar::Int(SEGMENT_LINEAR),
                format_float(current.time),
                format_float(current.value),
            ]);
        } else {
            let tangent = (current.time - previous.time) / 3.0;
            segments.extend([
                Scalar::Int(SEGMENT_BEZIER),
                format_float(previous.time + tangent),
                format_float(previous.out_slope * tangent + previous.value),
                format_float(current.time - tangent),
                format_float(current.value - current.in_slope * tangent),
                format_float(current.time),
                format_float(current.value),
            ]);
            totals.points += 2;
        }
        totals.points += 1;
        totals.segments += 1;
    }

    Motion3Curve {
        target: track.target,
        id: track.id.clone(),
        segments,
    }
}

fn is_hold(previous: &CurveSample, current: &CurveSample) -> bool {
    (current.time - previous.time - HOLD_GAP).abs() < SLOPE_EPSILON
}
