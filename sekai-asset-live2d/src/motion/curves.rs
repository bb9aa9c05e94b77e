//! Flattened clip curves grouped into motion tracks
//!
//! Streamed, dense and constant curves share one index space (in that
//! order). Each index is mapped to its generic binding, the binding's
//! script picks the motion3 target, and samples are appended to the track
//! named after the binding.

use super::motion3::Target;
use crate::clip::{AnimationClip, GenericBinding, find_binding};
use crate::source::PPtr;
use crate::streamed::StreamedFrame;
use indexmap::IndexMap;
use sekai_asset_core::{AssetError, Result};
use std::collections::HashMap;

/// Resolves the `m_Name` of a binding's script
pub trait ScriptLookup {
    fn script_name(&self, script: PPtr) -> Result<String>;
}

impl<F> ScriptLookup for F
where
    F: Fn(PPtr) -> Result<String>,
{
    fn script_name(&self, script: PPtr) -> Result<String> {
        self(script)
    }
}

/// Target and fixed id for a Cubism component script; `None` means the binding path
pub fn script_target(script_name: &str) -> Option<(Target, Option<&'static str>)> {
    Some(match script_name {
        "CubismParameter" => (Target::Parameter, None),
        "CubismPart" => (Target::PartOpacity, None),
        "CubismRenderController" => (Target::Model, Some("Opacity")),
        "CubismEyeBlinkController" => (Target::Model, Some("EyeBlink")),
        "CubismMouthController" => (Target::Model, Some("LipSync")),
        _ => return None,
    })
}

/// One keyframe of a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSample {
    pub time: f64,
    pub value: f64,
    pub in_slope: f64,
    pub out_slope: f64,
}

impl CurveSample {
    /// Sample without tangents (dense and constant curves)
    pub fn flat(time: f64, value: f64) -> Self {
        Self {
            time,
            value,
            in_slope: 0.0,
            out_slope: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurveTrack {
    pub target: Target,
    pub id: String,
    pub samples: Vec<CurveSample>,
}

/// Tracks keyed by id, in order of first appearance
pub type TrackList = IndexMap<String, CurveTrack>;

/// Maps curve indices to `(target, id)` with a per-clip cache
struct BindingResolver<'c, S: ?Sized> {
    bindings: &'c [GenericBinding],
    scripts: &'c S,
    resolved: HashMap<u32, (Target, String)>,
    script_names: HashMap<PPtr, String>,
}

impl<'c, S: ScriptLookup + ?Sized> BindingResolver<'c, S> {
    fn new(bindings: &'c [GenericBinding], scripts: &'c S) -> Self {
        Self {
            bindings,
            scripts,
            resolved: HashMap::new(),
            script_names: HashMap::new(),
        }
    }

    fn resolve(&mut self, index: u32) -> Result<(Target, String)> {
        if let Some(hit) = self.resolved.get(&index) {
            return Ok(hit.clone());
        }
        let binding =
            find_binding(self.bindings, index).ok_or_else(|| AssetError::binding_not_found(index))?;

        let script_name = match self.script_names.get(&binding.script) {
            Some(name) => name.clone(),
            None => {
                let name = self.scripts.script_name(binding.script)?;
                self.script_names.insert(binding.script, name.clone());
                name
            }
        };
        let (target, fixed_id) = script_target(&script_name).ok_or_else(|| {
            AssetError::unsupported(format!("binding script {} for curve {}", script_name, index))
        })?;
        let id = match fixed_id {
            Some(id) => id.to_string(),
            None => binding.path.to_string(),
        };

        self.resolved.insert(index, (target, id.clone()));
        Ok((target, id))
    }
}

fn push_sample(tracks: &mut TrackList, target: Target, id: String, sample: CurveSample) {
    tracks
        .entry(id)
        .or_insert_with_key(|id| CurveTrack {
            target,
            id: id.clone(),
            samples: Vec::new(),
        })
        .samples
        .push(sample);
}

/// Group every curve of `clip` into tracks
pub fn collect_tracks<S: ScriptLookup + ?Sized>(
    clip: &AnimationClip,
    frames: &[StreamedFrame],
    scripts: &S,
) -> Result<TrackList> {
    let mut resolver = BindingResolver::new(&clip.bindings, scripts);
    let mut tracks = TrackList::new();

    for frame in frames {
        for key in &frame.keys {
            let (target, id) = resolver.resolve(key.index)?;
            push_sample(
                &mut tracks,
                target,
                id,
                CurveSample {
                    time: frame.time,
                    value: key.value,
                    in_slope: key.in_slope,
                    out_slope: key.out_slope,
                },
            );
        }
    }

    let dense = &clip.dense;
    let stream_count = clip.streamed_curve_count;
    if dense.frame_count > 0 && dense.curve_count > 0 && dense.sample_rate <= 0.0 {
        return Err(AssetError::format(format!(
            "dense clip sample rate {}",
            dense.sample_rate
        )));
    }
    for frame in 0..dense.frame_count {
        let time = dense.begin_time + frame as f64 / dense.sample_rate;
        for curve in 0..dense.curve_count {
            let at = frame * dense.curve_count + curve;
            let value = *dense.samples.get(at).ok_or_else(|| {
                AssetError::format(format!(
                    "dense sample {} missing ({} samples)",
                    at,
                    dense.samples.len()
                ))
            })?;
            let (target, id) = resolver.resolve(curve_index(stream_count + curve)?)?;
            push_sample(&mut tracks, target, id, CurveSample::flat(time, value));
        }
    }

    let constant_base = stream_count + dense.curve_count;
    for time in [0.0, clip.stop_time] {
        for (curve, &value) in clip.constant.iter().enumerate() {
            let (target, id) = resolver.resolve(curve_index(constant_base + curve)?)?;
            push_sample(&mut tracks, target, id, CurveSample::flat(time, value));
        }
    }

    Ok(tracks)
}

fn curve_index(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| AssetError::format(format!("curve index {} too large", index)))
}
