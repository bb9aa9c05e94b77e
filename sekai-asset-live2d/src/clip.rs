//! AnimationClip fields needed for motion restoration

use crate::source::PPtr;
use sekai_asset_core::{AssetError, FieldAccess, FieldMap, Result, UnityValue};
use serde::{Deserialize, Serialize};

/// Class id of `Transform` in generic bindings
pub const TRANSFORM_TYPE_ID: i64 = 4;

const MUSCLE_CLIP: &str = "m_MuscleClip";
const CLIP_DATA: [&str; 3] = ["m_MuscleClip", "m_Clip", "data"];

/// One entry of `m_ClipBindingConstant.genericBindings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericBinding {
    /// CRC32 of the bound path
    pub path: u32,
    pub attribute: u32,
    pub script: PPtr,
    pub type_id: i64,
}

impl GenericBinding {
    pub fn from_value(value: &UnityValue) -> Result<Self> {
        let path = value.field_i64(&["path"])?;
        let attribute = value.field_i64(&["attribute"])?;
        Ok(Self {
            path: u32::try_from(path)
                .map_err(|_| AssetError::format(format!("binding path {} out of range", path)))?,
            attribute: u32::try_from(attribute).map_err(|_| {
                AssetError::format(format!("binding attribute {} out of range", attribute))
            })?,
            script: PPtr::from_value(value.field(&["script"])?)?,
            type_id: value.field_i64(&["typeID"])?,
        })
    }

    /// Number of flattened curves this binding drives
    pub fn curve_width(&self) -> u32 {
        if self.type_id != TRANSFORM_TYPE_ID {
            return 1;
        }
        match self.attribute {
            // position, scale, euler
            1 | 3 | 4 => 3,
            // rotation quaternion
            2 => 4,
            _ => 1,
        }
    }
}

/// Binding that owns flattened curve `index`
pub fn find_binding(bindings: &[GenericBinding], index: u32) -> Option<&GenericBinding> {
    let mut curves = 0u64;
    for binding in bindings {
        curves += binding.curve_width() as u64;
        if curves > index as u64 {
            return Some(binding);
        }
    }
    None
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseClip {
    pub frame_count: usize,
    pub curve_count: usize,
    pub sample_rate: f64,
    pub begin_time: f64,
    pub samples: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationEvent {
    pub time: f64,
    pub data: String,
}

/// The decoded parts of an `AnimationClip`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub sample_rate: f64,
    pub stop_time: f64,
    /// `m_StreamedClip.data` as 32-bit words
    pub streamed: Vec<u32>,
    pub streamed_curve_count: usize,
    pub dense: DenseClip,
    pub constant: Vec<f64>,
    pub bindings: Vec<GenericBinding>,
    pub events: Vec<AnimationEvent>,
}

impl AnimationClip {
    pub fn from_fields(fields: &FieldMap) -> Result<Self> {
        let clip_data = fields.field(&CLIP_DATA)?;

        let streamed = clip_data
            .field_array(&["m_StreamedClip", "data"])?
            .iter()
            .map(word)
            .collect::<Result<Vec<_>>>()?;
        let streamed_curve_count = count(clip_data, &["m_StreamedClip", "curveCount"])?;

        let dense = DenseClip {
            frame_count: count(clip_data, &["m_DenseClip", "m_FrameCount"])?,
            curve_count: count(clip_data, &["m_DenseClip", "m_CurveCount"])?,
            sample_rate: clip_data.field_f64(&["m_DenseClip", "m_SampleRate"])?,
            begin_time: clip_data.field_f64(&["m_DenseClip", "m_BeginTime"])?,
            samples: floats(clip_data.field_array(&["m_DenseClip", "m_SampleArray"])?)?,
        };
        let constant = floats(clip_data.field_array(&["m_ConstantClip", "data"])?)?;

        let bindings = fields
            .field_array(&["m_ClipBindingConstant", "genericBindings"])?
            .iter()
            .map(GenericBinding::from_value)
            .collect::<Result<Vec<_>>>()?;

        let events = match fields.get("m_Events").and_then(UnityValue::as_array) {
            Some(events) => events
                .iter()
                .map(|e| {
                    Ok(AnimationEvent {
                        time: e.field_f64(&["time"])?,
                        data: e.field_str(&["data"])?.to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            name: fields.field_str(&["m_Name"])?.to_string(),
            sample_rate: fields.field_f64(&["m_SampleRate"])?,
            stop_time: fields.field_f64(&[MUSCLE_CLIP, "m_StopTime"])?,
            streamed,
            streamed_curve_count,
            dense,
            constant,
            bindings,
            events,
        })
    }
}

fn word(value: &UnityValue) -> Result<u32> {
    value
        .as_i64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| AssetError::format(format!("streamed clip word {:?} is not a u32", value)))
}

fn count(value: &UnityValue, path: &[&str]) -> Result<usize> {
    let raw = value.field_i64(path)?;
    usize::try_from(raw)
        .map_err(|_| AssetError::format(format!("{} is negative: {}", path.join("."), raw)))
}

fn floats(values: &[UnityValue]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| AssetError::format(format!("sample {:?} is not a number", v)))
        })
        .collect()
}
