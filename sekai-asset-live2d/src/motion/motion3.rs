//! motion3.json document model

use serde::{Deserialize, Serialize};

pub const MOTION3_VERSION: u32 = 3;

/// Segment type tags
pub const SEGMENT_LINEAR: i64 = 0;
pub const SEGMENT_BEZIER: i64 = 1;
pub const SEGMENT_STEPPED: i64 = 2;
pub const SEGMENT_INVERSE_STEPPED: i64 = 3;

/// A number as written to the document: integral values without a fraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(i) => *i as f64,
            Scalar::Float(f) => *f,
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

/// Integral floats collapse to integers, everything else rounds to 3 decimals
pub fn format_float(value: f64) -> Scalar {
    if !value.is_finite() {
        return Scalar::Float(value);
    }
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Scalar::Int(value as i64);
    }
    let rounded = format!("{:.3}", value).parse().unwrap_or(value);
    Scalar::Float(rounded)
}

/// Curve owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Parameter,
    PartOpacity,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Motion3Meta {
    pub duration: Scalar,
    pub fps: f64,
    #[serde(rename = "Loop")]
    pub looped: bool,
    pub are_beziers_restricted: bool,
    pub curve_count: usize,
    pub user_data_count: usize,
    pub total_segment_count: usize,
    pub total_point_count: usize,
    pub total_user_data_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Motion3Curve {
    pub target: Target,
    pub id: String,
    pub segments: Vec<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Motion3UserData {
    pub time: Scalar,
    pub value: String,
}

/// A restored motion3 document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Motion3 {
    pub version: u32,
    pub meta: Motion3Meta,
    pub curves: Vec<Motion3Curve>,
    pub user_data: Vec<Motion3UserData>,
}

impl Motion3 {
    pub fn curve(&self, id: &str) -> Option<&Motion3Curve> {
        self.curves.iter().find(|c| c.id == id)
    }
}
