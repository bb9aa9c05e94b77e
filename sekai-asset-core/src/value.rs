//! Field values handed over by an external asset reader
//!
//! `UnityValue` is the decoded shape of a Unity serialized object's fields as
//! a container dump carries them. Byte blobs arrive as integer arrays.

use crate::error::{AssetError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered field map of one typed object
pub type FieldMap = IndexMap<String, UnityValue>;

/// A field value of a Unity serialized object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnityValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<UnityValue>),
    Object(FieldMap),
}

impl UnityValue {
    /// Get as integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            UnityValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            UnityValue::Float(f) => Some(*f),
            UnityValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            UnityValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&Vec<UnityValue>> {
        match self {
            UnityValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&FieldMap> {
        match self {
            UnityValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Look up a key of an object value
    pub fn get(&self, key: &str) -> Option<&UnityValue> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Walk nested objects, e.g. `["m_MuscleClip", "m_StopTime"]`
    pub fn path(&self, keys: &[&str]) -> Option<&UnityValue> {
        keys.iter().try_fold(self, |value, key| value.get(key))
    }
}

/// Typed accessors over a field map with descriptive errors
pub trait FieldAccess {
    fn field(&self, path: &[&str]) -> Result<&UnityValue>;

    fn field_f64(&self, path: &[&str]) -> Result<f64> {
        self.field(path)?
            .as_f64()
            .ok_or_else(|| type_error(path, "a number"))
    }

    fn field_i64(&self, path: &[&str]) -> Result<i64> {
        self.field(path)?
            .as_i64()
            .ok_or_else(|| type_error(path, "an integer"))
    }

    fn field_str(&self, path: &[&str]) -> Result<&str> {
        self.field(path)?
            .as_str()
            .ok_or_else(|| type_error(path, "a string"))
    }

    fn field_array(&self, path: &[&str]) -> Result<&Vec<UnityValue>> {
        self.field(path)?
            .as_array()
            .ok_or_else(|| type_error(path, "an array"))
    }
}

impl FieldAccess for FieldMap {
    fn field(&self, path: &[&str]) -> Result<&UnityValue> {
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| AssetError::format("empty field path"))?;
        self.get(*first)
            .and_then(|v| v.path(rest))
            .ok_or_else(|| AssetError::format(format!("missing field {}", path.join("."))))
    }
}

impl FieldAccess for UnityValue {
    fn field(&self, path: &[&str]) -> Result<&UnityValue> {
        self.path(path)
            .ok_or_else(|| AssetError::format(format!("missing field {}", path.join("."))))
    }
}

fn type_error(path: &[&str], expected: &str) -> AssetError {
    AssetError::format(format!("field {} is not {}", path.join("."), expected))
}
