//! Asset reader interface
//!
//! Bundle loading and typetree decoding live outside this crate. The
//! restorer only needs a container that lists `(path, object)` entries,
//! resolves object references, and hands back decoded field maps.
//! Readers take the raw bundle bytes; [`DumpReader`] implements the
//! interface over a JSON dump of such a container.

use indexmap::IndexMap;
use sekai_asset_core::{AssetError, FieldAccess, FieldMap, Result, UnityValue};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// Object reference (`m_FileID`, `m_PathID`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PPtr {
    pub file_id: i64,
    pub path_id: i64,
}

impl PPtr {
    pub fn new(file_id: i64, path_id: i64) -> Self {
        Self { file_id, path_id }
    }

    /// Read a `{m_FileID, m_PathID}` field value
    pub fn from_value(value: &UnityValue) -> Result<Self> {
        Ok(Self {
            file_id: value.field_i64(&["m_FileID"])?,
            path_id: value.field_i64(&["m_PathID"])?,
        })
    }

    pub fn is_null(&self) -> bool {
        self.path_id == 0
    }

    /// Points into the same file
    pub fn is_local(&self) -> bool {
        self.file_id == 0 && self.path_id != 0
    }
}

/// A typed object inside a container
pub trait TypedObject {
    /// Unity class name, e.g. `AnimationClip`
    fn type_name(&self) -> &str;

    fn path_id(&self) -> i64;

    /// Decoded typetree fields
    fn read_fields(&self) -> Result<Cow<'_, FieldMap>>;
}

/// A loaded container
pub trait AssetContainer {
    type Object: TypedObject;

    /// `(container path, object)` pairs in container order
    fn entries(&self) -> Vec<(&str, &Self::Object)>;

    /// Follow a local reference
    fn resolve(&self, pptr: PPtr) -> Result<&Self::Object>;

    /// Where the container came from, for diagnostics
    fn source_name(&self) -> &str;
}

/// Parses containers from bundle bytes
pub trait AssetReader {
    type Container: AssetContainer;

    /// Parse one bundle; `name` labels the container in diagnostics
    fn load(&self, name: &str, bytes: &[u8]) -> Result<Self::Container>;

    /// Read `path` and parse it
    fn load_file(&self, path: &Path) -> Result<Self::Container> {
        let bytes = fs::read(path)?;
        self.load(&path.display().to_string(), &bytes)
    }
}

/// One object of a JSON dump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpObject {
    pub path_id: i64,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default)]
    pub fields: FieldMap,
}

impl TypedObject for DumpObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn path_id(&self) -> i64 {
        self.path_id
    }

    fn read_fields(&self) -> Result<Cow<'_, FieldMap>> {
        Ok(Cow::Borrowed(&self.fields))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DumpDocument {
    #[serde(default)]
    objects: Vec<DumpObject>,
}

/// Container backed by a JSON dump `{objects: [{path_id, type, container, fields}]}`
#[derive(Debug, Clone)]
pub struct DumpContainer {
    name: String,
    objects: IndexMap<i64, DumpObject>,
}

impl DumpContainer {
    pub fn new<S: Into<String>>(name: S, objects: Vec<DumpObject>) -> Result<Self> {
        let name = name.into();
        let mut by_id = IndexMap::with_capacity(objects.len());
        for object in objects {
            let path_id = object.path_id;
            if by_id.insert(path_id, object).is_some() {
                return Err(AssetError::format(format!(
                    "{}: duplicate path id {}",
                    name, path_id
                )));
            }
        }
        Ok(Self {
            name,
            objects: by_id,
        })
    }

    pub fn from_json<S: Into<String>>(name: S, json: &[u8]) -> Result<Self> {
        let document: DumpDocument = serde_json::from_slice(json)
            .map_err(|e| AssetError::serialization(format!("container dump: {}", e)))?;
        Self::new(name, document.objects)
    }

    pub fn objects(&self) -> impl Iterator<Item = &DumpObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serialize back to the dump format
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let document = DumpDocument {
            objects: self.objects.values().cloned().collect(),
        };
        serde_json::to_vec_pretty(&document).map_err(|e| AssetError::serialization(e.to_string()))
    }
}

impl AssetContainer for DumpContainer {
    type Object = DumpObject;

    fn entries(&self) -> Vec<(&str, &DumpObject)> {
        self.objects
            .values()
            .filter_map(|o| o.container.as_deref().map(|path| (path, o)))
            .collect()
    }

    fn resolve(&self, pptr: PPtr) -> Result<&DumpObject> {
        if pptr.file_id != 0 {
            return Err(AssetError::not_found(format!(
                "{}: external reference to file {}",
                self.name, pptr.file_id
            )));
        }
        self.objects.get(&pptr.path_id).ok_or_else(|| {
            AssetError::not_found(format!("{}: no object with path id {}", self.name, pptr.path_id))
        })
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Reads `.json` container dumps
#[derive(Debug, Default, Clone, Copy)]
pub struct DumpReader;

impl AssetReader for DumpReader {
    type Container = DumpContainer;

    fn load(&self, name: &str, bytes: &[u8]) -> Result<DumpContainer> {
        DumpContainer::from_json(name, bytes)
    }
}
