//! Motion bundle restoration
//!
//! A motion bundle carries a `BuildMotionData` MonoBehaviour listing the
//! facial and body clips of one character. Every listed clip is restored,
//! its curve ids are corrected with the model's [`ParamIdMap`], and the
//! results are written as motion3 documents next to a name index.

use crate::clip::AnimationClip;
use crate::motion::{Motion3, restore_motion};
use crate::param_ids::ParamIdMap;
use crate::source::{AssetContainer, AssetReader, PPtr, TypedObject};
use sekai_asset_core::{
    AssetError, DiagnosticSink, DiagnosticSource, FieldAccess, Result, TracingSink, UnityValue,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

pub const BUILD_MOTION_DATA_FILE: &str = "BuildMotionData.json";
pub const FACIAL_DIR: &str = "facial";
pub const MOTION_DIR: &str = "motion";

const MOTION_ROOT: &str = "live2d/motion/";
const CLIP_EXTENSION: &str = ".anim";

/// One `Facials` / `Motions` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionRef {
    pub asset_name: String,
    pub clip: PPtr,
}

impl MotionRef {
    pub fn from_value(value: &UnityValue) -> Result<Self> {
        Ok(Self {
            asset_name: value.field_str(&["ClipAssetName"])?.to_string(),
            clip: PPtr::from_value(value.field(&["Clip"])?)?,
        })
    }
}

/// A restored clip, named after the clip object
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredMotion {
    pub name: String,
    pub motion: Motion3,
}

/// Names written to `BuildMotionData.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionIndex {
    pub expressions: Vec<String>,
    pub motions: Vec<String>,
}

/// Everything restored from one bundle
#[derive(Debug, Clone, PartialEq)]
pub struct BuildMotionOutput {
    /// Output directory relative to the extraction root
    pub save_dir: PathBuf,
    pub expressions: Vec<RestoredMotion>,
    pub motions: Vec<RestoredMotion>,
}

impl BuildMotionOutput {
    pub fn index(&self) -> MotionIndex {
        MotionIndex {
            expressions: self.expressions.iter().map(|m| m.name.clone()).collect(),
            motions: self.motions.iter().map(|m| m.name.clone()).collect(),
        }
    }

    /// Write the index and every motion under `root/save_dir`
    pub fn write(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let dir = root.join(&self.save_dir);
        fs::create_dir_all(&dir)?;

        let mut written = Vec::with_capacity(1 + self.expressions.len() + self.motions.len());
        let index_path = dir.join(BUILD_MOTION_DATA_FILE);
        fs::write(&index_path, to_pretty_json(&self.index())?)?;
        written.push(index_path);

        for (sub_dir, motions) in [(FACIAL_DIR, &self.expressions), (MOTION_DIR, &self.motions)] {
            let sub_dir = dir.join(sub_dir);
            fs::create_dir_all(&sub_dir)?;
            for restored in motions {
                let path = sub_dir.join(format!("{}.motion3.json", restored.name));
                fs::write(&path, to_pretty_json(&restored.motion)?)?;
                written.push(path);
            }
        }
        Ok(written)
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| AssetError::serialization(e.to_string()))
}

/// Directory of a bundle's motions, taken from the `BuildMotionData` container path
///
/// `…/live2d/motion/21miku_normal/BuildMotionData.asset` gives `21miku_normal`;
/// paths outside `live2d/motion/` fall back to the parent directory name.
pub fn motion_save_dir(container_path: &str) -> PathBuf {
    let normalized = container_path.replace('\\', "/");
    let parent = match normalized.rfind('/') {
        Some(at) => &normalized[..at],
        None => "",
    };
    match parent.find(MOTION_ROOT) {
        Some(at) => PathBuf::from(&parent[at + MOTION_ROOT.len()..]),
        None => PathBuf::from(parent.rsplit('/').next().unwrap_or_default()),
    }
}

/// Restores the motions of bundles sharing one parameter id map
pub struct MotionRestorer {
    param_ids: Arc<ParamIdMap>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for MotionRestorer {
    fn default() -> Self {
        Self {
            param_ids: Arc::new(ParamIdMap::new()),
            sink: Arc::new(TracingSink),
        }
    }
}

impl std::fmt::Debug for MotionRestorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionRestorer")
            .field("param_ids", &self.param_ids.len())
            .finish_non_exhaustive()
    }
}

impl MotionRestorer {
    pub fn new(param_ids: Arc<ParamIdMap>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { param_ids, sink }
    }

    pub fn with_param_ids(mut self, param_ids: Arc<ParamIdMap>) -> Self {
        self.param_ids = param_ids;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Restore a single clip reference
    ///
    /// References into other files, or without a path id, are reported and
    /// give `None`.
    pub fn restore_clip<C: AssetContainer>(
        &self,
        container: &C,
        entry: &MotionRef,
    ) -> Result<Option<RestoredMotion>> {
        if !entry.clip.is_local() {
            self.sink.warn(
                DiagnosticSource::Motion,
                format!(
                    "clip path id is empty or file id is not 0 ({}, {}) for {}",
                    entry.clip.file_id, entry.clip.path_id, entry.asset_name
                ),
            );
            return Ok(None);
        }

        let object = container.resolve(entry.clip)?;
        if object.type_name() != "AnimationClip" {
            return Err(AssetError::format(format!(
                "{} is a {}, expected AnimationClip",
                entry.asset_name,
                object.type_name()
            )));
        }
        let clip = AnimationClip::from_fields(&*object.read_fields()?)?;
        let scripts = |script: PPtr| -> Result<String> {
            let fields = container.resolve(script)?.read_fields()?;
            Ok(fields.field_str(&["m_Name"])?.to_string())
        };
        let motion = restore_motion(&clip, &scripts)?;

        Ok(Some(RestoredMotion {
            name: clip.name,
            motion,
        }))
    }

    /// Restore every motion listed by the container's `BuildMotionData`
    #[instrument(skip_all, fields(source = container.source_name()))]
    pub fn restore_container<C: AssetContainer>(&self, container: &C) -> Result<BuildMotionOutput> {
        let entries = container.entries();
        let (data_path, data_object) = entries
            .iter()
            .find(|(path, object)| {
                object.type_name() == "MonoBehaviour"
                    && path.to_lowercase().contains("buildmotiondata")
            })
            .copied()
            .ok_or_else(|| {
                AssetError::not_found(format!(
                    "BuildMotionData in {}",
                    container.source_name()
                ))
            })?;

        let fields = data_object.read_fields()?;
        let facial_refs = parse_refs(fields.field_array(&["Facials"])?)?;
        let motion_refs = parse_refs(fields.field_array(&["Motions"])?)?;

        let facial_refs = if facial_refs.is_empty() && motion_refs.is_empty() {
            self.fallback_refs(container, &entries, FACIAL_DIR)
        } else {
            facial_refs
        };
        let motion_refs = if motion_refs.is_empty() {
            self.fallback_refs(container, &entries, MOTION_DIR)
        } else {
            motion_refs
        };

        let expressions = self.restore_all(container, &facial_refs);
        let motions = self.restore_all(container, &motion_refs);
        if expressions.is_empty() && motions.is_empty() {
            return Err(AssetError::not_found(format!(
                "no restorable motions in {}",
                container.source_name()
            )));
        }

        let save_dir = motion_save_dir(data_path);
        tracing::info!(
            save_dir = %save_dir.display(),
            expressions = expressions.len(),
            motions = motions.len(),
            "restored motion data"
        );
        Ok(BuildMotionOutput {
            save_dir,
            expressions,
            motions,
        })
    }

    /// Restore, correct ids, and skip clips that fail
    fn restore_all<C: AssetContainer>(&self, container: &C, refs: &[MotionRef]) -> Vec<RestoredMotion> {
        let mut restored = Vec::with_capacity(refs.len());
        for entry in refs {
            match self.restore_clip(container, entry) {
                Ok(Some(mut motion)) => {
                    self.param_ids
                        .correct(&motion.name, &mut motion.motion, self.sink.as_ref());
                    restored.push(motion);
                }
                Ok(None) => {}
                Err(e) => self.sink.warn(
                    DiagnosticSource::Motion,
                    format!("skipping clip {}: {}", entry.asset_name, e),
                ),
            }
        }
        restored
    }

    /// `*.anim` container entries directly under a `dir_name` directory
    fn fallback_refs<C: AssetContainer>(
        &self,
        container: &C,
        entries: &[(&str, &C::Object)],
        dir_name: &str,
    ) -> Vec<MotionRef> {
        self.sink.warn(
            DiagnosticSource::Motion,
            format!(
                "no {} entries listed in {}, searching container items",
                dir_name,
                container.source_name()
            ),
        );

        let refs: Vec<MotionRef> = entries
            .iter()
            .filter_map(|(path, object)| {
                let path = Path::new(path);
                let parent = path.parent()?.file_name()?.to_str()?;
                let file_name = path.file_name()?.to_str()?;
                if parent != dir_name || !file_name.ends_with(CLIP_EXTENSION) {
                    return None;
                }
                Some(MotionRef {
                    asset_name: path.file_stem()?.to_str()?.to_string(),
                    clip: PPtr::new(0, object.path_id()),
                })
            })
            .collect();

        if refs.is_empty() {
            self.sink.warn(
                DiagnosticSource::Motion,
                format!(
                    "no {} clips found in container items of {}",
                    dir_name,
                    container.source_name()
                ),
            );
        }
        refs
    }
}

fn parse_refs(values: &[UnityValue]) -> Result<Vec<MotionRef>> {
    values.iter().map(MotionRef::from_value).collect()
}

/// Load a bundle with `reader`, restore it and write the result under `root`
pub fn restore_bundle_file<R: AssetReader>(
    reader: &R,
    restorer: &MotionRestorer,
    path: &Path,
    root: &Path,
) -> Result<Vec<PathBuf>> {
    let container = reader.load_file(path)?;
    restorer.restore_container(&container)?.write(root)
}
