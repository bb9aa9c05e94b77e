//! Model Scan Tests
//!
//! Parameter id maps merged from every moc3 file below a model directory.

use sekai_asset_core::{AssetError, CollectingSink, DiagnosticSource};
use sekai_asset_live2d::{find_moc3_files, load_param_ids};
use std::fs;
use std::path::Path;

/// moc3 image with a single parameter name
fn moc3(parameter: &str) -> Vec<u8> {
    let base = 0x200u32;
    let end = base + 128;
    let mut data = vec![0u8; end as usize];
    data[0x4C..0x50].copy_from_slice(&base.to_le_bytes());
    data[0x50..0x54].copy_from_slice(&base.to_le_bytes());
    data[0x108..0x10C].copy_from_slice(&base.to_le_bytes());
    data[0x10C..0x110].copy_from_slice(&end.to_le_bytes());
    let at = base as usize;
    data[at..at + parameter.len()].copy_from_slice(parameter.as_bytes());
    data
}

fn write(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}

#[test]
fn test_load_param_ids_from_tree() -> anyhow::Result<()> {
    println!("=== Model directory scan ===");
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write(&root.join("21miku/21miku.moc3"), &moc3("ParamAngleX"))?;
    write(&root.join("01ichika/v2/01ichika.moc3"), &moc3("ParamEyeLOpen"))?;
    write(&root.join("01ichika/v2/01ichika.model3.json"), b"{}")?;
    write(&root.join("broken/broken.moc3"), &[0u8; 16])?;

    let files = find_moc3_files(root)?;
    assert_eq!(files.len(), 3);

    let sink = CollectingSink::new();
    let ids = load_param_ids(root, &sink)?;
    assert_eq!(ids.len(), 4);
    assert_eq!(ids.get("397467875"), Some("ParamAngleX"));
    assert!(ids.iter().any(|(_, name)| name == "ParamEyeLOpen"));

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].source, DiagnosticSource::ParamIds);
    assert!(entries[0].message.contains("broken.moc3"));
    Ok(())
}

#[test]
fn test_missing_model_dir() {
    let sink = CollectingSink::new();
    let err = load_param_ids(Path::new("/nonexistent/sekai/models"), &sink).unwrap_err();
    assert!(matches!(err, AssetError::Io(_)));
}
