use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::resolve_under_root;

#[derive(Debug)]
pub struct WriteOutcome {
    pub path: String,
    pub bytes: usize,
    pub created: bool,
}

pub fn write_file_under_root(root: &Path, rel: &str, content: &str) -> anyhow::Result<WriteOutcome> {
    let path = resolve_under_root(root, rel).ok_or_else(|| anyhow::anyhow!("path outside workspace: {rel}"))?;
    if path.is_dir() {
        anyhow::bail!("is a directory: {rel}");
    }
    let created = !path.exists();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content.as_bytes())?;
    Ok(WriteOutcome { path: rel.to_string(), bytes: content.len(), created })
}

/// Writes via a sibling temp file and rename so readers polling `dir` never see a partial file.
pub fn write_json_atomic(dir: &Path, file_name: &str, value: &serde_json::Value) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    let tmp = dir.join(format!("{file_name}.tmp"));
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    if let Err(e) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(path)
}
