//! Output file helpers.
//!
//! Every artifact is written to a sibling temporary file and renamed into
//! place, so an interrupted run never leaves a truncated output behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{DataError, Result};

pub const STAMP: &str = "stamp";
pub const DEP_FILE: &str = "data.d";
pub const USED_ASSETS: &str = "used_assets.txt";

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DataError::io(parent, format!("Failed to create directory: {}", e)))?;
    }
    let tmp = tmp_path(path);
    let write = || -> std::io::Result<()> {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::io(path, format!("Failed to write: {}", e))
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as compact JSON and write it.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| DataError::io(path, format!("Failed to serialize: {}", e)))?;
    write_atomic(path, &bytes)
}

/// Delete files in `dir` whose names start with `prefix` and end with
/// `suffix`. Returns how many were removed.
pub fn remove_matching(dir: &Path, prefix: &str, suffix: &str) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(DataError::io(dir, e.to_string())),
    };
    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(prefix) && name.ends_with(suffix) && entry.path().is_file() {
            fs::remove_file(entry.path()).map_err(|e| DataError::io(entry.path(), e.to_string()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

pub fn remove_stamp(dest: &Path) -> Result<()> {
    let path = dest.join(STAMP);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DataError::io(path, e.to_string())),
    }
}

pub fn write_stamp(dest: &Path) -> Result<()> {
    write_atomic(&dest.join(STAMP), b"")
}

/// One path per line.
pub fn write_used_assets(dest: &Path, assets: &[PathBuf]) -> Result<()> {
    let text: String = assets.iter().map(|p| format!("{}\n", p.display())).collect();
    write_atomic(&dest.join(USED_ASSETS), text.as_bytes())
}

/// Make-style dependency file: every path is a prerequisite of `stamp`.
pub fn dep_file_text(dest: &Path, deps: &[PathBuf]) -> String {
    let mut text = format!("{}: \\\n", make_escape(&dest.join(STAMP)));
    for p in deps {
        text.push_str(&format!("    {} \\\n", make_escape(p)));
    }
    text
}

/// Escape a path for a make rule: spaces, `#` and `:` get a backslash,
/// `$` is doubled.
fn make_escape(path: &Path) -> String {
    let raw = path.display().to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            ' ' | '#' | ':' => {
                out.push('\\');
                out.push(c);
            }
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    out
}

pub fn write_dep_file(dest: &Path, deps: &[PathBuf]) -> Result<()> {
    write_atomic(&dest.join(DEP_FILE), dep_file_text(dest, deps).as_bytes())
}
