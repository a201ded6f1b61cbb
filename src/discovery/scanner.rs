//! Source tree scanner.
//!
//! `<src>/data/**` always belongs to the core group. Each directory
//! `<src>/mods/<mod>/` is a separate group included only on request.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{DataError, Result};

use super::manifest::Manifest;

/// Name of the always-included declaration group.
pub const CORE_GROUP: &str = "outpost";

pub const DECL_SUFFIX: &str = ".data.yaml";
pub const ITEM_DESCS_FILENAME: &str = "item_descs.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A YAML declaration module.
    Declaration,
    /// Item descriptions merged into item `desc` fields.
    ItemDescs,
    /// An image asset.
    Image,
}

pub fn detect_file_kind(path: &Path) -> Option<FileKind> {
    let filename = path.file_name()?.to_str()?;
    if filename == ITEM_DESCS_FILENAME {
        Some(FileKind::ItemDescs)
    } else if filename.ends_with(DECL_SUFFIX) {
        Some(FileKind::Declaration)
    } else if filename.ends_with(".png") {
        Some(FileKind::Image)
    } else {
        None
    }
}

/// One declaration file and the group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclFile {
    pub group: String,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    /// Declaration files, core group first, each group in path order.
    pub decls: Vec<DeclFile>,
    pub item_descs: Vec<PathBuf>,
    /// Every image under the included groups, for unused-asset checks.
    pub images: Vec<PathBuf>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.decls.len() + self.item_descs.len() + self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn merge(&mut self, group: &str, other: ScanResult) {
        self.decls.extend(other.decls.into_iter().map(|d| DeclFile {
            group: group.to_string(),
            path: d.path,
        }));
        self.item_descs.extend(other.item_descs);
        self.images.extend(other.images);
    }
}

/// Scan one directory. Results are sorted by path.
pub fn scan_directory(root: &Path, manifest: &Manifest) -> ScanResult {
    let mut result = ScanResult::new();

    if !root.exists() {
        return result;
    }

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let rel = path.strip_prefix(root).unwrap_or(path);
        if manifest.is_excluded(rel) {
            continue;
        }

        let path_buf = path.to_path_buf();
        match detect_file_kind(path) {
            Some(FileKind::Declaration) => result.decls.push(DeclFile {
                group: String::new(),
                path: path_buf,
            }),
            Some(FileKind::ItemDescs) => result.item_descs.push(path_buf),
            Some(FileKind::Image) => result.images.push(path_buf),
            None => {}
        }
    }

    result.decls.sort_by(|a, b| a.path.cmp(&b.path));
    result.item_descs.sort();
    result.images.sort();
    result
}

/// Names of the mod groups present under `<src>/mods`.
pub fn available_mods(src: &Path) -> BTreeSet<String> {
    let Ok(entries) = std::fs::read_dir(src.join("mods")) else {
        return BTreeSet::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect()
}

/// Scan the core group plus the requested mods.
pub fn scan_sources(src: &Path, mods: &[String], manifest: &Manifest) -> Result<ScanResult> {
    let available = available_mods(src);
    if let Some(unknown) = mods.iter().find(|m| !available.contains(*m)) {
        return Err(DataError::Build {
            message: format!("unknown mod `{}`", unknown),
            help: Some(if available.is_empty() {
                format!("{} has no mods directory", src.display())
            } else {
                format!(
                    "available mods: {}",
                    available.iter().cloned().collect::<Vec<_>>().join(", ")
                )
            }),
        });
    }

    let mut result = ScanResult::new();
    result.merge(CORE_GROUP, scan_directory(&src.join("data"), manifest));

    let mut seen = BTreeSet::new();
    for m in mods {
        if seen.insert(m.as_str()) {
            result.merge(m, scan_directory(&src.join("mods").join(m), manifest));
        }
    }
    Ok(result)
}
