//! Project file (`pipeline.yaml`) parsing.
//!
//! Everything in it is optional. Command-line flags override its values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::SPRITE_ATLAS_SIZE;
use crate::error::{DataError, Result};

/// Project settings loaded from `pipeline.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Patterns skipped by discovery.
    pub excludes: Vec<String>,

    /// Treat warnings as errors.
    pub deny_warnings: bool,

    /// Name-font PNG anchored at the origin of sprite sheet 0, relative to
    /// the source dir.
    pub name_font: Option<PathBuf>,

    /// Day/night colour JSON, relative to the source dir.
    pub day_night: Option<PathBuf>,

    /// Sprite atlas page size in pixels.
    pub sprite_atlas_size: Option<(u32, u32)>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DataError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read project file: {}", e),
        })?;

        Self::parse(&content)
    }

    /// Load `dir/pipeline.yaml`, or defaults when there is none.
    pub fn load_or_default(dir: &Path) -> Result<(Self, bool)> {
        let path = dir.join(super::MANIFEST_FILENAME);
        if path.is_file() {
            Ok((Self::load(&path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| DataError::Parse {
            message: format!("Invalid project file: {}", e),
            help: Some("Check pipeline.yaml syntax".to_string()),
        })
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.excludes
            .iter()
            .any(|pattern| Self::matches_pattern(&path_str, pattern))
    }

    /// Glob-ish matching: `*.ext`, `dir/*`, `**/dir/*`, or a plain substring.
    fn matches_pattern(path: &str, pattern: &str) -> bool {
        if let Some(suffix) = pattern.strip_prefix("**/") {
            if let Some(dir) = suffix.strip_suffix("/*") {
                return path.contains(&format!("/{}/", dir)) || path.starts_with(&format!("{}/", dir));
            }
            return path.contains(suffix);
        }

        if let Some(suffix) = pattern.strip_prefix('*') {
            if !pattern.contains('/') {
                return path.ends_with(suffix);
            }
        }

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return path.starts_with(&format!("{}/", prefix)) || path.contains(&format!("/{}/", prefix));
        }

        path.contains(pattern)
    }

    pub fn effective_atlas_size(&self) -> (u32, u32) {
        self.sprite_atlas_size.unwrap_or(SPRITE_ATLAS_SIZE)
    }
}
