//! Image references inside declaration documents.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::consts::TILE_SIZE;
use crate::error::Result;
use crate::image::{ImageRef, ImageStore, PixelOp, Rect};

fn tile() -> u32 {
    TILE_SIZE
}

/// A PNG path relative to the declaring file, or the same with a crop and
/// pixel operations applied in order: `extract`, `crop`, `ops`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ImageSpec {
    Path(PathBuf),
    Full(ImageSpecFull),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSpecFull {
    pub path: PathBuf,
    /// Cell size for `extract`.
    #[serde(default = "tile")]
    pub unit: u32,
    /// Cell position of the extracted region.
    #[serde(default)]
    pub extract: Option<(i32, i32)>,
    /// Extracted region size in cells; defaults to one cell.
    #[serde(default)]
    pub size: Option<(u32, u32)>,
    /// Pixel rectangle `[x, y, w, h]`.
    #[serde(default)]
    pub crop: Option<(i32, i32, u32, u32)>,
    #[serde(default)]
    pub ops: Vec<PixelOp>,
}

impl ImageSpec {
    pub fn path(&self) -> &Path {
        match self {
            ImageSpec::Path(p) => p,
            ImageSpec::Full(f) => &f.path,
        }
    }

    /// Build the image expression. Opening the file is the only step that
    /// touches the disk.
    pub fn resolve(&self, store: &mut ImageStore, base_dir: &Path) -> Result<ImageRef> {
        let img = store.open(&base_dir.join(self.path()))?;
        let ImageSpec::Full(full) = self else {
            return Ok(img);
        };

        let mut img = img;
        if full.extract.is_some() || full.size.is_some() {
            let pos = full.extract.unwrap_or((0, 0));
            img = store.extract(img, pos, full.size.unwrap_or((1, 1)), full.unit);
        }
        if let Some((x, y, w, h)) = full.crop {
            img = store.crop(img, Rect::new(x, y, w, h));
        }
        Ok(store.modify_all(img, &full.ops))
    }
}
