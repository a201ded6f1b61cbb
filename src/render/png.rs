//! PNG output for composed sheets.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};

use crate::error::{DataError, Result};
use crate::image::{ImageRef, ImageStore};
use crate::pipeline::files::write_atomic;

/// Encode `img` as PNG and write it to `path` via a temporary file.
pub fn write_png(img: &RgbaImage, path: &Path) -> Result<()> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| DataError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to encode PNG: {}", e),
        })?;
    write_atomic(path, &bytes)
}

/// Materialize `r` and write it as a PNG.
pub fn save(store: &mut ImageStore, r: ImageRef, path: &Path) -> Result<()> {
    let img = store.raw(r)?;
    write_png(&img, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn test_write_png_round_trips_alpha() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(1, 0, Rgba([255, 0, 0, 128]));

        let dir = tempdir().unwrap();
        let path = dir.path().join("alpha.png");
        write_png(&img, &path).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(back.get_pixel(1, 0).0, [255, 0, 0, 128]);
    }

    #[test]
    fn test_save_is_deterministic() {
        let mut store = ImageStore::in_memory();
        let r = store.from_raw(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        save(&mut store, r, &a).unwrap();
        save(&mut store, r, &b).unwrap();
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}
