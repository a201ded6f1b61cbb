//! Immutable, lazily realized image expressions.
//!
//! Expressions live in an arena owned by [`ImageStore`] and are addressed by
//! copyable [`ImageRef`] handles. Construction only records the variant and
//! its parameters; pixels are realized on demand by [`ImageStore::raw`],
//! which consults the in-memory buffer, then the disk cache, then realizes
//! the children and applies the variant.
//!
//! Two expressions with the same [`Descriptor`] are the same node: the store
//! deduplicates on construction.

mod anim;
mod cache;
mod descriptor;
mod ops;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::UNIX_EPOCH;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

pub use anim::Anim;
pub use cache::{
    CacheStats, ImageCache, LargeCache, SmallCache, COMPUTE_CACHE_DATA, IMAGE_CACHE_DATA,
    IMAGE_CACHE_INDEX,
};
pub use descriptor::{DescWriter, Descriptor};
pub use ops::{blit, paste_alpha, FoldOp, PixelOp, PIXEL_OPS_VERSION};

/// Bumped when a `compute` analysis changes meaning.
const COMPUTE_VERSION: u32 = 1;

/// Handle to an expression in an [`ImageStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRef(u32);

/// Pixel rectangle. May extend past the source image; the excess reads as
/// transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn union(self, other: Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.w as i32).max(other.x + other.w as i32);
        let y1 = (self.y + self.h as i32).max(other.y + other.h as i32);
        Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32)
    }
}

/// Resampling filter for [`ImageStore::resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    Nearest,
    Triangle,
    Lanczos3,
}

impl Filter {
    fn to_image(self) -> FilterType {
        match self {
            Filter::Nearest => FilterType::Nearest,
            Filter::Triangle => FilterType::Triangle,
            Filter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Named cells of a regular grid, used by [`ImageStore::chop`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChopGrid {
    /// Cell size in pixels.
    pub cell: (u32, u32),
    /// Cell names row by row; `None` skips a cell.
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone)]
enum Expr {
    Blank,
    File { path: PathBuf },
    Bytes,
    Modify { src: ImageRef, op: PixelOp },
    Fold { base: ImageRef, others: Vec<ImageRef>, op: FoldOp },
    Crop { src: ImageRef, rect: Rect },
    Resize { src: ImageRef, filter: Filter },
    Stack(Vec<ImageRef>),
    Pad { src: ImageRef, offset: (i32, i32) },
    Sheet(Vec<(ImageRef, (i32, i32))>),
}

struct Node {
    expr: Expr,
    size: (u32, u32),
    desc: Descriptor,
    buffer: Option<Rc<RgbaImage>>,
    /// Buffers that cannot be realized again (in-memory sources).
    pinned: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileMeta {
    size: (u32, u32),
    hash: String,
}

/// Arena of image expressions plus the caches backing them.
pub struct ImageStore {
    nodes: Vec<Node>,
    by_desc: HashMap<Descriptor, ImageRef>,
    cache: ImageCache,
    used_files: BTreeSet<PathBuf>,
}

impl ImageStore {
    pub fn new(cache: ImageCache) -> Self {
        Self {
            nodes: Vec::new(),
            by_desc: HashMap::new(),
            cache,
            used_files: BTreeSet::new(),
        }
    }

    /// A store with no disk cache.
    pub fn in_memory() -> Self {
        Self::new(ImageCache::in_memory())
    }

    fn node(&self, r: ImageRef) -> &Node {
        &self.nodes[r.0 as usize]
    }

    fn intern(&mut self, expr: Expr, size: (u32, u32), desc: Descriptor) -> ImageRef {
        if let Some(&r) = self.by_desc.get(&desc) {
            return r;
        }
        let r = ImageRef(self.nodes.len() as u32);
        self.nodes.push(Node {
            expr,
            size,
            desc,
            buffer: None,
            pinned: false,
        });
        self.by_desc.insert(desc, r);
        r
    }

    pub fn size(&self, r: ImageRef) -> (u32, u32) {
        self.node(r).size
    }

    pub fn descriptor(&self, r: ImageRef) -> Descriptor {
        self.node(r).desc
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats
    }

    /// Every source file opened so far, in sorted order.
    pub fn used_files(&self) -> impl Iterator<Item = &Path> {
        self.used_files.iter().map(|p| p.as_path())
    }

    // Construction

    pub fn blank(&mut self, size: (u32, u32)) -> ImageRef {
        let mut w = DescWriter::new(b'B');
        w.size(size);
        self.intern(Expr::Blank, size, w.finish())
    }

    /// Open a PNG. The descriptor depends only on file contents, so a
    /// touched but unchanged file still hits the cache.
    pub fn open(&mut self, path: &Path) -> Result<ImageRef> {
        let meta = fs::metadata(path)
            .map_err(|e| DataError::image(format!("{}: {}", path.display(), e)))?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos());
        self.used_files.insert(path.to_path_buf());

        let key = format!("file:{}:{}", path.display(), mtime);
        let cached = self
            .cache
            .compute
            .get(&key)
            .and_then(|v| serde_json::from_value::<FileMeta>(v.clone()).ok());
        let (file_meta, loaded) = match cached {
            Some(m) => (m, None),
            None => {
                let bytes = fs::read(path)
                    .map_err(|e| DataError::image(format!("{}: {}", path.display(), e)))?;
                let img = decode_png(path, &bytes)?;
                let m = FileMeta {
                    size: img.dimensions(),
                    hash: Descriptor::of_bytes(&bytes).to_base64(),
                };
                if let Ok(v) = serde_json::to_value(&m) {
                    self.cache.compute.add(key, v);
                }
                (m, Some(img))
            }
        };

        let mut w = DescWriter::new(b'F');
        w.size(file_meta.size).bytes(file_meta.hash.as_bytes());
        let r = self.intern(
            Expr::File {
                path: path.to_path_buf(),
            },
            file_meta.size,
            w.finish(),
        );
        if let Some(img) = loaded {
            let node = &mut self.nodes[r.0 as usize];
            if node.buffer.is_none() {
                node.buffer = Some(Rc::new(img));
            }
        }
        Ok(r)
    }

    /// Wrap an in-memory buffer.
    pub fn from_raw(&mut self, img: RgbaImage) -> ImageRef {
        let size = img.dimensions();
        let mut w = DescWriter::new(b'C');
        w.size(size).bytes(Descriptor::of_bytes(img.as_raw()).0.as_slice());
        let r = self.intern(Expr::Bytes, size, w.finish());
        let node = &mut self.nodes[r.0 as usize];
        if node.buffer.is_none() {
            node.buffer = Some(Rc::new(img));
        }
        node.pinned = true;
        r
    }

    pub fn modify(&mut self, src: ImageRef, op: PixelOp) -> ImageRef {
        let size = self.size(src);
        let mut w = DescWriter::new(b'M');
        op.describe(&mut w);
        w.size(size).child(&self.descriptor(src));
        self.intern(Expr::Modify { src, op }, size, w.finish())
    }

    /// Apply `ops` in order.
    pub fn modify_all(&mut self, src: ImageRef, ops: &[PixelOp]) -> ImageRef {
        ops.iter()
            .fold(src, |acc, op| self.modify(acc, op.clone()))
    }

    pub fn fold(&mut self, base: ImageRef, others: &[ImageRef], op: FoldOp) -> ImageRef {
        let size = self.size(base);
        let mut w = DescWriter::new(b'O');
        op.describe(&mut w);
        w.size(size).child(&self.descriptor(base));
        for o in others {
            w.child(&self.descriptor(*o));
        }
        self.intern(
            Expr::Fold {
                base,
                others: others.to_vec(),
                op,
            },
            size,
            w.finish(),
        )
    }

    pub fn crop(&mut self, src: ImageRef, rect: Rect) -> ImageRef {
        if rect.x == 0 && rect.y == 0 && (rect.w, rect.h) == self.size(src) {
            return src;
        }
        let mut w = DescWriter::new(b'R');
        w.i32(rect.x).i32(rect.y).u32(rect.w).u32(rect.h).child(&self.descriptor(src));
        self.intern(Expr::Crop { src, rect }, (rect.w, rect.h), w.finish())
    }

    /// Crop `size` cells of `unit` pixels starting at cell `pos`.
    pub fn extract(&mut self, src: ImageRef, pos: (i32, i32), size: (u32, u32), unit: u32) -> ImageRef {
        let rect = Rect::new(pos.0 * unit as i32, pos.1 * unit as i32, size.0 * unit, size.1 * unit);
        self.crop(src, rect)
    }

    pub fn resize(&mut self, src: ImageRef, size: (u32, u32), filter: Filter) -> ImageRef {
        if size == self.size(src) {
            return src;
        }
        let mut w = DescWriter::new(b'Z');
        w.size(size).u8(filter as u8).child(&self.descriptor(src));
        self.intern(Expr::Resize { src, filter }, size, w.finish())
    }

    /// Paste each layer over the first using its own alpha.
    pub fn stack(&mut self, layers: &[ImageRef]) -> Result<ImageRef> {
        let first = *layers
            .first()
            .ok_or_else(|| DataError::image("cannot stack zero layers"))?;
        if layers.len() == 1 {
            return Ok(first);
        }
        let size = self.size(first);
        let mut w = DescWriter::new(b'S');
        for l in layers {
            if self.size(*l) != size {
                return Err(DataError::image(format!(
                    "stacked layers differ in size: {:?} vs {:?}",
                    self.size(*l),
                    size
                )));
            }
            w.child(&self.descriptor(*l));
        }
        Ok(self.intern(Expr::Stack(layers.to_vec()), size, w.finish()))
    }

    pub fn pad(&mut self, src: ImageRef, size: (u32, u32), offset: (i32, i32)) -> ImageRef {
        if offset == (0, 0) && size == self.size(src) {
            return src;
        }
        let mut w = DescWriter::new(b'P');
        w.size(size).i32(offset.0).i32(offset.1).child(&self.descriptor(src));
        self.intern(Expr::Pad { src, offset }, size, w.finish())
    }

    /// Composite `children` at their offsets onto a blank surface.
    pub fn sheet(&mut self, children: &[(ImageRef, (i32, i32))], size: (u32, u32)) -> ImageRef {
        let mut w = DescWriter::new(b'H');
        w.size(size).u32(children.len() as u32);
        for (c, (x, y)) in children {
            w.i32(*x).i32(*y).child(&self.descriptor(*c));
        }
        self.intern(Expr::Sheet(children.to_vec()), size, w.finish())
    }

    /// Like [`sheet`](Self::sheet), sized to fit every child.
    pub fn sheet_fit(&mut self, children: &[(ImageRef, (i32, i32))]) -> ImageRef {
        let mut size = (0u32, 0u32);
        for (c, (x, y)) in children {
            let (w, h) = self.size(*c);
            size.0 = size.0.max((x + w as i32).max(0) as u32);
            size.1 = size.1.max((y + h as i32).max(0) as u32);
        }
        self.sheet(children, size)
    }

    /// Partition by a grid into named sub-images.
    pub fn chop(&mut self, src: ImageRef, grid: &ChopGrid) -> BTreeMap<String, ImageRef> {
        let (cw, ch) = grid.cell;
        let mut out = BTreeMap::new();
        for (row, names) in grid.rows.iter().enumerate() {
            for (col, name) in names.iter().enumerate() {
                if let Some(name) = name {
                    let rect = Rect::new((col as u32 * cw) as i32, (row as u32 * ch) as i32, cw, ch);
                    let cell = self.crop(src, rect);
                    out.insert(name.clone(), cell);
                }
            }
        }
        out
    }

    // Realization

    /// Realize pixels, memoized in memory and in the disk cache.
    pub fn raw(&mut self, r: ImageRef) -> Result<Rc<RgbaImage>> {
        if let Some(buf) = &self.node(r).buffer {
            return Ok(Rc::clone(buf));
        }

        let desc = self.node(r).desc;
        let size = self.node(r).size;
        let cacheable = !matches!(self.node(r).expr, Expr::File { .. } | Expr::Bytes);

        if cacheable {
            if let Some(img) = self.cache.images.get(&desc) {
                if img.dimensions() == size {
                    trace!("image cache hit {:?}", desc);
                    self.cache.stats.hits += 1;
                    let rc = Rc::new(img);
                    self.nodes[r.0 as usize].buffer = Some(Rc::clone(&rc));
                    return Ok(rc);
                }
                debug!("image cache entry {:?} has wrong size, rebuilding", desc);
            }
            self.cache.stats.misses += 1;
        }

        let img = self.realize(r)?;
        if img.dimensions() != size {
            return Err(DataError::image(format!(
                "realized image is {:?}, expected {:?}",
                img.dimensions(),
                size
            )));
        }
        if cacheable {
            self.cache.images.add(desc, &img)?;
            self.cache.stats.writes += 1;
        }
        let rc = Rc::new(img);
        self.nodes[r.0 as usize].buffer = Some(Rc::clone(&rc));
        Ok(rc)
    }

    fn realize(&mut self, r: ImageRef) -> Result<RgbaImage> {
        let (w, h) = self.size(r);
        let expr = self.node(r).expr.clone();
        Ok(match expr {
            Expr::Blank => RgbaImage::new(w, h),
            Expr::File { path } => {
                let bytes = fs::read(&path)
                    .map_err(|e| DataError::image(format!("{}: {}", path.display(), e)))?;
                decode_png(&path, &bytes)?
            }
            Expr::Bytes => {
                return Err(DataError::image("in-memory image buffer was released"));
            }
            Expr::Modify { src, op } => {
                let mut img = (*self.raw(src)?).clone();
                op.apply(&mut img);
                img
            }
            Expr::Fold { base, others, op } => {
                let mut img = (*self.raw(base)?).clone();
                let layers = others
                    .iter()
                    .map(|o| self.raw(*o))
                    .collect::<Result<Vec<_>>>()?;
                let refs: Vec<&RgbaImage> = layers.iter().map(|l| l.as_ref()).collect();
                op.apply(&mut img, &refs);
                img
            }
            Expr::Crop { src, rect } => {
                let orig = self.raw(src)?;
                let mut img = RgbaImage::new(w, h);
                blit(&mut img, &orig, -rect.x, -rect.y);
                img
            }
            Expr::Resize { src, filter } => {
                let orig = self.raw(src)?;
                if orig.width() == 0 || orig.height() == 0 {
                    RgbaImage::new(w, h)
                } else {
                    imageops::resize(orig.as_ref(), w, h, filter.to_image())
                }
            }
            Expr::Stack(layers) => {
                let mut img = (*self.raw(layers[0])?).clone();
                for l in &layers[1..] {
                    let layer = self.raw(*l)?;
                    paste_alpha(&mut img, &layer, 0, 0);
                }
                img
            }
            Expr::Pad { src, offset } => {
                let orig = self.raw(src)?;
                let mut img = RgbaImage::new(w, h);
                blit(&mut img, &orig, offset.0, offset.1);
                img
            }
            Expr::Sheet(children) => {
                let mut img = RgbaImage::new(w, h);
                for (c, (x, y)) in children {
                    let child = self.raw(c)?;
                    blit(&mut img, &child, x, y);
                }
                img
            }
        })
    }

    /// Derive a value from pixels, memoized in the compute cache under
    /// `label` and this image's descriptor.
    pub fn compute<T, F>(&mut self, r: ImageRef, label: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&RgbaImage) -> T,
    {
        let key = format!(
            "compute:{}:{}:{}",
            label,
            COMPUTE_VERSION,
            self.descriptor(r).to_base64()
        );
        if let Some(v) = self.cache.compute.get(&key) {
            if let Ok(value) = serde_json::from_value(v.clone()) {
                return Ok(value);
            }
        }
        let img = self.raw(r)?;
        let value = f(&img);
        let json = serde_json::to_value(&value).map_err(|e| DataError::Cache {
            message: e.to_string(),
        })?;
        self.cache.compute.add(key, json);
        Ok(value)
    }

    /// Tightest box around pixels with non-zero alpha.
    pub fn bounds(&mut self, r: ImageRef) -> Result<Option<Rect>> {
        self.compute(r, "alpha-bbox", alpha_bbox)
    }

    /// Crop to [`bounds`](Self::bounds). A fully transparent image yields a
    /// 0x0 expression and offset `(0, 0)`.
    pub fn autocrop(&mut self, r: ImageRef) -> Result<(ImageRef, (i32, i32))> {
        match self.bounds(r)? {
            Some(b) => Ok((self.crop(r, b), (b.x, b.y))),
            None => Ok((self.crop(r, Rect::default()), (0, 0))),
        }
    }

    /// True iff some pixel is partially transparent.
    pub fn has_partial_alpha(&mut self, r: ImageRef) -> Result<bool> {
        self.compute(r, "partial-alpha", |img| {
            img.pixels().any(|p| p[3] > 0 && p[3] < 255)
        })
    }

    /// Drop realized buffers that can be rebuilt from the cache or sources.
    pub fn release_buffers(&mut self) {
        let mut n = 0;
        for node in &mut self.nodes {
            if !node.pinned && node.buffer.take().is_some() {
                n += 1;
            }
        }
        debug!("released {} image buffers", n);
    }

    pub fn save_cache(&mut self) -> Result<()> {
        self.cache.save()
    }
}

fn decode_png(path: &Path, bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| DataError::image(format!("{}: {}", path.display(), e)))
}

/// Bounding box of non-zero alpha, as in the realized pixels.
pub fn alpha_bbox(img: &RgbaImage) -> Option<Rect> {
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0u32, 0u32);
    for (x, y, p) in img.enumerate_pixels() {
        if p[3] != 0 {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x + 1);
            y1 = y1.max(y + 1);
        }
    }
    if x0 == u32::MAX {
        None
    } else {
        Some(Rect::new(x0 as i32, y0 as i32, x1 - x0, y1 - y0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    fn dot(store: &mut ImageStore, size: (u32, u32), at: (u32, u32)) -> ImageRef {
        let mut img = RgbaImage::new(size.0, size.1);
        img.put_pixel(at.0, at.1, Rgba([255, 0, 0, 255]));
        store.from_raw(img)
    }

    #[test]
    fn test_equal_descriptors_share_a_node() {
        let mut store = ImageStore::in_memory();
        let a = store.blank((4, 4));
        let b = store.blank((4, 4));
        let c = store.blank((4, 5));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_raw_size_matches_declared() {
        let mut store = ImageStore::in_memory();
        let src = dot(&mut store, (8, 8), (3, 3));
        let c = store.crop(src, Rect::new(2, 2, 4, 4));
        let p = store.pad(c, (10, 6), (1, 1));
        let z = store.resize(p, (5, 3), Filter::Nearest);
        for r in [src, c, p, z] {
            let size = store.size(r);
            assert_eq!(store.raw(r).unwrap().dimensions(), size);
        }
        assert_eq!(store.raw(c).unwrap().get_pixel(1, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_autocrop() {
        let mut store = ImageStore::in_memory();
        let src = dot(&mut store, (8, 8), (5, 2));
        let (cropped, offset) = store.autocrop(src).unwrap();
        assert_eq!(offset, (5, 2));
        assert_eq!(store.size(cropped), (1, 1));

        let empty = store.blank((8, 8));
        let (cropped, offset) = store.autocrop(empty).unwrap();
        assert_eq!(offset, (0, 0));
        assert_eq!(store.size(cropped), (0, 0));
        assert_eq!(store.raw(cropped).unwrap().dimensions(), (0, 0));
    }

    #[test]
    fn test_stack_rejects_mismatched_sizes() {
        let mut store = ImageStore::in_memory();
        let a = store.blank((2, 2));
        let b = store.blank((3, 2));
        assert!(store.stack(&[a, b]).is_err());
        assert!(store.stack(&[]).is_err());
    }

    #[test]
    fn test_sheet_places_children() {
        let mut store = ImageStore::in_memory();
        let a = dot(&mut store, (2, 2), (0, 0));
        let sheet = store.sheet_fit(&[(a, (0, 0)), (a, (3, 1))]);
        assert_eq!(store.size(sheet), (5, 3));
        let img = store.raw(sheet).unwrap();
        assert_eq!(img.get_pixel(3, 1).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_chop_names_cells() {
        let mut store = ImageStore::in_memory();
        let src = dot(&mut store, (4, 2), (3, 1));
        let grid = ChopGrid {
            cell: (2, 2),
            rows: vec![vec![Some("left".into()), Some("right".into())]],
        };
        let cells = store.chop(src, &grid);
        assert_eq!(cells.len(), 2);
        let right = store.raw(cells["right"]).unwrap();
        assert_eq!(right.get_pixel(1, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_modify_changes_descriptor_and_pixels() {
        let mut store = ImageStore::in_memory();
        let src = dot(&mut store, (2, 1), (0, 0));
        let m = store.modify(src, PixelOp::MirrorX);
        assert_ne!(store.descriptor(src), store.descriptor(m));
        assert_eq!(store.raw(m).unwrap().get_pixel(1, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_disk_cache_serves_second_store() {
        let dir = tempdir().unwrap();
        let build = |store: &mut ImageStore| {
            let src = store.blank((4, 4));
            let filled = store.modify(
                src,
                PixelOp::FillRect {
                    rect: [0, 0, 2, 2],
                    colour: crate::types::Colour::WHITE,
                },
            );
            store.raw(filled).unwrap()
        };

        let mut first = ImageStore::new(ImageCache::load(dir.path()).unwrap());
        let a = build(&mut first);
        assert!(first.stats().writes > 0);
        first.save_cache().unwrap();

        let mut second = ImageStore::new(ImageCache::load(dir.path()).unwrap());
        let b = build(&mut second);
        assert_eq!(a, b);
        assert_eq!(second.stats().writes, 0);
        assert_eq!(second.stats().hits, 1);
    }

    #[test]
    fn test_touched_file_keeps_descriptor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("icon.png");
        RgbaImage::from_pixel(2, 2, Rgba([128, 128, 128, 255]))
            .save(&path)
            .unwrap();

        let mut store = ImageStore::in_memory();
        let a = store.open(&path).unwrap();
        let d1 = store.descriptor(a);

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, bytes).unwrap();
        let mut store2 = ImageStore::in_memory();
        let b = store2.open(&path).unwrap();
        assert_eq!(d1, store2.descriptor(b));
        assert_eq!(store2.used_files().count(), 1);
    }

    #[test]
    fn test_missing_file_is_image_error() {
        let mut store = ImageStore::in_memory();
        let err = store.open(Path::new("/nonexistent/wood.png")).unwrap_err();
        assert_eq!(err.code(), "outpost::image");
    }

    #[test]
    fn test_release_keeps_pinned_buffers() {
        let mut store = ImageStore::in_memory();
        let src = dot(&mut store, (2, 2), (1, 1));
        let m = store.modify(src, PixelOp::MirrorX);
        let before = store.raw(m).unwrap();
        store.release_buffers();
        let after = store.raw(m).unwrap();
        assert_eq!(*before, *after);
    }

    #[test]
    fn test_partial_alpha() {
        let mut store = ImageStore::in_memory();
        let opaque = dot(&mut store, (2, 2), (0, 0));
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 100]));
        let shadow = store.from_raw(img);
        assert!(!store.has_partial_alpha(opaque).unwrap());
        assert!(store.has_partial_alpha(shadow).unwrap());
    }
}
