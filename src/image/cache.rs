//! Disk-backed caches for realized images and computed values.
//!
//! Three files live in the cache directory:
//!
//! - `image_cache.dat`: append-only blob; every entry starts on a 4 KiB
//!   boundary and holds `(magic, mode, w, h, len, pixels)`.
//! - `image_cache.idx`: one `"<offset> <base64 descriptor>"` line per entry.
//! - `compute_cache.dat`: JSON object mapping compute keys to values,
//!   rewritten whole on save. Keys not read or written during the run are
//!   dropped then.
//!
//! A corrupt entry is treated as a miss and rebuilt.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use image::RgbaImage;
use log::{debug, warn};

use crate::error::{DataError, Result};

use super::descriptor::Descriptor;

pub const IMAGE_CACHE_DATA: &str = "image_cache.dat";
pub const IMAGE_CACHE_INDEX: &str = "image_cache.idx";
pub const COMPUTE_CACHE_DATA: &str = "compute_cache.dat";

const CACHE_PAGE: u64 = 4096;
const ENTRY_MAGIC: u8 = 0xa7;
const MODE_RGBA: u8 = 1;
/// Stands in for a 0x0 image.
const MODE_EMPTY: u8 = 0;

/// Hit/miss counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub writes: usize,
}

/// Page-addressed image blob plus its index.
pub struct LargeCache {
    backing: Option<Backing>,
    index: HashMap<Descriptor, u64>,
    pending: Vec<(u64, Descriptor)>,
    data_total: u64,
}

struct Backing {
    data: File,
    index_path: PathBuf,
}

impl LargeCache {
    /// A cache that never hits and never writes.
    pub fn in_memory() -> Self {
        Self {
            backing: None,
            index: HashMap::new(),
            pending: Vec::new(),
            data_total: 0,
        }
    }

    pub fn open(data_path: &Path, index_path: &Path) -> Result<Self> {
        let data = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(data_path)
            .map_err(|e| DataError::io(data_path, format!("Failed to open image cache: {}", e)))?;
        let data_total = data
            .metadata()
            .map_err(|e| DataError::io(data_path, e.to_string()))?
            .len();

        let mut index = HashMap::new();
        if index_path.exists() {
            let f = File::open(index_path)
                .map_err(|e| DataError::io(index_path, format!("Failed to read cache index: {}", e)))?;
            for line in BufReader::new(f).lines() {
                let line = line?;
                let mut parts = line.split_whitespace();
                let (Some(offset), Some(key), None) = (parts.next(), parts.next(), parts.next())
                else {
                    continue;
                };
                let (Ok(offset), Some(key)) = (offset.parse::<u64>(), Descriptor::from_base64(key))
                else {
                    continue;
                };
                if offset < data_total {
                    index.insert(key, offset);
                }
            }
        }
        debug!("image cache: {} entries, {} bytes", index.len(), data_total);

        Ok(Self {
            backing: Some(Backing {
                data,
                index_path: index_path.to_path_buf(),
            }),
            index,
            pending: Vec::new(),
            data_total,
        })
    }

    pub fn contains(&self, key: &Descriptor) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Load an entry. Unreadable entries are dropped from the index.
    pub fn get(&mut self, key: &Descriptor) -> Option<RgbaImage> {
        let offset = *self.index.get(key)?;
        let backing = self.backing.as_mut()?;
        match read_entry(&mut backing.data, offset) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("discarding corrupt image cache entry {:?}: {}", key, e);
                self.index.remove(key);
                None
            }
        }
    }

    pub fn add(&mut self, key: Descriptor, img: &RgbaImage) -> Result<()> {
        let Some(backing) = self.backing.as_mut() else {
            return Ok(());
        };
        let offset = (self.data_total + CACHE_PAGE - 1) & !(CACHE_PAGE - 1);
        backing.data.seek(SeekFrom::Start(offset))?;
        write_entry(&mut backing.data, img)?;
        self.data_total = backing.data.stream_position()?;
        self.index.insert(key, offset);
        self.pending.push((offset, key));
        Ok(())
    }

    /// Append index lines for entries added since the last save.
    pub fn save(&mut self) -> Result<()> {
        let Some(backing) = self.backing.as_mut() else {
            return Ok(());
        };
        backing.data.flush()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&backing.index_path)
            .map_err(|e| DataError::io(&backing.index_path, e.to_string()))?;
        for (offset, key) in self.pending.drain(..) {
            writeln!(f, "{} {}", offset, key.to_base64())?;
        }
        Ok(())
    }
}

fn write_entry(w: &mut impl Write, img: &RgbaImage) -> std::io::Result<()> {
    let (width, height) = img.dimensions();
    w.write_u8(ENTRY_MAGIC)?;
    if width == 0 || height == 0 {
        w.write_u8(MODE_EMPTY)?;
        w.write_u32::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(0)?;
        return Ok(());
    }
    let raw = img.as_raw();
    w.write_u8(MODE_RGBA)?;
    w.write_u32::<LittleEndian>(width)?;
    w.write_u32::<LittleEndian>(height)?;
    w.write_u32::<LittleEndian>(raw.len() as u32)?;
    w.write_all(raw)
}

fn read_entry(f: &mut File, offset: u64) -> Result<RgbaImage> {
    f.seek(SeekFrom::Start(offset))?;
    let corrupt = |what: &str| DataError::Cache {
        message: format!("{} at offset {}", what, offset),
    };
    if f.read_u8()? != ENTRY_MAGIC {
        return Err(corrupt("bad entry magic"));
    }
    let mode = f.read_u8()?;
    let width = f.read_u32::<LittleEndian>()?;
    let height = f.read_u32::<LittleEndian>()?;
    let len = f.read_u32::<LittleEndian>()? as usize;
    match mode {
        MODE_EMPTY => Ok(RgbaImage::new(0, 0)),
        MODE_RGBA => {
            if len != width as usize * height as usize * 4 {
                return Err(corrupt("pixel length mismatch"));
            }
            let mut buf = vec![0u8; len];
            f.read_exact(&mut buf)?;
            RgbaImage::from_raw(width, height, buf).ok_or_else(|| corrupt("bad pixel buffer"))
        }
        _ => Err(corrupt("unknown mode")),
    }
}

/// Whole-map cache for small computed values.
pub struct SmallCache {
    path: Option<PathBuf>,
    map: BTreeMap<String, serde_json::Value>,
    touched: HashSet<String>,
    dirty: bool,
}

impl SmallCache {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            map: BTreeMap::new(),
            touched: HashSet::new(),
            dirty: false,
        }
    }

    pub fn open(path: &Path) -> Self {
        let map = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("compute cache {} unreadable, starting fresh: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: Some(path.to_path_buf()),
            map,
            touched: HashSet::new(),
            dirty: false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Look up `key`, marking it live for the next save.
    pub fn get(&mut self, key: &str) -> Option<&serde_json::Value> {
        if self.map.contains_key(key) && !self.touched.contains(key) {
            self.touched.insert(key.to_string());
        }
        self.map.get(key)
    }

    pub fn add(&mut self, key: String, value: serde_json::Value) {
        self.touched.insert(key.clone());
        if self.map.get(&key) != Some(&value) {
            self.map.insert(key, value);
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let before = self.map.len();
        let touched = &self.touched;
        self.map.retain(|k, _| touched.contains(k));
        if self.map.len() != before {
            debug!("compute cache: dropped {} stale entries", before - self.map.len());
            self.dirty = true;
        }
        if !self.dirty {
            return Ok(());
        }
        let text = serde_json::to_string(&self.map).map_err(|e| DataError::Cache {
            message: e.to_string(),
        })?;
        fs::write(path, text).map_err(|e| DataError::io(path, e.to_string()))?;
        self.dirty = false;
        Ok(())
    }
}

/// Both caches of one cache directory.
pub struct ImageCache {
    pub images: LargeCache,
    pub compute: SmallCache,
    pub stats: CacheStats,
}

impl ImageCache {
    pub fn in_memory() -> Self {
        Self {
            images: LargeCache::in_memory(),
            compute: SmallCache::in_memory(),
            stats: CacheStats::default(),
        }
    }

    pub fn load(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| DataError::io(dir, e.to_string()))?;
        Ok(Self {
            images: LargeCache::open(&dir.join(IMAGE_CACHE_DATA), &dir.join(IMAGE_CACHE_INDEX))?,
            compute: SmallCache::open(&dir.join(COMPUTE_CACHE_DATA)),
            stats: CacheStats::default(),
        })
    }

    /// Delete any existing cache files, then load an empty cache.
    pub fn fresh(dir: &Path) -> Result<Self> {
        for name in [IMAGE_CACHE_DATA, IMAGE_CACHE_INDEX, COMPUTE_CACHE_DATA] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| DataError::io(&path, e.to_string()))?;
            }
        }
        Self::load(dir)
    }

    pub fn save(&mut self) -> Result<()> {
        self.images.save()?;
        self.compute.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    fn key(s: &str) -> Descriptor {
        Descriptor::of_bytes(s.as_bytes())
    }

    #[test]
    fn test_large_cache_roundtrip_across_reopen() {
        let dir = tempdir().unwrap();
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        {
            let mut c = ImageCache::load(dir.path()).unwrap();
            c.images.add(key("a"), &img).unwrap();
            c.images.add(key("b"), &RgbaImage::new(0, 0)).unwrap();
            c.save().unwrap();
        }
        let mut c = ImageCache::load(dir.path()).unwrap();
        assert_eq!(c.images.len(), 2);
        assert_eq!(c.images.get(&key("a")).unwrap(), img);
        assert_eq!(c.images.get(&key("b")).unwrap().dimensions(), (0, 0));
        assert!(c.images.get(&key("missing")).is_none());
    }

    #[test]
    fn test_entries_are_page_aligned() {
        let dir = tempdir().unwrap();
        let mut c = ImageCache::load(dir.path()).unwrap();
        c.images.add(key("a"), &RgbaImage::new(4, 4)).unwrap();
        c.images.add(key("b"), &RgbaImage::new(4, 4)).unwrap();
        c.save().unwrap();
        let idx = fs::read_to_string(dir.path().join(IMAGE_CACHE_INDEX)).unwrap();
        let offsets: Vec<u64> = idx
            .lines()
            .map(|l| l.split(' ').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(offsets, vec![0, 4096]);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempdir().unwrap();
        {
            let mut c = ImageCache::load(dir.path()).unwrap();
            c.images.add(key("a"), &RgbaImage::new(2, 2)).unwrap();
            c.save().unwrap();
        }
        fs::write(dir.path().join(IMAGE_CACHE_DATA), b"garbage-garbage-garbage").unwrap();
        let mut c = ImageCache::load(dir.path()).unwrap();
        assert!(c.images.get(&key("a")).is_none());
        assert!(!c.images.contains(&key("a")));
    }

    #[test]
    fn test_small_cache_only_writes_when_dirty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(COMPUTE_CACHE_DATA);
        let mut c = SmallCache::open(&path);
        c.add("k".into(), serde_json::json!([1, 2]));
        c.save().unwrap();
        assert!(path.exists());

        fs::remove_file(&path).unwrap();
        let mut c = SmallCache::in_memory();
        c.save().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_small_cache_drops_untouched_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(COMPUTE_CACHE_DATA);
        let mut c = SmallCache::open(&path);
        c.add("file:a.png:1".into(), serde_json::json!("old"));
        c.add("file:b.png:1".into(), serde_json::json!("b"));
        c.save().unwrap();

        let mut c = SmallCache::open(&path);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("file:b.png:1"), Some(&serde_json::json!("b")));
        c.add("file:a.png:2".into(), serde_json::json!("new"));
        c.save().unwrap();

        let mut c = SmallCache::open(&path);
        assert_eq!(c.len(), 2);
        assert!(!c.contains("file:a.png:1"));
        assert_eq!(c.get("file:a.png:2"), Some(&serde_json::json!("new")));
        assert_eq!(c.get("file:b.png:1"), Some(&serde_json::json!("b")));
    }

    #[test]
    fn test_fresh_deletes_files() {
        let dir = tempdir().unwrap();
        {
            let mut c = ImageCache::load(dir.path()).unwrap();
            c.images.add(key("a"), &RgbaImage::new(1, 1)).unwrap();
            c.compute.add("x".into(), serde_json::json!(1));
            c.save().unwrap();
        }
        let c = ImageCache::fresh(dir.path()).unwrap();
        assert!(c.images.is_empty());
        assert!(c.compute.is_empty());
    }
}
