//! Structures: multi-cell objects drawn as one or more mesh-backed parts.
//!
//! A part pairs a mesh with an image covering the projection of a declared
//! bounding box. At construction the image is cut down to what the mesh
//! actually covers, autocropped, and the mesh is clipped to match, so the
//! renderer never draws hidden triangles or blank pixels.

use serde::{Deserialize, Serialize};

use crate::consts::{shape_id, S_EMPTY, S_FLOOR, S_SOLID, TILE_SIZE};
use crate::error::{DataError, Result};
use crate::geom::{project, Mesh, V3};
use crate::image::{Anim, ImageRef, ImageStore};

/// Occupancy grid of a structure, `x`-major then `y` then `z`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub size: [u32; 3],
    pub cells: Vec<u16>,
}

impl Shape {
    fn filled(x: u32, y: u32, z: u32, f: impl Fn(u32) -> u16) -> Self {
        let layer = (x * y) as usize;
        let cells = (0..z)
            .flat_map(|zi| std::iter::repeat(f(zi)).take(layer))
            .collect();
        Self {
            size: [x, y, z],
            cells,
        }
    }

    pub fn empty(x: u32, y: u32, z: u32) -> Self {
        Self::filled(x, y, z, |_| S_EMPTY)
    }

    /// Walkable floor on the bottom layer, empty above.
    pub fn floor(x: u32, y: u32, z: u32) -> Self {
        Self::filled(x, y, z, |zi| if zi == 0 { S_FLOOR } else { S_EMPTY })
    }

    pub fn solid(x: u32, y: u32, z: u32) -> Self {
        Self::filled(x, y, z, |_| S_SOLID)
    }

    /// Build from per-cell shape names. The grid length must match `size`.
    pub fn from_names(name: &str, size: [u32; 3], names: &[String]) -> Result<Self> {
        let expected = (size[0] * size[1] * size[2]) as usize;
        if names.len() != expected {
            return Err(DataError::config(
                name,
                "shape",
                format!("has {} cells, expected {}", names.len(), expected),
            ));
        }
        let cells = names
            .iter()
            .map(|n| {
                shape_id(n).ok_or_else(|| {
                    DataError::config(name, "shape", format!("unknown shape name `{}`", n))
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self { size, cells })
    }

    /// Pixel extent of the grid.
    pub fn px_size(&self) -> V3 {
        let t = TILE_SIZE as i32;
        V3::new(
            self.size[0] as i32 * t,
            self.size[1] as i32 * t,
            self.size[2] as i32 * t,
        )
    }
}

/// Image of a structure part: a still or an animation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartImage {
    Still(ImageRef),
    Anim(Anim),
}

impl PartImage {
    pub fn still(&self) -> Option<ImageRef> {
        match self {
            PartImage::Still(i) => Some(*i),
            PartImage::Anim(a) => a.still(),
        }
    }

    /// Size of one frame.
    pub fn size(&self, store: &ImageStore) -> Result<(u32, u32)> {
        match self {
            PartImage::Still(i) => Ok(store.size(*i)),
            PartImage::Anim(a) => a.frame_size(store),
        }
    }

    fn extract(&self, store: &mut ImageStore, pos: (i32, i32), size: (u32, u32)) -> PartImage {
        match self {
            PartImage::Still(i) => PartImage::Still(store.extract(*i, pos, size, 1)),
            PartImage::Anim(a) => PartImage::Anim(Anim::new(
                a.frames
                    .iter()
                    .map(|f| store.extract(*f, pos, size, 1))
                    .collect(),
                a.rate,
                a.oneshot,
            )),
        }
    }

    fn autocrop(&self, store: &mut ImageStore) -> Result<(PartImage, (i32, i32))> {
        match self {
            PartImage::Still(i) => {
                let (img, off) = store.autocrop(*i)?;
                Ok((PartImage::Still(img), off))
            }
            PartImage::Anim(a) => {
                let (anim, off) = a.autocrop(store)?;
                Ok((PartImage::Anim(anim), off))
            }
        }
    }

    /// The image placed on the structure sheet: animations are laid out as
    /// a horizontal strip.
    pub fn sheet_image(&self, store: &mut ImageStore) -> Result<ImageRef> {
        match self {
            PartImage::Still(i) => Ok(*i),
            PartImage::Anim(a) => a.flatten(store),
        }
    }
}

pub const PART_SHADOW: u8 = 1 << 0;
pub const PART_ANIM: u8 = 1 << 1;
pub const STRUCTURE_LIGHT: u8 = 1 << 2;

/// One drawn component of a structure.
#[derive(Debug, Clone)]
pub struct StructurePart {
    pub mesh: Mesh,
    pub img: PartImage,
    /// Screen position of the image's top-left corner relative to the
    /// projection of the world origin.
    pub base: (i32, i32),
    pub flags: u8,
    /// Set when the structure sheets are built.
    pub sheet: u8,
    pub offset: (i32, i32),
    /// Set when vertices are collected.
    pub vert_idx: u16,
    pub vert_count: u16,
}

impl StructurePart {
    /// Fit `img`, which depicts the projection of `bounds`, to `mesh`.
    pub fn new(store: &mut ImageStore, mesh: Mesh, bounds: (V3, V3), img: PartImage) -> Result<Self> {
        let mut mesh = mesh;
        let (v2_min, v2_max) = mesh
            .bounds_2d(project)
            .ok_or_else(|| DataError::image("structure part mesh has no triangles"))?;
        let v2_size = ((v2_max.0 - v2_min.0) as u32, (v2_max.1 - v2_min.1) as u32);

        let (b_min, b_max) = bounds;
        let b2_min = (b_min.x, b_min.y - b_max.z);
        let b2_max = (b_max.x, b_max.y - b_min.z);
        let b2_size = ((b2_max.0 - b2_min.0) as u32, (b2_max.1 - b2_min.1) as u32);

        let img_size = img.size(store)?;
        let half_height = img_size == (TILE_SIZE, TILE_SIZE) && b2_size == (TILE_SIZE, 2 * TILE_SIZE);
        let img = if half_height {
            img
        } else {
            if img_size != b2_size {
                return Err(DataError::image(format!(
                    "image has wrong size for bounds: {:?} != {:?}",
                    img_size, b2_size
                )));
            }
            let pos = (v2_min.0 - b2_min.0, v2_min.1 - b2_min.1);
            img.extract(store, pos, v2_size)
        };

        let (img, crop) = img.autocrop(store)?;
        let base = (v2_min.0 + crop.0, v2_min.1 + crop.1);
        let (w, h) = img.size(store)?;
        mesh.clip_xv(base.0, base.1, base.0 + w as i32, base.1 + h as i32);

        let flags = match &img {
            PartImage::Anim(_) => PART_ANIM,
            PartImage::Still(i) => {
                if store.has_partial_alpha(*i)? {
                    PART_SHADOW
                } else {
                    0
                }
            }
        };

        Ok(Self {
            mesh,
            img,
            base,
            flags,
            sheet: 0,
            offset: (0, 0),
            vert_idx: 0,
            vert_count: 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureLight {
    pub pos: [i32; 3],
    pub color: [u8; 3],
    pub radius: u16,
}

#[derive(Debug, Clone)]
pub struct StructureDef {
    pub name: String,
    pub id: u16,
    pub shape: Shape,
    pub layer: u8,
    pub parts: Vec<StructurePart>,
    pub light: Option<StructureLight>,
    /// Set by `collect_parts`.
    pub part_idx: u16,
    /// Set by `collect_shapes`.
    pub shape_idx: u16,
}

impl StructureDef {
    pub fn new(name: impl Into<String>, shape: Shape, layer: u8) -> Self {
        Self {
            name: name.into(),
            id: 0,
            shape,
            layer,
            parts: Vec::new(),
            light: None,
            part_idx: 0,
            shape_idx: 0,
        }
    }

    pub fn flags(&self) -> u8 {
        let light = if self.light.is_some() { STRUCTURE_LIGHT } else { 0 };
        self.parts.iter().fold(light, |f, p| f | p.flags)
    }

    pub fn vert_count(&self) -> u32 {
        self.parts.iter().map(|p| p.vert_count as u32).sum()
    }
}

#[derive(Debug, Serialize)]
pub struct StructureClientJson {
    pub size: [u32; 3],
    pub shape: Vec<u16>,
    pub shape_idx: u16,
    pub part_idx: u16,
    pub part_count: usize,
    pub vert_count: u32,
    pub layer: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_pos: Option<[i32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_color: Option<[u8; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_radius: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct StructureServerJson {
    pub name: String,
    pub size: [u32; 3],
    pub shape: Vec<u16>,
    pub layer: u8,
}

#[derive(Debug, Serialize)]
pub struct PartJson {
    pub sheet: u8,
    /// Sheet position of the pixel showing the world origin.
    pub offset: (i32, i32),
    pub vert_idx: u16,
    pub vert_count: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anim_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anim_rate: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anim_oneshot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anim_size: Option<(u32, u32)>,
}

impl StructureDef {
    pub fn client_json(&self) -> StructureClientJson {
        let flags = self.flags();
        StructureClientJson {
            size: self.shape.size,
            shape: self.shape.cells.clone(),
            shape_idx: self.shape_idx,
            part_idx: self.part_idx,
            part_count: self.parts.len(),
            vert_count: self.vert_count(),
            layer: self.layer,
            flags: (flags != 0).then_some(flags),
            light_pos: self.light.map(|l| l.pos),
            light_color: self.light.map(|l| l.color),
            light_radius: self.light.map(|l| l.radius),
        }
    }

    pub fn server_json(&self) -> StructureServerJson {
        StructureServerJson {
            name: self.name.clone(),
            size: self.shape.size,
            shape: self.shape.cells.clone(),
            layer: self.layer,
        }
    }
}

impl StructurePart {
    pub fn json(&self, store: &ImageStore) -> Result<PartJson> {
        let (anim_length, anim_rate, anim_oneshot, anim_size) = match &self.img {
            PartImage::Anim(a) => (
                Some(a.len()),
                Some(a.rate),
                Some(a.oneshot),
                Some(a.frame_size(store)?),
            ),
            PartImage::Still(_) => (None, None, None, None),
        };
        Ok(PartJson {
            sheet: self.sheet,
            offset: (self.offset.0 - self.base.0, self.offset.1 - self.base.1),
            vert_idx: self.vert_idx,
            vert_count: self.vert_count,
            flags: (self.flags != 0).then_some(self.flags),
            anim_length,
            anim_rate,
            anim_oneshot,
            anim_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::meshes;
    use image::{Rgba, RgbaImage};

    fn filled(store: &mut ImageStore, w: u32, h: u32, a: u8) -> ImageRef {
        store.from_raw(RgbaImage::from_pixel(w, h, Rgba([90, 60, 30, a])))
    }

    fn tile_bounds(x: i32, y: i32, z: i32) -> (V3, V3) {
        let t = TILE_SIZE as i32;
        (V3::new(0, 0, 0), V3::new(x * t, y * t, z * t))
    }

    #[test]
    fn test_shape_constructors() {
        let s = Shape::floor(2, 1, 2);
        assert_eq!(s.cells, vec![S_FLOOR, S_FLOOR, S_EMPTY, S_EMPTY]);
        assert_eq!(Shape::solid(1, 1, 1).cells, vec![S_SOLID]);
        assert_eq!(Shape::empty(2, 2, 1).cells.len(), 4);
    }

    #[test]
    fn test_shape_grid_length_checked() {
        let names = vec!["solid".to_string(); 3];
        let err = Shape::from_names("wall", [2, 1, 1], &names).unwrap_err();
        assert_eq!(err.code(), "outpost::config");
        assert!(err.to_string().contains("wall"));
    }

    #[test]
    fn test_full_face_part() {
        let mut store = ImageStore::in_memory();
        let img = filled(&mut store, 32, 64, 255);
        let part = StructurePart::new(
            &mut store,
            meshes::solid(1, 1, 1),
            tile_bounds(1, 1, 1),
            PartImage::Still(img),
        )
        .unwrap();
        assert_eq!(part.base, (0, -32));
        assert_eq!(part.img.size(&store).unwrap(), (32, 64));
        assert_eq!(part.mesh.vert_count(), 12);
        assert_eq!(part.flags, 0);
    }

    #[test]
    fn test_half_height_image_skips_extraction() {
        let mut store = ImageStore::in_memory();
        let img = filled(&mut store, 32, 32, 255);
        let part = StructurePart::new(
            &mut store,
            meshes::front(1, 1, 1),
            tile_bounds(1, 1, 1),
            PartImage::Still(img),
        )
        .unwrap();
        assert_eq!(part.base, (0, 0));
        assert_eq!(part.mesh.vert_count(), 6);
    }

    #[test]
    fn test_wrong_image_size_is_image_error() {
        let mut store = ImageStore::in_memory();
        let img = filled(&mut store, 40, 40, 255);
        let err = StructurePart::new(
            &mut store,
            meshes::solid(1, 1, 1),
            tile_bounds(1, 1, 1),
            PartImage::Still(img),
        )
        .unwrap_err();
        assert_eq!(err.code(), "outpost::image");
    }

    #[test]
    fn test_autocrop_moves_base_and_clips_mesh() {
        let mut store = ImageStore::in_memory();
        let mut raw = RgbaImage::new(32, 64);
        for y in 32..64 {
            for x in 0..32 {
                raw.put_pixel(x, y, Rgba([1, 2, 3, 255]));
            }
        }
        let img = store.from_raw(raw);
        let part = StructurePart::new(
            &mut store,
            meshes::solid(1, 1, 1),
            tile_bounds(1, 1, 1),
            PartImage::Still(img),
        )
        .unwrap();
        // Only the front face is visible once the blank top half is gone.
        assert_eq!(part.base, (0, 0));
        for p in part.mesh.verts() {
            assert!(project(p).1 >= 0);
        }
    }

    #[test]
    fn test_partial_alpha_sets_shadow() {
        let mut store = ImageStore::in_memory();
        let img = filled(&mut store, 32, 32, 128);
        let part = StructurePart::new(
            &mut store,
            meshes::front(1, 1, 1),
            tile_bounds(1, 1, 1),
            PartImage::Still(img),
        )
        .unwrap();
        assert_eq!(part.flags, PART_SHADOW);
    }

    #[test]
    fn test_structure_flags_and_json() {
        let mut store = ImageStore::in_memory();
        let img = filled(&mut store, 32, 32, 255);
        let mut s = StructureDef::new("lamp", Shape::solid(1, 1, 1), 1);
        s.parts.push(
            StructurePart::new(
                &mut store,
                meshes::front(1, 1, 1),
                tile_bounds(1, 1, 1),
                PartImage::Anim(Anim::new(vec![img, img], 4, true)),
            )
            .unwrap(),
        );
        s.light = Some(StructureLight {
            pos: [16, 16, 32],
            color: [255, 220, 160],
            radius: 100,
        });
        assert_eq!(s.flags(), PART_ANIM | STRUCTURE_LIGHT);

        let j = serde_json::to_value(s.parts[0].json(&store).unwrap()).unwrap();
        assert_eq!(j["anim_length"], 2);
        assert_eq!(j["anim_oneshot"], true);
        assert_eq!(j["anim_size"], serde_json::json!([32, 32]));
        let j = serde_json::to_value(s.client_json()).unwrap();
        assert_eq!(j["light_radius"], 100);
        assert_eq!(j["flags"], 6);
    }
}
