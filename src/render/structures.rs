//! Structure sheets and the flat part, vertex and shape tables.

use std::collections::HashMap;

use crate::consts::{SHEET_PX, TILE_SIZE};
use crate::error::{DataError, Result};
use crate::geom::V3;
use crate::image::{ImageRef, ImageStore};
use crate::types::{PartJson, StructureDef};

use super::packer::{dedupe, pack_boxes};

/// Index of a part: `(structure, part within structure)`.
pub type PartKey = (usize, usize);

/// Number parts consecutively. Each structure's `part_idx` is the index
/// of its first part.
pub fn collect_parts(structures: &mut [StructureDef]) -> Result<Vec<PartKey>> {
    let mut all = Vec::new();
    for (i, s) in structures.iter_mut().enumerate() {
        s.part_idx = to_u16(all.len(), "structure parts")?;
        all.extend((0..s.parts.len()).map(|j| (i, j)));
    }
    Ok(all)
}

/// Flatten part meshes into one vertex list. Parts with identical vertex
/// lists share a range.
pub fn collect_verts(structures: &mut [StructureDef], parts: &[PartKey]) -> Result<Vec<V3>> {
    let mut idx_map: HashMap<Vec<V3>, usize> = HashMap::new();
    let mut all = Vec::new();
    for &(i, j) in parts {
        let part = &mut structures[i].parts[j];
        let key: Vec<V3> = part.mesh.verts().collect();
        let count = key.len();
        let idx = match idx_map.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = all.len();
                all.extend(key.iter().copied());
                idx_map.insert(key, idx);
                idx
            }
        };
        part.vert_idx = to_u16(idx, "structure vertices")?;
        part.vert_count = to_u16(count, "structure part vertices")?;
    }
    Ok(all)
}

/// Flatten shape grids into one list. Identical grids share a range.
pub fn collect_shapes(structures: &mut [StructureDef]) -> Result<Vec<u16>> {
    let mut idx_map: HashMap<Vec<u16>, usize> = HashMap::new();
    let mut all = Vec::new();
    for s in structures.iter_mut() {
        let idx = match idx_map.get(&s.shape.cells) {
            Some(&idx) => idx,
            None => {
                let idx = all.len();
                all.extend(s.shape.cells.iter().copied());
                idx_map.insert(s.shape.cells.clone(), idx);
                idx
            }
        };
        s.shape_idx = to_u16(idx, "structure shapes")?;
    }
    Ok(all)
}

/// Pack every part image onto tile-aligned sheets, recording each part's
/// sheet and offset. Identical images are placed once.
pub fn build_sheets(
    store: &mut ImageStore,
    structures: &mut [StructureDef],
    parts: &[PartKey],
) -> Result<Vec<ImageRef>> {
    let mut all_imgs = Vec::with_capacity(parts.len());
    for &(i, j) in parts {
        all_imgs.push(structures[i].parts[j].img.sheet_image(store)?);
    }
    let (kept, idx_map) = dedupe(&all_imgs, |img| store.descriptor(*img));
    let imgs: Vec<ImageRef> = kept.iter().map(|&k| all_imgs[k]).collect();
    let boxes: Vec<(u32, u32)> = imgs.iter().map(|i| store.size(*i)).collect();
    let (num_sheets, placements) = pack_boxes((SHEET_PX, SHEET_PX), &boxes, TILE_SIZE)?;

    let sheets = (0..num_sheets)
        .map(|page| {
            let children: Vec<_> = imgs
                .iter()
                .zip(&placements)
                .filter(|(_, p)| p.page == page)
                .map(|(img, p)| (*img, (p.x as i32, p.y as i32)))
                .collect();
            store.sheet(&children, (SHEET_PX, SHEET_PX))
        })
        .collect();

    for (&(i, j), &idx) in parts.iter().zip(&idx_map) {
        let p = placements[idx];
        let part = &mut structures[i].parts[j];
        part.sheet = u8::try_from(p.page)
            .map_err(|_| DataError::encoding("too many structure sheets"))?;
        part.offset = (p.x as i32, p.y as i32);
    }
    Ok(sheets)
}

pub fn parts_json(store: &ImageStore, structures: &[StructureDef], parts: &[PartKey]) -> Result<Vec<PartJson>> {
    parts
        .iter()
        .map(|&(i, j)| structures[i].parts[j].json(store))
        .collect()
}

pub fn verts_json(verts: &[V3]) -> Vec<i32> {
    verts.iter().flat_map(|v| v.to_array()).collect()
}

fn to_u16(n: usize, what: &str) -> Result<u16> {
    u16::try_from(n).map_err(|_| DataError::encoding(format!("too many {} ({})", what, n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::meshes;
    use crate::types::{PartImage, Shape, StructurePart};
    use image::{Rgba, RgbaImage};

    fn structure(store: &mut ImageStore, name: &str, shade: u8) -> StructureDef {
        let img = store.from_raw(RgbaImage::from_pixel(32, 64, Rgba([shade, 0, 0, 255])));
        let t = TILE_SIZE as i32;
        let part = StructurePart::new(
            store,
            meshes::solid(1, 1, 1),
            (V3::new(0, 0, 0), V3::new(t, t, t)),
            PartImage::Still(img),
        )
        .unwrap();
        let mut s = StructureDef::new(name, Shape::solid(1, 1, 1), 0);
        s.parts.push(part);
        s
    }

    #[test]
    fn test_tables_are_deduplicated() {
        let mut store = ImageStore::in_memory();
        let mut structures = vec![
            structure(&mut store, "a", 10),
            structure(&mut store, "b", 10),
            structure(&mut store, "c", 20),
        ];
        structures[2].shape = Shape::floor(1, 1, 1);

        let parts = collect_parts(&mut structures).unwrap();
        assert_eq!(parts, vec![(0, 0), (1, 0), (2, 0)]);
        assert_eq!(structures[2].part_idx, 2);

        let verts = collect_verts(&mut structures, &parts).unwrap();
        let n = structures[0].parts[0].vert_count as usize;
        assert_eq!(verts.len(), n);
        assert!(structures.iter().all(|s| s.parts[0].vert_idx == 0));
        assert_eq!(verts_json(&verts).len(), 3 * n);

        let shapes = collect_shapes(&mut structures).unwrap();
        assert_eq!(shapes, vec![2, 1]);
        assert_eq!(structures[1].shape_idx, 0);
        assert_eq!(structures[2].shape_idx, 1);
    }

    #[test]
    fn test_sheets_share_identical_images() {
        let mut store = ImageStore::in_memory();
        let mut structures = vec![
            structure(&mut store, "a", 10),
            structure(&mut store, "b", 10),
            structure(&mut store, "c", 20),
        ];
        let parts = collect_parts(&mut structures).unwrap();
        let sheets = build_sheets(&mut store, &mut structures, &parts).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(store.size(sheets[0]), (SHEET_PX, SHEET_PX));

        let offs: Vec<_> = structures.iter().map(|s| s.parts[0].offset).collect();
        assert_eq!(offs[0], offs[1]);
        assert_ne!(offs[0], offs[2]);
        assert!(offs.iter().all(|o| o.0 % 32 == 0 && o.1 % 32 == 0));
    }
}
