//! Uniform-grid sheets: block tiles (`tiles.png`) and item icons (`items.png`).

use crate::consts::{ICON_SIZE, ITEM_SHEET_SIZE, TILE_SHEET_SIZE, TILE_SIZE};
use crate::error::{DataError, Result};
use crate::image::{ImageRef, ImageStore};
use crate::types::{BlockDef, ItemDef, Side};

use super::packer::{dedupe, pack_boxes_uniform};

/// Lay out `imgs` on a single grid page of `grid` cells of `cell` pixels.
/// Cell 0 is left blank. Returns the sheet and each input's cell index.
fn build_grid(
    store: &mut ImageStore,
    what: &str,
    imgs: &[ImageRef],
    grid: (u32, u32),
    cell: u32,
) -> Result<(ImageRef, Vec<u16>)> {
    for img in imgs {
        let size = store.size(*img);
        if size != (cell, cell) {
            return Err(DataError::image(format!(
                "{} image is {}x{}, expected {}x{}",
                what, size.0, size.1, cell, cell
            )));
        }
    }

    let mut all = Vec::with_capacity(imgs.len() + 1);
    all.push(store.blank((cell, cell)));
    all.extend_from_slice(imgs);
    let (kept, idx_map) = dedupe(&all, |img| store.descriptor(*img));

    let (pages, placements) = pack_boxes_uniform(grid, kept.len());
    if pages > 1 {
        return Err(DataError::pack(format!(
            "{} distinct {} images do not fit on one {}x{} sheet",
            kept.len(),
            what,
            grid.0,
            grid.1
        )));
    }
    let children: Vec<_> = kept
        .iter()
        .zip(&placements)
        .map(|(&k, p)| (all[k], ((p.x * cell) as i32, (p.y * cell) as i32)))
        .collect();
    let sheet = store.sheet(&children, (grid.0 * cell, grid.1 * cell));

    let ids = idx_map[1..].iter().map(|&i| i as u16).collect();
    Ok((sheet, ids))
}

/// Build `tiles.png` and record each block side's tile index.
pub fn build_tile_sheet(store: &mut ImageStore, blocks: &mut [BlockDef]) -> Result<ImageRef> {
    let keys: Vec<(usize, Side)> = blocks
        .iter()
        .enumerate()
        .flat_map(|(i, b)| b.tiles.keys().map(move |s| (i, *s)))
        .collect();
    let imgs: Vec<ImageRef> = keys.iter().map(|(i, s)| blocks[*i].tiles[s]).collect();
    let (sheet, ids) = build_grid(store, "block tile", &imgs, TILE_SHEET_SIZE, TILE_SIZE)?;
    for ((i, side), id) in keys.into_iter().zip(ids) {
        blocks[i].tile_ids.insert(side, id);
    }
    Ok(sheet)
}

/// Build `items.png` and record each item's icon index.
pub fn build_item_sheet(store: &mut ImageStore, items: &mut [ItemDef]) -> Result<ImageRef> {
    let imgs: Vec<ImageRef> = items.iter().map(|i| i.icon).collect();
    let (sheet, ids) = build_grid(store, "item icon", &imgs, ITEM_SHEET_SIZE, ICON_SIZE)?;
    for (item, id) in items.iter_mut().zip(ids) {
        item.tile = id;
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(store: &mut ImageStore, size: u32, v: u8) -> ImageRef {
        store.from_raw(RgbaImage::from_pixel(size, size, Rgba([v, v, v, 255])))
    }

    #[test]
    fn test_item_icons_share_cells() {
        let mut store = ImageStore::in_memory();
        let grey = solid(&mut store, 16, 128);
        let red = store.from_raw(RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 255])));
        let blank = store.blank((16, 16));
        let mut items = vec![
            ItemDef::new("wood", "Wood", grey),
            ItemDef::new("plank", "Plank", grey),
            ItemDef::new("ruby", "Ruby", red),
            ItemDef::new("none", "Nothing", blank),
        ];
        let sheet = build_item_sheet(&mut store, &mut items).unwrap();
        assert_eq!(store.size(sheet), (512, 512));
        let tiles: Vec<u16> = items.iter().map(|i| i.tile).collect();
        assert_eq!(tiles, vec![1, 1, 2, 0]);

        let raw = store.raw(sheet).unwrap();
        assert_eq!(raw.get_pixel(16, 0).0, [128, 128, 128, 255]);
        assert_eq!(raw.get_pixel(32, 0).0, [255, 0, 0, 255]);
        assert_eq!(raw.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_block_sides() {
        let mut store = ImageStore::in_memory();
        let top = solid(&mut store, 32, 90);
        let front = solid(&mut store, 32, 60);
        let mut grass = BlockDef::new("grass", 0);
        grass.tiles.insert(Side::Top, top);
        grass.tiles.insert(Side::Front, front);
        let mut blocks = vec![BlockDef::new("empty", 0), grass];
        build_tile_sheet(&mut store, &mut blocks).unwrap();
        assert!(blocks[0].tile_ids.is_empty());
        assert_eq!(blocks[1].tile_ids[&Side::Front], 1);
        assert_eq!(blocks[1].tile_ids[&Side::Top], 2);
    }

    #[test]
    fn test_wrong_icon_size() {
        let mut store = ImageStore::in_memory();
        let big = solid(&mut store, 32, 1);
        let mut items = vec![ItemDef::new("big", "Big", big)];
        let err = build_item_sheet(&mut store, &mut items).unwrap_err();
        assert_eq!(err.code(), "outpost::image");
    }
}
