//! Sprite atlas composition and the animation / layer / graphics tables.

use log::debug;

use crate::consts::SPRITE_CELL;
use crate::error::{DataError, Result};
use crate::image::{ImageRef, ImageStore};
use crate::types::sprite::{AnimClientJson, AnimServerJson, GraphicsJson, LayerClientJson, LayerServerJson};
use crate::types::{CellSource, SpriteDef};

use super::packer::{dedupe, ImagePacker};

/// Pack every explicit or recoloured cell onto atlas pages of `page_px`.
/// Mirror cells then take the position of the cell they mirror.
///
/// `font`, when given, is placed first so it lands at the origin of
/// page 0.
pub fn build_atlas(
    store: &mut ImageStore,
    sprites: &mut [SpriteDef],
    font: Option<ImageRef>,
    page_px: (u32, u32),
) -> Result<Vec<ImageRef>> {
    let mut packer = ImagePacker::new(page_px, SPRITE_CELL);
    if let Some(font) = font {
        packer.place(store, &[font])?;
    }

    let mut keys = Vec::new();
    let mut strips = Vec::new();
    for (si, s) in sprites.iter().enumerate() {
        for (key, cell) in &s.cells {
            if let CellSource::Image(frames) = &cell.source {
                if frames.is_empty() {
                    return Err(DataError::image(format!(
                        "sprite `{}` has an empty animation for {}/{}",
                        s.name, key.0, key.1
                    )));
                }
                strips.push(frames.flatten(store)?);
                keys.push((si, key.clone()));
            }
        }
    }

    let (kept, idx_map) = dedupe(&strips, |img| store.descriptor(*img));
    let unique: Vec<ImageRef> = kept.iter().map(|&k| strips[k]).collect();
    let placements = packer.place(store, &unique)?;
    debug!(
        "sprite atlas: {} cells, {} unique, {} pages",
        strips.len(),
        unique.len(),
        packer.num_pages()
    );

    for ((si, key), idx) in keys.into_iter().zip(idx_map) {
        let p = placements[idx];
        if let Some(cell) = sprites[si].cells.get_mut(&key) {
            cell.sheet = u8::try_from(p.page).map_err(|_| DataError::encoding("too many sprite atlas pages"))?;
            cell.src_offset = (p.x, p.y);
        }
    }
    for s in sprites.iter_mut() {
        s.inherit_positions();
    }
    Ok(packer.build_sheets(store))
}

pub fn sheet_names(count: usize) -> Vec<String> {
    let mut names: Vec<String> = (0..count).map(|i| format!("sprites{}", i)).collect();
    names.sort();
    names
}

/// Animations in id order.
pub fn anims_client_json(sprites: &[SpriteDef]) -> Vec<AnimClientJson> {
    let mut out: Vec<(u16, AnimClientJson)> = sprites
        .iter()
        .flat_map(|s| s.anims.values().map(|a| (a.id, a.client_json())))
        .collect();
    out.sort_by_key(|(id, _)| *id);
    out.into_iter().map(|(_, j)| j).collect()
}

pub fn anims_server_json(sprites: &[SpriteDef]) -> Vec<AnimServerJson> {
    let mut out: Vec<(u16, AnimServerJson)> = sprites
        .iter()
        .flat_map(|s| s.anims.values().map(|a| (a.id, a.server_json(&s.name))))
        .collect();
    out.sort_by_key(|(id, _)| *id);
    out.into_iter().map(|(_, j)| j).collect()
}

pub fn layers_client_json(sprites: &[SpriteDef]) -> Vec<LayerClientJson> {
    let mut out: Vec<(u16, LayerClientJson)> = sprites
        .iter()
        .flat_map(|s| {
            let count = s.anims.len() as u16;
            s.layers.values().map(move |l| {
                (
                    l.id,
                    LayerClientJson {
                        start: l.start,
                        count,
                    },
                )
            })
        })
        .collect();
    out.sort_by_key(|(id, _)| *id);
    out.into_iter().map(|(_, j)| j).collect()
}

pub fn layers_server_json(sprites: &[SpriteDef]) -> Vec<LayerServerJson> {
    let mut out: Vec<(u16, LayerServerJson)> = sprites
        .iter()
        .flat_map(|s| {
            s.layers.values().map(move |l| {
                (
                    l.id,
                    LayerServerJson {
                        name: crate::types::sprite::full_name(&s.name, &l.name),
                    },
                )
            })
        })
        .collect();
    out.sort_by_key(|(id, _)| *id);
    out.into_iter().map(|(_, j)| j).collect()
}

/// One entry per graphics id: every layer's cells in animation order.
/// Cells that could not be produced are written as zeroed entries.
pub fn graphics_json(sprites: &[SpriteDef]) -> Vec<GraphicsJson> {
    let mut layers: Vec<(u16, Vec<GraphicsJson>)> = Vec::new();
    for s in sprites {
        for (lname, l) in &s.layers {
            let cells = s
                .anims
                .keys()
                .map(|aname| {
                    s.cells
                        .get(&(lname.clone(), aname.clone()))
                        .map(|c| c.json())
                        .unwrap_or_default()
                })
                .collect();
            layers.push((l.start, cells));
        }
    }
    layers.sort_by_key(|(start, _)| *start);
    layers.into_iter().flat_map(|(_, cells)| cells).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Anim;
    use crate::registry::resolve_sprites;
    use crate::registry::IdMaps;
    use crate::types::{AnimDef, LayerDef, LayerSource};
    use crate::validation::Diagnostics;
    use image::{Rgba, RgbaImage};

    fn pony(store: &mut ImageStore) -> SpriteDef {
        let mut s = SpriteDef::new("pony", (32, 32));
        s.anims.insert("walk-1".into(), AnimDef::base("walk-1", 6, 8, false));
        s.anims.insert("walk-3".into(), AnimDef::mirror("walk-3", "walk-1"));
        s.anims.insert("idle".into(), AnimDef::base("idle", 1, 1, false));
        s.layers.insert("base".into(), LayerDef::new("base", LayerSource::Base));
        let frames = (0..6)
            .map(|i| {
                let mut img = RgbaImage::new(32, 32);
                for y in 4..20 {
                    img.put_pixel(8 + i, y, Rgba([200, 100, 50, 255]));
                }
                store.from_raw(img)
            })
            .collect();
        s.graphics
            .insert(("base".into(), "walk-1".into()), Anim::new(frames, 8, false));
        s
    }

    fn resolved(store: &mut ImageStore) -> (Vec<SpriteDef>, Diagnostics) {
        let mut sprites = vec![pony(store)];
        for s in &mut sprites {
            s.resolve_anim_timing().unwrap();
        }
        let mut diags = Diagnostics::new();
        resolve_sprites(&mut sprites, &mut IdMaps::default(), store, &mut diags);
        (sprites, diags)
    }

    #[test]
    fn test_atlas_places_cells_on_grid() {
        let mut store = ImageStore::in_memory();
        let (mut sprites, diags) = resolved(&mut store);
        assert_eq!(diags.warning_count(), 1);

        let font = store.blank((64, 16));
        let sheets = build_atlas(&mut store, &mut sprites, Some(font), (256, 256)).unwrap();
        assert_eq!(sheets.len(), 1);

        let walk = &sprites[0].cells[&("base".to_string(), "walk-1".to_string())];
        let mirror = &sprites[0].cells[&("base".to_string(), "walk-3".to_string())];
        assert_eq!(walk.size, (6, 16));
        assert_eq!(walk.dest_offset, (8, 4));
        assert_eq!(walk.src_offset.0 % SPRITE_CELL, 0);
        assert_eq!(walk.src_offset.1 % SPRITE_CELL, 0);
        assert_ne!(walk.src_offset, (0, 0));
        assert_eq!(mirror.src_offset, walk.src_offset);
        assert_eq!(mirror.sheet, walk.sheet);
        assert!(mirror.mirror);
    }

    #[test]
    fn test_tables_follow_ids() {
        let mut store = ImageStore::in_memory();
        let (mut sprites, _) = resolved(&mut store);
        build_atlas(&mut store, &mut sprites, None, (256, 256)).unwrap();

        let anims = anims_client_json(&sprites);
        assert_eq!(anims.len(), 3);
        assert_eq!(anims[1].length, 6);
        assert_eq!(anims[1].framerate, 8);
        assert_eq!(anims[2].length, 6);

        let server = anims_server_json(&sprites);
        assert_eq!(server[0].name, "pony//idle");

        let layers = layers_client_json(&sprites);
        assert_eq!((layers[0].start, layers[0].count), (0, 3));
        assert_eq!(layers_server_json(&sprites)[0].name, "pony//base");

        let graphics = graphics_json(&sprites);
        assert_eq!(graphics.len(), 3);
        assert_eq!(graphics[0].size, (0, 0));
        assert_eq!(graphics[1].size, (6, 16));
        assert!(graphics[2].mirror);
        assert_eq!(sheet_names(2), vec!["sprites0", "sprites1"]);
    }
}
