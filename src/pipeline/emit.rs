//! Per-phase output writers.
//!
//! Each phase writes its bitmaps and `<base>_<side>.json` files and keeps
//! the JSON rows for the binary encoder.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::binary::Tables;
use crate::error::{DataError, Result};
use crate::image::{ImageRef, ImageStore};
use crate::registry::Defs;
use crate::render::{self, sprites, structures, tiles};
use crate::types::{BlockDef, ItemDef, RecipeDef, StructureDef};

use super::files;

/// Writes artifacts under one destination directory.
pub struct Emitter<'a> {
    dest: &'a Path,
    client: Tables,
    server: Tables,
    written: Vec<PathBuf>,
}

impl<'a> Emitter<'a> {
    pub fn new(dest: &'a Path) -> Self {
        Self {
            dest,
            client: Tables::new(),
            server: Tables::new(),
            written: Vec::new(),
        }
    }

    pub fn dest(&self) -> &Path {
        self.dest
    }

    /// Every file written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn file<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        let path = self.dest.join(name);
        files::write_json(&path, value)?;
        self.written.push(path);
        Ok(())
    }

    pub fn png(&mut self, store: &mut ImageStore, r: ImageRef, name: &str) -> Result<()> {
        let path = self.dest.join(name);
        render::save(store, r, &path)?;
        self.written.push(path);
        Ok(())
    }

    pub fn bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.dest.join(name);
        files::write_atomic(&path, bytes)?;
        self.written.push(path);
        Ok(())
    }

    pub fn client<T: Serialize + ?Sized>(&mut self, base: &str, rows: &T) -> Result<()> {
        let value = to_value(base, rows)?;
        self.file(&format!("{}_client.json", base), &value)?;
        self.client.insert(base.to_string(), value);
        Ok(())
    }

    pub fn server<T: Serialize + ?Sized>(&mut self, base: &str, rows: &T) -> Result<()> {
        let value = to_value(base, rows)?;
        self.file(&format!("{}_server.json", base), &value)?;
        self.server.insert(base.to_string(), value);
        Ok(())
    }

    pub fn both<C, S>(&mut self, base: &str, client: &C, server: &S) -> Result<()>
    where
        C: Serialize + ?Sized,
        S: Serialize + ?Sized,
    {
        self.client(base, client)?;
        self.server(base, server)
    }

    /// The client and server tables gathered so far.
    pub fn tables(&self) -> (&Tables, &Tables) {
        (&self.client, &self.server)
    }
}

fn to_value<T: Serialize + ?Sized>(base: &str, rows: &T) -> Result<Value> {
    serde_json::to_value(rows).map_err(|e| DataError::encoding(format!("{}: {}", base, e)))
}

/// Returns the number of structure sheets written.
pub fn structures(em: &mut Emitter<'_>, store: &mut ImageStore, defs: &mut [StructureDef]) -> Result<usize> {
    files::remove_matching(em.dest(), "structures", ".png")?;

    let parts = structures::collect_parts(defs)?;
    let verts = structures::collect_verts(defs, &parts)?;
    let shapes = structures::collect_shapes(defs)?;
    let sheets = structures::build_sheets(store, defs, &parts)?;

    let mut names = Vec::with_capacity(sheets.len());
    for (i, sheet) in sheets.iter().enumerate() {
        let name = format!("structures{}", i);
        em.png(store, *sheet, &format!("{}.png", name))?;
        names.push(name);
    }
    names.sort();
    em.file("structures_list.json", &names)?;

    em.client("structure_parts", &structures::parts_json(store, defs, &parts)?)?;
    em.client("structure_verts", &structures::verts_json(&verts))?;
    em.client("structure_shapes", &shapes)?;

    let client: Vec<_> = defs.iter().map(StructureDef::client_json).collect();
    let server: Vec<_> = defs.iter().map(StructureDef::server_json).collect();
    em.both("structures", &client, &server)?;
    Ok(sheets.len())
}

pub fn blocks(em: &mut Emitter<'_>, store: &mut ImageStore, defs: &mut [BlockDef]) -> Result<()> {
    let sheet = tiles::build_tile_sheet(store, defs)?;
    em.png(store, sheet, "tiles.png")?;
    let client: Vec<_> = defs.iter().map(BlockDef::client_json).collect();
    let server: Vec<_> = defs.iter().map(BlockDef::server_json).collect();
    em.both("blocks", &client, &server)
}

pub fn items(em: &mut Emitter<'_>, store: &mut ImageStore, defs: &mut [ItemDef]) -> Result<()> {
    let sheet = tiles::build_item_sheet(store, defs)?;
    em.png(store, sheet, "items.png")?;
    let client: Vec<_> = defs.iter().map(ItemDef::client_json).collect();
    let server: Vec<_> = defs.iter().map(ItemDef::server_json).collect();
    em.both("items", &client, &server)
}

pub fn recipes(em: &mut Emitter<'_>, defs: &[RecipeDef]) -> Result<()> {
    let client: Vec<_> = defs.iter().map(RecipeDef::client_json).collect();
    let server: Vec<_> = defs.iter().map(RecipeDef::server_json).collect();
    em.both("recipes", &client, &server)
}

pub fn animations(em: &mut Emitter<'_>, defs: &Defs) -> Result<()> {
    let s = &defs.sprites;
    em.both("animations", &sprites::anims_client_json(s), &sprites::anims_server_json(s))
}

/// Pack the atlas, then write the layer and graphics tables that point
/// into it. Returns the number of atlas pages written.
pub fn sprites(
    em: &mut Emitter<'_>,
    store: &mut ImageStore,
    defs: &mut Defs,
    font: Option<ImageRef>,
    page_px: (u32, u32),
) -> Result<usize> {
    files::remove_matching(&em.dest().join("sprites"), "sprites", ".png")?;
    let pages = sprites::build_atlas(store, &mut defs.sprites, font, page_px)?;
    for (i, page) in pages.iter().enumerate() {
        em.png(store, *page, &format!("sprites/sprites{}.png", i))?;
    }
    em.file("sprites_list.json", &sprites::sheet_names(pages.len()))?;

    let s = &defs.sprites;
    em.both(
        "sprite_layers",
        &sprites::layers_client_json(s),
        &sprites::layers_server_json(s),
    )?;
    em.client("sprite_graphics", &sprites::graphics_json(s))?;
    Ok(pages.len())
}

pub fn loot_tables(em: &mut Emitter<'_>, defs: &Defs) -> Result<()> {
    let server: Vec<_> = defs.loot_tables.iter().map(|t| t.server_json()).collect();
    em.server("loot_tables", &server)
}

/// `extras_client.json` maps each extra's name to its value. Extras that
/// failed to evaluate are left out.
pub fn extras(em: &mut Emitter<'_>, defs: &Defs) -> Result<()> {
    let map: Map<String, Value> = defs
        .extras
        .iter()
        .filter_map(|x| x.value.clone().map(|v| (x.name.clone(), v)))
        .collect();
    em.client("extras", &map)
}
