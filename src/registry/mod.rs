//! Definition registry and id resolution.
//!
//! After every declaration module ran, prototypes are instantiated into a
//! [`Defs`] collection. [`postprocess`] then numbers every kind, resolves
//! names to ids and materializes sprite graphics cells. Problems are
//! accumulated into a [`Diagnostics`] so one run reports all of them.
//!
//! ```ignore
//! let (mut defs, errors) = builders.collect_defs(&mut images, &descs);
//! let ids = registry::postprocess(&mut defs, &mut images, &mut diags);
//! assert_eq!(ids.items["none"], 0);
//! ```

mod graph;
mod ids;

use std::collections::BTreeMap;

use log::debug;

use crate::error::{DataError, Result};
use crate::image::ImageStore;
use crate::types::sprite::full_name;
use crate::types::{
    BlockDef, ExtraDef, ItemCount, ItemDef, LootKind, LootTableDef, RecipeDef, SpriteDef, StructureDef,
};
use crate::validation::Diagnostics;

pub use graph::{CycleError, DependencyGraph};
pub use ids::{assign_ids, Named};

/// Names reserved at the start of the block id space.
pub const RESERVED_BLOCKS: &[&str] = &["empty", "placeholder"];
/// Names reserved at the start of the item id space.
pub const RESERVED_ITEMS: &[&str] = &["none"];

/// Every instantiated definition, one list per kind.
#[derive(Debug, Default)]
pub struct Defs {
    pub blocks: Vec<BlockDef>,
    pub items: Vec<ItemDef>,
    pub recipes: Vec<RecipeDef>,
    pub structures: Vec<StructureDef>,
    pub sprites: Vec<SpriteDef>,
    pub loot_tables: Vec<LootTableDef>,
    pub extras: Vec<ExtraDef>,
}

/// Name to id tables, per kind. Animation and layer tables use full names
/// (`sprite//name`).
#[derive(Debug, Clone, Default)]
pub struct IdMaps {
    pub blocks: BTreeMap<String, u16>,
    pub items: BTreeMap<String, u16>,
    pub recipes: BTreeMap<String, u16>,
    pub structures: BTreeMap<String, u16>,
    pub sprites: BTreeMap<String, u16>,
    pub loot_tables: BTreeMap<String, u16>,
    pub animations: BTreeMap<String, u16>,
    pub layers: BTreeMap<String, u16>,
    /// Graphics id of each layer's first cell.
    pub layer_starts: BTreeMap<String, u16>,
    /// Index of each animation within its sprite.
    pub anim_local_ids: BTreeMap<String, u16>,
}

impl IdMaps {
    fn lookup(map: &BTreeMap<String, u16>, kind: &str, name: &str) -> Result<u16> {
        map.get(name)
            .copied()
            .ok_or_else(|| DataError::resolution(kind, name))
    }

    pub fn item(&self, name: &str) -> Result<u16> {
        Self::lookup(&self.items, "item", name)
    }

    pub fn structure(&self, name: &str) -> Result<u16> {
        Self::lookup(&self.structures, "structure", name)
    }

    pub fn loot_table(&self, name: &str) -> Result<u16> {
        Self::lookup(&self.loot_tables, "loot table", name)
    }
}

/// Number every kind and resolve all cross references.
pub fn postprocess(defs: &mut Defs, images: &mut ImageStore, diags: &mut Diagnostics) -> IdMaps {
    let mut ids = IdMaps {
        structures: diags
            .check(assign_ids(&mut defs.structures, &[]))
            .unwrap_or_default(),
        blocks: diags
            .check(assign_ids(&mut defs.blocks, RESERVED_BLOCKS))
            .unwrap_or_default(),
        items: diags
            .check(assign_ids(&mut defs.items, RESERVED_ITEMS))
            .unwrap_or_default(),
        recipes: diags
            .check(assign_ids(&mut defs.recipes, &[]))
            .unwrap_or_default(),
        sprites: diags
            .check(assign_ids(&mut defs.sprites, &[]))
            .unwrap_or_default(),
        loot_tables: diags
            .check(assign_ids(&mut defs.loot_tables, &[]))
            .unwrap_or_default(),
        ..IdMaps::default()
    };

    for r in &mut defs.recipes {
        if let Err(e) = resolve_recipe(r, &ids) {
            diags.push_err(&e);
        }
    }
    resolve_sprites(&mut defs.sprites, &mut ids, images, diags);
    resolve_loot_tables(&mut defs.loot_tables, &ids, diags);
    for x in &mut defs.extras {
        match x.func.eval(&ids) {
            Ok(v) => x.value = Some(v),
            Err(e) => diags.push_err(&e),
        }
    }

    debug!(
        "resolved {} blocks, {} items, {} structures, {} animations",
        ids.blocks.len(),
        ids.items.len(),
        ids.structures.len(),
        ids.animations.len()
    );
    ids
}

fn resolve_counts(xs: &mut [ItemCount], ids: &IdMaps) -> Result<()> {
    for x in xs {
        x.id = ids.item(&x.item)?;
    }
    Ok(())
}

fn resolve_recipe(r: &mut RecipeDef, ids: &IdMaps) -> Result<()> {
    resolve_counts(&mut r.inputs, ids)?;
    resolve_counts(&mut r.outputs, ids)?;
    r.station_id = ids.structure(&r.station)?;
    r.ability_id = match &r.ability {
        Some(a) => ids.item(a)?,
        None => 0,
    };
    Ok(())
}

/// Assign animation, layer and graphics ids and materialize every cell.
///
/// Animations and layers are numbered globally in sprite order, then by
/// name within a sprite. Each layer owns one graphics id per animation of
/// its sprite, starting at its `start`.
pub fn resolve_sprites(
    sprites: &mut [SpriteDef],
    ids: &mut IdMaps,
    images: &mut ImageStore,
    diags: &mut Diagnostics,
) {
    let mut next_anim = 0u16;
    let mut next_layer = 0u16;
    let mut next_graphics = 0u32;

    for s in sprites.iter_mut() {
        for (local, a) in s.anims.values_mut().enumerate() {
            a.id = next_anim;
            a.local_id = local as u16;
            next_anim = next_anim.wrapping_add(1);
            ids.animations.insert(full_name(&s.name, &a.name), a.id);
            ids.anim_local_ids.insert(full_name(&s.name, &a.name), a.local_id);
        }
        let count = s.anims.len() as u32;
        for l in s.layers.values_mut() {
            l.id = next_layer;
            next_layer = next_layer.wrapping_add(1);
            if next_graphics + count > u16::MAX as u32 {
                diags.push_err(&DataError::encoding("sprite graphics ids exceed 16 bits"));
            }
            l.start = next_graphics as u16;
            next_graphics += count;
            ids.layers.insert(full_name(&s.name, &l.name), l.id);
            ids.layer_starts.insert(full_name(&s.name, &l.name), l.start);
        }

        let pairs: Vec<(String, String)> = s
            .layers
            .keys()
            .flat_map(|l| s.anims.keys().map(move |a| (l.clone(), a.clone())))
            .collect();
        for (layer, anim) in pairs {
            match s.get_graphics(images, &layer, &anim) {
                Ok(Some(_)) => {}
                Ok(None) => diags.warning(
                    "outpost::sprite::missing-graphics",
                    format!("sprite `{}` has no graphics for layer `{}`, animation `{}`", s.name, layer, anim),
                ),
                Err(e) => diags.push_err(&e),
            }
        }
    }
}

fn resolve_loot_tables(tables: &mut [LootTableDef], ids: &IdMaps, diags: &mut Diagnostics) {
    let mut graph = DependencyGraph::new();
    for t in tables.iter_mut() {
        graph.register(t.name.as_str());
        for e in &mut t.entries {
            let id = match e.kind {
                LootKind::Item => ids.item(&e.name),
                LootKind::Structure => ids.structure(&e.name),
                LootKind::Table => {
                    graph.add_dependency(t.name.as_str(), e.name.as_str());
                    ids.loot_table(&e.name)
                }
            };
            match id {
                Ok(id) => e.id = id,
                Err(err) => diags.push_err(&err),
            }
        }
    }
    if let Err(cycle) = graph.topological_sort() {
        let first = cycle.cycle.first().cloned().unwrap_or_default();
        diags.push_err(&DataError::config(first, "table", cycle.to_string()));
    }
}
