//! Frozen content definitions.
//!
//! Builders produce these at instantiate time; the resolver then fills in
//! ids and cross-references, and the atlas composers fill in sheet
//! positions. Each kind also knows its client and server JSON rows.

mod block;
mod colour;
mod extra;
mod item;
mod loot;
mod recipe;
pub mod sprite;
pub mod structure;

pub use block::{BlockClientJson, BlockDef, BlockLight, BlockServerJson, Side};
pub use colour::Colour;
pub use extra::{CustomExtra, ExtraDef, ExtraFn};
pub use item::{ItemClientJson, ItemDef, ItemServerJson};
pub use loot::{LootEntry, LootKind, LootTableDef, LootTableServerJson};
pub use recipe::{ItemCount, RecipeClientJson, RecipeDef, RecipeServerJson};
pub use sprite::{AnimDef, AnimSource, CellSource, GraphicsCell, LayerDef, LayerSource, SpriteDef};
pub use structure::{PartImage, PartJson, Shape, StructureDef, StructureLight, StructurePart};
