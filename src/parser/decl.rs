//! Schema of a `*.data.yaml` declaration document.
//!
//! ```yaml
//! items:
//!   wood:
//!     display_name: Wood
//!     icon: icons/wood.png
//! recipes:
//!   wood:
//!     from_item: true
//!     inputs: { wood: 1 }
//!     station: workbench
//! ```
//!
//! Every section maps prototype names to declarations. Unknown keys are
//! rejected so typos surface as parse errors instead of missing fields.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::image::PixelOp;
use crate::types::ExtraFn;

use super::image_spec::ImageSpec;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeclDocument {
    pub blocks: BTreeMap<String, BlockDecl>,
    pub items: BTreeMap<String, ItemDecl>,
    pub structures: BTreeMap<String, StructureDecl>,
    pub recipes: BTreeMap<String, RecipeDecl>,
    pub sprites: BTreeMap<String, SpriteDecl>,
    pub loot_tables: BTreeMap<String, Vec<LootEntryDecl>>,
    pub extras: BTreeMap<String, ExtraFn>,
}

impl DeclDocument {
    pub fn len(&self) -> usize {
        self.blocks.len()
            + self.items.len()
            + self.structures.len()
            + self.recipes.len()
            + self.sprites.len()
            + self.loot_tables.len()
            + self.extras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LightDecl {
    pub color: [u8; 3],
    pub radius: u16,
    /// Structures only.
    #[serde(default)]
    pub offset: Option<[i32; 3]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockDecl {
    /// Shape name; sets the shape bits and the matching part flags.
    pub shape: Option<String>,
    /// Raw flags, applied after `shape`.
    pub flags: Option<u16>,
    pub front: Option<ImageSpec>,
    pub back: Option<ImageSpec>,
    pub top: Option<ImageSpec>,
    pub bottom: Option<ImageSpec>,
    pub light: Option<LightDecl>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ItemDecl {
    pub display_name: Option<String>,
    pub desc: Option<String>,
    pub icon: Option<ImageSpec>,
    /// Derive the icon and display name from this structure.
    pub from_structure: Option<String>,
    pub extract_offset: Option<(i32, i32)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecipeDecl {
    /// Produce one of the item with the recipe's name.
    pub from_item: bool,
    pub display_name: Option<String>,
    pub inputs: BTreeMap<String, u16>,
    pub outputs: BTreeMap<String, u16>,
    pub station: Option<String>,
    pub ability: Option<String>,
}

/// A shape kind (`empty`, `floor`, `solid`) filling the whole size, or one
/// shape name per cell.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ShapeDecl {
    Kind(String),
    Cells(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshKind {
    Top,
    Front,
    Bottom,
    Solid,
}

/// A named face set sized by the structure, or explicit triangle vertices
/// in pixels.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MeshDecl {
    Named(MeshKind),
    Verts(Vec<[i32; 3]>),
}

/// Frames cut from a horizontal strip.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StripDecl {
    pub image: ImageSpec,
    /// Defaults to the sprite size for sprites.
    #[serde(default)]
    pub frame_size: Option<(u32, u32)>,
    /// Defaults to as many frames as fit in the strip.
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FramesDecl {
    pub frames: Vec<ImageSpec>,
    pub strip: Option<StripDecl>,
    pub rate: u8,
    pub oneshot: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartDecl {
    pub mesh: MeshDecl,
    #[serde(default)]
    pub image: Option<ImageSpec>,
    #[serde(default)]
    pub anim: Option<FramesDecl>,
    #[serde(default)]
    pub bounds: Option<[[i32; 3]; 2]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StructureDecl {
    /// Size in tiles; defaults to `[1, 1, 1]`.
    pub size: Option<[u32; 3]>,
    pub shape: Option<ShapeDecl>,
    pub layer: Option<u8>,
    pub mesh: Option<MeshDecl>,
    pub image: Option<ImageSpec>,
    pub anim: Option<FramesDecl>,
    pub bounds: Option<[[i32; 3]; 2]>,
    pub parts: Vec<PartDecl>,
    pub light: Option<LightDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnimDecl {
    Mirror {
        mirror: String,
    },
    Base {
        length: u8,
        rate: u8,
        #[serde(default)]
        oneshot: bool,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerDecl {
    /// Derive from this layer instead of drawing cells.
    pub base: Option<String>,
    pub ops: Vec<PixelOp>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphicsDecl {
    pub layer: String,
    pub anim: String,
    #[serde(default)]
    pub frames: Vec<ImageSpec>,
    #[serde(default)]
    pub strip: Option<StripDecl>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpriteDecl {
    pub size: Option<(u32, u32)>,
    pub anims: BTreeMap<String, AnimDecl>,
    pub layers: BTreeMap<String, Option<LayerDecl>>,
    pub graphics: Vec<GraphicsDecl>,
}

fn one() -> u16 {
    1
}

/// Exactly one of `item`, `structure` and `table` names the drop.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LootEntryDecl {
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub structure: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "one")]
    pub weight: u16,
    #[serde(default = "one")]
    pub min: u16,
    #[serde(default = "one")]
    pub max: u16,
}
