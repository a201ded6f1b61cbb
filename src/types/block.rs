use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::image::ImageRef;

/// Block faces, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
    Top,
    Bottom,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Front, Side::Back, Side::Top, Side::Bottom];

    pub fn name(self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLight {
    pub color: [u8; 3],
    pub radius: u16,
}

/// A terrain cell definition.
#[derive(Debug, Clone)]
pub struct BlockDef {
    pub name: String,
    pub id: u16,
    pub flags: u16,
    pub tiles: BTreeMap<Side, ImageRef>,
    pub light: Option<BlockLight>,
    /// Index of each side's cell in `tiles.png`, set when the sheet is built.
    pub tile_ids: BTreeMap<Side, u16>,
}

impl BlockDef {
    pub fn new(name: impl Into<String>, flags: u16) -> Self {
        Self {
            name: name.into(),
            id: 0,
            flags,
            tiles: BTreeMap::new(),
            light: None,
            tile_ids: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlockClientJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_r: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_g: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_b: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light_radius: Option<u16>,
    pub flags: u16,
}

#[derive(Debug, Serialize)]
pub struct BlockServerJson {
    pub name: String,
    pub flags: u16,
}

impl BlockDef {
    pub fn client_json(&self) -> BlockClientJson {
        let tile = |side| self.tile_ids.get(&side).copied();
        BlockClientJson {
            front: tile(Side::Front),
            back: tile(Side::Back),
            top: tile(Side::Top),
            bottom: tile(Side::Bottom),
            light_r: self.light.map(|l| l.color[0]),
            light_g: self.light.map(|l| l.color[1]),
            light_b: self.light.map(|l| l.color[2]),
            light_radius: self.light.map(|l| l.radius),
            flags: self.flags,
        }
    }

    pub fn server_json(&self) -> BlockServerJson {
        BlockServerJson {
            name: self.name.clone(),
            flags: self.flags,
        }
    }
}
