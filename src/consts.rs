//! Shared constants for tile geometry, block flags and shape ids.

/// Size of one terrain tile / structure cell in pixels.
pub const TILE_SIZE: u32 = 32;

/// Size of an item icon in pixels.
pub const ICON_SIZE: u32 = 16;

/// Structure sheet size in tiles.
pub const SHEET_SIZE: (u32, u32) = (32, 32);

/// Structure sheet size in pixels.
pub const SHEET_PX: u32 = SHEET_SIZE.0 * TILE_SIZE;

/// Block tile sheet size in tiles.
pub const TILE_SHEET_SIZE: (u32, u32) = (32, 32);

/// Item icon sheet size in icons.
pub const ITEM_SHEET_SIZE: (u32, u32) = (32, 32);

/// Default sprite atlas page size in pixels.
pub const SPRITE_ATLAS_SIZE: (u32, u32) = (2048, 2048);

/// Granularity of sprite atlas placement in pixels.
pub const SPRITE_CELL: u32 = 16;

pub const S_EMPTY: u16 = 0;
pub const S_FLOOR: u16 = 1;
pub const S_SOLID: u16 = 2;
pub const S_RAMP_E: u16 = 3;
pub const S_RAMP_W: u16 = 4;
pub const S_RAMP_S: u16 = 5;
pub const S_RAMP_N: u16 = 6;

pub const B_SUBFLOOR: u16 = 0x0001;
pub const B_FLOOR: u16 = 0x0002;
pub const B_SOLID: u16 = 0x0004;
pub const B_PART_MASK: u16 = 0x0007;
pub const B_OPAQUE: u16 = 0x0008;
pub const B_NON_WALKABLE: u16 = 0x0010;
pub const B_OCCUPIED: u16 = 0x0020;
pub const B_SHAPE_MASK: u16 = 0xf000;

/// Solid block flags carrying the given shape id in the top nibble.
pub const fn b_solid_shape(shape: u16) -> u16 {
    B_SOLID | (shape << 12)
}

/// Block sides in table order.
pub const BLOCK_SIDES: [&str; 4] = ["front", "back", "top", "bottom"];

/// Look up the numeric id of a shape name.
pub fn shape_id(name: &str) -> Option<u16> {
    match name {
        "empty" => Some(S_EMPTY),
        "floor" => Some(S_FLOOR),
        "solid" => Some(S_SOLID),
        "ramp_e" => Some(S_RAMP_E),
        "ramp_w" => Some(S_RAMP_W),
        "ramp_s" => Some(S_RAMP_S),
        "ramp_n" => Some(S_RAMP_N),
        _ => None,
    }
}

/// Block flags implied by a shape name.
pub fn flags_from_shape(name: &str) -> Option<u16> {
    match name {
        "empty" => Some(B_OCCUPIED),
        "floor" => Some(B_OCCUPIED | B_SUBFLOOR),
        other => shape_id(other).map(|id| B_OCCUPIED | b_solid_shape(id)),
    }
}
