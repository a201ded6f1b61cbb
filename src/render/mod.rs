//! Atlas composition.
//!
//! Packs block tiles, item icons, structure parts and sprite cells onto
//! sheets and records where each image landed.

pub mod packer;
mod png;
pub mod sprites;
pub mod structures;
pub mod tiles;

pub use packer::{dedupe, pack_boxes, pack_boxes_uniform, BoxPacker, ImagePacker, Placement};
pub use png::{save, write_png};
