//! Layered sprite animations.
//!
//! A sprite has a set of animations and a set of layers. Every
//! `(layer, anim)` pair names one graphics cell. Cells are either given
//! explicitly or derived: a mirror animation reuses its base animation's
//! cell flipped, and a derived layer recolours the cell of its base layer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{DataError, Result};
use crate::image::{Anim, ImageStore, PixelOp};

/// Longest derivation chain followed before giving up.
pub const MAX_DERIVATION_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimSource {
    Base { length: u8, rate: u8, oneshot: bool },
    /// Horizontal mirror of another animation of the same sprite.
    Mirror { base: String },
}

#[derive(Debug, Clone)]
pub struct AnimDef {
    pub name: String,
    pub source: AnimSource,
    pub id: u16,
    /// Index among the sprite's animations.
    pub local_id: u16,
    /// Timing, copied from the base for mirror animations.
    pub length: u8,
    pub rate: u8,
    pub oneshot: bool,
}

impl AnimDef {
    pub fn base(name: impl Into<String>, length: u8, rate: u8, oneshot: bool) -> Self {
        Self {
            name: name.into(),
            source: AnimSource::Base {
                length,
                rate,
                oneshot,
            },
            id: 0,
            local_id: 0,
            length,
            rate,
            oneshot,
        }
    }

    pub fn mirror(name: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: AnimSource::Mirror { base: base.into() },
            id: 0,
            local_id: 0,
            length: 0,
            rate: 0,
            oneshot: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerSource {
    Base,
    /// Frames of the base layer with `ops` applied.
    Derived { base: String, ops: Vec<PixelOp> },
}

#[derive(Debug, Clone)]
pub struct LayerDef {
    pub name: String,
    pub source: LayerSource,
    pub id: u16,
    /// Graphics id of this layer's first cell.
    pub start: u16,
}

impl LayerDef {
    pub fn new(name: impl Into<String>, source: LayerSource) -> Self {
        Self {
            name: name.into(),
            source,
            id: 0,
            start: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellSource {
    /// Autocropped frames placed on the atlas.
    Image(Anim),
    /// Shares the atlas position of another cell of the same layer.
    MirrorOf { layer: String, anim: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsCell {
    pub source: CellSource,
    pub sheet: u8,
    pub src_offset: (u32, u32),
    /// Position of the cropped frame inside the sprite's frame box.
    pub dest_offset: (u32, u32),
    pub size: (u32, u32),
    pub mirror: bool,
}

#[derive(Debug, Clone)]
pub struct SpriteDef {
    pub name: String,
    pub id: u16,
    /// Frame size.
    pub size: (u32, u32),
    pub anims: BTreeMap<String, AnimDef>,
    pub layers: BTreeMap<String, LayerDef>,
    /// Explicit graphics keyed by `(layer, anim)`.
    pub graphics: BTreeMap<(String, String), Anim>,
    /// Materialized cells, explicit and derived.
    pub cells: BTreeMap<(String, String), GraphicsCell>,
}

pub fn full_name(sprite: &str, part: &str) -> String {
    format!("{}//{}", sprite, part)
}

impl SpriteDef {
    pub fn new(name: impl Into<String>, size: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            id: 0,
            size,
            anims: BTreeMap::new(),
            layers: BTreeMap::new(),
            graphics: BTreeMap::new(),
            cells: BTreeMap::new(),
        }
    }

    pub fn anim(&self, name: &str) -> Result<&AnimDef> {
        self.anims
            .get(name)
            .ok_or_else(|| DataError::resolution("animation", full_name(&self.name, name)))
    }

    pub fn layer(&self, name: &str) -> Result<&LayerDef> {
        self.layers
            .get(name)
            .ok_or_else(|| DataError::resolution("sprite layer", full_name(&self.name, name)))
    }

    /// Copy timing from base animations onto mirror animations.
    pub fn resolve_anim_timing(&mut self) -> Result<()> {
        let names: Vec<String> = self.anims.keys().cloned().collect();
        for name in names {
            let mut cur = name.clone();
            let mut depth = 0;
            let (length, rate, oneshot) = loop {
                match &self.anim(&cur)?.source {
                    AnimSource::Base {
                        length,
                        rate,
                        oneshot,
                    } => break (*length, *rate, *oneshot),
                    AnimSource::Mirror { base } => cur = base.clone(),
                }
                depth += 1;
                if depth > MAX_DERIVATION_DEPTH {
                    return Err(DataError::config(
                        full_name(&self.name, &name),
                        "mirror",
                        "forms a derivation cycle",
                    ));
                }
            };
            if let Some(a) = self.anims.get_mut(&name) {
                a.length = length;
                a.rate = rate;
                a.oneshot = oneshot;
            }
        }
        Ok(())
    }

    /// Materialize the cell for `(layer, anim)`, following derivation
    /// chains. Returns `None` when no cell can be produced.
    pub fn get_graphics(
        &mut self,
        store: &mut ImageStore,
        layer: &str,
        anim: &str,
    ) -> Result<Option<&GraphicsCell>> {
        let key = (layer.to_string(), anim.to_string());
        if self.materialize(store, layer, anim, 0)? {
            Ok(self.cells.get(&key))
        } else {
            Ok(None)
        }
    }

    fn materialize(&mut self, store: &mut ImageStore, layer: &str, anim: &str, depth: usize) -> Result<bool> {
        let key = (layer.to_string(), anim.to_string());
        if self.cells.contains_key(&key) {
            return Ok(true);
        }
        if depth > MAX_DERIVATION_DEPTH {
            return Err(DataError::config(
                full_name(&self.name, layer),
                anim,
                "graphics derivation does not terminate",
            ));
        }

        if let Some(frames) = self.graphics.get(&key).cloned() {
            let cell = self.explicit_cell(store, layer, anim, &frames)?;
            self.cells.insert(key, cell);
            return Ok(true);
        }

        if let AnimSource::Mirror { base } = self.anim(anim)?.source.clone() {
            if self.materialize(store, layer, &base, depth + 1)? {
                if let Some(b) = self.cells.get(&(layer.to_string(), base.clone())) {
                    let cell = GraphicsCell {
                        source: CellSource::MirrorOf {
                            layer: layer.to_string(),
                            anim: base,
                        },
                        sheet: b.sheet,
                        src_offset: b.src_offset,
                        dest_offset: b.dest_offset,
                        size: b.size,
                        mirror: !b.mirror,
                    };
                    self.cells.insert(key, cell);
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        if let LayerSource::Derived { base, ops } = self.layer(layer)?.source.clone() {
            if !self.materialize(store, &base, anim, depth + 1)? {
                return Ok(false);
            }
            let b = match self.cells.get(&(base.clone(), anim.to_string())) {
                Some(b) => b.clone(),
                None => return Ok(false),
            };
            let CellSource::Image(frames) = &b.source else {
                return Ok(false);
            };
            let recoloured = frames.map_frames(store, &ops);
            let (cropped, off) = recoloured.autocrop(store)?;
            let size = cropped.frame_size(store)?;
            if size.0 == 0 || size.1 == 0 {
                return Err(DataError::image(format!(
                    "graphics for {} are blank",
                    full_name(&self.name, &format!("{}/{}", layer, anim))
                )));
            }
            let cell = GraphicsCell {
                source: CellSource::Image(cropped),
                sheet: 0,
                src_offset: (0, 0),
                dest_offset: (b.dest_offset.0 + off.0 as u32, b.dest_offset.1 + off.1 as u32),
                size,
                mirror: b.mirror,
            };
            self.cells.insert(key, cell);
            return Ok(true);
        }

        Ok(false)
    }

    fn explicit_cell(&self, store: &mut ImageStore, layer: &str, anim: &str, frames: &Anim) -> Result<GraphicsCell> {
        let cell_name = full_name(&self.name, &format!("{}/{}", layer, anim));
        let def = self.anim(anim)?;
        if frames.len() != def.length as usize {
            return Err(DataError::config(
                cell_name,
                "graphics",
                format!(
                    "has {} frames but animation `{}` has length {}",
                    frames.len(),
                    anim,
                    def.length
                ),
            ));
        }
        let frame_size = frames.frame_size(store)?;
        if frame_size != self.size {
            return Err(DataError::image(format!(
                "frames of {} are {:?}, sprite size is {:?}",
                cell_name, frame_size, self.size
            )));
        }
        let (cropped, off) = frames.autocrop(store)?;
        let size = cropped.frame_size(store)?;
        if size.0 == 0 || size.1 == 0 {
            return Err(DataError::image(format!("graphics for {} are blank", cell_name)));
        }
        Ok(GraphicsCell {
            source: CellSource::Image(cropped),
            sheet: 0,
            src_offset: (0, 0),
            dest_offset: (off.0 as u32, off.1 as u32),
            size,
            mirror: false,
        })
    }

    /// Copy atlas positions onto mirror cells once their bases are placed.
    pub fn inherit_positions(&mut self) {
        let keys: Vec<_> = self.cells.keys().cloned().collect();
        for key in keys {
            let mut cur = key.clone();
            let mut found = None;
            for _ in 0..=MAX_DERIVATION_DEPTH {
                match self.cells.get(&cur).map(|c| &c.source) {
                    Some(CellSource::MirrorOf { layer, anim }) => {
                        cur = (layer.clone(), anim.clone());
                    }
                    Some(CellSource::Image(_)) => {
                        found = self.cells.get(&cur).map(|c| (c.sheet, c.src_offset));
                        break;
                    }
                    None => break,
                }
            }
            if let (Some((sheet, src_offset)), Some(cell)) = (found, self.cells.get_mut(&key)) {
                cell.sheet = sheet;
                cell.src_offset = src_offset;
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnimClientJson {
    pub local_id: u16,
    pub framerate: u8,
    pub length: u8,
    pub oneshot: bool,
}

#[derive(Debug, Serialize)]
pub struct AnimServerJson {
    pub name: String,
    pub framerate: u8,
    pub length: u8,
}

#[derive(Debug, Serialize)]
pub struct LayerClientJson {
    pub start: u16,
    pub count: u16,
}

#[derive(Debug, Serialize)]
pub struct LayerServerJson {
    pub name: String,
}

#[derive(Debug, Default, Serialize)]
pub struct GraphicsJson {
    pub src_offset: (u32, u32),
    pub dest_offset: (u32, u32),
    pub size: (u32, u32),
    pub sheet: u8,
    pub mirror: bool,
}

impl AnimDef {
    pub fn client_json(&self) -> AnimClientJson {
        AnimClientJson {
            local_id: self.local_id,
            framerate: self.rate,
            length: self.length,
            oneshot: self.oneshot,
        }
    }

    pub fn server_json(&self, sprite: &str) -> AnimServerJson {
        AnimServerJson {
            name: full_name(sprite, &self.name),
            framerate: self.rate,
            length: self.length,
        }
    }
}

impl GraphicsCell {
    pub fn json(&self) -> GraphicsJson {
        GraphicsJson {
            src_offset: self.src_offset,
            dest_offset: self.dest_offset,
            size: self.size,
            sheet: self.sheet,
            mirror: self.mirror,
        }
    }
}
