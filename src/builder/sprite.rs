use std::collections::BTreeMap;

use crate::error::{DataError, Result};
use crate::image::{Anim, PixelOp};
use crate::types::sprite::{full_name, MAX_DERIVATION_DEPTH};
use crate::types::{AnimDef, AnimSource, LayerDef, LayerSource, SpriteDef};

use super::{missing, Builder, Instantiate, Prototype};

#[derive(Debug, Clone, Default)]
pub struct SpriteProto {
    pub size: Option<(u32, u32)>,
    pub anims: BTreeMap<String, AnimSource>,
    pub layers: BTreeMap<String, LayerSource>,
    pub graphics: BTreeMap<(String, String), Anim>,
}

impl SpriteProto {
    fn check_layer_chain(&self, sprite: &str, layer: &str) -> Result<()> {
        let mut cur = layer;
        for _ in 0..=MAX_DERIVATION_DEPTH {
            match self.layers.get(cur) {
                Some(LayerSource::Base) => return Ok(()),
                Some(LayerSource::Derived { base, .. }) => cur = base,
                None => return Err(DataError::resolution("sprite layer", full_name(sprite, cur))),
            }
        }
        Err(DataError::config(
            full_name(sprite, layer),
            "base",
            "forms a derivation cycle",
        ))
    }
}

impl Prototype for SpriteProto {
    const KIND: &'static str = "sprite";
    type Def = SpriteDef;

    fn instantiate(&self, name: &str, _cx: &mut Instantiate<'_>) -> Result<SpriteDef> {
        let size = self.size.ok_or_else(|| missing(name, "size"))?;
        if self.anims.is_empty() {
            return Err(missing(name, "anims"));
        }
        if self.layers.is_empty() {
            return Err(missing(name, "layers"));
        }

        let mut def = SpriteDef::new(name, size);
        for (anim, source) in &self.anims {
            let a = match source {
                AnimSource::Base {
                    length,
                    rate,
                    oneshot,
                } => {
                    if *length == 0 {
                        return Err(DataError::config(full_name(name, anim), "length", "must be at least 1"));
                    }
                    AnimDef::base(anim.as_str(), *length, *rate, *oneshot)
                }
                AnimSource::Mirror { base } => {
                    if !self.anims.contains_key(base) {
                        return Err(DataError::resolution("animation", full_name(name, base)));
                    }
                    AnimDef::mirror(anim.as_str(), base.as_str())
                }
            };
            def.anims.insert(anim.clone(), a);
        }
        def.resolve_anim_timing()?;

        for (layer, source) in &self.layers {
            self.check_layer_chain(name, layer)?;
            def.layers
                .insert(layer.clone(), LayerDef::new(layer.as_str(), source.clone()));
        }

        for ((layer, anim), frames) in &self.graphics {
            def.layer(layer)?;
            def.anim(anim)?;
            def.graphics
                .insert((layer.clone(), anim.clone()), frames.clone());
        }
        Ok(def)
    }
}

impl Builder<SpriteProto> {
    /// Frame size shared by every cell.
    pub fn size(self, w: u32, h: u32) -> Self {
        self.modify(|p| p.size = Some((w, h)))
    }

    pub fn anim(self, name: &str, length: u8, rate: u8) -> Self {
        self.add_anim(name, AnimSource::Base {
            length,
            rate,
            oneshot: false,
        })
    }

    pub fn oneshot_anim(self, name: &str, length: u8, rate: u8) -> Self {
        self.add_anim(name, AnimSource::Base {
            length,
            rate,
            oneshot: true,
        })
    }

    /// An animation drawn as `base` flipped horizontally.
    pub fn mirror_anim(self, name: &str, base: &str) -> Self {
        self.add_anim(name, AnimSource::Mirror {
            base: base.to_string(),
        })
    }

    fn add_anim(self, name: &str, source: AnimSource) -> Self {
        self.modify(|p| {
            p.anims.insert(name.to_string(), source.clone());
        })
    }

    pub fn layer(self, name: &str) -> Self {
        self.modify(|p| {
            p.layers.insert(name.to_string(), LayerSource::Base);
        })
    }

    /// A layer whose cells are `base`'s cells with `ops` applied.
    pub fn derived_layer(self, name: &str, base: &str, ops: Vec<PixelOp>) -> Self {
        let source = LayerSource::Derived {
            base: base.to_string(),
            ops,
        };
        self.modify(|p| {
            p.layers.insert(name.to_string(), source.clone());
        })
    }

    pub fn graphics(self, layer: &str, anim: &str, frames: Anim) -> Self {
        self.modify(|p| {
            p.graphics
                .insert((layer.to_string(), anim.to_string()), frames.clone());
        })
    }
}
