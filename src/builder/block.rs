use std::collections::BTreeMap;

use crate::consts::flags_from_shape;
use crate::error::{DataError, Result};
use crate::image::ImageRef;
use crate::types::{BlockDef, BlockLight, Side};

use super::{Builder, Instantiate, Prototype};

#[derive(Debug, Clone, Default)]
pub struct BlockProto {
    pub shape: Option<String>,
    pub flags: Option<u16>,
    pub tiles: BTreeMap<Side, ImageRef>,
    pub light: Option<BlockLight>,
}

impl Prototype for BlockProto {
    const KIND: &'static str = "block";
    type Def = BlockDef;

    fn instantiate(&self, name: &str, _cx: &mut Instantiate<'_>) -> Result<BlockDef> {
        let flags = match (self.flags, &self.shape) {
            (Some(f), _) => f,
            (None, shape) => {
                let shape = shape.as_deref().unwrap_or("solid");
                flags_from_shape(shape).ok_or_else(|| {
                    DataError::config(name, "shape", format!("unknown shape `{}`", shape))
                })?
            }
        };
        let mut def = BlockDef::new(name, flags);
        def.tiles = self.tiles.clone();
        def.light = self.light;
        Ok(def)
    }
}

impl Builder<BlockProto> {
    /// Set flags from a shape name (`empty`, `floor`, `solid`, `ramp_*`).
    pub fn shape(self, shape: &str) -> Self {
        self.modify(|p| {
            p.shape = Some(shape.to_string());
            p.flags = None;
        })
    }

    pub fn flags(self, flags: u16) -> Self {
        self.modify(|p| p.flags = Some(flags))
    }

    pub fn side(self, side: Side, img: ImageRef) -> Self {
        self.modify(|p| {
            p.tiles.insert(side, img);
        })
    }

    pub fn front(self, img: ImageRef) -> Self {
        self.side(Side::Front, img)
    }

    pub fn back(self, img: ImageRef) -> Self {
        self.side(Side::Back, img)
    }

    pub fn top(self, img: ImageRef) -> Self {
        self.side(Side::Top, img)
    }

    pub fn bottom(self, img: ImageRef) -> Self {
        self.side(Side::Bottom, img)
    }

    pub fn light(self, color: [u8; 3], radius: u16) -> Self {
        self.modify(|p| p.light = Some(BlockLight { color, radius }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests_support::with_cx;
    use crate::consts::{B_OCCUPIED, B_SUBFLOOR};

    #[test]
    fn test_default_flags_are_solid() {
        let root = Builder::<BlockProto>::root();
        root.new("stone");
        root.prefixed("cave").shape("floor").new("floor");
        let (defs, errors) = with_cx(|cx| root.instantiate_all(cx));
        assert!(errors.is_empty());
        assert_eq!(defs[0].name, "cave/floor");
        assert_eq!(defs[0].flags, B_OCCUPIED | B_SUBFLOOR);
        assert_eq!(Some(defs[1].flags), flags_from_shape("solid"));
    }

    #[test]
    fn test_unknown_shape() {
        let root = Builder::<BlockProto>::root();
        root.new("odd").shape("wobbly");
        let (_, errors) = with_cx(|cx| root.instantiate_all(cx));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("wobbly"));
    }

    #[test]
    fn test_sides_and_light() {
        let root = Builder::<BlockProto>::root();
        let (defs, _) = with_cx(|cx| {
            let img = cx.images.blank((32, 32));
            root.new("lamp").top(img).front(img).light([255, 255, 200], 96);
            root.instantiate_all(cx)
        });
        assert_eq!(defs[0].tiles.len(), 2);
        assert_eq!(defs[0].light.unwrap().radius, 96);
    }
}
