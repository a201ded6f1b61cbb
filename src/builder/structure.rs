use crate::consts::TILE_SIZE;
use crate::error::{DataError, Result};
use crate::geom::{project, Mesh, V3};
use crate::image::{Anim, ImageRef, ImageStore};
use crate::types::{PartImage, Shape, StructureDef, StructureLight, StructurePart};

use super::{missing, Builder, Instantiate, Prototype};

/// A part declared explicitly; `bounds` defaults to the whole shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartProto {
    pub mesh: Mesh,
    pub image: PartImage,
    pub bounds: Option<(V3, V3)>,
}

#[derive(Debug, Clone, Default)]
pub struct StructureProto {
    pub shape: Option<Shape>,
    pub layer: Option<u8>,
    pub mesh: Option<Mesh>,
    pub image: Option<PartImage>,
    pub bounds: Option<(V3, V3)>,
    pub parts: Option<Vec<PartProto>>,
    pub light_offset: Option<[i32; 3]>,
    pub light_color: Option<[u8; 3]>,
    pub light_radius: Option<u16>,
}

fn default_bounds(shape: &Shape) -> (V3, V3) {
    (V3::default(), shape.px_size())
}

impl StructureProto {
    fn shape_or_default(&self) -> Shape {
        self.shape.clone().unwrap_or_else(|| Shape::solid(1, 1, 1))
    }

    /// A still depiction of the structure, used for derived item icons.
    pub fn get_image(&self, store: &mut ImageStore) -> Result<ImageRef> {
        if let Some(img) = self.image.as_ref().and_then(PartImage::still) {
            return Ok(img);
        }
        let Some(shape) = &self.shape else {
            return Ok(store.blank((TILE_SIZE, TILE_SIZE)));
        };
        let [sx, sy, sz] = shape.size;
        let size = (sx * TILE_SIZE, (sy + sz) * TILE_SIZE);
        let parts = self.parts.as_deref().unwrap_or_default();
        if parts.is_empty() {
            return Ok(store.blank(size));
        }
        let mut layers = Vec::with_capacity(parts.len());
        for part in parts {
            let (b_min, _) = part.bounds.unwrap_or_else(|| default_bounds(shape));
            let still = part
                .image
                .still()
                .ok_or_else(|| DataError::image("structure part animation has no frames"))?;
            layers.push(store.pad(still, size, project(b_min)));
        }
        store.stack(&layers)
    }

    fn light(&self, name: &str) -> Result<Option<StructureLight>> {
        match (self.light_offset, self.light_color, self.light_radius) {
            (None, None, None) => Ok(None),
            (Some(pos), Some(color), Some(radius)) => Ok(Some(StructureLight { pos, color, radius })),
            _ => Err(DataError::config(
                name,
                "light",
                "offset, color and radius must be set together",
            )),
        }
    }
}

impl Prototype for StructureProto {
    const KIND: &'static str = "structure";
    type Def = StructureDef;

    fn instantiate(&self, name: &str, cx: &mut Instantiate<'_>) -> Result<StructureDef> {
        let shape = self.shape_or_default();
        let layer = self.layer.unwrap_or(0);

        let parts: Vec<(Mesh, (V3, V3), PartImage)> = match (&self.mesh, &self.parts) {
            (Some(_), Some(_)) => {
                return Err(DataError::config(name, "mesh", "conflicts with `parts`"));
            }
            (None, None) => {
                return Err(DataError::config(
                    name,
                    "mesh",
                    "one of `mesh` or `parts` is required",
                ));
            }
            (Some(mesh), None) => {
                let img = self
                    .image
                    .clone()
                    .ok_or_else(|| DataError::config(name, "image", "is required when `mesh` is set"))?;
                let bounds = self.bounds.unwrap_or_else(|| default_bounds(&shape));
                vec![(mesh.clone(), bounds, img)]
            }
            (None, Some(parts)) => {
                if self.image.is_some() {
                    return Err(DataError::config(name, "image", "conflicts with `parts`"));
                }
                if parts.is_empty() {
                    return Err(missing(name, "parts"));
                }
                parts
                    .iter()
                    .map(|p| {
                        let bounds = p.bounds.unwrap_or_else(|| default_bounds(&shape));
                        (p.mesh.clone(), bounds, p.image.clone())
                    })
                    .collect()
            }
        };

        let light = self.light(name)?;
        let mut def = StructureDef::new(name, shape, layer);
        for (mesh, bounds, img) in parts {
            let part = StructurePart::new(cx.images, mesh, bounds, img).map_err(|e| match e {
                DataError::Image { message } => {
                    DataError::image(format!("structure `{}`: {}", name, message))
                }
                other => other,
            })?;
            def.parts.push(part);
        }
        def.light = light;
        Ok(def)
    }
}

impl Builder<StructureProto> {
    pub fn shape(self, shape: Shape) -> Self {
        self.modify(|p| p.shape = Some(shape.clone()))
    }

    pub fn layer(self, layer: u8) -> Self {
        self.modify(|p| p.layer = Some(layer))
    }

    pub fn mesh(self, mesh: Mesh) -> Self {
        self.modify(|p| p.mesh = Some(mesh.clone()))
    }

    pub fn image(self, img: ImageRef) -> Self {
        self.modify(|p| p.image = Some(PartImage::Still(img)))
    }

    pub fn anim(self, frames: Vec<ImageRef>, rate: u8, oneshot: bool) -> Self {
        let anim = Anim::new(frames, rate, oneshot);
        self.modify(|p| p.image = Some(PartImage::Anim(anim.clone())))
    }

    /// World-space box depicted by the image.
    pub fn bounds(self, min: V3, max: V3) -> Self {
        self.modify(|p| p.bounds = Some((min, max)))
    }

    /// Append a part. `bounds` defaults to the whole shape.
    pub fn part(self, mesh: Mesh, image: PartImage, bounds: Option<(V3, V3)>) -> Self {
        let part = PartProto { mesh, image, bounds };
        self.modify(|p| p.parts.get_or_insert_with(Vec::new).push(part.clone()))
    }

    pub fn light(self, offset: [i32; 3], color: [u8; 3], radius: u16) -> Self {
        self.modify(|p| {
            p.light_offset = Some(offset);
            p.light_color = Some(color);
            p.light_radius = Some(radius);
        })
    }

    pub fn light_offset(self, offset: [i32; 3]) -> Self {
        self.modify(|p| p.light_offset = Some(offset))
    }

    pub fn light_color(self, color: [u8; 3]) -> Self {
        self.modify(|p| p.light_color = Some(color))
    }

    pub fn light_radius(self, radius: u16) -> Self {
        self.modify(|p| p.light_radius = Some(radius))
    }
}
