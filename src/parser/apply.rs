//! Turn a parsed declaration document into builder calls.
//!
//! Everything fallible (opening images, checking shapes) happens before a
//! prototype is created, so a broken declaration adds nothing instead of a
//! half-filled prototype that would fail again at instantiate time.

use std::path::Path;

use crate::builder::Builders;
use crate::error::{DataError, Result};
use crate::geom::{meshes, Mesh, V3};
use crate::image::{Anim, ImageRef, ImageStore};
use crate::types::{PartImage, Shape};

use super::decl::{
    AnimDecl, BlockDecl, DeclDocument, FramesDecl, ItemDecl, LootEntryDecl, MeshDecl, MeshKind,
    RecipeDecl, ShapeDecl, SpriteDecl, StripDecl, StructureDecl,
};
use super::image_spec::ImageSpec;

/// Where image paths resolve and where new images are interned.
pub struct ApplyContext<'a> {
    pub images: &'a mut ImageStore,
    pub base_dir: &'a Path,
}

impl ApplyContext<'_> {
    fn image(&mut self, spec: &ImageSpec) -> Result<ImageRef> {
        spec.resolve(self.images, self.base_dir)
    }

    fn opt_image(&mut self, spec: Option<&ImageSpec>) -> Result<Option<ImageRef>> {
        spec.map(|s| self.image(s)).transpose()
    }

    fn strip(&mut self, strip: &StripDecl, default_frame: Option<(u32, u32)>) -> Result<Vec<ImageRef>> {
        let img = self.image(&strip.image)?;
        let (w, h) = self.images.size(img);
        let frame = strip.frame_size.or(default_frame).unwrap_or((h, h));
        if frame.0 == 0 || frame.1 == 0 {
            return Err(DataError::image(format!(
                "{}: zero-sized strip frames",
                strip.image.path().display()
            )));
        }
        let count = strip.count.unwrap_or((w / frame.0) as usize);
        Ok(Anim::from_strip(self.images, img, frame, count, 0, false).frames)
    }

    fn frames(
        &mut self,
        name: &str,
        frames: &[ImageSpec],
        strip: Option<&StripDecl>,
        default_frame: Option<(u32, u32)>,
    ) -> Result<Vec<ImageRef>> {
        let out = match strip {
            Some(s) => self.strip(s, default_frame)?,
            None => frames.iter().map(|f| self.image(f)).collect::<Result<_>>()?,
        };
        if out.is_empty() {
            return Err(DataError::config(name, "frames", "has no frames"));
        }
        Ok(out)
    }

    fn anim(&mut self, name: &str, decl: &FramesDecl) -> Result<Anim> {
        let frames = self.frames(name, &decl.frames, decl.strip.as_ref(), None)?;
        Ok(Anim::new(frames, decl.rate, decl.oneshot))
    }
}

/// Apply every section of `doc`. Returns one error per rejected declaration.
pub fn apply_document(doc: &DeclDocument, builders: &Builders, cx: &mut ApplyContext<'_>) -> Vec<DataError> {
    let mut errors = Vec::new();
    let mut record = |r: Result<()>| {
        if let Err(e) = r {
            errors.push(e);
        }
    };

    for (name, decl) in &doc.structures {
        record(apply_structure(builders, cx, name, decl));
    }
    for (name, decl) in &doc.blocks {
        record(apply_block(builders, cx, name, decl));
    }
    for (name, decl) in &doc.items {
        record(apply_item(builders, cx, name, decl));
    }
    for (name, decl) in &doc.recipes {
        apply_recipe(builders, name, decl);
    }
    for (name, decl) in &doc.sprites {
        record(apply_sprite(builders, cx, name, decl));
    }
    for (name, entries) in &doc.loot_tables {
        record(apply_loot_table(builders, name, entries));
    }
    for (name, func) in &doc.extras {
        builders.extras.new(name).func(func.clone());
    }
    errors
}

fn apply_block(builders: &Builders, cx: &mut ApplyContext<'_>, name: &str, decl: &BlockDecl) -> Result<()> {
    let front = cx.opt_image(decl.front.as_ref())?;
    let back = cx.opt_image(decl.back.as_ref())?;
    let top = cx.opt_image(decl.top.as_ref())?;
    let bottom = cx.opt_image(decl.bottom.as_ref())?;

    let mut b = builders.blocks.new(name);
    if let Some(shape) = &decl.shape {
        b = b.shape(shape);
    }
    if let Some(flags) = decl.flags {
        b = b.flags(flags);
    }
    if let Some(img) = front {
        b = b.front(img);
    }
    if let Some(img) = back {
        b = b.back(img);
    }
    if let Some(img) = top {
        b = b.top(img);
    }
    if let Some(img) = bottom {
        b = b.bottom(img);
    }
    if let Some(light) = &decl.light {
        b.light(light.color, light.radius);
    }
    Ok(())
}

fn apply_item(builders: &Builders, cx: &mut ApplyContext<'_>, name: &str, decl: &ItemDecl) -> Result<()> {
    let icon = cx.opt_image(decl.icon.as_ref())?;

    let mut b = match &decl.from_structure {
        Some(s) => builders
            .items
            .from_structure(&builders.structures.get(s), Some(name), decl.extract_offset),
        None => builders.items.new(name),
    };
    if let Some(ui_name) = &decl.display_name {
        b = b.display_name(ui_name);
    }
    if let Some(desc) = &decl.desc {
        b = b.desc(desc);
    }
    if let Some(img) = icon {
        b.icon(img);
    }
    Ok(())
}

fn apply_recipe(builders: &Builders, name: &str, decl: &RecipeDecl) {
    let mut b = if decl.from_item {
        builders.recipes.from_item(&builders.items.get(name))
    } else {
        builders.recipes.new(name)
    };
    if let Some(ui_name) = &decl.display_name {
        b = b.display_name(ui_name);
    }
    for (item, count) in &decl.inputs {
        b = b.input(item, *count);
    }
    for (item, count) in &decl.outputs {
        b = b.output(item, *count);
    }
    if let Some(station) = &decl.station {
        b = b.station(station);
    }
    if let Some(ability) = &decl.ability {
        b.ability(ability);
    }
}

fn shape(name: &str, size: [u32; 3], decl: &ShapeDecl) -> Result<Shape> {
    let [x, y, z] = size;
    match decl {
        ShapeDecl::Kind(k) => match k.as_str() {
            "empty" => Ok(Shape::empty(x, y, z)),
            "floor" => Ok(Shape::floor(x, y, z)),
            "solid" => Ok(Shape::solid(x, y, z)),
            other => Err(DataError::config(
                name,
                "shape",
                format!("unknown shape kind `{}`", other),
            )),
        },
        ShapeDecl::Cells(cells) => Shape::from_names(name, size, cells),
    }
}

fn mesh(size: [u32; 3], decl: &MeshDecl) -> Mesh {
    let [x, y, z] = size.map(|v| v as i32);
    match decl {
        MeshDecl::Named(MeshKind::Top) => meshes::top(x, y, z),
        MeshDecl::Named(MeshKind::Front) => meshes::front(x, y, z),
        MeshDecl::Named(MeshKind::Bottom) => meshes::bottom(x, y),
        MeshDecl::Named(MeshKind::Solid) => meshes::solid(x, y, z),
        MeshDecl::Verts(vs) => {
            let verts: Vec<V3> = vs.iter().map(|[a, b, c]| V3::new(*a, *b, *c)).collect();
            Mesh::from_verts(&verts)
        }
    }
}

fn bounds(b: &[[i32; 3]; 2]) -> (V3, V3) {
    let [lo, hi] = b;
    (V3::new(lo[0], lo[1], lo[2]), V3::new(hi[0], hi[1], hi[2]))
}

fn apply_structure(
    builders: &Builders,
    cx: &mut ApplyContext<'_>,
    name: &str,
    decl: &StructureDecl,
) -> Result<()> {
    if decl.image.is_some() && decl.anim.is_some() {
        return Err(DataError::config(name, "image", "conflicts with `anim`"));
    }
    if let Some(m) = &decl.mesh {
        check_verts(name, m)?;
    }
    let size = decl.size.unwrap_or([1, 1, 1]);
    let shape = match (&decl.shape, decl.size) {
        (Some(s), _) => Some(shape(name, size, s)?),
        (None, Some(_)) => Some(Shape::solid(size[0], size[1], size[2])),
        (None, None) => None,
    };
    let image = cx.opt_image(decl.image.as_ref())?;
    let anim = decl.anim.as_ref().map(|a| cx.anim(name, a)).transpose()?;
    let mut parts = Vec::with_capacity(decl.parts.len());
    for (i, p) in decl.parts.iter().enumerate() {
        let part_name = format!("{}[{}]", name, i);
        check_verts(&part_name, &p.mesh)?;
        let img = match (&p.image, &p.anim) {
            (Some(spec), None) => PartImage::Still(cx.image(spec)?),
            (None, Some(a)) => PartImage::Anim(cx.anim(&part_name, a)?),
            _ => {
                return Err(DataError::config(
                    part_name,
                    "image",
                    "needs exactly one of `image` and `anim`",
                ))
            }
        };
        parts.push((mesh(size, &p.mesh), img, p.bounds.as_ref().map(bounds)));
    }

    let mut b = builders.structures.new(name);
    if let Some(shape) = shape {
        b = b.shape(shape);
    }
    if let Some(layer) = decl.layer {
        b = b.layer(layer);
    }
    if let Some(m) = &decl.mesh {
        b = b.mesh(mesh(size, m));
    }
    if let Some(img) = image {
        b = b.image(img);
    }
    if let Some(a) = anim {
        b = b.anim(a.frames, a.rate, a.oneshot);
    }
    if let Some(bs) = &decl.bounds {
        let (lo, hi) = bounds(bs);
        b = b.bounds(lo, hi);
    }
    for (m, img, bs) in parts {
        b = b.part(m, img, bs);
    }
    if let Some(light) = &decl.light {
        b.light(light.offset.unwrap_or([0, 0, 0]), light.color, light.radius);
    }
    Ok(())
}

fn check_verts(name: &str, decl: &MeshDecl) -> Result<()> {
    match decl {
        MeshDecl::Verts(vs) if vs.len() % 3 != 0 => Err(DataError::config(
            name,
            "mesh",
            format!("has {} vertices, not a whole number of triangles", vs.len()),
        )),
        _ => Ok(()),
    }
}

fn apply_sprite(builders: &Builders, cx: &mut ApplyContext<'_>, name: &str, decl: &SpriteDecl) -> Result<()> {
    let mut graphics = Vec::with_capacity(decl.graphics.len());
    for g in &decl.graphics {
        let cell = format!("{}//{}/{}", name, g.layer, g.anim);
        let frames = cx.frames(&cell, &g.frames, g.strip.as_ref(), decl.size)?;
        graphics.push((g.layer.as_str(), g.anim.as_str(), Anim::new(frames, 0, false)));
    }

    let mut b = builders.sprites.new(name);
    if let Some((w, h)) = decl.size {
        b = b.size(w, h);
    }
    for (anim, a) in &decl.anims {
        b = match a {
            AnimDecl::Mirror { mirror } => b.mirror_anim(anim, mirror),
            AnimDecl::Base {
                length,
                rate,
                oneshot: false,
            } => b.anim(anim, *length, *rate),
            AnimDecl::Base {
                length,
                rate,
                oneshot: true,
            } => b.oneshot_anim(anim, *length, *rate),
        };
    }
    for (layer, l) in &decl.layers {
        b = match l.as_ref().and_then(|l| l.base.as_ref().map(|base| (base, &l.ops))) {
            Some((base, ops)) => b.derived_layer(layer, base, ops.clone()),
            None => b.layer(layer),
        };
    }
    for (layer, anim, frames) in graphics {
        b = b.graphics(layer, anim, frames);
    }
    Ok(())
}

fn apply_loot_table(builders: &Builders, name: &str, entries: &[LootEntryDecl]) -> Result<()> {
    for (i, e) in entries.iter().enumerate() {
        let set = [&e.item, &e.structure, &e.table].iter().filter(|x| x.is_some()).count();
        if set != 1 {
            return Err(DataError::config(
                format!("{}[{}]", name, i),
                "entry",
                "needs exactly one of `item`, `structure` and `table`",
            ));
        }
    }

    let mut b = builders.loot_tables.new(name);
    for e in entries {
        b = match (&e.item, &e.structure, &e.table) {
            (Some(item), _, _) => b.item(item, e.weight, e.min, e.max),
            (_, Some(s), _) => b.structure(s, e.weight),
            (_, _, Some(t)) => b.table(t, e.weight),
            _ => b,
        };
    }
    Ok(())
}
