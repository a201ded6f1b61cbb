//! Closed set of pixel operations applied by `Modify` and `Fold` nodes.
//!
//! Every operation carries its parameters so it can be hashed into the
//! owning expression's descriptor. Bump [`PIXEL_OPS_VERSION`] whenever the
//! output of an existing operation changes; that invalidates every cached
//! image derived through one.

use image::{Rgba, RgbaImage};
use palette::{Hsl, IntoColor, Srgb};
use serde::Deserialize;

use crate::types::Colour;

use super::descriptor::DescWriter;

pub const PIXEL_OPS_VERSION: u32 = 1;

/// A single-input pixel transformation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PixelOp {
    /// Fill `[x, y, w, h]` with a solid colour.
    FillRect { rect: [i32; 4], colour: Colour },
    /// Replace exact colour matches.
    Recolor { map: Vec<(Colour, Colour)> },
    /// Multiply every channel by `colour / 255`.
    Multiply { colour: Colour },
    /// Shift HSL lightness by a percentage of the remaining range.
    Lighten { percent: i16 },
    /// Shift HSL saturation by a percentage of the remaining range.
    Saturate { percent: i16 },
    /// Clamp alpha to at most `max`, keeping fully transparent pixels.
    SetDepth { max: u8 },
    /// Flip horizontally.
    MirrorX,
}

/// A multi-input combination; the first input is the base image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FoldOp {
    /// Paste each layer over the base using the layer's own alpha.
    PasteAlpha,
    /// Per-pixel z-buffer: the base has depth `depths[0]`, layer `i` has
    /// `depths[i + 1]`. Opaque pixels draw when their depth is not below the
    /// current one.
    DepthStack { depths: Vec<u8> },
    /// Copy each layer's pixels verbatim at the matching offset.
    Blit { offsets: Vec<(i32, i32)> },
}

impl PixelOp {
    pub(crate) fn describe(&self, w: &mut DescWriter) {
        w.u32(PIXEL_OPS_VERSION);
        match self {
            PixelOp::FillRect { rect, colour } => {
                w.u8(0);
                for v in rect {
                    w.i32(*v);
                }
                w.bytes(&colour.to_rgba());
            }
            PixelOp::Recolor { map } => {
                w.u8(1).u32(map.len() as u32);
                for (from, to) in map {
                    w.bytes(&from.to_rgba()).bytes(&to.to_rgba());
                }
            }
            PixelOp::Multiply { colour } => {
                w.u8(2).bytes(&colour.to_rgba());
            }
            PixelOp::Lighten { percent } => {
                w.u8(3).i32(*percent as i32);
            }
            PixelOp::Saturate { percent } => {
                w.u8(4).i32(*percent as i32);
            }
            PixelOp::SetDepth { max } => {
                w.u8(5).u8(*max);
            }
            PixelOp::MirrorX => {
                w.u8(6);
            }
        }
    }

    pub fn apply(&self, img: &mut RgbaImage) {
        match self {
            PixelOp::FillRect { rect, colour } => {
                let [x, y, w, h] = *rect;
                let (iw, ih) = (img.width() as i32, img.height() as i32);
                for py in y.max(0)..(y + h).min(ih) {
                    for px in x.max(0)..(x + w).min(iw) {
                        img.put_pixel(px as u32, py as u32, colour.to_pixel());
                    }
                }
            }
            PixelOp::Recolor { map } => {
                for p in img.pixels_mut() {
                    let c = Colour::from_pixel(p);
                    if let Some((_, to)) = map.iter().find(|(from, _)| *from == c) {
                        *p = to.to_pixel();
                    }
                }
            }
            PixelOp::Multiply { colour } => {
                let m = colour.to_rgba();
                for p in img.pixels_mut() {
                    for i in 0..4 {
                        p[i] = ((p[i] as u32 * m[i] as u32 + 127) / 255) as u8;
                    }
                }
            }
            PixelOp::Lighten { percent } => {
                for p in img.pixels_mut() {
                    *p = adjust_hsl(p, *percent, |hsl, d| {
                        hsl.lightness = shift(hsl.lightness, d);
                    });
                }
            }
            PixelOp::Saturate { percent } => {
                for p in img.pixels_mut() {
                    *p = adjust_hsl(p, *percent, |hsl, d| {
                        hsl.saturation = shift(hsl.saturation, d);
                    });
                }
            }
            PixelOp::SetDepth { max } => {
                for p in img.pixels_mut() {
                    if p[3] > *max {
                        p[3] = *max;
                    }
                }
            }
            PixelOp::MirrorX => {
                image::imageops::flip_horizontal_in_place(img);
            }
        }
    }
}

impl FoldOp {
    pub(crate) fn describe(&self, w: &mut DescWriter) {
        w.u32(PIXEL_OPS_VERSION);
        match self {
            FoldOp::PasteAlpha => {
                w.u8(0);
            }
            FoldOp::DepthStack { depths } => {
                w.u8(1).bytes(depths);
            }
            FoldOp::Blit { offsets } => {
                w.u8(2).u32(offsets.len() as u32);
                for (x, y) in offsets {
                    w.i32(*x).i32(*y);
                }
            }
        }
    }

    pub fn apply(&self, base: &mut RgbaImage, layers: &[&RgbaImage]) {
        match self {
            FoldOp::PasteAlpha => {
                for layer in layers {
                    paste_alpha(base, layer, 0, 0);
                }
            }
            FoldOp::DepthStack { depths } => {
                let base_depth = depths.first().copied().unwrap_or(0);
                let mut zbuf: Vec<u8> = base
                    .pixels()
                    .map(|p| if p[3] > 0 { base_depth } else { 0 })
                    .collect();
                let w = base.width();
                for (i, layer) in layers.iter().enumerate() {
                    let d = depths.get(i + 1).copied().unwrap_or(base_depth);
                    for (x, y, p) in layer.enumerate_pixels() {
                        if x >= base.width() || y >= base.height() || p[3] == 0 {
                            continue;
                        }
                        let idx = (y * w + x) as usize;
                        if base.get_pixel(x, y)[3] == 0 || d >= zbuf[idx] {
                            base.put_pixel(x, y, *p);
                            zbuf[idx] = d;
                        }
                    }
                }
            }
            FoldOp::Blit { offsets } => {
                for (i, layer) in layers.iter().enumerate() {
                    let (ox, oy) = offsets.get(i).copied().unwrap_or((0, 0));
                    blit(base, layer, ox, oy);
                }
            }
        }
    }
}

/// Composite `src` over `dest` at `(x, y)` with source-over alpha blending.
pub fn paste_alpha(dest: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    for (sx, sy, p) in src.enumerate_pixels() {
        let (dx, dy) = (x + sx as i32, y + sy as i32);
        if dx < 0 || dy < 0 || dx >= dest.width() as i32 || dy >= dest.height() as i32 {
            continue;
        }
        let a = p[3] as u32;
        if a == 0 {
            continue;
        }
        let d = dest.get_pixel_mut(dx as u32, dy as u32);
        if a == 255 {
            *d = *p;
            continue;
        }
        let da = d[3] as u32;
        let out_a = a + da * (255 - a) / 255;
        for i in 0..3 {
            let c = (p[i] as u32 * a + d[i] as u32 * da * (255 - a) / 255) / out_a.max(1);
            d[i] = c.min(255) as u8;
        }
        d[3] = out_a.min(255) as u8;
    }
}

/// Copy `src` into `dest` at `(x, y)`, replacing pixels including alpha.
pub fn blit(dest: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    for (sx, sy, p) in src.enumerate_pixels() {
        let (dx, dy) = (x + sx as i32, y + sy as i32);
        if dx < 0 || dy < 0 || dx >= dest.width() as i32 || dy >= dest.height() as i32 {
            continue;
        }
        dest.put_pixel(dx as u32, dy as u32, *p);
    }
}

fn shift(v: f32, delta: f32) -> f32 {
    let out = if delta > 0.0 {
        v + (1.0 - v) * delta
    } else {
        v + v * delta
    };
    out.clamp(0.0, 1.0)
}

fn adjust_hsl(p: &Rgba<u8>, percent: i16, f: impl Fn(&mut Hsl, f32)) -> Rgba<u8> {
    if p[3] == 0 {
        return *p;
    }
    let rgb: Srgb<f32> = Srgb::new(p[0] as f32 / 255.0, p[1] as f32 / 255.0, p[2] as f32 / 255.0);
    let mut hsl: Hsl = rgb.into_color();
    f(&mut hsl, percent as f32 / 100.0);
    let out: Srgb<f32> = hsl.into_color();
    Rgba([
        (out.red * 255.0).round().clamp(0.0, 255.0) as u8,
        (out.green * 255.0).round().clamp(0.0, 255.0) as u8,
        (out.blue * 255.0).round().clamp(0.0, 255.0) as u8,
        p[3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, c: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(c))
    }

    #[test]
    fn test_fill_rect_clips_to_image() {
        let mut img = solid(4, 4, [0, 0, 0, 0]);
        PixelOp::FillRect {
            rect: [2, 2, 10, 10],
            colour: Colour::rgb(255, 0, 0),
        }
        .apply(&mut img);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(3, 3).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_recolor_exact_match_only() {
        let mut img = solid(2, 1, [10, 10, 10, 255]);
        img.put_pixel(1, 0, Rgba([11, 10, 10, 255]));
        PixelOp::Recolor {
            map: vec![(Colour::rgb(10, 10, 10), Colour::rgb(200, 0, 0))],
        }
        .apply(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, [200, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [11, 10, 10, 255]);
    }

    #[test]
    fn test_multiply() {
        let mut img = solid(1, 1, [200, 100, 50, 255]);
        PixelOp::Multiply {
            colour: Colour::new(128, 255, 0, 255),
        }
        .apply(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, [100, 100, 0, 255]);
    }

    #[test]
    fn test_lighten_black_to_grey() {
        let mut img = solid(1, 1, [0, 0, 0, 255]);
        PixelOp::Lighten { percent: 50 }.apply(&mut img);
        let p = img.get_pixel(0, 0);
        assert!(p[0] > 120 && p[0] < 135);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn test_desaturate_to_grey() {
        let mut img = solid(1, 1, [255, 0, 0, 255]);
        PixelOp::Saturate { percent: -100 }.apply(&mut img);
        let p = img.get_pixel(0, 0);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn test_mirror_x() {
        let mut img = solid(2, 1, [0, 0, 0, 0]);
        img.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        PixelOp::MirrorX.apply(&mut img);
        assert_eq!(img.get_pixel(1, 0).0, [1, 2, 3, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_paste_alpha_keeps_base_under_transparent() {
        let mut base = solid(2, 1, [9, 9, 9, 255]);
        let mut top = solid(2, 1, [0, 0, 0, 0]);
        top.put_pixel(1, 0, Rgba([200, 0, 0, 255]));
        FoldOp::PasteAlpha.apply(&mut base, &[&top]);
        assert_eq!(base.get_pixel(0, 0).0, [9, 9, 9, 255]);
        assert_eq!(base.get_pixel(1, 0).0, [200, 0, 0, 255]);
    }

    #[test]
    fn test_depth_stack_prefers_nearer() {
        let mut base = solid(1, 1, [1, 1, 1, 255]);
        let far = solid(1, 1, [2, 2, 2, 255]);
        let near = solid(1, 1, [3, 3, 3, 255]);
        FoldOp::DepthStack {
            depths: vec![5, 1, 9],
        }
        .apply(&mut base, &[&far, &near]);
        assert_eq!(base.get_pixel(0, 0).0, [3, 3, 3, 255]);
    }

    #[test]
    fn test_blit_overwrites_alpha() {
        let mut base = solid(2, 2, [9, 9, 9, 255]);
        let hole = solid(1, 1, [0, 0, 0, 0]);
        FoldOp::Blit {
            offsets: vec![(1, 1)],
        }
        .apply(&mut base, &[&hole]);
        assert_eq!(base.get_pixel(1, 1).0, [0, 0, 0, 0]);
        assert_eq!(base.get_pixel(0, 0).0, [9, 9, 9, 255]);
    }

    #[test]
    fn test_ops_deserialize_from_yaml() {
        let ops: Vec<PixelOp> = serde_yaml::from_str(
            "- op: multiply\n  colour: '#808080'\n- op: mirror_x\n- op: lighten\n  percent: 20\n",
        )
        .unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1], PixelOp::MirrorX);
    }
}
