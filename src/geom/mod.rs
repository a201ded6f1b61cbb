//! Triangle meshes for structure parts.
//!
//! World units are pixels. The view is axonometric: a point `(x, y, z)`
//! lands on screen at `(x, y - z)`.

pub mod meshes;

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct V3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl V3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<(i32, i32, i32)> for V3 {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        V3::new(x, y, z)
    }
}

impl Add for V3 {
    type Output = V3;
    fn add(self, o: V3) -> V3 {
        V3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for V3 {
    type Output = V3;
    fn sub(self, o: V3) -> V3 {
        V3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<i32> for V3 {
    type Output = V3;
    fn mul(self, c: i32) -> V3 {
        V3::new(self.x * c, self.y * c, self.z * c)
    }
}

/// Screen position of a world point.
pub fn project(p: V3) -> (i32, i32) {
    (p.x, p.y - p.z)
}

/// A list of triangles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Mesh {
    tris: Vec<[V3; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a flat vertex list; every three vertices form a triangle.
    /// A trailing partial triangle is dropped.
    pub fn from_verts(verts: &[V3]) -> Self {
        let tris = verts
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self { tris }
    }

    pub fn add_tri(&mut self, a: V3, b: V3, c: V3) {
        self.tris.push([a, b, c]);
    }

    pub fn extend(&mut self, other: &Mesh) {
        self.tris.extend_from_slice(&other.tris);
    }

    pub fn tris(&self) -> &[[V3; 3]] {
        &self.tris
    }

    pub fn verts(&self) -> impl Iterator<Item = V3> + '_ {
        self.tris.iter().flat_map(|t| t.iter().copied())
    }

    pub fn vert_count(&self) -> usize {
        self.tris.len() * 3
    }

    pub fn is_empty(&self) -> bool {
        self.tris.is_empty()
    }

    /// Min and max of the projected vertices, or `None` for an empty mesh.
    pub fn bounds_2d(&self, projector: impl Fn(V3) -> (i32, i32)) -> Option<((i32, i32), (i32, i32))> {
        let mut it = self.verts().map(projector);
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), (x, y)| {
            ((lo.0.min(x), lo.1.min(y)), (hi.0.max(x), hi.1.max(y)))
        }))
    }

    /// Keep only the parts of triangles whose projection falls inside
    /// `[x0, x1] x [v0, v1]`, cutting at the rectangle edges.
    pub fn clip_xv(&mut self, x0: i32, v0: i32, x1: i32, v1: i32) {
        let mut out = Vec::with_capacity(self.tris.len());
        for tri in &self.tris {
            let inside = tri.iter().all(|p| {
                let (x, v) = project(*p);
                x >= x0 && x <= x1 && v >= v0 && v <= v1
            });
            if inside {
                out.push(*tri);
                continue;
            }

            let mut poly: Vec<[f64; 3]> = tri
                .iter()
                .map(|p| [p.x as f64, p.y as f64, p.z as f64])
                .collect();
            let planes: [(fn(&[f64; 3]) -> f64, f64, bool); 4] = [
                (px, x0 as f64, true),
                (px, x1 as f64, false),
                (pv, v0 as f64, true),
                (pv, v1 as f64, false),
            ];
            for (f, c, keep_above) in planes {
                poly = clip_polygon(&poly, f, c, keep_above);
                if poly.len() < 3 {
                    break;
                }
            }
            if poly.len() < 3 {
                continue;
            }

            let rounded: Vec<V3> = poly
                .iter()
                .map(|p| V3::new(p[0].round() as i32, p[1].round() as i32, p[2].round() as i32))
                .collect();
            for i in 1..rounded.len() - 1 {
                let t = [rounded[0], rounded[i], rounded[i + 1]];
                if projected_area2(&t) != 0 {
                    out.push(t);
                }
            }
        }
        self.tris = out;
    }
}

fn px(p: &[f64; 3]) -> f64 {
    p[0]
}

fn pv(p: &[f64; 3]) -> f64 {
    p[1] - p[2]
}

/// One Sutherland-Hodgman pass against the half-plane `f(p) >= c`
/// (or `<= c` when `keep_above` is false).
fn clip_polygon(poly: &[[f64; 3]], f: fn(&[f64; 3]) -> f64, c: f64, keep_above: bool) -> Vec<[f64; 3]> {
    let inside = |p: &[f64; 3]| if keep_above { f(p) >= c } else { f(p) <= c };
    let mut out = Vec::with_capacity(poly.len() + 2);
    for i in 0..poly.len() {
        let cur = &poly[i];
        let prev = &poly[(i + poly.len() - 1) % poly.len()];
        let (ci, pi) = (inside(cur), inside(prev));
        if ci != pi {
            let t = (c - f(prev)) / (f(cur) - f(prev));
            out.push([
                prev[0] + (cur[0] - prev[0]) * t,
                prev[1] + (cur[1] - prev[1]) * t,
                prev[2] + (cur[2] - prev[2]) * t,
            ]);
        }
        if ci {
            out.push(*cur);
        }
    }
    out
}

/// Twice the signed projected area.
fn projected_area2(t: &[V3; 3]) -> i64 {
    let (ax, ay) = project(t[0]);
    let (bx, by) = project(t[1]);
    let (cx, cy) = project(t[2]);
    (bx - ax) as i64 * (cy - ay) as i64 - (cx - ax) as i64 * (by - ay) as i64
}

#[cfg(test)]
mod tests {
    use super::meshes;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_project() {
        assert_eq!(project(V3::new(3, 10, 4)), (3, 6));
    }

    #[test]
    fn test_bounds_2d_of_solid_block() {
        let m = meshes::solid(1, 1, 1);
        assert_eq!(m.bounds_2d(project), Some(((0, -32), (32, 32))));
        assert_eq!(Mesh::new().bounds_2d(project), None);
    }

    #[test]
    fn test_clip_keeps_inside_mesh_unchanged() {
        let mut m = meshes::front(1, 1, 1);
        let before = m.clone();
        m.clip_xv(0, 0, 32, 32);
        assert_eq!(m, before);
    }

    #[test]
    fn test_clip_drops_outside_triangles() {
        let mut m = meshes::solid(1, 1, 1);
        // Front face projects to v in [0, 32], top to [-32, 0].
        m.clip_xv(0, 1, 32, 32);
        assert!(!m.is_empty());
        for p in m.verts() {
            let (_, v) = project(p);
            assert!(v >= 1);
        }
    }

    #[test]
    fn test_clip_cuts_at_edges() {
        let mut m = meshes::front(2, 1, 1);
        m.clip_xv(0, 0, 40, 32);
        let (lo, hi) = m.bounds_2d(project).unwrap();
        assert_eq!(lo, (0, 0));
        assert_eq!(hi, (40, 32));
    }

    proptest! {
        #[test]
        fn prop_clipped_verts_stay_in_rect(
            x0 in -40i32..40, v0 in -40i32..40, w in 0i32..80, h in 0i32..80,
        ) {
            let mut m = meshes::solid(2, 1, 2);
            m.clip_xv(x0, v0, x0 + w, v0 + h);
            for p in m.verts() {
                let (x, v) = project(p);
                prop_assert!(x >= x0 - 1 && x <= x0 + w + 1);
                prop_assert!(v >= v0 - 1 && v <= v0 + h + 1);
            }
        }
    }
}
