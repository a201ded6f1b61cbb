//! Axis-aligned quads and box faces, sized in tiles.

use crate::consts::TILE_SIZE;

use super::{Mesh, V3};

const T: i32 = TILE_SIZE as i32;

/// Two triangles `abc`, `acd`.
pub fn quad(a: V3, b: V3, c: V3, d: V3) -> [V3; 6] {
    [a, b, c, a, c, d]
}

/// Quad in the plane `y`, counter-clockwise when `x0 < x1` and `z0 < z1`.
pub fn quad_y(y: i32, x0: i32, x1: i32, z0: i32, z1: i32) -> [V3; 6] {
    quad(
        V3::new(x0, y, z0),
        V3::new(x1, y, z0),
        V3::new(x1, y, z1),
        V3::new(x0, y, z1),
    )
}

/// Quad in the plane `z`, counter-clockwise when `x0 < x1` and `y0 < y1`.
pub fn quad_z(z: i32, x0: i32, x1: i32, y0: i32, y1: i32) -> [V3; 6] {
    quad(
        V3::new(x0, y0, z),
        V3::new(x0, y1, z),
        V3::new(x1, y1, z),
        V3::new(x1, y0, z),
    )
}

/// Top face of an `x * y * z` tile box.
pub fn top(x: i32, y: i32, z: i32) -> Mesh {
    Mesh::from_verts(&quad_z(z * T, 0, x * T, 0, y * T))
}

/// Front (south) face of an `x * y * z` tile box.
pub fn front(x: i32, y: i32, z: i32) -> Mesh {
    Mesh::from_verts(&quad_y(y * T, 0, x * T, 0, z * T))
}

/// Floor-level face of an `x * y` footprint.
pub fn bottom(x: i32, y: i32) -> Mesh {
    Mesh::from_verts(&quad_z(0, 0, x * T, 0, y * T))
}

/// Visible faces of a solid box: front, then top.
pub fn solid(x: i32, y: i32, z: i32) -> Mesh {
    let mut m = front(x, y, z);
    m.extend(&top(x, y, z));
    m
}
