//! Vector math and the affine transform engine
//!
//! The camera model is orthographic-with-zoom: a 3x4 affine matrix
//! (rotation/scale block plus translation column) with no projective row.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 3D Vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn len(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Normalize to unit length. A zero vector stays zero (degenerate
    /// normals are expected input, not an error).
    pub fn normalize(self) -> Vec3 {
        let l = self.len();
        if l == 0.0 {
            return Vec3::ZERO;
        }
        Vec3 {
            x: self.x / l,
            y: self.y / l,
            z: self.z / l,
        }
    }

    pub fn scale(self, s: f32) -> Vec3 {
        Vec3 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 {
        self.scale(s)
    }
}

/// 2D Vector (for texture coordinates)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Affine 3x4 transformation matrix.
///
/// Row-major: `m[r][0..3]` is the rotation/scale/shear block, `m[r][3]` the
/// translation column. There is no projective row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Mat34 {
    pub m: [[f32; 4]; 3],
}

impl Default for Mat34 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat34 {
    pub fn identity() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    /// Append a translation.
    pub fn translate(&mut self, tx: f32, ty: f32, tz: f32) {
        self.m[0][3] += tx;
        self.m[1][3] += ty;
        self.m[2][3] += tz;
    }

    /// Append per-axis scale factors.
    pub fn scale(&mut self, sx: f32, sy: f32, sz: f32) {
        for c in 0..4 {
            self.m[0][c] *= sx;
            self.m[1][c] *= sy;
            self.m[2][c] *= sz;
        }
    }

    /// Append a rotation about the x-axis, angle in degrees.
    pub fn rotate_about_x(&mut self, degrees: f32) {
        if degrees == 0.0 {
            return;
        }
        let (sin_a, cos_a) = degrees.to_radians().sin_cos();
        for c in 0..4 {
            let r1 = cos_a * self.m[1][c] + sin_a * self.m[2][c];
            let r2 = cos_a * self.m[2][c] - sin_a * self.m[1][c];
            self.m[1][c] = r1;
            self.m[2][c] = r2;
        }
    }

    /// Append a rotation about the y-axis, angle in degrees.
    pub fn rotate_about_y(&mut self, degrees: f32) {
        if degrees == 0.0 {
            return;
        }
        let (sin_a, cos_a) = degrees.to_radians().sin_cos();
        for c in 0..4 {
            let r0 = cos_a * self.m[0][c] + sin_a * self.m[2][c];
            let r2 = cos_a * self.m[2][c] - sin_a * self.m[0][c];
            self.m[0][c] = r0;
            self.m[2][c] = r2;
        }
    }

    /// Append a rotation about the z-axis, angle in degrees.
    pub fn rotate_about_z(&mut self, degrees: f32) {
        if degrees == 0.0 {
            return;
        }
        let (sin_a, cos_a) = degrees.to_radians().sin_cos();
        for c in 0..4 {
            let r1 = cos_a * self.m[1][c] + sin_a * self.m[0][c];
            let r0 = cos_a * self.m[0][c] - sin_a * self.m[1][c];
            self.m[1][c] = r1;
            self.m[0][c] = r0;
        }
    }

    /// Pre-multiply by `other`: self becomes `other * self`.
    pub fn multiply(&mut self, other: &Mat34) {
        let a = &other.m;
        let b = &self.m;
        let mut out = [[0.0f32; 4]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for c in 0..4 {
                row[c] = a[r][0] * b[0][c] + a[r][1] * b[1][c] + a[r][2] * b[2][c];
            }
            row[3] += a[r][3];
        }
        self.m = out;
    }

    /// Transform a single point.
    pub fn transform(&self, v: Vec3) -> Vec3 {
        Vec3 {
            x: self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z + self.m[0][3],
            y: self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z + self.m[1][3],
            z: self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z + self.m[2][3],
        }
    }

    /// Batch-transform vectors into a caller-provided buffer.
    /// Only the first `vecs.len()` entries of `out` are written.
    pub fn transform_vectors(&self, vecs: &[Vec3], out: &mut [Vec3]) {
        for (src, dst) in vecs.iter().zip(out.iter_mut()) {
            *dst = self.transform(*src);
        }
    }

    /// Batch-transform vectors but keep only the resulting z component.
    /// Used for facing/visibility tests where x and y are never needed.
    pub fn transform_vector_zs(&self, vecs: &[Vec3], out: &mut [f32]) {
        let [m20, m21, m22, m23] = self.m[2];
        for (src, dst) in vecs.iter().zip(out.iter_mut()) {
            *dst = m20 * src.x + m21 * src.y + m22 * src.z + m23;
        }
    }
}
