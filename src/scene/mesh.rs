//! Mesh geometry and preprocessing
//!
//! A mesh stores an explicit triangle table. The external ingestion contract
//! is still the classic sentinel-terminated flat index stream (each face's
//! vertex indices followed by -1); `set_index_stream` converts it, fan
//! triangulating any face with more than three vertices.
//!
//! Preprocessing (`init`) derives the bounding box, face normals and
//! area-weighted vertex normals, and sizes the per-frame scratch arenas from
//! the known vertex/face counts. It is idempotent: anything already computed
//! is left alone, so it can be re-run after mutating raw geometry by first
//! clearing the derived buffers.

use crate::renderer::math::{Vec2, Vec3};
use crate::scene::material::Material;
use serde::{Deserialize, Serialize};

/// Sentinel value terminating each face in a flat index stream.
pub const FACE_SENTINEL: i32 = -1;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Expand bounds to include a point
    pub fn expand(&mut self, point: Vec3) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    /// Grow to enclose another box
    pub fn merge(&mut self, other: &Aabb) {
        self.expand(other.min);
        self.expand(other.max);
    }

    /// Get center of the box
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Length of the main diagonal
    pub fn diagonal_len(&self) -> f32 {
        (self.max - self.min).len()
    }
}

/// A triangle mesh with optional texture mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    pub visible: bool,
    /// Render both orientations, lighting by the absolute normal z.
    pub double_sided: bool,
    /// Eligible for sphere-mapped rendering against the environment map.
    pub environment_cast: bool,
    /// Scene-assigned id; positive once added, 0 means "not in a scene".
    pub id: u32,

    pub vertices: Vec<Vec3>,
    /// Triangle table: three vertex indices per face.
    pub faces: Vec<[usize; 3]>,
    /// Texture coordinates, optional.
    pub uvs: Vec<Vec2>,
    /// Per-face texture coordinate indices, parallel to `faces` when present.
    pub uv_faces: Vec<[usize; 3]>,

    pub material: Option<Material>,
    /// Index into the owning scene's texture list.
    pub texture: Option<usize>,

    /// Derived: unnormalized during construction, normalized by `init`.
    #[serde(skip)]
    pub face_normals: Vec<Vec3>,
    #[serde(skip)]
    pub vertex_normals: Vec<Vec3>,
    #[serde(skip)]
    pub aabb: Option<Aabb>,

    // Per-frame scratch arenas, sized once by `init` and reused.
    #[serde(skip)]
    pub transformed: Vec<Vec3>,
    #[serde(skip)]
    pub transformed_face_nz: Vec<f32>,
    #[serde(skip)]
    pub transformed_vertex_nz: Vec<f32>,
    #[serde(skip)]
    pub transformed_normals: Vec<Vec3>,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    /// A trivial mesh is omitted from every calculation and render pass.
    pub fn is_trivial(&self) -> bool {
        self.vertices.len() < 3 || self.faces.is_empty()
    }

    /// Ingest a sentinel-terminated vertex index stream, fan-triangulating
    /// faces with more than three vertices. A missing trailing sentinel is
    /// tolerated. Faces with fewer than three indices are dropped.
    pub fn set_index_stream(&mut self, stream: &[i32]) {
        self.faces = triangulate_stream(stream);
    }

    /// Ingest the texture-coordinate index stream, which must parallel the
    /// vertex index stream face for face.
    pub fn set_uv_index_stream(&mut self, stream: &[i32]) {
        self.uv_faces = triangulate_stream(stream);
    }

    /// True when the mesh carries a usable texture mapping.
    pub fn has_texture_mapping(&self) -> bool {
        self.texture.is_some()
            && !self.uvs.is_empty()
            && self.uv_faces.len() == self.faces.len()
    }

    /// Run all preprocessing steps that have not run yet.
    pub fn init(&mut self) {
        if self.is_trivial() {
            return;
        }

        if self.aabb.is_none() {
            self.calc_aabb();
        }
        if self.face_normals.is_empty() {
            self.calc_face_normals();
        }
        if self.vertex_normals.is_empty() {
            self.calc_vertex_normals();
        }
        self.normalize_face_normals();

        // scratch arenas grow on demand but never shrink
        let nv = self.vertices.len();
        let nf = self.faces.len();
        if self.transformed.len() < nv {
            self.transformed.resize(nv, Vec3::ZERO);
        }
        if self.transformed_face_nz.len() < nf {
            self.transformed_face_nz.resize(nf, 0.0);
        }
        if self.transformed_vertex_nz.len() < nv {
            self.transformed_vertex_nz.resize(nv, 0.0);
        }
        if self.transformed_normals.len() < nv {
            self.transformed_normals.resize(nv, Vec3::ZERO);
        }
    }

    /// Drop every derived buffer so the next `init` recomputes from the raw
    /// geometry. Call after mutating vertices or faces.
    pub fn invalidate_derived(&mut self) {
        self.aabb = None;
        self.face_normals.clear();
        self.vertex_normals.clear();
    }

    fn calc_aabb(&mut self) {
        let mut aabb = Aabb::new(
            Vec3::new(f32::MAX, f32::MAX, f32::MAX),
            Vec3::new(f32::MIN, f32::MIN, f32::MIN),
        );
        for v in &self.vertices {
            aabb.expand(*v);
        }
        self.aabb = Some(aabb);
    }

    /// One normal per face: cross product of the two edges leaving the first
    /// vertex. Left unnormalized so vertex-normal accumulation is weighted
    /// by face area.
    fn calc_face_normals(&mut self) {
        self.face_normals = self
            .faces
            .iter()
            .map(|f| {
                let v0 = self.vertices[f[0]];
                let e1 = self.vertices[f[1]] - v0;
                let e2 = self.vertices[f[2]] - v0;
                e1.cross(e2)
            })
            .collect();
    }

    /// Accumulate each face's unnormalized normal into its vertices, then
    /// normalize. A degenerate star sums to zero and stays the zero vector.
    fn calc_vertex_normals(&mut self) {
        if self.face_normals.is_empty() {
            self.calc_face_normals();
        }

        let mut acc = vec![Vec3::ZERO; self.vertices.len()];
        for (f, n) in self.faces.iter().zip(self.face_normals.iter()) {
            for &vi in f {
                acc[vi] = acc[vi] + *n;
            }
        }
        self.vertex_normals = acc.into_iter().map(Vec3::normalize).collect();
    }

    fn normalize_face_normals(&mut self) {
        for n in &mut self.face_normals {
            *n = n.normalize();
        }
    }
}

/// Split a sentinel-terminated index stream into triangles, fanning from
/// each face's first vertex.
fn triangulate_stream(stream: &[i32]) -> Vec<[usize; 3]> {
    let mut faces = Vec::new();
    let mut poly: Vec<usize> = Vec::new();

    let mut flush = |poly: &mut Vec<usize>| {
        if poly.len() >= 3 {
            for i in 1..poly.len() - 1 {
                faces.push([poly[0], poly[i], poly[i + 1]]);
            }
        }
        poly.clear();
    };

    for &idx in stream {
        if idx == FACE_SENTINEL {
            flush(&mut poly);
        } else if idx >= 0 {
            poly.push(idx as usize);
        }
    }
    // streams are self-describing: tolerate a missing final sentinel
    flush(&mut poly);

    faces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> Mesh {
        let mut mesh = Mesh::new("quad");
        mesh.vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        mesh.set_index_stream(&[0, 1, 2, 3, -1]);
        mesh
    }

    #[test]
    fn test_fan_triangulation() {
        let mesh = quad_mesh();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_missing_trailing_sentinel() {
        let mut mesh = Mesh::new("m");
        mesh.set_index_stream(&[0, 1, 2, -1, 3, 4, 5]);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [3, 4, 5]]);
    }

    #[test]
    fn test_short_face_dropped() {
        let mut mesh = Mesh::new("m");
        mesh.set_index_stream(&[0, 1, -1, 2, 3, 4, -1]);
        assert_eq!(mesh.faces, vec![[2, 3, 4]]);
    }

    #[test]
    fn test_trivial_mesh() {
        let mut mesh = Mesh::new("tiny");
        mesh.vertices = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)];
        mesh.set_index_stream(&[0, 1, -1]);
        assert!(mesh.is_trivial());
        mesh.init();
        assert!(mesh.aabb.is_none());
        assert!(mesh.face_normals.is_empty());
    }

    #[test]
    fn test_face_normal_direction() {
        let mut mesh = quad_mesh();
        mesh.init();
        // counter-clockwise in the xy plane faces +z
        for n in &mesh.face_normals {
            assert!((n.z - 1.0).abs() < 1e-5);
        }
        for vn in &mesh.vertex_normals {
            assert!((vn.z - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_vertex_normals_average_adjacent_faces() {
        // two faces meeting at a right angle along the y axis
        let mut mesh = Mesh::new("bend");
        mesh.vertices = vec![
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
        ];
        mesh.set_index_stream(&[0, 1, 2, 3, -1, 1, 4, 5, 2, -1]);
        mesh.init();

        // shared edge vertices see both planes
        let shared = mesh.vertex_normals[1];
        assert!(shared.x > 0.1 && shared.z > 0.1);
        assert!((shared.len() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut mesh = quad_mesh();
        mesh.init();
        let normals = mesh.vertex_normals.clone();
        let aabb = mesh.aabb;
        mesh.init();
        assert_eq!(mesh.vertex_normals, normals);
        assert_eq!(mesh.aabb, aabb);
    }

    #[test]
    fn test_aabb_bounds() {
        let mut mesh = quad_mesh();
        mesh.init();
        let aabb = mesh.aabb.unwrap();
        assert_eq!(aabb.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(aabb.center(), Vec3::new(0.5, 0.5, 0.0));
        assert!((aabb.diagonal_len() - 2.0f32.sqrt()).abs() < 1e-5);
    }
}
