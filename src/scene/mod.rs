//! Scene graph: a flat list of meshes plus shared textures
//!
//! Meshes get a positive id when added; ids are monotonic for the lifetime
//! of the scene and are what the pick buffer stores per pixel. Textures are
//! runtime resources shared by index and are not serialized with the scene.

pub mod material;
pub mod mesh;
pub mod persist;

pub use material::Material;
pub use mesh::{Aabb, Mesh};

use crate::renderer::texture::Texture;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    pub meshes: Vec<Mesh>,
    /// Shared textures, referenced by `Mesh::texture` index. Reattached by
    /// the loader after deserialization.
    #[serde(skip)]
    pub textures: Vec<Texture>,
    /// Union of the non-trivial children's bounds.
    #[serde(skip)]
    pub aabb: Option<Aabb>,
    next_id: u32,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next_id: 1,
            ..Default::default()
        }
    }

    /// A scene with no non-trivial mesh renders as background only.
    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(Mesh::is_trivial)
    }

    /// Add a mesh and return its assigned id.
    pub fn add_mesh(&mut self, mut mesh: Mesh) -> u32 {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        mesh.id = id;
        self.meshes.push(mesh);
        self.aabb = None;
        id
    }

    /// Remove a mesh by id. Ids of the remaining meshes are untouched.
    pub fn remove_mesh(&mut self, id: u32) -> Option<Mesh> {
        let pos = self.meshes.iter().position(|m| m.id == id)?;
        self.aabb = None;
        Some(self.meshes.remove(pos))
    }

    pub fn mesh_by_id(&self, id: u32) -> Option<&Mesh> {
        self.meshes.iter().find(|m| m.id == id)
    }

    /// Register a shared texture, returning its index.
    pub fn add_texture(&mut self, texture: Texture) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    /// Preprocess every child and compute the scene bounds. Idempotent.
    pub fn init(&mut self) {
        for mesh in &mut self.meshes {
            mesh.init();
        }
        if self.aabb.is_none() {
            self.calc_aabb();
        }
    }

    fn calc_aabb(&mut self) {
        let mut merged: Option<Aabb> = None;
        for mesh in &self.meshes {
            if mesh.is_trivial() {
                continue;
            }
            if let Some(child) = &mesh.aabb {
                match &mut merged {
                    Some(aabb) => aabb.merge(child),
                    None => merged = Some(*child),
                }
            }
        }
        self.aabb = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::math::Vec3;

    fn tri_mesh(name: &str, offset: f32) -> Mesh {
        let mut mesh = Mesh::new(name);
        mesh.vertices = vec![
            Vec3::new(offset, 0.0, 0.0),
            Vec3::new(offset + 1.0, 0.0, 0.0),
            Vec3::new(offset, 1.0, 0.0),
        ];
        mesh.set_index_stream(&[0, 1, 2, -1]);
        mesh
    }

    #[test]
    fn test_ids_are_positive_and_monotonic() {
        let mut scene = Scene::new("s");
        let a = scene.add_mesh(tri_mesh("a", 0.0));
        let b = scene.add_mesh(tri_mesh("b", 2.0));
        assert_eq!((a, b), (1, 2));
        scene.remove_mesh(a);
        let c = scene.add_mesh(tri_mesh("c", 4.0));
        assert_eq!(c, 3);
        assert!(scene.mesh_by_id(a).is_none());
        assert_eq!(scene.mesh_by_id(b).unwrap().name, "b");
    }

    #[test]
    fn test_empty_scene() {
        let mut scene = Scene::new("s");
        assert!(scene.is_empty());
        scene.add_mesh(Mesh::new("degenerate"));
        assert!(scene.is_empty());
        scene.add_mesh(tri_mesh("real", 0.0));
        assert!(!scene.is_empty());
    }

    #[test]
    fn test_scene_aabb_unions_children() {
        let mut scene = Scene::new("s");
        scene.add_mesh(tri_mesh("a", 0.0));
        scene.add_mesh(tri_mesh("b", 5.0));
        scene.add_mesh(Mesh::new("degenerate"));
        scene.init();
        let aabb = scene.aabb.unwrap();
        assert_eq!(aabb.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(6.0, 1.0, 0.0));
    }

    #[test]
    fn test_empty_scene_has_no_bounds() {
        let mut scene = Scene::new("s");
        scene.add_mesh(Mesh::new("degenerate"));
        scene.init();
        assert!(scene.aabb.is_none());
    }
}
