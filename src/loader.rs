//! Wavefront OBJ/MTL import
//!
//! OBJ vertex and texture-coordinate lists are global to the file, but each
//! mesh owns its buffers, so indices are remapped per mesh as faces arrive.
//! Faces split into meshes at `o`/`g`/`usemtl` boundaries; polygon faces go
//! through the sentinel index stream and get fan triangulated there. Vertex
//! normals in the file are ignored; they are recomputed from the geometry.

use crate::renderer::color::Color;
use crate::renderer::math::{Vec2, Vec3};
use crate::renderer::texture::Texture;
use crate::scene::mesh::FACE_SENTINEL;
use crate::scene::{Material, Mesh, Scene};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A material definition from an MTL library.
#[derive(Debug, Clone, Default)]
pub struct MtlDef {
    pub name: String,
    pub ambient: Color,
    pub diffuse: Color,
    pub transparency: f32,
    pub diffuse_map: Option<String>,
}

/// A parsed OBJ file before material libraries are resolved.
pub struct ObjDocument {
    pub scene: Scene,
    /// `mtllib` references, in order of appearance.
    pub mtl_libs: Vec<String>,
    /// Requested material name per mesh, parallel to `scene.meshes`.
    pub material_refs: Vec<Option<String>>,
}

/// Load an OBJ file along with its MTL libraries and diffuse-map textures
/// from the same directory. The scene comes back uninitialized.
pub fn load_obj_file<P: AsRef<Path>>(path: P) -> Result<Scene, String> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut doc = parse_obj(&text, &name)?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut materials: HashMap<String, MtlDef> = HashMap::new();
    for lib in &doc.mtl_libs {
        let lib_path = dir.join(lib);
        match fs::read_to_string(&lib_path) {
            Ok(mtl_text) => {
                for def in parse_mtl(&mtl_text) {
                    materials.insert(def.name.clone(), def);
                }
            }
            Err(e) => eprintln!("skipping material library {}: {}", lib_path.display(), e),
        }
    }

    // diffuse maps are shared when several materials reference the same file
    let mut texture_indices: HashMap<String, usize> = HashMap::new();
    for (mesh_idx, mat_name) in doc.material_refs.iter().enumerate() {
        let Some(mat_name) = mat_name else { continue };
        let Some(def) = materials.get(mat_name) else {
            eprintln!("material {} not found in any library", mat_name);
            continue;
        };

        let mut material = Material::new(&def.name, def.ambient, def.diffuse);
        material.transparency = def.transparency;
        doc.scene.meshes[mesh_idx].material = Some(material);

        if let Some(map) = &def.diffuse_map {
            let index = match texture_indices.get(map) {
                Some(&i) => Some(i),
                None => match Texture::from_file(dir.join(map)) {
                    Ok(texture) => {
                        let i = doc.scene.add_texture(texture);
                        texture_indices.insert(map.clone(), i);
                        Some(i)
                    }
                    Err(e) => {
                        eprintln!("{}", e);
                        None
                    }
                },
            };
            doc.scene.meshes[mesh_idx].texture = index;
        }
    }

    Ok(doc.scene)
}

/// Parse OBJ text into meshes. Material names are recorded but not resolved.
pub fn parse_obj(text: &str, name: &str) -> Result<ObjDocument, String> {
    let mut scene = Scene::new(name);
    let mut material_refs: Vec<Option<String>> = Vec::new();
    let mut mtl_libs: Vec<String> = Vec::new();

    let mut positions: Vec<Vec3> = Vec::new();
    let mut tex_coords: Vec<Vec2> = Vec::new();

    let mut builder = MeshBuilder::new("default");
    let mut current_material: Option<String> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let keyword = fields.next().unwrap_or("");
        let err = |what: &str| format!("line {}: bad {} statement", lineno + 1, what);

        match keyword {
            "v" => {
                let x = parse_f32(fields.next()).ok_or_else(|| err("v"))?;
                let y = parse_f32(fields.next()).ok_or_else(|| err("v"))?;
                let z = parse_f32(fields.next()).ok_or_else(|| err("v"))?;
                positions.push(Vec3::new(x, y, z));
            }
            "vt" => {
                let u = parse_f32(fields.next()).ok_or_else(|| err("vt"))?;
                let v = parse_f32(fields.next()).unwrap_or(0.0);
                // flip v: texel rows run top-down
                tex_coords.push(Vec2::new(u, 1.0 - v));
            }
            "f" => {
                let mut count = 0;
                for field in fields {
                    let mut refs = field.split('/');
                    let vi = resolve_index(refs.next(), positions.len())
                        .ok_or_else(|| err("f"))?;
                    let ti = resolve_index(refs.next(), tex_coords.len());
                    builder.push_corner(vi, ti, &positions, &tex_coords);
                    count += 1;
                }
                if count < 3 {
                    return Err(err("f"));
                }
                builder.end_face();
            }
            "o" | "g" => {
                let group = fields.next().unwrap_or("unnamed");
                builder = flush_mesh(builder, &mut scene, &mut material_refs, &current_material)
                    .unwrap_or_else(|| MeshBuilder::new(group));
                builder.name = group.to_string();
            }
            "usemtl" => {
                let mat = fields.next().unwrap_or("").to_string();
                if current_material.as_deref() != Some(mat.as_str()) {
                    let name = builder.name.clone();
                    builder = flush_mesh(builder, &mut scene, &mut material_refs, &current_material)
                        .unwrap_or_else(|| MeshBuilder::new(&name));
                    current_material = Some(mat);
                }
            }
            "mtllib" => {
                for lib in fields {
                    mtl_libs.push(lib.to_string());
                }
            }
            // vn, s, and friends carry nothing we use
            _ => {}
        }
    }
    let _ = flush_mesh(builder, &mut scene, &mut material_refs, &current_material);

    if scene.meshes.is_empty() {
        return Err("no renderable geometry found".to_string());
    }

    Ok(ObjDocument {
        scene,
        mtl_libs,
        material_refs,
    })
}

/// Parse MTL text into material definitions.
pub fn parse_mtl(text: &str) -> Vec<MtlDef> {
    let mut defs: Vec<MtlDef> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let keyword = fields.next().unwrap_or("");

        if keyword == "newmtl" {
            defs.push(MtlDef {
                name: fields.next().unwrap_or("").to_string(),
                diffuse: Color::new(0x7f, 0x7f, 0x7f),
                ..Default::default()
            });
            continue;
        }
        let Some(def) = defs.last_mut() else { continue };
        match keyword {
            "Ka" => {
                if let Some(c) = parse_color(&mut fields) {
                    def.ambient = c;
                }
            }
            "Kd" => {
                if let Some(c) = parse_color(&mut fields) {
                    def.diffuse = c;
                }
            }
            // d is opacity, Tr its complement
            "d" => {
                if let Some(d) = parse_f32(fields.next()) {
                    def.transparency = (1.0 - d).clamp(0.0, 1.0);
                }
            }
            "Tr" => {
                if let Some(tr) = parse_f32(fields.next()) {
                    def.transparency = tr.clamp(0.0, 1.0);
                }
            }
            "map_Kd" => {
                def.diffuse_map = fields.next().map(str::to_string);
            }
            _ => {}
        }
    }

    defs
}

fn parse_f32(field: Option<&str>) -> Option<f32> {
    field.and_then(|s| s.parse().ok())
}

fn parse_color(fields: &mut std::str::SplitWhitespace<'_>) -> Option<Color> {
    let r = parse_f32(fields.next())?;
    let g = parse_f32(fields.next()).unwrap_or(r);
    let b = parse_f32(fields.next()).unwrap_or(r);
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
    Some(Color::new(to_byte(r), to_byte(g), to_byte(b)))
}

/// Turn a 1-based (or negative, relative-to-end) OBJ index into a 0-based
/// offset into a list of the given length.
fn resolve_index(field: Option<&str>, len: usize) -> Option<usize> {
    let raw: i64 = field?.parse().ok()?;
    let idx = if raw > 0 {
        raw - 1
    } else if raw < 0 {
        len as i64 + raw
    } else {
        return None;
    };
    (0..len as i64).contains(&idx).then_some(idx as usize)
}

/// Accumulates one mesh's local buffers while faces stream in.
struct MeshBuilder {
    name: String,
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    face_stream: Vec<i32>,
    uv_stream: Vec<i32>,
    vertex_map: HashMap<usize, usize>,
    uv_map: HashMap<usize, usize>,
    uses_uvs: bool,
}

impl MeshBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: Vec::new(),
            uvs: Vec::new(),
            face_stream: Vec::new(),
            uv_stream: Vec::new(),
            vertex_map: HashMap::new(),
            uv_map: HashMap::new(),
            uses_uvs: false,
        }
    }

    fn push_corner(
        &mut self,
        vi: usize,
        ti: Option<usize>,
        positions: &[Vec3],
        tex_coords: &[Vec2],
    ) {
        let local_v = *self.vertex_map.entry(vi).or_insert_with(|| {
            self.vertices.push(positions[vi]);
            self.vertices.len() - 1
        });
        self.face_stream.push(local_v as i32);

        if let Some(ti) = ti {
            self.uses_uvs = true;
            let local_t = *self.uv_map.entry(ti).or_insert_with(|| {
                self.uvs.push(tex_coords[ti]);
                self.uvs.len() - 1
            });
            self.uv_stream.push(local_t as i32);
        } else {
            self.uv_stream.push(0);
        }
    }

    fn end_face(&mut self) {
        self.face_stream.push(FACE_SENTINEL);
        self.uv_stream.push(FACE_SENTINEL);
    }

    fn build(self) -> Option<Mesh> {
        if self.face_stream.is_empty() {
            return None;
        }
        let mut mesh = Mesh::new(&self.name);
        mesh.vertices = self.vertices;
        mesh.set_index_stream(&self.face_stream);
        if self.uses_uvs {
            mesh.uvs = self.uvs;
            mesh.set_uv_index_stream(&self.uv_stream);
        }
        Some(mesh)
    }
}

/// Finish the current builder into the scene if it collected any faces.
/// Returns None when a mesh was emitted (the caller starts a fresh builder).
fn flush_mesh(
    builder: MeshBuilder,
    scene: &mut Scene,
    material_refs: &mut Vec<Option<String>>,
    current_material: &Option<String>,
) -> Option<MeshBuilder> {
    if builder.face_stream.is_empty() {
        return Some(builder);
    }
    if let Some(mesh) = builder.build() {
        scene.add_mesh(mesh);
        material_refs.push(current_material.clone());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_OBJ: &str = "\
# a quad and a triangle
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 2 0 0
f 1 2 3 4
f 3 2 5
";

    #[test]
    fn test_parse_simple_obj() {
        let doc = parse_obj(SIMPLE_OBJ, "simple").unwrap();
        assert_eq!(doc.scene.meshes.len(), 1);
        let mesh = &doc.scene.meshes[0];
        assert_eq!(mesh.vertices.len(), 5);
        // quad fans into two triangles plus the lone triangle
        assert_eq!(mesh.faces.len(), 3);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert_eq!(mesh.faces[1], [0, 2, 3]);
    }

    #[test]
    fn test_negative_indices() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
f -3 -2 -1
";
        let doc = parse_obj(text, "neg").unwrap();
        assert_eq!(doc.scene.meshes[0].faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_texture_coordinates_flip_v() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
f 1/1 2/2 3/3
";
        let doc = parse_obj(text, "uv").unwrap();
        let mesh = &doc.scene.meshes[0];
        assert_eq!(mesh.uvs.len(), 3);
        assert_eq!(mesh.uvs[0], Vec2::new(0.0, 1.0));
        assert_eq!(mesh.uvs[2], Vec2::new(0.0, 0.0));
        assert_eq!(mesh.uv_faces.len(), mesh.faces.len());
    }

    #[test]
    fn test_usemtl_splits_meshes() {
        let text = "\
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
usemtl red
f 1 2 3
usemtl blue
f 2 4 3
";
        let doc = parse_obj(text, "split").unwrap();
        assert_eq!(doc.scene.meshes.len(), 2);
        assert_eq!(doc.mtl_libs, vec!["scene.mtl"]);
        assert_eq!(doc.material_refs[0].as_deref(), Some("red"));
        assert_eq!(doc.material_refs[1].as_deref(), Some("blue"));
        // each split mesh remaps to its own local vertex list
        assert_eq!(doc.scene.meshes[0].vertices.len(), 3);
        assert_eq!(doc.scene.meshes[1].vertices.len(), 3);
        assert_eq!(doc.scene.meshes[1].faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_normals_only_face_refs() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1
";
        let doc = parse_obj(text, "vn").unwrap();
        let mesh = &doc.scene.meshes[0];
        assert_eq!(mesh.faces.len(), 1);
        // the empty vt slot must not produce a uv mapping
        assert!(mesh.uvs.is_empty());
    }

    #[test]
    fn test_empty_obj_is_error() {
        assert!(parse_obj("# nothing here\n", "empty").is_err());
        assert!(parse_obj("v 0 0 0\n", "no-faces").is_err());
    }

    #[test]
    fn test_bad_face_is_error() {
        let text = "v 0 0 0\nv 1 0 0\nf 1 2\n";
        assert!(parse_obj(text, "degenerate").is_err());
    }

    #[test]
    fn test_parse_mtl() {
        let text = "\
newmtl red
Ka 0.1 0.1 0.1
Kd 1.0 0.0 0.0
d 0.75
map_Kd bricks.png

newmtl glassy
Kd 0.2 0.4 0.8
Tr 0.5
";
        let defs = parse_mtl(text);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "red");
        assert_eq!(defs[0].diffuse, Color::new(255, 0, 0));
        assert!((defs[0].transparency - 0.25).abs() < 1e-5);
        assert_eq!(defs[0].diffuse_map.as_deref(), Some("bricks.png"));
        assert_eq!(defs[1].diffuse, Color::new(51, 102, 204));
        assert!((defs[1].transparency - 0.5).abs() < 1e-5);
    }
}
