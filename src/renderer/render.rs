//! Scanline rasterizer and scene compositor
//!
//! Triangles are filled scanline by scanline between two active edges: the
//! long edge from the lowest screen vertex (greatest y) to the highest, and
//! a short edge that switches at the middle vertex. Depth, lighting and
//! texture coordinates step linearly along edges and across spans. Depth is
//! greater-is-nearer; color, depth and pick id are written in lockstep.
//!
//! Opaque spans are inclusive of their right edge and write depth; blended
//! spans are exclusive and leave depth untouched so geometry behind remains
//! visible through them. The one exception is a lit textured span whose
//! combined opacity exceeds 250: it is treated as solid and claims depth.

use super::color::Color;
use super::framebuffer::{Definition, Framebuffer};
use super::math::{Mat34, Vec3};
use super::texture::Texture;
use crate::scene::{Material, Mesh, Scene};

/// How meshes are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// A depth-tested 2x2 dot per front-facing vertex.
    Point,
    /// Depth-tested edge lines in the diffuse color.
    Wireframe,
    /// One ramp lookup per face.
    Flat,
    /// Per-vertex lighting interpolated across faces.
    Smooth,
    /// Texturing without lighting; falls back to Flat without a texture.
    Texture,
    /// Texturing modulated by face lighting; falls back to Flat.
    TextureFlat,
    /// Texturing modulated by interpolated vertex lighting. Environment-cast
    /// meshes use the sphere map instead; falls back to Smooth.
    TextureSmooth,
}

impl RenderMode {
    pub fn cycle(self) -> RenderMode {
        match self {
            RenderMode::Point => RenderMode::Wireframe,
            RenderMode::Wireframe => RenderMode::Flat,
            RenderMode::Flat => RenderMode::Smooth,
            RenderMode::Smooth => RenderMode::Texture,
            RenderMode::Texture => RenderMode::TextureFlat,
            RenderMode::TextureFlat => RenderMode::TextureSmooth,
            RenderMode::TextureSmooth => RenderMode::Point,
        }
    }
}

/// The software renderer: framebuffers, view state and the default material
/// used by meshes that carry none.
pub struct Renderer {
    pub fb: Framebuffer,
    pub mode: RenderMode,
    /// Rotation-only view matrix, also applied to normals.
    pub rot: Mat34,
    pub zoom: f32,
    pub default_material: Material,
    /// Environment map for sphere-mapped rendering.
    pub sphere_map: Option<Texture>,
    /// Generate mip chains for scene textures during `setup_scene`.
    pub mipmapping: bool,
}

impl Renderer {
    pub fn new(out_width: usize, out_height: usize, definition: Definition) -> Self {
        let mut default_material =
            Material::new("default", Color::BLACK, Color::from_rgb24(0xcaa618));
        default_material.simulate_specular = true;
        Self {
            fb: Framebuffer::new(out_width, out_height, definition),
            mode: RenderMode::Flat,
            rot: Mat34::identity(),
            zoom: 1.0,
            default_material,
            sphere_map: None,
            mipmapping: false,
        }
    }

    /// Change working resolution, rescaling zoom so the model keeps its
    /// apparent size.
    pub fn set_definition(&mut self, definition: Definition) {
        let factor = self.fb.set_definition(definition);
        self.zoom *= factor;
    }

    /// Prepare a scene for rendering: preprocess geometry, optionally build
    /// texture mip chains, and fit the initial zoom so the scene's bounding
    /// diagonal spans the smaller frame dimension.
    pub fn setup_scene(&mut self, scene: &mut Scene) {
        scene.init();
        if self.mipmapping {
            for texture in &mut scene.textures {
                texture.generate_mipmaps();
            }
        }
        self.rot = Mat34::identity();
        if let Some(aabb) = scene.aabb {
            let d = aabb.diagonal_len();
            if d > 0.0 {
                self.zoom = self.fb.width.min(self.fb.height) as f32 / d;
            }
        }
    }

    /// Apply incremental rotations (degrees) about the principal axes.
    pub fn rotate(&mut self, rx: f32, ry: f32, rz: f32) {
        self.rot.rotate_about_x(rx);
        self.rot.rotate_about_y(ry);
        self.rot.rotate_about_z(rz);
    }

    /// Read back (mesh id, depth) at an output-surface coordinate.
    pub fn pick(&self, out_x: usize, out_y: usize) -> (u32, f32) {
        self.fb.pick_at(out_x, out_y)
    }

    /// Render the scene into the working framebuffer.
    pub fn render_frame(&mut self, scene: &mut Scene) {
        self.fb.clear();
        if scene.is_empty() {
            return;
        }
        let Some(aabb) = scene.aabb else {
            return;
        };

        // model center -> rotate -> zoom with y flipped to screen-down ->
        // frame center
        let mut transform = Mat34::identity();
        let c = aabb.center();
        transform.translate(-c.x, -c.y, -c.z);
        transform.multiply(&self.rot);
        transform.scale(self.zoom, -self.zoom, self.zoom);
        transform.translate(self.fb.width as f32 / 2.0, self.fb.height as f32 / 2.0, 0.0);

        let order = composite_order(scene, &transform);

        let Scene { meshes, textures, .. } = scene;
        for idx in order {
            let mesh = &mut meshes[idx];
            let nv = mesh.vertices.len();
            transform.transform_vectors(&mesh.vertices, &mut mesh.transformed[..nv]);

            let (palette, opacity, diffuse) = {
                let mat = match mesh.material.as_mut() {
                    Some(m) => m,
                    None => &mut self.default_material,
                };
                (*mat.palette(), mat.opacity(), mat.diffuse)
            };

            let texture = mesh
                .texture
                .and_then(|t| textures.get(t))
                .filter(|_| mesh.has_texture_mapping());

            let fb = &mut self.fb;
            let rot = &self.rot;
            match self.mode {
                RenderMode::Point => render_point(fb, mesh, rot, diffuse),
                RenderMode::Wireframe => render_wireframe(fb, mesh, rot, diffuse),
                RenderMode::Flat => render_flat(fb, mesh, rot, &palette, opacity),
                RenderMode::Smooth => render_smooth(fb, mesh, rot, &palette, opacity),
                RenderMode::Texture => match texture {
                    Some(tex) => render_texture(fb, mesh, rot, tex),
                    None => render_flat(fb, mesh, rot, &palette, opacity),
                },
                RenderMode::TextureFlat => match texture {
                    Some(tex) => render_texture_flat(fb, mesh, rot, &palette, opacity, tex),
                    None => render_flat(fb, mesh, rot, &palette, opacity),
                },
                RenderMode::TextureSmooth => {
                    let env_map = self.sphere_map.as_ref().filter(|_| mesh.environment_cast);
                    match (env_map, texture) {
                        (Some(map), _) => {
                            render_sphere_mapped(fb, mesh, rot, &palette, opacity, map)
                        }
                        (None, Some(tex)) => {
                            render_texture_smooth(fb, mesh, rot, &palette, opacity, tex)
                        }
                        (None, None) => render_smooth(fb, mesh, rot, &palette, opacity),
                    }
                }
            }
        }
    }
}

/// Decide the draw order: opaque meshes first, nearest to farthest (to seed
/// the depth buffer early), then transparent meshes farthest to nearest so
/// blending composites back to front. Depth is the transformed bounding-box
/// center's z. Trivial and hidden meshes are dropped.
fn composite_order(scene: &Scene, transform: &Mat34) -> Vec<usize> {
    let mut entries: Vec<(usize, f32, bool)> = Vec::with_capacity(scene.meshes.len());
    for (i, mesh) in scene.meshes.iter().enumerate() {
        if mesh.is_trivial() || !mesh.visible {
            continue;
        }
        let Some(aabb) = &mesh.aabb else { continue };
        let depth = transform.transform(aabb.center()).z;
        let transparent = mesh
            .material
            .as_ref()
            .map_or(false, |m| m.transparency > 0.0)
            || mesh
                .texture
                .and_then(|t| scene.textures.get(t))
                .filter(|_| mesh.has_texture_mapping())
                .map_or(false, |t| t.has_transparency);
        entries.push((i, depth, transparent));
    }

    entries.sort_by(|a, b| {
        use std::cmp::Ordering;
        match (a.2, b.2) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, false) => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
            (true, true) => a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal),
        }
    });

    entries.into_iter().map(|(i, _, _)| i).collect()
}

/// Snap a projected coordinate to its pixel column/row.
#[inline]
fn snap(v: f32) -> i32 {
    (v + 0.5) as i32
}

/// Shading ramp index for an interpolated lighting term.
#[inline]
fn ramp_index(n: f32) -> usize {
    if n > 0.0 {
        (n as usize).min(255)
    } else {
        0
    }
}

/// Wrap-sample a square power-of-two texel buffer.
#[inline]
fn sample(texels: &[Color], dim: usize, th: f32, tv: f32) -> Color {
    let bound = dim as i32 - 1;
    let tx = (th as i32 & bound) as usize;
    let ty = (tv as i32 & bound) as usize;
    texels[ty * dim + tx]
}

/// A projected triangle corner with interpolated attributes.
#[derive(Clone, Copy)]
struct Corner<const A: usize> {
    x: i32,
    y: i32,
    z: f32,
    attrs: [f32; A],
}

/// One horizontal span handed to a fill closure. `x_right` is the inclusive
/// end; blended fills stop one pixel short of it.
struct Span<const A: usize> {
    y: usize,
    x_left: usize,
    x_right: usize,
    z: f32,
    z_inc: f32,
    attrs: [f32; A],
    attr_incs: [f32; A],
}

struct Edge<const A: usize> {
    x: f32,
    z: f32,
    attrs: [f32; A],
    x_step: f32,
    z_step: f32,
    attr_steps: [f32; A],
}

impl<const A: usize> Edge<A> {
    /// Walk from `from` (lower on screen, greater y) toward `to`. A
    /// degenerate height divides by one instead.
    fn between(from: &Corner<A>, to: &Corner<A>) -> Self {
        let dy = match from.y - to.y {
            0 => 1,
            d => d,
        } as f32;
        let mut attr_steps = [0.0f32; A];
        for (step, (a, b)) in attr_steps
            .iter_mut()
            .zip(from.attrs.iter().zip(to.attrs.iter()))
        {
            *step = (a - b) / dy;
        }
        Self {
            x: from.x as f32,
            z: from.z,
            attrs: from.attrs,
            x_step: (from.x - to.x) as f32 / dy,
            z_step: (from.z - to.z) / dy,
            attr_steps,
        }
    }

    fn step_up(&mut self) {
        self.x -= self.x_step;
        self.z -= self.z_step;
        for (a, s) in self.attrs.iter_mut().zip(self.attr_steps.iter()) {
            *a -= *s;
        }
    }
}

/// Scan-convert one triangle, invoking `fill` for every covered span inside
/// the frame. Spans are emitted bottom-up. Left clipping advances the live
/// interpolants; the right edge is clamped to the frame.
fn scan_triangle<const A: usize, F>(corners: &[Corner<A>; 3], width: usize, height: usize, fill: &mut F)
where
    F: FnMut(Span<A>),
{
    let ys = [corners[0].y, corners[1].y, corners[2].y];
    let mut high = if ys[0] < ys[1] { 0 } else { 1 };
    if ys[2] < ys[high] {
        high = 2;
    }
    let mut low = if ys[0] > ys[1] { 0 } else { 1 };
    if ys[2] > ys[low] {
        low = 2;
    }
    let mid = 3 - low - high;
    if high == low {
        return;
    }

    let mut long_edge = Edge::between(&corners[low], &corners[high]);
    let mut lower_edge = Edge::between(&corners[low], &corners[mid]);
    let mut upper_edge = Edge::between(&corners[mid], &corners[high]);

    let w = width as i32;
    let mut y = ys[low];
    while y > ys[high] {
        let on_lower_half = y > ys[mid];
        if y >= 0 && y < height as i32 {
            let short_edge: &Edge<A> = if on_lower_half { &lower_edge } else { &upper_edge };

            let mut x_left = long_edge.x as i32;
            let mut z_left = long_edge.z;
            let mut attrs_left = long_edge.attrs;
            let mut x_right = short_edge.x as i32;
            let mut z_right = short_edge.z;
            let mut attrs_right = short_edge.attrs;

            if x_left > x_right {
                std::mem::swap(&mut x_left, &mut x_right);
                std::mem::swap(&mut z_left, &mut z_right);
                std::mem::swap(&mut attrs_left, &mut attrs_right);
            }

            let dx = x_right - x_left;
            let z_inc = if dx != 0 {
                (z_right - z_left) / dx as f32
            } else {
                1.0
            };
            let mut attr_incs = [0.0f32; A];
            if dx != 0 {
                for (inc, (r, l)) in attr_incs
                    .iter_mut()
                    .zip(attrs_right.iter().zip(attrs_left.iter()))
                {
                    *inc = (r - l) / dx as f32;
                }
            }

            if x_left < 0 {
                z_left -= x_left as f32 * z_inc;
                for (a, inc) in attrs_left.iter_mut().zip(attr_incs.iter()) {
                    *a -= x_left as f32 * *inc;
                }
                x_left = 0;
            }
            if x_right >= w {
                x_right = w - 1;
            }

            if x_left <= x_right {
                fill(Span {
                    y: y as usize,
                    x_left: x_left as usize,
                    x_right: x_right as usize,
                    z: z_left,
                    z_inc,
                    attrs: attrs_left,
                    attr_incs,
                });
            }
        }

        long_edge.step_up();
        if on_lower_half {
            lower_edge.step_up();
        } else {
            upper_edge.step_up();
        }
        y -= 1;
    }
}

/// Transformed face normal z per face, through the rotation-only matrix.
fn fill_face_nz(mesh: &mut Mesh, rot: &Mat34) {
    let nf = mesh.faces.len();
    rot.transform_vector_zs(&mesh.face_normals, &mut mesh.transformed_face_nz[..nf]);
}

/// Transformed vertex normal z per vertex.
fn fill_vertex_nz(mesh: &mut Mesh, rot: &Mat34) {
    let nv = mesh.vertices.len();
    rot.transform_vector_zs(&mesh.vertex_normals, &mut mesh.transformed_vertex_nz[..nv]);
}

/// Facing term for a face, absolute for double-sided meshes. Negative means
/// cull.
#[inline]
fn facing(nz: f32, double_sided: bool) -> f32 {
    if double_sided {
        nz.abs()
    } else {
        nz
    }
}

fn corner<const A: usize>(v: Vec3, attrs: [f32; A]) -> Corner<A> {
    Corner {
        x: snap(v.x),
        y: snap(v.y),
        z: v.z,
        attrs,
    }
}

/// One 2x2 depth-tested dot per front-facing vertex.
fn render_point(fb: &mut Framebuffer, mesh: &mut Mesh, rot: &Mat34, color: Color) {
    fill_vertex_nz(mesh, rot);
    let (w, h) = (fb.width, fb.height);
    let id = mesh.id;

    for (i, v) in mesh.transformed[..mesh.vertices.len()].iter().enumerate() {
        let nz = facing(mesh.transformed_vertex_nz[i], mesh.double_sided);
        if nz <= 0.0 {
            continue;
        }
        let x = snap(v.x);
        let y = snap(v.y);
        if x < 0 || x >= w as i32 - 1 || y < 0 || y >= h as i32 - 1 {
            continue;
        }
        let base = y as usize * w + x as usize;
        for pix in [base, base + 1, base + w, base + w + 1] {
            if v.z > fb.depth[pix] {
                fb.depth[pix] = v.z;
                fb.color[pix] = color;
                fb.pick[pix] = id;
            }
        }
    }
}

/// Depth-tested line walk along each edge of every front-facing face. The
/// dominant axis steps by whole pixels; the other axes follow fractionally.
fn render_wireframe(fb: &mut Framebuffer, mesh: &mut Mesh, rot: &Mat34, color: Color) {
    fill_face_nz(mesh, rot);
    let (w, h) = (fb.width, fb.height);
    let xbound = (w - 1) as f32;
    let ybound = (h - 1) as f32;
    let id = mesh.id;

    for (f, face) in mesh.faces.iter().enumerate() {
        if facing(mesh.transformed_face_nz[f], mesh.double_sided) < 0.0 {
            continue;
        }
        for e in 0..3 {
            let a = mesh.transformed[face[e]];
            let b = mesh.transformed[face[(e + 1) % 3]];
            let (x0, y0, z0) = (snap(a.x), snap(a.y), a.z);
            let (x1, y1, z1) = (snap(b.x), snap(b.y), b.z);

            let dx = x1 - x0;
            let dy = y1 - y0;
            let dz = z1 - z0;

            let (mut dd, mut x_inc, mut y_inc, mut z_inc);
            if dx.abs() > dy.abs() {
                dd = dx;
                x_inc = if dx > 0 { 1.0 } else { -1.0 };
                y_inc = if dx != 0 { x_inc * dy as f32 / dx as f32 } else { 0.0 };
                z_inc = if dx != 0 { x_inc * dz / dx as f32 } else { 0.0 };
            } else {
                dd = dy;
                y_inc = if dy > 0 { 1.0 } else { -1.0 };
                x_inc = if dy != 0 { y_inc * dx as f32 / dy as f32 } else { 0.0 };
                z_inc = if dy != 0 { y_inc * dz / dy as f32 } else { 0.0 };
            }

            let (mut x, mut y, mut z) = (x0 as f32, y0 as f32, z0);
            if dd < 0 {
                x = x1 as f32;
                y = y1 as f32;
                z = z1;
                dd = -dd;
                x_inc = -x_inc;
                y_inc = -y_inc;
                z_inc = -z_inc;
            }

            for _ in 0..dd {
                if x >= 0.0 && x < xbound && y >= 0.0 && y < ybound {
                    let pix = y as usize * w + x as usize;
                    if z > fb.depth[pix] {
                        fb.depth[pix] = z;
                        fb.color[pix] = color;
                        fb.pick[pix] = id;
                    }
                }
                x += x_inc;
                y += y_inc;
                z += z_inc;
            }
        }
    }
}

/// One shading ramp lookup per face.
fn render_flat(
    fb: &mut Framebuffer,
    mesh: &mut Mesh,
    rot: &Mat34,
    palette: &[Color; 256],
    opacity: u8,
) {
    if opacity == 0 {
        return;
    }
    fill_face_nz(mesh, rot);
    let (w, h) = (fb.width, fb.height);
    let id = mesh.id;
    let is_opaque = opacity == 255;

    for (f, face) in mesh.faces.iter().enumerate() {
        let nz = facing(mesh.transformed_face_nz[f], mesh.double_sided);
        if nz < 0.0 {
            continue;
        }
        let color = palette[ramp_index(nz * 255.0)];
        let corners = face.map(|vi| corner::<0>(mesh.transformed[vi], []));

        scan_triangle(&corners, w, h, &mut |span: Span<0>| {
            let mut pix = span.y * w + span.x_left;
            let mut z = span.z;
            if is_opaque {
                for _ in span.x_left..=span.x_right {
                    if z > fb.depth[pix] {
                        fb.depth[pix] = z;
                        fb.color[pix] = color;
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    pix += 1;
                }
            } else {
                for _ in span.x_left..span.x_right {
                    if z > fb.depth[pix] {
                        fb.color[pix] = color.blend_over(fb.color[pix], opacity);
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    pix += 1;
                }
            }
        });
    }
}

/// Per-vertex lighting interpolated across each face.
fn render_smooth(
    fb: &mut Framebuffer,
    mesh: &mut Mesh,
    rot: &Mat34,
    palette: &[Color; 256],
    opacity: u8,
) {
    if opacity == 0 {
        return;
    }
    fill_face_nz(mesh, rot);
    fill_vertex_nz(mesh, rot);
    let (w, h) = (fb.width, fb.height);
    let id = mesh.id;
    let is_opaque = opacity == 255;

    for (f, face) in mesh.faces.iter().enumerate() {
        if facing(mesh.transformed_face_nz[f], mesh.double_sided) < 0.0 {
            continue;
        }
        let corners = face.map(|vi| {
            let n = facing(mesh.transformed_vertex_nz[vi], mesh.double_sided);
            corner(mesh.transformed[vi], [n * 255.0])
        });

        scan_triangle(&corners, w, h, &mut |span: Span<1>| {
            let mut pix = span.y * w + span.x_left;
            let mut z = span.z;
            let mut n = span.attrs[0];
            if is_opaque {
                for _ in span.x_left..=span.x_right {
                    if z > fb.depth[pix] {
                        fb.depth[pix] = z;
                        fb.color[pix] = palette[ramp_index(n)];
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    n += span.attr_incs[0];
                    pix += 1;
                }
            } else {
                for _ in span.x_left..span.x_right {
                    if z > fb.depth[pix] {
                        fb.color[pix] = palette[ramp_index(n)].blend_over(fb.color[pix], opacity);
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    n += span.attr_incs[0];
                    pix += 1;
                }
            }
        });
    }
}

/// Screen-to-texture area ratio for mip selection, from the raw projected
/// coordinates and the base-level texel coordinates. The screen area gets a
/// +1 bias so a sliver never divides by zero.
fn mip_level<'t>(
    texture: &'t Texture,
    mesh: &Mesh,
    face: &[usize; 3],
    uv_face: &[usize; 3],
) -> (&'t [Color], usize) {
    if !texture.has_mipmaps() {
        return (&texture.texels, texture.width);
    }
    let dim = texture.width as f32;
    let p = face.map(|vi| (mesh.transformed[vi].x, mesh.transformed[vi].y));
    let t = uv_face.map(|ti| (mesh.uvs[ti].x * dim, mesh.uvs[ti].y * dim));

    let face_area = ((p[1].0 - p[0].0) * (p[2].1 - p[0].1)
        - (p[1].1 - p[0].1) * (p[2].0 - p[0].0))
        .abs()
        + 1.0;
    let tex_area = ((t[1].0 - t[0].0) * (t[2].1 - t[0].1)
        - (t[1].1 - t[0].1) * (t[2].0 - t[0].0))
        .abs();

    texture.select_level(tex_area / face_area)
}

/// Texturing without lighting. Opacity comes from the texels alone; the
/// material plays no part in this mode.
fn render_texture(fb: &mut Framebuffer, mesh: &mut Mesh, rot: &Mat34, texture: &Texture) {
    fill_face_nz(mesh, rot);
    let (w, h) = (fb.width, fb.height);
    let id = mesh.id;
    let is_opaque = !texture.has_transparency;

    for (f, face) in mesh.faces.iter().enumerate() {
        if facing(mesh.transformed_face_nz[f], mesh.double_sided) < 0.0 {
            continue;
        }
        let uv_face = &mesh.uv_faces[f];
        let (texels, tdim) = mip_level(texture, mesh, face, uv_face);

        let mut corners = [corner::<2>(Vec3::ZERO, [0.0; 2]); 3];
        for (c, (&vi, &ti)) in corners.iter_mut().zip(face.iter().zip(uv_face.iter())) {
            let uv = mesh.uvs[ti];
            *c = corner(
                mesh.transformed[vi],
                [uv.x * tdim as f32, uv.y * tdim as f32],
            );
        }

        scan_triangle(&corners, w, h, &mut |span: Span<2>| {
            let mut pix = span.y * w + span.x_left;
            let mut z = span.z;
            let [mut th, mut tv] = span.attrs;
            if is_opaque {
                for _ in span.x_left..=span.x_right {
                    if z > fb.depth[pix] {
                        fb.depth[pix] = z;
                        fb.color[pix] = sample(texels, tdim, th, tv);
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    th += span.attr_incs[0];
                    tv += span.attr_incs[1];
                    pix += 1;
                }
            } else {
                for _ in span.x_left..span.x_right {
                    if z > fb.depth[pix] {
                        let texel = sample(texels, tdim, th, tv);
                        fb.color[pix] = texel.blend_over(fb.color[pix], texel.a);
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    th += span.attr_incs[0];
                    tv += span.attr_incs[1];
                    pix += 1;
                }
            }
        });
    }
}

/// Texturing modulated by one ramp lookup per face. A blended pixel whose
/// combined texel/material opacity exceeds 250 counts as solid and writes
/// depth.
fn render_texture_flat(
    fb: &mut Framebuffer,
    mesh: &mut Mesh,
    rot: &Mat34,
    palette: &[Color; 256],
    opacity: u8,
    texture: &Texture,
) {
    if opacity == 0 {
        return;
    }
    fill_face_nz(mesh, rot);
    let (w, h) = (fb.width, fb.height);
    let id = mesh.id;
    let is_opaque = opacity == 255 && !texture.has_transparency;

    for (f, face) in mesh.faces.iter().enumerate() {
        let nz = facing(mesh.transformed_face_nz[f], mesh.double_sided);
        if nz < 0.0 {
            continue;
        }
        let color = palette[ramp_index(nz * 255.0)];
        let uv_face = &mesh.uv_faces[f];
        let (texels, tdim) = mip_level(texture, mesh, face, uv_face);

        let mut corners = [corner::<2>(Vec3::ZERO, [0.0; 2]); 3];
        for (c, (&vi, &ti)) in corners.iter_mut().zip(face.iter().zip(uv_face.iter())) {
            let uv = mesh.uvs[ti];
            *c = corner(
                mesh.transformed[vi],
                [uv.x * tdim as f32, uv.y * tdim as f32],
            );
        }

        scan_triangle(&corners, w, h, &mut |span: Span<2>| {
            let mut pix = span.y * w + span.x_left;
            let mut z = span.z;
            let [mut th, mut tv] = span.attrs;
            if is_opaque {
                for _ in span.x_left..=span.x_right {
                    if z > fb.depth[pix] {
                        fb.depth[pix] = z;
                        fb.color[pix] = color.modulate(sample(texels, tdim, th, tv));
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    th += span.attr_incs[0];
                    tv += span.attr_incs[1];
                    pix += 1;
                }
            } else {
                for _ in span.x_left..span.x_right {
                    if z > fb.depth[pix] {
                        let texel = sample(texels, tdim, th, tv);
                        let opaci = ((texel.a as u16 * opacity as u16) >> 8) as u8;
                        let lit = color.modulate(texel);
                        if opaci > 250 {
                            fb.depth[pix] = z;
                            fb.color[pix] = lit;
                        } else {
                            fb.color[pix] = lit.blend_over(fb.color[pix], opaci);
                        }
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    th += span.attr_incs[0];
                    tv += span.attr_incs[1];
                    pix += 1;
                }
            }
        });
    }
}

/// Texturing modulated by interpolated vertex lighting.
fn render_texture_smooth(
    fb: &mut Framebuffer,
    mesh: &mut Mesh,
    rot: &Mat34,
    palette: &[Color; 256],
    opacity: u8,
    texture: &Texture,
) {
    if opacity == 0 {
        return;
    }
    fill_face_nz(mesh, rot);
    fill_vertex_nz(mesh, rot);
    let (w, h) = (fb.width, fb.height);
    let id = mesh.id;
    let is_opaque = opacity == 255 && !texture.has_transparency;

    for (f, face) in mesh.faces.iter().enumerate() {
        if facing(mesh.transformed_face_nz[f], mesh.double_sided) < 0.0 {
            continue;
        }
        let uv_face = &mesh.uv_faces[f];
        let (texels, tdim) = mip_level(texture, mesh, face, uv_face);

        let mut corners = [corner::<3>(Vec3::ZERO, [0.0; 3]); 3];
        for (c, (&vi, &ti)) in corners.iter_mut().zip(face.iter().zip(uv_face.iter())) {
            let uv = mesh.uvs[ti];
            let n = facing(mesh.transformed_vertex_nz[vi], mesh.double_sided);
            *c = corner(
                mesh.transformed[vi],
                [n * 255.0, uv.x * tdim as f32, uv.y * tdim as f32],
            );
        }

        scan_triangle(&corners, w, h, &mut |span: Span<3>| {
            let mut pix = span.y * w + span.x_left;
            let mut z = span.z;
            let [mut n, mut th, mut tv] = span.attrs;
            if is_opaque {
                for _ in span.x_left..=span.x_right {
                    if z > fb.depth[pix] {
                        fb.depth[pix] = z;
                        let color = palette[ramp_index(n)];
                        fb.color[pix] = color.modulate(sample(texels, tdim, th, tv));
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    n += span.attr_incs[0];
                    th += span.attr_incs[1];
                    tv += span.attr_incs[2];
                    pix += 1;
                }
            } else {
                for _ in span.x_left..span.x_right {
                    if z > fb.depth[pix] {
                        let texel = sample(texels, tdim, th, tv);
                        let opaci = ((texel.a as u16 * opacity as u16) >> 8) as u8;
                        let lit = palette[ramp_index(n)].modulate(texel);
                        if opaci > 250 {
                            fb.depth[pix] = z;
                            fb.color[pix] = lit;
                        } else {
                            fb.color[pix] = lit.blend_over(fb.color[pix], opaci);
                        }
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    n += span.attr_incs[0];
                    th += span.attr_incs[1];
                    tv += span.attr_incs[2];
                    pix += 1;
                }
            }
        });
    }
}

/// Sphere-mapped rendering: full rotated vertex normals drive both the
/// lighting term (z) and the environment lookup (x, y folded into the map's
/// upper hemisphere).
fn render_sphere_mapped(
    fb: &mut Framebuffer,
    mesh: &mut Mesh,
    rot: &Mat34,
    palette: &[Color; 256],
    opacity: u8,
    map: &Texture,
) {
    if opacity == 0 {
        return;
    }
    fill_face_nz(mesh, rot);
    let nv = mesh.vertices.len();
    rot.transform_vectors(&mesh.vertex_normals, &mut mesh.transformed_normals[..nv]);

    let (w, h) = (fb.width, fb.height);
    let id = mesh.id;
    let is_opaque = opacity == 255;
    let sdim = map.width;
    let sbound = sdim as i32 - 1;

    for (f, face) in mesh.faces.iter().enumerate() {
        if facing(mesh.transformed_face_nz[f], mesh.double_sided) < 0.0 {
            continue;
        }
        let corners = face.map(|vi| {
            let normal = mesh.transformed_normals[vi];
            let n = facing(normal.z, mesh.double_sided) * 255.0;
            let sh = (((normal.x / 2.0 + 0.5) * sdim as f32) as i32 & sbound) as f32;
            let sv = (((0.5 - normal.y / 2.0) * sdim as f32) as i32 & sbound) as f32;
            corner(mesh.transformed[vi], [n, sh, sv])
        });

        scan_triangle(&corners, w, h, &mut |span: Span<3>| {
            let mut pix = span.y * w + span.x_left;
            let mut z = span.z;
            let [mut n, mut sh, mut sv] = span.attrs;
            if is_opaque {
                for _ in span.x_left..=span.x_right {
                    if z > fb.depth[pix] {
                        fb.depth[pix] = z;
                        let color = palette[ramp_index(n)];
                        fb.color[pix] = color.modulate(sample(&map.texels, sdim, sh, sv));
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    n += span.attr_incs[0];
                    sh += span.attr_incs[1];
                    sv += span.attr_incs[2];
                    pix += 1;
                }
            } else {
                for _ in span.x_left..span.x_right {
                    if z > fb.depth[pix] {
                        let color = palette[ramp_index(n)];
                        let lit = color.modulate(sample(&map.texels, sdim, sh, sv));
                        fb.color[pix] = lit.blend_over(fb.color[pix], opacity);
                        fb.pick[pix] = id;
                    }
                    z += span.z_inc;
                    n += span.attr_incs[0];
                    sh += span.attr_incs[1];
                    sv += span.attr_incs[2];
                    pix += 1;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::math::Vec2;

    fn tri_mesh(name: &str, z: f32, flipped: bool) -> Mesh {
        let mut mesh = Mesh::new(name);
        mesh.vertices = vec![
            Vec3::new(-4.0, -4.0, z),
            Vec3::new(4.0, -4.0, z),
            Vec3::new(0.0, 4.0, z),
        ];
        if flipped {
            mesh.set_index_stream(&[0, 2, 1, -1]);
        } else {
            mesh.set_index_stream(&[0, 1, 2, -1]);
        }
        mesh
    }

    fn flat_renderer(size: usize) -> Renderer {
        let mut r = Renderer::new(size, size, Definition::Standard);
        r.mode = RenderMode::Flat;
        r
    }

    fn covered_pixels(fb: &Framebuffer, id: u32) -> Vec<usize> {
        fb.pick
            .iter()
            .enumerate()
            .filter(|(_, &p)| p == id)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_flat_face_uses_top_ramp_entry() {
        let mut renderer = flat_renderer(64);
        let mut scene = Scene::new("s");
        let mut mesh = tri_mesh("tri", 0.0, false);
        mesh.material = Some(Material::new("red", Color::BLACK, Color::new(200, 40, 40)));
        let id = scene.add_mesh(mesh);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        // the face normal is +z, so every covered pixel reads ramp[255],
        // which reproduces the diffuse color exactly
        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        for pix in covered {
            assert_eq!(renderer.fb.color[pix], Color::new(200, 40, 40));
            assert!(renderer.fb.depth[pix] > f32::NEG_INFINITY);
        }
    }

    #[test]
    fn test_trivial_mesh_renders_nothing() {
        let mut renderer = flat_renderer(32);
        let mut scene = Scene::new("s");
        let mut degenerate = Mesh::new("two-verts");
        degenerate.vertices = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)];
        scene.add_mesh(degenerate);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        assert!(renderer.fb.pick.iter().all(|&p| p == 0));
        assert!(renderer.fb.depth.iter().all(|&z| z == f32::NEG_INFINITY));
    }

    #[test]
    fn test_backface_culled_unless_double_sided() {
        let mut renderer = flat_renderer(32);
        let mut scene = Scene::new("s");
        let id = scene.add_mesh(tri_mesh("flipped", 0.0, true));
        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);
        assert!(covered_pixels(&renderer.fb, id).is_empty());

        scene.meshes[0].double_sided = true;
        renderer.render_frame(&mut scene);
        assert!(!covered_pixels(&renderer.fb, id).is_empty());
    }

    #[test]
    fn test_invisible_mesh_skipped() {
        let mut renderer = flat_renderer(32);
        let mut scene = Scene::new("s");
        let id = scene.add_mesh(tri_mesh("hidden", 0.0, false));
        scene.meshes[0].visible = false;
        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);
        assert!(covered_pixels(&renderer.fb, id).is_empty());
    }

    #[test]
    fn test_opaque_depth_order_is_insertion_independent() {
        let run = |near_first: bool| {
            let mut renderer = flat_renderer(48);
            let mut scene = Scene::new("s");
            let near = tri_mesh("near", 2.0, false);
            let far = tri_mesh("far", -2.0, false);
            let (near_id, _far_id) = if near_first {
                (scene.add_mesh(near), scene.add_mesh(far))
            } else {
                let f = scene.add_mesh(far);
                (scene.add_mesh(near), f)
            };
            renderer.setup_scene(&mut scene);
            renderer.render_frame(&mut scene);
            // the triangles coincide in x/y, so every covered pixel belongs
            // to the nearer one
            let covered = covered_pixels(&renderer.fb, near_id);
            assert!(!covered.is_empty());
            for (i, &p) in renderer.fb.pick.iter().enumerate() {
                if p != 0 {
                    assert_eq!(p, near_id, "far mesh won pixel {}", i);
                }
            }
        };
        run(true);
        run(false);
    }

    #[test]
    fn test_transparent_mesh_blends_and_keeps_depth_clear() {
        let mut renderer = flat_renderer(48);
        renderer.fb.set_background(Color::BLACK, Color::BLACK);
        let mut scene = Scene::new("s");
        let mut mesh = tri_mesh("glass", 0.0, false);
        let mut mat = Material::new("glass", Color::BLACK, Color::new(255, 255, 255));
        mat.transparency = 0.5;
        mesh.material = Some(mat);
        let id = scene.add_mesh(mesh);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        for pix in covered {
            let c = renderer.fb.color[pix];
            // half white over black lands mid-gray
            assert!(c.r > 100 && c.r < 150);
            // blended spans never claim depth
            assert_eq!(renderer.fb.depth[pix], f32::NEG_INFINITY);
        }
    }

    #[test]
    fn test_wireframe_draws_diffuse_edges() {
        let mut renderer = flat_renderer(48);
        renderer.mode = RenderMode::Wireframe;
        let mut scene = Scene::new("s");
        let mut mesh = tri_mesh("wire", 0.0, false);
        mesh.material = Some(Material::new("m", Color::BLACK, Color::new(10, 250, 10)));
        let id = scene.add_mesh(mesh);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        for pix in covered {
            assert_eq!(renderer.fb.color[pix], Color::new(10, 250, 10));
        }
        // edges only: far fewer pixels than a filled face
        let mut filled = flat_renderer(48);
        let mut scene2 = Scene::new("s2");
        let id2 = scene2.add_mesh(tri_mesh("solid", 0.0, false));
        filled.setup_scene(&mut scene2);
        filled.render_frame(&mut scene2);
        assert!(
            covered_pixels(&renderer.fb, id).len() < covered_pixels(&filled.fb, id2).len()
        );
    }

    #[test]
    fn test_unlit_texture_samples_texels() {
        let mut renderer = flat_renderer(64);
        renderer.mode = RenderMode::Texture;
        let mut scene = Scene::new("s");
        let tex = scene.add_texture(Texture::checkerboard(
            8,
            4,
            Color::new(250, 0, 0),
            Color::new(0, 0, 250),
        ));

        let mut mesh = Mesh::new("quad");
        mesh.vertices = vec![
            Vec3::new(-4.0, -4.0, 0.0),
            Vec3::new(4.0, -4.0, 0.0),
            Vec3::new(4.0, 4.0, 0.0),
            Vec3::new(-4.0, 4.0, 0.0),
        ];
        mesh.set_index_stream(&[0, 1, 2, 3, -1]);
        mesh.uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        mesh.set_uv_index_stream(&[0, 1, 2, 3, -1]);
        mesh.texture = Some(tex);
        let id = scene.add_mesh(mesh);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        let mut reds = 0;
        let mut blues = 0;
        for &pix in &covered {
            match renderer.fb.color[pix] {
                c if c.r == 250 => reds += 1,
                c if c.b == 250 => blues += 1,
                c => panic!("unexpected color {:?}", c),
            }
        }
        // both checker cells show up
        assert!(reds > 0 && blues > 0);
    }

    #[test]
    fn test_texture_mode_without_texture_falls_back_to_flat() {
        let mut renderer = flat_renderer(32);
        renderer.mode = RenderMode::Texture;
        let mut scene = Scene::new("s");
        let mut mesh = tri_mesh("plain", 0.0, false);
        mesh.material = Some(Material::new("m", Color::BLACK, Color::new(77, 66, 55)));
        let id = scene.add_mesh(mesh);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        for pix in covered {
            assert_eq!(renderer.fb.color[pix], Color::new(77, 66, 55));
        }
    }

    #[test]
    fn test_pick_round_trip() {
        let mut renderer = flat_renderer(64);
        let mut scene = Scene::new("s");
        let id = scene.add_mesh(tri_mesh("target", 0.0, false));
        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        // the triangle straddles the frame center
        let (hit, depth) = renderer.pick(32, 32);
        assert_eq!(hit, id);
        assert!(depth > f32::NEG_INFINITY);

        // a corner is background
        let (miss, miss_depth) = renderer.pick(0, 0);
        assert_eq!(miss, 0);
        assert_eq!(miss_depth, f32::NEG_INFINITY);
    }

    fn uv_quad(tex: usize) -> Mesh {
        let mut mesh = Mesh::new("quad");
        mesh.vertices = vec![
            Vec3::new(-4.0, -4.0, 0.0),
            Vec3::new(4.0, -4.0, 0.0),
            Vec3::new(4.0, 4.0, 0.0),
            Vec3::new(-4.0, 4.0, 0.0),
        ];
        mesh.set_index_stream(&[0, 1, 2, 3, -1]);
        mesh.uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        mesh.set_uv_index_stream(&[0, 1, 2, 3, -1]);
        mesh.texture = Some(tex);
        mesh
    }

    #[test]
    fn test_point_mode_draws_dot_blocks() {
        let mut renderer = flat_renderer(48);
        renderer.mode = RenderMode::Point;
        let mut scene = Scene::new("s");
        let id = scene.add_mesh(tri_mesh("dots", 0.0, false));
        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        // one 2x2 block per front-facing vertex
        let covered = covered_pixels(&renderer.fb, id);
        assert_eq!(covered.len(), 12);
        let w = renderer.fb.width;
        for &pix in &covered {
            let beside =
                covered.contains(&(pix + 1)) || covered.contains(&pix.wrapping_sub(1));
            let stacked =
                covered.contains(&(pix + w)) || covered.contains(&pix.wrapping_sub(w));
            assert!(beside && stacked, "pixel {} is not part of a 2x2 block", pix);
        }
    }

    #[test]
    fn test_smooth_shading_interpolates_across_bend() {
        let mut renderer = flat_renderer(64);
        renderer.mode = RenderMode::Smooth;
        let mut scene = Scene::new("s");
        // a quad facing the camera joined to one folded away at 45 degrees
        let mut mesh = Mesh::new("bend");
        mesh.vertices = vec![
            Vec3::new(-4.0, -4.0, 0.0),
            Vec3::new(4.0, -4.0, 0.0),
            Vec3::new(4.0, 4.0, 0.0),
            Vec3::new(-4.0, 4.0, 0.0),
            Vec3::new(8.0, -4.0, -4.0),
            Vec3::new(8.0, 4.0, -4.0),
        ];
        mesh.set_index_stream(&[0, 1, 2, 3, -1, 1, 4, 5, 2, -1]);
        mesh.material = Some(Material::new("gray", Color::BLACK, Color::new(200, 200, 200)));
        let id = scene.add_mesh(mesh);
        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        let rs: Vec<u8> = covered.iter().map(|&p| renderer.fb.color[p].r).collect();
        // the outer edge faces the camera fully, the fold is lit less
        assert_eq!(*rs.iter().max().unwrap(), 200);
        assert!(*rs.iter().min().unwrap() < 160);
        // vertex lighting interpolates into a gradient, not flat bands
        let distinct: std::collections::HashSet<u8> = rs.iter().copied().collect();
        assert!(distinct.len() > 4);
    }

    #[test]
    fn test_texture_smooth_modulates_ramp() {
        let mut renderer = flat_renderer(64);
        renderer.mode = RenderMode::TextureSmooth;
        let mut scene = Scene::new("s");
        let cell1 = Color::new(250, 0, 0);
        let cell2 = Color::new(0, 0, 250);
        let tex = scene.add_texture(Texture::checkerboard(8, 4, cell1, cell2));
        let mut mesh = uv_quad(tex);
        mesh.material = Some(Material::new("half", Color::BLACK, Color::new(128, 128, 128)));
        let id = scene.add_mesh(mesh);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        // every normal faces the camera, so each texel is modulated by the
        // top ramp entry
        let mut mat = Material::new("half", Color::BLACK, Color::new(128, 128, 128));
        let lit1 = mat.palette()[255].modulate(cell1);
        let lit2 = mat.palette()[255].modulate(cell2);
        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        let (mut seen1, mut seen2) = (false, false);
        for &pix in &covered {
            let c = renderer.fb.color[pix];
            if c == lit1 {
                seen1 = true;
            } else if c == lit2 {
                seen2 = true;
            } else {
                panic!("unexpected color {:?}", c);
            }
        }
        assert!(seen1 && seen2);
    }

    #[test]
    fn test_nearly_opaque_lit_texture_claims_depth() {
        let mut renderer = flat_renderer(48);
        renderer.mode = RenderMode::TextureFlat;
        renderer.fb.set_background(Color::BLACK, Color::BLACK);
        let mut scene = Scene::new("s");
        let tex_color = Color::new(80, 160, 240);
        let tex = scene.add_texture(Texture::new("solid", 4, vec![tex_color; 16]));
        let mut mesh = uv_quad(tex);
        let mut mat = Material::new("milk", Color::BLACK, Color::WHITE);
        // material opacity 252, texels fully opaque: combined opacity 251
        mat.transparency = 3.0 / 255.0;
        mesh.material = Some(mat);
        let id = scene.add_mesh(mesh);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        let mut expected_mat = Material::new("milk", Color::BLACK, Color::WHITE);
        let expected = expected_mat.palette()[255].modulate(tex_color);
        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        for pix in covered {
            // past the solid threshold nothing blends with the background
            // and the span claims depth
            assert_eq!(renderer.fb.color[pix], expected);
            assert!(renderer.fb.depth[pix] > f32::NEG_INFINITY);
        }
    }

    #[test]
    fn test_sphere_mapped_environment_lookup() {
        let mut renderer = flat_renderer(48);
        renderer.mode = RenderMode::TextureSmooth;
        let map = Texture::checkerboard(4, 2, Color::new(200, 40, 40), Color::new(40, 40, 200));
        // a +z normal lands at the center of the map: u = v = dim / 2
        let center_texel = map.texels[2 * 4 + 2];
        renderer.sphere_map = Some(map);

        let mut scene = Scene::new("s");
        let mut mesh = tri_mesh("shiny", 0.0, false);
        mesh.environment_cast = true;
        mesh.material = Some(Material::new("white", Color::BLACK, Color::WHITE));
        let id = scene.add_mesh(mesh);

        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        let mut mat = Material::new("white", Color::BLACK, Color::WHITE);
        let expected = mat.palette()[255].modulate(center_texel);
        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        for pix in covered {
            assert_eq!(renderer.fb.color[pix], expected);
        }
    }

    #[test]
    fn test_minified_texture_uses_coarser_mip() {
        let mut renderer = flat_renderer(64);
        renderer.mode = RenderMode::Texture;
        renderer.mipmapping = true;
        let mut scene = Scene::new("s");
        let tex = scene.add_texture(Texture::checkerboard(64, 1, Color::BLACK, Color::WHITE));
        let id = scene.add_mesh(uv_quad(tex));

        renderer.setup_scene(&mut scene);
        // shrink the quad to a few pixels so the texture is heavily minified
        renderer.zoom = 0.5;
        renderer.render_frame(&mut scene);

        let covered = covered_pixels(&renderer.fb, id);
        assert!(!covered.is_empty());
        // a 1x1-cell checkerboard box-filters to mid-gray on every level
        // below the base, so a coarse lookup never returns black or white
        for pix in covered {
            assert_eq!(renderer.fb.color[pix], Color::new(127, 127, 127));
        }
    }

    #[test]
    fn test_pick_maps_low_and_high_definitions() {
        for definition in [Definition::Low, Definition::High] {
            let mut renderer = Renderer::new(64, 64, definition);
            renderer.mode = RenderMode::Flat;
            let mut scene = Scene::new("s");
            let id = scene.add_mesh(tri_mesh("target", 0.0, false));
            renderer.setup_scene(&mut scene);
            renderer.render_frame(&mut scene);

            let (hit, depth) = renderer.pick(32, 32);
            assert_eq!(hit, id, "center miss under {:?}", definition);
            assert!(depth > f32::NEG_INFINITY);
            assert_eq!(renderer.pick(0, 0).0, 0);
        }
    }

    #[test]
    fn test_texture_without_uvs_sorts_opaque() {
        let mut scene = Scene::new("s");
        scene.add_mesh(tri_mesh("far", -2.0, false));
        let tex = scene.add_texture(Texture::new(
            "ghost",
            2,
            vec![Color::with_alpha(10, 10, 10, 100); 4],
        ));
        let mut near = tri_mesh("near", 2.0, false);
        // transparent texture attached, but no uv mapping to use it with
        near.texture = Some(tex);
        scene.add_mesh(near);
        scene.init();

        // both meshes count as opaque, so the nearer one draws first
        let order = composite_order(&scene, &Mat34::identity());
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_flat_quad_end_to_end() {
        let mut renderer = flat_renderer(64);
        let mut scene = Scene::new("s");
        let mut quad = Mesh::new("square");
        quad.vertices = vec![
            Vec3::new(-2.0, -2.0, 0.0),
            Vec3::new(2.0, -2.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(-2.0, 2.0, 0.0),
        ];
        quad.set_index_stream(&[0, 1, 2, 3, -1]);
        let id = scene.add_mesh(quad);

        // no material on the mesh: the renderer's default gold applies
        let expected = renderer.default_material.palette()[255];
        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);

        let covered = covered_pixels(&renderer.fb, id);
        // the square fills most of the frame as one solid rectangle
        assert!(covered.len() > 1000);
        for &pix in &covered {
            assert_eq!(renderer.fb.color[pix], expected);
        }
        // background pixels keep pick id 0 and stay at cleared depth
        for (i, &p) in renderer.fb.pick.iter().enumerate() {
            if p == 0 {
                assert_eq!(renderer.fb.depth[i], f32::NEG_INFINITY);
            }
        }
    }

    #[test]
    fn test_rotation_changes_coverage() {
        let mut renderer = flat_renderer(48);
        let mut scene = Scene::new("s");
        let id = scene.add_mesh(tri_mesh("spin", 0.0, false));
        renderer.setup_scene(&mut scene);
        renderer.render_frame(&mut scene);
        let before = covered_pixels(&renderer.fb, id).len();

        // rotate nearly edge-on; projected area must shrink
        renderer.rotate(80.0, 0.0, 0.0);
        renderer.render_frame(&mut scene);
        let after = covered_pixels(&renderer.fb, id).len();
        assert!(after < before);
    }
}
