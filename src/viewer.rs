//! Frame scheduling and interaction state
//!
//! The viewer wraps a renderer and decides when work actually happens. Two
//! dirty flags drive it: `needs_update` re-renders the scene, `needs_repaint`
//! only re-presents the existing frame (after a definition change, say).
//! `tick` performs at most one render per call no matter how many requests
//! accumulated between ticks.
//!
//! Scene loads are asynchronous from the viewer's point of view. `begin_load`
//! hands out a generation token; `finish_load` installs the scene only if no
//! newer load has started since, so a slow earlier load can never clobber a
//! later one.

use crate::renderer::{Definition, RenderMode, Renderer, Texture};
use crate::scene::Scene;

/// Degrees of rotation per drag across the full frame.
const FULL_DRAG_DEGREES: f32 = 360.0;
/// Zoom multipliers per wheel/zoom-drag notch.
const ZOOM_IN_FACTOR: f32 = 1.11;
const ZOOM_OUT_FACTOR: f32 = 0.9;

/// Token identifying one scene-load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// Result of a pick query, resolved against the current scene.
#[derive(Debug, Clone, PartialEq)]
pub struct PickInfo {
    pub mesh_id: u32,
    pub mesh_name: String,
    pub depth: f32,
}

pub struct Viewer {
    pub renderer: Renderer,
    pub scene: Option<Scene>,
    needs_update: bool,
    needs_repaint: bool,
    load_generation: u64,
    frame_bytes: Vec<u8>,
}

impl Viewer {
    pub fn new(out_width: usize, out_height: usize, definition: Definition) -> Self {
        Self {
            renderer: Renderer::new(out_width, out_height, definition),
            scene: None,
            needs_update: true,
            needs_repaint: false,
            load_generation: 0,
            frame_bytes: Vec::new(),
        }
    }

    /// Ask for a full re-render on the next tick.
    pub fn request_frame(&mut self) {
        self.needs_update = true;
    }

    /// Ask for a re-present of the current buffers on the next tick.
    pub fn request_repaint(&mut self) {
        self.needs_repaint = true;
    }

    /// Do at most one unit of pending work. Returns true when the output
    /// bytes changed.
    pub fn tick(&mut self) -> bool {
        if !self.needs_update && !self.needs_repaint {
            return false;
        }
        if self.needs_update {
            if let Some(scene) = self.scene.as_mut() {
                self.renderer.render_frame(scene);
            } else {
                self.renderer.fb.clear();
            }
        }
        self.renderer.fb.present(&mut self.frame_bytes);
        self.needs_update = false;
        self.needs_repaint = false;
        true
    }

    /// The last presented frame as RGBA bytes at the output resolution.
    pub fn frame_bytes(&self) -> &[u8] {
        &self.frame_bytes
    }

    /// Start a scene load, invalidating every earlier in-flight load.
    pub fn begin_load(&mut self) -> LoadToken {
        self.load_generation += 1;
        LoadToken(self.load_generation)
    }

    /// Install a loaded scene, unless a newer load superseded this one.
    /// Returns whether the scene was accepted.
    pub fn finish_load(&mut self, token: LoadToken, scene: Scene) -> bool {
        if token.0 != self.load_generation {
            return false;
        }
        self.replace_scene(scene);
        true
    }

    /// Install a scene directly, fitting zoom and resetting the rotation.
    pub fn replace_scene(&mut self, mut scene: Scene) {
        self.renderer.setup_scene(&mut scene);
        self.scene = Some(scene);
        self.needs_update = true;
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if self.renderer.mode != mode {
            self.renderer.mode = mode;
            self.needs_update = true;
        }
    }

    /// Switch working resolution; the current scene only needs a re-render,
    /// not a reload.
    pub fn set_definition(&mut self, definition: Definition) {
        self.renderer.set_definition(definition);
        self.needs_update = true;
    }

    pub fn set_sphere_map(&mut self, mut map: Texture) {
        if self.renderer.mipmapping {
            map.generate_mipmaps();
        }
        self.renderer.sphere_map = Some(map);
        self.needs_update = true;
    }

    /// Rotate in response to a drag of `(dx, dy)` output pixels: a drag
    /// across the whole frame turns the model a full revolution.
    pub fn drag_rotate(&mut self, dx: f32, dy: f32) {
        let w = self.renderer.fb.out_width as f32;
        let h = self.renderer.fb.out_height as f32;
        let ry = FULL_DRAG_DEGREES * dx / w;
        let rx = FULL_DRAG_DEGREES * dy / h;
        self.renderer.rotate(rx, ry, 0.0);
        self.needs_update = true;
    }

    /// Zoom one notch in or out.
    pub fn zoom_step(&mut self, zoom_in: bool) {
        self.renderer.zoom *= if zoom_in { ZOOM_IN_FACTOR } else { ZOOM_OUT_FACTOR };
        self.needs_update = true;
    }

    /// Resolve the mesh under an output-surface coordinate.
    pub fn pick(&self, out_x: usize, out_y: usize) -> Option<PickInfo> {
        let (id, depth) = self.renderer.pick(out_x, out_y);
        if id == 0 {
            return None;
        }
        let scene = self.scene.as_ref()?;
        let mesh = scene.mesh_by_id(id)?;
        Some(PickInfo {
            mesh_id: id,
            mesh_name: mesh.name.clone(),
            depth,
        })
    }
}
