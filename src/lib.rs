//! soft3d: a software scanline renderer and interactive viewer for static
//! 3D mesh scenes.
//!
//! The pipeline is entirely CPU-side: an orthographic-with-zoom transform,
//! back-face culling, and a scanline rasterizer with seven render modes from
//! point sprites to sphere-mapped shading. Every pixel carries color, depth
//! and a mesh id, so the mesh under the cursor is a buffer read away.

pub mod loader;
pub mod renderer;
pub mod scene;
pub mod viewer;

pub use renderer::{Color, Definition, Mat34, RenderMode, Renderer, Texture, Vec2, Vec3};
pub use scene::{Material, Mesh, Scene};
pub use viewer::{PickInfo, Viewer};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
