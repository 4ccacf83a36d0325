//! Software rendering pipeline: math, color, textures, framebuffers and the
//! scanline rasterizer itself.

pub mod color;
pub mod framebuffer;
pub mod math;
pub mod render;
pub mod texture;

pub use color::Color;
pub use framebuffer::{Definition, Framebuffer};
pub use math::{Mat34, Vec2, Vec3};
pub use render::{RenderMode, Renderer};
pub use texture::Texture;
