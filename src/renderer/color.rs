//! Color handling
//!
//! Colors live as explicit 8-bit channel structs everywhere inside the
//! renderer; packed integers exist only at the framebuffer/texel boundaries
//! (24-bit `0xRRGGBB` for frame colors, 32-bit `0xAARRGGBB` for texels).

use serde::{Deserialize, Serialize};

/// RGBA color (0-255 per channel)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Unpack a 24-bit `0xRRGGBB` value; alpha is forced opaque.
    pub fn from_rgb24(packed: u32) -> Self {
        Self {
            r: ((packed >> 16) & 0xff) as u8,
            g: ((packed >> 8) & 0xff) as u8,
            b: (packed & 0xff) as u8,
            a: 255,
        }
    }

    /// Unpack a 32-bit `0xAARRGGBB` texel.
    pub fn from_argb32(packed: u32) -> Self {
        Self {
            r: ((packed >> 16) & 0xff) as u8,
            g: ((packed >> 8) & 0xff) as u8,
            b: (packed & 0xff) as u8,
            a: ((packed >> 24) & 0xff) as u8,
        }
    }

    /// Pack to 24-bit `0xRRGGBB`, dropping alpha.
    pub fn to_rgb24(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Pack to 32-bit `0xAARRGGBB`.
    pub fn to_argb32(self) -> u32 {
        (self.a as u32) << 24 | self.to_rgb24()
    }

    /// Linear interpolation between two colors, t in [0, 1].
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: (self.r as f32 + (other.r as f32 - self.r as f32) * t) as u8,
            g: (self.g as f32 + (other.g as f32 - self.g as f32) * t) as u8,
            b: (self.b as f32 + (other.b as f32 - self.b as f32) * t) as u8,
            a: (self.a as f32 + (other.a as f32 - self.a as f32) * t) as u8,
        }
    }

    /// Channel-wise modulation normalized by 255, as used when a shading
    /// ramp color multiplies a sampled texel.
    pub fn modulate(self, other: Color) -> Color {
        Color {
            r: ((self.r as u16 * other.r as u16) >> 8) as u8,
            g: ((self.g as u16 * other.g as u16) >> 8) as u8,
            b: ((self.b as u16 * other.b as u16) >> 8) as u8,
            a: self.a,
        }
    }

    /// Composite `self` over `back`: `opacity` and `255 - opacity` weight the
    /// foreground and background channels, normalized by 256.
    pub fn blend_over(self, back: Color, opacity: u8) -> Color {
        let opaci = opacity as u16;
        let trans = 255 - opaci;
        Color {
            r: ((back.r as u16 * trans + self.r as u16 * opaci) >> 8) as u8,
            g: ((back.g as u16 * trans + self.g as u16 * opaci) >> 8) as u8,
            b: ((back.b as u16 * trans + self.b as u16 * opaci) >> 8) as u8,
            a: 255,
        }
    }
}
