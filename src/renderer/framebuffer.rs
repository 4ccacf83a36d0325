//! Working-resolution framebuffers
//!
//! The renderer draws into buffers at an internal "working resolution" that
//! may differ from the output surface: half size for speed, double size for
//! quality (box-filtered down on present). Color, depth and pick ids are
//! written in lockstep; depth uses a greater-is-nearer convention and is
//! cleared to negative infinity.

use super::color::Color;
use serde::{Deserialize, Serialize};

/// Working-resolution mode relative to the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Definition {
    /// Half the linear output dimensions (rounded up); pixels doubled on present.
    Low,
    /// 1:1 with the output surface.
    Standard,
    /// Double the linear output dimensions; 2x2 box-averaged on present.
    High,
}

impl Definition {
    fn frame_size(self, out_w: usize, out_h: usize) -> (usize, usize) {
        match self {
            Definition::Low => ((out_w + 1) / 2, (out_h + 1) / 2),
            Definition::Standard => (out_w, out_h),
            Definition::High => (out_w * 2, out_h * 2),
        }
    }
}

/// Color/depth/pick buffers plus the precomputed background gradient.
pub struct Framebuffer {
    pub out_width: usize,
    pub out_height: usize,
    pub definition: Definition,
    pub width: usize,
    pub height: usize,
    pub color: Vec<Color>,
    pub depth: Vec<f32>,
    pub pick: Vec<u32>,
    background: Vec<Color>,
    bkg_top: Color,
    bkg_bottom: Color,
}

impl Framebuffer {
    pub fn new(out_width: usize, out_height: usize, definition: Definition) -> Self {
        // a tiny surface cannot be meaningfully halved or doubled
        let definition = if out_width <= 2 || out_height <= 2 {
            Definition::Standard
        } else {
            definition
        };
        let (width, height) = definition.frame_size(out_width, out_height);
        let size = width * height;
        let mut fb = Self {
            out_width,
            out_height,
            definition,
            width,
            height,
            color: vec![Color::BLACK; size],
            depth: vec![f32::NEG_INFINITY; size],
            pick: vec![0; size],
            background: vec![Color::BLACK; size],
            bkg_top: Color::WHITE,
            bkg_bottom: Color::from_rgb24(0xffff80),
        };
        fb.generate_background();
        fb
    }

    /// Switch working-resolution mode. Returns the factor by which the
    /// caller's zoom should be scaled to keep the apparent size stable.
    pub fn set_definition(&mut self, definition: Definition) -> f32 {
        let definition = if self.out_width <= 2 || self.out_height <= 2 {
            Definition::Standard
        } else {
            definition
        };
        if definition == self.definition {
            return 1.0;
        }

        let old_width = self.width;
        self.definition = definition;
        let (w, h) = definition.frame_size(self.out_width, self.out_height);
        self.width = w;
        self.height = h;
        let size = w * h;
        self.color.resize(size, Color::BLACK);
        self.depth.resize(size, f32::NEG_INFINITY);
        self.pick.resize(size, 0);
        self.background.resize(size, Color::BLACK);
        self.generate_background();

        self.width as f32 / old_width as f32
    }

    /// Set the two endpoint colors of the vertical background gradient.
    pub fn set_background(&mut self, top: Color, bottom: Color) {
        self.bkg_top = top;
        self.bkg_bottom = bottom;
        self.generate_background();
    }

    fn generate_background(&mut self) {
        let h = self.height;
        for y in 0..h {
            let row = self.bkg_top.lerp(self.bkg_bottom, y as f32 / h as f32);
            let base = y * self.width;
            for px in &mut self.background[base..base + self.width] {
                *px = row;
            }
        }
    }

    /// Reset for a new frame: background gradient into color, depth to
    /// negative infinity, pick ids to 0 ("no mesh").
    pub fn clear(&mut self) {
        self.color.copy_from_slice(&self.background);
        for z in &mut self.depth {
            *z = f32::NEG_INFINITY;
        }
        for id in &mut self.pick {
            *id = 0;
        }
    }

    /// Resample the working-resolution color buffer into output-surface RGBA
    /// bytes (R,G,B order, alpha forced opaque). `out` is resized as needed.
    pub fn present(&self, out: &mut Vec<u8>) {
        out.resize(self.out_width * self.out_height * 4, 0);
        let fw = self.width;

        match self.definition {
            Definition::Low => {
                let mut dest = 0;
                for y in 0..self.out_height {
                    let base = (y >> 1) * fw;
                    for x in 0..self.out_width {
                        let c = self.color[base + (x >> 1)];
                        out[dest] = c.r;
                        out[dest + 1] = c.g;
                        out[dest + 2] = c.b;
                        out[dest + 3] = 0xff;
                        dest += 4;
                    }
                }
            }
            Definition::Standard => {
                for (c, px) in self.color.iter().zip(out.chunks_exact_mut(4)) {
                    px[0] = c.r;
                    px[1] = c.g;
                    px[2] = c.b;
                    px[3] = 0xff;
                }
            }
            Definition::High => {
                let mut dest = 0;
                for y in 0..self.out_height {
                    let base = (y * 2) * fw;
                    for x in 0..self.out_width {
                        let src = base + x * 2;
                        let c0 = self.color[src];
                        let c1 = self.color[src + 1];
                        let c2 = self.color[src + fw];
                        let c3 = self.color[src + fw + 1];
                        out[dest] =
                            ((c0.r as u16 + c1.r as u16 + c2.r as u16 + c3.r as u16) >> 2) as u8;
                        out[dest + 1] =
                            ((c0.g as u16 + c1.g as u16 + c2.g as u16 + c3.g as u16) >> 2) as u8;
                        out[dest + 2] =
                            ((c0.b as u16 + c1.b as u16 + c2.b as u16 + c3.b as u16) >> 2) as u8;
                        out[dest + 3] = 0xff;
                        dest += 4;
                    }
                }
            }
        }
    }

    /// Map an output-surface coordinate to the working-resolution pixel and
    /// read back (mesh id, depth). Id 0 means "no mesh".
    pub fn pick_at(&self, out_x: usize, out_y: usize) -> (u32, f32) {
        if out_x >= self.out_width || out_y >= self.out_height {
            return (0, f32::NEG_INFINITY);
        }
        let (fx, fy) = match self.definition {
            Definition::Low => (out_x / 2, out_y / 2),
            Definition::Standard => (out_x, out_y),
            Definition::High => (out_x * 2, out_y * 2),
        };
        let idx = fy * self.width + fx;
        (self.pick[idx], self.depth[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_state() {
        let mut fb = Framebuffer::new(8, 8, Definition::Standard);
        fb.color[10] = Color::new(1, 2, 3);
        fb.depth[10] = 5.0;
        fb.pick[10] = 7;
        fb.clear();
        assert!(fb.depth.iter().all(|&z| z == f32::NEG_INFINITY));
        assert!(fb.pick.iter().all(|&id| id == 0));
        assert_eq!(fb.pick_at(3, 3), (0, f32::NEG_INFINITY));
    }

    #[test]
    fn test_low_mode_rounds_up_and_duplicates() {
        let mut fb = Framebuffer::new(5, 5, Definition::Low);
        assert_eq!((fb.width, fb.height), (3, 3));
        fb.set_background(Color::new(40, 40, 40), Color::new(40, 40, 40));
        fb.clear();
        let mut out = Vec::new();
        fb.present(&mut out);
        assert_eq!(out.len(), 5 * 5 * 4);
        // every 2x2 output block maps to one working pixel
        for y in 0..4 {
            for x in 0..4 {
                let a = &out[(y * 5 + x) * 4..(y * 5 + x) * 4 + 3];
                let b = &out[((y | 1) * 5 + (x | 1)) * 4..((y | 1) * 5 + (x | 1)) * 4 + 3];
                if y & 1 == 0 && x & 1 == 0 {
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_high_mode_flat_field_round_trip() {
        let mut fb = Framebuffer::new(4, 4, Definition::High);
        assert_eq!((fb.width, fb.height), (8, 8));
        let c = Color::new(120, 60, 200);
        fb.set_background(c, c);
        fb.clear();
        let mut out = Vec::new();
        fb.present(&mut out);
        for px in out.chunks_exact(4) {
            assert_eq!(px, &[120, 60, 200, 0xff]);
        }
    }

    #[test]
    fn test_background_gradient_monotonic() {
        let mut fb = Framebuffer::new(4, 16, Definition::Standard);
        fb.set_background(Color::new(0, 0, 0), Color::new(255, 255, 255));
        fb.clear();
        let mut last = 0;
        for y in 0..16 {
            let c = fb.color[y * 4];
            assert!(c.r >= last);
            last = c.r;
        }
    }

    #[test]
    fn test_set_definition_scales_zoom() {
        let mut fb = Framebuffer::new(10, 10, Definition::Standard);
        let factor = fb.set_definition(Definition::High);
        assert_eq!(factor, 2.0);
        assert_eq!((fb.width, fb.height), (20, 20));
        let back = fb.set_definition(Definition::Standard);
        assert_eq!(back, 0.5);
    }

    #[test]
    fn test_tiny_surface_forces_standard() {
        let fb = Framebuffer::new(2, 2, Definition::High);
        assert_eq!(fb.definition, Definition::Standard);
    }
}
