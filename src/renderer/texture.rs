//! Texture storage and mip-map chain
//!
//! Texels are stored as a square power-of-two buffer so sampling can wrap
//! coordinates with a bitmask. An optional mip chain holds progressively
//! halved images together with precomputed area-ratio thresholds (4^level)
//! used to pick a minification level per triangle.

use super::color::Color;
use std::path::Path;

/// Square power-of-two texture with an optional mip chain.
#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    /// Base dimension; always a power of two.
    pub width: usize,
    /// Level 0 texels, row-major, `width * width` entries.
    pub texels: Vec<Color>,
    /// Mip chain including level 0; empty until `generate_mipmaps`.
    mip_levels: Vec<Vec<Color>>,
    /// `4^level` screen-to-texture area thresholds, parallel to `mip_levels`.
    mip_thresholds: Vec<f32>,
    /// True if any texel is not fully opaque.
    pub has_transparency: bool,
}

impl Texture {
    pub fn new(name: &str, width: usize, texels: Vec<Color>) -> Self {
        debug_assert!(width.is_power_of_two() && texels.len() == width * width);
        let has_transparency = texels.iter().any(|t| t.a != 255);
        Self {
            name: name.to_string(),
            width,
            texels,
            mip_levels: Vec::new(),
            mip_thresholds: Vec::new(),
            has_transparency,
        }
    }

    /// Decode an image file into a texture. The image is resampled onto a
    /// square power-of-two canvas (at most 512) first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self::from_image(&img, &name))
    }

    /// Decode raw image bytes (PNG/JPEG/BMP) into a texture.
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, String> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| format!("Failed to decode image: {}", e))?;
        Ok(Self::from_image(&img, name))
    }

    fn from_image(img: &image::DynamicImage, name: &str) -> Self {
        use image::imageops::FilterType;

        let largest = img.width().max(img.height()) as usize;
        let dim = match largest {
            0..=32 => 32,
            33..=64 => 64,
            65..=128 => 128,
            129..=256 => 256,
            _ => 512,
        };

        let rgba = img
            .resize_exact(dim as u32, dim as u32, FilterType::Triangle)
            .to_rgba8();
        let texels: Vec<Color> = rgba
            .pixels()
            .map(|p| Color::with_alpha(p[0], p[1], p[2], p[3]))
            .collect();
        Self::new(name, dim, texels)
    }

    /// Create a checkerboard test texture.
    pub fn checkerboard(width: usize, cell: usize, color1: Color, color2: Color) -> Self {
        let mut texels = Vec::with_capacity(width * width);
        for y in 0..width {
            for x in 0..width {
                let checker = ((x / cell) + (y / cell)) % 2 == 0;
                texels.push(if checker { color1 } else { color2 });
            }
        }
        Self::new("checkerboard", width, texels)
    }

    pub fn has_mipmaps(&self) -> bool {
        !self.mip_levels.is_empty()
    }

    /// Build the mip chain by repeated 2x2 box filtering, each channel
    /// (alpha included) averaged independently, down to 1x1.
    pub fn generate_mipmaps(&mut self) {
        if self.width <= 1 || self.has_mipmaps() {
            return;
        }

        self.mip_levels = vec![self.texels.clone()];
        self.mip_thresholds = vec![1.0];

        let num_levels = 1 + self.width.ilog2() as usize;
        let mut dim = self.width >> 1;
        for level in 1..num_levels {
            let upper = &self.mip_levels[level - 1];
            let upper_dim = dim << 1;
            let mut map = Vec::with_capacity(dim * dim);

            let mut src = 0;
            for _ in 0..dim {
                for _ in 0..dim {
                    let t0 = upper[src];
                    let t1 = upper[src + 1];
                    let t2 = upper[src + upper_dim];
                    let t3 = upper[src + upper_dim + 1];
                    map.push(Color {
                        r: ((t0.r as u16 + t1.r as u16 + t2.r as u16 + t3.r as u16) >> 2) as u8,
                        g: ((t0.g as u16 + t1.g as u16 + t2.g as u16 + t3.g as u16) >> 2) as u8,
                        b: ((t0.b as u16 + t1.b as u16 + t2.b as u16 + t3.b as u16) >> 2) as u8,
                        a: ((t0.a as u16 + t1.a as u16 + t2.a as u16 + t3.a as u16) >> 2) as u8,
                    });
                    src += 2;
                }
                src += upper_dim;
            }

            self.mip_levels.push(map);
            self.mip_thresholds.push(4.0f32.powi(level as i32));
            dim >>= 1;
        }
    }

    /// Pick a mip level for the given texture-to-screen area ratio: the
    /// smallest level whose successor threshold still exceeds the ratio,
    /// clamped to the coarsest (1x1) level. Returns the level's texel slice
    /// and its dimension. Falls back to the base image without a mip chain.
    pub fn select_level(&self, ratio: f32) -> (&[Color], usize) {
        if !self.has_mipmaps() {
            return (&self.texels, self.width);
        }

        let entries = &self.mip_thresholds;
        let last = entries.len() - 1;
        if ratio < entries[1] {
            return (&self.mip_levels[0], self.width);
        }
        if ratio >= entries[last] {
            return (&self.mip_levels[last], 1);
        }

        let mut level = 0;
        let mut dim = self.width;
        while ratio >= entries[level + 1] {
            level += 1;
            dim /= 2;
        }
        (&self.mip_levels[level], dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: usize, c: Color) -> Texture {
        Texture::new("solid", width, vec![c; width * width])
    }

    #[test]
    fn test_transparency_flag() {
        let opaque = solid(4, Color::new(10, 20, 30));
        assert!(!opaque.has_transparency);

        let mut texels = vec![Color::WHITE; 16];
        texels[7] = Color::with_alpha(1, 2, 3, 254);
        let translucent = Texture::new("t", 4, texels);
        assert!(translucent.has_transparency);
    }

    #[test]
    fn test_mip_chain_reaches_one_texel() {
        let mut tex = solid(8, Color::new(100, 150, 200));
        tex.generate_mipmaps();
        assert!(tex.has_mipmaps());
        // 8x8 -> 4x4 -> 2x2 -> 1x1
        let (data, dim) = tex.select_level(f32::MAX);
        assert_eq!(dim, 1);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0], Color::new(100, 150, 200));
    }

    #[test]
    fn test_box_filter_averages_channels() {
        let texels = vec![
            Color::new(0, 0, 0),
            Color::new(255, 255, 255),
            Color::new(255, 255, 255),
            Color::new(0, 0, 0),
        ];
        let mut tex = Texture::new("avg", 2, texels);
        tex.generate_mipmaps();
        let (data, dim) = tex.select_level(4.0);
        assert_eq!(dim, 1);
        // (0 + 255 + 255 + 0) >> 2 == 127
        assert_eq!(data[0], Color::new(127, 127, 127));
    }

    #[test]
    fn test_level_selection_is_monotonic() {
        let mut tex = solid(64, Color::WHITE);
        tex.generate_mipmaps();
        let mut last_dim = usize::MAX;
        for ratio in [0.5, 1.0, 3.9, 4.0, 15.0, 16.0, 64.0, 1e6] {
            let (_, dim) = tex.select_level(ratio);
            assert!(dim <= last_dim, "dim grew at ratio {}", ratio);
            last_dim = dim;
        }
    }

    #[test]
    fn test_threshold_boundaries() {
        let mut tex = solid(16, Color::WHITE);
        tex.generate_mipmaps();
        assert_eq!(tex.select_level(3.99).1, 16); // below 4^1 stays at base
        assert_eq!(tex.select_level(4.0).1, 8);
        assert_eq!(tex.select_level(16.0).1, 4);
    }

    #[test]
    fn test_checkerboard_pattern() {
        let tex = Texture::checkerboard(8, 4, Color::BLACK, Color::WHITE);
        assert_eq!(tex.texels[0], Color::BLACK);
        assert_eq!(tex.texels[4], Color::WHITE);
        assert_eq!(tex.texels[4 * 8], Color::WHITE);
    }
}
