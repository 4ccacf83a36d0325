//! Surface materials and the shading ramp
//!
//! Lighting is a 256-entry precomputed ramp per material: entry `i` is the
//! surface color for a facing term of `i / 255`. The ramp is generated
//! lazily and memoized; mutate a material through `set_*` (or call
//! `invalidate`) so the cached ramp is rebuilt.

use crate::renderer::color::Color;
use serde::{Deserialize, Serialize};

/// Number of entries in a shading ramp.
pub const RAMP_SIZE: usize = 256;

/// Index where the specular-simulation ramp switches from the diffuse
/// segment to the highlight segment.
const SPECULAR_KNEE: usize = 204;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub ambient: Color,
    pub diffuse: Color,
    /// 0.0 fully opaque, 1.0 fully invisible.
    pub transparency: f32,
    /// Brighten the top of the ramp toward white to fake a highlight.
    pub simulate_specular: bool,
    #[serde(skip)]
    palette: Option<Box<[Color; RAMP_SIZE]>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: Color::BLACK,
            diffuse: Color::new(0x7f, 0x7f, 0x7f),
            transparency: 0.0,
            simulate_specular: false,
            palette: None,
        }
    }
}

impl Material {
    pub fn new(name: &str, ambient: Color, diffuse: Color) -> Self {
        Self {
            name: name.to_string(),
            ambient,
            diffuse,
            ..Default::default()
        }
    }

    /// Opacity on the blending scale: 255 minus the scaled transparency.
    pub fn opacity(&self) -> u8 {
        let trans = (self.transparency.clamp(0.0, 1.0) * 255.0) as u16;
        (255 - trans) as u8
    }

    pub fn set_ambient(&mut self, ambient: Color) {
        self.ambient = ambient;
        self.invalidate();
    }

    pub fn set_diffuse(&mut self, diffuse: Color) {
        self.diffuse = diffuse;
        self.invalidate();
    }

    pub fn set_simulate_specular(&mut self, on: bool) {
        self.simulate_specular = on;
        self.invalidate();
    }

    /// Drop the cached ramp so the next `palette` call regenerates it.
    pub fn invalidate(&mut self) {
        self.palette = None;
    }

    /// The shading ramp, generated on first use.
    pub fn palette(&mut self) -> &[Color; RAMP_SIZE] {
        if self.palette.is_none() {
            self.palette = Some(Box::new(self.generate_palette()));
        }
        self.palette.as_ref().unwrap()
    }

    fn generate_palette(&self) -> [Color; RAMP_SIZE] {
        let mut ramp = [Color::BLACK; RAMP_SIZE];
        for (i, entry) in ramp.iter_mut().enumerate() {
            *entry = Color::new(
                ramp_channel(i, self.ambient.r, self.diffuse.r, self.simulate_specular),
                ramp_channel(i, self.ambient.g, self.diffuse.g, self.simulate_specular),
                ramp_channel(i, self.ambient.b, self.diffuse.b, self.simulate_specular),
            );
        }
        ramp
    }
}

/// One channel of ramp entry `i`. Without specular simulation the channel
/// climbs linearly from ambient to ambient + diffuse over the full ramp so
/// the top entry reproduces the diffuse color exactly. With it, the diffuse
/// segment is compressed into the lower part and the remainder climbs from
/// the full diffuse value toward white.
fn ramp_channel(i: usize, ambient: u8, diffuse: u8, specular: bool) -> u8 {
    let a = ambient as f32;
    let d = diffuse as f32;
    let value = if !specular {
        a + (i as f32 * d / 256.0).ceil()
    } else if i < SPECULAR_KNEE {
        a + (i as f32 * d / SPECULAR_KNEE as f32).ceil()
    } else {
        a + d + ((i - SPECULAR_KNEE) as f32 * (255.0 - d) / 82.0).ceil()
    };
    value.min(255.0) as u8
}
