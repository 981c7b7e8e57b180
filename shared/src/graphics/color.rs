use serde::{Deserialize, Serialize};

use crate::models::pixel::Pixel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorPalette {
    #[default]
    Classic,
    Inverted,
    Grayscale,
}

impl ColorPalette {
    /// Maps a normalized intensity to a color. `t` is clamped to `[0, 1]`.
    pub fn calculate_color(self, t: f64) -> Pixel {
        let t = t.clamp(0.0, 1.0);
        match self {
            ColorPalette::Classic => classic_palette(t),
            ColorPalette::Inverted => {
                let Pixel { r, g, b } = classic_palette(t);
                Pixel::new(255 - r, 255 - g, 255 - b)
            }
            ColorPalette::Grayscale => {
                let intensity = (t * 255.0) as u8;
                Pixel::new(intensity, intensity, intensity)
            }
        }
    }
}

// Bernstein polynomials: dark at both ends, blue to orange in between.
fn classic_palette(t: f64) -> Pixel {
    let r = (9.0 * (1.0 - t) * t * t * t * 255.0) as u8;
    let g = (15.0 * (1.0 - t) * (1.0 - t) * t * t * 255.0) as u8;
    let b = (8.5 * (1.0 - t) * (1.0 - t) * (1.0 - t) * t * 255.0) as u8;
    Pixel::new(r, g, b)
}

/// Per-channel mean of a non-empty set of samples.
pub fn average(samples: &[Pixel]) -> Pixel {
    if samples.is_empty() {
        return Pixel::default();
    }
    let n = samples.len() as u32;
    let (r, g, b) = samples.iter().fold((0u32, 0u32, 0u32), |(r, g, b), p| {
        (r + u32::from(p.r), g + u32::from(p.g), b + u32::from(p.b))
    });
    Pixel::new((r / n) as u8, (g / n) as u8, (b / n) as u8)
}
