//! The scene every worker renders from. The master serializes it once into
//! the snapshot; workers decode it and share it read-only.

use std::{fs, path::Path};

use complex_rs::complex::Complex;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graphics::color::{average, ColorPalette};

use super::{
    column::{ColumnIndex, RenderedColumn},
    fractal::{fractal::Fractal, fractal_descriptor::FractalDescriptor, julia::Julia},
    point::Point,
    range::Range,
    resolution::Resolution,
};

/// Upper bound on `samples`; each pixel costs `samples * samples` evaluations.
pub const MAX_SAMPLES: u32 = 16;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("could not read scene file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scene description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scene: {0}")]
    Invalid(&'static str),
}

/// Anything that can turn a column index into pixels.
///
/// Implementations must be pure apart from `rng`: the same column and the
/// same random stream give the same pixels.
pub trait ColumnRenderer {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn render_column(&self, column: ColumnIndex, rng: &mut StdRng) -> RenderedColumn;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub resolution: Resolution,
    pub range: Range,
    pub fractal: FractalDescriptor,
    pub max_iterations: u32,
    /// Antialiasing samples per pixel side; `samples * samples` rays per pixel.
    #[serde(default = "default_samples")]
    pub samples: u32,
    #[serde(default)]
    pub palette: ColorPalette,
}

fn default_samples() -> u32 {
    1
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            resolution: Resolution::new(800, 600),
            range: Range::new(Point::new(-1.6, -1.2), Point::new(1.6, 1.2)),
            fractal: FractalDescriptor::Julia(Julia::new(Complex::new(0.285, 0.013), 4.0)),
            max_iterations: 256,
            samples: 2,
            palette: ColorPalette::Classic,
        }
    }
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let scene: Scene = serde_json::from_str(&fs::read_to_string(path)?)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        if self.resolution.nx == 0 || self.resolution.ny == 0 {
            return Err(SceneError::Invalid("resolution must be at least 1x1"));
        }
        if self.samples == 0 {
            return Err(SceneError::Invalid("samples must be at least 1"));
        }
        if self.samples > MAX_SAMPLES {
            return Err(SceneError::Invalid("samples must be at most 16"));
        }
        if self.range.width() <= 0.0 || self.range.height() <= 0.0 {
            return Err(SceneError::Invalid("range max must exceed range min"));
        }
        Ok(())
    }

    fn sample(&self, x: f64, y: f64) -> super::pixel::Pixel {
        let re = self.range.min.x + x / self.resolution.nx as f64 * self.range.width();
        // Row 0 is the top of the image.
        let im = self.range.max.y - y / self.resolution.ny as f64 * self.range.height();
        self.palette
            .calculate_color(self.fractal.intensity(self.max_iterations, re, im))
    }
}

impl ColumnRenderer for Scene {
    fn width(&self) -> u32 {
        self.resolution.nx
    }

    fn height(&self) -> u32 {
        self.resolution.ny
    }

    fn render_column(&self, column: ColumnIndex, rng: &mut StdRng) -> RenderedColumn {
        let grid = self.samples.clamp(1, MAX_SAMPLES);
        let cell = 1.0 / grid as f64;
        let mut samples = Vec::with_capacity((grid * grid) as usize);

        let pixels = (0..self.resolution.ny)
            .map(|y| {
                if grid == 1 {
                    return self.sample(column as f64 + 0.5, y as f64 + 0.5);
                }
                samples.clear();
                for sx in 0..grid {
                    for sy in 0..grid {
                        let dx = (sx as f64 + rng.gen::<f64>()) * cell;
                        let dy = (sy as f64 + rng.gen::<f64>()) * cell;
                        samples.push(self.sample(column as f64 + dx, y as f64 + dy));
                    }
                }
                average(&samples)
            })
            .collect();

        RenderedColumn::new(column, pixels)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::models::fractal::mandelbrot::Mandelbrot;

    fn small_scene(samples: u32) -> Scene {
        Scene {
            resolution: Resolution::new(8, 5),
            range: Range::new(Point::new(-2.0, -1.0), Point::new(1.0, 1.0)),
            fractal: FractalDescriptor::Mandelbrot(Mandelbrot {}),
            max_iterations: 32,
            samples,
            palette: ColorPalette::Grayscale,
        }
    }

    #[test]
    fn column_height_matches_resolution() {
        let scene = small_scene(1);
        let mut rng = StdRng::seed_from_u64(1);
        let rendered = scene.render_column(3, &mut rng);
        assert_eq!(rendered.column, 3);
        assert_eq!(rendered.height(), 5);
    }

    #[test]
    fn same_stream_same_pixels() {
        let scene = small_scene(3);
        let a = scene.render_column(2, &mut StdRng::seed_from_u64(9));
        let b = scene.render_column(2, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn single_sample_ignores_the_stream() {
        let scene = small_scene(1);
        let a = scene.render_column(6, &mut StdRng::seed_from_u64(1));
        let b = scene.render_column(6, &mut StdRng::seed_from_u64(2));
        assert_eq!(a, b);
    }

    #[test]
    fn validation_rejects_degenerate_scenes() {
        let mut scene = small_scene(1);
        scene.samples = 0;
        assert!(matches!(scene.validate(), Err(SceneError::Invalid(_))));

        let mut scene = small_scene(1);
        scene.resolution.nx = 0;
        assert!(scene.validate().is_err());

        let mut scene = small_scene(MAX_SAMPLES);
        scene.validate().unwrap();
        scene.samples = u32::MAX;
        assert!(matches!(scene.validate(), Err(SceneError::Invalid(_))));
    }

    #[test]
    fn oversized_samples_are_clamped_when_rendering() {
        let mut scene = small_scene(1);
        scene.resolution.ny = 1;
        scene.samples = u32::MAX;
        let rendered = scene.render_column(0, &mut StdRng::seed_from_u64(5));
        assert_eq!(rendered.height(), 1);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{
            "resolution": {"nx": 4, "ny": 4},
            "range": {"min": {"x": -1.0, "y": -1.0}, "max": {"x": 1.0, "y": 1.0}},
            "fractal": {"Mandelbrot": {}},
            "max_iterations": 16
        }"#;
        let scene: Scene = serde_json::from_str(json).unwrap();
        assert_eq!(scene.samples, 1);
        assert_eq!(scene.palette, ColorPalette::Classic);
        scene.validate().unwrap();
    }
}
