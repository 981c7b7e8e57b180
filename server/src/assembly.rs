use std::path::PathBuf;

use farm_shared::models::column::RenderedColumn;
use image::{Rgb, RgbImage};
use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("could not write image: {0}")]
    Image(#[from] image::ImageError),

    #[error("expected {expected} columns, got {actual}")]
    Incomplete { expected: u32, actual: usize },
}

/// Every column of one job, sorted left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedImage {
    pub width: u32,
    pub height: u32,
    pub columns: Vec<RenderedColumn>,
}

impl FinishedImage {
    pub fn new(width: u32, height: u32, mut columns: Vec<RenderedColumn>) -> Self {
        columns.sort_unstable_by_key(|rendered| rendered.column);
        Self {
            width,
            height,
            columns,
        }
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage, AssemblyError> {
        if self.columns.len() != self.width as usize {
            return Err(AssemblyError::Incomplete {
                expected: self.width,
                actual: self.columns.len(),
            });
        }
        let mut image = RgbImage::new(self.width, self.height);
        for rendered in &self.columns {
            for (y, pixel) in rendered.pixels.iter().enumerate().take(self.height as usize) {
                image.put_pixel(rendered.column, y as u32, Rgb([pixel.r, pixel.g, pixel.b]));
            }
        }
        Ok(image)
    }
}

/// Receives the finished set once the last column comes back.
pub trait ImageSink: Send {
    fn write(&mut self, image: &FinishedImage) -> Result<(), AssemblyError>;
}

/// Writes the image to disk; the format follows the file extension.
pub struct PngSink {
    path: PathBuf,
}

impl PngSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ImageSink for PngSink {
    fn write(&mut self, image: &FinishedImage) -> Result<(), AssemblyError> {
        info!("Writing image to {}...", self.path.display());
        image.to_rgb_image()?.save(&self.path)?;
        info!("Image written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use farm_shared::models::pixel::Pixel;

    use super::*;

    fn column(column: u32, shade: u8) -> RenderedColumn {
        RenderedColumn::new(column, vec![Pixel::new(shade, shade, shade); 2])
    }

    #[test]
    fn columns_land_at_their_index() {
        let image = FinishedImage::new(3, 2, vec![column(2, 20), column(0, 0), column(1, 10)]);
        let rgb = image.to_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(0, 1), &Rgb([0, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([10, 10, 10]));
        assert_eq!(rgb.get_pixel(2, 1), &Rgb([20, 20, 20]));
    }

    #[test]
    fn missing_columns_are_refused() {
        let image = FinishedImage::new(3, 2, vec![column(0, 0)]);
        assert!(matches!(
            image.to_rgb_image(),
            Err(AssemblyError::Incomplete { expected: 3, actual: 1 })
        ));
    }

    #[test]
    fn png_sink_writes_a_readable_file() {
        let path = std::env::temp_dir().join(format!("farm-assembly-{}.png", std::process::id()));
        let image = FinishedImage::new(2, 2, vec![column(0, 1), column(1, 2)]);
        PngSink::new(path.clone()).write(&image).unwrap();
        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(1, 1), &Rgb([2, 2, 2]));
        let _ = std::fs::remove_file(path);
    }
}
