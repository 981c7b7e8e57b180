use serde::{Deserialize, Serialize};

use super::pixel::Pixel;

/// One vertical strip of the output image, counted from the left edge.
pub type ColumnIndex = u32;

/// The pixels of one finished column, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedColumn {
    pub column: ColumnIndex,
    pub pixels: Vec<Pixel>,
}

impl RenderedColumn {
    pub fn new(column: ColumnIndex, pixels: Vec<Pixel>) -> Self {
        Self { column, pixels }
    }

    pub fn height(&self) -> usize {
        self.pixels.len()
    }
}
