pub mod column;
pub mod fractal;
pub mod pixel;
pub mod point;
pub mod range;
pub mod resolution;
pub mod scene;
