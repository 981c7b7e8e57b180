use complex_rs::complex::Complex;
use serde::{Deserialize, Serialize};

use super::fractal::Fractal;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Mandelbrot {}

impl Fractal for Mandelbrot {
    fn generate(&self, max_iterations: u32, x: f64, y: f64) -> (f64, f64) {
        let c = Complex::new(x, y);
        let mut z = Complex::ZERO;
        let mut i = 0;
        while i < max_iterations && z.arg_sq() < 4.0 {
            z = z * z + c;
            i += 1;
        }
        (z.arg_sq() / 4.0, i as f64)
    }
}
