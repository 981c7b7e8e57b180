use super::{
    fractal::Fractal, iterated_sin_z::IteratedSinZ, julia::Julia, mandelbrot::Mandelbrot,
    newton_raphson_3::NewtonRaphsonZ3,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FractalDescriptor {
    Julia(Julia),
    Mandelbrot(Mandelbrot),
    NewtonRaphsonZ3(NewtonRaphsonZ3),
    IteratedSinZ(IteratedSinZ),
}

impl Fractal for FractalDescriptor {
    fn generate(&self, max_iterations: u32, x: f64, y: f64) -> (f64, f64) {
        match self {
            FractalDescriptor::Julia(fractal) => fractal.generate(max_iterations, x, y),
            FractalDescriptor::Mandelbrot(fractal) => fractal.generate(max_iterations, x, y),
            FractalDescriptor::NewtonRaphsonZ3(fractal) => fractal.generate(max_iterations, x, y),
            FractalDescriptor::IteratedSinZ(fractal) => fractal.generate(max_iterations, x, y),
        }
    }
}
