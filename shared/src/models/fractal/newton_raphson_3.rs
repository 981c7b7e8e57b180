use complex_rs::complex::Complex;
use serde::{Deserialize, Serialize};

use super::fractal::Fractal;

const EPSILON: f64 = 1e-6;

/// Newton's method on `z^3 - 1`, shaded by how fast each start point converges.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct NewtonRaphsonZ3 {}

impl NewtonRaphsonZ3 {
    fn step(z: Complex) -> Complex {
        let fz = z.powi(3) - Complex::ONE;
        let dfz = Complex::from_real(3.0) * z * z;
        z - fz / dfz
    }

    fn convergence_value(pzn: f64, count: u32, nmax: u32) -> f64 {
        if count >= nmax || pzn <= 0.0 {
            return 1.0;
        }
        let accuracy = EPSILON.log10();
        0.5 - 0.5 * (0.1 * (count as f64 - pzn.log10() / accuracy)).cos()
    }
}

impl Fractal for NewtonRaphsonZ3 {
    fn generate(&self, max_iterations: u32, x: f64, y: f64) -> (f64, f64) {
        let mut z = Complex::new(x, y);
        let mut i = 0;
        while i < max_iterations {
            let next = Self::step(z);
            let converged = (next - z).arg_sq() < EPSILON;
            z = next;
            if converged || !z.re.is_finite() || !z.im.is_finite() {
                break;
            }
            i += 1;
        }
        let weight = Self::convergence_value(z.arg_sq(), i, max_iterations);
        (z.arg(), f64::from(i) * weight)
    }
}
