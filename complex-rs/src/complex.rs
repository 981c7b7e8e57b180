use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };
    pub const ONE: Complex = Complex { re: 1.0, im: 0.0 };

    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub fn from_real(re: f64) -> Self {
        Self { re, im: 0.0 }
    }

    /// Squared modulus, cheaper than `norm` for escape tests.
    pub fn arg_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    pub fn norm(self) -> f64 {
        self.arg_sq().sqrt()
    }

    /// Phase angle in `(-pi, pi]`.
    pub fn arg(self) -> f64 {
        self.im.atan2(self.re)
    }

    pub fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    pub fn powi(self, n: u32) -> Self {
        (0..n).fold(Self::ONE, |acc, _| acc * self)
    }

    pub fn sin(self) -> Self {
        let re = self.re.sin() * self.im.cosh();
        let im = self.re.cos() * self.im.sinh();
        Self { re, im }
    }
}

impl std::ops::Add for Complex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl std::ops::Sub for Complex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl std::ops::Mul for Complex {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Complex {
            re: self.re * rhs.re - self.im * rhs.im,
            im: self.re * rhs.im + self.im * rhs.re,
        }
    }
}

impl std::ops::Mul<f64> for Complex {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Complex {
            re: self.re * rhs,
            im: self.im * rhs,
        }
    }
}

impl std::ops::Div for Complex {
    type Output = Self;

    // Division by zero yields non-finite parts, same as f64.
    fn div(self, rhs: Self) -> Self {
        let denominator = rhs.arg_sq();
        let numerator = self * rhs.conj();
        Complex {
            re: numerator.re / denominator,
            im: numerator.im / denominator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Complex, b: Complex) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn division_inverts_multiplication() {
        let a = Complex::new(1.5, -2.0);
        let b = Complex::new(-0.25, 3.0);
        assert!(close((a * b) / b, a));
    }

    #[test]
    fn powi_matches_repeated_product() {
        let z = Complex::new(0.3, 0.7);
        assert!(close(z.powi(3), z * z * z));
        assert_eq!(z.powi(0), Complex::ONE);
    }

    #[test]
    fn arg_of_negative_imaginary_axis() {
        let z = Complex::new(0.0, -2.0);
        assert!((z.arg() + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(z.norm(), 2.0);
    }

    #[test]
    fn serializes_as_plain_pair() {
        let json = serde_json::to_string(&Complex::new(0.285, 0.013)).unwrap();
        assert_eq!(json, r#"{"re":0.285,"im":0.013}"#);
    }
}
