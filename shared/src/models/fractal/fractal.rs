pub trait Fractal {
    /// Iterates from the point `(x, y)` and returns `(zn, count)`: the final
    /// magnitude and a possibly fractional iteration count.
    fn generate(&self, max_iterations: u32, x: f64, y: f64) -> (f64, f64);

    /// Iteration count normalized to `[0, 1]`, ready for a palette.
    fn intensity(&self, max_iterations: u32, x: f64, y: f64) -> f64 {
        if max_iterations == 0 {
            return 0.0;
        }
        let (_, count) = self.generate(max_iterations, x, y);
        (count / max_iterations as f64).clamp(0.0, 1.0)
    }
}
