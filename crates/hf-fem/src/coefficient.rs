//! Scalar and vector coefficients evaluated at a point and a time.

use nalgebra::{Point2, Vector2};

/// Scalar field `f(x, t)`.
pub trait Coefficient: Send + Sync {
    fn eval(&self, x: &Point2<f64>, t: f64) -> f64;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantCoefficient(pub f64);

impl Coefficient for ConstantCoefficient {
    fn eval(&self, _x: &Point2<f64>, _t: f64) -> f64 {
        self.0
    }
}

/// Closure-backed coefficient. Time-independent closures ignore `t`.
pub struct FunctionCoefficient {
    f: Box<dyn Fn(&Point2<f64>, f64) -> f64 + Send + Sync>,
}

impl FunctionCoefficient {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Point2<f64>, f64) -> f64 + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }

    pub fn time_independent<F>(f: F) -> Self
    where
        F: Fn(&Point2<f64>) -> f64 + Send + Sync + 'static,
    {
        Self::new(move |x, _| f(x))
    }
}

impl Coefficient for FunctionCoefficient {
    fn eval(&self, x: &Point2<f64>, t: f64) -> f64 {
        (self.f)(x, t)
    }
}

impl std::fmt::Debug for FunctionCoefficient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FunctionCoefficient(..)")
    }
}

/// Vector field `b(x, t)`.
pub trait VectorCoefficient: Send + Sync {
    fn eval(&self, x: &Point2<f64>, t: f64) -> Vector2<f64>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantVectorCoefficient(pub Vector2<f64>);

impl ConstantVectorCoefficient {
    pub fn new(bx: f64, by: f64) -> Self {
        Self(Vector2::new(bx, by))
    }
}

impl VectorCoefficient for ConstantVectorCoefficient {
    fn eval(&self, _x: &Point2<f64>, _t: f64) -> Vector2<f64> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_coefficient_sees_time() {
        let c = FunctionCoefficient::new(|x, t| x[0] + t);
        assert_eq!(c.eval(&Point2::new(1.0, 0.0), 2.0), 3.0);
        let s = FunctionCoefficient::time_independent(|x| x[1]);
        assert_eq!(s.eval(&Point2::new(0.0, 4.0), 99.0), 4.0);
    }
}
