//! Absorbing side boundaries.

use nalgebra::DVector;

use crate::error::{BpmError, Result};

pub const DEFAULT_STRENGTH: f64 = 0.5;
pub const DEFAULT_ORDER: i32 = 2;

pub trait DampingProfile: Send + Sync {
    /// Field-amplitude loss rate per unit propagation length at `x`.
    fn sigma(&self, x: f64) -> f64;
}

pub fn sample_damping(profile: &dyn DampingProfile, x: &[f64]) -> DVector<f64> {
    DVector::from_iterator(x.len(), x.iter().map(|&xi| profile.sigma(xi)))
}

/// Lossless boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDamping;

impl DampingProfile for NoDamping {
    fn sigma(&self, _x: f64) -> f64 {
        0.0
    }
}

/// Loss layers of `thickness` at both transverse edges of `[x_min, x_max]`,
/// graded as `strength * (depth / thickness)^order`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialAbsorber {
    pub x_min: f64,
    pub x_max: f64,
    pub thickness: f64,
    pub strength: f64,
    pub order: i32,
}

impl PolynomialAbsorber {
    pub fn new(x_min: f64, x_max: f64, thickness: f64, strength: f64, order: i32) -> Result<Self> {
        if !(x_max > x_min) {
            return Err(BpmError::invalid("x_max", x_max, "window must have positive width"));
        }
        if !(thickness > 0.0) || thickness > (x_max - x_min) / 2.0 {
            return Err(BpmError::invalid(
                "thickness",
                thickness,
                "must be positive and at most half the window",
            ));
        }
        if !(strength >= 0.0) {
            return Err(BpmError::invalid("strength", strength, "must be non-negative"));
        }
        if order < 1 {
            return Err(BpmError::invalid("order", order, "must be at least 1"));
        }
        Ok(PolynomialAbsorber {
            x_min,
            x_max,
            thickness,
            strength,
            order,
        })
    }

    /// Layers of `max(10% of the window, 2 wavelengths)`, capped at half the window.
    pub fn for_domain(x_min: f64, x_max: f64, wavelength: f64) -> Result<Self> {
        let width = x_max - x_min;
        let thickness = (0.1 * width).max(2.0 * wavelength).min(width / 2.0);
        PolynomialAbsorber::new(x_min, x_max, thickness, DEFAULT_STRENGTH, DEFAULT_ORDER)
    }
}

impl DampingProfile for PolynomialAbsorber {
    fn sigma(&self, x: f64) -> f64 {
        let depth = (self.x_min + self.thickness - x).max(x - (self.x_max - self.thickness));
        if depth <= 0.0 {
            return 0.0;
        }
        self.strength * (depth.min(self.thickness) / self.thickness).powi(self.order)
    }
}
