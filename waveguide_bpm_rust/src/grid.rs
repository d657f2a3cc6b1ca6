use crate::error::{BpmError, Result};

/// Relative tolerance on the spacing of a uniform axis.
const UNIFORM_TOL: f64 = 1e-6;

/// Transverse (`x`) and propagation (`z`) sample axes.
///
/// Both axes are strictly increasing and uniformly spaced; `dx` and `dz` are
/// the step of the respective axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub x: Vec<f64>,
    pub z: Vec<f64>,
    pub dx: f64,
    pub dz: f64,
}

impl Grid {
    pub fn new(x: Vec<f64>, z: Vec<f64>) -> Result<Self> {
        let dx = uniform_step("x", &x)?;
        let dz = uniform_step("z", &z)?;
        Ok(Grid { x, z, dx, dz })
    }

    /// Linearly spaced axes with both endpoints included.
    pub fn uniform(
        x_min: f64,
        x_max: f64,
        nx: usize,
        z_min: f64,
        z_max: f64,
        nz: usize,
    ) -> Result<Self> {
        Grid::new(linspace(x_min, x_max, nx), linspace(z_min, z_max, nz))
    }

    pub fn nx(&self) -> usize {
        self.x.len()
    }

    pub fn nz(&self) -> usize {
        self.z.len()
    }

    pub fn x_extent(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }
}

fn uniform_step(axis: &'static str, v: &[f64]) -> Result<f64> {
    if v.len() < 2 {
        return Err(BpmError::invalid(axis, format!("{} samples", v.len()), "needs at least two samples"));
    }
    let step = v[1] - v[0];
    if !(step > 0.0) || !step.is_finite() {
        return Err(BpmError::invalid(axis, step, "spacing must be positive and finite"));
    }
    for pair in v.windows(2) {
        let d = pair[1] - pair[0];
        if (d - step).abs() > UNIFORM_TOL * step {
            return Err(BpmError::invalid(axis, d, "axis must be uniformly spaced and strictly increasing"));
        }
    }
    Ok(step)
}

pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (n as f64 - 1.0);
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// Trapezoidal integral of samples `y` over the (possibly non-uniform) abscissa `x`.
///
/// `y` and `x` pair up index by index; samples past the shorter of the two are
/// ignored.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    y.windows(2)
        .zip(x.windows(2))
        .map(|(yy, xx)| (yy[0] + yy[1]) * (xx[1] - xx[0]) / 2.0)
        .sum()
}
