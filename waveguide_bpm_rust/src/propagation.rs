//! Paraxial beam propagation with a classic four-stage Runge-Kutta march.
//!
//! Each axial step advances one transverse slice under
//!
//! ```text
//! dE/dz = i/(2 k0 n0) d2E/dx2 + i k0/(2 n0) (n_r^2 - n0^2) E - sigma(x) E
//! ```
//!
//! with a centred second difference that wraps periodically at the transverse
//! edges. All four stages use the index slice of the previous axial position.
//!
//! The scheme is explicit. When `dz` is too large relative to `k0*n0*dx^2` the
//! field diverges; this is left visible in the output (non-finite or growing
//! values) and never corrected here.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use num_traits::Zero;
use rayon::prelude::*;
use std::f64::consts::PI;

use crate::error::{ensure_len, BpmError, Result};
use crate::grid::{trapezoid, Grid};

/// Stability limit of classic RK4 on the imaginary axis, `2*sqrt(2)`.
pub const RK4_IMAGINARY_LIMIT: f64 = 2.0 * std::f64::consts::SQRT_2;

/// Smallest transverse chunk handed to a rayon worker.
const PAR_MIN_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmParams {
    /// Vacuum wavelength, same length unit as the grid.
    pub wavelength: f64,
    /// Background (reference) refractive index.
    pub n0: f64,
}

impl BpmParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.wavelength > 0.0) {
            return Err(BpmError::invalid("wavelength", self.wavelength, "wavelength must be positive"));
        }
        if !(self.n0 > 0.0) {
            return Err(BpmError::invalid("n0", self.n0, "background index must be positive"));
        }
        Ok(())
    }

    pub fn k0(&self) -> f64 {
        2.0 * PI / self.wavelength
    }
}

/// Largest `|lambda*dz|` of the discrete diffraction operator, `2*dz/(k0*n0*dx^2)`.
///
/// The march is stable (for the diffraction term alone) while this stays
/// below [`RK4_IMAGINARY_LIMIT`].
pub fn stability_number(grid: &Grid, params: &BpmParams) -> f64 {
    2.0 * grid.dz / (params.k0() * params.n0 * grid.dx * grid.dx)
}

/// Right-hand side of the paraxial equation for one transverse slice.
#[derive(Debug, Clone, Copy)]
struct ParaxialOperator {
    diffraction: Complex64,
    index: f64,
    n0_sq: f64,
    inv_dx2: f64,
}

impl ParaxialOperator {
    fn new(params: &BpmParams, dx: f64) -> Self {
        let k0 = params.k0();
        ParaxialOperator {
            diffraction: Complex64::new(0.0, 1.0 / (2.0 * k0 * params.n0)),
            index: k0 / (2.0 * params.n0),
            n0_sq: params.n0 * params.n0,
            inv_dx2: 1.0 / (dx * dx),
        }
    }

    /// Writes `dz * dE/dz` for slice `e` into `out`.
    fn apply(&self, e: &[Complex64], n_r2: &[f64], sigma: &[f64], dz: f64, out: &mut [Complex64]) {
        let nx = e.len();
        out.par_iter_mut()
            .with_min_len(PAR_MIN_LEN)
            .enumerate()
            .for_each(|(i, d)| {
                let left = e[(i + nx - 1) % nx];
                let right = e[(i + 1) % nx];
                let laplacian = (right - e[i] * 2.0 + left) * self.inv_dx2;
                let local = Complex64::new(-sigma[i], self.index * (n_r2[i] - self.n0_sq));
                *d = (self.diffraction * laplacian + local * e[i]) * dz;
            });
    }
}

/// Computes `dE/dz` for one slice.
pub fn compute_de_dz(
    e: &[Complex64],
    n_r2: &[f64],
    sigma_x: &[f64],
    dx: f64,
    params: &BpmParams,
) -> Result<Vec<Complex64>> {
    params.validate()?;
    ensure_len("index slice length", e.len(), n_r2.len())?;
    ensure_len("damping profile length", e.len(), sigma_x.len())?;
    let mut out = vec![Complex64::zero(); e.len()];
    ParaxialOperator::new(params, dx).apply(e, n_r2, sigma_x, 1.0, &mut out);
    Ok(out)
}

fn check_shapes(
    field: &DMatrix<Complex64>,
    n_r2: &DMatrix<f64>,
    sigma_x: &DVector<f64>,
    grid: &Grid,
) -> Result<()> {
    ensure_len("field rows (transverse samples)", grid.nx(), field.nrows())?;
    ensure_len("field columns (axial samples)", grid.nz(), field.ncols())?;
    ensure_len("index map rows", field.nrows(), n_r2.nrows())?;
    ensure_len("index map columns", field.ncols(), n_r2.ncols())?;
    ensure_len("damping profile length", field.nrows(), sigma_x.len())?;
    Ok(())
}

/// Marches `field` along `z` in place.
///
/// Column 0 is the launch condition; every later column is overwritten in
/// increasing order, each from the one before it.
pub fn run_bpm(
    field: &mut DMatrix<Complex64>,
    n_r2: &DMatrix<f64>,
    sigma_x: &DVector<f64>,
    grid: &Grid,
    params: &BpmParams,
) -> Result<()> {
    params.validate()?;
    check_shapes(field, n_r2, sigma_x, grid)?;

    let nx = grid.nx();
    let nz = grid.nz();
    let dz = grid.dz;

    let stability = stability_number(grid, params);
    if stability > RK4_IMAGINARY_LIMIT {
        log::warn!(
            "dz = {:.4e} exceeds the explicit RK4 limit for dx = {:.4e} (stability number {:.3} > {:.3}); the field will diverge",
            dz,
            grid.dx,
            stability,
            RK4_IMAGINARY_LIMIT
        );
    }

    let op = ParaxialOperator::new(params, grid.dx);
    let sigma = sigma_x.as_slice();
    let index = n_r2.as_slice();
    let data = field.as_mut_slice();

    let mut k1 = vec![Complex64::zero(); nx];
    let mut k2 = vec![Complex64::zero(); nx];
    let mut k3 = vec![Complex64::zero(); nx];
    let mut k4 = vec![Complex64::zero(); nx];
    let mut stage = vec![Complex64::zero(); nx];

    let report_every = (nz / 10).max(1);

    for zi in 1..nz {
        let (done, rest) = data.split_at_mut(zi * nx);
        let prev = &done[(zi - 1) * nx..];
        let next = &mut rest[..nx];
        let n_slice = &index[(zi - 1) * nx..zi * nx];

        op.apply(prev, n_slice, sigma, dz, &mut k1);

        for i in 0..nx {
            stage[i] = prev[i] + k1[i] * 0.5;
        }
        op.apply(&stage, n_slice, sigma, dz, &mut k2);

        for i in 0..nx {
            stage[i] = prev[i] + k2[i] * 0.5;
        }
        op.apply(&stage, n_slice, sigma, dz, &mut k3);

        for i in 0..nx {
            stage[i] = prev[i] + k3[i];
        }
        op.apply(&stage, n_slice, sigma, dz, &mut k4);

        for i in 0..nx {
            next[i] = prev[i] + (k1[i] + k2[i] * 2.0 + k3[i] * 2.0 + k4[i]) / 6.0;
        }

        if zi % report_every == 0 {
            log::info!("propagated {}/{} slices (z = {:.3})", zi, nz - 1, grid.z[zi]);
        }
    }
    Ok(())
}

/// Allocates an `nx x nz` field, writes `launch` into column 0 and marches it.
pub fn propagate(
    launch: &DVector<Complex64>,
    n_r2: &DMatrix<f64>,
    sigma_x: &DVector<f64>,
    grid: &Grid,
    params: &BpmParams,
) -> Result<DMatrix<Complex64>> {
    ensure_len("launch field length", grid.nx(), launch.len())?;
    let mut field = DMatrix::<Complex64>::zeros(grid.nx(), grid.nz());
    field.set_column(0, launch);
    run_bpm(&mut field, n_r2, sigma_x, grid, params)?;
    Ok(field)
}

/// Trapezoidal `integral |E|^2 dx` of one transverse slice.
pub fn transverse_power(slice: &[Complex64], x: &[f64]) -> f64 {
    let p: Vec<f64> = slice.iter().map(|c| c.norm_sqr()).collect();
    trapezoid(&p, x)
}

/// Transverse power of every column of `field`.
pub fn power_trace(field: &DMatrix<Complex64>, x: &[f64]) -> Vec<f64> {
    let nx = field.nrows();
    field
        .as_slice()
        .chunks(nx.max(1))
        .map(|col| transverse_power(col, x))
        .collect()
}

/// Transverse coordinate of the largest `|E|` in a slice.
///
/// `None` for an empty slice or when `x` does not have one coordinate per sample.
pub fn peak_position(slice: &[Complex64], x: &[f64]) -> Option<f64> {
    if slice.is_empty() || slice.len() != x.len() {
        return None;
    }
    let mut best = 0;
    for i in 1..slice.len() {
        if slice[i].norm_sqr() > slice[best].norm_sqr() {
            best = i;
        }
    }
    Some(x[best])
}

/// `|E|^2` at every grid point.
pub fn intensity(field: &DMatrix<Complex64>) -> DMatrix<f64> {
    field.map(|c| c.norm_sqr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn params() -> BpmParams {
        BpmParams {
            wavelength: 0.532,
            n0: 1.0,
        }
    }

    fn gaussian(x: &[f64], w0: f64) -> DVector<Complex64> {
        DVector::from_iterator(x.len(), x.iter().map(|&v| Complex64::new((-(v / w0).powi(2)).exp(), 0.0)))
    }

    #[test]
    fn test_laplacian_wraps_periodically() {
        let p = params();
        let e = vec![
            Complex64::new(1.0, 0.0),
            Complex64::zero(),
            Complex64::zero(),
            Complex64::zero(),
        ];
        let n = vec![1.0; 4];
        let sigma = vec![0.0; 4];
        let d = compute_de_dz(&e, &n, &sigma, 1.0, &p).unwrap();
        let c = 1.0 / (2.0 * p.k0() * p.n0);
        assert_relative_eq!(d[0].im, -2.0 * c, epsilon = 1e-12);
        assert_relative_eq!(d[1].im, c, epsilon = 1e-12);
        assert_relative_eq!(d[3].im, c, epsilon = 1e-12);
        assert_eq!(d[2], Complex64::zero());
    }

    #[test]
    fn test_uniform_index_step_gives_phase_rotation() {
        // flat field in a uniform index n0^2 + delta: E(z) = exp(i k0 delta z / (2 n0))
        let grid = Grid::uniform(-5.0, 5.0, 32, 0.0, 10.0, 101).unwrap();
        let p = params();
        let delta = 0.05;
        let n_r2 = DMatrix::from_element(32, 101, 1.0 + delta);
        let sigma = DVector::zeros(32);
        let launch = DVector::from_element(32, Complex64::new(1.0, 0.0));
        let field = propagate(&launch, &n_r2, &sigma, &grid, &p).unwrap();
        let rate = p.k0() * delta / (2.0 * p.n0);
        let expected = Complex64::new(0.0, rate * 10.0).exp();
        assert_abs_diff_eq!(field[(7, 100)].re, expected.re, epsilon = 1e-6);
        assert_abs_diff_eq!(field[(7, 100)].im, expected.im, epsilon = 1e-6);
    }

    #[test]
    fn test_each_step_reads_index_of_previous_slice() {
        // flat field: only the index term acts, so slice j is rotated by the
        // RK4 amplification of the phase rate taken from column j - 1
        let grid = Grid::uniform(-5.0, 5.0, 16, 0.0, 1.0, 3).unwrap();
        let p = params();
        let delta = 0.05;
        let mut n_r2 = DMatrix::from_element(16, 3, 1.0 + delta);
        n_r2.column_mut(0).fill(1.0);
        let sigma = DVector::zeros(16);
        let launch = DVector::from_element(16, Complex64::new(1.0, 0.0));
        let field = propagate(&launch, &n_r2, &sigma, &grid, &p).unwrap();

        // column 0 carries n0^2, so the first step leaves the field untouched
        for i in 0..16 {
            assert_abs_diff_eq!(field[(i, 1)].re, 1.0, epsilon = 1e-14);
            assert_abs_diff_eq!(field[(i, 1)].im, 0.0, epsilon = 1e-14);
        }

        let h = Complex64::new(0.0, p.k0() * delta / (2.0 * p.n0) * grid.dz);
        let rk4 = Complex64::new(1.0, 0.0) + h + h * h / 2.0 + h * h * h / 6.0 + h * h * h * h / 24.0;
        assert!(h.im > 0.1);
        for i in 0..16 {
            assert_abs_diff_eq!(field[(i, 2)].re, rk4.re, epsilon = 1e-12);
            assert_abs_diff_eq!(field[(i, 2)].im, rk4.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_damping_decays_exponentially() {
        let grid = Grid::uniform(-5.0, 5.0, 16, 0.0, 4.0, 401).unwrap();
        let sigma = DVector::from_element(16, 0.3);
        let n_r2 = DMatrix::from_element(16, 401, 1.0);
        let launch = DVector::from_element(16, Complex64::new(1.0, 0.0));
        let field = propagate(&launch, &n_r2, &sigma, &grid, &params()).unwrap();
        assert_relative_eq!(field[(3, 400)].re, (-0.3f64 * 4.0).exp(), epsilon = 1e-8);
        assert_abs_diff_eq!(field[(3, 400)].im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_free_space_power_does_not_grow() {
        let grid = Grid::uniform(-40.0, 40.0, 256, 0.0, 200.0, 801).unwrap();
        let n_r2 = DMatrix::from_element(256, 801, 1.0);
        let sigma = DVector::zeros(256);
        let launch = gaussian(&grid.x, 4.0);
        let field = propagate(&launch, &n_r2, &sigma, &grid, &params()).unwrap();
        let trace = power_trace(&field, &grid.x);
        let p0 = trace[0];
        for p in &trace {
            assert!(*p <= p0 * (1.0 + 1e-9), "power grew: {p} > {p0}");
            assert!(*p >= p0 * (1.0 - 1e-6), "power lost: {p} < {p0}");
        }
    }

    #[test]
    fn test_march_is_deterministic() {
        let grid = Grid::uniform(-20.0, 20.0, 128, 0.0, 50.0, 201).unwrap();
        let n_r2 = DMatrix::from_fn(128, 201, |i, _| if grid.x[i].abs() <= 1.0 { 1.21 } else { 1.0 });
        let sigma = DVector::from_fn(128, |i, _| if grid.x[i].abs() > 15.0 { 0.2 } else { 0.0 });
        let launch = gaussian(&grid.x, 2.0);
        let a = propagate(&launch, &n_r2, &sigma, &grid, &params()).unwrap();
        let b = propagate(&launch, &n_r2, &sigma, &grid, &params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unstable_step_is_not_corrected() {
        // stability number far above the RK4 limit
        let grid = Grid::uniform(-2.0, 2.0, 64, 0.0, 200.0, 51).unwrap();
        assert!(stability_number(&grid, &params()) > RK4_IMAGINARY_LIMIT);
        let n_r2 = DMatrix::from_element(64, 51, 1.0);
        let sigma = DVector::zeros(64);
        let launch = gaussian(&grid.x, 0.5);
        let field = propagate(&launch, &n_r2, &sigma, &grid, &params()).unwrap();
        let trace = power_trace(&field, &grid.x);
        let last = trace[trace.len() - 1];
        assert!(!last.is_finite() || last > 1e3 * trace[0]);
    }

    #[test]
    fn test_shape_mismatch_is_rejected_before_marching() {
        let grid = Grid::uniform(-5.0, 5.0, 16, 0.0, 1.0, 8).unwrap();
        let p = params();
        let mut field = DMatrix::<Complex64>::zeros(16, 8);
        field[(0, 0)] = Complex64::new(1.0, 0.0);
        let sigma = DVector::zeros(16);

        let short_map = DMatrix::from_element(16, 7, 1.0);
        let err = run_bpm(&mut field, &short_map, &sigma, &grid, &p).unwrap_err();
        assert!(matches!(err, BpmError::DimensionMismatch { expected: 8, found: 7, .. }));
        assert_eq!(field[(0, 1)], Complex64::zero());

        let narrow_map = DMatrix::from_element(15, 8, 1.0);
        assert!(matches!(
            run_bpm(&mut field, &narrow_map, &sigma, &grid, &p),
            Err(BpmError::DimensionMismatch { .. })
        ));

        let map = DMatrix::from_element(16, 8, 1.0);
        let short_sigma = DVector::zeros(10);
        assert!(matches!(
            run_bpm(&mut field, &map, &short_sigma, &grid, &p),
            Err(BpmError::DimensionMismatch { expected: 16, found: 10, .. })
        ));

        let launch = DVector::from_element(12, Complex64::zero());
        assert!(matches!(
            propagate(&launch, &map, &sigma, &grid, &p),
            Err(BpmError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_params() {
        let grid = Grid::uniform(-5.0, 5.0, 8, 0.0, 1.0, 4).unwrap();
        let map = DMatrix::from_element(8, 4, 1.0);
        let sigma = DVector::zeros(8);
        let launch = DVector::from_element(8, Complex64::zero());
        let bad = BpmParams { wavelength: 0.0, n0: 1.0 };
        assert!(matches!(
            propagate(&launch, &map, &sigma, &grid, &bad),
            Err(BpmError::InvalidParameter { name: "wavelength", .. })
        ));
        let bad = BpmParams { wavelength: 1.0, n0: -1.0 };
        assert!(matches!(
            propagate(&launch, &map, &sigma, &grid, &bad),
            Err(BpmError::InvalidParameter { name: "n0", .. })
        ));
    }

    #[test]
    fn test_peak_position_and_intensity() {
        let x = [-1.0, 0.0, 1.0];
        let slice = [
            Complex64::new(0.1, 0.0),
            Complex64::new(0.0, -2.0),
            Complex64::new(1.0, 1.0),
        ];
        assert_eq!(peak_position(&slice, &x), Some(0.0));
        assert_eq!(peak_position(&slice, &x[..2]), None);
        assert_eq!(peak_position(&[], &[]), None);
        let m = DMatrix::from_column_slice(3, 1, &slice);
        assert_relative_eq!(intensity(&m)[(1, 0)], 4.0);
        assert_relative_eq!(transverse_power(&slice, &x), (0.01 + 4.0) / 2.0 + (4.0 + 2.0) / 2.0);
    }
}
