//! Guided TE modes of a symmetric slab waveguide.
//!
//! The propagation constant of each mode is a root of the even or odd slab
//! dispersion relation inside the guided band `(n_clad*k0, n_core*k0)`. Roots are
//! bracketed by dense uniform sampling of the band and refined by bisection.
//! Sampling can miss closely spaced roots of thick, high-contrast slabs; raise
//! [`ModeSearch::scan_points`] for those geometries.

use nalgebra::DVector;
use num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::{BpmError, Result};
use crate::grid::trapezoid;

pub const DEFAULT_SCAN_POINTS: usize = 2000;
pub const MAX_BISECTION_ITERATIONS: usize = 50;
/// Bisection stops once the characteristic function falls below this.
pub const ROOT_TOLERANCE: f64 = 1e-9;
const SINGULAR_SIN: f64 = 1e-12;
/// Half-width (rad) of the window around a tan/cot pole in which a refined
/// root is treated as a pole artifact unless it actually converged.
const ASYMPTOTE_GUARD: f64 = 0.1;
/// Residual accepted for a converged root, relative to `n_core*k0`.
const RESIDUAL_LIMIT: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::Even => write!(f, "even"),
            Parity::Odd => write!(f, "odd"),
        }
    }
}

/// Symmetric slab: a core of `width` and index `n_core` in a cladding of `n_clad`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabWaveguide {
    pub width: f64,
    pub n_core: f64,
    pub n_clad: f64,
    pub wavelength: f64,
}

impl SlabWaveguide {
    /// Checks every precondition in turn and reports the first one violated.
    pub fn validate(&self) -> Result<()> {
        if !(self.width > 0.0) {
            return Err(BpmError::invalid("width", self.width, "waveguide width must be positive"));
        }
        if !(self.n_core > self.n_clad) {
            return Err(BpmError::invalid(
                "n_core",
                self.n_core,
                "core index must be greater than the cladding index",
            ));
        }
        if !(self.n_clad > 0.0) {
            return Err(BpmError::invalid("n_clad", self.n_clad, "cladding index must be positive"));
        }
        if !(self.wavelength > 0.0) {
            return Err(BpmError::invalid("wavelength", self.wavelength, "wavelength must be positive"));
        }
        Ok(())
    }

    pub fn k0(&self) -> f64 {
        2.0 * PI / self.wavelength
    }

    /// Guided band of the propagation constant.
    pub fn beta_range(&self) -> (f64, f64) {
        let k0 = self.k0();
        (self.n_clad * k0, self.n_core * k0)
    }

    /// Transverse wavenumber in the core and decay constant in the cladding,
    /// or `None` outside the guided band.
    pub fn wavenumbers(&self, beta: f64) -> Option<(f64, f64)> {
        let (beta_min, beta_max) = self.beta_range();
        if beta < beta_min || beta > beta_max {
            return None;
        }
        let inside = beta_max.powi(2) - beta.powi(2);
        let outside = beta.powi(2) - beta_min.powi(2);
        if inside <= 0.0 || outside <= 0.0 {
            return None;
        }
        Some((inside.sqrt(), outside.sqrt()))
    }

    /// Dispersion relation of the given parity; zero at a guided mode.
    pub fn characteristic(&self, parity: Parity, beta: f64) -> Option<f64> {
        let (kx, kappa) = self.wavenumbers(beta)?;
        let half = kx * self.width / 2.0;
        match parity {
            Parity::Even => Some(kx * half.tan() - kappa),
            Parity::Odd => {
                let s = half.sin();
                if s.abs() < SINGULAR_SIN {
                    return None;
                }
                Some(-kx * (half.cos() / s) - kappa)
            }
        }
    }

    /// Normalized frequency `V = k0*w/2*sqrt(n_core^2 - n_clad^2)`.
    pub fn v_number(&self) -> f64 {
        self.k0() * self.width / 2.0 * (self.n_core.powi(2) - self.n_clad.powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeSearch {
    /// Uniform samples of the guided band used to bracket roots.
    pub scan_points: usize,
}

impl Default for ModeSearch {
    fn default() -> Self {
        ModeSearch {
            scan_points: DEFAULT_SCAN_POINTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mode {
    pub mode_index: usize,
    pub parity: Parity,
    pub beta: f64,
    pub neff: f64,
    pub kx: f64,
    pub kappa: f64,
}

/// Normalized transverse profile of a mode sampled on `x`.
#[derive(Debug, Clone)]
pub struct ModeField {
    pub mode: Mode,
    pub field: DVector<Complex64>,
    /// Fraction of the power carried inside the core.
    pub confinement: f64,
}

/// Finds every guided mode, sorted by decreasing `beta` (fundamental first).
///
/// Fails with [`BpmError::NoGuidedMode`] when the full scan finds no root.
pub fn solve_slab_modes(guide: &SlabWaveguide, search: &ModeSearch) -> Result<Vec<Mode>> {
    guide.validate()?;
    if search.scan_points < 2 {
        return Err(BpmError::invalid(
            "scan_points",
            search.scan_points,
            "root scan needs at least two samples",
        ));
    }

    let (beta_min, beta_max) = guide.beta_range();
    let n = search.scan_points;
    let step = (beta_max - beta_min) / (n as f64 - 1.0);
    let beta_scan: Vec<f64> = (0..n).map(|i| beta_min + i as f64 * step).collect();

    let mut roots = Vec::new();
    for parity in [Parity::Even, Parity::Odd] {
        let values: Vec<Option<f64>> = beta_scan
            .iter()
            .map(|&b| guide.characteristic(parity, b))
            .collect();

        for i in 0..n - 1 {
            let (Some(y1), Some(y2)) = (values[i], values[i + 1]) else {
                continue;
            };
            if y1 * y2 >= 0.0 {
                continue;
            }
            let beta = refine_root(guide, parity, beta_scan[i], beta_scan[i + 1]);
            if is_valid_root(guide, parity, beta) {
                roots.push((parity, beta));
            } else {
                log::debug!(
                    "rejected {} root at beta = {:.9} (bracket [{:.9}, {:.9}])",
                    parity,
                    beta,
                    beta_scan[i],
                    beta_scan[i + 1]
                );
            }
        }
    }

    if roots.is_empty() {
        return Err(BpmError::NoGuidedMode { beta_min, beta_max });
    }

    roots.sort_by(|a, b| b.1.total_cmp(&a.1));

    let k0 = guide.k0();
    let mut modes = Vec::with_capacity(roots.len());
    for (i, &(parity, beta)) in roots.iter().enumerate() {
        let Some((kx, kappa)) = guide.wavenumbers(beta) else {
            continue;
        };
        modes.push(Mode {
            mode_index: i,
            parity,
            beta,
            neff: beta / k0,
            kx,
            kappa,
        });
    }
    log::debug!("found {} guided mode(s), V = {:.4}", modes.len(), guide.v_number());
    Ok(modes)
}

/// Bisection on `[left, right]`, which must bracket a sign change.
fn refine_root(guide: &SlabWaveguide, parity: Parity, mut left: f64, mut right: f64) -> f64 {
    let mut mid = 0.5 * (left + right);
    let mut f_left = guide.characteristic(parity, left);
    for _ in 0..MAX_BISECTION_ITERATIONS {
        mid = 0.5 * (left + right);
        let Some(f_mid) = guide.characteristic(parity, mid) else {
            right = mid;
            continue;
        };
        if f_mid.abs() < ROOT_TOLERANCE {
            return mid;
        }
        match f_left {
            Some(fl) if fl * f_mid <= 0.0 => right = mid,
            _ => {
                left = mid;
                f_left = Some(f_mid);
            }
        }
    }
    mid
}

/// Branch index `m = floor(2*theta/pi)` with `theta = kx*w/2`.
fn branch_index(theta: f64) -> i64 {
    (2.0 * theta / PI).floor() as i64
}

/// Even roots live on even tan branches and odd roots on odd cot branches.
/// A root next to a pole of its branch function is kept only if it converged.
fn is_valid_root(guide: &SlabWaveguide, parity: Parity, beta: f64) -> bool {
    let Some((kx, _)) = guide.wavenumbers(beta) else {
        return false;
    };
    let theta = kx * guide.width / 2.0;
    let m = branch_index(theta);
    let on_branch = match parity {
        Parity::Even => m.rem_euclid(2) == 0,
        Parity::Odd => m.rem_euclid(2) == 1,
    };
    if !on_branch {
        return false;
    }

    // tan has poles at pi/2 + j*pi, cot at j*pi
    let pole_phase = match parity {
        Parity::Even => theta - PI / 2.0,
        Parity::Odd => theta,
    };
    let to_pole = (pole_phase - (pole_phase / PI).round() * PI).abs();
    if to_pole > ASYMPTOTE_GUARD {
        return true;
    }
    let limit = RESIDUAL_LIMIT * guide.n_core * guide.k0();
    matches!(guide.characteristic(parity, beta), Some(r) if r.abs() <= limit)
}

/// Samples `mode` on `x`, centred at `x0`, normalized to unit trapezoidal power.
pub fn mode_field(x: &[f64], guide: &SlabWaveguide, mode: &Mode, x0: f64) -> Result<ModeField> {
    if x.len() < 2 {
        return Err(BpmError::invalid("x", format!("{} samples", x.len()), "needs at least two samples"));
    }
    guide.validate()?;

    let half_w = guide.width / 2.0;
    let (kx, kappa) = (mode.kx, mode.kappa);
    let profile: Vec<f64> = x
        .iter()
        .map(|&xi| {
            let xp = xi - x0;
            let tail = (-kappa * (xp.abs() - half_w)).exp();
            match (mode.parity, xp.abs() <= half_w) {
                (Parity::Even, true) => (kx * xp).cos(),
                (Parity::Even, false) => (kx * half_w).cos() * tail,
                (Parity::Odd, true) => (kx * xp).sin(),
                (Parity::Odd, false) => xp.signum() * (kx * half_w).sin() * tail,
            }
        })
        .collect();

    let intensity: Vec<f64> = profile.iter().map(|v| v * v).collect();
    let power = trapezoid(&intensity, x);
    if !(power > 0.0) {
        return Err(BpmError::invalid("x", power, "mode has no power on the sampled window"));
    }
    let norm = power.sqrt();

    let core: Vec<f64> = x
        .iter()
        .zip(&intensity)
        .map(|(&xi, &p)| if (xi - x0).abs() <= half_w { p } else { 0.0 })
        .collect();
    let confinement = trapezoid(&core, x) / power;

    let field = DVector::from_iterator(x.len(), profile.iter().map(|&v| Complex64::new(v / norm, 0.0)));
    Ok(ModeField {
        mode: *mode,
        field,
        confinement,
    })
}

/// Normalized launch field of mode `ind_m` (0 = fundamental), shifted by `x0`.
///
/// A mode index beyond the number of guided modes is clamped to the highest
/// available one with a warning.
pub fn slab_mode_source(
    x: &[f64],
    guide: &SlabWaveguide,
    ind_m: usize,
    x0: f64,
) -> Result<DVector<Complex64>> {
    slab_mode_source_with(x, guide, ind_m, x0, &ModeSearch::default()).map(|m| m.field)
}

pub fn slab_mode_source_with(
    x: &[f64],
    guide: &SlabWaveguide,
    ind_m: usize,
    x0: f64,
    search: &ModeSearch,
) -> Result<ModeField> {
    if x.len() < 2 {
        return Err(BpmError::invalid("x", format!("{} samples", x.len()), "needs at least two samples"));
    }
    let modes = solve_slab_modes(guide, search)?;
    let index = if ind_m >= modes.len() {
        log::warn!(
            "Requested mode index {} >= found modes ({}). Using highest mode index {}.",
            ind_m,
            modes.len(),
            modes.len() - 1
        );
        modes.len() - 1
    } else {
        ind_m
    };
    mode_field(x, guide, &modes[index], x0)
}
