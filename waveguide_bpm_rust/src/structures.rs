//! Refractive-index-squared maps of planar structures.
//!
//! Every structure implements [`IndexProfile`], a pointwise sampler over the
//! transverse and axial coordinates. [`sample_index_map`] turns any of them
//! into the `nx x nz` array the propagation engine consumes.

use nalgebra::DMatrix;
use std::f64::consts::PI;

use crate::error::{BpmError, Result};
use crate::grid::Grid;

pub trait IndexProfile: Send + Sync {
    fn name(&self) -> &str;

    /// `n^2` at transverse position `x` and axial position `z`.
    fn index_squared(&self, x: f64, z: f64) -> f64;
}

/// Samples `profile` on every grid point; entry `[i, j]` aligns with `x[i], z[j]`.
pub fn sample_index_map(profile: &dyn IndexProfile, grid: &Grid) -> DMatrix<f64> {
    DMatrix::from_fn(grid.nx(), grid.nz(), |i, j| profile.index_squared(grid.x[i], grid.z[j]))
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if !(value > 0.0) {
        return Err(BpmError::invalid(name, value, "must be positive"));
    }
    Ok(())
}

fn above_cladding(name: &'static str, n: f64, n_clad: f64) -> Result<()> {
    if !(n > n_clad) {
        return Err(BpmError::invalid(name, n, "must exceed the background index"));
    }
    Ok(())
}

/// Homogeneous medium.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform {
    pub n: f64,
}

impl IndexProfile for Uniform {
    fn name(&self) -> &str {
        "uniform"
    }

    fn index_squared(&self, _x: f64, _z: f64) -> f64 {
        self.n * self.n
    }
}

/// Raised-cosine S-bend shifting the core laterally by `offset` over `length`.
///
/// The core centre follows `x_c(z) = offset*z/length - offset/(2 pi) sin(2 pi z/length)`,
/// held at `offset` beyond `length`. A zero offset gives a straight waveguide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SBendWaveguide {
    pub offset: f64,
    pub length: f64,
    pub width: f64,
    pub n_core: f64,
    pub n_clad: f64,
}

impl SBendWaveguide {
    pub fn new(offset: f64, length: f64, width: f64, n_core: f64, n_clad: f64) -> Result<Self> {
        positive("length", length)?;
        positive("width", width)?;
        above_cladding("n_core", n_core, n_clad)?;
        positive("n_clad", n_clad)?;
        Ok(SBendWaveguide {
            offset,
            length,
            width,
            n_core,
            n_clad,
        })
    }

    pub fn straight(width: f64, n_core: f64, n_clad: f64) -> Result<Self> {
        SBendWaveguide::new(0.0, 1.0, width, n_core, n_clad)
    }

    pub fn centre(&self, z: f64) -> f64 {
        let l = self.offset;
        let xc = l / self.length * z - l / (2.0 * PI) * (2.0 * PI / self.length * z).sin();
        xc.clamp(l.min(0.0), l.max(0.0))
    }
}

impl IndexProfile for SBendWaveguide {
    fn name(&self) -> &str {
        "s-bend waveguide"
    }

    fn index_squared(&self, x: f64, z: f64) -> f64 {
        if (x - self.centre(z)).abs() <= self.width / 2.0 {
            self.n_core * self.n_core
        } else {
            self.n_clad * self.n_clad
        }
    }
}

/// Multimode interference splitter: two access guides at `x = +-separation/2`
/// feed a multimode section spanning `[z_start, z_start + length]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmiSplitter {
    pub z_start: f64,
    pub length: f64,
    pub mmi_width: f64,
    pub guide_width: f64,
    pub separation: f64,
    pub n_guide: f64,
    pub n_mmi: f64,
    pub n_clad: f64,
}

impl MmiSplitter {
    pub fn validate(&self) -> Result<()> {
        positive("length", self.length)?;
        positive("mmi_width", self.mmi_width)?;
        positive("guide_width", self.guide_width)?;
        above_cladding("n_guide", self.n_guide, self.n_clad)?;
        above_cladding("n_mmi", self.n_mmi, self.n_clad)?;
        positive("n_clad", self.n_clad)
    }

    fn in_access_guide(&self, x: f64) -> bool {
        let half = self.guide_width / 2.0;
        (x + self.separation / 2.0).abs() <= half || (x - self.separation / 2.0).abs() <= half
    }
}

impl IndexProfile for MmiSplitter {
    fn name(&self) -> &str {
        "mmi splitter"
    }

    fn index_squared(&self, x: f64, z: f64) -> f64 {
        let z_end = self.z_start + self.length;
        if z >= self.z_start && z <= z_end {
            if x.abs() <= self.mmi_width / 2.0 {
                return self.n_mmi * self.n_mmi;
            }
        } else if self.in_access_guide(x) {
            return self.n_guide * self.n_guide;
        }
        self.n_clad * self.n_clad
    }
}

/// Spherical lens of aperture `diameter` centred at `(x_centre, centre_z)`.
///
/// The entry and exit surfaces have radii `r1` and `r2`; `thickness` is the
/// vertex-to-vertex distance of the two caps' reference planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalLens {
    pub diameter: f64,
    pub thickness: f64,
    pub r1: f64,
    pub r2: f64,
    pub n_lens: f64,
    pub n_clad: f64,
    pub centre_z: f64,
    pub x_centre: f64,
}

impl SphericalLens {
    pub fn validate(&self) -> Result<()> {
        positive("diameter", self.diameter)?;
        positive("thickness", self.thickness)?;
        positive("r1", self.r1)?;
        positive("r2", self.r2)?;
        above_cladding("n_lens", self.n_lens, self.n_clad)?;
        positive("n_clad", self.n_clad)
    }

    /// Axial extent of the lens at transverse position `x`, if any.
    pub fn span(&self, x: f64) -> Option<(f64, f64)> {
        let dx = x - self.x_centre;
        if dx.abs() > self.diameter / 2.0 {
            return None;
        }
        let z1 = self.centre_z - self.thickness / 2.0;
        let z2 = self.centre_z + self.thickness / 2.0;
        let sag1 = self.r1 - (self.r1.powi(2) - dx * dx).max(0.0).sqrt();
        let sag2 = self.r2 - (self.r2.powi(2) - dx * dx).max(0.0).sqrt();
        Some((z1 + sag1, z2 - sag2))
    }
}

impl IndexProfile for SphericalLens {
    fn name(&self) -> &str {
        "spherical lens"
    }

    fn index_squared(&self, x: f64, z: f64) -> f64 {
        match self.span(x) {
            Some((front, back)) if z >= front && z <= back => self.n_lens * self.n_lens,
            _ => self.n_clad * self.n_clad,
        }
    }
}
