//! Raw array export of a finished run.

use anyhow::{bail, Context, Result};
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use waveguide_bpm_rust::Grid;

/// `E`, `x` and `z` of one run. `re[j]` and `im[j]` hold the slice at `z[j]`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldBundle {
    pub wavelength: f64,
    pub n0: f64,
    pub x: Vec<f64>,
    pub z: Vec<f64>,
    pub re: Vec<Vec<f64>>,
    pub im: Vec<Vec<f64>>,
}

impl FieldBundle {
    pub fn new(field: &DMatrix<Complex64>, grid: &Grid, wavelength: f64, n0: f64) -> Self {
        let nx = field.nrows().max(1);
        let columns: Vec<&[Complex64]> = field.as_slice().chunks(nx).collect();
        FieldBundle {
            wavelength,
            n0,
            x: grid.x.clone(),
            z: grid.z.clone(),
            re: columns.iter().map(|c| c.iter().map(|v| v.re).collect()).collect(),
            im: columns.iter().map(|c| c.iter().map(|v| v.im).collect()).collect(),
        }
    }

    /// Rebuilds the `nx x nz` complex field.
    pub fn field(&self) -> DMatrix<Complex64> {
        DMatrix::from_fn(self.x.len(), self.z.len(), |i, j| Complex64::new(self.re[j][i], self.im[j][i]))
    }
}

pub fn write_field_json(bundle: &FieldBundle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(bundle).context("serialising field bundle")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("Field written to: {}", path.display());
    Ok(())
}

pub fn read_field_json(path: &Path) -> Result<FieldBundle> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let bundle: FieldBundle = serde_json::from_str(&content)?;
    let (nx, nz) = (bundle.x.len(), bundle.z.len());
    let ragged = |rows: &[Vec<f64>]| rows.len() != nz || rows.iter().any(|r| r.len() != nx);
    if ragged(&bundle.re) || ragged(&bundle.im) {
        bail!("{}: field arrays do not match {} x {} grid", path.display(), nx, nz);
    }
    Ok(bundle)
}

pub fn write_power_csv(power: &[f64], z: &[f64], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    writeln!(file, "# transverse power integral |E|^2 dx per slice")?;
    writeln!(file, "z_um,power")?;
    for (zi, p) in z.iter().zip(power) {
        writeln!(file, "{:.6},{:.9e}", zi, p)?;
    }
    println!("Power trace written to: {}", path.display());
    Ok(())
}
