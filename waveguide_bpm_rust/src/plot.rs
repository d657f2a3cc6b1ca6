//! Intensity map rendering.

use anyhow::{anyhow, Result};
use nalgebra::DMatrix;
use num_complex::Complex64;
use plotters::prelude::*;
use std::path::Path;

use waveguide_bpm_rust::propagation::intensity;

/// Longest axis drawn; larger grids are decimated.
const MAX_CELLS: usize = 400;

fn hot(v: f64) -> RGBColor {
    let v = v.clamp(0.0, 1.0);
    let r = (3.0 * v).min(1.0);
    let g = (3.0 * v - 1.0).clamp(0.0, 1.0);
    let b = (3.0 * v - 2.0).clamp(0.0, 1.0);
    RGBColor((255.0 * r) as u8, (255.0 * g) as u8, (255.0 * b) as u8)
}

/// Renders `|E|^2` with `x` horizontal and `z` vertical.
pub fn plot_intensity(
    field: &DMatrix<Complex64>,
    x: &[f64],
    z: &[f64],
    title: &str,
    path: &Path,
) -> Result<()> {
    let (nx, nz) = field.shape();
    if nx < 2 || nz < 2 {
        return Err(anyhow!("need at least a 2 x 2 field to plot (got {} x {})", nx, nz));
    }
    if x.len() != nx || z.len() != nz {
        return Err(anyhow!("axes ({}, {}) do not match field {} x {}", x.len(), z.len(), nx, nz));
    }
    let sx = nx.div_ceil(MAX_CELLS);
    let sz = nz.div_ceil(MAX_CELLS);

    let power = intensity(field);
    let max_val = power.iter().copied().filter(|v| v.is_finite()).fold(0.0, f64::max);
    let scale = if max_val > 0.0 { 1.0 / max_val } else { 0.0 };

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow!("{e}"))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x[0]..x[nx - 1], z[0]..z[nz - 1])
        .map_err(|e| anyhow!("{e}"))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("x (um)")
        .y_desc("z (um)")
        .draw()
        .map_err(|e| anyhow!("{e}"))?;

    let cells = (0..nz - 1).step_by(sz).flat_map(|j| {
        (0..nx - 1).step_by(sx).map(move |i| (i, j))
    });
    chart
        .draw_series(cells.map(|(i, j)| {
            let i1 = (i + sx).min(nx - 1);
            let j1 = (j + sz).min(nz - 1);
            let v = power[(i, j)] * scale;
            Rectangle::new([(x[i], z[j]), (x[i1], z[j1])], hot(v).filled())
        }))
        .map_err(|e| anyhow!("{e}"))?;

    root.present().map_err(|e| anyhow!("{e}"))?;
    println!("Saved plot: {}", path.display());
    Ok(())
}
