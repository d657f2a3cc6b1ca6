//! Simulation runner: ties together grid, structure, absorber, source and engine.

use anyhow::{Context, Result};
use nalgebra::DMatrix;
use num_complex::Complex64;

use waveguide_bpm_rust::absorber::{sample_damping, DampingProfile, NoDamping, PolynomialAbsorber};
use waveguide_bpm_rust::mode_solver::{mode_field, slab_mode_source_with, ModeField, ModeSearch};
use waveguide_bpm_rust::propagation::{peak_position, power_trace, propagate, stability_number};
use waveguide_bpm_rust::structures::{
    sample_index_map, IndexProfile, MmiSplitter, SBendWaveguide, SphericalLens, Uniform,
};
use waveguide_bpm_rust::{solve_slab_modes, BpmParams, Grid, SlabWaveguide};

use crate::config::{AbsorberConfig, JobConfig, StructureConfig};

pub struct SimulationOutput {
    pub grid: Grid,
    pub field: DMatrix<Complex64>,
    pub power: Vec<f64>,
    pub launch: ModeField,
}

pub fn build_grid(job: &JobConfig) -> Result<Grid> {
    let g = &job.grid;
    Ok(Grid::uniform(g.x_min, g.x_max, g.nx, g.z_min, g.z_max, g.nz)?)
}

pub fn source_guide(job: &JobConfig) -> SlabWaveguide {
    SlabWaveguide {
        width: job.source.width,
        n_core: job.source.n_core,
        n_clad: job.simulation.n0,
        wavelength: job.simulation.wavelength,
    }
}

pub fn build_structure(structure: &StructureConfig, n0: f64) -> Result<Box<dyn IndexProfile>> {
    let profile: Box<dyn IndexProfile> = match *structure {
        StructureConfig::Uniform => Box::new(Uniform { n: n0 }),
        StructureConfig::Straight { width, n_core } => {
            Box::new(SBendWaveguide::straight(width, n_core, n0).context("straight waveguide")?)
        }
        StructureConfig::SBend {
            offset,
            length,
            width,
            n_core,
        } => Box::new(SBendWaveguide::new(offset, length, width, n_core, n0).context("s-bend waveguide")?),
        StructureConfig::Mmi {
            z_start,
            length,
            mmi_width,
            guide_width,
            separation,
            n_guide,
            n_mmi,
        } => {
            let mmi = MmiSplitter {
                z_start,
                length,
                mmi_width,
                guide_width,
                separation,
                n_guide,
                n_mmi,
                n_clad: n0,
            };
            mmi.validate().context("mmi splitter")?;
            Box::new(mmi)
        }
        StructureConfig::Lens {
            diameter,
            thickness,
            r1,
            r2,
            n_lens,
            centre_z,
            x_centre,
        } => {
            let lens = SphericalLens {
                diameter,
                thickness,
                r1,
                r2,
                n_lens,
                n_clad: n0,
                centre_z,
                x_centre,
            };
            lens.validate().context("spherical lens")?;
            Box::new(lens)
        }
    };
    Ok(profile)
}

pub fn build_damping(cfg: &AbsorberConfig, grid: &Grid, wavelength: f64) -> Result<Box<dyn DampingProfile>> {
    if !cfg.enabled {
        return Ok(Box::new(NoDamping));
    }
    let (x_min, x_max) = grid.x_extent();
    let absorber = match cfg.thickness {
        Some(t) => PolynomialAbsorber::new(x_min, x_max, t, cfg.strength, cfg.order)?,
        None => {
            let auto = PolynomialAbsorber::for_domain(x_min, x_max, wavelength)?;
            PolynomialAbsorber::new(x_min, x_max, auto.thickness, cfg.strength, cfg.order)?
        }
    };
    Ok(Box::new(absorber))
}

/// Guided modes of the source slab with their confinement on the job grid.
pub fn list_modes(job: &JobConfig) -> Result<Vec<ModeField>> {
    let grid = build_grid(job)?;
    let guide = source_guide(job);
    let search = ModeSearch {
        scan_points: job.source.scan_points,
    };
    let modes = solve_slab_modes(&guide, &search)?;
    modes
        .iter()
        .map(|m| mode_field(&grid.x, &guide, m, job.source.x0).map_err(anyhow::Error::from))
        .collect()
}

pub fn run_simulation(job: &JobConfig) -> Result<SimulationOutput> {
    let grid = build_grid(job)?;
    let params = BpmParams {
        wavelength: job.simulation.wavelength,
        n0: job.simulation.n0,
    };
    println!(
        "Grid: {} x {} (dx = {:.4} um, dz = {:.4} um, stability number {:.3})",
        grid.nx(),
        grid.nz(),
        grid.dx,
        grid.dz,
        stability_number(&grid, &params)
    );

    let structure = build_structure(&job.structure, params.n0)?;
    let n_r2 = sample_index_map(structure.as_ref(), &grid);
    println!("Structure: {}", structure.name());

    let damping = build_damping(&job.absorber, &grid, params.wavelength)?;
    let sigma_x = sample_damping(damping.as_ref(), &grid.x);

    let guide = source_guide(job);
    let search = ModeSearch {
        scan_points: job.source.scan_points,
    };
    let launch = slab_mode_source_with(&grid.x, &guide, job.source.mode_index, job.source.x0, &search)
        .context("building launch field")?;
    println!(
        "Mode TE{} ({}): neff = {:.6}, Confinement = {:.4}",
        launch.mode.mode_index, launch.mode.parity, launch.mode.neff, launch.confinement
    );

    let field = propagate(&launch.field, &n_r2, &sigma_x, &grid, &params).context("propagating field")?;

    let power = power_trace(&field, &grid.x);
    let last = grid.nz() - 1;
    let output_power = power[last];
    if !output_power.is_finite() {
        log::warn!("field diverged: non-finite power at z = {:.3}", grid.z[last]);
    }
    let nx = grid.nx();
    let exit_slice = &field.as_slice()[last * nx..];
    let peak = peak_position(exit_slice, &grid.x).unwrap_or(f64::NAN);
    println!(
        "Output: power = {:.6} (launch {:.6}), peak at x = {:.3} um",
        output_power, power[0], peak
    );

    Ok(SimulationOutput {
        grid,
        field,
        power,
        launch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const JOB: &str = r#"
[simulation]
wavelength = 0.532

[grid]
x_min = -10.0
x_max = 10.0
nx = 64
z_max = 20.0
nz = 81

[source]
width = 1.0
n_core = 1.1
mode_index = 3

[structure]
type = "straight"
width = 1.0
n_core = 1.1

[absorber]
thickness = 2.0
"#;

    #[test]
    fn test_run_small_job() {
        let job = parse_config(JOB).unwrap();
        let out = run_simulation(&job).unwrap();
        assert_eq!(out.field.shape(), (64, 81));
        assert_eq!(out.power.len(), 81);
        // mode index 3 is clamped to the odd TE1 mode
        assert_eq!(out.launch.mode.mode_index, 1);
        assert!(out.power.iter().all(|p| p.is_finite() && *p <= out.power[0] * 1.001));
    }

    #[test]
    fn test_list_modes() {
        let job = parse_config(JOB).unwrap();
        let modes = list_modes(&job).unwrap();
        assert_eq!(modes.len(), 2);
        assert!(modes[0].confinement > modes[1].confinement);
    }

    #[test]
    fn test_disabled_absorber() {
        let grid = Grid::uniform(-1.0, 1.0, 5, 0.0, 1.0, 2).unwrap();
        let cfg = AbsorberConfig {
            enabled: false,
            ..Default::default()
        };
        let damping = build_damping(&cfg, &grid, 0.5).unwrap();
        assert_eq!(damping.sigma(-1.0), 0.0);
    }
}
