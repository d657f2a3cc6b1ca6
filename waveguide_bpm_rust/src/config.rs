//! TOML job configuration.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub simulation: SimulationConfig,
    pub grid: GridConfig,
    pub source: SourceConfig,
    pub structure: StructureConfig,
    #[serde(default)]
    pub absorber: AbsorberConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Vacuum wavelength (um).
    pub wavelength: f64,
    /// Background index.
    #[serde(default = "default_n0")]
    pub n0: f64,
}

fn default_n0() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub x_min: f64,
    pub x_max: f64,
    pub nx: usize,
    #[serde(default)]
    pub z_min: f64,
    pub z_max: f64,
    pub nz: usize,
}

/// Slab whose guided mode is launched at `z_min`; the cladding is `simulation.n0`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub width: f64,
    pub n_core: f64,
    #[serde(default)]
    pub mode_index: usize,
    #[serde(default)]
    pub x0: f64,
    #[serde(default = "default_scan_points")]
    pub scan_points: usize,
}

fn default_scan_points() -> usize {
    waveguide_bpm_rust::mode_solver::DEFAULT_SCAN_POINTS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructureConfig {
    Uniform,
    Straight {
        width: f64,
        n_core: f64,
    },
    SBend {
        offset: f64,
        length: f64,
        width: f64,
        n_core: f64,
    },
    Mmi {
        z_start: f64,
        length: f64,
        mmi_width: f64,
        guide_width: f64,
        separation: f64,
        n_guide: f64,
        n_mmi: f64,
    },
    Lens {
        diameter: f64,
        thickness: f64,
        r1: f64,
        r2: f64,
        n_lens: f64,
        centre_z: f64,
        #[serde(default)]
        x_centre: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbsorberConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Layer thickness (um); derived from the window and wavelength if absent.
    pub thickness: Option<f64>,
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default = "default_order")]
    pub order: i32,
}

impl Default for AbsorberConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thickness: None,
            strength: default_strength(),
            order: default_order(),
        }
    }
}

fn default_strength() -> f64 {
    waveguide_bpm_rust::absorber::DEFAULT_STRENGTH
}
fn default_order() -> i32 {
    waveguide_bpm_rust::absorber::DEFAULT_ORDER
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Write `field.json` with `x`, `z` and the complex field.
    #[serde(default = "default_true")]
    pub save_field: bool,
    /// Write `power.csv` with the transverse power at each `z`.
    #[serde(default = "default_true")]
    pub save_power: bool,
    /// Render `intensity.png`.
    #[serde(default = "default_true")]
    pub save_plot: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_field: true,
            save_power: true,
            save_plot: true,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

impl JobConfig {
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if !(sim.wavelength > 0.0) {
            return Err(anyhow!("simulation.wavelength must be positive (got {})", sim.wavelength));
        }
        if !(sim.n0 > 0.0) {
            return Err(anyhow!("simulation.n0 must be positive (got {})", sim.n0));
        }

        let g = &self.grid;
        if g.nx < 3 || g.nz < 2 {
            return Err(anyhow!("grid needs nx >= 3 and nz >= 2 (nx={}, nz={})", g.nx, g.nz));
        }
        if !(g.x_max > g.x_min) || !(g.z_max > g.z_min) {
            return Err(anyhow!(
                "grid extents must be increasing (x=[{}, {}], z=[{}, {}])",
                g.x_min,
                g.x_max,
                g.z_min,
                g.z_max
            ));
        }

        if !(self.source.width > 0.0) {
            return Err(anyhow!("source.width must be positive (got {})", self.source.width));
        }
        if !(self.source.n_core > sim.n0) {
            return Err(anyhow!(
                "source.n_core must exceed simulation.n0 ({} <= {})",
                self.source.n_core,
                sim.n0
            ));
        }
        if self.source.x0 < g.x_min || self.source.x0 > g.x_max {
            return Err(anyhow!("source.x0 = {} lies outside the grid", self.source.x0));
        }

        let a = &self.absorber;
        if let Some(t) = a.thickness {
            if !(t > 0.0) || t > (g.x_max - g.x_min) / 2.0 {
                return Err(anyhow!("absorber.thickness must be in (0, half the window] (got {})", t));
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parsing config {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
