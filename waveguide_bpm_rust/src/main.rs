//! Beam propagation driver.
//!
//! ```sh
//! waveguide-bpm run job.toml
//! waveguide-bpm modes job.toml
//! waveguide-bpm validate job.toml
//! waveguide-bpm replot output/field.json
//! ```

mod config;
mod export;
mod plot;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "waveguide-bpm")]
#[command(about = "Beam propagation through planar waveguide structures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a slab mode and propagate it through the configured structure.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the guided modes of the configured source slab.
    Modes {
        config: PathBuf,
    },
    /// Validate a configuration file without running it.
    Validate {
        config: PathBuf,
    },
    /// Render the intensity map of a saved field bundle.
    Replot {
        bundle: PathBuf,
        #[arg(short, long, default_value = "intensity.png")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_simulation(&job)?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_field {
                let bundle = export::FieldBundle::new(
                    &result.field,
                    &result.grid,
                    job.simulation.wavelength,
                    job.simulation.n0,
                );
                export::write_field_json(&bundle, &out_dir.join("field.json"))?;
            }
            if job.output.save_power {
                export::write_power_csv(&result.power, &result.grid.z, &out_dir.join("power.csv"))?;
            }
            if job.output.save_plot {
                std::fs::create_dir_all(&out_dir)?;
                plot::plot_intensity(
                    &result.field,
                    &result.grid.x,
                    &result.grid.z,
                    "Waveguide BPM Propagation",
                    &out_dir.join("intensity.png"),
                )?;
            }
            println!(
                "Simulation complete: TE{} launched, {:.2}% of launch power at exit.",
                result.launch.mode.mode_index,
                100.0 * result.power[result.power.len() - 1] / result.power[0]
            );
            Ok(())
        }
        Commands::Modes { config } => {
            let job = config::load_config(&config)?;
            let modes = runner::list_modes(&job)?;
            println!("Found {} guided mode(s).", modes.len());
            for m in &modes {
                println!(
                    "  TE{:<3} {:<4}  neff = {:.6}  beta = {:.6} rad/um  Confinement = {:.4}",
                    m.mode.mode_index, m.mode.parity, m.mode.neff, m.mode.beta, m.confinement
                );
            }
            Ok(())
        }
        Commands::Validate { config } => {
            config::load_config(&config)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Replot { bundle, output } => {
            let data = export::read_field_json(&bundle)?;
            plot::plot_intensity(&data.field(), &data.x, &data.z, "Waveguide BPM Propagation", &output)?;
            Ok(())
        }
    }
}
