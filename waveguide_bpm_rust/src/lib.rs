//! # waveguide_bpm_rust
//!
//! Beam propagation through planar optical structures.
//!
//! - [`mode_solver`] finds the guided modes of a symmetric slab and builds a
//!   normalized launch field.
//! - [`propagation`] marches a complex transverse field along `z` with RK4 and
//!   absorbing side boundaries.
//! - [`structures`] and [`absorber`] sample index maps and damping profiles on a
//!   [`grid::Grid`].

pub mod absorber;
pub mod error;
pub mod grid;
pub mod mode_solver;
pub mod propagation;
pub mod structures;

pub use error::{BpmError, Result};
pub use grid::Grid;
pub use mode_solver::{slab_mode_source, solve_slab_modes, Mode, ModeSearch, Parity, SlabWaveguide};
pub use propagation::{propagate, run_bpm, BpmParams};
