use approx::assert_abs_diff_eq;
use nalgebra::DMatrix;
use num_complex::Complex64;

use waveguide_bpm_rust::absorber::{sample_damping, PolynomialAbsorber};
use waveguide_bpm_rust::grid::{linspace, trapezoid};
use waveguide_bpm_rust::propagation::{peak_position, power_trace};
use waveguide_bpm_rust::structures::{sample_index_map, SBendWaveguide};
use waveguide_bpm_rust::{propagate, slab_mode_source, BpmParams, Grid, SlabWaveguide};

const WAVELENGTH: f64 = 0.532;

fn guide() -> SlabWaveguide {
    SlabWaveguide {
        width: 1.0,
        n_core: 1.1,
        n_clad: 1.0,
        wavelength: WAVELENGTH,
    }
}

fn column(field: &DMatrix<Complex64>, j: usize) -> &[Complex64] {
    let nx = field.nrows();
    &field.as_slice()[j * nx..(j + 1) * nx]
}

#[test]
fn test_fundamental_launch_field() {
    let x = linspace(-25.0, 25.0, 256);
    let dx = x[1] - x[0];
    let e = slab_mode_source(&x, &guide(), 0, 0.0).unwrap();

    for i in 0..x.len() / 2 {
        assert_abs_diff_eq!(e[i].re, e[x.len() - 1 - i].re, epsilon = 1e-9);
        assert_eq!(e[i].im, 0.0);
    }
    let p: Vec<f64> = e.iter().map(|c| c.norm_sqr()).collect();
    assert_abs_diff_eq!(trapezoid(&p, &x), 1.0, epsilon = 1e-9);
    assert!(peak_position(e.as_slice(), &x).unwrap().abs() <= dx);
}

fn run_through(profile: &SBendWaveguide) -> (Grid, DMatrix<Complex64>) {
    let grid = Grid::uniform(-25.0, 25.0, 256, 0.0, 500.0, 2000).unwrap();
    let params = BpmParams {
        wavelength: WAVELENGTH,
        n0: 1.0,
    };
    let n_r2 = sample_index_map(profile, &grid);
    let absorber = PolynomialAbsorber::for_domain(-25.0, 25.0, WAVELENGTH).unwrap();
    let sigma_x = sample_damping(&absorber, &grid.x);
    let launch = slab_mode_source(&grid.x, &guide(), 0, profile.centre(grid.z[0])).unwrap();
    let field = propagate(&launch, &n_r2, &sigma_x, &grid, &params).unwrap();
    (grid, field)
}

#[test]
fn test_straight_waveguide_keeps_mode_on_axis() {
    let straight = SBendWaveguide::straight(1.0, 1.1, 1.0).unwrap();
    let (grid, field) = run_through(&straight);

    for j in 0..grid.nz() {
        assert!(peak_position(column(&field, j), &grid.x).unwrap().abs() <= 1.0, "peak left the core at z = {}", grid.z[j]);
    }
    let power = power_trace(&field, &grid.x);
    assert_abs_diff_eq!(power[0], 1.0, epsilon = 1e-9);
    for p in &power {
        assert!(p.is_finite());
        assert!(*p <= power[0] * 1.001);
    }
    // a guided mode loses almost nothing to the side layers
    assert!(power[grid.nz() - 1] > 0.9);
}

#[test]
fn test_s_bend_steers_mode_to_offset() {
    let bend = SBendWaveguide::new(5.0, 200.0, 1.0, 1.1, 1.0).unwrap();
    let (grid, field) = run_through(&bend);

    let exit = peak_position(column(&field, grid.nz() - 1), &grid.x).unwrap();
    assert!((exit - 5.0).abs() <= 1.0, "exit peak at {}", exit);
    let power = power_trace(&field, &grid.x);
    assert!(power.iter().all(|p| p.is_finite() && *p <= power[0] * 1.001));
}
