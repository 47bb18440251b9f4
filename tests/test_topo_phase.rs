mod common;

use common::*;
use std::sync::Arc;
use toposub::core::dem_tile::build_dem_tile;
use toposub::core::topo_phase::synthesize;
use toposub::io::DemContext;
use toposub::types::Window;

#[test]
fn test_constant_height_matches_flat_terrain_phase() {
    init_logging();
    let meta = metadata("S1A_REF");
    let ref_orbit = fitted_orbit(0.0);
    let cmp_orbit = fitted_orbit(BASELINE_ROTATION);
    let window = Window::new(0, 99, 0, 99);
    let dem = DemContext::from_source("constant", Arc::new(ConstantDem::new(500.0)));

    let tile = build_dem_tile(&window, &meta, &ref_orbit, &dem, 100).unwrap().unwrap();
    let result = synthesize(&meta, &ref_orbit, &meta, &cmp_orbit, &window, &tile, true).unwrap();

    assert_eq!(result.phase.dim(), (100, 100));
    assert!(result.valid.iter().all(|&v| v), "coverage {}", result.coverage());

    for &(line, pixel) in &[(0usize, 0usize), (0, 99), (50, 50), (99, 0), (99, 99), (23, 71)] {
        let expected = flat_terrain_phase(&meta, &ref_orbit, &cmp_orbit, line as f64, pixel as f64, 500.0);
        let actual = result.phase[[line, pixel]];
        assert!(
            (actual - expected).abs() < 0.05,
            "phase at ({}, {}): {} vs {}",
            line,
            pixel,
            actual,
            expected
        );
    }

    let elevation = result.elevation.expect("elevation requested");
    assert!(elevation.iter().all(|&h| (h - 500.0).abs() < 1e-6));
}

#[test]
fn test_phase_is_uniformly_flattened_plane() {
    // with constant terrain the simulated phase varies smoothly across the tile
    let meta = metadata("S1A_REF");
    let ref_orbit = fitted_orbit(0.0);
    let cmp_orbit = fitted_orbit(BASELINE_ROTATION);
    let window = Window::new(0, 99, 0, 99);
    let dem = DemContext::from_source("constant", Arc::new(ConstantDem::new(500.0)));

    let tile = build_dem_tile(&window, &meta, &ref_orbit, &dem, 100).unwrap().unwrap();
    let result = synthesize(&meta, &ref_orbit, &meta, &cmp_orbit, &window, &tile, false).unwrap();
    assert!(result.elevation.is_none());

    for line in 0..100 {
        for pixel in 1..99 {
            let second_difference = result.phase[[line, pixel + 1]] - 2.0 * result.phase[[line, pixel]]
                + result.phase[[line, pixel - 1]];
            assert!(second_difference.abs() < 0.01);
        }
    }
}

#[test]
fn test_zero_baseline_sea_level_has_no_phase() {
    let meta = metadata("S1A_REF");
    let orbit = fitted_orbit(0.0);
    let window = Window::new(20, 59, 30, 89);
    let dem = DemContext::from_source("sea", Arc::new(ConstantDem::new(0.0)));

    let tile = build_dem_tile(&window, &meta, &orbit, &dem, 100).unwrap().unwrap();
    let result = synthesize(&meta, &orbit, &meta, &orbit, &window, &tile, false).unwrap();

    assert_eq!(result.phase.dim(), window.shape());
    assert!(result.valid.iter().all(|&v| v));
    assert!(result.phase.iter().all(|&p| p.abs() < 1e-6));
}

#[test]
fn test_no_data_terrain_is_coded_at_sea_level() {
    let meta = metadata("S1A_REF");
    let ref_orbit = fitted_orbit(0.0);
    let cmp_orbit = fitted_orbit(BASELINE_ROTATION);
    let window = Window::new(40, 59, 40, 59);

    let missing = DemContext::from_source("missing", Arc::new(ConstantDem::new(NO_DATA)));
    let sea = DemContext::from_source("sea", Arc::new(ConstantDem::new(0.0)));

    let missing_tile = build_dem_tile(&window, &meta, &ref_orbit, &missing, 100).unwrap().unwrap();
    let sea_tile = build_dem_tile(&window, &meta, &ref_orbit, &sea, 100).unwrap().unwrap();
    assert!(missing_tile.is_empty());

    let from_missing =
        synthesize(&meta, &ref_orbit, &meta, &cmp_orbit, &window, &missing_tile, false).unwrap();
    let from_sea = synthesize(&meta, &ref_orbit, &meta, &cmp_orbit, &window, &sea_tile, false).unwrap();

    for (a, b) in from_missing.phase.iter().zip(from_sea.phase.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_cells_outside_dem_tile_are_no_data() {
    let meta = metadata("S1A_REF");
    let ref_orbit = fitted_orbit(0.0);
    let cmp_orbit = fitted_orbit(BASELINE_ROTATION);
    let dem = DemContext::from_source("constant", Arc::new(ConstantDem::new(100.0)));

    // tile built for the upper half only, synthesised over the full window
    let tile = build_dem_tile(&Window::new(0, 30, 0, 99), &meta, &ref_orbit, &dem, 0)
        .unwrap()
        .unwrap();
    let window = Window::new(0, 99, 0, 99);
    let result = synthesize(&meta, &ref_orbit, &meta, &cmp_orbit, &window, &tile, true).unwrap();

    assert!(result.valid[[0, 50]]);
    assert!(!result.valid[[99, 50]]);
    assert_eq!(result.phase[[99, 50]], NO_DATA);
    assert_eq!(result.elevation.as_ref().unwrap()[[99, 50]], NO_DATA);
    assert!(result.coverage() > 0.0 && result.coverage() < 1.0);
}
