mod common;

use common::*;
use ndarray::Array2;
use std::sync::Arc;
use toposub::core::dem_tile::{build_dem_tile, extend_footprint};
use toposub::core::geometry::compute_corners;
use toposub::core::height_range::estimate_height_range;
use toposub::io::{DemContext, ElevationSource, RasterElevationModel};
use toposub::types::{ElevationRange, GeoTransform, Window};

fn dem_context(source: ConstantDem) -> DemContext {
    DemContext::from_source("constant", Arc::new(source))
}

#[test]
fn test_tile_grows_with_terrain_height() {
    init_logging();
    let meta = metadata("S1A_REF");
    let orbit = fitted_orbit(0.0);
    let window = Window::new(0, 99, 0, 99);
    let dem = dem_context(ConstantDem::new(500.0));

    let tile = build_dem_tile(&window, &meta, &orbit, &dem, 100)
        .unwrap()
        .expect("scene lies inside DEM coverage");

    assert!(tile.n_lat_pixels > 100, "n_lat = {}", tile.n_lat_pixels);
    assert!(tile.n_lon_pixels > 100, "n_lon = {}", tile.n_lon_pixels);
    assert_eq!(tile.data.dim(), (tile.n_lat_pixels, tile.n_lon_pixels));
    assert!(tile.data.iter().all(|&h| h == 500.0));

    // constant 500 m terrain: heights [500, 1000] with a 100 % extension
    let footprint = extend_footprint(
        &window,
        &meta,
        &orbit,
        &ElevationRange::new(500.0, 1000.0),
        dem.source.as_ref(),
    )
    .unwrap();
    let anchor = dem.source.index_to_geodetic(&footprint.upper_left).to_radians();
    assert!((tile.lat0 - anchor.lat).abs() < 1e-12);
    assert!((tile.lon0 - anchor.lon).abs() < 1e-12);
    assert!((tile.lat_spacing - DEM_SPACING_DEG.to_radians()).abs() < 1e-15);

    // the ellipsoid footprint lies strictly inside the tile
    let corners = compute_corners(&meta, &orbit, &window, 0.0).unwrap();
    let lat_bottom = tile.lat0 - (tile.n_lat_pixels - 1) as f64 * tile.lat_spacing;
    let lon_right = tile.lon0 + (tile.n_lon_pixels - 1) as f64 * tile.lon_spacing;
    assert!(corners[0].lat <= tile.lat0 && corners[0].lon >= tile.lon0);
    assert!(corners[1].lat >= lat_bottom && corners[1].lon <= lon_right);
}

#[test]
fn test_flat_terrain_needs_no_margin() {
    let meta = metadata("S1A_REF");
    let orbit = fitted_orbit(0.0);
    let window = Window::new(0, 99, 0, 99);
    let dem = dem_context(ConstantDem::new(0.0));

    let flat = build_dem_tile(&window, &meta, &orbit, &dem, 100).unwrap().unwrap();
    let hilly_dem = dem_context(ConstantDem::new(800.0));
    let hilly = build_dem_tile(&window, &meta, &orbit, &hilly_dem, 100).unwrap().unwrap();

    assert!(flat.n_lon_pixels < hilly.n_lon_pixels);
    assert!(flat.n_lat_pixels <= hilly.n_lat_pixels);
}

#[test]
fn test_all_nan_source_gives_no_data_tile() {
    init_logging();
    let meta = metadata("S1A_REF");
    let orbit = fitted_orbit(0.0);
    let window = Window::new(0, 99, 0, 99);
    let source = ConstantDem::new(f64::NAN);

    let corners = compute_corners(&meta, &orbit, &window, 0.0).unwrap();
    let ul = source.geodetic_to_index(&corners[0].to_degrees());
    let lr = source.geodetic_to_index(&corners[1].to_degrees());
    let initial = Window::new(
        ul.y.round() as i64,
        lr.y.round() as i64,
        ul.x.round() as i64,
        lr.x.round() as i64,
    );
    assert_eq!(
        estimate_height_range(&initial, 100, &source, NO_DATA),
        ElevationRange::new(0.0, 0.0)
    );

    // a zero range still yields a valid footprint
    let footprint =
        extend_footprint(&window, &meta, &orbit, &ElevationRange::sea_level(), &source).unwrap();
    assert!(footprint.n_lat_pixels() > 1 && footprint.n_lon_pixels() > 1);

    let dem = dem_context(source);
    let tile = build_dem_tile(&window, &meta, &orbit, &dem, 100).unwrap().unwrap();
    assert!(tile.is_empty());
    assert!(tile.data.iter().all(|&h| h == NO_DATA));
    assert_eq!(tile.n_lat_pixels, footprint.n_lat_pixels());
    assert_eq!(tile.n_lon_pixels, footprint.n_lon_pixels());
}

#[test]
fn test_footprint_corners_round_trip() {
    let meta = metadata("S1A_REF");
    let orbit = fitted_orbit(0.0);
    let source = ConstantDem::new(350.0);

    for window in [
        Window::new(0, 99, 0, 99),
        Window::new(10, 40, 60, 99),
        Window::new(0, 0, 0, 0),
    ] {
        let footprint = extend_footprint(
            &window,
            &meta,
            &orbit,
            &ElevationRange::new(350.0, 700.0),
            &source,
        )
        .unwrap();

        for corner in [footprint.upper_left, footprint.lower_right] {
            let geo = source.index_to_geodetic(&corner);
            assert!(geo.is_valid());
            let back = source.geodetic_to_index(&geo);
            assert!((back.x - corner.x).abs() <= 1.0);
            assert!((back.y - corner.y).abs() <= 1.0);
        }
    }
}

#[test]
fn test_outside_coverage_is_not_an_error() {
    let meta = metadata("S1A_REF");
    let orbit = fitted_orbit(0.0);
    let window = Window::new(0, 99, 0, 99);
    let dem = dem_context(ConstantDem::limited_to(200.0, 10.0, 20.0));

    let tile = build_dem_tile(&window, &meta, &orbit, &dem, 100).unwrap();
    assert!(tile.is_none());
}

/// North-up raster at 0.01° spacing whose heights encode each row's latitude
fn latitude_raster() -> RasterElevationModel {
    let spacing = 0.01;
    let data = Array2::from_shape_fn((200, 1200), |(row, _)| {
        ((1.0 - row as f64 * spacing) * 1e4) as f32
    });
    let transform = GeoTransform {
        top_left_x: -6.0,
        pixel_width: spacing,
        rotation_x: 0.0,
        top_left_y: 1.0,
        rotation_y: 0.0,
        pixel_height: -spacing,
    };
    RasterElevationModel::new(data, transform, NO_DATA).unwrap()
}

#[test]
fn test_tile_rows_follow_raster_latitude() {
    let meta = metadata("S1A_REF");
    let orbit = fitted_orbit(0.0);
    let window = Window::new(0, 99, 0, 99);
    let dem = DemContext::from_source("latitude", Arc::new(latitude_raster()));

    let tile = build_dem_tile(&window, &meta, &orbit, &dem, 100).unwrap().unwrap();
    assert!(tile.n_lat_pixels > 1);

    for row in 0..tile.n_lat_pixels {
        let lat = tile.position(row, 0).lat.to_degrees();
        let height = tile.data[[row, 0]];
        assert!(
            (height - lat * 1e4).abs() < 1.0,
            "row {}: height {} at latitude {}",
            row,
            height,
            lat
        );
    }
}
