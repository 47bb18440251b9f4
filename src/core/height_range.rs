//! Terrain height bounds of a DEM window from a sparse sample.

use crate::io::dem::ElevationSource;
use crate::types::{ElevationRange, Window};

/// Fewer valid samples than this and the tile is treated as sea level
const MIN_VALID_SAMPLES: usize = 3;

/// Spread `n` points pseudo-uniformly over `window`.
///
/// Points are laid out row by row along a virtual strip of `pixels * rows`
/// samples, so the line spacing stays close to the pixel spacing whatever
/// the window aspect ratio. Returned as `(line, pixel)` pairs inside the
/// window.
pub fn distribute_points(n: usize, window: &Window) -> Vec<(i64, i64)> {
    if n == 0 {
        return Vec::new();
    }

    let lines = window.lines() as f64;
    let pixels = window.pixels() as f64;
    let count = n as f64;

    let win_p = (count / (lines / pixels)).sqrt();
    let win_l = (count / win_p).max(win_p);
    let rows = win_l.floor();

    let delta_line = if rows > 1.0 { (lines - 1.0) / (rows - 1.0) } else { 0.0 };
    let total_pixels = (pixels * rows).floor();
    let delta_pixel = if n > 1 { (total_pixels - 1.0) / (count - 1.0) } else { 0.0 };

    let mut points = Vec::with_capacity(n);
    let mut pixel = -delta_pixel;
    let mut row = 0.0;
    for _ in 0..n {
        pixel += delta_pixel;
        while pixel.round() >= pixels {
            pixel -= pixels;
            row += 1.0;
        }
        points.push((
            window.line_lo + (row * delta_line).round() as i64,
            window.pixel_lo + pixel.round() as i64,
        ));
    }

    points
}

/// Bound the terrain height over a DEM window.
///
/// `dem_window` is the tile footprint in DEM indices (line = row, pixel =
/// column). Statistics are taken over the window grown by
/// `1 + extension_percent / 100` times its size on every side, with a
/// sample count of `10 * (width * height)^(1/4)`. The maximum is scaled by
/// the same factor. Missing, NaN and no-data samples are ignored; with
/// fewer than three valid samples the range is sea level, `(0, 0)`.
pub fn estimate_height_range(
    dem_window: &Window,
    extension_percent: u32,
    source: &dyn ElevationSource,
    no_data_value: f64,
) -> ElevationRange {
    let factor = 1.0 + extension_percent as f64 / 100.0;
    let width = dem_window.pixels() as f64;
    let height = dem_window.lines() as f64;

    let num_points = (10.0 * (width * height).sqrt().sqrt()) as usize;
    let offset_x = (factor * width) as i64;
    let offset_y = (factor * height) as i64;

    let sampling_window = Window::new(
        dem_window.line_lo - offset_y,
        dem_window.line_hi + offset_y,
        dem_window.pixel_lo - offset_x,
        dem_window.pixel_hi + offset_x,
    );

    let heights: Vec<f64> = distribute_points(num_points, &sampling_window)
        .into_iter()
        .filter_map(|(line, pixel)| source.valid_sample(pixel, line))
        .filter(|h| *h != no_data_value)
        .collect();

    if heights.len() < MIN_VALID_SAMPLES {
        log::debug!(
            "Only {} valid elevation samples around DEM window {}, assuming sea level",
            heights.len(),
            dem_window
        );
        return ElevationRange::sea_level();
    }

    let min_height = heights.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_height = heights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    ElevationRange::new(min_height, max_height * factor)
}
