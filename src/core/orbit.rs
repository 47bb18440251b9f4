//! Polynomial orbit model and zero-Doppler geocoding.

use crate::core::geometry::{xyz2ell, SlcMetadata, WGS84_A, WGS84_B};
use crate::types::{GeoPoint, LookSide, OrbitData, SarError, SarResult};
use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, Matrix3, Vector3};

const MAX_ITERATIONS: usize = 20;
const AZIMUTH_TIME_TOLERANCE: f64 = 1e-10; // seconds
const POSITION_TOLERANCE: f64 = 1e-6; // meters

/// Image coordinates of a ground point in one acquisition
#[derive(Debug, Clone, Copy)]
pub struct RadarCoordinate {
    pub line: f64,
    pub pixel: f64,
    /// Zero-Doppler azimuth time, seconds since the orbit reference
    pub azimuth_time: f64,
    pub slant_range: f64,
}

/// Satellite trajectory as a least-squares polynomial in time.
///
/// Time is handled as seconds since `reference_time` and normalised to
/// [-1, 1] over the span of the fitted state vectors.
#[derive(Debug, Clone)]
pub struct OrbitModel {
    reference_time: DateTime<Utc>,
    time_centre: f64,
    time_half_span: f64,
    degree: usize,
    coefficients: Vec<[f64; 3]>,
}

impl OrbitModel {
    /// Fit a polynomial of `degree` to the orbit state vectors
    pub fn fit(orbit: &OrbitData, degree: usize) -> SarResult<Self> {
        let state_vectors = &orbit.state_vectors;
        if state_vectors.len() < 2 {
            return Err(SarError::Processing(format!(
                "At least 2 state vectors are needed for orbit interpolation, got {}",
                state_vectors.len()
            )));
        }

        let mut degree = degree.max(1);
        if state_vectors.len() <= degree {
            log::warn!(
                "Only {} state vectors available, reducing orbit polynomial degree from {} to {}",
                state_vectors.len(),
                degree,
                state_vectors.len() - 1
            );
            degree = state_vectors.len() - 1;
        }

        let reference_time = orbit.reference_time;
        let times: Vec<f64> = state_vectors
            .iter()
            .map(|sv| seconds_between(reference_time, sv.time))
            .collect();

        let t_min = times.iter().cloned().fold(f64::INFINITY, f64::min);
        let t_max = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let time_centre = 0.5 * (t_min + t_max);
        let time_half_span = 0.5 * (t_max - t_min);
        if time_half_span <= 0.0 {
            return Err(SarError::Processing(
                "Orbit state vectors do not span any time interval".to_string(),
            ));
        }

        let n = state_vectors.len();
        let design = DMatrix::<f64>::from_fn(n, degree + 1, |i, k| {
            ((times[i] - time_centre) / time_half_span).powi(k as i32)
        });
        let positions = DMatrix::<f64>::from_fn(n, 3, |i, c| state_vectors[i].position[c]);

        let solution = design
            .svd(true, true)
            .solve(&positions, 1e-12)
            .map_err(|e| SarError::Processing(format!("Orbit polynomial fit failed: {}", e)))?;

        let coefficients = (0..=degree)
            .map(|k| [solution[(k, 0)], solution[(k, 1)], solution[(k, 2)]])
            .collect();

        log::debug!(
            "Fitted degree {} orbit polynomial to {} state vectors ({:.1} s span)",
            degree,
            n,
            t_max - t_min
        );

        Ok(Self {
            reference_time,
            time_centre,
            time_half_span,
            degree,
            coefficients,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    /// Seconds between the orbit reference and `time`
    pub fn relative_time(&self, time: DateTime<Utc>) -> f64 {
        seconds_between(self.reference_time, time)
    }

    fn normalise(&self, t: f64) -> f64 {
        (t - self.time_centre) / self.time_half_span
    }

    /// Satellite position (ECEF) at `t` seconds since the reference
    pub fn position(&self, t: f64) -> Vector3<f64> {
        let u = self.normalise(t);
        let mut result = [0.0; 3];
        for coeff in self.coefficients.iter().rev() {
            for c in 0..3 {
                result[c] = result[c] * u + coeff[c];
            }
        }
        Vector3::from(result)
    }

    /// Satellite velocity (m/s)
    pub fn velocity(&self, t: f64) -> Vector3<f64> {
        let u = self.normalise(t);
        let mut result = Vector3::zeros();
        for (k, coeff) in self.coefficients.iter().enumerate().skip(1) {
            let factor = k as f64 * u.powi(k as i32 - 1);
            result += Vector3::from(*coeff) * factor;
        }
        result / self.time_half_span
    }

    /// Satellite acceleration (m/s²)
    pub fn acceleration(&self, t: f64) -> Vector3<f64> {
        let u = self.normalise(t);
        let mut result = Vector3::zeros();
        for (k, coeff) in self.coefficients.iter().enumerate().skip(2) {
            let factor = (k * (k - 1)) as f64 * u.powi(k as i32 - 2);
            result += Vector3::from(*coeff) * factor;
        }
        result / (self.time_half_span * self.time_half_span)
    }

    /// Azimuth time of the first image line, relative to the orbit reference
    pub fn first_line_time(&self, meta: &SlcMetadata) -> f64 {
        self.relative_time(meta.first_line_time)
    }

    pub fn line_to_time(&self, line: f64, meta: &SlcMetadata) -> f64 {
        self.first_line_time(meta) + line / meta.prf
    }

    /// Zero-Doppler azimuth time of a ground point, starting at scene centre
    pub fn xyz2t(&self, point: &Vector3<f64>, meta: &SlcMetadata) -> SarResult<f64> {
        let t_centre = self.line_to_time(meta.num_lines as f64 / 2.0, meta);
        self.xyz2t_from(point, t_centre)
    }

    /// Zero-Doppler azimuth time of a ground point from an initial guess
    pub fn xyz2t_from(&self, point: &Vector3<f64>, t_init: f64) -> SarResult<f64> {
        let mut t = t_init;
        for _ in 0..MAX_ITERATIONS {
            let delta = point - self.position(t);
            let velocity = self.velocity(t);
            let doppler = delta.dot(&velocity);
            let derivative = delta.dot(&self.acceleration(t)) - velocity.dot(&velocity);

            if derivative == 0.0 || !derivative.is_finite() {
                break;
            }

            let step = doppler / derivative;
            t -= step;
            if step.abs() < AZIMUTH_TIME_TOLERANCE {
                return Ok(t);
            }
        }

        Err(SarError::Geocoding(format!(
            "Zero-Doppler time did not converge for point [{:.1}, {:.1}, {:.1}]",
            point.x, point.y, point.z
        )))
    }

    /// Radar coordinates of a ground point
    pub fn xyz2lp(&self, point: &Vector3<f64>, meta: &SlcMetadata) -> SarResult<RadarCoordinate> {
        let t = self.xyz2t(point, meta)?;
        Ok(self.radar_coordinate_at(point, t, meta))
    }

    /// Radar coordinates of a ground point whose azimuth time is known
    pub fn radar_coordinate_at(
        &self,
        point: &Vector3<f64>,
        azimuth_time: f64,
        meta: &SlcMetadata,
    ) -> RadarCoordinate {
        let slant_range = (point - self.position(azimuth_time)).norm();
        RadarCoordinate {
            line: (azimuth_time - self.first_line_time(meta)) * meta.prf,
            pixel: meta.range_to_pixel(slant_range),
            azimuth_time,
            slant_range,
        }
    }

    /// Ground point (ECEF) of an image position at `height` above the ellipsoid.
    ///
    /// Solves the Doppler, range and ellipsoid equations by Newton iteration.
    pub fn lp2xyz(
        &self,
        line: f64,
        pixel: f64,
        height: f64,
        meta: &SlcMetadata,
    ) -> SarResult<Vector3<f64>> {
        let t = self.line_to_time(line, meta);
        let range = meta.pixel_to_range(pixel);
        let sat = self.position(t);
        let vel = self.velocity(t);

        let a = WGS84_A + height;
        let b = WGS84_B + height;

        // initial guess: nadir point shifted towards the look side
        let up = sat.normalize();
        let altitude = sat.norm() - a;
        let ground_range = (range * range - altitude * altitude).max(0.0).sqrt();
        let side = match meta.look_side {
            LookSide::Right => 1.0,
            LookSide::Left => -1.0,
        };
        let across = vel.cross(&up).normalize() * side;
        let mut point = up * a + across * ground_range;

        for _ in 0..MAX_ITERATIONS {
            let delta = point - sat;
            let residual = Vector3::new(
                vel.dot(&delta),
                delta.dot(&delta) - range * range,
                (point.x * point.x + point.y * point.y) / (a * a) + point.z * point.z / (b * b) - 1.0,
            );

            let jacobian = Matrix3::from_rows(&[
                vel.transpose(),
                (delta * 2.0).transpose(),
                Vector3::new(
                    2.0 * point.x / (a * a),
                    2.0 * point.y / (a * a),
                    2.0 * point.z / (b * b),
                )
                .transpose(),
            ]);

            let step = jacobian.lu().solve(&(-residual)).ok_or_else(|| {
                SarError::Geocoding(format!(
                    "Singular geometry at line {:.1}, pixel {:.1}",
                    line, pixel
                ))
            })?;

            point += step;
            if step.norm() < POSITION_TOLERANCE {
                return Ok(point);
            }
        }

        Err(SarError::Geocoding(format!(
            "Geocoding did not converge at line {:.1}, pixel {:.1}, height {:.1} m",
            line, pixel, height
        )))
    }

    /// Geodetic position of an image position at `height`
    pub fn lp2ell(
        &self,
        line: f64,
        pixel: f64,
        height: f64,
        meta: &SlcMetadata,
    ) -> SarResult<GeoPoint> {
        let xyz = self.lp2xyz(line, pixel, height, meta)?;
        Ok(xyz2ell(&xyz).0)
    }
}

/// Signed seconds from `from` to `to`
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    delta
        .num_nanoseconds()
        .map(|ns| ns as f64 * 1e-9)
        .unwrap_or(delta.num_milliseconds() as f64 * 1e-3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{ell2xyz, SPEED_OF_LIGHT};
    use crate::types::StateVector;
    use approx::assert_abs_diff_eq;
    use chrono::Duration;

    const GM: f64 = 3.986_004_418e14;
    const ORBIT_RADIUS: f64 = 7_071_000.0;

    fn create_test_orbit_data() -> OrbitData {
        let reference_time = DateTime::parse_from_rfc3339("2020-01-03T17:08:15Z")
            .unwrap()
            .with_timezone(&Utc);
        let omega = (GM / ORBIT_RADIUS.powi(3)).sqrt();

        let state_vectors = (-10..=10)
            .map(|i| {
                let t = i as f64 * 10.0;
                let (s, c) = (omega * t).sin_cos();
                StateVector {
                    time: reference_time + Duration::milliseconds((t * 1000.0) as i64),
                    position: [ORBIT_RADIUS * c, 0.0, ORBIT_RADIUS * s],
                    velocity: [-ORBIT_RADIUS * omega * s, 0.0, ORBIT_RADIUS * omega * c],
                }
            })
            .collect();

        OrbitData {
            state_vectors,
            reference_time,
        }
    }

    fn create_test_metadata(reference_time: DateTime<Utc>) -> SlcMetadata {
        SlcMetadata {
            product_id: "S1A_TEST".to_string(),
            mission: "S1A".to_string(),
            first_line_time: reference_time,
            prf: 250.0,
            slant_range_time: 2.0 * 850_000.0 / SPEED_OF_LIGHT,
            range_sampling_rate: 32.0e6,
            wavelength: 0.0555,
            look_side: LookSide::Right,
            num_lines: 100,
            num_pixels: 100,
        }
    }

    #[test]
    fn test_orbit_fit_reproduces_state_vectors() {
        let orbit_data = create_test_orbit_data();
        let orbit = OrbitModel::fit(&orbit_data, 5).unwrap();

        for sv in &orbit_data.state_vectors {
            let t = orbit.relative_time(sv.time);
            let position = orbit.position(t);
            let velocity = orbit.velocity(t);
            assert_abs_diff_eq!(position.x, sv.position[0], epsilon = 0.1);
            assert_abs_diff_eq!(position.z, sv.position[2], epsilon = 0.1);
            assert_abs_diff_eq!(velocity.z, sv.velocity[2], epsilon = 1e-2);
        }
    }

    #[test]
    fn test_orbit_fit_lowers_degree() {
        let mut orbit_data = create_test_orbit_data();
        orbit_data.state_vectors.truncate(3);
        let orbit = OrbitModel::fit(&orbit_data, 5).unwrap();
        assert_eq!(orbit.degree(), 2);

        orbit_data.state_vectors.truncate(1);
        assert!(OrbitModel::fit(&orbit_data, 3).is_err());
    }

    #[test]
    fn test_lp2xyz_satisfies_geometry() {
        let orbit_data = create_test_orbit_data();
        let orbit = OrbitModel::fit(&orbit_data, 5).unwrap();
        let meta = create_test_metadata(orbit_data.reference_time);

        let point = orbit.lp2xyz(50.0, 50.0, 0.0, &meta).unwrap();
        let t = orbit.line_to_time(50.0, &meta);
        let range = (point - orbit.position(t)).norm();

        assert_abs_diff_eq!(range, meta.pixel_to_range(50.0), epsilon = 1e-3);
        // right-looking while flying north: target lies east of the track
        let (geo, height) = xyz2ell(&point);
        assert!(geo.lon > 0.0);
        assert_abs_diff_eq!(height, 0.0, epsilon = 0.5);
    }

    #[test]
    fn test_xyz2lp_inverts_lp2xyz() {
        let orbit_data = create_test_orbit_data();
        let orbit = OrbitModel::fit(&orbit_data, 5).unwrap();
        let meta = create_test_metadata(orbit_data.reference_time);

        for &(line, pixel) in &[(0.0, 0.0), (37.5, 80.25), (99.0, 99.0)] {
            let point = orbit.lp2xyz(line, pixel, 350.0, &meta).unwrap();
            let coordinate = orbit.xyz2lp(&point, &meta).unwrap();
            assert_abs_diff_eq!(coordinate.line, line, epsilon = 1e-4);
            assert_abs_diff_eq!(coordinate.pixel, pixel, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_height_shifts_footprint_towards_sensor() {
        let orbit_data = create_test_orbit_data();
        let orbit = OrbitModel::fit(&orbit_data, 5).unwrap();
        let meta = create_test_metadata(orbit_data.reference_time);

        let low = orbit.lp2ell(50.0, 50.0, 0.0, &meta).unwrap();
        let high = orbit.lp2ell(50.0, 50.0, 500.0, &meta).unwrap();
        assert!(high.lon < low.lon);

        let ground = ell2xyz(&high, 500.0);
        let coordinate = orbit.xyz2lp(&ground, &meta).unwrap();
        assert_abs_diff_eq!(coordinate.pixel, 50.0, epsilon = 0.05);
    }
}
