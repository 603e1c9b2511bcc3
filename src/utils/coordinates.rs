use crate::error::{BadspotError, Result};
use crate::utils::constants::{MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Validate that a latitude/longitude pair lies on the globe
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !(MIN_LAT..=MAX_LAT).contains(&latitude) {
        return Err(BadspotError::InvalidFormat(format!(
            "Latitude {} is outside bounds [{}, {}]",
            latitude, MIN_LAT, MAX_LAT
        )));
    }

    if !(MIN_LON..=MAX_LON).contains(&longitude) {
        return Err(BadspotError::InvalidFormat(format!(
            "Longitude {} is outside bounds [{}, {}]",
            longitude, MIN_LON, MAX_LON
        )));
    }

    Ok(())
}

/// Arithmetic mean of a set of (latitude, longitude) points
///
/// # Examples
/// ```
/// use badspot_predictor::utils::coordinates::mean_center;
///
/// let center = mean_center(&[(-6.0, 106.0), (-7.0, 108.0)]).unwrap();
/// assert!((center.0 - -6.5).abs() < 1e-9);
/// assert!((center.1 - 107.0).abs() < 1e-9);
/// ```
pub fn mean_center(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let (lat_sum, lon_sum) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.0, lon + p.1));

    Some((lat_sum / n, lon_sum / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(validate_coordinates(-6.2088, 106.8456).is_ok()); // Jakarta
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
    }

    #[test]
    fn test_mean_center() {
        assert_eq!(mean_center(&[]), None);
        assert_eq!(mean_center(&[(1.0, 2.0)]), Some((1.0, 2.0)));

        let center = mean_center(&[(0.0, 0.0), (2.0, 4.0), (4.0, 8.0)]).unwrap();
        assert!((center.0 - 2.0).abs() < 1e-12);
        assert!((center.1 - 4.0).abs() < 1e-12);
    }
}
