use crate::config::EARTH_RADIUS_KM;
use crate::models::Coordinate;

/// Great-circle distance between two coordinates (haversine), in kilometres.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// The point `km` kilometres due north of `origin` along its meridian.
#[cfg(test)]
pub(crate) fn offset_north(origin: Coordinate, km: f64) -> Coordinate {
    let delta_deg = (km / EARTH_RADIUS_KM).to_degrees();
    Coordinate {
        latitude: origin.latitude + delta_deg,
        longitude: origin.longitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn same_point_is_zero() {
        for c in [coord(0.0, 0.0), coord(51.5074, -0.1278), coord(-33.86, 151.21), coord(90.0, 0.0)] {
            assert_eq!(distance_km(c, c), 0.0);
        }
    }

    #[test]
    fn symmetric() {
        let pairs = [
            (coord(12.9716, 77.5946), coord(28.7041, 77.1025)),
            (coord(-33.86, 151.21), coord(40.71, -74.0)),
            (coord(0.0, 179.9), coord(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_km(a, b), distance_km(b, a));
        }
    }

    #[test]
    fn known_distance_london_paris() {
        let london = coord(51.5074, -0.1278);
        let paris = coord(48.8566, 2.3522);
        let d = distance_km(london, paris);
        assert!((d - 343.5).abs() < 1.0, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_km(coord(0.0, 0.0), coord(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn offset_north_round_trips_distance() {
        let home = coord(10.0, 20.0);
        let d = distance_km(home, offset_north(home, 6.0));
        assert!((d - 6.0).abs() < 1e-9, "got {d}");
    }

    #[test]
    fn antipodal_points_do_not_nan() {
        let d = distance_km(coord(0.0, 0.0), coord(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }
}
