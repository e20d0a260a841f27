use crate::coordinate::Coordinate;

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn haversine_distance(start: &Coordinate, end: &Coordinate) -> f64 {
    let lat1 = start.latitude.to_radians();
    let lat2 = end.latitude.to_radians();
    let d_lat = (end.latitude - start.latitude).to_radians();
    let d_lng = (end.longitude - start.longitude).to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lng / 2.).powi(2);
    let c = 2. * f64::atan2(a.sqrt(), (1. - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        let a = Coordinate::new(56.158405, 10.206034);
        assert_eq!(haversine_distance(&a, &a), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(40.122151, 44.658078);
        let b = Coordinate::new(56.158405, 10.206034);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
        assert!(haversine_distance(&a, &b) > 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_distance(&Coordinate::new(0., 0.), &Coordinate::new(1., 0.));
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn short_hop_matches_reference() {
        // 0.0005 degrees of latitude
        let d = Coordinate::new(0., 0.).distance_to(&Coordinate::new(0.0005, 0.));
        assert!((d - 55.597).abs() < 0.01, "got {d}");
    }
}
