//! Great-circle distances on a spherical Earth.
//!
//! Distances are kept unrounded for filtering and ordering; `round_for_display`
//! is only applied when a value is written into a response.

use crate::models::GeoPoint;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius used by the general provider and task searches.
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;

/// The farmer search looks twice as far.
pub const FARMER_SEARCH_RADIUS_KM: f64 = 100.0;

/// Anything that sits somewhere on the map.
pub trait Located {
    fn location(&self) -> &GeoPoint;
}

impl Located for crate::models::User {
    fn location(&self) -> &GeoPoint {
        &self.location
    }
}

impl Located for crate::models::Task {
    fn location(&self) -> &GeoPoint {
        &self.location
    }
}

/// Haversine distance in kilometres between two points given in degrees.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let d_lat = (b.latitude() - a.latitude()).to_radians();
    let d_lon = (b.longitude() - a.longitude()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two points, or `None` when either is the unset placeholder.
pub fn known_distance_km(a: &GeoPoint, b: &GeoPoint) -> Option<f64> {
    match (a.known(), b.known()) {
        (Some(a), Some(b)) => Some(distance_km(a, b)),
        _ => None,
    }
}

pub fn round_for_display(distance_km: f64) -> f64 {
    (distance_km * 10.0).round() / 10.0
}

/// Keeps the candidates within `max_distance_km` of `center`, paired with their
/// unrounded distance. Candidates without a known location are dropped.
pub fn within_radius<T: Located>(
    candidates: Vec<T>,
    center: &GeoPoint,
    max_distance_km: f64,
) -> Vec<(T, f64)> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let distance = known_distance_km(center, candidate.location())?;
            (distance <= max_distance_km).then_some((candidate, distance))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Pin(GeoPoint);

    impl Located for Pin {
        fn location(&self) -> &GeoPoint {
            &self.0
        }
    }

    #[rstest]
    #[case(GeoPoint::new(77.6, 12.9))]
    #[case(GeoPoint::new(-122.42, 37.77))]
    #[case(GeoPoint::new(180.0, -90.0))]
    fn distance_to_self_is_zero(#[case] p: GeoPoint) {
        assert_eq!(distance_km(&p, &p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (GeoPoint::new(77.6, 12.9), GeoPoint::new(77.65, 12.95)),
            (GeoPoint::new(-0.1276, 51.5072), GeoPoint::new(2.3522, 48.8566)),
            (GeoPoint::new(179.9, 10.0), GeoPoint::new(-179.9, -10.0)),
        ];
        for (a, b) in pairs {
            assert!((distance_km(&a, &b) - distance_km(&b, &a)).abs() < 1e-9);
        }
    }

    #[test]
    fn london_to_paris_is_about_344_km() {
        let london = GeoPoint::new(-0.1276, 51.5072);
        let paris = GeoPoint::new(2.3522, 48.8566);
        let d = distance_km(&london, &paris);
        assert!((d - 343.6).abs() < 1.0, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_km(&GeoPoint::new(10.0, 0.0), &GeoPoint::new(10.0, 1.0));
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn unset_points_have_no_distance() {
        let somewhere = GeoPoint::new(77.6, 12.9);
        assert_eq!(known_distance_km(&GeoPoint::unset(), &somewhere), None);
        assert_eq!(known_distance_km(&somewhere, &GeoPoint::unset()), None);
    }

    #[test]
    fn display_rounding_keeps_one_decimal() {
        assert_eq!(round_for_display(7.249), 7.2);
        assert_eq!(round_for_display(7.25), 7.3);
        assert_eq!(round_for_display(0.04), 0.0);
    }

    #[test]
    fn within_radius_filters_on_unrounded_distance() {
        let center = GeoPoint::new(77.65, 12.95);
        let near = Pin(GeoPoint::new(77.6, 12.9));
        let far = Pin(GeoPoint::new(72.87, 19.07)); // Mumbai
        let nowhere = Pin(GeoPoint::unset());

        let kept = within_radius(vec![near, far, nowhere], &center, DEFAULT_SEARCH_RADIUS_KM);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0.0, GeoPoint::new(77.6, 12.9));
        assert!(kept[0].1 > 7.0 && kept[0].1 < 8.0);

        let exact = distance_km(&center, &GeoPoint::new(77.6, 12.9));
        assert_eq!(within_radius(vec![Pin(GeoPoint::new(77.6, 12.9))], &center, exact).len(), 1);
        assert!(within_radius(vec![Pin(GeoPoint::new(77.6, 12.9))], &center, exact - 1e-6).is_empty());
    }
}
