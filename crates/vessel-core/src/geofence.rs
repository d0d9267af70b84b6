use serde::{Deserialize, Serialize};

/// A user-defined area used by the geofence evaluator (§4.5.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: String,
    pub client_id: String,
    pub name: String,
    #[serde(flatten)]
    pub shape: GeofenceShape,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "geofenceType", rename_all = "lowercase")]
pub enum GeofenceShape {
    Polygon { coordinates: Vec<[f64; 2]> },
    Circle {
        center_lng: f64,
        center_lat: f64,
        radius_km: f64,
    },
}

/// Mean Earth radius in kilometres, used for the haversine great-circle
/// distance computation below.
const EARTH_RADIUS_KM: f64 = 6371.0088;

impl Geofence {
    /// Whether `(lat, lng)` falls inside this geofence. Invalid shapes
    /// (polygons with fewer than 4 ring points) never contain a point.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        if !lat.is_finite() || !lng.is_finite() {
            return false;
        }
        match &self.shape {
            GeofenceShape::Polygon { coordinates } => point_in_ring(coordinates, lng, lat),
            GeofenceShape::Circle {
                center_lng,
                center_lat,
                radius_km,
            } => haversine_km(lat, lng, *center_lat, *center_lng) <= *radius_km,
        }
    }
}

/// Ray-casting point-in-polygon test over a ring of `[lng, lat]` points.
///
/// The ring is logically closed: if the first point doesn't equal the
/// last, the first point is implicitly appended. A ring given with fewer
/// than 4 coordinates is invalid and never contains a point.
fn point_in_ring(ring: &[[f64; 2]], x: f64, y: f64) -> bool {
    if ring.len() < 4 {
        return false;
    }
    let mut closed = ring.to_vec();
    if closed.first() != closed.last() {
        closed.push(closed[0]);
    }

    let mut inside = false;
    let n = closed.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (closed[i][0], closed[i][1]);
        let (xj, yj) = (closed[j][0], closed[j][1]);
        let intersects = ((yi > y) != (yj > y))
            && (x < (xj - xi) * (y - yi) / (yj - yi) + xi);
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Great-circle distance between two lat/lng points, in kilometres.
fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geofence {
        Geofence {
            id: "g1".into(),
            client_id: "c1".into(),
            name: "square".into(),
            shape: GeofenceShape::Polygon {
                coordinates: vec![
                    [103.7, 1.2],
                    [103.9, 1.2],
                    [103.9, 1.4],
                    [103.7, 1.4],
                ],
            },
            is_active: true,
        }
    }

    #[test]
    fn point_outside_then_inside_square() {
        let g = square();
        assert!(!g.contains(1.3, 103.6));
        assert!(g.contains(1.3, 103.8));
    }

    #[test]
    fn ring_without_explicit_closure_still_closes() {
        let g = square();
        // first point [103.7, 1.2] != last point [103.7, 1.4] in the fixture
        // above, so closure is exercised implicitly by every contains() call.
        assert!(g.contains(1.3, 103.8));
    }

    #[test]
    fn degenerate_polygon_never_contains() {
        let g = Geofence {
            id: "g2".into(),
            client_id: "c1".into(),
            name: "degenerate".into(),
            shape: GeofenceShape::Polygon {
                coordinates: vec![[0.0, 0.0], [1.0, 1.0]],
            },
            is_active: true,
        };
        assert!(!g.contains(0.5, 0.5));
    }

    #[test]
    fn circle_radius_boundary() {
        let g = Geofence {
            id: "g3".into(),
            client_id: "c1".into(),
            name: "circle".into(),
            shape: GeofenceShape::Circle {
                center_lng: 103.8,
                center_lat: 1.3,
                radius_km: 5.0,
            },
            is_active: true,
        };
        assert!(g.contains(1.3, 103.8));
        assert!(!g.contains(1.3, 105.0));
    }

    #[test]
    fn invalid_coordinates_never_contained() {
        let g = square();
        assert!(!g.contains(f64::NAN, 103.8));
    }
}
