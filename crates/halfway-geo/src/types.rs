//! Shared types for the halfway geodesic search core.

use serde::{Deserialize, Serialize};

/// A position on the sphere in decimal degrees.
///
/// Latitude is in `[-90, 90]`, longitude in `[-180, 180]`. Coordinate
/// validation happens in the external loader before values reach this
/// crate; the core only performs defensive bounds handling (longitude
/// wrapping, latitude clamping) where its own arithmetic could leave
/// the range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in decimal degrees, positive north.
    pub lat: f64,
    /// Longitude in decimal degrees, positive east.
    pub lng: f64,
}

impl LatLng {
    /// Create a new position.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A candidate location supplied by the external loader.
///
/// Owned by the caller; the search core only ever borrows slices of
/// these read-only. `radius_m` and `title` are carried for the
/// surrounding application (marker rendering, labels) and do not
/// participate in scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
    /// Marker radius in meters.
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,
    /// Optional display label.
    #[serde(default)]
    pub title: Option<String>,
}

fn default_radius_m() -> f64 {
    GeoPoint::DEFAULT_RADIUS_M
}

impl GeoPoint {
    /// Default marker radius in meters (10 km), applied when a record
    /// omits one.
    pub const DEFAULT_RADIUS_M: f64 = 10_000.0;

    /// Create a point with the default radius and no title.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            radius_m: Self::DEFAULT_RADIUS_M,
            title: None,
        }
    }

    /// The point's position, without marker metadata.
    #[must_use]
    pub const fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// One scored pairing from a combination search.
///
/// `index_a` and `index_b` are positional references into the caller's
/// point slices, valid only for the duration of one search. The score
/// is the geodesic distance in kilometers from the pair's midpoint to
/// the query target; lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combination {
    /// Index into the first point slice.
    pub index_a: u32,
    /// Index into the second point slice.
    pub index_b: u32,
    /// Distance from `midpoint` to the target, in kilometers.
    pub score: f64,
    /// Geodesic midpoint of the pair.
    pub midpoint: LatLng,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn latlng_new() {
        let p = LatLng::new(52.5, 13.4);
        assert!((p.lat - 52.5).abs() < f64::EPSILON);
        assert!((p.lng - 13.4).abs() < f64::EPSILON);
    }

    #[test]
    fn geo_point_position_strips_metadata() {
        let p = GeoPoint {
            lat: 1.0,
            lng: 2.0,
            radius_m: 500.0,
            title: Some("Cafe".into()),
        };
        assert_eq!(p.position(), LatLng::new(1.0, 2.0));
    }

    #[test]
    fn geo_point_default_radius() {
        let p = GeoPoint::new(0.0, 0.0);
        assert!((p.radius_m - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn geo_point_deserialize_fills_defaults() {
        let p: GeoPoint = serde_json::from_str(r#"{"lat": 48.1, "lng": 11.6}"#).unwrap();
        assert!((p.radius_m - 10_000.0).abs() < f64::EPSILON);
        assert!(p.title.is_none());
    }

    #[test]
    fn combination_serde_uses_wire_field_names() {
        let combo = Combination {
            index_a: 3,
            index_b: 7,
            score: 12.5,
            midpoint: LatLng::new(1.0, 2.0),
        };
        let json = serde_json::to_string(&combo).unwrap();
        assert!(json.contains("\"indexA\":3"), "json: {json}");
        assert!(json.contains("\"indexB\":7"), "json: {json}");
        assert!(json.contains("\"midpoint\""), "json: {json}");
        let back: Combination = serde_json::from_str(&json).unwrap();
        assert_eq!(back, combo);
    }
}
