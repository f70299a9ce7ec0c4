//! Spherical geodesic primitives: haversine distance, great-circle
//! midpoint, bearing, destination projection, and midpoint reflection.
//!
//! All public functions take and return decimal degrees; the math is
//! done in radians internally. Everything here is pure and `Copy`-in /
//! `Copy`-out, so it is safe to call from any number of threads (or
//! from the WASM worker and the main thread at once).

use crate::types::LatLng;

/// Mean Earth radius in kilometers (spherical model).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maximum source-to-target distance for which a reflection is
/// geometrically meaningful: half the Earth's circumference. Beyond
/// this, every bearing leads around the globe and "twice the distance"
/// stops denoting a unique point.
pub const MAX_REFLECT_DISTANCE_KM: f64 = 20_000.0;

#[inline]
fn to_rad(deg: f64) -> f64 {
    deg.to_radians()
}

#[inline]
fn to_deg(rad: f64) -> f64 {
    rad.to_degrees()
}

/// Wrap a longitude into `[-180, 180)`.
#[inline]
fn wrap_lng(lng: f64) -> f64 {
    (lng + 540.0).rem_euclid(360.0) - 180.0
}

/// Haversine great-circle distance between two points, in kilometers.
///
/// Satisfies `distance(p, p) == 0` and symmetry.
#[must_use]
pub fn distance(a: LatLng, b: LatLng) -> f64 {
    let lat_a = to_rad(a.lat);
    let lat_b = to_rad(b.lat);
    let d_lat = to_rad(b.lat - a.lat);
    let d_lng = to_rad(b.lng - a.lng);

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    // asin is safe here: h is in [0, 1] up to rounding; clamp the
    // sqrt argument so antipodal rounding noise cannot produce NaN.
    2.0 * EARTH_RADIUS_KM * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Geodesic midpoint of two points: the point equidistant from both on
/// the shorter great-circle arc between them.
///
/// Uses the Bx/By bearing formulation. For antipodal inputs the
/// midpoint is not unique; this returns one of the valid midpoints.
#[must_use]
pub fn midpoint(a: LatLng, b: LatLng) -> LatLng {
    let lat_a = to_rad(a.lat);
    let lng_a = to_rad(a.lng);
    let lat_b = to_rad(b.lat);
    let d_lng = to_rad(b.lng) - lng_a;

    let bx = lat_b.cos() * d_lng.cos();
    let by = lat_b.cos() * d_lng.sin();

    let lat_mid = (lat_a.sin() + lat_b.sin())
        .atan2(((lat_a.cos() + bx).powi(2) + by.powi(2)).sqrt());
    let lng_mid = lng_a + by.atan2(lat_a.cos() + bx);

    LatLng::new(to_deg(lat_mid), wrap_lng(to_deg(lng_mid)))
}

/// Initial great-circle bearing from `a` to `b`, in degrees `[0, 360)`.
#[must_use]
pub fn bearing(a: LatLng, b: LatLng) -> f64 {
    let lat_a = to_rad(a.lat);
    let lat_b = to_rad(b.lat);
    let d_lng = to_rad(b.lng - a.lng);

    let y = d_lng.sin() * lat_b.cos();
    let x = lat_a.cos().mul_add(lat_b.sin(), -(lat_a.sin() * lat_b.cos() * d_lng.cos()));

    to_deg(y.atan2(x)).rem_euclid(360.0)
}

/// Project a point `distance_km` along the great circle leaving
/// `origin` at `bearing_deg`.
#[must_use]
pub fn destination(origin: LatLng, bearing_deg: f64, distance_km: f64) -> LatLng {
    let lat = to_rad(origin.lat);
    let lng = to_rad(origin.lng);
    let brg = to_rad(bearing_deg);
    let ang = distance_km / EARTH_RADIUS_KM;

    let lat_d = (lat.sin() * ang.cos() + lat.cos() * ang.sin() * brg.cos()).asin();
    let lng_d = lng
        + (brg.sin() * ang.sin() * lat.cos()).atan2(ang.cos() - lat.sin() * lat_d.sin());

    LatLng::new(to_deg(lat_d), wrap_lng(to_deg(lng_d)))
}

/// Result of [`reflect`]: the mirrored point and the source-to-target
/// distance that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflection {
    /// The point whose midpoint with the source is the target.
    pub point: LatLng,
    /// Geodesic distance from source to target, in kilometers.
    pub distance_km: f64,
}

/// Mirror `source` through `target`: find the point R such that
/// `target` is the geodesic midpoint of `source` and R.
///
/// Returns `None` when the source-to-target distance exceeds
/// [`MAX_REFLECT_DISTANCE_KM`] — callers treat this as "no
/// reflection", not a failure.
#[must_use]
pub fn reflect(source: LatLng, target: LatLng) -> Option<Reflection> {
    let distance_km = distance(source, target);
    if distance_km > MAX_REFLECT_DISTANCE_KM {
        return None;
    }
    let point = destination(source, bearing(source, target), 2.0 * distance_km);
    Some(Reflection { point, distance_km })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EPS_KM: f64 = 1e-6;

    /// Vector-average midpoint, used to cross-check the Bx/By
    /// formulation: convert both points to 3D unit vectors, average,
    /// and project back to the sphere.
    fn midpoint_by_vectors(a: LatLng, b: LatLng) -> LatLng {
        let (la, na) = (a.lat.to_radians(), a.lng.to_radians());
        let (lb, nb) = (b.lat.to_radians(), b.lng.to_radians());
        let x = la.cos() * na.cos() + lb.cos() * nb.cos();
        let y = la.cos() * na.sin() + lb.cos() * nb.sin();
        let z = la.sin() + lb.sin();
        let hyp = x.hypot(y);
        LatLng::new(z.atan2(hyp).to_degrees(), y.atan2(x).to_degrees())
    }

    #[test]
    fn distance_to_self_is_zero() {
        for p in [
            LatLng::new(0.0, 0.0),
            LatLng::new(52.52, 13.405),
            LatLng::new(-33.86, 151.21),
            LatLng::new(89.9, -179.9),
        ] {
            assert!(distance(p, p).abs() < EPS_KM, "distance({p:?}, self) != 0");
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let a = LatLng::new(48.8566, 2.3522);
        let b = LatLng::new(40.7128, -74.0060);
        let ab = distance(a, b);
        let ba = distance(b, a);
        assert!((ab - ba).abs() < EPS_KM);
    }

    #[test]
    fn distance_matches_known_value() {
        // Paris -> New York is roughly 5837 km on the 6371 km sphere.
        let paris = LatLng::new(48.8566, 2.3522);
        let nyc = LatLng::new(40.7128, -74.0060);
        let d = distance(paris, nyc);
        assert!((d - 5837.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn quarter_circumference_along_equator() {
        let d = distance(LatLng::new(0.0, 0.0), LatLng::new(0.0, 90.0));
        let expected = EARTH_RADIUS_KM * std::f64::consts::FRAC_PI_2;
        assert!((d - expected).abs() < 1e-9, "got {d}, expected {expected}");
    }

    #[test]
    fn midpoint_on_equator() {
        let m = midpoint(LatLng::new(0.0, 0.0), LatLng::new(0.0, 10.0));
        assert!(m.lat.abs() < 1e-9);
        assert!((m.lng - 5.0).abs() < 1e-9);
    }

    #[test]
    fn midpoint_is_equidistant() {
        let pairs = [
            (LatLng::new(48.8566, 2.3522), LatLng::new(40.7128, -74.0060)),
            (LatLng::new(-33.86, 151.21), LatLng::new(35.68, 139.69)),
            (LatLng::new(10.0, 179.0), LatLng::new(-5.0, -179.0)),
        ];
        for (a, b) in pairs {
            let m = midpoint(a, b);
            let da = distance(a, m);
            let db = distance(b, m);
            let rel = (da - db).abs() / da.max(db);
            assert!(rel < 1e-6, "midpoint of {a:?}/{b:?} off by {rel}");
            // It also lies on the arc: the two halves sum to the whole.
            let whole = distance(a, b);
            assert!(((da + db) - whole).abs() / whole < 1e-6);
        }
    }

    #[test]
    fn midpoint_agrees_with_vector_average() {
        let pairs = [
            (LatLng::new(52.52, 13.405), LatLng::new(48.8566, 2.3522)),
            (LatLng::new(-12.0, 77.0), LatLng::new(30.0, -97.0)),
            (LatLng::new(60.0, 170.0), LatLng::new(55.0, -170.0)),
        ];
        for (a, b) in pairs {
            let m1 = midpoint(a, b);
            let m2 = midpoint_by_vectors(a, b);
            assert!((m1.lat - m2.lat).abs() < 1e-6, "{a:?}/{b:?}: {m1:?} vs {m2:?}");
            assert!((m1.lng - m2.lng).abs() < 1e-6, "{a:?}/{b:?}: {m1:?} vs {m2:?}");
        }
    }

    #[test]
    fn midpoint_crosses_antimeridian_cleanly() {
        let m = midpoint(LatLng::new(0.0, 179.0), LatLng::new(0.0, -179.0));
        assert!(m.lat.abs() < 1e-9);
        assert!(
            (m.lng - 180.0).abs() < 1e-9 || (m.lng + 180.0).abs() < 1e-9,
            "got {m:?}",
        );
    }

    #[test]
    fn bearing_due_east_on_equator() {
        let b = bearing(LatLng::new(0.0, 0.0), LatLng::new(0.0, 10.0));
        assert!((b - 90.0).abs() < 1e-9, "got {b}");
    }

    #[test]
    fn bearing_due_north() {
        let b = bearing(LatLng::new(0.0, 0.0), LatLng::new(10.0, 0.0));
        assert!(b.abs() < 1e-9, "got {b}");
    }

    #[test]
    fn destination_round_trips_distance() {
        let origin = LatLng::new(52.52, 13.405);
        let dest = destination(origin, 45.0, 1000.0);
        let d = distance(origin, dest);
        assert!((d - 1000.0).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn reflect_midpoint_recovers_target() {
        let cases = [
            (LatLng::new(0.0, 0.0), LatLng::new(0.0, 5.0)),
            (LatLng::new(52.52, 13.405), LatLng::new(48.8566, 2.3522)),
            (LatLng::new(-33.86, 151.21), LatLng::new(35.68, 139.69)),
        ];
        for (source, target) in cases {
            let r = reflect(source, target).unwrap();
            let m = midpoint(source, r.point);
            assert!(
                distance(m, target) < 1e-6,
                "midpoint(source, reflect) drifted: {m:?} vs {target:?}",
            );
            assert!((r.distance_km - distance(source, target)).abs() < EPS_KM);
        }
    }

    #[test]
    fn reflect_out_of_range_is_none() {
        // Within ~8 km of the antipode: past the 20000 km cutoff.
        let source = LatLng::new(0.0, 0.0);
        let target = LatLng::new(0.05, 179.95);
        assert!(distance(source, target) > MAX_REFLECT_DISTANCE_KM);
        assert!(reflect(source, target).is_none());
    }

    #[test]
    fn reflect_at_zero_distance_is_source() {
        let p = LatLng::new(10.0, 20.0);
        let r = reflect(p, p).unwrap();
        assert!(distance(r.point, p) < EPS_KM);
        assert!(r.distance_km.abs() < EPS_KM);
    }

    #[test]
    fn wrap_lng_stays_in_range() {
        assert!((wrap_lng(190.0) - -170.0).abs() < 1e-9);
        assert!((wrap_lng(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_lng(540.0) - -180.0).abs() < 1e-9);
        assert!((wrap_lng(0.0)).abs() < 1e-9);
    }
}
