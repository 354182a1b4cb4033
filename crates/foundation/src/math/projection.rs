//! Local equirectangular projection around a fixed origin.
//!
//! Accurate to a few metres over tens of kilometres, which is all a mesh
//! display needs. Longitude is scaled by `cos(origin latitude)` only; there is
//! no further curvature correction.

use serde::{Deserialize, Serialize};

use super::Vec2;

/// Metres per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Below this many metres per degree of longitude the origin is treated as polar.
const MIN_LON_SCALE: f64 = 1e-6;

/// Geodetic fix in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoFix {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    /// A fix only exists when both halves are present.
    pub fn from_parts(lat_deg: Option<f64>, lon_deg: Option<f64>) -> Option<Self> {
        Some(Self::new(lat_deg?, lon_deg?))
    }
}

fn lon_scale(origin: GeoFix) -> f64 {
    origin.lat_deg.to_radians().cos() * METERS_PER_DEGREE
}

/// Project `fix` into metres east (`x`) and north (`y`) of `origin`.
pub fn project(fix: GeoFix, origin: GeoFix) -> Vec2 {
    Vec2::new(
        (fix.lon_deg - origin.lon_deg) * lon_scale(origin),
        (fix.lat_deg - origin.lat_deg) * METERS_PER_DEGREE,
    )
}

/// Inverse of [`project`] for the same origin.
///
/// At a polar origin the east axis collapses; the origin longitude is kept.
pub fn unproject(xy: Vec2, origin: GeoFix) -> GeoFix {
    let scale = lon_scale(origin);
    let lon_deg = if scale.abs() < MIN_LON_SCALE {
        origin.lon_deg
    } else {
        origin.lon_deg + xy.x / scale
    };
    GeoFix::new(origin.lat_deg + xy.y / METERS_PER_DEGREE, lon_deg)
}

/// [`project`] over optional inputs.
///
/// `None` means "not yet plottable": either the node has no fix or no origin
/// has been established.
pub fn try_project(
    lat_deg: Option<f64>,
    lon_deg: Option<f64>,
    origin: Option<GeoFix>,
) -> Option<Vec2> {
    let fix = GeoFix::from_parts(lat_deg, lon_deg)?;
    Some(project(fix, origin?))
}

/// [`unproject`] against an origin that may not be set yet.
pub fn try_unproject(xy: Vec2, origin: Option<GeoFix>) -> Option<GeoFix> {
    origin.map(|o| unproject(xy, o))
}
