//! Latitude/longitude grid over the visible map window.
//!
//! Lines sit on absolute multiples of the step, so panning never makes the
//! grid swim, and a line is major when its index is a multiple of
//! `major_every`. Zoomed far out the minor lines are dropped first, then the
//! whole grid.

use foundation::math::{GeoFix, Vec2, project, unproject};
use serde::Serialize;

use crate::viewport::ViewportController;

pub const GRID_STEP_DEG: f64 = 0.005;
pub const GRID_MAJOR_EVERY: i64 = 48;
pub const GRID_MAX_LINES: u64 = 400;

/// Slack for window edges that fall exactly on a grid line.
const INDEX_EPSILON: f64 = 1e-9;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridConfig {
    pub step_deg: f64,
    pub major_every: i64,
    pub max_lines: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            step_deg: GRID_STEP_DEG,
            major_every: GRID_MAJOR_EVERY,
            max_lines: GRID_MAX_LINES,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GridAxis {
    /// Horizontal line of constant latitude.
    Latitude,
    /// Vertical line of constant longitude.
    Longitude,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLine {
    pub axis: GridAxis,
    pub value_deg: f64,
    /// Screen y for latitude lines, screen x for longitude lines.
    pub screen: f64,
    pub major: bool,
    pub label: Option<String>,
}

#[derive(Debug, Copy, Clone)]
struct IndexRange {
    lo: i64,
    hi: i64,
}

impl IndexRange {
    fn covering(min_deg: f64, max_deg: f64, step: f64) -> Option<Self> {
        let lo = (min_deg / step - INDEX_EPSILON).ceil();
        let hi = (max_deg / step + INDEX_EPSILON).floor();
        if !(lo.is_finite() && hi.is_finite()) {
            return None;
        }
        Some(Self {
            lo: lo as i64,
            hi: hi as i64,
        })
    }

    fn len(&self) -> u64 {
        self.hi.saturating_sub(self.lo).saturating_add(1).max(0) as u64
    }

    fn first_major(&self, every: i64) -> i64 {
        let q = self.lo.div_euclid(every);
        if self.lo.rem_euclid(every) == 0 { q } else { q + 1 }
    }

    fn major_len(&self, every: i64) -> u64 {
        let first = self.first_major(every);
        let last = self.hi.div_euclid(every);
        last.saturating_sub(first).saturating_add(1).max(0) as u64
    }

    fn indices(&self, every: i64, majors_only: bool) -> Box<dyn Iterator<Item = i64>> {
        if majors_only {
            let first = self.first_major(every);
            let last = self.hi.div_euclid(every);
            Box::new((first..=last).map(move |k| k * every))
        } else {
            Box::new(self.lo..=self.hi)
        }
    }
}

/// Grid lines for the current view. Empty until the origin is set.
pub fn geo_grid(
    viewport: &ViewportController,
    origin: Option<GeoFix>,
    config: &GridConfig,
) -> Vec<GridLine> {
    let Some(origin) = origin else {
        return Vec::new();
    };
    if config.step_deg <= 0.0 || config.major_every <= 0 {
        return Vec::new();
    }

    let bounds = viewport.visible_world_bounds();
    let sw = unproject(bounds.min, origin);
    let ne = unproject(bounds.max, origin);

    let step = config.step_deg;
    let (Some(lat), Some(lon)) = (
        IndexRange::covering(sw.lat_deg, ne.lat_deg, step),
        IndexRange::covering(sw.lon_deg, ne.lon_deg, step),
    ) else {
        return Vec::new();
    };

    let every = config.major_every;
    let total = lat.len().saturating_add(lon.len());
    let majors_only = if total <= config.max_lines {
        false
    } else if lat.major_len(every).saturating_add(lon.major_len(every)) <= config.max_lines {
        true
    } else {
        return Vec::new();
    };

    let line = |axis: GridAxis, index: i64| {
        let value_deg = index as f64 * step;
        let screen = match axis {
            GridAxis::Latitude => {
                let y = project(GeoFix::new(value_deg, origin.lon_deg), origin).y;
                viewport.world_to_screen(Vec2::new(0.0, y)).y
            }
            GridAxis::Longitude => {
                let x = project(GeoFix::new(origin.lat_deg, value_deg), origin).x;
                viewport.world_to_screen(Vec2::new(x, 0.0)).x
            }
        };
        let major = index.rem_euclid(every) == 0;
        GridLine {
            axis,
            value_deg,
            screen,
            major,
            label: major.then(|| format!("{value_deg:.5}°")),
        }
    };

    let mut out = Vec::new();
    out.extend(lon.indices(every, majors_only).map(|i| line(GridAxis::Longitude, i)));
    out.extend(lat.indices(every, majors_only).map(|i| line(GridAxis::Latitude, i)));
    out
}
