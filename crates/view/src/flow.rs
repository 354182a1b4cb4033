//! Animated markers that travel along drawn links.

use foundation::math::Vec2;

pub const FLOW_SPEED_PX_S: f64 = 120.0;
pub const FLOW_SPACING_PX: f64 = 28.0;

/// Links shorter than this on screen get no markers.
const MIN_EDGE_PX: f64 = 1.0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FlowConfig {
    pub speed_px_s: f64,
    pub spacing_px: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            speed_px_s: FLOW_SPEED_PX_S,
            spacing_px: FLOW_SPACING_PX,
        }
    }
}

impl FlowConfig {
    /// Offset of the first marker at wall-clock time `t`, in `[0, spacing)`.
    pub fn phase(&self, t: f64) -> f64 {
        if self.spacing_px <= 0.0 {
            return 0.0;
        }
        (t * self.speed_px_s).rem_euclid(self.spacing_px)
    }

    /// Marker positions from `a` towards `b`.
    pub fn dots(&self, a: Vec2, b: Vec2, phase: f64) -> Vec<Vec2> {
        let d = b - a;
        let len = d.length();
        if !(len >= MIN_EDGE_PX) || self.spacing_px <= 0.0 {
            return Vec::new();
        }
        let dir = d * (1.0 / len);

        let mut out = Vec::new();
        let mut s = phase.max(0.0);
        while s < len {
            out.push(a + dir * s);
            s += self.spacing_px;
        }
        out
    }
}
