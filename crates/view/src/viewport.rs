//! Planar camera for the node map.
//!
//! The controller owns a [`ViewState`] and converts between world metres
//! (east/north of the origin) and screen pixels. In [`ZoomMode::Fit`] the
//! scale follows the data every frame so the farthest node stays on screen;
//! any zoom command switches to [`ZoomMode::Manual`], where the scale is the
//! fit scale times a user factor. Panning never changes the mode.

use foundation::bounds::Aabb2;
use foundation::math::{GeoFix, Vec2, unproject};
use serde::Serialize;

/// Magnification at which the reticle coordinate label appears.
pub const RETICLE_LABEL_MAGNIFICATION: f64 = 1.6;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomMode {
    #[default]
    Fit,
    Manual,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Camera state owned by the consumer loop.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub zoom_mode: ZoomMode,
    /// Multiplier over the fit scale. Only used in `Manual`.
    pub zoom_factor: f64,
    /// World point under the view centre, in metres.
    pub pan: Vec2,
    /// Directional pan velocity, metres per second.
    pub velocity: Vec2,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom_mode: ZoomMode::Fit,
            zoom_factor: 1.0,
            pan: Vec2::ZERO,
            velocity: Vec2::ZERO,
        }
    }
}

/// Tuning constants for the camera.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewConfig {
    pub zoom_step: f64,
    /// Directional pan acceleration at zoom factor 1, metres per second².
    pub pan_accel: f64,
    /// Velocity damping rate, per second.
    pub friction: f64,
    /// The fit never zooms in closer than this radius, in metres.
    pub min_fit_radius_m: f64,
    /// Fraction of the half extent the farthest node may occupy.
    pub margin_factor: f64,
    pub min_scale: f64,
    /// Bounds on the manual zoom factor.
    pub min_zoom_factor: f64,
    pub max_zoom_factor: f64,
    /// Zoom factors below this do not increase pan acceleration further.
    pub min_accel_zoom: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_step: 1.15,
            pan_accel: 28_400.0,
            friction: 7.0,
            min_fit_radius_m: 200.0,
            margin_factor: 0.92,
            min_scale: 1e-4,
            min_zoom_factor: 1e-6,
            max_zoom_factor: 1e6,
            min_accel_zoom: 0.5,
        }
    }
}

/// Plot area in screen pixels. Screen y grows downward.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Half of the shorter side.
    pub fn half_extent(&self) -> f64 {
        self.width.min(self.height) * 0.5
    }

    pub fn top_left(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// Pixels per metre that puts the farthest point at `margin_factor` of the
/// half extent. Radii below `min_radius_m` are treated as `min_radius_m`.
pub fn compute_fit_scale(
    points: &[Vec2],
    half_extent: f64,
    margin_factor: f64,
    min_radius_m: f64,
) -> f64 {
    let far = points
        .iter()
        .map(|p| p.length())
        .fold(min_radius_m, f64::max);
    half_extent * margin_factor / far
}

/// View-centre crosshair.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Reticle {
    pub fix: GeoFix,
    pub show_label: bool,
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    config: ViewConfig,
    state: ViewState,
    rect: ScreenRect,
    fit_scale: f64,
}

impl ViewportController {
    pub fn new(config: ViewConfig, rect: ScreenRect) -> Self {
        let fit_scale = compute_fit_scale(
            &[],
            rect.half_extent(),
            config.margin_factor,
            config.min_fit_radius_m,
        );
        Self {
            config,
            state: ViewState::default(),
            rect,
            fit_scale,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn rect(&self) -> ScreenRect {
        self.rect
    }

    pub fn set_rect(&mut self, rect: ScreenRect) {
        self.rect = rect;
    }

    pub fn compute_fit_scale(&self, points: &[Vec2]) -> f64 {
        compute_fit_scale(
            points,
            self.rect.half_extent(),
            self.config.margin_factor,
            self.config.min_fit_radius_m,
        )
    }

    /// Recomputes the fit scale for this frame's points. Returns it.
    pub fn update_fit(&mut self, points: &[Vec2]) -> f64 {
        self.fit_scale = self.compute_fit_scale(points);
        self.fit_scale
    }

    pub fn fit_scale(&self) -> f64 {
        self.fit_scale
    }

    /// Pixels per metre currently in effect.
    pub fn effective_scale(&self) -> f64 {
        match self.state.zoom_mode {
            ZoomMode::Fit => self.fit_scale,
            ZoomMode::Manual => (self.fit_scale * self.state.zoom_factor).max(self.config.min_scale),
        }
    }

    /// `effective_scale / fit_scale`; 1 in fit mode.
    pub fn magnification(&self) -> f64 {
        if self.fit_scale > 0.0 {
            self.effective_scale() / self.fit_scale
        } else {
            1.0
        }
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        let c = self.rect.center();
        let s = self.effective_scale();
        let pan = self.state.pan;
        Vec2::new(c.x + (world.x - pan.x) * s, c.y - (world.y - pan.y) * s)
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        let c = self.rect.center();
        let s = self.effective_scale();
        let pan = self.state.pan;
        Vec2::new(pan.x + (screen.x - c.x) / s, pan.y - (screen.y - c.y) / s)
    }

    fn apply_zoom(&mut self, direction: ZoomDirection) {
        self.state.zoom_mode = ZoomMode::Manual;
        let factor = match direction {
            ZoomDirection::In => self.state.zoom_factor * self.config.zoom_step,
            ZoomDirection::Out => self.state.zoom_factor / self.config.zoom_step,
        };
        self.state.zoom_factor =
            factor.clamp(self.config.min_zoom_factor, self.config.max_zoom_factor);
    }

    /// Zooms one step keeping the world point under `screen` fixed.
    pub fn zoom_at_point(&mut self, screen: Vec2, direction: ZoomDirection) {
        let anchor = self.screen_to_world(screen);
        self.apply_zoom(direction);

        let c = self.rect.center();
        let s = self.effective_scale();
        self.state.pan = Vec2::new(anchor.x - (screen.x - c.x) / s, anchor.y + (screen.y - c.y) / s);
    }

    /// Keyboard zoom about the view centre.
    pub fn zoom_step(&mut self, direction: ZoomDirection) {
        self.apply_zoom(direction);
    }

    /// Pan for a drag of `delta` pixels that started with the camera at
    /// `pan_at_start`. Dragging right moves the view west; dragging down moves
    /// it north.
    pub fn pan_by_pixels(&mut self, delta: Vec2, pan_at_start: Vec2) {
        let s = self.effective_scale();
        self.state.pan = Vec2::new(pan_at_start.x - delta.x / s, pan_at_start.y + delta.y / s);
    }

    pub fn reset_view(&mut self) {
        self.state = ViewState::default();
    }

    /// Integrates directional panning for one frame.
    ///
    /// `direction` components are expected in `[-1, 1]` (east, north).
    pub fn tick(&mut self, dt: f64, direction: Vec2) {
        let accel = self.config.pan_accel / self.state.zoom_factor.max(self.config.min_accel_zoom);
        let damping = (1.0 - self.config.friction * dt).max(0.0);

        let mut v = self.state.velocity + direction * (accel * dt);
        v = v * damping;
        self.state.velocity = v;
        self.state.pan += v * dt;
    }

    /// World-space box currently covered by the plot rect.
    pub fn visible_world_bounds(&self) -> Aabb2 {
        Aabb2::from_corners(
            self.screen_to_world(self.rect.top_left()),
            self.screen_to_world(self.rect.bottom_right()),
        )
    }

    /// Geodetic position of the view centre.
    pub fn center_geodetic(&self, origin: Option<GeoFix>) -> Option<GeoFix> {
        origin.map(|o| unproject(self.state.pan, o))
    }

    pub fn reticle(&self, origin: Option<GeoFix>) -> Option<Reticle> {
        let fix = self.center_geodetic(origin)?;
        Some(Reticle {
            fix,
            show_label: self.magnification() >= RETICLE_LABEL_MAGNIFICATION,
        })
    }
}
