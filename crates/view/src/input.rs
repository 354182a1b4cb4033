//! Logical input events and the per-display session they act on.
//!
//! Raw key and mouse capture happens elsewhere; by the time events reach
//! [`ViewSession::handle`] they are already interpreted ("zoom in at this
//! pixel", "east key released").

use foundation::math::Vec2;
use scene::topology::LinkMode;
use serde::Serialize;
use tracing::debug;

use crate::viewport::{ViewportController, ZoomDirection};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PanDirection {
    East,
    West,
    North,
    South,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ViewEvent {
    /// Wheel zoom anchored at a screen point.
    ZoomAt {
        screen: Vec2,
        direction: ZoomDirection,
    },
    /// Keyboard zoom about the view centre.
    ZoomStep(ZoomDirection),
    /// Pointer pressed; remembers the current pan.
    BeginDrag,
    /// Pointer moved `delta` pixels since `BeginDrag`.
    PanDrag { delta: Vec2 },
    EndDrag,
    /// A directional pan key changed state.
    PanDirectional {
        direction: PanDirection,
        held: bool,
    },
    ResetView,
    CycleLinkMode,
    ToggleLabels,
    ToggleHideStale,
    ToggleFlow,
    ToggleTarget,
}

/// Directional keys currently held.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct HeldDirections {
    pub east: bool,
    pub west: bool,
    pub north: bool,
    pub south: bool,
}

impl HeldDirections {
    pub fn set(&mut self, direction: PanDirection, held: bool) {
        match direction {
            PanDirection::East => self.east = held,
            PanDirection::West => self.west = held,
            PanDirection::North => self.north = held,
            PanDirection::South => self.south = held,
        }
    }

    /// Unit-per-axis direction: `(east - west, north - south)`.
    pub fn vector(&self) -> Vec2 {
        let axis = |pos: bool, neg: bool| f64::from(u8::from(pos)) - f64::from(u8::from(neg));
        Vec2::new(axis(self.east, self.west), axis(self.north, self.south))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayToggles {
    pub labels: bool,
    pub hide_stale: bool,
    pub flow: bool,
    pub target: bool,
}

impl Default for DisplayToggles {
    fn default() -> Self {
        Self {
            labels: true,
            hide_stale: true,
            flow: true,
            target: true,
        }
    }
}

/// Everything the consumer owns about how the map is shown.
#[derive(Debug, Clone)]
pub struct ViewSession {
    pub viewport: ViewportController,
    pub link_mode: LinkMode,
    pub toggles: DisplayToggles,
    held: HeldDirections,
    drag_start: Option<Vec2>,
}

impl ViewSession {
    pub fn new(viewport: ViewportController, link_mode: LinkMode) -> Self {
        Self {
            viewport,
            link_mode,
            toggles: DisplayToggles::default(),
            held: HeldDirections::default(),
            drag_start: None,
        }
    }

    pub fn held(&self) -> HeldDirections {
        self.held
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_start.is_some()
    }

    pub fn handle(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::ZoomAt { screen, direction } => self.viewport.zoom_at_point(screen, direction),
            ViewEvent::ZoomStep(direction) => self.viewport.zoom_step(direction),
            ViewEvent::BeginDrag => self.drag_start = Some(self.viewport.state().pan),
            ViewEvent::PanDrag { delta } => {
                if let Some(start) = self.drag_start {
                    self.viewport.pan_by_pixels(delta, start);
                }
            }
            ViewEvent::EndDrag => self.drag_start = None,
            ViewEvent::PanDirectional { direction, held } => self.held.set(direction, held),
            ViewEvent::ResetView => {
                self.viewport.reset_view();
                self.drag_start = None;
            }
            ViewEvent::CycleLinkMode => {
                self.link_mode = self.link_mode.next();
                debug!(mode = %self.link_mode, "link mode changed");
            }
            ViewEvent::ToggleLabels => self.toggles.labels = !self.toggles.labels,
            ViewEvent::ToggleHideStale => self.toggles.hide_stale = !self.toggles.hide_stale,
            ViewEvent::ToggleFlow => self.toggles.flow = !self.toggles.flow,
            ViewEvent::ToggleTarget => self.toggles.target = !self.toggles.target,
        }
    }

    /// Advances directional panning by one frame.
    pub fn tick(&mut self, dt: f64) {
        self.viewport.tick(dt, self.held.vector());
    }
}
