pub mod flow;
pub mod grid;
pub mod input;
pub mod viewport;

pub use input::{DisplayToggles, HeldDirections, PanDirection, ViewEvent, ViewSession};
pub use viewport::{ScreenRect, ViewConfig, ViewState, ViewportController, ZoomDirection, ZoomMode};
