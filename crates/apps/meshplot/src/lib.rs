pub mod config;
pub mod display;

pub use config::{Args, DisplayConfig};
pub use display::{Display, FrameOutput};
