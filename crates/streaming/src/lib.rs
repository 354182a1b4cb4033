pub mod protocol;
pub mod queue;
pub mod source;

pub use protocol::{DropReason, parse_line, parse_update};
pub use queue::{DrainReport, UpdateQueue, UpdateSender, update_channel};
pub use source::{PumpSummary, SourceStatus, StatusSnapshot, pump_lines};
