pub mod node_store;
pub mod tables;
pub mod topology;

pub use node_store::{ApplyReport, NodeRecord, NodeStore, NodeUpdate, NodeView, Origin};
pub use topology::{Edge, LinkMode, TopologyBuilder};
