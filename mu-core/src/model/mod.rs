mod outline;

pub use outline::{CheckState, NodeId, OutlineItem, OutlineTree};
