//! Quorum planning: the layer between a resolved placement and the caller's
//! I/O. Node selection lives in `enginecore`; this crate decides how many of
//! the selected nodes must participate in a given write or read.

pub mod error;
pub mod planner;

pub use error::{ReplicationError, Result};
pub use planner::{QuorumPlanner, ReadSet, WriteSet};
