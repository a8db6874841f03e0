//! Connectivity tracking. A probe feeds raw up/down updates into the monitor,
//! which publishes only the transitions.

pub mod monitor;
pub mod probe;

pub use monitor::{EdgeDetector, ReachabilityEvent, ReachabilityMonitor};
pub use probe::{probe_once, ReachabilityProbe};
