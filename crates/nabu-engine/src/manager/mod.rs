//! Buffer registry (draw manager).
//!
//! Responsibilities:
//! - own the forest of double-buffered draw buffers
//! - keep deterministic draw order: the top level ascending by priority,
//!   child lists descending by priority, children depth-first after their
//!   parent
//! - hand working buffers to producers and swap them against active buffers
//!   for the consumer under a single registry mutex

mod registry;

pub use registry::{BufferId, DrawManager};
