//! Communication layer: typed topics and name registries.
//!
//! [`Topic`] is the single communication primitive: a named, typed MPMC
//! queue with blocking and non-blocking reads plus a synchronous callback
//! path. [`TopicRegistry`] maps names to type-erased topics, backing both
//! each node's private topic map and the master's global registry.

pub mod registry;
pub mod topic;

pub use registry::TopicRegistry;
pub use topic::{Topic, TopicMetrics};
