//! # ARGUS — embedded pub/sub for sensor-data pipelines
//!
//! ARGUS is a broker-less, intra-process publish/subscribe core: a pool of
//! worker nodes, each on its own thread with its own memory arena, exchange
//! typed messages over named topics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use argus::prelude::*;
//!
//! struct ImuNode;
//!
//! impl Node for ImuNode {
//!     fn name(&self) -> &str { "imu" }
//!
//!     fn tick(&mut self, _ctx: &mut NodeContext) -> ArgusResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! let mut master = Master::new(MasterConfig::default());
//! master.spawn(ImuNode)?;
//! master.shutdown()?;
//! # Ok::<(), argus::ArgusError>(())
//! ```

// Re-export core components
pub use argus_core::{self, *};

// Re-export serde at crate root for downstream message types
pub use serde;

/// The ARGUS prelude — everything you need to get started.
pub mod prelude {
    // Core node types
    pub use argus_core::core::{Node, NodeConfig, NodeContext, NodeState, NodeStatus};

    // Communication
    pub use argus_core::communication::{Topic, TopicRegistry};

    // Memory
    pub use argus_core::memory::{Arena, ArenaConfig};

    // Sensors
    pub use argus_core::sensor::{Sensor, SensorDriver, SensorKind, SensorParams, SensorState};

    // Orchestration
    pub use argus_core::master::{Master, MasterConfig};

    // Errors and cancellation
    pub use argus_core::core::StopToken;
    pub use argus_core::error::{ArgusError, ArgusResult};
}
