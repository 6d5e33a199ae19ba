//! # ARGUS Core
//!
//! The core runtime for ARGUS, an embedded publish/subscribe messaging
//! system for sensor-data pipelines. Everything runs inside one process:
//! there is no broker, no wire protocol, no persistence.
//!
//! Building blocks:
//!
//! - **Nodes**: independent units of execution, one OS thread each, with a
//!   private memory arena and a private map of named topics
//! - **Topics**: typed multi-producer/multi-consumer queues with blocking
//!   and non-blocking reads and a synchronous callback path
//! - **Memory**: per-owner pooled arenas with explicit budgets — exhaustion
//!   is an error, never a fallback
//! - **Sensors**: a compile-time capability contract plus a generic driver
//!   wrapper, no virtual dispatch between a node and its sensors
//! - **Master**: top-level owner coordinating node lifecycle, the global
//!   topic registry, and orderly shutdown
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use argus_core::{alog, ArgusResult, Master, MasterConfig, Node, NodeContext};
//!
//! struct ThermalNode;
//!
//! impl Node for ThermalNode {
//!     fn name(&self) -> &str { "thermal" }
//!
//!     fn init(&mut self, ctx: &mut NodeContext) -> ArgusResult<()> {
//!         ctx.add_topic::<f32>("temp")?;
//!         Ok(())
//!     }
//!
//!     fn tick(&mut self, ctx: &mut NodeContext) -> ArgusResult<()> {
//!         let temp = ctx.topic::<f32>("temp")?;
//!         temp.publish(21.5)?;
//!         alog!(info, "published");
//!         Ok(())
//!     }
//! }
//!
//! let mut master = Master::new(MasterConfig::default());
//! master.spawn(ThermalNode)?;
//! // ... later:
//! master.shutdown()?;
//! # Ok::<(), argus_core::ArgusError>(())
//! ```

pub mod communication;
pub mod core;
pub mod error;
pub mod master;
pub mod memory;
pub mod sensor;

// Re-export commonly used types for easy access
pub use communication::{Topic, TopicMetrics, TopicRegistry};
// `self::` disambiguates our core module from the `core` crate.
pub use self::core::{
    set_log_sink, set_metrics_sink, FacadeSink, LogLevel, LogSink, MetricsSink, Node, NodeConfig,
    NodeContext, NodeEvent, NodeSnapshot, NodeState, NodeStatus, NoopMetrics, StderrSink,
    StopToken,
};
pub use error::{ArgusError, ArgusResult};
pub use master::{Master, MasterConfig};
pub use memory::{Arena, ArenaConfig, ArenaLease, ArenaStats, PooledBuf};
pub use sensor::{Sensor, SensorDriver, SensorKind, SensorParams, SensorState};

// alog! and argus_internal! are available at the crate root via #[macro_export]
