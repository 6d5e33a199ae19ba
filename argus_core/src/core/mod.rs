//! Core runtime: node lifecycle, logging, metrics, cancellation.

pub mod alog;
pub mod metrics;
pub mod node;
pub mod runner;
pub mod stop;

pub use alog::{set_log_sink, FacadeSink, LogLevel, LogSink, StderrSink};
pub use metrics::{set_metrics_sink, MetricsSink, NoopMetrics};
pub use node::{Node, NodeConfig, NodeContext, NodeSnapshot, NodeState, NodeStatus};
pub use runner::NodeEvent;
pub use stop::StopToken;
