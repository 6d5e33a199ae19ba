//! Node capability contract and per-node state.
//!
//! A node is an independently scheduled unit of execution: it owns a
//! dedicated thread, a private [`Arena`], and a private map of named
//! topics. Concrete node types implement the [`Node`] trait; the run loop
//! is monomorphized per concrete type (see `core::runner`), so `tick` is a
//! static call, not a virtual one.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::communication::{Topic, TopicRegistry};
use crate::core::metrics;
use crate::core::stop::StopToken;
use crate::error::ArgusResult;
use crate::memory::{Arena, ArenaConfig};

/// Node lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NodeState {
    Booting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Booting => write!(f, "Booting"),
            NodeState::Running => write!(f, "Running"),
            NodeState::Stopping => write!(f, "Stopping"),
            NodeState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Configuration parameters for node behavior.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeConfig {
    /// Minimum interval between `tick` calls. `None` lets the node pace
    /// itself (typical for nodes that block in `recv_timeout`).
    pub tick_interval: Option<Duration>,
    /// Budget for this node's private arena.
    pub arena: ArenaConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_interval: None,
            arena: ArenaConfig::default(),
        }
    }
}

struct StatusInner {
    name: String,
    instance_id: String,
    state: RwLock<NodeState>,
    last_error: Mutex<Option<String>>,
}

/// Shared view of one node's lifecycle, readable from any thread.
#[derive(Clone)]
pub struct NodeStatus {
    inner: Arc<StatusInner>,
}

impl NodeStatus {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(StatusInner {
                name: name.to_string(),
                instance_id: uuid::Uuid::new_v4().to_string(),
                state: RwLock::new(NodeState::Booting),
                last_error: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    pub fn state(&self) -> NodeState {
        *self.inner.state.read()
    }

    /// Failure recorded by the run loop, if the node died fatally.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }

    pub(crate) fn set_state(&self, state: NodeState) {
        *self.inner.state.write() = state;
        metrics::counter("node.state_transition", 1);
    }

    pub(crate) fn record_failure(&self, message: String) {
        *self.inner.last_error.lock() = Some(message);
    }

    /// Point-in-time copy for diagnostics.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            name: self.inner.name.clone(),
            instance_id: self.inner.instance_id.clone(),
            state: self.state(),
            last_error: self.last_error(),
        }
    }
}

impl std::fmt::Debug for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStatus")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Serializable node diagnostics record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub instance_id: String,
    pub state: NodeState,
    pub last_error: Option<String>,
}

/// Everything a node owns: its arena, its private topic map, and the stop
/// token its loop must poll.
pub struct NodeContext {
    name: String,
    config: NodeConfig,
    arena: Arena,
    topics: TopicRegistry,
    shared: Arc<TopicRegistry>,
    stop: StopToken,
}

impl NodeContext {
    /// Build a standalone context (own stop token, empty shared registry).
    /// The master uses [`NodeContext::with_shared`] to wire nodes into the
    /// process-wide registry and stop token instead.
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        let name = name.into();
        Self::with_shared(
            name,
            config,
            Arc::new(TopicRegistry::new("shared registry")),
            StopToken::new(),
        )
    }

    pub(crate) fn with_shared(
        name: String,
        config: NodeConfig,
        shared: Arc<TopicRegistry>,
        stop: StopToken,
    ) -> Self {
        let arena = Arena::new(name.clone(), config.arena.clone());
        let topics = TopicRegistry::new(format!("node '{name}'"));
        Self {
            name,
            config,
            arena,
            topics,
            shared,
            stop,
        }
    }

    /// The node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// This node's private arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Stop token for this node's run loop. Long waits inside `tick` must
    /// stay within one bounded `recv_timeout` of a poll of this token.
    pub fn stop(&self) -> &StopToken {
        &self.stop
    }

    /// Create a topic owned by this node, drawing from the node's arena.
    ///
    /// Fails with `DuplicateName` when this node already has a topic of
    /// that name; the existing topic is untouched.
    pub fn add_topic<T: Clone + Send + 'static>(
        &self,
        name: impl Into<String>,
    ) -> ArgusResult<Topic<T>> {
        let topic = Topic::new(name, &self.arena);
        let handle = topic.clone();
        self.topics.insert(topic)?;
        Ok(handle)
    }

    /// Look up one of this node's own topics.
    pub fn topic<T: Clone + Send + 'static>(&self, name: &str) -> ArgusResult<Topic<T>> {
        self.topics.get(name)
    }

    /// Number of topics this node owns.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// The process-wide registry, for reaching topics other owners
    /// published globally.
    pub fn shared_topics(&self) -> &TopicRegistry {
        &self.shared
    }

    /// Close every topic this node owns. Called by the run loop when the
    /// node transitions to Stopping: later publishes fail with `Closed`
    /// and blocked readers wake.
    pub(crate) fn close_topics(&self) {
        self.topics.close_all();
    }
}

/// Capability contract for node implementations.
///
/// The run loop calls `init` once, `tick` repeatedly until the stop token
/// fires, and `shutdown` once during teardown. Errors returned from `tick`
/// are triaged by the loop: allocation failures stop the node, anything
/// else is logged and the loop continues. Panics are caught and recorded
/// as fatal; they never take down the process.
pub trait Node: Send {
    /// The node's name (unique within a master).
    ///
    /// Defaults to the implementing type's name.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        match full.rfind("::") {
            Some(pos) => &full[pos + 2..],
            None => full,
        }
    }

    /// Called once before the first tick. Attach sensors and topics here.
    fn init(&mut self, _ctx: &mut NodeContext) -> ArgusResult<()> {
        Ok(())
    }

    /// One iteration of the node's work loop.
    fn tick(&mut self, ctx: &mut NodeContext) -> ArgusResult<()>;

    /// Called once after the last tick, with the node's topics already
    /// closed.
    fn shutdown(&mut self, _ctx: &mut NodeContext) -> ArgusResult<()> {
        Ok(())
    }
}
