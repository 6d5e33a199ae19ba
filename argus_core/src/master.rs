//! Top-level owner: node pool, global topic registry, shutdown.
//!
//! The master starts every node on its own thread at spawn time and never
//! participates in steady-state message flow — its thread only creates,
//! observes, and finally joins. Teardown is ordered: signal the stop token,
//! close globally-registered topics, join every node thread, release the
//! registry. `shutdown` consumes the master, so operations after teardown
//! are unrepresentable; `Drop` repeats teardown best-effort for masters
//! that go out of scope without an explicit shutdown.

use std::collections::HashSet;
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::communication::{Topic, TopicRegistry};
use crate::core::alog::{emit, LogLevel};
use crate::core::node::{Node, NodeConfig, NodeContext, NodeSnapshot, NodeStatus};
use crate::core::runner::{spawn_node, NodeEvent, NodeThread};
use crate::core::stop::StopToken;
use crate::error::{ArgusError, ArgusResult};
use crate::memory::{Arena, ArenaConfig};

/// Master-level configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MasterConfig {
    /// Budget for the registry-level shared arena backing
    /// globally-registered topics.
    pub registry_arena: ArenaConfig,
}

/// Top-level owner of the node pool and the global topic registry.
pub struct Master {
    registry: Arc<TopicRegistry>,
    arena: Arena,
    stop: StopToken,
    nodes: Vec<NodeThread>,
    node_names: HashSet<String>,
    events_tx: Sender<NodeEvent>,
    events_rx: Receiver<NodeEvent>,
}

impl Master {
    /// Create a master with an empty node pool.
    pub fn new(config: MasterConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            registry: Arc::new(TopicRegistry::new("global registry")),
            arena: Arena::new("master", config.registry_arena),
            stop: StopToken::new(),
            nodes: Vec::new(),
            node_names: HashSet::new(),
            events_tx,
            events_rx,
        }
    }

    /// Create a master and start a fixed pool of `node_count` nodes, each
    /// on its own thread, all sharing one per-node configuration.
    pub fn launch<N, F>(
        node_count: usize,
        per_node_config: NodeConfig,
        mut factory: F,
    ) -> ArgusResult<Self>
    where
        N: Node + 'static,
        F: FnMut(usize) -> N,
    {
        let mut master = Master::new(MasterConfig::default());
        for index in 0..node_count {
            master.spawn_with(factory(index), per_node_config.clone())?;
        }
        Ok(master)
    }

    /// Start a node on its own thread immediately. There is no separate
    /// "start" call.
    ///
    /// Fails with [`ArgusError::DuplicateName`] when a node of the same
    /// name is already in the pool.
    pub fn spawn<N: Node + 'static>(&mut self, node: N) -> ArgusResult<NodeStatus> {
        self.spawn_with(node, NodeConfig::default())
    }

    /// Start a node with explicit configuration.
    pub fn spawn_with<N: Node + 'static>(
        &mut self,
        node: N,
        config: NodeConfig,
    ) -> ArgusResult<NodeStatus> {
        let name = node.name().to_string();
        if !self.node_names.insert(name.clone()) {
            return Err(ArgusError::duplicate(name));
        }
        let ctx = NodeContext::with_shared(
            name,
            config,
            Arc::clone(&self.registry),
            self.stop.clone(),
        );
        let thread = spawn_node(node, ctx, self.events_tx.clone())?;
        let status = thread.status.clone();
        self.nodes.push(thread);
        Ok(status)
    }

    /// Register an existing topic in the global registry. The registry
    /// takes ownership of the handle; `DuplicateName` if the name is taken.
    pub fn register_topic<T: Clone + Send + 'static>(&self, topic: Topic<T>) -> ArgusResult<()> {
        self.registry.insert(topic)
    }

    /// Create a topic backed by the master's shared arena and register it
    /// globally, returning a handle.
    pub fn create_topic<T: Clone + Send + 'static>(
        &self,
        name: impl Into<String>,
    ) -> ArgusResult<Topic<T>> {
        let topic = Topic::new(name, &self.arena);
        let handle = topic.clone();
        self.registry.insert(topic)?;
        Ok(handle)
    }

    /// Look up a globally-registered topic. The registry lock is held only
    /// for the lookup.
    pub fn lookup_topic<T: Clone + Send + 'static>(&self, name: &str) -> ArgusResult<Topic<T>> {
        self.registry.get(name)
    }

    /// The registry-level shared arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Number of nodes in the pool (including already-stopped ones).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether shutdown has been requested.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Diagnostics snapshot of every node.
    pub fn node_states(&self) -> Vec<NodeSnapshot> {
        self.nodes.iter().map(|n| n.status.snapshot()).collect()
    }

    /// Drain terminal node events, logging unexpected stops. The master
    /// reports these; any retry policy belongs to the embedding host.
    pub fn poll_events(&self) -> Vec<NodeEvent> {
        let events: Vec<_> = self.events_rx.try_iter().collect();
        for event in &events {
            if !self.stop.is_stopped() {
                match &event.error {
                    Some(error) => emit(
                        LogLevel::Error,
                        "master",
                        &format!("node '{}' stopped unexpectedly: {}", event.node, error),
                    ),
                    None => emit(
                        LogLevel::Warn,
                        "master",
                        &format!("node '{}' stopped before shutdown", event.node),
                    ),
                }
            }
        }
        events
    }

    /// Orderly teardown: signal stop, close globally-registered topics,
    /// join every node thread, release the registry.
    ///
    /// Consuming `self` makes post-teardown operations a compile error.
    pub fn shutdown(mut self) -> ArgusResult<()> {
        self.teardown();
        Ok(())
    }

    fn teardown(&mut self) {
        if self.nodes.is_empty() && self.stop.is_stopped() {
            return;
        }
        self.stop.stop();
        // Wake blocked readers on global topics before joining.
        self.registry.close_all();

        for thread in self.nodes.drain(..) {
            let name = thread.status.name().to_string();
            if thread.handle.join().is_err() {
                emit(
                    LogLevel::Error,
                    "master",
                    &format!("node '{}' thread panicked outside the run loop", name),
                );
            }
        }

        for event in self.events_rx.try_iter() {
            if let Some(error) = event.error {
                emit(
                    LogLevel::Warn,
                    "master",
                    &format!("node '{}' had recorded failure: {}", event.node, error),
                );
            }
        }
        emit(LogLevel::Info, "master", "shutdown complete");
    }
}

impl Drop for Master {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Master {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Master")
            .field("nodes", &self.nodes.len())
            .field("topics", &self.registry.len())
            .field("stopping", &self.stop.is_stopped())
            .finish()
    }
}
