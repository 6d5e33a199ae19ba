//! Node thread body.
//!
//! One OS thread per node. The loop is generic over the concrete node type,
//! so lifecycle calls are monomorphized — there is no trait-object dispatch
//! between the loop and `tick`.
//!
//! Error triage inside the loop is local: transient errors are logged and
//! the loop continues; allocation failures and panics are fatal to the node
//! (recorded, loop exits) but never to the process. The master learns about
//! terminal transitions through the event channel.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::Sender;

use crate::alog;
use crate::core::alog::{clear_node_context, set_node_context};
use crate::core::node::{Node, NodeContext, NodeState, NodeStatus};
use crate::core::stop::StopToken;
use crate::error::ArgusResult;

/// Sleep slice bounding how long a paced node goes without polling stop.
const PACE_SLICE: Duration = Duration::from_millis(20);

/// Terminal lifecycle report sent to the master.
#[derive(Debug, Clone)]
pub struct NodeEvent {
    pub node: String,
    pub state: NodeState,
    pub error: Option<String>,
}

/// Handle to a spawned node thread.
pub(crate) struct NodeThread {
    pub status: NodeStatus,
    pub handle: JoinHandle<()>,
}

/// Spawn the node's dedicated thread and return its handle. The loop polls
/// the stop token carried by `ctx`.
pub(crate) fn spawn_node<N: Node + 'static>(
    node: N,
    ctx: NodeContext,
    events: Sender<NodeEvent>,
) -> ArgusResult<NodeThread> {
    let status = NodeStatus::new(ctx.name());
    let thread_status = status.clone();
    let handle = std::thread::Builder::new()
        .name(format!("argus-node-{}", ctx.name()))
        .spawn(move || run_loop(node, ctx, thread_status, events))
        .map_err(|e| crate::argus_internal!("failed to spawn node thread: {}", e))?;
    Ok(NodeThread { status, handle })
}

fn run_loop<N: Node>(
    mut node: N,
    mut ctx: NodeContext,
    status: NodeStatus,
    events: Sender<NodeEvent>,
) {
    let stop = ctx.stop().clone();
    set_node_context(ctx.name());

    let fatal = match catch_unwind(AssertUnwindSafe(|| node.init(&mut ctx))) {
        Ok(Ok(())) => {
            status.set_state(NodeState::Running);
            alog!(info, "node running");
            tick_until_stopped(&mut node, &mut ctx, &stop)
        }
        // Init never ran to completion: straight to teardown.
        Ok(Err(err)) => Some(format!("init failed: {err}")),
        Err(panic) => Some(format!("panicked during init: {}", panic_message(&panic))),
    };

    status.set_state(NodeState::Stopping);
    // Orderly drain: reject new publishes, wake blocked readers.
    ctx.close_topics();

    match catch_unwind(AssertUnwindSafe(|| node.shutdown(&mut ctx))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => alog!(warn, "shutdown error: {}", err),
        Err(panic) => alog!(error, "panicked during shutdown: {}", panic_message(&panic)),
    }

    if let Some(message) = &fatal {
        alog!(error, "{}", message);
        status.record_failure(message.clone());
    } else {
        alog!(info, "node stopped");
    }
    status.set_state(NodeState::Stopped);

    let _ = events.send(NodeEvent {
        node: ctx.name().to_string(),
        state: NodeState::Stopped,
        error: fatal,
    });
    clear_node_context();
}

/// Tick until the stop token fires or a fatal condition ends the node.
/// Returns the fatal message, if any.
fn tick_until_stopped<N: Node>(
    node: &mut N,
    ctx: &mut NodeContext,
    stop: &StopToken,
) -> Option<String> {
    while !stop.is_stopped() {
        let tick_start = Instant::now();
        match catch_unwind(AssertUnwindSafe(|| node.tick(ctx))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.is_fatal() => {
                return Some(format!("tick failed fatally: {err}"));
            }
            Ok(Err(err)) => {
                alog!(warn, "tick error (continuing): {}", err);
            }
            Err(panic) => {
                return Some(format!("panicked during tick: {}", panic_message(&panic)));
            }
        }
        if let Some(interval) = ctx.config().tick_interval {
            pace(tick_start, interval, stop);
        }
    }
    None
}

/// Sleep out the rest of the tick interval in slices, so stop requests are
/// observed within one slice.
fn pace(tick_start: Instant, interval: Duration, stop: &StopToken) {
    loop {
        if stop.is_stopped() {
            return;
        }
        let elapsed = tick_start.elapsed();
        if elapsed >= interval {
            return;
        }
        std::thread::sleep((interval - elapsed).min(PACE_SLICE));
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
