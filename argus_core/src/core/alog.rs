//! Injected logging sink and thread-local node logging context.
//!
//! The core never logs directly to a backend: it calls into a [`LogSink`]
//! with `(severity, component, message)` tuples. Sinks must return quickly
//! and must never propagate errors back into the core. The default sink
//! writes colored lines to stderr; [`FacadeSink`] forwards to the `log`
//! crate for hosts that already run a logger.
//!
//! The `alog!()` macro lets nodes log without passing a context around —
//! the node runner sets the current node name for the thread before each
//! lifecycle call, and the macro picks it up as the component.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::RwLock;

/// Log severity passed to sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// String representation used by the stderr sink.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Injected logging collaborator.
///
/// Implementations must not block the calling thread for long and must
/// swallow their own failures — a logging problem is never allowed to
/// become a messaging problem.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, component: &str, message: &str);
}

/// Default sink: colored, timestamped lines on stderr.
pub struct StderrSink;

impl LogSink for StderrSink {
    fn log(&self, level: LogLevel, component: &str, message: &str) {
        use std::io::Write;

        let ts = chrono::Local::now().format("%H:%M:%S%.3f");
        let color = match level {
            LogLevel::Debug => "\x1b[90m",
            LogLevel::Info => "\x1b[34m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
        };
        let line = format!(
            "{}[{}]\x1b[0m {} \x1b[33m[{}]\x1b[0m {}\n",
            color,
            level.as_str(),
            ts,
            component,
            message
        );
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Sink forwarding to the `log` crate facade, for embedding hosts that
/// already configured a logger.
pub struct FacadeSink;

impl LogSink for FacadeSink {
    fn log(&self, level: LogLevel, component: &str, message: &str) {
        match level {
            LogLevel::Debug => log::debug!(target: "argus", "[{}] {}", component, message),
            LogLevel::Info => log::info!(target: "argus", "[{}] {}", component, message),
            LogLevel::Warn => log::warn!(target: "argus", "[{}] {}", component, message),
            LogLevel::Error => log::error!(target: "argus", "[{}] {}", component, message),
        }
    }
}

static SINK: RwLock<Option<Arc<dyn LogSink>>> = RwLock::new(None);
static STDERR_SINK: StderrSink = StderrSink;

/// Install the process-wide log sink. Replaces any previous sink.
pub fn set_log_sink(sink: Arc<dyn LogSink>) {
    *SINK.write() = Some(sink);
}

/// Emit a record through the installed sink (stderr by default).
pub fn emit(level: LogLevel, component: &str, message: &str) {
    let guard = SINK.read();
    match guard.as_ref() {
        Some(sink) => sink.log(level, component, message),
        None => STDERR_SINK.log(level, component, message),
    }
}

thread_local! {
    static CURRENT_NODE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Set the current node name for this thread.
/// Called by the node runner before invoking node lifecycle methods.
pub fn set_node_context(name: &str) {
    CURRENT_NODE.with(|ctx| {
        let mut slot = ctx.borrow_mut();
        match slot.as_mut() {
            // Reuse allocation: clear + push_str avoids realloc if capacity suffices
            Some(existing) => {
                existing.clear();
                existing.push_str(name);
            }
            None => *slot = Some(name.to_owned()),
        }
    });
}

/// Clear the current node context for this thread.
pub fn clear_node_context() {
    CURRENT_NODE.with(|ctx| {
        *ctx.borrow_mut() = None;
    });
}

/// Get the current node name if set, otherwise "unknown".
pub fn current_node_name() -> String {
    CURRENT_NODE.with(|ctx| {
        ctx.borrow()
            .as_deref()
            .unwrap_or("unknown")
            .to_string()
    })
}

/// Internal function used by the `alog!()` macro.
pub fn log_with_context(level: LogLevel, message: String) {
    let component = current_node_name();
    emit(level, &component, &message);
}

/// Log a message from within an ARGUS node.
///
/// The node runner sets the current node context for the thread, so the
/// component field is attributed automatically.
///
/// ```ignore
/// alog!(info, "sensor attached");
/// alog!(warn, "queue depth {}", depth);
/// alog!(error, "publish failed: {}", err);
/// ```
#[macro_export]
macro_rules! alog {
    (debug, $($arg:tt)*) => {
        $crate::core::alog::log_with_context($crate::core::alog::LogLevel::Debug, format!($($arg)*))
    };
    (info, $($arg:tt)*) => {
        $crate::core::alog::log_with_context($crate::core::alog::LogLevel::Info, format!($($arg)*))
    };
    (warn, $($arg:tt)*) => {
        $crate::core::alog::log_with_context($crate::core::alog::LogLevel::Warn, format!($($arg)*))
    };
    (error, $($arg:tt)*) => {
        $crate::core::alog::log_with_context($crate::core::alog::LogLevel::Error, format!($($arg)*))
    };
}
