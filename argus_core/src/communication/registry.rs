//! Name → topic registry.
//!
//! One registry instance backs a node's private topic map; another backs
//! the master's process-wide map. Entries are type-erased so topics of
//! different message types share one table; lookups downcast back to the
//! caller's `Topic<T>` and fail with `NotFound` on a type mismatch.
//!
//! The registry lock is held only for insert/lookup, never across a
//! blocking call.

use std::any::Any;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::communication::Topic;
use crate::error::{ArgusError, ArgusResult};

struct RegisteredTopic {
    type_name: &'static str,
    handle: Box<dyn Any + Send + Sync>,
    // Type-erased close so teardown can sweep the table without knowing T.
    close: Box<dyn Fn() + Send + Sync>,
}

/// Unique-name map from topic name to typed topic handle.
pub struct TopicRegistry {
    owner: String,
    entries: RwLock<HashMap<String, RegisteredTopic>>,
}

impl TopicRegistry {
    /// Create an empty registry; `owner` labels error messages.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a topic under its name.
    ///
    /// Fails with [`ArgusError::DuplicateName`] when the name is taken; the
    /// existing entry is left untouched.
    pub fn insert<T: Clone + Send + 'static>(&self, topic: Topic<T>) -> ArgusResult<()> {
        let mut entries = self.entries.write();
        let name = topic.name().to_string();
        if entries.contains_key(&name) {
            return Err(ArgusError::duplicate(name));
        }
        let close_handle = topic.clone();
        entries.insert(
            name,
            RegisteredTopic {
                type_name: std::any::type_name::<T>(),
                handle: Box::new(topic),
                close: Box::new(move || close_handle.close()),
            },
        );
        Ok(())
    }

    /// Look up a topic by name and message type.
    pub fn get<T: Clone + Send + 'static>(&self, name: &str) -> ArgusResult<Topic<T>> {
        let entries = self.entries.read();
        let entry = entries.get(name).ok_or_else(|| {
            ArgusError::not_found(format!("topic '{}' in {}", name, self.owner))
        })?;
        entry
            .handle
            .downcast_ref::<Topic<T>>()
            .cloned()
            .ok_or_else(|| {
                ArgusError::not_found(format!(
                    "topic '{}' in {} carries {}, not {}",
                    name,
                    self.owner,
                    entry.type_name,
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Whether a name is registered (regardless of message type).
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered topic names, unordered.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Close every registered topic. The lock is dropped before the close
    /// calls run.
    pub fn close_all(&self) {
        let closers: Vec<_> = {
            let mut entries = self.entries.write();
            entries.drain().map(|(_, entry)| entry.close).collect()
        };
        for close in closers {
            close();
        }
    }
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("owner", &self.owner)
            .field("topics", &self.len())
            .finish()
    }
}
