//! Fan-out point between the transport feed and its listeners.
//!
//! The transport calls [`EventHub::publish`] from its own tasks. Every registered
//! listener sees each event synchronously, in registration order, and the first
//! listener failure is handed back to the publisher. Publishing is serialized, so
//! listeners observe events in exactly the order `publish` was called.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::event::Event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The consumer behind the listener has gone away.
    Disconnected,
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerError::Disconnected => write!(f, "event listener is no longer receiving"),
        }
    }
}

impl Error for ListenerError {}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError>;
}

#[derive(Default)]
pub struct EventHub {
    listeners: Mutex<Vec<Arc<dyn EventListener>>>,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a listener. Duplicates are kept; it will only see events published from now on.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn publish(&self, event: Event) -> Result<(), ListenerError> {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener.on_event(&event)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
