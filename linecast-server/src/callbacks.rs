//! Callback hub for server notifications.
//!
//! Holds at most one handler per notification kind. A missing handler drops
//! the notification. Handlers are cloned out of the lock before they run, so a
//! handler may freely call back into the server or replace handlers.

use crate::error::ServerError;
use crate::registry::ConnectionId;
use parking_lot::RwLock;
use std::sync::Arc;

/// Lifecycle events reported to the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEvent {
    /// The listener is bound and the server is running.
    Started,
    /// The server was stopped.
    Stopped,
    /// A connection was accepted and registered.
    ConnectionAccepted,
    /// A connection was closed.
    ConnectionClosed,
}

/// Handler for reported errors.
pub type ErrorHandler = Arc<dyn Fn(&ServerError) + Send + Sync>;
/// Handler for lifecycle events.
pub type EventHandler = Arc<dyn Fn(ServerEvent) + Send + Sync>;
/// Handler for inbound messages.
pub type MessageHandler = Arc<dyn Fn(ConnectionId, &str) + Send + Sync>;

/// Registry of the three optional notification handlers.
#[derive(Default)]
pub struct CallbackHub {
    error: RwLock<Option<ErrorHandler>>,
    event: RwLock<Option<EventHandler>>,
    message: RwLock<Option<MessageHandler>>,
}

impl CallbackHub {
    /// Creates a hub with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the error handler.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&ServerError) + Send + Sync + 'static,
    {
        *self.error.write() = Some(Arc::new(handler));
    }

    /// Replaces the event handler.
    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: Fn(ServerEvent) + Send + Sync + 'static,
    {
        *self.event.write() = Some(Arc::new(handler));
    }

    /// Replaces the message handler.
    pub fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(ConnectionId, &str) + Send + Sync + 'static,
    {
        *self.message.write() = Some(Arc::new(handler));
    }

    /// Removes all handlers.
    pub fn clear(&self) {
        *self.error.write() = None;
        *self.event.write() = None;
        *self.message.write() = None;
    }

    /// Reports an error.
    pub fn notify_error(&self, error: &ServerError) {
        let handler = self.error.read().clone();
        if let Some(handler) = handler {
            handler(error);
        }
    }

    /// Reports a lifecycle event.
    pub fn notify_event(&self, event: ServerEvent) {
        let handler = self.event.read().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Reports an inbound message.
    pub fn notify_message(&self, id: ConnectionId, message: &str) {
        let handler = self.message.read().clone();
        if let Some(handler) = handler {
            handler(id, message);
        }
    }
}
