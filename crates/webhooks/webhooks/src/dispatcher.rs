//! Synchronous in-process fan-out of parsed webhook events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use serde_json::{Map, Value};

use crate::error::WebhookResult;
use crate::parser::ParsedWebhookEvent;

/// Free-form context map handed to every listener alongside the event.
pub type DispatchContext = Map<String, Value>;

/// A registered webhook listener.
///
/// Identity is the `Arc` allocation: the same cloned handle registers
/// once and can be removed by reference, while two structurally
/// identical closures are distinct registrations.
pub type WebhookHandler =
    Arc<dyn Fn(&ParsedWebhookEvent, &DispatchContext) -> WebhookResult<()> + Send + Sync>;

/// Removes one listener registration when invoked.
pub struct ListenerDisposer {
    registry: Weak<HandlerRegistry>,
    event: String,
    handler_id: usize,
}

impl ListenerDisposer {
    /// Removes the registration this disposer was issued for.
    ///
    /// A no-op when the listener was already removed or the dispatcher
    /// is gone.
    pub fn dispose(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event, self.handler_id);
        }
    }
}

struct HandlerRegistry {
    // Per event name, in registration order.
    handlers: Mutex<HashMap<String, Vec<(usize, WebhookHandler)>>>,
}

impl HandlerRegistry {
    fn insert(&self, event: &str, handler_id: usize, handler: WebhookHandler) {
        let mut handlers = self.handlers.lock().unwrap();
        let entries = handlers.entry(event.to_string()).or_default();

        // Re-registering the same handler replaces it in place, keeping
        // its original position in the fan-out order.
        match entries.iter_mut().find(|(id, _)| *id == handler_id) {
            Some(entry) => entry.1 = handler,
            None => entries.push((handler_id, handler)),
        }
    }

    fn remove(&self, event: &str, handler_id: usize) {
        let mut handlers = self.handlers.lock().unwrap();
        if let Some(entries) = handlers.get_mut(event) {
            entries.retain(|(id, _)| *id != handler_id);
            if entries.is_empty() {
                handlers.remove(event);
            }
        }
    }

    fn snapshot(&self, event: &str) -> Vec<WebhookHandler> {
        let handlers = self.handlers.lock().unwrap();
        handlers
            .get(event)
            .map(|entries| entries.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default()
    }

    fn count(&self, event: Option<&str>) -> usize {
        let handlers = self.handlers.lock().unwrap();
        match event {
            Some(event) => handlers.get(event).map_or(0, Vec::len),
            None => handlers.values().map(Vec::len).sum(),
        }
    }

    fn clear(&self) {
        self.handlers.lock().unwrap().clear();
    }
}

/// Publish/subscribe registry keyed by webhook event name.
///
/// Listeners run synchronously, in registration order, on the
/// dispatching thread. Listener failures propagate to the `dispatch`
/// caller; the dispatcher performs no fault isolation of its own.
#[derive(Clone)]
pub struct WebhookDispatcher {
    registry: Arc<HandlerRegistry>,
}

impl WebhookDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(HandlerRegistry {
                handlers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers a listener for an event name.
    ///
    /// Returns a disposer that removes exactly this registration.
    pub fn register_listener(
        &self,
        event: impl Into<String>,
        handler: WebhookHandler,
    ) -> ListenerDisposer {
        let event = event.into();
        let handler_id = handler_id(&handler);
        self.registry.insert(&event, handler_id, handler);

        ListenerDisposer {
            registry: Arc::downgrade(&self.registry),
            event,
            handler_id,
        }
    }

    /// Registers a listener that runs at most once.
    ///
    /// The registration is removed before the first invocation runs, so
    /// a listener that triggers a re-dispatch cannot re-fire itself.
    pub fn register_once(
        &self,
        event: impl Into<String>,
        handler: WebhookHandler,
    ) -> ListenerDisposer {
        let event = event.into();
        let fired = Arc::new(AtomicBool::new(false));
        let wrapper_id = Arc::new(OnceLock::new());
        let registry = Arc::downgrade(&self.registry);

        let wrapped: WebhookHandler = {
            let event = event.clone();
            let fired = fired.clone();
            let wrapper_id = wrapper_id.clone();
            let registry = registry.clone();

            Arc::new(move |parsed, context| {
                if fired.swap(true, Ordering::SeqCst) {
                    return Ok(());
                }
                if let (Some(registry), Some(id)) = (registry.upgrade(), wrapper_id.get()) {
                    registry.remove(&event, *id);
                }
                handler(parsed, context)
            })
        };

        let handler_id = handler_id(&wrapped);
        wrapper_id
            .set(handler_id)
            .expect("once wrapper id is set exactly once");
        self.registry.insert(&event, handler_id, wrapped);

        ListenerDisposer {
            registry,
            event,
            handler_id,
        }
    }

    /// Removes a previously registered listener by reference.
    pub fn unregister_listener(&self, event: &str, handler: &WebhookHandler) {
        self.registry.remove(event, handler_id(handler));
    }

    /// Invokes every listener registered for the event, in order.
    ///
    /// A no-op when nothing is registered. The first listener error
    /// stops the fan-out and propagates.
    pub fn dispatch(
        &self,
        event: &ParsedWebhookEvent,
        context: &DispatchContext,
    ) -> WebhookResult<()> {
        for handler in self.registry.snapshot(event.event_name()) {
            handler(event, context)?;
        }
        Ok(())
    }

    /// The number of registrations, for one event name or in total.
    pub fn handler_count(&self, event: Option<&str>) -> usize {
        self.registry.count(event)
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.registry.clear();
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn handler_id(handler: &WebhookHandler) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}
