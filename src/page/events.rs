use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::page::account::WalletAccount;

/// Payload of the `change` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub accounts: Vec<WalletAccount>,
}

pub type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Event name → listeners, invoked in subscription order.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: &str, listener: Listener) {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Removes by reference equality; other clones of a different `Arc` stay.
    pub fn off(&self, event: &str, listener: &Listener) {
        let mut listeners = self.listeners.lock();
        if let Some(list) = listeners.get_mut(event) {
            list.retain(|l| !Arc::ptr_eq(l, listener));
            if list.is_empty() {
                listeners.remove(event);
            }
        }
    }

    /// Synchronous. The listener list is copied first so a listener may subscribe
    /// or unsubscribe while being called.
    pub fn emit(&self, event: &str, payload: &ChangeEvent) {
        let snapshot = self.listeners.lock().get(event).cloned().unwrap_or_default();
        for listener in snapshot {
            listener(payload);
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(calls: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Listener {
        let calls = Arc::clone(calls);
        Arc::new(move |_: &ChangeEvent| calls.lock().push(name))
    }

    #[test]
    fn test_emit_in_subscription_order() {
        let emitter = EventEmitter::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        emitter.on("change", recorder(&calls, "a"));
        emitter.on("change", recorder(&calls, "b"));
        emitter.on("other", recorder(&calls, "x"));

        emitter.emit("change", &ChangeEvent { accounts: vec![] });

        assert_eq!(*calls.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_off_removes_only_that_reference() {
        let emitter = EventEmitter::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&calls, "a");
        let a_twin = recorder(&calls, "a");
        emitter.on("change", Arc::clone(&a));
        emitter.on("change", a_twin);

        emitter.off("change", &a);
        emitter.emit("change", &ChangeEvent { accounts: vec![] });

        assert_eq!(*calls.lock(), vec!["a"]);
        assert_eq!(emitter.listener_count("change"), 1);
    }
}
