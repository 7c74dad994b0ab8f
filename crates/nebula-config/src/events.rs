//! Notifications emitted by the settings store.

use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender};

/// Something other subsystems may need to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsEvent {
    /// One or more settings changed since the last flush.
    Changed,
    /// An `autoload/<name>` setting was deleted.
    AutoloadRemoved(String),
    /// A `global_group/<name>` setting was deleted.
    GlobalGroupRemoved(String),
    /// A pack was mounted after load; cached global class lists are stale.
    GlobalClassesChanged,
    /// A pack was mounted after load; the resource UID cache must be reloaded.
    UidCacheChanged,
}

/// Fan-out of events to every live subscriber.
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<SettingsEvent>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self) -> Receiver<SettingsEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Sends `event` to all subscribers, dropping those whose receiver is gone.
    pub(crate) fn emit(&self, event: SettingsEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
