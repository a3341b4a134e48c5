//! Per-session fan-out of game events to every subscribed connection.

use shared::{GameEvent, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<GameEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<GameEvent>;

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<SessionId, Vec<(usize, EventSender)>>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, session_id: SessionId) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(session_id).or_default().push((id, tx));
        (id, rx)
    }

    /// Queues `events` for every subscriber of the session. Never blocks.
    pub fn publish(&self, session_id: SessionId, events: &[GameEvent]) {
        if events.is_empty() {
            return;
        }
        let subscribers = {
            let guard = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            guard.get(&session_id).cloned()
        };

        if let Some(list) = subscribers {
            let mut failed = Vec::new();
            for (id, sender) in list {
                for event in events {
                    if sender.send(event.clone()).is_err() {
                        failed.push(id);
                        break;
                    }
                }
            }
            if !failed.is_empty() {
                self.remove_subscribers(session_id, &failed);
            }
        }
    }

    pub fn unsubscribe(&self, session_id: SessionId, subscriber_id: usize) {
        self.remove_subscribers(session_id, &[subscriber_id]);
    }

    /// Drops every subscription of a session, ending their receivers.
    pub fn close_session(&self, session_id: SessionId) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
    }

    pub fn subscriber_count(&self, session_id: SessionId) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .map_or(0, Vec::len)
    }

    fn remove_subscribers(&self, session_id: SessionId, ids: &[usize]) {
        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = guard.get_mut(&session_id) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(&session_id);
            }
        }
    }
}
