//! Viewer event channel with per-session generation tokens
//!
//! Browser callbacks (asset loader, AR hand-off, screenshot readback) fire
//! outside the frame loop, so the viewer pushes into a shared pending queue
//! that the session drains once per frame. Each model session owns a
//! [`Subscription`]; events from an older session can never reach a newer one.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::trace;

use crate::viewer::ViewerEvent;

/// Identifies one model session: the model plus a never-reused epoch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken {
    pub model_id: String,
    pub epoch: u64,
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model_id, self.epoch)
    }
}

/// An event tagged with the session that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub token: SessionToken,
    pub event: ViewerEvent,
}

#[derive(Default)]
struct ChannelState {
    active: Option<SessionToken>,
    next_epoch: u64,
    queue: VecDeque<Delivery>,
}

fn lock(state: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    // A panic while holding the lock leaves a plain queue behind, still usable
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared queue of pending viewer events
#[derive(Clone, Default)]
pub struct ViewerEvents {
    state: Arc<Mutex<ChannelState>>,
}

impl ViewerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session for `model_id`, superseding the current one
    pub fn subscribe(&self, model_id: &str) -> Subscription {
        let mut state = lock(&self.state);
        let token = SessionToken {
            model_id: model_id.to_string(),
            epoch: state.next_epoch,
        };
        state.next_epoch += 1;
        let dropped = state.queue.len();
        state.queue.clear();
        state.active = Some(token.clone());
        trace!(token = %token, dropped, "Opened viewer event subscription");

        Subscription {
            state: Arc::downgrade(&self.state),
            token,
        }
    }

    /// Take every queued event in arrival order
    pub fn drain(&self) -> Vec<Delivery> {
        lock(&self.state).queue.drain(..).collect()
    }

    pub fn active_token(&self) -> Option<SessionToken> {
        lock(&self.state).active.clone()
    }

    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }
}

/// Live registration of one model session on the event channel
///
/// Dropping it deactivates the token and purges whatever it left queued.
pub struct Subscription {
    state: Weak<Mutex<ChannelState>>,
    token: SessionToken,
}

impl Subscription {
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Handle given to the viewer for publishing this session's events
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            state: self.state.clone(),
            token: self.token.clone(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = lock(&state);
        if state.active.as_ref() == Some(&self.token) {
            state.active = None;
        }
        let token = &self.token;
        state.queue.retain(|d| &d.token != token);
        trace!(token = %self.token, "Closed viewer event subscription");
    }
}

/// Cloneable sender bound to a single session
#[derive(Clone)]
pub struct EventEmitter {
    state: Weak<Mutex<ChannelState>>,
    token: SessionToken,
}

impl EventEmitter {
    /// Queue an event; returns false when the session is no longer active
    pub fn emit(&self, event: ViewerEvent) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let mut state = lock(&state);
        if state.active.as_ref() != Some(&self.token) {
            trace!(token = %self.token, ?event, "Dropping event from inactive session");
            return false;
        }
        state.queue.push_back(Delivery {
            token: self.token.clone(),
            event,
        });
        true
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Whether events sent now would be accepted
    pub fn is_live(&self) -> bool {
        match self.state.upgrade() {
            Some(state) => lock(&state).active.as_ref() == Some(&self.token),
            None => false,
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_drain() {
        let events = ViewerEvents::new();
        let sub = events.subscribe("a");
        let emitter = sub.emitter();

        assert!(emitter.emit(ViewerEvent::Progress(0.25)));
        assert!(emitter.emit(ViewerEvent::Load));

        let drained = events.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().all(|d| &d.token == sub.token()));
        assert_eq!(drained[1].event, ViewerEvent::Load);
        assert_eq!(events.pending(), 0);
    }

    #[test]
    fn test_superseded_emitter_is_rejected() {
        let events = ViewerEvents::new();
        let first = events.subscribe("a");
        let stale = first.emitter();
        drop(first);
        let second = events.subscribe("a");

        assert_ne!(stale.token(), second.token());
        assert!(!stale.is_live());
        assert!(!stale.emit(ViewerEvent::Progress(0.9)));
        assert_eq!(events.pending(), 0);
        assert!(second.emitter().emit(ViewerEvent::Progress(0.1)));
        assert_eq!(events.pending(), 1);
    }

    #[test]
    fn test_drop_purges_queued_events() {
        let events = ViewerEvents::new();
        let sub = events.subscribe("a");
        sub.emitter().emit(ViewerEvent::Progress(0.5));
        sub.emitter().emit(ViewerEvent::Error(None));
        assert_eq!(events.pending(), 2);

        drop(sub);
        assert_eq!(events.pending(), 0);
        assert!(events.active_token().is_none());
    }

    #[test]
    fn test_late_drop_keeps_newer_session() {
        let events = ViewerEvents::new();
        let old = events.subscribe("a");
        let new = events.subscribe("b");
        new.emitter().emit(ViewerEvent::Load);

        drop(old);
        assert_eq!(events.active_token().as_ref(), Some(new.token()));
        assert_eq!(events.pending(), 1);
    }

    #[test]
    fn test_emitter_outliving_channel() {
        let events = ViewerEvents::new();
        let sub = events.subscribe("a");
        let emitter = sub.emitter();
        drop(sub);
        drop(events);
        assert!(!emitter.emit(ViewerEvent::Load));
    }
}
