use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, Stream};
use tokio::sync::watch;
use tracing::debug;

use super::monitor::{NetworkMonitor, RegistrationId};

/// Live view of network reachability.
///
/// The boot value is read from the platform at construction, so a cold
/// start while online never reports offline. It is read again once the
/// callback is in place, so a transition during registration is not lost. Exactly one platform callback
/// is registered; `shutdown` (also run on drop) removes it and is safe to
/// call more than once. A callback firing after shutdown is dropped.
///
/// Going back online does not trigger any synchronization by itself; the
/// `Repository` subscribes and decides what to replay.
pub struct ConnectivityObserver {
    monitor: Arc<dyn NetworkMonitor>,
    state: Arc<watch::Sender<bool>>,
    registration: Mutex<Option<RegistrationId>>,
    closed: Arc<AtomicBool>,
}

impl ConnectivityObserver {
    pub fn new(monitor: Arc<dyn NetworkMonitor>) -> Self {
        let initial = monitor.is_reachable();
        let (tx, _rx) = watch::channel(initial);
        let state = Arc::new(tx);
        let closed = Arc::new(AtomicBool::new(false));

        let weak_state = Arc::downgrade(&state);
        let callback_closed = closed.clone();
        let registration = monitor.register(Box::new(move |online| {
            if callback_closed.load(Ordering::SeqCst) {
                debug!(online, "Dropping reachability change after shutdown");
                return;
            }
            if let Some(state) = weak_state.upgrade() {
                apply(&state, online);
            }
        }));
        let boot = monitor.is_reachable();
        apply(&state, boot);
        debug!(online = boot, "Connectivity observer registered");

        Self {
            monitor,
            state,
            registration: Mutex::new(Some(registration)),
            closed,
        }
    }

    /// Last known reachability. Never blocks.
    pub fn is_online_now(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Stream of reachability values, one item per transition. Ends when the
    /// observer is dropped.
    pub fn changes(&self) -> impl Stream<Item = bool> + Send + 'static {
        stream::unfold(self.subscribe(), |mut rx| async move {
            rx.changed().await.ok()?;
            let online = *rx.borrow_and_update();
            Some((online, rx))
        })
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Unregister the platform callback.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = registration {
            self.monitor.unregister(id);
            debug!("Connectivity observer unregistered");
        }
    }
}

fn apply(state: &watch::Sender<bool>, online: bool) {
    state.send_if_modified(|current| {
        if *current == online {
            false
        } else {
            *current = online;
            true
        }
    });
}

impl Drop for ConnectivityObserver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
