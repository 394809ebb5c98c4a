use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Callback invoked with the new reachability state.
pub type ReachabilityCallback = Box<dyn Fn(bool) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegistrationId(u64);

/// Platform connectivity API.
pub trait NetworkMonitor: Send + Sync {
    /// Current reachability, without blocking.
    fn is_reachable(&self) -> bool;

    /// Register a callback fired on every reachability change.
    fn register(&self, callback: ReachabilityCallback) -> RegistrationId;

    /// Remove a callback. Unknown or already removed ids are ignored.
    fn unregister(&self, id: RegistrationId);
}

/// Callback table shared by the monitors in this module.
#[derive(Default)]
struct CallbackRegistry {
    next_id: AtomicU64,
    callbacks: Mutex<BTreeMap<RegistrationId, Arc<ReachabilityCallback>>>,
}

impl CallbackRegistry {
    fn register(&self, callback: ReachabilityCallback) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(callback));
        id
    }

    fn unregister(&self, id: RegistrationId) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn len(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Invoke every callback outside the lock, so a callback may unregister.
    fn notify(&self, reachable: bool) {
        let callbacks: Vec<_> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(reachable);
        }
    }
}

// ============================================================================
// ManualMonitor
// ============================================================================

/// Monitor driven by the host application, e.g. a mobile shell forwarding
/// the OS reachability notifications.
///
/// Transitions are delivered one at a time, in the order they were applied,
/// so the last delivered value is always the current state. Callbacks must
/// not call `set_reachable`.
#[derive(Default)]
pub struct ManualMonitor {
    reachable: AtomicBool,
    registry: CallbackRegistry,
    transition: Mutex<()>,
}

impl ManualMonitor {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            registry: CallbackRegistry::default(),
            transition: Mutex::new(()),
        }
    }

    /// Record a new reachability state and notify callbacks if it changed.
    pub fn set_reachable(&self, reachable: bool) {
        let _transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);
        if self.reachable.swap(reachable, Ordering::SeqCst) != reachable {
            debug!(reachable, "Reachability changed");
            self.registry.notify(reachable);
        }
    }

    pub fn registered_callbacks(&self) -> usize {
        self.registry.len()
    }
}

impl NetworkMonitor for ManualMonitor {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn register(&self, callback: ReachabilityCallback) -> RegistrationId {
        self.registry.register(callback)
    }

    fn unregister(&self, id: RegistrationId) {
        self.registry.unregister(id);
    }
}

// ============================================================================
// HttpPollMonitor
// ============================================================================

/// Ping request timeout. Kept short so a dead link is noticed quickly.
const PING_TIMEOUT_SECS: u64 = 5;

/// Monitor that periodically pings a URL. Any HTTP response, whatever its
/// status, counts as reachable; connection errors and timeouts do not.
pub struct HttpPollMonitor {
    state: ManualMonitor,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HttpPollMonitor {
    /// Ping once to get a boot value, then keep pinging every `interval`.
    pub async fn start(url: &str, interval: Duration) -> Result<Arc<Self>, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PING_TIMEOUT_SECS))
            .build()?;
        let initial = ping(&client, url).await;
        info!(url, reachable = initial, "Starting reachability check");

        let monitor = Arc::new(Self {
            state: ManualMonitor::new(initial),
            task: Mutex::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&monitor);
        let url = url.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick is immediate
            loop {
                ticker.tick().await;
                let reachable = ping(&client, &url).await;
                let Some(monitor) = weak.upgrade() else {
                    break;
                };
                monitor.state.set_reachable(reachable);
            }
        });
        *monitor.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(monitor)
    }

    pub fn stop(&self) {
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for HttpPollMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl NetworkMonitor for HttpPollMonitor {
    fn is_reachable(&self) -> bool {
        self.state.is_reachable()
    }

    fn register(&self, callback: ReachabilityCallback) -> RegistrationId {
        self.state.register(callback)
    }

    fn unregister(&self, id: RegistrationId) {
        self.state.unregister(id);
    }
}

async fn ping(client: &Client, url: &str) -> bool {
    match client.head(url).send().await {
        Ok(_) => true,
        Err(e) => {
            debug!(url, error = %e, "Reachability ping failed");
            false
        }
    }
}
