//! Network reachability tracking.
//!
//! A `NetworkMonitor` is the platform side: it answers "is the network
//! reachable right now" and calls registered callbacks on changes.
//! `ConnectivityObserver` bridges one such callback into a `watch` channel
//! that the `Repository` and UI tasks read from.
//!
//! Two monitors ship with the crate:
//! - `ManualMonitor`: the host pushes reachability (mobile bindings)
//! - `HttpPollMonitor`: polls the backend over HTTP (desktop, CLI)

pub mod monitor;
pub mod observer;

pub use monitor::{HttpPollMonitor, ManualMonitor, NetworkMonitor, ReachabilityCallback, RegistrationId};
pub use observer::ConnectivityObserver;
