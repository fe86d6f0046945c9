//! Out-of-band notification of page grants.
//!
//! When an owner adds a user to a page's allow-list, the target is told
//! about it through whatever channel the deployment wires in. Delivery is
//! fire-and-forget: a grant must never fail or block because a
//! notification could not be sent.

use std::sync::Arc;

/// Delivery channel for grant notifications.
pub trait Notifier: Send + Sync {
    /// Tells `username` they were granted access to the page at `slug`.
    /// Implementations must not panic; failures are theirs to log.
    fn notify_grant(&self, username: &str, slug: &str);
}

/// Default notifier: records the grant in the server log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_grant(&self, username: &str, slug: &str) {
        tracing::info!(username, slug, "page access granted");
    }
}

/// Shared handle stored in `AppState`.
pub type SharedNotifier = Arc<dyn Notifier>;
