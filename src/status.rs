//! Search readiness announcements.

use tracing::{info, warn};

use crate::queue::SearchRequestQueue;
use crate::runtime::QueryRuntime;

pub const INITIALIZING: &str = "Initializing Search...";
pub const READY: &str = "Search";
pub const OFFLINE: &str = "Search (Offline)";

/// Announce search status while the engine starts.
///
/// Enqueues [`INITIALIZING`], waits for the engine, then enqueues
/// [`READY`] or, if setup failed, [`OFFLINE`]. Setup errors are logged
/// and turned into the offline status, never returned. Returns whether
/// the engine came up.
pub async fn announce_readiness(runtime: &QueryRuntime, queue: &SearchRequestQueue) -> bool {
    queue.enqueue(INITIALIZING);
    match runtime.get_connection().await {
        Ok(_) => {
            info!("search ready");
            queue.enqueue(READY);
            true
        }
        Err(e) => {
            warn!(error = %format!("{:#}", e), "search unavailable");
            queue.enqueue(OFFLINE);
            false
        }
    }
}
