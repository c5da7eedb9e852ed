//! Ctrl-C handling for the binaries

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

/// Install a Ctrl-C handler and return the flag it sets
///
/// If the handler cannot be installed the flag is still returned; it just never fires.
#[must_use]
pub fn install() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, stopping");
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl+C handler: {e}");
    }
    flag
}
