use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Shared stop request, raised by Ctrl-C.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Raise this signal on Ctrl-C. The run carries on without a handler
    /// if one cannot be installed.
    pub fn install_ctrlc(&self) {
        let signal = self.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            debug!("Interrupt received");
            signal.raise();
        }) {
            warn!("Failed to set Ctrl-C handler: {e}");
        }
    }
}
