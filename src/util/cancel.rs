//! User-initiated cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

/// Shared flag checked between stages and while waiting on external processes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Create a token that is cancelled on Ctrl-C.
    ///
    /// `ctrlc` allows a single handler per process, so call this once.
    pub fn from_ctrlc() -> Result<Self> {
        let token = CancelToken::new();
        let handle = token.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("interrupt received, cancelling");
            handle.cancel();
        })
        .context("failed to install Ctrl-C handler")?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }
}
