//! Cooperative cancellation for long scans

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Result, StorageError};

/// Shared flag checked by [`DataDir::open`](crate::DataDir::open) before
/// each container is processed
///
/// Clones share the same flag, so one can be handed to a UI thread while
/// the scan runs elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(StorageError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());

        other.cancel();
        assert!(flag.is_canceled());
        assert!(matches!(flag.check(), Err(StorageError::Canceled)));
    }
}
