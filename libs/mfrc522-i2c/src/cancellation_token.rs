use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A minimal inter-thread cancellation flag.
///
/// Session retry loops poll it between attempts, so a long-running card
/// operation can be abandoned from another thread (for example a signal
/// handler).
#[derive(Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token. Clone it to share it with another
    /// thread.
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Flips the token to the canceled state. There is no way back.
    #[inline]
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Checks whether the token has been canceled
    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_canceled());
        token.cancel();
        assert!(clone.is_canceled());
    }
}
