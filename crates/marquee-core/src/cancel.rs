//! Cooperative cancellation for library scans.
//!
//! Scans are read-only, so abandoning one halfway leaves nothing to undo.
//! The scanner checks the token between directories. A scan also stops when
//! the future driving it is dropped, since it spawns no tasks of its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag observed by every clone.
///
/// ```
/// use marquee_library::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(CancelledError)` once cancellation was requested.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

/// Error returned when an operation is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError;

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scan was cancelled")
    }
}

impl std::error::Error for CancelledError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();
        assert!(!token2.is_cancelled());

        token1.cancel();
        assert!(token2.is_cancelled());
        assert_eq!(token2.check(), Err(CancelledError));
    }
}
