//! Private helpers for testing in this workspace.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs a test with a timeout to prevent infinite hangs.
///
/// The failure mode this workspace cares most about is a lost notification:
/// a test waiting for an observer that never fires would otherwise hang the
/// build instead of failing. Wrapping such tests in the watchdog turns a
/// hang into a loud panic.
///
/// # Panics
///
/// Panics if the test exceeds the timeout.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let result = with_watchdog(|| 2 + 2);
/// assert_eq!(result, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    // Run the test in a separate thread so we can give up on it.
    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this send fails, the receiver already timed out.
        drop(tx.send(result));
    });

    // Miri executes thread synchronization dramatically slower, so it gets a
    // longer leash to avoid false positives.
    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded the watchdog timeout - likely a lost notification");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // The test thread panicked; propagate its panic.
            match test_handle.join() {
                Ok(()) => panic!("test thread disconnected unexpectedly"),
                Err(e) => std::panic::resume_unwind(e),
            }
        }
    }
}
