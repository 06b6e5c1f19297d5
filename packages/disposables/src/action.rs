//! Thread-safe adapter from "run this closure once" to the capability.

use std::fmt;
use std::sync::Mutex;

use crate::{Disposable, ERR_POISONED_LOCK};

/// A [`Disposable`] backed by a closure that runs at most once.
///
/// The closure runs on the thread that wins the first [`dispose()`] call;
/// concurrent callers racing on the same instance cannot make it run twice.
/// Once the closure has been taken, [`is_disposed()`] reports `true` forever.
///
/// The closure is invoked outside the internal lock, so a closure that
/// re-enters `dispose()` on the same instance observes a completed disposal
/// rather than deadlocking.
///
/// For single-threaded usage, see [`LocalActionDisposable`][crate::LocalActionDisposable]
/// which has lower overhead and does not require the closure to be `Send`.
///
/// [`dispose()`]: Disposable::dispose
/// [`is_disposed()`]: Disposable::is_disposed
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// use disposables::{ActionDisposable, Disposable};
///
/// let released = Arc::new(AtomicBool::new(false));
///
/// let disposable = ActionDisposable::new({
///     let released = Arc::clone(&released);
///     move || released.store(true, Ordering::SeqCst)
/// });
///
/// disposable.dispose();
/// disposable.dispose(); // No-op, the closure already ran.
///
/// assert!(released.load(Ordering::SeqCst));
/// assert!(disposable.is_disposed());
/// ```
pub struct ActionDisposable {
    // `None` means the action has been taken (and run) by a dispose call.
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ActionDisposable {
    /// Creates a disposable that runs `action` on the first `dispose()` call.
    ///
    /// # Example
    ///
    /// ```rust
    /// use disposables::ActionDisposable;
    ///
    /// let disposable = ActionDisposable::new(|| println!("released"));
    /// ```
    #[must_use]
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }
}

impl Disposable for ActionDisposable {
    fn dispose(&self) {
        // Take the action under the lock, run it outside the lock. The take
        // is what makes the run-at-most-once guarantee hold under races.
        let action = self.action.lock().expect(ERR_POISONED_LOCK).take();

        if let Some(action) = action {
            action();
        }
    }

    fn is_disposed(&self) -> bool {
        self.action.lock().expect(ERR_POISONED_LOCK).is_none()
    }
}

impl fmt::Debug for ActionDisposable {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDisposable")
            .field("is_disposed", &self.is_disposed())
            .finish()
    }
}
