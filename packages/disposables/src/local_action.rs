//! Single-threaded adapter from "run this closure once" to the capability.

use std::cell::RefCell;
use std::fmt;

use crate::Disposable;

/// A single-threaded [`Disposable`] backed by a closure that runs at most once.
///
/// Like [`ActionDisposable`][crate::ActionDisposable] but without the `Send`
/// requirement on the closure and without lock overhead, at the cost of not
/// being usable across threads.
///
/// The closure is invoked after the internal borrow has been released, so a
/// closure that re-enters `dispose()` on the same instance observes a
/// completed disposal rather than panicking on a double borrow.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use disposables::{Disposable, LocalActionDisposable};
///
/// let released = Rc::new(Cell::new(false));
///
/// let disposable = LocalActionDisposable::new({
///     let released = Rc::clone(&released);
///     move || released.set(true)
/// });
///
/// disposable.dispose();
/// disposable.dispose(); // No-op, the closure already ran.
///
/// assert!(released.get());
/// assert!(disposable.is_disposed());
/// ```
pub struct LocalActionDisposable {
    // `None` means the action has been taken (and run) by a dispose call.
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl LocalActionDisposable {
    /// Creates a disposable that runs `action` on the first `dispose()` call.
    #[must_use]
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: RefCell::new(Some(Box::new(action))),
        }
    }
}

impl Disposable for LocalActionDisposable {
    fn dispose(&self) {
        // The borrow ends before the action runs.
        let action = self.action.borrow_mut().take();

        if let Some(action) = action {
            action();
        }
    }

    fn is_disposed(&self) -> bool {
        self.action.borrow().is_none()
    }
}

impl fmt::Debug for LocalActionDisposable {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalActionDisposable")
            .field("is_disposed", &self.is_disposed())
            .finish()
    }
}
