//! The core capability contract.

use std::rc::Rc;
use std::sync::Arc;

/// An idempotent "release a resource" capability with a queryable released flag.
///
/// Calling [`dispose()`][Self::dispose] more than once, from any number of
/// callers or threads, must have the same observable effect as calling it
/// once - no double-release, no error. [`is_disposed()`][Self::is_disposed]
/// is monotone: once it returns `true` it never reverts.
///
/// No single owner is required; anyone holding a reference may dispose.
///
/// # Example
///
/// ```rust
/// use disposables::{ActionDisposable, Disposable};
///
/// let resource = ActionDisposable::new(|| { /* release something */ });
/// resource.dispose();
/// assert!(resource.is_disposed());
/// ```
pub trait Disposable {
    /// Releases the underlying resource.
    ///
    /// Idempotent: the second and further calls are no-ops.
    fn dispose(&self);

    /// Whether the resource has been released.
    ///
    /// Must reflect a completed [`dispose()`][Self::dispose] call with no
    /// stale reads.
    fn is_disposed(&self) -> bool;
}

impl<T> Disposable for &T
where
    T: Disposable + ?Sized,
{
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

impl<T> Disposable for Box<T>
where
    T: Disposable + ?Sized,
{
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

impl<T> Disposable for Arc<T>
where
    T: Disposable + ?Sized,
{
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

impl<T> Disposable for Rc<T>
where
    T: Disposable + ?Sized,
{
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}
