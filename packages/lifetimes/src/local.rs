//! Single-threaded lifetime observation.
//!
//! The same state machine as the thread-safe variant, with `Rc`/`Cell`
//! plumbing instead of `Arc`/`Mutex` and no `Send` bound on observer
//! actions. Lower overhead, not usable across threads.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::AddAssign;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::{Rc, Weak};

use disposables::Disposable;

type LocalObserverFn = Box<dyn FnOnce()>;

/// State of a single-threaded termination signal.
enum LocalSignalState {
    /// Not yet terminated. Observers are held in registration order; the keys
    /// identify entries so a detach handle can remove exactly its own entry.
    Pending {
        observers: Vec<(u64, LocalObserverFn)>,
        next_key: u64,
    },

    /// Terminated. Registered observers have been invoked and released;
    /// any further registration fires inline instead of being stored.
    Terminated,
}

impl fmt::Debug for LocalSignalState {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending {
                observers,
                next_key,
            } => f
                .debug_struct("Pending")
                .field("observers", &observers.len())
                .field("next_key", next_key)
                .finish(),
            Self::Terminated => f.write_str("Terminated"),
        }
    }
}

/// Single-threaded counterpart of the crate's termination signal.
pub(crate) struct LocalTerminationSignal {
    state: RefCell<LocalSignalState>,
}

impl LocalTerminationSignal {
    fn new() -> Self {
        Self {
            state: RefCell::new(LocalSignalState::Pending {
                observers: Vec::new(),
                next_key: 0,
            }),
        }
    }

    fn terminated() -> Self {
        Self {
            state: RefCell::new(LocalSignalState::Terminated),
        }
    }

    fn observe(self: &Rc<Self>, action: LocalObserverFn) -> Option<LocalObserverHandle> {
        {
            let mut state = self.state.borrow_mut();

            if let LocalSignalState::Pending {
                observers,
                next_key,
            } = &mut *state
            {
                let key = *next_key;
                *next_key = next_key.wrapping_add(1);
                observers.push((key, action));

                return Some(LocalObserverHandle {
                    signal: Rc::downgrade(self),
                    key,
                    detached: Cell::new(false),
                });
            }
        }

        // Already terminated - fire synchronously, after the borrow ends so
        // the action may use this signal without a double borrow.
        action();
        None
    }

    fn terminate(&self) {
        let observers = match self.state.replace(LocalSignalState::Terminated) {
            LocalSignalState::Pending { observers, .. } => observers,
            LocalSignalState::Terminated => return,
        };

        // Observers run with no borrow held, so an observer that registers a
        // new observer simply takes the inline-fire path above. Each one is
        // isolated; the first panic resumes once all have run.
        let mut first_panic = None;

        for (_, action) in observers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(action)) {
                first_panic.get_or_insert(payload);
            }
        }

        if let Some(payload) = first_panic {
            resume_unwind(payload);
        }
    }

    fn has_terminated(&self) -> bool {
        matches!(*self.state.borrow(), LocalSignalState::Terminated)
    }

    fn detach(&self, key: u64) {
        let removed = {
            let mut state = self.state.borrow_mut();

            if let LocalSignalState::Pending { observers, .. } = &mut *state {
                observers
                    .iter()
                    .position(|(observer_key, _)| *observer_key == key)
                    .map(|index| observers.remove(index))
            } else {
                None
            }
        };

        // The removed observer (and whatever it captured) is released here,
        // after the borrow has ended.
        drop(removed);
    }
}

impl fmt::Debug for LocalTerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTerminationSignal")
            .field("state", &self.state)
            .finish()
    }
}

/// Single-threaded counterpart of [`LifetimeToken`][crate::LifetimeToken].
///
/// Dropping the token terminates the signal and fires every registered
/// observer exactly once. Not `Clone`; exactly one place holds the authority
/// to terminate.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use lifetimes::LocalLifetimeToken;
///
/// let ended = Rc::new(Cell::new(false));
///
/// let token = LocalLifetimeToken::new();
/// token.lifetime().observe_ended({
///     let ended = Rc::clone(&ended);
///     move || ended.set(true)
/// });
///
/// drop(token);
/// assert!(ended.get());
/// ```
#[derive(Debug)]
pub struct LocalLifetimeToken {
    signal: Rc<LocalTerminationSignal>,
}

impl LocalLifetimeToken {
    /// Creates a token with a fresh, pending signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: Rc::new(LocalTerminationSignal::new()),
        }
    }

    /// Derives a handle observing this token's signal.
    ///
    /// The handle shares the signal only - it does not retain the token, so
    /// it remains fully functional after the token and its owner are gone.
    #[must_use]
    pub fn lifetime(&self) -> LocalLifetime {
        LocalLifetime {
            signal: Rc::clone(&self.signal),
        }
    }
}

impl Default for LocalLifetimeToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalLifetimeToken {
    fn drop(&mut self) {
        self.signal.terminate();
    }
}

/// Single-threaded counterpart of [`Lifetime`][crate::Lifetime].
#[derive(Clone, Debug)]
pub struct LocalLifetime {
    signal: Rc<LocalTerminationSignal>,
}

impl LocalLifetime {
    /// The thread-wide handle that has already ended.
    ///
    /// Every registration on it fires immediately, always.
    #[must_use]
    pub fn empty() -> Self {
        thread_local! {
            static ENDED: Rc<LocalTerminationSignal> =
                Rc::new(LocalTerminationSignal::terminated());
        }

        Self {
            signal: ENDED.with(Rc::clone),
        }
    }

    /// Registers `action` to run when the lifetime ends.
    ///
    /// If the lifetime has already ended, `action` runs immediately and
    /// synchronously and `None` is returned. Otherwise the returned handle
    /// can be disposed to detach the not-yet-fired observer; merely dropping
    /// the handle detaches nothing.
    pub fn observe_ended(&self, action: impl FnOnce() + 'static) -> Option<LocalObserverHandle> {
        self.signal.observe(Box::new(action))
    }

    /// Ties a disposable's release to the end of this lifetime.
    ///
    /// The disposable is consumed; callers that want to keep watching it pass
    /// an `Rc` and retain a clone.
    pub fn attach(&self, disposable: impl Disposable + 'static) -> Option<LocalObserverHandle> {
        self.observe_ended(move || disposable.dispose())
    }

    /// Whether the owner has already been reclaimed.
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.signal.has_terminated()
    }
}

impl From<&LocalLifetimeToken> for LocalLifetime {
    fn from(token: &LocalLifetimeToken) -> Self {
        token.lifetime()
    }
}

/// Operator sugar for [`LocalLifetime::attach`], discarding the detach handle.
impl<D> AddAssign<D> for LocalLifetime
where
    D: Disposable + 'static,
{
    fn add_assign(&mut self, disposable: D) {
        drop(self.attach(disposable));
    }
}

/// Detach handle for a registered observer; returned by
/// [`LocalLifetime::observe_ended`] and [`LocalLifetime::attach`].
///
/// Disposing it removes the observer if it has not fired yet; if firing got
/// there first (or the signal is gone entirely), disposing is a safe no-op.
#[derive(Debug)]
pub struct LocalObserverHandle {
    signal: Weak<LocalTerminationSignal>,
    key: u64,
    detached: Cell<bool>,
}

impl Disposable for LocalObserverHandle {
    fn dispose(&self) {
        if self.detached.replace(true) {
            return;
        }

        if let Some(signal) = self.signal.upgrade() {
            signal.detach(self.key);
        }
    }

    fn is_disposed(&self) -> bool {
        self.detached.get()
    }
}
