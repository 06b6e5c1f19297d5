//! Thread-safe lifetime observation.
//!
//! This module provides the thread-safe token, handle and detach types. The
//! token may be dropped on any thread concurrently with registrations made
//! through live handles on other threads; a racing registration lands
//! deterministically in exactly one of two outcomes (fired by the drop, or
//! fired inline afterwards), never both and never neither.

use std::fmt;
use std::mem;
use std::ops::AddAssign;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use disposables::Disposable;

use crate::ERR_POISONED_LOCK;

type ObserverFn = Box<dyn FnOnce() + Send>;

/// State of a termination signal.
enum SignalState {
    /// Not yet terminated. Observers are held in registration order; the keys
    /// identify entries so a detach handle can remove exactly its own entry.
    Pending {
        observers: Vec<(u64, ObserverFn)>,
        next_key: u64,
    },

    /// Terminated. Registered observers have been invoked and released;
    /// any further registration fires inline instead of being stored.
    Terminated,
}

impl fmt::Debug for SignalState {
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

/// The single-shot, value-less broadcast at the heart of the package.
///
/// Shared between one [`LifetimeToken`] (which alone has the authority to
/// terminate it) and any number of [`Lifetime`] handles. The signal outlives
/// the token - that is the whole point: handles hold the signal, never the
/// token, so observation cannot extend the owner's life.
pub(crate) struct TerminationSignal {
    state: Mutex<SignalState>,
}

impl TerminationSignal {
    fn new() -> Self {
        Self {
            state: Mutex::new(SignalState::Pending {
                observers: Vec::new(),
                next_key: 0,
            }),
        }
    }

    fn terminated() -> Self {
        Self {
            state: Mutex::new(SignalState::Terminated),
        }
    }

    /// Registers an observer, or fires it inline if termination already
    /// happened. Returns a detach handle only in the former case.
    fn observe(self: &Arc<Self>, action: ObserverFn) -> Option<ObserverHandle> {
        {
            let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

            if let SignalState::Pending {
                observers,
                next_key,
            } = &mut *state
            {
                let key = *next_key;
                *next_key = next_key.wrapping_add(1);
                observers.push((key, action));

                return Some(ObserverHandle {
                    signal: Arc::downgrade(self),
                    key,
                    detached: AtomicBool::new(false),
                });
            }
        }

        // Already terminated - fire synchronously on the calling thread,
        // after the lock is released so the action may use this signal.
        action();
        None
    }

    /// Performs the one-way Pending -> Terminated transition and invokes every
    /// captured observer, in registration order. Idempotent: only the caller
    /// that wins the swap delivers; later calls find nothing to do.
    fn terminate(&self) {
        let observers = {
            let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

            match mem::replace(&mut *state, SignalState::Terminated) {
                SignalState::Pending { observers, .. } => observers,
                SignalState::Terminated => return,
            }
        };

        // Observers run outside the lock: registration stays bounded even
        // while delivery is in progress, and an observer that registers a new
        // observer simply takes the inline-fire path above.
        //
        // Each observer is isolated so one panicking observer cannot prevent
        // the rest from running. The first panic resumes once all have run.
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
        matches!(
            *self.state.lock().expect(ERR_POISONED_LOCK),
            SignalState::Terminated
        )
    }

    /// Removes a not-yet-fired observer by key. If termination got there
    /// first, firing won the race and this is a no-op.
    fn detach(&self, key: u64) {
        let removed = {
            let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

            if let SignalState::Pending { observers, .. } = &mut *state {
                observers
                    .iter()
                    .position(|(observer_key, _)| *observer_key == key)
                    .map(|index| observers.remove(index))
            } else {
                None
            }
        };

        // The removed observer (and whatever it captured) is released here,
        // outside the lock.
        drop(removed);
    }
}

impl fmt::Debug for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationSignal")
            .field("state", &self.state)
            .finish()
    }
}

/// The exclusively-owned marker whose reclamation ends the lifetime.
///
/// An owner stores the token as a private field; dropping the token (which
/// happens when the owner itself is dropped) terminates the signal and fires
/// every registered observer exactly once. This works even if no [`Lifetime`]
/// handle was ever derived, and is race-free against registration happening
/// concurrently on other threads.
///
/// The token is deliberately not `Clone`: exactly one place holds the
/// authority to terminate.
///
/// # Example
///
/// ```rust
/// use lifetimes::LifetimeToken;
///
/// struct Service {
///     lifetime_token: LifetimeToken,
/// }
///
/// let service = Service {
///     lifetime_token: LifetimeToken::new(),
/// };
///
/// let lifetime = service.lifetime_token.lifetime();
/// drop(service); // Observers registered on `lifetime` fire here.
/// assert!(lifetime.has_ended());
/// ```
#[derive(Debug)]
pub struct LifetimeToken {
    signal: Arc<TerminationSignal>,
}

impl LifetimeToken {
    /// Creates a token with a fresh, pending signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: Arc::new(TerminationSignal::new()),
        }
    }

    /// Derives a handle observing this token's signal.
    ///
    /// The handle shares the signal only - it does not retain the token, so
    /// it remains fully functional after the token and its owner are gone.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        Lifetime {
            signal: Arc::clone(&self.signal),
        }
    }
}

impl Default for LifetimeToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LifetimeToken {
    fn drop(&mut self) {
        self.signal.terminate();
    }
}

/// A cheap, freely clonable observation point for the end of an owner's scope.
///
/// Derived from a [`LifetimeToken`] (or obtained pre-terminated via
/// [`Lifetime::empty()`]). Many handles may observe the same signal; all see
/// the same single termination event, each registered action exactly once.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// use lifetimes::LifetimeToken;
///
/// let token = LifetimeToken::new();
/// let lifetime = token.lifetime();
///
/// let ended = Arc::new(AtomicBool::new(false));
/// lifetime.observe_ended({
///     let ended = Arc::clone(&ended);
///     move || ended.store(true, Ordering::SeqCst)
/// });
///
/// drop(token);
/// assert!(ended.load(Ordering::SeqCst));
/// ```
#[derive(Clone, Debug)]
pub struct Lifetime {
    signal: Arc<TerminationSignal>,
}

impl Lifetime {
    /// The process-wide handle that has already ended.
    ///
    /// Every registration on it fires immediately, always. Useful to
    /// represent "no lifetime" without conjuring up a real owner.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lifetimes::Lifetime;
    ///
    /// assert!(Lifetime::empty().has_ended());
    /// ```
    #[must_use]
    pub fn empty() -> Self {
        static ENDED: OnceLock<Arc<TerminationSignal>> = OnceLock::new();

        Self {
            signal: Arc::clone(ENDED.get_or_init(|| Arc::new(TerminationSignal::terminated()))),
        }
    }

    /// Registers `action` to run when the lifetime ends.
    ///
    /// If the lifetime has already ended, `action` runs immediately and
    /// synchronously on the calling thread and `None` is returned (there is
    /// nothing left to detach from). Otherwise the returned handle can be
    /// [`dispose()`][Disposable::dispose]d to detach the not-yet-fired
    /// observer; merely dropping the handle detaches nothing.
    pub fn observe_ended(&self, action: impl FnOnce() + Send + 'static) -> Option<ObserverHandle> {
        self.signal.observe(Box::new(action))
    }

    /// Ties a disposable's release to the end of this lifetime.
    ///
    /// Equivalent to [`observe_ended`][Self::observe_ended] with
    /// `disposable.dispose()` as the action. The disposable is consumed;
    /// callers that want to keep watching it pass an `Arc` (or `Rc`) and
    /// retain a clone.
    pub fn attach(&self, disposable: impl Disposable + Send + 'static) -> Option<ObserverHandle> {
        self.observe_ended(move || disposable.dispose())
    }

    /// Whether the owner has already been reclaimed.
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.signal.has_terminated()
    }
}

impl From<&LifetimeToken> for Lifetime {
    fn from(token: &LifetimeToken) -> Self {
        token.lifetime()
    }
}

/// Operator sugar for [`Lifetime::attach`], discarding the detach handle.
///
/// ```rust
/// use std::sync::Arc;
///
/// use disposables::{ActionDisposable, Disposable};
/// use lifetimes::LifetimeToken;
///
/// let token = LifetimeToken::new();
/// let mut lifetime = token.lifetime();
///
/// let resource = Arc::new(ActionDisposable::new(|| {}));
/// lifetime += Arc::clone(&resource);
///
/// drop(token);
/// assert!(resource.is_disposed());
/// ```
impl<D> AddAssign<D> for Lifetime
where
    D: Disposable + Send + 'static,
{
    fn add_assign(&mut self, disposable: D) {
        drop(self.attach(disposable));
    }
}

/// Detach handle for a registered observer; returned by
/// [`Lifetime::observe_ended`] and [`Lifetime::attach`].
///
/// Disposing it removes the observer if it has not fired yet; if firing got
/// there first (or the signal is gone entirely), disposing is a safe no-op.
/// The handle holds only a weak reference to the signal, so keeping it
/// around extends nothing's life.
#[derive(Debug)]
pub struct ObserverHandle {
    signal: Weak<TerminationSignal>,
    key: u64,
    detached: AtomicBool,
}

impl Disposable for ObserverHandle {
    fn dispose(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(signal) = self.signal.upgrade() {
            signal.detach(self.key);
        }
    }

    fn is_disposed(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use static_assertions::assert_impl_all;
    use testing::with_watchdog;

    use super::*;

    fn counting_observer(count: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn observer_fires_exactly_once_on_token_drop() {
        let count = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();

        let handle = lifetime.observe_ended(counting_observer(&count));
        assert!(handle.is_some());

        // Nothing fires while the owner is alive.
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!lifetime.has_ended());

        drop(token);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(lifetime.has_ended());
    }

    #[test]
    fn late_observer_fires_immediately() {
        let count = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();
        drop(token);

        let handle = lifetime.observe_ended(counting_observer(&count));

        // Fired synchronously, within the registration call itself.
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.is_none());
    }

    #[test]
    fn retained_handle_keeps_working_after_owner_is_gone() {
        let count = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();
        let retained = lifetime.clone();
        drop(token);
        drop(lifetime);

        retained.observe_ended(counting_observer(&count));
        retained.observe_ended(counting_observer(&count));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(retained.has_ended());
    }

    #[test]
    fn empty_lifetime_always_fires_immediately() {
        let count = Arc::new(AtomicUsize::new(0));

        assert!(Lifetime::empty().has_ended());

        for _ in 0..3 {
            let handle = Lifetime::empty().observe_ended(counting_observer(&count));
            assert!(handle.is_none());
        }

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn two_handles_two_observers_each_fire_once() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime_a = token.lifetime();
        let lifetime_b = token.lifetime();

        lifetime_a.observe_ended(counting_observer(&first));
        lifetime_b.observe_ended(counting_observer(&second));

        drop(token);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observers_fire_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();

        for index in 0..4_usize {
            let order = Arc::clone(&order);
            lifetime.observe_ended(move || order.lock().unwrap().push(index));
        }

        drop(token);

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn detach_before_drop_skips_observer() {
        let count = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();

        let handle = lifetime
            .observe_ended(counting_observer(&count))
            .expect("signal is pending");

        handle.dispose();
        assert!(handle.is_disposed());

        drop(token);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detach_only_removes_its_own_observer() {
        let kept = Arc::new(AtomicUsize::new(0));
        let detached = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();

        lifetime.observe_ended(counting_observer(&kept));
        let handle = lifetime
            .observe_ended(counting_observer(&detached))
            .expect("signal is pending");
        lifetime.observe_ended(counting_observer(&kept));

        handle.dispose();
        drop(token);

        assert_eq!(kept.load(Ordering::SeqCst), 2);
        assert_eq!(detached.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detach_after_fire_is_noop() {
        let count = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();

        let handle = lifetime
            .observe_ended(counting_observer(&count))
            .expect("signal is pending");

        drop(token);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Firing won; disposing afterwards changes nothing.
        handle.dispose();
        handle.dispose();

        assert!(handle.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_handle_does_not_detach() {
        let count = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();

        drop(lifetime.observe_ended(counting_observer(&count)));
        drop(token);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attached_disposable_is_disposed_on_token_drop() {
        let token = LifetimeToken::new();
        let lifetime = token.lifetime();

        let resource = Arc::new(disposables::ActionDisposable::new(|| {}));
        lifetime.attach(Arc::clone(&resource));

        assert!(!resource.is_disposed());

        drop(token);

        assert!(resource.is_disposed());

        // Disposing again afterwards is a safe no-op.
        resource.dispose();
        assert!(resource.is_disposed());
    }

    #[test]
    fn add_assign_is_attach() {
        let token = LifetimeToken::new();
        let mut lifetime = token.lifetime();

        let resource = Arc::new(disposables::ActionDisposable::new(|| {}));
        lifetime += Arc::clone(&resource);

        drop(token);

        assert!(resource.is_disposed());
    }

    #[test]
    fn terminate_twice_fires_observers_once() {
        let count = Arc::new(AtomicUsize::new(0));

        let signal = Arc::new(TerminationSignal::new());
        signal.observe(Box::new(counting_observer(&count)));

        signal.terminate();
        signal.terminate();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_observer_does_not_skip_the_rest() {
        let count = Arc::new(AtomicUsize::new(0));

        let signal = Arc::new(TerminationSignal::new());
        signal.observe(Box::new(|| panic!("observer failure")));
        signal.observe(Box::new(counting_observer(&count)));

        let outcome = catch_unwind(AssertUnwindSafe(|| signal.terminate()));

        assert!(outcome.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(signal.has_terminated());
    }

    #[test]
    fn observer_registering_another_observer_during_delivery() {
        let count = Arc::new(AtomicUsize::new(0));

        let token = LifetimeToken::new();
        let lifetime = token.lifetime();

        lifetime.observe_ended({
            let lifetime = lifetime.clone();
            let count = Arc::clone(&count);
            move || {
                // The signal is terminated by now, so this fires inline.
                let handle = lifetime.observe_ended(counting_observer(&count));
                assert!(handle.is_none());
            }
        });

        drop(token);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn token_dropped_on_another_thread() {
        with_watchdog(|| {
            let count = Arc::new(AtomicUsize::new(0));

            let token = LifetimeToken::new();
            let lifetime = token.lifetime();

            lifetime.observe_ended(counting_observer(&count));

            thread::spawn(move || drop(token)).join().unwrap();

            assert_eq!(count.load(Ordering::SeqCst), 1);
            assert!(lifetime.has_ended());
        });
    }

    #[test]
    fn registrations_race_termination_without_loss_or_duplication() {
        with_watchdog(|| {
            // Each registered observer must fire exactly once, whether it was
            // captured by the drop or fired inline after it. Total firings
            // must equal total registrations.
            let fired = Arc::new(AtomicUsize::new(0));
            let registered = Arc::new(AtomicUsize::new(0));

            let token = LifetimeToken::new();
            let lifetime = token.lifetime();

            let observers: Vec<_> = (0..4)
                .map(|_| {
                    let lifetime = lifetime.clone();
                    let fired = Arc::clone(&fired);
                    let registered = Arc::clone(&registered);
                    thread::spawn(move || {
                        for _ in 0..100 {
                            registered.fetch_add(1, Ordering::SeqCst);
                            lifetime.observe_ended(counting_observer(&fired));
                        }
                    })
                })
                .collect();

            let terminator = thread::spawn(move || drop(token));

            for handle in observers {
                handle.join().unwrap();
            }
            terminator.join().unwrap();

            assert_eq!(
                fired.load(Ordering::SeqCst),
                registered.load(Ordering::SeqCst)
            );
        });
    }

    #[test]
    fn lifetime_does_not_keep_token_state_alive() {
        let token = LifetimeToken::new();
        let lifetime = Lifetime::from(&token);

        // The handle shares the signal, not the token: reclaiming the owner
        // still terminates even though a handle is alive and retained.
        drop(token);

        assert!(lifetime.has_ended());
    }

    #[test]
    fn thread_safe_types() {
        assert_impl_all!(LifetimeToken: Send, Sync);
        assert_impl_all!(Lifetime: Send, Sync);
        assert_impl_all!(ObserverHandle: Send, Sync);
    }
}
