//! Idempotent resource-release capability for cooperating packages.
//!
//! This crate defines the [`Disposable`] trait: a "release this resource"
//! contract where releasing twice is as harmless as releasing once, plus a
//! queryable released/not-released flag. It deliberately carries no payloads,
//! no error channel and no ownership requirements - whoever holds a reference
//! may dispose.
//!
//! Two adapters turn a run-at-most-once closure into the capability:
//! - [`ActionDisposable`] - thread-safe; the closure runs exactly once even
//!   when multiple threads race on `dispose()`.
//! - [`LocalActionDisposable`] - single-threaded variant with lower overhead
//!   and no `Send` requirement on the closure.
//!
//! # Example
//!
//! ```rust
//! use disposables::{ActionDisposable, Disposable};
//!
//! let connection_closer = ActionDisposable::new(|| {
//!     // Tear down some resource here.
//! });
//!
//! assert!(!connection_closer.is_disposed());
//! connection_closer.dispose();
//! connection_closer.dispose(); // Safe no-op.
//! assert!(connection_closer.is_disposed());
//! ```

mod action;
mod constants;
mod disposable;
mod local_action;

pub use action::ActionDisposable;
pub use disposable::Disposable;
pub use local_action::LocalActionDisposable;

pub(crate) use constants::ERR_POISONED_LOCK;
