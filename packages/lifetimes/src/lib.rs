//! Observe the end of an owner's scope without keeping the owner alive.
//!
//! An owner embeds a token; any number of independent parties derive a
//! lifetime handle from that token and register actions (or attach
//! [`Disposable`][disposables::Disposable] resources) that run exactly once,
//! at the moment the owner is reclaimed - and run immediately if that moment
//! has already passed.
//!
//! The handle never keeps the owner alive: it shares only the underlying
//! single-shot termination signal, not the token. Dropping the token is the
//! trigger; no explicit shutdown call exists or is needed.
//!
//! Both single-threaded and thread-safe variants are available:
//! - [`LifetimeToken`], [`Lifetime`], [`ObserverHandle`] - Thread-safe variants
//! - [`LocalLifetimeToken`], [`LocalLifetime`], [`LocalObserverHandle`] - Single-threaded variants
//!
//! # Thread-safe Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! use lifetimes::LifetimeToken;
//!
//! let ended = Arc::new(AtomicBool::new(false));
//!
//! // The owner stores the token as a private field.
//! let token = LifetimeToken::new();
//!
//! // Observers hold a cheap, copyable handle - never the token itself.
//! let lifetime = token.lifetime();
//! lifetime.observe_ended({
//!     let ended = Arc::clone(&ended);
//!     move || ended.store(true, Ordering::SeqCst)
//! });
//!
//! assert!(!ended.load(Ordering::SeqCst));
//!
//! // Reclaiming the owner (dropping the token) fires every observer once.
//! drop(token);
//! assert!(ended.load(Ordering::SeqCst));
//! ```
//!
//! # Single-threaded Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use lifetimes::LocalLifetimeToken;
//!
//! let ended = Rc::new(Cell::new(false));
//!
//! let token = LocalLifetimeToken::new();
//! let lifetime = token.lifetime();
//! lifetime.observe_ended({
//!     let ended = Rc::clone(&ended);
//!     move || ended.set(true)
//! });
//!
//! drop(token);
//! assert!(ended.get());
//! ```
//!
//! # Late registration
//!
//! Registering after the owner is already gone fires the action immediately,
//! synchronously, on the calling thread:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! use lifetimes::LifetimeToken;
//!
//! let token = LifetimeToken::new();
//! let lifetime = token.lifetime();
//! drop(token);
//!
//! let fired = Arc::new(AtomicBool::new(false));
//! let handle = lifetime.observe_ended({
//!     let fired = Arc::clone(&fired);
//!     move || fired.store(true, Ordering::SeqCst)
//! });
//! assert!(fired.load(Ordering::SeqCst));
//! assert!(handle.is_none()); // Nothing left to detach from.
//! ```

mod constants;
mod local;
mod sync;

pub use local::{LocalLifetime, LocalLifetimeToken, LocalObserverHandle};
pub use sync::{Lifetime, LifetimeToken, ObserverHandle};

pub(crate) use constants::ERR_POISONED_LOCK;
