//! Cross-thread lifetime observation.
//!
//! The owner may be reclaimed on any thread while observers register from
//! other threads; every observer still fires exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use lifetimes::LifetimeToken;

fn main() {
    println!("=== Lifetimes Threading Example ===");

    let fired = Arc::new(AtomicUsize::new(0));

    let token = LifetimeToken::new();
    let lifetime = token.lifetime();

    // Several threads register observers through their own handle clones.
    let observers: Vec<_> = (0..4)
        .map(|index| {
            let lifetime = lifetime.clone();
            let fired = Arc::clone(&fired);
            thread::spawn(move || {
                lifetime.observe_ended(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                });
                println!("Observer {index} registered");
            })
        })
        .collect();

    for handle in observers {
        handle.join().unwrap();
    }

    // The owner is reclaimed on a background thread.
    let terminator = thread::spawn(move || {
        println!("Dropping the token on a background thread...");
        drop(token);
    });
    terminator.join().unwrap();

    println!("Observers fired: {}", fired.load(Ordering::SeqCst));
    println!("Lifetime ended? {}", lifetime.has_ended());
    println!("Example completed successfully!");
}
