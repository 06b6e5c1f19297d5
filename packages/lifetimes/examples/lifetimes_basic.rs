//! Basic example of observing the end of an owner's scope.
//!
//! This example demonstrates the simplest usage pattern: an owner embeds a
//! token, observers derive handles from it, and dropping the owner fires
//! every registered observer exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lifetimes::LifetimeToken;

struct Connection {
    lifetime_token: LifetimeToken,
}

fn main() {
    println!("=== Lifetimes Basic Example ===");

    let connection = Connection {
        lifetime_token: LifetimeToken::new(),
    };

    // Observers hold a cheap, clonable handle - never the connection itself.
    let lifetime = connection.lifetime_token.lifetime();

    let notified = Arc::new(AtomicBool::new(false));
    lifetime.observe_ended({
        let notified = Arc::clone(&notified);
        move || {
            notified.store(true, Ordering::SeqCst);
            println!("Connection ended!");
        }
    });

    println!("Observer notified yet? {}", notified.load(Ordering::SeqCst));

    println!("Dropping the connection...");
    drop(connection);

    println!("Observer notified yet? {}", notified.load(Ordering::SeqCst));

    // Late registration fires immediately - the moment already passed.
    lifetime.observe_ended(|| println!("Late observer fires inline!"));

    println!("Example completed successfully!");
}
