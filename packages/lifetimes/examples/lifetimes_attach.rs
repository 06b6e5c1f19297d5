//! Tying resource disposal to the end of a lifetime.
//!
//! This example attaches disposables to a lifetime so they are released
//! exactly when the owner is reclaimed, including via the `+=` shorthand.

use std::sync::Arc;

use disposables::{ActionDisposable, Disposable};
use lifetimes::LifetimeToken;

fn main() {
    println!("=== Lifetimes Attach Example ===");

    let token = LifetimeToken::new();
    let mut lifetime = token.lifetime();

    let file_handle = Arc::new(ActionDisposable::new(|| println!("File closed")));
    let socket = Arc::new(ActionDisposable::new(|| println!("Socket shut down")));

    // Plain attach, keeping a clone so we can watch the disposal state.
    lifetime.attach(Arc::clone(&file_handle));

    // Operator sugar, same semantics.
    lifetime += Arc::clone(&socket);

    println!("File disposed? {}", file_handle.is_disposed());
    println!("Socket disposed? {}", socket.is_disposed());

    println!("Dropping the owner...");
    drop(token);

    println!("File disposed? {}", file_handle.is_disposed());
    println!("Socket disposed? {}", socket.is_disposed());

    // Disposing again is a safe no-op.
    file_handle.dispose();

    println!("Example completed successfully!");
}
