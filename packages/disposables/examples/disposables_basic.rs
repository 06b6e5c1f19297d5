//! Basic example of adapting a closure into the disposable capability.
//!
//! This example demonstrates the idempotence contract: disposing twice has the
//! same observable effect as disposing once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use disposables::{ActionDisposable, Disposable};

fn main() {
    println!("=== Disposables Basic Example ===");

    let release_count = Arc::new(AtomicUsize::new(0));

    let disposable = ActionDisposable::new({
        let release_count = Arc::clone(&release_count);
        move || {
            release_count.fetch_add(1, Ordering::SeqCst);
            println!("Resource released!");
        }
    });

    println!("Disposed yet? {}", disposable.is_disposed());

    disposable.dispose();
    disposable.dispose(); // Second call is a no-op.

    println!("Disposed yet? {}", disposable.is_disposed());
    println!(
        "Release ran {} time(s)",
        release_count.load(Ordering::SeqCst)
    );
    println!("Example completed successfully!");
}
