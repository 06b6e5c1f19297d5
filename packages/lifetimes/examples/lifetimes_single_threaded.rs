//! Single-threaded lifetime observation with the lower-overhead local types.

use std::cell::Cell;
use std::rc::Rc;

use disposables::{Disposable, LocalActionDisposable};
use lifetimes::LocalLifetimeToken;

fn main() {
    println!("=== Lifetimes Single-threaded Example ===");

    let token = LocalLifetimeToken::new();
    let lifetime = token.lifetime();

    let ended = Rc::new(Cell::new(false));
    lifetime.observe_ended({
        let ended = Rc::clone(&ended);
        move || ended.set(true)
    });

    let resource = Rc::new(LocalActionDisposable::new(|| {
        println!("Resource released");
    }));
    lifetime.attach(Rc::clone(&resource));

    println!("Ended yet? {}", ended.get());

    println!("Dropping the token...");
    drop(token);

    println!("Ended yet? {}", ended.get());
    println!("Resource disposed? {}", resource.is_disposed());
    println!("Example completed successfully!");
}
