//! Basic usage walkthrough for lendpool

use lendpool::{BlockingPool, PoolError};
use std::convert::Infallible;
use std::time::Duration;

fn main() {
    println!("=== lendpool - Basic Walkthrough ===\n");

    // Example 1: Blocking checkout with automatic return
    blocking_checkout();

    // Example 2: Zero and bounded waits
    bounded_waits();

    // Example 3: Explicit release
    explicit_release();

    // Example 4: Status, stats and close
    status_and_close();
}

fn blocking_checkout() {
    println!("1. Blocking Checkout:");
    let pool = BlockingPool::new("basic", 2, || Ok::<_, Infallible>(String::from("resource")));

    {
        let lease = pool.acquire().unwrap();
        println!("   Checked out: {}", *lease);
        // Instance automatically returned when dropped
    }

    println!("   Idle after return: {}\n", pool.idle());
}

fn bounded_waits() {
    println!("2. Bounded Waits:");
    let pool = BlockingPool::new("bounded", 1, || Ok::<_, Infallible>(42u32));

    let held = pool.acquire().unwrap();
    println!("   Holding the only instance");

    match pool.try_acquire().unwrap() {
        Some(_) => println!("   try_acquire: got one"),
        None => println!("   try_acquire: None (pool exhausted)"),
    }

    let err = pool
        .acquire_timed(Some(Duration::from_millis(50)))
        .unwrap_err();
    if let PoolError::Timeout { waited, .. } = err {
        println!("   acquire_timed: timed out after {:?}", waited);
    }

    drop(held);
    let reacquired = pool.try_acquire().unwrap().map(|lease| *lease);
    println!("   After release: {:?}\n", reacquired);
}

fn explicit_release() {
    println!("3. Explicit Release:");
    let pool = BlockingPool::new("explicit", 1, || Ok::<_, Infallible>(7u8));

    let mut lease = pool.acquire().unwrap();
    pool.release(&mut lease).unwrap();
    println!("   Released: idle {}", pool.idle());

    // A second release of the same lease is refused
    match pool.release(&mut lease) {
        Err(PoolError::NotCheckedOut { .. }) => println!("   Double release rejected\n"),
        other => println!("   Unexpected: {:?}\n", other),
    }
}

fn status_and_close() {
    println!("4. Status and Close:");
    let pool = BlockingPool::builder("managed", 3)
        .on_dispose(|value: u32| println!("   Disposing instance {}", value))
        .build(|| Ok::<_, Infallible>(0u32));

    let first = pool.acquire().unwrap();
    let _second = pool.acquire().unwrap();
    drop(first);

    let status = pool.status();
    println!(
        "   Status: idle {} in_use {} of {}",
        status.idle, status.in_use, status.max_size
    );
    println!("   Utilization: {:.1}%", status.utilization() * 100.0);
    println!("   {}", pool);

    pool.close();
    let stats = pool.stats();
    println!("   Created {} / disposed {}", stats.created, stats.disposed);
}
