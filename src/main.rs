// lendpool - bounded, thread-safe, blocking resource pool

// This is just a binary wrapper - the actual library is in lib.rs
// Run the walkthroughs with: cargo run --example basic

use lendpool::BlockingPool;
use std::convert::Infallible;

fn main() {
    println!("=== lendpool ===");
    println!("See demos/ directory for usage walkthroughs");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo
    println!("Quick Demo:");
    let pool = BlockingPool::new("demo", 2, || Ok::<_, Infallible>(String::from("resource")));

    {
        let lease = pool.acquire().unwrap();
        println!("  Checked out: {}", *lease);
        println!("  {}", pool);
    }

    println!("  Idle after return: {}", pool.idle());
    pool.close();
    println!("  {}", pool);
}
