//! Selection policies and lifecycle hooks

use lendpool::{BlockingPool, Fifo, Lifo, PickPolicy};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

fn main() {
    println!("=== lendpool - Policies and Hooks ===\n");

    // Example 1: Default most-recently-released policy
    default_policy();

    // Example 2: FIFO rotation
    fifo_policy();

    // Example 3: Custom policy from a closure
    closure_policy();

    // Example 4: Reset and disposal hooks
    hooks();
}

fn numbered_pool(name: &str, policy: impl PickPolicy<usize> + 'static) -> BlockingPool<usize> {
    let counter = AtomicUsize::new(0);
    BlockingPool::builder(name, 3)
        .policy(policy)
        .build(move || Ok::<_, Infallible>(counter.fetch_add(1, Ordering::SeqCst)))
}

fn default_policy() {
    println!("1. Default Policy (most recently released wins):");
    let pool = numbered_pool("lifo", Lifo);

    let mut first = pool.acquire().unwrap();
    let mut second = pool.acquire().unwrap();
    pool.release(&mut first).unwrap();
    pool.release(&mut second).unwrap();

    println!("   Reused instance: {}\n", *pool.acquire().unwrap());
}

fn fifo_policy() {
    println!("2. FIFO Policy (longest idle wins):");
    let pool = numbered_pool("fifo", Fifo);

    let mut first = pool.acquire().unwrap();
    let mut second = pool.acquire().unwrap();
    pool.release(&mut first).unwrap();
    pool.release(&mut second).unwrap();

    println!("   Reused instance: {}\n", *pool.acquire().unwrap());
}

fn closure_policy() {
    println!("3. Closure Policy (largest value wins):");
    let pool = numbered_pool(
        "largest",
        |idle: &[usize], _recommended: Option<usize>, _could_create: bool| -> Option<usize> {
            idle.iter()
                .enumerate()
                .max_by_key(|(_, value)| **value)
                .map(|(index, _)| index)
        },
    );

    let mut first = pool.acquire().unwrap();
    let mut second = pool.acquire().unwrap();
    let mut third = pool.acquire().unwrap();
    pool.release(&mut second).unwrap();
    pool.release(&mut third).unwrap();
    pool.release(&mut first).unwrap();

    println!("   Reused instance: {}\n", *pool.acquire().unwrap());
}

fn hooks() {
    println!("4. Hooks:");
    let pool = BlockingPool::builder("hooked", 2)
        .on_acquire(|buffer: &mut Vec<u8>| buffer.clear())
        .on_dispose(|buffer: Vec<u8>| {
            println!("   Disposing buffer with capacity {}", buffer.capacity())
        })
        .build(|| Ok::<_, Infallible>(Vec::with_capacity(1024)));

    {
        let mut lease = pool.acquire().unwrap();
        lease.extend_from_slice(b"scratch data");
        println!("   Wrote {} bytes", lease.len());
        // Returned dirty; the acquire hook cleans it up on the way out
    }

    let lease = pool.acquire().unwrap();
    println!("   After reset: {} bytes", lease.len());
    drop(lease);

    pool.close();
}
