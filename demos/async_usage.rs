//! Async acquisition walkthrough

use lendpool::BlockingPool;
use std::convert::Infallible;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("=== lendpool - Async Usage ===\n");

    // Example 1: Async acquire with timeout forms
    async_acquire().await;

    // Example 2: Tasks sharing one pool
    shared_tasks().await;
}

async fn async_acquire() {
    println!("1. Async Acquire:");
    let pool = BlockingPool::new("async", 1, || Ok::<_, Infallible>(String::from("conn")));

    let held = pool.acquire_async().await.unwrap();
    println!("   Got: {}", *held);

    let second = pool
        .acquire_within_async(Some(Duration::from_millis(50)))
        .await
        .unwrap();
    println!("   Second within 50ms: {:?}", second.map(|lease| lease.len()));

    drop(held);
    let lease = pool
        .acquire_timed_async(Some(Duration::from_millis(50)))
        .await
        .unwrap();
    println!("   After release: {}\n", *lease);
}

async fn shared_tasks() {
    println!("2. Tasks Sharing a Pool:");
    let pool = BlockingPool::new("shared", 2, || Ok::<_, Infallible>(0usize));

    let mut handles = Vec::new();
    for task in 0..4 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let lease = pool.acquire_async().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            println!("   Task {} done with an instance ({})", task, *lease);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Instances created: {}", pool.stats().created);
}
