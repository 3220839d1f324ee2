// crates/resilience/examples/resilience_demo.rs
//! Demonstration of resilience patterns

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storystream_resilience::{RetryExecutor, RetryPolicy, Timeout};

#[tokio::main]
async fn main() {
    println!("Resilience Patterns Demo");
    println!("========================\n");

    demo_retry().await;
    println!();
    demo_timeout().await;
}

async fn demo_retry() {
    println!("1. Retry Pattern");
    println!("----------------");

    let policy = RetryPolicy::new(4)
        .with_initial_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_millis(250))
        .with_multiplier(2.0);

    let executor = RetryExecutor::new(policy).with_observer(|attempt, delay, error: &String| {
        println!("  Attempt {} failed ({}), waiting {:?}", attempt, error, delay);
    });

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let outcome = executor
        .execute(move |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err("Simulated failure".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

    match outcome.into_result() {
        Ok(value) => println!("✓ Success after {} calls: {}", calls.load(Ordering::SeqCst), value),
        Err(e) => println!("✗ Failed: {}", e),
    }
}

async fn demo_timeout() {
    println!("2. Timeout Pattern");
    println!("------------------");

    let timeout = Timeout::new(Duration::from_millis(50));

    let result = timeout
        .execute(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            42
        })
        .await;

    match result {
        Ok(value) => println!("  Fast operation: ✓ Completed: {}", value),
        Err(e) => println!("  Fast operation: ✗ {}", e),
    }

    let result = timeout
        .execute(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            42
        })
        .await;

    match result {
        Ok(value) => println!("  Slow operation: ✓ Completed: {}", value),
        Err(e) => println!("  Slow operation: ✗ {}", e),
    }
}
