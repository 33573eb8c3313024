use keyshelf::{ErrorKind, ShelfError, ShelfResult, StoreAccessor};
use keyshelf_int_test::test_util::{cleanup, create_test_context};
use rand::Rng;
use std::sync::{Arc, Barrier};
use std::thread;

fn main() -> ShelfResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;
    let manager = ctx.manager();

    let count = 100_000;
    let accessor = StoreAccessor::new(&manager)?;

    let start = std::time::Instant::now();
    for i in 0..count {
        let id = uuid::Uuid::new_v4().to_string();
        accessor.set(("record", i.to_string(), "id"), &id)?;
        accessor.set(("record", i.to_string(), "status"), "pending")?;
    }
    println!("Inserted {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let keys = accessor.list_all_keys()?;
    println!("Listed {} keys in {:?}", keys.len(), start.elapsed());

    let start = std::time::Instant::now();
    let mut rng = rand::rng();
    for _ in 0..count {
        let i = rng.random_range(0..count);
        accessor.get(("record", i.to_string(), "status"))?;
    }
    println!("Read {} random records in {:?}", count, start.elapsed());
    drop(accessor);

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let start = std::time::Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || -> ShelfResult<()> {
                barrier.wait();
                for i in (t..count).step_by(threads) {
                    // one short-lived accessor per record exercises acquire/release
                    let accessor = StoreAccessor::new(&manager)?;
                    accessor.set(("record", i.to_string(), "status"), "processed")?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => {
                return Err(ShelfError::new(
                    "Stress worker panicked",
                    ErrorKind::InternalError,
                ))
            }
        }
    }
    println!(
        "Updated {} records from {} threads in {:?}",
        count,
        threads,
        start.elapsed()
    );

    let accessor = StoreAccessor::new(&manager)?;
    let processed = (0..count)
        .filter(|i| {
            accessor
                .get_string(("record", i.to_string(), "status"))
                .map(|status| status == "processed")
                .unwrap_or(false)
        })
        .count();
    println!("Counted {} processed records", processed);
    drop(accessor);

    cleanup(ctx)
}
