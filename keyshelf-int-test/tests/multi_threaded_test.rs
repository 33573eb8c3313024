use keyshelf::StoreAccessor;
use keyshelf_int_test::test_util::{cleanup, create_test_context, run_test};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_multi_threaded_writes() {
    run_test(
        create_test_context,
        |ctx| {
            let manager = ctx.manager();
            let num_threads = 5;
            let writes_per_thread = 20;
            let barrier = Arc::new(Barrier::new(num_threads));

            let mut handles = vec![];
            for thread_id in 0..num_threads {
                let manager = manager.clone();
                let barrier = Arc::clone(&barrier);

                handles.push(thread::spawn(move || {
                    let accessor = StoreAccessor::new(&manager).expect("accessor");
                    barrier.wait();
                    for i in 0..writes_per_thread {
                        accessor
                            .set(
                                ("thread", thread_id.to_string(), i.to_string()),
                                format!("thread_{}_seq_{}", thread_id, i),
                            )
                            .expect("set");
                    }
                }));
            }

            for handle in handles {
                handle.join().expect("writer thread panicked");
            }
            assert!(!manager.has_active_connections());

            let accessor = StoreAccessor::new(&manager)?;
            assert_eq!(accessor.list_all_keys()?.len(), num_threads * writes_per_thread);
            assert_eq!(accessor.get_string(("thread", "3", "7"))?, "thread_3_seq_7");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_multi_threaded_acquire_release_churn() {
    run_test(
        create_test_context,
        |ctx| {
            let manager = ctx.manager();
            let num_threads = 8;
            let rounds = 25;
            let barrier = Arc::new(Barrier::new(num_threads));

            let mut handles = vec![];
            for thread_id in 0..num_threads {
                let manager = manager.clone();
                let barrier = Arc::clone(&barrier);

                handles.push(thread::spawn(move || {
                    barrier.wait();
                    for round in 0..rounds {
                        // a fresh accessor per round forces the store to open and close repeatedly
                        let accessor = StoreAccessor::new(&manager).expect("accessor");
                        let key = ("churn", thread_id.to_string());
                        accessor.set(key.clone(), round.to_string()).expect("set");
                        assert!(accessor.exists(key).expect("exists"));
                    }
                }));
            }

            for handle in handles {
                handle.join().expect("churn thread panicked");
            }
            assert!(!manager.has_active_connections());
            assert!(!manager.is_open());

            let accessor = StoreAccessor::new(&manager)?;
            for thread_id in 0..num_threads {
                let last = accessor.get_string(("churn", thread_id.to_string()))?;
                assert_eq!(last, (rounds - 1).to_string());
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_readers_and_writer() {
    run_test(
        create_test_context,
        |ctx| {
            let manager = ctx.manager();
            let seed = StoreAccessor::new(&manager)?;
            for i in 0..50 {
                seed.set(("seed", i.to_string()), "initial")?;
            }

            let num_readers = 4;
            let barrier = Arc::new(Barrier::new(num_readers + 1));
            let mut handles = vec![];

            for _ in 0..num_readers {
                let manager = manager.clone();
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || {
                    let accessor = StoreAccessor::new(&manager).expect("accessor");
                    barrier.wait();
                    for i in 0..50 {
                        let value = accessor
                            .get_string(("seed", i.to_string()))
                            .expect("seeded key readable");
                        assert!(value == "initial" || value == "updated");
                    }
                }));
            }

            barrier.wait();
            for i in 0..50 {
                seed.set(("seed", i.to_string()), "updated")?;
            }

            for handle in handles {
                handle.join().expect("reader thread panicked");
            }
            assert_eq!(manager.ref_count(), 1);
            assert_eq!(seed.get_string(("seed", "49"))?, "updated");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_force_close_during_concurrent_use() {
    run_test(
        create_test_context,
        |ctx| {
            let manager = ctx.manager();
            let num_threads = 4;
            let barrier = Arc::new(Barrier::new(num_threads + 1));
            let mut handles = vec![];

            for thread_id in 0..num_threads {
                let manager = manager.clone();
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || {
                    let accessor = StoreAccessor::new(&manager).expect("accessor");
                    barrier.wait();
                    // every call either succeeds or reports the closed connection
                    for i in 0..200 {
                        if let Err(err) = accessor.set(("race", thread_id.to_string()), i.to_string()) {
                            assert_eq!(err.kind(), &keyshelf::ErrorKind::ConnectionInvalid);
                            break;
                        }
                    }
                }));
            }

            barrier.wait();
            manager.force_close_all();

            for handle in handles {
                handle.join().expect("worker thread panicked");
            }
            assert_eq!(manager.ref_count(), 0);
            assert!(!manager.is_open());

            let accessor = StoreAccessor::new(&manager)?;
            assert_eq!(manager.ref_count(), 1);
            drop(accessor);
            Ok(())
        },
        cleanup,
    )
}
