mod accessor;
mod builder;
mod config;
mod connection;
mod errors;
mod key;
mod transport;
mod version;

pub use accessor::*;
pub use builder::*;
pub use config::*;
pub use connection::*;
pub use errors::*;
pub use key::*;
pub use transport::*;

#[cfg(test)]
pub(crate) mod tests {
    use crate::connection::ConnectionManager;
    use std::fs;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

    #[derive(Clone)]
    pub struct Context {
        path: String,
        manager: Option<ConnectionManager>,
    }

    impl Context {
        pub fn new(path: String, manager: Option<ConnectionManager>) -> Self {
            Context { path, manager }
        }

        pub fn path(&self) -> &str {
            &self.path
        }

        pub fn manager(&self) -> Result<ConnectionManager, String> {
            self.manager
                .clone()
                .ok_or_else(|| "ConnectionManager not available".to_string())
        }

        pub fn manager_unsafe(&self) -> ConnectionManager {
            self.manager.clone().expect("ConnectionManager not available")
        }
    }

    impl Drop for Context {
        fn drop(&mut self) {
            if let Some(manager) = self.manager.take() {
                manager.force_close_all();
            }
        }
    }

    pub fn run_test<T, B, A>(before: B, test: T, after: A)
    where
        T: FnOnce(Context) + std::panic::UnwindSafe,
        B: FnOnce() -> Context + std::panic::UnwindSafe,
        A: FnOnce(Context) + std::panic::UnwindSafe,
    {
        let result = std::panic::catch_unwind(|| {
            let ctx = before();
            test(ctx.clone());
            after(ctx.clone());
            drop(ctx);
        });

        if let Err(e) = result {
            let panic_msg = if let Some(msg) = e.downcast_ref::<String>() {
                msg.clone()
            } else if let Some(msg) = e.downcast_ref::<&str>() {
                msg.to_string()
            } else {
                format!("{:?}", e)
            };

            eprintln!("Test execution failed with panic: {}", panic_msg);
            panic!("Test execution failed with panic: {}", panic_msg);
        }
    }

    pub fn create_context() -> Context {
        let path = random_path();
        let manager = ConnectionManager::with_config()
            .db_path(&path)
            .low_memory_preset()
            .build();
        Context::new(path, Some(manager))
    }

    pub fn random_path() -> String {
        let id = uuid::Uuid::new_v4();
        PathBuf::from("../test-data")
            .join(id.to_string())
            .to_string_lossy()
            .into_owned()
    }

    pub fn cleanup(ctx: Context) {
        if let Ok(manager) = ctx.manager() {
            manager.force_close_all();
        }

        let mut retry = 0;
        while fs::remove_dir_all(ctx.path()).is_err() && retry < 2 {
            thread::sleep(Duration::from_millis(100));
            retry += 1;
        }
    }

    mod context_tests {
        use super::*;

        #[test]
        fn test_context_manager_returns_result_on_error() {
            let ctx = Context::new("test".to_string(), None);
            assert!(ctx.manager().is_err());
        }

        #[test]
        fn test_context_drop_handles_empty_state() {
            let ctx = Context::new("test".to_string(), None);
            drop(ctx);
        }

        #[test]
        fn test_context_drop_closes_open_manager() {
            let ctx = create_context();
            let manager = ctx.manager_unsafe();
            let connection = manager.acquire().unwrap();
            let path = ctx.path().to_string();

            drop(ctx);
            assert!(!manager.is_open());
            assert!(!connection.is_open());

            let _ = fs::remove_dir_all(path);
        }

        #[test]
        fn test_random_paths_are_distinct() {
            assert_ne!(random_path(), random_path());
        }

        #[test]
        fn test_harness_preserves_string_panic_message() {
            let test_msg = "Expected string panic message";
            let caught = std::panic::catch_unwind(|| {
                run_test(
                    || Context::new("test".to_string(), None),
                    |_ctx| {
                        panic!("{}", test_msg);
                    },
                    |_ctx| {},
                );
            });

            let err = caught.err().expect("harness should propagate the panic");
            let panic_msg = err
                .downcast_ref::<String>()
                .expect("Expected String panic message");
            assert!(panic_msg.contains("Test execution failed with panic"));
            assert!(panic_msg.contains(test_msg));
        }

        #[test]
        fn test_harness_preserves_panic_from_before_hook() {
            let caught = std::panic::catch_unwind(|| {
                run_test(
                    || panic!("Setup failed: store unavailable"),
                    |_ctx| {},
                    |_ctx| {},
                );
            });

            let err = caught.err().expect("harness should propagate the panic");
            if let Some(panic_msg) = err.downcast_ref::<String>() {
                assert!(panic_msg.contains("Setup failed"));
            }
        }

        #[test]
        fn test_harness_succeeds_with_no_panic() {
            let caught = std::panic::catch_unwind(|| {
                run_test(|| Context::new("test".to_string(), None), |_ctx| {}, |_ctx| {});
            });
            assert!(caught.is_ok());
        }
    }
}
