use keyshelf::{ConnectionManager, ErrorKind, ShelfError, ShelfResult};
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test with retry logic and error handling.
/// Tests run on the current thread to avoid thread exhaustion when running many tests in parallel.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> ShelfResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> ShelfResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> ShelfResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let ctx = before().map_err(|e| format!("Before run failed: {:?}", e))?;
            match test(ctx.clone()) {
                Ok(_) => after(ctx).map_err(|e| format!("After run failed: {:?}", e)),
                Err(e) => {
                    let _ = after(ctx);
                    Err(format!("Test failed: {:?}", e))
                }
            }
        });

        let elapsed = start_time.elapsed();

        let error = match result {
            Ok(Ok(_)) => return,
            Ok(Err(e)) => e,
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    format!("Unknown panic: {:?}", panic_err.type_id())
                };
                format!("Panic: {}", err_msg)
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("Error: {}", error);
            eprintln!("Retrying in {}ms...\n", 100 * attempt);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(error);
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    path: String,
    manager: ConnectionManager,
}

impl TestContext {
    pub fn new(path: String, manager: ConnectionManager) -> Self {
        Self { path, manager }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    env::temp_dir()
        .join(id.to_string())
        .to_string_lossy()
        .into_owned()
}

pub fn create_test_context() -> ShelfResult<TestContext> {
    let path = random_path();

    if std::path::Path::new(&path).exists() {
        let _ = fs::remove_dir_all(&path);
    }

    // one flush and one compaction worker per store
    let manager = ConnectionManager::with_config()
        .db_path(&path)
        .low_memory_preset()
        .build();

    if manager.is_open() {
        return Err(ShelfError::new(
            "Fresh manager reports an open connection",
            ErrorKind::InternalError,
        ));
    }
    Ok(TestContext::new(path, manager))
}

pub fn cleanup(ctx: TestContext) -> ShelfResult<()> {
    ctx.manager().force_close_all();

    let path = ctx.path().to_string();
    let max_retries = 15;
    let mut delay_ms = 50u64;

    for retry in 0..max_retries {
        if !std::path::Path::new(&path).exists() {
            return Ok(());
        }

        match fs::remove_dir_all(&path) {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(_) if retry < max_retries - 1 => {
                thread::sleep(Duration::from_millis(delay_ms));
                delay_ms = std::cmp::min(delay_ms * 2, 1000);
            }
            Err(e) => {
                // temp files are left to the OS
                eprintln!(
                    "Warning: Failed to remove test directory {} after {} attempts: {:?}",
                    path, max_retries, e
                );
                return Ok(());
            }
        }
    }

    Ok(())
}
