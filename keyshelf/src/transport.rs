use crate::accessor::StoreAccessor;
use crate::connection::ConnectionManager;
use crate::errors::{ShelfError, ShelfResult};
use std::path::Path;

/// Thin boundary used by the viewer front end.
///
/// Every call opens a short-lived [`StoreAccessor`], so the store is closed
/// again between calls and the viewer is free to switch directories.
#[derive(Clone)]
pub struct DataTransport {
    manager: ConnectionManager,
}

impl DataTransport {
    #[inline]
    pub fn new(manager: &ConnectionManager) -> DataTransport {
        DataTransport {
            manager: manager.clone(),
        }
    }

    /// Points the manager at `path` and lists every key stored there.
    ///
    /// Fails with `AlreadyOpen` if another holder keeps the current store open.
    ///
    /// The returned error keeps the kind of the underlying failure and carries
    /// it as its cause.
    pub fn keys_in_directory(&self, path: &str) -> ShelfResult<Vec<String>> {
        self.list_keys_at(path).map_err(|err| {
            log::error!("Failed to list keys in {}: {}", path, err);
            ShelfError::new_with_cause(
                &format!("Failed to list keys in {}", path),
                err.kind().clone(),
                err,
            )
        })
    }

    fn list_keys_at(&self, path: &str) -> ShelfResult<Vec<String>> {
        self.manager.set_path(path)?;
        let accessor = StoreAccessor::new(&self.manager)?;
        accessor.list_all_keys()
    }

    /// Looks up a single-segment key and returns its value as text.
    pub fn value(&self, key: &str) -> ShelfResult<String> {
        let accessor = StoreAccessor::new(&self.manager)?;
        accessor.get_string(key)
    }

    /// Whether a directory exists at `path`.
    #[inline]
    pub fn path_exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_dir()
    }
}
