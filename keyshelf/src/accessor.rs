use crate::connection::{ConnectionManager, SharedConnection};
use crate::errors::{connection_invalid, to_shelf_error, ErrorKind, ShelfError, ShelfResult};
use crate::key::IntoCompositeKey;
use std::fmt::{Debug, Formatter};

/// Per-caller handle onto a manager's shared connection.
///
/// Creating an accessor acquires a reference (opening the keyspace if this is
/// the first one); dropping it releases that reference. The type is not
/// `Clone`: moving it moves the reference, and the release happens exactly
/// once, from `Drop`.
///
/// Data operations do not take the manager's lock. They borrow the engine
/// handle for the duration of one call and fail with `ConnectionInvalid` if
/// the connection was force-closed underneath them.
///
/// Keys are anything implementing [`IntoCompositeKey`]: a single string, a
/// 2- or 3-tuple of strings, or a slice/vector of 1 to 3 segments.
///
/// # Examples
///
/// ```rust,ignore
/// use keyshelf::{ConnectionManager, StoreAccessor};
///
/// let manager = ConnectionManager::with_config().db_path("data").build();
/// let accessor = StoreAccessor::new(&manager)?;
///
/// accessor.set(("user", "42", "name"), "alice")?;
/// assert_eq!(accessor.get(("user", "42", "name"))?, b"alice");
/// assert!(accessor.exists(("user", "42", "name"))?);
/// assert_eq!(accessor.list_all_keys()?, vec!["user|+|42|+|name"]);
/// ```
pub struct StoreAccessor {
    manager: ConnectionManager,
    connection: Option<SharedConnection>,
}

impl StoreAccessor {
    /// Acquires a reference on `manager`'s connection.
    ///
    /// Fails with `OpenFailure` if the keyspace has to be opened and cannot be.
    pub fn new(manager: &ConnectionManager) -> ShelfResult<StoreAccessor> {
        let connection = manager.acquire()?;
        Ok(StoreAccessor {
            manager: manager.clone(),
            connection: Some(connection),
        })
    }

    /// Whether this accessor still holds a live connection.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.connection
            .as_ref()
            .map(SharedConnection::is_open)
            .unwrap_or(false)
    }

    /// Writes `value` under `key`, replacing any previous value.
    pub fn set<K: IntoCompositeKey>(&self, key: K, value: impl AsRef<[u8]>) -> ShelfResult<()> {
        let key = key.into_composite_key()?.joined();
        self.connection()?.with_handle(|handle| {
            handle
                .partition
                .insert(key.as_bytes(), value.as_ref())
                .map_err(|err| {
                    log::error!("Failed to write key {}: {}", key, err);
                    to_shelf_error(
                        err,
                        ErrorKind::WriteFailure,
                        &format!("Failed to write key {}", key),
                    )
                })
        })
    }

    /// Reads the value stored under `key`.
    ///
    /// A missing key is reported as `KeyNotFound`, never as `ReadFailure`.
    pub fn get<K: IntoCompositeKey>(&self, key: K) -> ShelfResult<Vec<u8>> {
        let key = key.into_composite_key()?.joined();
        self.connection()?.with_handle(|handle| {
            match handle.partition.get(key.as_bytes()) {
                Ok(Some(value)) => Ok(value.to_vec()),
                Ok(None) => {
                    log::debug!("Key not found: {}", key);
                    Err(ShelfError::new(
                        &format!("Key not found: {}", key),
                        ErrorKind::KeyNotFound,
                    ))
                }
                Err(err) => {
                    log::error!("Failed to read key {}: {}", key, err);
                    Err(to_shelf_error(
                        err,
                        ErrorKind::ReadFailure,
                        &format!("Failed to read key {}", key),
                    ))
                }
            }
        })
    }

    /// Reads the value under `key` as text, replacing invalid UTF-8.
    pub fn get_string<K: IntoCompositeKey>(&self, key: K) -> ShelfResult<String> {
        let value = self.get(key)?;
        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    /// Whether a value is stored under `key`.
    pub fn exists<K: IntoCompositeKey>(&self, key: K) -> ShelfResult<bool> {
        let key = key.into_composite_key()?.joined();
        self.connection()?.with_handle(|handle| {
            handle.partition.contains_key(key.as_bytes()).map_err(|err| {
                log::error!("Failed to check key {}: {}", key, err);
                to_shelf_error(
                    err,
                    ErrorKind::ReadFailure,
                    &format!("Failed to check key {}", key),
                )
            })
        })
    }

    /// Returns every physical key in the store, in byte order.
    ///
    /// Composite keys come back in their joined form; see
    /// [`split_key`](crate::split_key). Keys that are not valid UTF-8 are
    /// converted lossily.
    pub fn list_all_keys(&self) -> ShelfResult<Vec<String>> {
        let keys = self.list_all_raw_keys()?;
        Ok(keys
            .into_iter()
            .map(|key| match String::from_utf8(key) {
                Ok(key) => key,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            })
            .collect())
    }

    /// Returns every physical key in the store as raw bytes, in byte order.
    ///
    /// The result is collected eagerly while the connection is borrowed; no
    /// iterator outlives the call.
    pub fn list_all_raw_keys(&self) -> ShelfResult<Vec<Vec<u8>>> {
        self.connection()?.with_handle(|handle| {
            let mut keys = Vec::new();
            for item in handle.partition.iter() {
                match item {
                    Ok((key, _)) => keys.push(key.to_vec()),
                    Err(err) => {
                        log::error!("Failed to iterate keys: {}", err);
                        return Err(to_shelf_error(
                            err,
                            ErrorKind::ReadFailure,
                            "Failed to iterate keys",
                        ));
                    }
                }
            }
            Ok(keys)
        })
    }

    #[inline]
    fn connection(&self) -> ShelfResult<&SharedConnection> {
        self.connection.as_ref().ok_or_else(connection_invalid)
    }
}

impl Debug for StoreAccessor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.connection {
            Some(connection) => write!(f, "StoreAccessor({:?})", connection),
            None => write!(f, "StoreAccessor(unbound)"),
        }
    }
}

impl Drop for StoreAccessor {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.manager.release(connection);
        }
    }
}
