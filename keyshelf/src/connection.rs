use crate::builder::ConnectionManagerBuilder;
use crate::config::{ShelfConfig, PARTITION_NAME};
use crate::errors::{connection_invalid, to_shelf_error, ErrorKind, ShelfError, ShelfResult};
use crate::version::fjall_version;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use parking_lot::{Mutex, RwLock};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The live engine handle: one keyspace and the partition all entries go to.
pub(crate) struct EngineHandle {
    pub(crate) keyspace: Keyspace,
    pub(crate) partition: PartitionHandle,
}

#[derive(Clone)]
/// One opened connection to the keyspace, shared by every accessor bound to it.
///
/// The engine handle sits in a `RwLock<Option<..>>` slot. Data operations take
/// the read side for the duration of a single call; closing takes the write
/// side and empties the slot. A clone that outlives the close therefore sees an
/// empty slot and reports `ConnectionInvalid` instead of touching a closed
/// engine.
///
/// Each connection carries the generation it was opened under, which lets the
/// manager ignore releases aimed at a connection it already force-closed.
pub struct SharedConnection {
    inner: Arc<SharedConnectionInner>,
}

struct SharedConnectionInner {
    generation: u64,
    path: String,
    slot: RwLock<Option<EngineHandle>>,
}

impl SharedConnection {
    fn new(generation: u64, path: String, handle: EngineHandle) -> SharedConnection {
        SharedConnection {
            inner: Arc::new(SharedConnectionInner {
                generation,
                path,
                slot: RwLock::new(Some(handle)),
            }),
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Directory the keyspace was opened at.
    #[inline]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.inner.slot.read().is_some()
    }

    /// Runs `f` against the engine handle, or fails with `ConnectionInvalid`
    /// when the connection has been closed.
    pub(crate) fn with_handle<R>(
        &self,
        f: impl FnOnce(&EngineHandle) -> ShelfResult<R>,
    ) -> ShelfResult<R> {
        let guard = self.inner.slot.read();
        match guard.as_ref() {
            Some(handle) => f(handle),
            None => {
                log::error!(
                    "Connection to {} (generation {}) is closed",
                    self.inner.path,
                    self.inner.generation
                );
                Err(connection_invalid())
            }
        }
    }

    /// Empties the slot and drops the engine handle. Returns false if it was
    /// already closed.
    fn close(&self, persist: bool) -> bool {
        let handle = self.inner.slot.write().take();
        match handle {
            Some(handle) => {
                if persist {
                    if let Err(err) = handle.keyspace.persist(PersistMode::SyncAll) {
                        log::error!("Failed to persist keyspace at {}: {}", self.inner.path, err);
                    }
                }
                drop(handle);
                true
            }
            None => false,
        }
    }

    #[inline]
    fn same_as(&self, other: &SharedConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for SharedConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SharedConnection({}, generation {}, {})",
            self.inner.path,
            self.inner.generation,
            if self.is_open() { "open" } else { "closed" }
        )
    }
}

#[derive(Clone)]
/// Owner of the single shared connection to a keyspace.
///
/// A manager opens the keyspace on the first [`acquire`](Self::acquire), hands
/// the same [`SharedConnection`] to every later caller, counts the holders, and
/// closes the keyspace when the count drops back to zero. Open, close and the
/// count itself only change under one mutex, so two threads can never open the
/// same store twice or close it under each other.
///
/// Clones share state (`Arc<ConnectionManagerInner>`). Separate managers are
/// fully independent, which is what tests rely on.
///
/// # Examples
///
/// ```rust,ignore
/// use keyshelf::{ConnectionManager, StoreAccessor};
///
/// let manager = ConnectionManager::with_config()
///     .db_path("/path/to/db")
///     .build();
///
/// let accessor = StoreAccessor::new(&manager)?;
/// accessor.set(("user", "42"), b"alice")?;
/// drop(accessor); // last reference, keyspace closed
/// assert!(!manager.has_active_connections());
/// ```
pub struct ConnectionManager {
    inner: Arc<ConnectionManagerInner>,
}

impl ConnectionManager {
    /// Creates a manager around the given configuration. Nothing is opened yet.
    #[inline]
    pub fn new(config: ShelfConfig) -> ConnectionManager {
        ConnectionManager {
            inner: Arc::new(ConnectionManagerInner::new(config)),
        }
    }

    /// Creates a builder for configuring a manager.
    #[inline]
    pub fn with_config() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Points the manager at a different storage directory.
    ///
    /// Fails with `AlreadyOpen` while a connection is established; the path
    /// must be chosen before the first accessor is created (or after the last
    /// one is gone).
    pub fn set_path(&self, path: &str) -> ShelfResult<()> {
        self.inner.set_path(path)
    }

    /// Returns the shared connection, opening the keyspace if nobody holds it,
    /// and counts the caller as a holder.
    pub fn acquire(&self) -> ShelfResult<SharedConnection> {
        self.inner.acquire()
    }

    /// Gives back a connection obtained from [`acquire`](Self::acquire).
    ///
    /// The last release closes the keyspace. Releasing a connection that has
    /// been force-closed is a no-op.
    pub fn release(&self, connection: SharedConnection) {
        self.inner.release(connection)
    }

    /// Whether any holder is counted. Advisory only.
    #[inline]
    pub fn has_active_connections(&self) -> bool {
        self.inner.ref_count() > 0
    }

    #[inline]
    pub fn ref_count(&self) -> usize {
        self.inner.ref_count()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.inner.state.lock().connection.is_some()
    }

    #[inline]
    pub fn path(&self) -> String {
        self.inner.config.db_path()
    }

    #[inline]
    pub fn config(&self) -> ShelfConfig {
        self.inner.config.clone()
    }

    /// Closes the keyspace and resets the count regardless of outstanding
    /// holders.
    ///
    /// Accessors still bound to the closed connection fail with
    /// `ConnectionInvalid` on their next call. Use only at shutdown or in
    /// tests.
    pub fn force_close_all(&self) {
        self.inner.force_close_all()
    }

    /// Reports the storage engine and version, e.g. `Fjall/2.6.3`.
    pub fn engine_version(&self) -> ShelfResult<String> {
        match fjall_version() {
            Ok(version) => Ok(format!("Fjall/{}", version)),
            Err(e) => Err(ShelfError::new(
                &format!("Failed to determine Fjall version: {}", e),
                ErrorKind::InternalError,
            )),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        ConnectionManager::new(ShelfConfig::new())
    }
}

struct ConnectionState {
    connection: Option<SharedConnection>,
    ref_count: usize,
    generation: u64,
}

struct ConnectionManagerInner {
    config: ShelfConfig,
    state: Mutex<ConnectionState>,
}

impl ConnectionManagerInner {
    fn new(config: ShelfConfig) -> ConnectionManagerInner {
        ConnectionManagerInner {
            config,
            state: Mutex::new(ConnectionState {
                connection: None,
                ref_count: 0,
                generation: 0,
            }),
        }
    }

    fn set_path(&self, path: &str) -> ShelfResult<()> {
        let state = self.state.lock();
        if state.connection.is_some() {
            log::error!(
                "Cannot change store path to {} while {} is open",
                path,
                self.config.db_path()
            );
            return Err(ShelfError::new(
                &format!(
                    "Store is already open at {}, cannot change path to {}",
                    self.config.db_path(),
                    path
                ),
                ErrorKind::AlreadyOpen,
            ));
        }
        self.config.set_db_path(path);
        Ok(())
    }

    fn acquire(&self) -> ShelfResult<SharedConnection> {
        let mut state = self.state.lock();

        let connection = match &state.connection {
            Some(connection) => connection.clone(),
            None => {
                let generation = state.generation + 1;
                let connection = self.open(generation)?;
                state.generation = generation;
                state.connection = Some(connection.clone());
                connection
            }
        };

        state.ref_count += 1;
        log::debug!(
            "Acquired connection to {} (references: {})",
            connection.path(),
            state.ref_count
        );
        Ok(connection)
    }

    fn open(&self, generation: u64) -> ShelfResult<SharedConnection> {
        let path = self.config.db_path();

        let keyspace = Keyspace::open(self.config.keyspace_config()).map_err(|err| {
            log::error!("Failed to open keyspace at {}: {}", path, err);
            to_shelf_error(
                err,
                ErrorKind::OpenFailure,
                &format!("Failed to open store at {}", path),
            )
        })?;

        let partition = keyspace
            .open_partition(PARTITION_NAME, self.config.partition_config())
            .map_err(|err| {
                log::error!("Failed to open partition {} at {}: {}", PARTITION_NAME, path, err);
                to_shelf_error(
                    err,
                    ErrorKind::OpenFailure,
                    &format!("Failed to open store at {}", path),
                )
            })?;

        log::debug!("Store opened at {} (generation {})", path, generation);
        Ok(SharedConnection::new(
            generation,
            path,
            EngineHandle { keyspace, partition },
        ))
    }

    fn release(&self, connection: SharedConnection) {
        let mut state = self.state.lock();

        let is_current = state
            .connection
            .as_ref()
            .map(|current| current.same_as(&connection))
            .unwrap_or(false);

        if !is_current {
            log::debug!(
                "Ignoring release of stale connection to {} (generation {})",
                connection.path(),
                connection.generation()
            );
            return;
        }

        state.ref_count = state.ref_count.saturating_sub(1);
        if state.ref_count == 0 {
            if let Some(current) = state.connection.take() {
                current.close(self.config.persist_on_close());
                log::debug!("Store at {} closed, no active references", current.path());
            }
        } else {
            log::debug!(
                "Released connection to {} (references: {})",
                connection.path(),
                state.ref_count
            );
        }
    }

    fn force_close_all(&self) {
        let mut state = self.state.lock();
        if let Some(current) = state.connection.take() {
            current.close(self.config.persist_on_close());
            log::warn!(
                "Store at {} force-closed with {} active references",
                current.path(),
                state.ref_count
            );
        }
        state.ref_count = 0;
    }

    #[inline]
    fn ref_count(&self) -> usize {
        self.state.lock().ref_count
    }
}

impl Drop for ConnectionManagerInner {
    fn drop(&mut self) {
        // accessors hold a manager clone, so this only runs once they are gone
        let state = self.state.get_mut();
        if let Some(current) = state.connection.take() {
            log::debug!("Closing store at {} on manager drop", current.path());
            current.close(self.config.persist_on_close());
        }
    }
}
