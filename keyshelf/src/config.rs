use fjall::compaction::Strategy;
use fjall::{CompressionType, Config, KvSeparationOptions, PartitionCreateOptions};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Storage location used when no path is configured.
pub const DEFAULT_DB_PATH: &str = "static/ShelfData";

/// Name of the single partition every entry lives in.
pub const PARTITION_NAME: &str = "default";

#[derive(Clone)]
/// Keyspace configuration for a [`ConnectionManager`](crate::ConnectionManager).
///
/// A cloneable, thread-safe holder for the storage path and the Fjall tuning
/// parameters. Clones share the same underlying values through
/// `Arc<ShelfConfigInner>`, so the manager and its builder see one
/// configuration.
///
/// Numeric and flag settings are atomics; the path and the engine enums sit
/// behind `parking_lot::RwLock` because they are not word-sized.
///
/// Usage: create via `ShelfConfig::new()` or through
/// `ConnectionManager::with_config()`, configure before the first connection is
/// opened. The path may be changed again whenever no connection is live.
pub struct ShelfConfig {
    inner: Arc<ShelfConfigInner>,
}

impl ShelfConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults favour parallel background work and levelled compaction:
    /// - Path: [`DEFAULT_DB_PATH`]
    /// - Flush workers and compaction workers: number of available CPU cores
    /// - Block cache: 64 MB, blob cache: 32 MB
    /// - Write buffer: 128 MB, max journaling size: 512 MB
    /// - Bloom filter: 10 bits per key
    /// - Compression: LZ4
    /// - Persist on close: enabled
    #[inline]
    pub fn new() -> ShelfConfig {
        ShelfConfig {
            inner: Arc::new(ShelfConfigInner::new()),
        }
    }

    /// Builds the `fjall::Config` used to open the keyspace.
    #[inline]
    pub(crate) fn keyspace_config(&self) -> Config {
        let mut config = Config::new(self.db_path());
        config = config
            .manual_journal_persist(self.manual_journal_persist())
            .flush_workers(self.flush_workers())
            .compaction_workers(self.compaction_workers())
            .cache_size(self.block_cache_capacity() + self.blob_cache_capacity())
            .max_journaling_size(self.max_journaling_size())
            .max_write_buffer_size(self.max_write_buffer_size());

        if self.fsync_frequency() > 0 {
            config = config.fsync_ms(Some(self.fsync_frequency()));
        }
        config
    }

    /// Builds the options used to open [`PARTITION_NAME`].
    #[inline]
    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        let bloom_bits = self.bloom_filter_bits();
        let mut config = PartitionCreateOptions::default()
            .bloom_filter_bits(if bloom_bits < 0 { None } else { Some(bloom_bits as u8) })
            .compression(self.compression_type())
            .compaction_strategy(self.compaction_strategy())
            .max_memtable_size(self.max_memtable_size())
            .block_size(self.block_size());

        if self.kv_separated() {
            config = config.with_kv_separation(KvSeparationOptions::default());
        }
        config
    }

    #[inline]
    pub fn db_path(&self) -> String {
        self.inner.db_path.read().clone()
    }

    /// Sets the database directory. The manager guards this against changes
    /// while a connection is open.
    #[inline]
    pub(crate) fn set_db_path(&self, db_path: &str) {
        *self.inner.db_path.write() = db_path.to_string();
    }

    #[inline]
    pub fn manual_journal_persist(&self) -> bool {
        self.inner.manual_journal_persist.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_manual_journal_persist(&self, v: bool) {
        self.inner.manual_journal_persist.store(v, Ordering::Relaxed)
    }

    #[inline]
    pub fn flush_workers(&self) -> usize {
        self.inner.flush_workers.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_flush_workers(&self, c: usize) {
        self.inner.flush_workers.store(c.max(1), Ordering::Relaxed)
    }

    #[inline]
    pub fn compaction_workers(&self) -> usize {
        self.inner.compaction_workers.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_compaction_workers(&self, c: usize) {
        self.inner.compaction_workers.store(c.max(1), Ordering::Relaxed)
    }

    #[inline]
    pub fn block_cache_capacity(&self) -> u64 {
        self.inner.block_cache_capacity.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_block_cache_capacity(&self, c: u64) {
        self.inner.block_cache_capacity.store(c, Ordering::Relaxed)
    }

    #[inline]
    pub fn blob_cache_capacity(&self) -> u64 {
        self.inner.blob_cache_capacity.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_blob_cache_capacity(&self, c: u64) {
        self.inner.blob_cache_capacity.store(c, Ordering::Relaxed)
    }

    #[inline]
    pub fn max_journaling_size(&self) -> u64 {
        self.inner.max_journaling_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_max_journaling_size(&self, s: u64) {
        self.inner.max_journaling_size.store(s, Ordering::Relaxed)
    }

    #[inline]
    pub fn max_write_buffer_size(&self) -> u64 {
        self.inner.max_write_buffer_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_max_write_buffer_size(&self, s: u64) {
        self.inner.max_write_buffer_size.store(s, Ordering::Relaxed)
    }

    /// Journal fsync interval in milliseconds, 0 disables periodic fsync.
    #[inline]
    pub fn fsync_frequency(&self) -> u16 {
        self.inner.fsync_frequency.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_fsync_frequency(&self, f: u16) {
        self.inner.fsync_frequency.store(f, Ordering::Relaxed)
    }

    /// Whether the journal is synced to disk right before the last reference
    /// closes the keyspace.
    #[inline]
    pub fn persist_on_close(&self) -> bool {
        self.inner.persist_on_close.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_persist_on_close(&self, v: bool) {
        self.inner.persist_on_close.store(v, Ordering::Relaxed)
    }

    /// Bloom filter bits per key, -1 disables the filter.
    #[inline]
    pub fn bloom_filter_bits(&self) -> i8 {
        self.inner.bloom_filter_bits.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_bloom_filter_bits(&self, b: i8) {
        self.inner.bloom_filter_bits.store(b, Ordering::Relaxed)
    }

    #[inline]
    pub fn compression_type(&self) -> CompressionType {
        self.inner.compression_type.read().clone()
    }

    #[inline]
    pub(crate) fn set_compression_type(&self, ct: CompressionType) {
        *self.inner.compression_type.write() = ct;
    }

    #[inline]
    pub fn compaction_strategy(&self) -> Strategy {
        self.inner.compaction_strategy.read().clone()
    }

    #[inline]
    pub(crate) fn set_compaction_strategy(&self, s: Strategy) {
        *self.inner.compaction_strategy.write() = s;
    }

    #[inline]
    pub fn max_memtable_size(&self) -> u32 {
        self.inner.max_memtable_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_max_memtable_size(&self, s: u32) {
        self.inner.max_memtable_size.store(s, Ordering::Relaxed)
    }

    #[inline]
    pub fn block_size(&self) -> u32 {
        self.inner.block_size.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_block_size(&self, s: u32) {
        self.inner.block_size.store(s, Ordering::Relaxed)
    }

    /// Whether large values are stored apart from the LSM tree.
    #[inline]
    pub fn kv_separated(&self) -> bool {
        self.inner.kv_separated.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_kv_separated(&self, v: bool) {
        self.inner.kv_separated.store(v, Ordering::Relaxed)
    }
}

impl Default for ShelfConfig {
    fn default() -> Self {
        ShelfConfig::new()
    }
}

struct ShelfConfigInner {
    db_path: RwLock<String>,
    manual_journal_persist: AtomicBool,
    flush_workers: AtomicUsize,
    compaction_workers: AtomicUsize,
    block_cache_capacity: AtomicU64,
    blob_cache_capacity: AtomicU64,
    max_journaling_size: AtomicU64,
    max_write_buffer_size: AtomicU64,
    fsync_frequency: AtomicU16,
    persist_on_close: AtomicBool,

    bloom_filter_bits: AtomicI8,
    compression_type: RwLock<CompressionType>,
    compaction_strategy: RwLock<Strategy>,
    max_memtable_size: AtomicU32,
    block_size: AtomicU32,
    kv_separated: AtomicBool,
}

impl ShelfConfigInner {
    pub const DEFAULT_BLOCK_CACHE_MB: u64 = 64;
    pub const DEFAULT_BLOB_CACHE_MB: u64 = 32;
    pub const DEFAULT_WRITE_BUFFER_MB: u64 = 128;
    pub const DEFAULT_MAX_JOURNALING_MB: u64 = 512;
    pub const DEFAULT_MEMTABLE_MB: u32 = 32;

    fn new() -> ShelfConfigInner {
        // background flush and compaction both scale with the machine
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4)
            .max(1);

        ShelfConfigInner {
            db_path: RwLock::new(DEFAULT_DB_PATH.to_string()),
            manual_journal_persist: AtomicBool::new(false),
            flush_workers: AtomicUsize::new(cpus),
            compaction_workers: AtomicUsize::new(cpus),
            block_cache_capacity: AtomicU64::new(Self::DEFAULT_BLOCK_CACHE_MB * 1_024 * 1_024),
            blob_cache_capacity: AtomicU64::new(Self::DEFAULT_BLOB_CACHE_MB * 1_024 * 1_024),
            max_journaling_size: AtomicU64::new(Self::DEFAULT_MAX_JOURNALING_MB * 1_024 * 1_024),
            max_write_buffer_size: AtomicU64::new(Self::DEFAULT_WRITE_BUFFER_MB * 1_024 * 1_024),
            fsync_frequency: AtomicU16::new(0),
            persist_on_close: AtomicBool::new(true),
            bloom_filter_bits: AtomicI8::new(10),
            compression_type: RwLock::new(CompressionType::Lz4),
            compaction_strategy: RwLock::new(Strategy::default()),
            max_memtable_size: AtomicU32::new(Self::DEFAULT_MEMTABLE_MB * 1_024 * 1_024),
            block_size: AtomicU32::new(4 * 1_024),
            kv_separated: AtomicBool::new(false),
        }
    }
}
