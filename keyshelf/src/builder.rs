use crate::config::ShelfConfig;
use crate::connection::ConnectionManager;
use fjall::compaction::Strategy;
use fjall::CompressionType;

/// Builder for configuring a [`ConnectionManager`].
///
/// Provides a fluent API over [`ShelfConfig`] with presets for common
/// workloads. Nothing touches the disk until the first accessor is created.
///
/// # Examples
///
/// ```rust,ignore
/// use keyshelf::ConnectionManager;
///
/// let manager = ConnectionManager::with_config()
///     .production_preset()
///     .db_path("/path/to/db")
///     .build();
/// ```
///
/// # Configuration Presets
///
/// - `production_preset()` - parallel flush/compaction with periodic fsync
/// - `low_memory_preset()` - minimal caches and a single background worker each
pub struct ConnectionManagerBuilder {
    store_config: ShelfConfig,
}

impl ConnectionManagerBuilder {
    #[inline]
    pub fn new() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder {
            store_config: ShelfConfig::new(),
        }
    }

    /// Applies the preset used for the desktop viewer.
    ///
    /// This configures:
    /// - All CPU cores for both flush and compaction workers
    /// - 256 MB block cache and 64 MB blob cache
    /// - Levelled compaction
    /// - Bloom filter with 10 bits per key
    /// - 100ms journal fsync interval
    /// - LZ4 compression
    #[inline]
    pub fn production_preset(self) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);

        self.block_cache_capacity(256 * 1024 * 1024)
            .blob_cache_capacity(64 * 1024 * 1024)
            .max_write_buffer_size(128 * 1024 * 1024)
            .max_memtable_size(32 * 1024 * 1024)
            .flush_workers(cpus)
            .compaction_workers(cpus)
            .compaction_strategy(Strategy::default())
            .bloom_filter_bits(10)
            .fsync_frequency(100)
            .compression_type(CompressionType::Lz4)
    }

    /// Applies settings for memory-constrained environments and tests.
    ///
    /// Uses one flush worker and one compaction worker, so many short-lived
    /// stores do not exhaust threads.
    #[inline]
    pub fn low_memory_preset(self) -> Self {
        self.block_cache_capacity(16 * 1024 * 1024)
            .blob_cache_capacity(8 * 1024 * 1024)
            .max_write_buffer_size(32 * 1024 * 1024)
            .max_memtable_size(8 * 1024 * 1024)
            .flush_workers(1)
            .compaction_workers(1)
            .bloom_filter_bits(10)
    }

    #[inline]
    pub fn db_path(self, db_path: &str) -> Self {
        self.store_config.set_db_path(db_path);
        self
    }

    #[inline]
    pub fn manual_journal_persist(self, manual_journal_persist: bool) -> Self {
        self.store_config.set_manual_journal_persist(manual_journal_persist);
        self
    }

    #[inline]
    pub fn flush_workers(self, flush_workers: usize) -> Self {
        self.store_config.set_flush_workers(flush_workers);
        self
    }

    #[inline]
    pub fn compaction_workers(self, compaction_workers: usize) -> Self {
        self.store_config.set_compaction_workers(compaction_workers);
        self
    }

    #[inline]
    pub fn block_cache_capacity(self, block_cache_capacity: u64) -> Self {
        self.store_config.set_block_cache_capacity(block_cache_capacity);
        self
    }

    #[inline]
    pub fn blob_cache_capacity(self, blob_cache_capacity: u64) -> Self {
        self.store_config.set_blob_cache_capacity(blob_cache_capacity);
        self
    }

    #[inline]
    pub fn max_journaling_size(self, max_journaling_size: u64) -> Self {
        self.store_config.set_max_journaling_size(max_journaling_size);
        self
    }

    #[inline]
    pub fn max_write_buffer_size(self, max_write_buffer_size: u64) -> Self {
        self.store_config.set_max_write_buffer_size(max_write_buffer_size);
        self
    }

    #[inline]
    pub fn fsync_frequency(self, fsync_frequency: u16) -> Self {
        self.store_config.set_fsync_frequency(fsync_frequency);
        self
    }

    #[inline]
    pub fn persist_on_close(self, persist_on_close: bool) -> Self {
        self.store_config.set_persist_on_close(persist_on_close);
        self
    }

    /// Bits per key for the bloom filter, capped at 127.
    #[inline]
    pub fn bloom_filter_bits(self, bloom_filter_bits: u8) -> Self {
        self.store_config
            .set_bloom_filter_bits(bloom_filter_bits.min(i8::MAX as u8) as i8);
        self
    }

    #[inline]
    pub fn disable_bloom_filter(self) -> Self {
        self.store_config.set_bloom_filter_bits(-1);
        self
    }

    #[inline]
    pub fn compression_type(self, compression_type: CompressionType) -> Self {
        self.store_config.set_compression_type(compression_type);
        self
    }

    #[inline]
    pub fn compaction_strategy(self, compaction_strategy: Strategy) -> Self {
        self.store_config.set_compaction_strategy(compaction_strategy);
        self
    }

    #[inline]
    pub fn max_memtable_size(self, max_memtable_size: u32) -> Self {
        self.store_config.set_max_memtable_size(max_memtable_size);
        self
    }

    #[inline]
    pub fn block_size(self, block_size: u32) -> Self {
        self.store_config.set_block_size(block_size);
        self
    }

    #[inline]
    pub fn kv_separated(self, kv_separated: bool) -> Self {
        self.store_config.set_kv_separated(kv_separated);
        self
    }

    #[inline]
    pub fn build(self) -> ConnectionManager {
        ConnectionManager::new(self.store_config)
    }
}

impl Default for ConnectionManagerBuilder {
    fn default() -> Self {
        ConnectionManagerBuilder::new()
    }
}
