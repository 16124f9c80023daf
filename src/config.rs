//! Configuration for a table
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::schema::CURRENT_VERSION;

/// Configuration for one table instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the journal file. Blobs live next to it:
    ///   {dir}/
    ///     ├── users.jsonl      (journal)
    ///     └── users.blobs/     (blob tree)
    pub path: PathBuf,

    // -------------------------------------------------------------------------
    // Journal Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync appended lines
    pub sync_strategy: SyncStrategy,

    /// Format version written into the header of a new table
    pub schema_version: String,
}

/// Journal sync strategy
///
/// Appends are always flushed to the OS; this only controls fsync.
/// Full rewrites and blob publishes are always fsynced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N appends (balanced durability/performance)
    EveryNAppends { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./table.jsonl"),
            sync_strategy: SyncStrategy::EveryWrite,
            schema_version: CURRENT_VERSION.to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the journal file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the journal sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the header version used when a table is created
    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.config.schema_version = version.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
