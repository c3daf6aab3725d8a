//! # Darts Core
//!
//! Data layer for the darts scorer: typed entities persisted to an embedded
//! SQLite database, and a sync protocol that merges two copies of that
//! database without losing rows.
//!
//! ## Architecture
//!
//! - **entity**: Entity trait, per-type descriptors and the concrete tables
//! - **db**: Pooled database handle, statement helpers and typed values
//! - **migration**: Versioned schema upgrades
//! - **sanity**: Consistency checks with optional auto-fix
//! - **sync**: Remote stores, merging and the sync state machine
//! - **maintenance**: Backup and restore of the database directory

pub mod db;
pub mod entity;
pub mod error;
pub mod fs;
pub mod maintenance;
pub mod migration;
pub mod sanity;
pub mod sync;

pub use db::{Database, DatabaseConfig};
pub use entity::{Entity, EntityName};
pub use error::{DartsError, Result};
pub use migration::DATABASE_VERSION;
pub use sync::{SyncFailure, SyncManager, SyncOutcome, SyncSummary};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
