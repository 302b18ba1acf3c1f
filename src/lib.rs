//! # Depot Cache
//!
//! A caching engine for data-repository distribution: objects archived in
//! long-term storage are staged into faster local volumes on demand, and
//! evicted by pluggable policy when space runs short.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CacheManager                          │
//! │  • fetch() restores objects on miss via a Restorer         │
//! │  • runs the IntegrityMonitor over cached copies            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Cache                              │
//! │  • reserve_space() plans and executes evictions            │
//! │  • round-robin volume selection with role preferences      │
//! │  • reservation / save / deletion listeners                 │
//! └─────────────────────────────────────────────────────────────┘
//!                  │                           │
//!                  ▼                           ▼
//! ┌──────────────────────────┐  ┌──────────────────────────────┐
//! │       CacheVolumes       │  │          Inventory           │
//! │  • dumb byte stores      │  │  • system of record          │
//! │  • filesystem, memory    │  │  • sizes, checksums, status  │
//! └──────────────────────────┘  └──────────────────────────────┘
//! ```
//!
//! Volumes hold bytes and nothing else; the [`Inventory`] is authoritative
//! for what is cached where, how big it is, and which volumes may serve or
//! receive objects.  Eviction is a two-step affair: a [`DeletionPlanner`]
//! proposes ranked [`DeletionPlan`]s per volume under a configurable
//! [`DeletionStrategy`], and the cheapest viable plan is executed under the
//! cache's plan-execution lock.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use depot_cache::{Cache, CacheConfig, MemoryInventory, MemoryVolume};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), depot_cache::CacheError> {
//!     let inventory = Arc::new(MemoryInventory::new());
//!     let cache = Cache::new("local", inventory, &CacheConfig::default());
//!     cache
//!         .add_volume(Arc::new(MemoryVolume::new("v1")), 1_000_000, None)
//!         .await?;
//!
//!     // make room (evicting if necessary), then save through the claim
//!     let mut reservation = cache.reserve_space(11, 0).await?;
//!     reservation
//!         .save_as(&mut &b"hello world"[..], "ds/hello.txt", "ds/hello.txt", None)
//!         .await?;
//!
//!     let found = cache.find_object("ds/hello.txt").await?;
//!     assert!(found.is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: the [`Cache`] front end and its listeners
//! - [`volume`]: byte stores ([`FilesystemVolume`], [`MemoryVolume`])
//! - [`inventory`]: the record of what is cached where
//! - [`strategy`]: deletion scoring policies
//! - [`plan`]: eviction planning and execution
//! - [`reservation`]: claims on free space
//! - [`monitor`]: background integrity checking
//! - [`manager`]: restore-on-miss via a [`Restorer`]

pub mod cache;
pub mod config;
pub mod error;
pub mod inventory;
pub mod manager;
pub mod monitor;
pub mod object;
pub mod plan;
pub mod reservation;
pub mod strategy;
pub mod volume;

pub use cache::{Cache, DeletionListener, ReservationListener, SaveListener};
pub use config::{CacheConfig, VolumeConfig};
pub use error::CacheError;
pub use inventory::{Inventory, MemoryInventory, Purpose, VolumeStatus};
pub use manager::{CacheManager, Restorer};
pub use monitor::{IntegrityMonitor, ObjectCheck, SweepStats};
pub use object::{CacheObject, ScoredObject};
pub use plan::{DeletionPlan, DeletionPlanner};
pub use reservation::Reservation;
pub use strategy::{BigOldestStrategy, BySizeStrategy, DeletionStrategy, OldestStrategy, SelectionStrategy};
pub use volume::{CacheVolume, FilesystemVolume, MemoryVolume, NullVolume};

/// Milliseconds since the Unix epoch, the timestamp convention used across
/// inventory metadata.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
