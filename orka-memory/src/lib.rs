//! Key-value + vector memory store for the OrKa runtime (§4.3): write-path
//! classification and scoring, decay, keyword/vector/hybrid search, blob
//! deduplication, and fork-group coordination records.

pub mod blob;
pub mod decay;
pub mod entry;
pub mod error;
pub mod forkgroup;
pub mod search;
pub mod store;

pub use entry::{build_entry, Category, DecayConfig, MemoryEntry, MemoryType, WriteIntent};
pub use error::{MemoryError, Result};
pub use forkgroup::{ForkGroup, JoinMode};
pub use store::{InMemoryStore, MemoryStore};
