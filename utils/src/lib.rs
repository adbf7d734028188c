//! Shared infrastructure utilities for Wrangle.
//!
//! Cross-cutting helpers that don't belong in the domain-pure `wrangle-types` crate:
//!
//! - **`atomic_write`**: Crash-safe file output (temp + persist, never replacing an existing file) for exported data and scripts

pub mod atomic_write;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write, atomic_write_with_options,
};
