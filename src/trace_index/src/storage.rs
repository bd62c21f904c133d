//! Storage-side components.
//!
//! - [`index_write`]: deduplicated writes to the secondary index tables

pub mod index_write;
