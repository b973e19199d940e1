//! The day-keyed productivity ledger and the store behind it.
//!  - [store::BlobStore] is the durable key-value service, [store::FileBlobStore] its file
//!    backed realization.
//!  - [repository::LedgerRepository] gives typed access to the individual records.
//!  - [accumulator] is the only code that adds time to a day.

pub mod accumulator;
pub mod editing;
pub mod entities;
pub mod repository;
pub mod stats;
pub mod store;
