//! Row reconstruction over the document key space
//!
//! This crate maps the ordered physical entries of a `docrow-storage` store
//! to logical rows:
//! - resolver: per-document column validity under MVCC, TTL and tombstones
//! - iterator: the `RowwiseIterator` state machine and `DocRowwiseIterator`
//! - scan_spec: scan ranges as encoded keys or document keys
//! - row_block: output containers
//! - stats: per-iterator counters
//! - write_batch: builds physical entries for row and column mutations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod iterator;
pub mod resolver;
pub mod row_block;
pub mod scan_spec;
pub mod stats;
pub mod write_batch;

pub use iterator::{DocRowwiseIterator, RowwiseIterator};
pub use resolver::{resolve_run, ColumnValidityResolver, Observation, ResolvedRow};
pub use row_block::{RowBlock, ValueMap};
pub use scan_spec::{DocKeyBounds, DocScanSpec, ScanBounds, ScanSpec};
pub use stats::IteratorStats;
pub use write_batch::DocWriteBatch;
