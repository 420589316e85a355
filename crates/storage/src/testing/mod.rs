//! Testing utilities for the store abstraction
//!
//! - **FaultyStore**: injects iterator creation and cursor failures into a
//!   `MemStore`
//! - **ScriptedStore**: replays a fixed, possibly unordered, entry sequence

mod faults;

pub use faults::{FaultyStore, ScriptedStore};
