//! Portfolio snapshot module - combines symbol metrics into one snapshot.

mod snapshot_assembler;
mod snapshot_model;

pub use snapshot_assembler::*;
pub use snapshot_model::*;
