//! Renewable resource cells, their hourly shapes and capacity allocation.

/// Merit-order allocation of renewable capacity across cells.
pub mod allocator;
/// Incremental LRU cache of per-cell capacity-factor shapes.
pub mod cache;
pub mod lru;
pub mod types;

pub use allocator::{Allocator, AllocationOutcome, CellTable, SelectionMode};
pub use cache::{InMemoryShapeStore, ShapeCache, ShapeStore};
pub use types::{CellId, GridCell, SelectedAllocation, Technology};
