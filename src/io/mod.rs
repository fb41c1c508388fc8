//! File adapters: CSV shape store and mapping export.

pub mod export;
pub mod shapes;

pub use export::{export_consolidated, export_mapping, write_consolidated, write_mapping};
pub use shapes::CsvShapeStore;
