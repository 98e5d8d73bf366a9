// Ingestion: read the Ready and SPOT exports into typed records

pub mod loader;
pub mod sheet;

pub use loader::Dataset;
