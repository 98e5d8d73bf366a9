// Heatmap pipeline: ingestion, processing stages and the map view

pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod view;

pub use ingestion::Dataset;
pub use pipeline::HeatmapPipeline;
pub use view::{FilterOptions, HeatmapFocus, HeatmapFrame, ViewParams};
