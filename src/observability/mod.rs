// Observability: logging and metrics

pub mod metrics;

pub use crate::logging::init_logging;
pub use metrics::{init, render};
