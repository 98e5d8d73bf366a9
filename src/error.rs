use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading one of the source spreadsheets. All of these are
/// fatal at startup: a source either loads completely or not at all.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{source_name}: required column '{column}' not found in {path}")]
    MissingColumn {
        source_name: String,
        column: String,
        path: PathBuf,
    },

    #[error("{source_name}: no header row in {path}")]
    EmptySheet { source_name: String, path: PathBuf },

    #[error("unsupported spreadsheet format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("I/O error reading {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("CSV parse failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet parse failed: {0}")]
    Spreadsheet(#[from] calamine::Error),
}

#[derive(Error, Debug)]
pub enum HeatmapError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, HeatmapError>;
