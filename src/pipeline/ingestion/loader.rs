use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::SourcesConfig;
use crate::constants::{READY_COLUMNS, READY_RENAMES, SPOT_COLUMNS};
use crate::error::LoadError;
use crate::observability::metrics;
use crate::pipeline::ingestion::sheet::{read_sheet, Row, Table};
use crate::pipeline::processing::normalize::{InstallationRecord, OpportunityRecord};

pub const READY_SOURCE: &str = "ready";
pub const SPOT_SOURCE: &str = "spot";

/// Both source tables, loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub installations: Vec<InstallationRecord>,
    pub opportunities: Vec<OpportunityRecord>,
    pub loaded_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(
        installations: Vec<InstallationRecord>,
        opportunities: Vec<OpportunityRecord>,
    ) -> Self {
        Self {
            installations,
            opportunities,
            loaded_at: Utc::now(),
        }
    }

    /// Load the Ready and SPOT exports named in `sources`.
    pub fn load(sources: &SourcesConfig) -> Result<Self, LoadError> {
        let installations = load_installations(&sources.ready_path)?;
        let opportunities = load_opportunities(&sources.spot_path)?;
        Ok(Self::new(installations, opportunities))
    }
}

/// Load the installed-base report, keeping the Ready column allowlist.
pub fn load_installations(path: &Path) -> Result<Vec<InstallationRecord>, LoadError> {
    let table = read_sheet(READY_SOURCE, path)?.project(
        READY_SOURCE,
        path,
        READY_COLUMNS,
        READY_RENAMES,
    )?;
    Ok(collect_records(READY_SOURCE, path, &table, |row| {
        InstallationRecord::from_row(row)
    }))
}

/// Load the SPOT opportunity report and derive vendor/partner shares.
pub fn load_opportunities(path: &Path) -> Result<Vec<OpportunityRecord>, LoadError> {
    let table = read_sheet(SPOT_SOURCE, path)?.project(SPOT_SOURCE, path, SPOT_COLUMNS, &[])?;
    Ok(collect_records(SPOT_SOURCE, path, &table, |row| {
        OpportunityRecord::from_row(row)
    }))
}

fn collect_records<T, F>(source: &str, path: &Path, table: &Table, build: F) -> Vec<T>
where
    F: Fn(&Row<'_>) -> Option<T>,
{
    let records: Vec<T> = table.rows().filter_map(|row| build(&row)).collect();
    let skipped = table.len() - records.len();

    if skipped > 0 {
        warn!(source, skipped, "Skipped rows without an account name");
        metrics::loader::rows_skipped(source, skipped);
    }
    metrics::loader::rows_loaded(source, records.len());
    info!(
        source,
        path = %path.display(),
        rows = records.len(),
        "Loaded source table"
    );

    records
}
