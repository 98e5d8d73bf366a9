use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::ingestion::Dataset;
use crate::pipeline::processing::aggregate::aggregate;
use crate::pipeline::processing::enrich::{Enricher, OpportunityEnricher};
use crate::pipeline::processing::geocode::{annotate, Geocoder, PostalTable};
use crate::pipeline::view::{FilterOptions, HeatmapFrame, ViewParams};

/// Loaded data plus geocoder. Built once at startup, then shared read-only
/// by every request.
pub struct HeatmapPipeline {
    dataset: Dataset,
    geocoder: Box<dyn Geocoder>,
}

impl HeatmapPipeline {
    pub fn new(dataset: Dataset, geocoder: Box<dyn Geocoder>) -> Self {
        Self { dataset, geocoder }
    }

    /// Load both source exports and the postal reference table.
    pub fn from_config(config: &Config) -> Result<Self> {
        let dataset = Dataset::load(&config.sources)?;

        let geocoder = match &config.geocoder.postal_table_path {
            Some(path) => PostalTable::load(path, &config.geocoder.country)?,
            None => {
                warn!("No postal reference table configured; no account will be plotted");
                PostalTable::empty(&config.geocoder.country)
            }
        };

        info!(
            installations = dataset.installations.len(),
            opportunities = dataset.opportunities.len(),
            postal_codes = geocoder.len(),
            "Heatmap pipeline ready"
        );
        Ok(Self::new(dataset, Box::new(geocoder)))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Aggregate, join SPOT metrics, geocode and filter for one view.
    #[instrument(skip(self), fields(focus = %params.focus))]
    pub fn run(&self, params: &ViewParams) -> HeatmapFrame {
        let start = Instant::now();

        let accounts = aggregate(&self.dataset.installations, params.grouping());
        let (joined, _stats) = OpportunityEnricher::new(&self.dataset.opportunities).enrich(accounts);
        let located = annotate(joined, self.geocoder.as_ref());
        let rows = params.effective_filters().apply(&located);

        let frame = HeatmapFrame::new(params.clone(), rows);
        let elapsed = start.elapsed().as_secs_f64();
        metrics::pipeline::run_completed(params.focus.as_str(), elapsed);
        info!(
            rows = frame.rows.len(),
            unplotted = frame.unplotted,
            elapsed_ms = elapsed * 1000.0,
            "Built heatmap frame"
        );
        frame
    }

    pub fn options(&self) -> FilterOptions {
        FilterOptions::from_dataset(&self.dataset)
    }
}
