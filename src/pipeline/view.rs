//! Map view parameters and encodings.
//!
//! The dashboard front end sends one `ViewParams` per interaction. This module
//! decides how those parameters shape the pipeline run (grouping and filters)
//! and which frame columns the map should bind to color, size, hover and
//! text.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::*;
use crate::error::HeatmapError;
use crate::pipeline::ingestion::Dataset;
use crate::pipeline::processing::aggregate::{AccountSummary, GroupingMode};
use crate::pipeline::processing::filter::{FilterSet, Selection};
use crate::pipeline::processing::normalize::Vertical;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatmapFocus {
    #[default]
    #[serde(rename = "Geographic")]
    Geographic,
    #[serde(rename = "Account Spend")]
    AccountSpend,
    #[serde(rename = "SPOT")]
    Spot,
}

impl HeatmapFocus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeatmapFocus::Geographic => "Geographic",
            HeatmapFocus::AccountSpend => "Account Spend",
            HeatmapFocus::Spot => "SPOT",
        }
    }
}

/// Spend columns that can drive color or size in the Account Spend view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendMetric {
    #[default]
    #[serde(rename = "Total Spend")]
    TotalSpend,
    #[serde(rename = "Total LDoS")]
    TotalLdos,
}

impl SpendMetric {
    pub fn column(&self) -> &'static str {
        match self {
            SpendMetric::TotalSpend => TOTAL_SPEND,
            SpendMetric::TotalLdos => TOTAL_LDOS,
        }
    }
}

/// SPOT columns that can drive color in the SPOT view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotMetric {
    #[default]
    #[serde(rename = "Budget ($K)")]
    Budget,
    #[serde(rename = "Oppty Score")]
    OpportunityScore,
    #[serde(rename = "Remaining Budget ($K)")]
    RemainingBudget,
    #[serde(rename = "Primary Vendor")]
    PrimaryVendor,
    #[serde(rename = "Top Partner")]
    TopPartner,
}

impl SpotMetric {
    pub fn column(&self) -> &'static str {
        match self {
            SpotMetric::Budget => BUDGET_K,
            SpotMetric::OpportunityScore => OPPTY_SCORE,
            SpotMetric::RemainingBudget => REMAINING_BUDGET_K,
            SpotMetric::PrimaryVendor => PRIMARY_VENDOR,
            SpotMetric::TopPartner => TOP_PARTNER,
        }
    }
}

macro_rules! parse_by_serde_name {
    ($ty:ty, $what:literal) => {
        impl FromStr for $ty {
            type Err = HeatmapError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                serde_json::from_value(serde_json::Value::String(s.trim().to_string())).map_err(
                    |_| HeatmapError::InvalidParameter(format!("unknown {}: '{}'", $what, s)),
                )
            }
        }
    };
}

parse_by_serde_name!(HeatmapFocus, "heatmap focus");
parse_by_serde_name!(SpendMetric, "spend metric");
parse_by_serde_name!(SpotMetric, "SPOT metric");

impl fmt::Display for HeatmapFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the control panel can set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    pub focus: HeatmapFocus,
    pub show_account_names: bool,
    pub vertical: Selection,
    pub business_entity: Selection,
    pub vendor: Selection,
    pub color_by: SpendMetric,
    pub size_by: SpendMetric,
    pub spot_metric: SpotMetric,
}

impl ViewParams {
    /// Entity grouping only applies in the Account Spend view with a specific
    /// business entity selected.
    pub fn grouping(&self) -> GroupingMode {
        if self.focus == HeatmapFocus::AccountSpend && !self.business_entity.is_all() {
            GroupingMode::AccountAndEntity
        } else {
            GroupingMode::Account
        }
    }

    /// Filters actually applied for this focus. The SPOT view always limits
    /// to Education accounts; each other filter applies only in the view that
    /// shows its control.
    pub fn effective_filters(&self) -> FilterSet {
        let vertical = match self.focus {
            HeatmapFocus::Spot => Selection::only(Vertical::Education.as_str()),
            _ => self.vertical.clone(),
        };
        let business_entity = match self.focus {
            HeatmapFocus::AccountSpend => self.business_entity.clone(),
            _ => Selection::All,
        };
        let vendor = match self.focus {
            HeatmapFocus::Spot => self.vendor.clone(),
            _ => Selection::All,
        };
        FilterSet {
            vertical,
            business_entity,
            vendor,
        }
    }

    pub fn encoding(&self) -> MapEncoding {
        let mut encoding = MapEncoding {
            latitude: LATITUDE,
            longitude: LONGITUDE,
            hover_name: ACCOUNT_NAME,
            text: self.show_account_names.then_some(ACCOUNT_NAME),
            color: VERTICAL,
            size: None,
            size_max: None,
            opacity: 1.0,
            hover_data: vec![TOTAL_SPEND, TOTAL_SITES],
            zoom: MAP_ZOOM,
        };

        match self.focus {
            HeatmapFocus::Geographic => {}
            HeatmapFocus::AccountSpend => {
                encoding.color = self.color_by.column();
                encoding.size = Some(self.size_by.column());
                encoding.size_max = Some(SPEND_SIZE_MAX);
                encoding.opacity = BUBBLE_OPACITY;
            }
            HeatmapFocus::Spot => {
                encoding.color = self.spot_metric.column();
                encoding.size = Some(TOTAL_SPEND);
                encoding.size_max = Some(SPOT_SIZE_MAX);
                encoding.opacity = BUBBLE_OPACITY;
                encoding
                    .hover_data
                    .extend([BUDGET_K, PRIMARY_VENDOR, TOP_PARTNER]);
            }
        }
        encoding
    }
}

/// Which frame columns the map binds to each visual channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapEncoding {
    pub latitude: &'static str,
    pub longitude: &'static str,
    pub hover_name: &'static str,
    pub text: Option<&'static str>,
    pub color: &'static str,
    pub size: Option<&'static str>,
    pub size_max: Option<u32>,
    pub opacity: f64,
    pub hover_data: Vec<&'static str>,
    pub zoom: u8,
}

impl MapEncoding {
    /// Every column this encoding reads from the frame.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec![self.latitude, self.longitude, self.hover_name, self.color];
        columns.extend(self.text);
        columns.extend(self.size);
        columns.extend(self.hover_data.iter().copied());
        columns
    }
}

/// Values offered by the control panel's filter widgets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub verticals: Vec<String>,
    pub business_entities: Vec<String>,
    pub vendors: Vec<String>,
}

impl FilterOptions {
    /// `All` followed by each distinct value in first-seen order.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let verticals = std::iter::once(ALL.to_string())
            .chain(Vertical::all().iter().map(|v| v.as_str().to_string()))
            .collect();
        let business_entities = with_all(
            dataset
                .installations
                .iter()
                .filter_map(|r| r.business_entity.as_deref()),
        );
        let vendors = with_all(
            dataset
                .opportunities
                .iter()
                .filter_map(|r| r.metrics.primary_vendor.as_deref()),
        );
        Self {
            verticals,
            business_entities,
            vendors,
        }
    }
}

/// One rendered map view: the filtered account frame plus how to draw it.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapFrame {
    pub generated_at: DateTime<Utc>,
    pub params: ViewParams,
    pub encoding: MapEncoding,
    pub rows: Vec<AccountSummary>,
    /// Rows without coordinates; kept in `rows` but not drawn
    pub unplotted: usize,
}

impl HeatmapFrame {
    pub fn new(params: ViewParams, rows: Vec<AccountSummary>) -> Self {
        let unplotted = rows.iter().filter(|r| !r.has_coordinates()).count();
        Self {
            generated_at: Utc::now(),
            encoding: params.encoding(),
            params,
            rows,
            unplotted,
        }
    }

    /// Write the rows as CSV with a `FRAME_COLUMNS` header. Null cells are
    /// written empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(FRAME_COLUMNS)?;
        for row in &self.rows {
            let value = serde_json::to_value(row).map_err(io::Error::from)?;
            let record: Vec<String> = FRAME_COLUMNS
                .iter()
                .map(|column| match value.get(*column) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect();
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

fn with_all<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out = vec![ALL.to_string()];
    for value in values {
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_control_panel() {
        let params = ViewParams::default();
        assert_eq!(params.focus, HeatmapFocus::Geographic);
        assert!(!params.show_account_names);
        assert_eq!(params.grouping(), GroupingMode::Account);
        assert_eq!(params.effective_filters(), FilterSet::default());
    }

    #[test]
    fn test_entity_grouping_only_in_account_spend() {
        let mut params = ViewParams {
            business_entity: Selection::only("Security"),
            ..Default::default()
        };
        assert_eq!(params.grouping(), GroupingMode::Account);
        assert!(params.effective_filters().business_entity.is_all());

        params.focus = HeatmapFocus::AccountSpend;
        assert_eq!(params.grouping(), GroupingMode::AccountAndEntity);
        assert_eq!(
            params.effective_filters().business_entity,
            Selection::only("Security")
        );
    }

    #[test]
    fn test_spot_focus_forces_education_and_vendor() {
        let params = ViewParams {
            focus: HeatmapFocus::Spot,
            vertical: Selection::only("State & Local Gov"),
            vendor: Selection::only("Cisco"),
            ..Default::default()
        };
        let filters = params.effective_filters();
        assert_eq!(filters.vertical, Selection::only("Education"));
        assert_eq!(filters.vendor, Selection::only("Cisco"));

        let geographic = ViewParams {
            vendor: Selection::only("Cisco"),
            ..Default::default()
        };
        assert!(geographic.effective_filters().vendor.is_all());
    }

    #[test]
    fn test_encodings() {
        let geo = ViewParams::default().encoding();
        assert_eq!(geo.color, VERTICAL);
        assert_eq!(geo.size, None);
        assert_eq!(geo.text, None);

        let spend = ViewParams {
            focus: HeatmapFocus::AccountSpend,
            color_by: SpendMetric::TotalLdos,
            show_account_names: true,
            ..Default::default()
        }
        .encoding();
        assert_eq!(spend.color, TOTAL_LDOS);
        assert_eq!(spend.size, Some(TOTAL_SPEND));
        assert_eq!(spend.size_max, Some(25));
        assert_eq!(spend.text, Some(ACCOUNT_NAME));

        let spot = ViewParams {
            focus: HeatmapFocus::Spot,
            spot_metric: SpotMetric::TopPartner,
            ..Default::default()
        }
        .encoding();
        assert_eq!(spot.color, TOP_PARTNER);
        assert_eq!(spot.size_max, Some(15));
        assert!(spot.hover_data.contains(&BUDGET_K));
    }

    #[test]
    fn test_parse_from_display_names() {
        assert_eq!("Account Spend".parse::<HeatmapFocus>().unwrap(), HeatmapFocus::AccountSpend);
        assert_eq!("SPOT".parse::<HeatmapFocus>().unwrap(), HeatmapFocus::Spot);
        assert_eq!("Total LDoS".parse::<SpendMetric>().unwrap(), SpendMetric::TotalLdos);
        assert_eq!("Oppty Score".parse::<SpotMetric>().unwrap(), SpotMetric::OpportunityScore);
        assert!("Heat".parse::<HeatmapFocus>().is_err());
    }

    fn frame_row() -> AccountSummary {
        AccountSummary {
            account_name: "LINCOLN SCHOOL DISTRICT".to_string(),
            business_entity: None,
            vertical: Vertical::Education,
            total_spend: 350.0,
            postal_code: Some("60601".to_string()),
            total_sites: 1,
            total_ldos: Some(100.0),
            latitude: Some(41.8858),
            longitude: Some(-87.6181),
            opportunity: Default::default(),
        }
    }

    #[test]
    fn test_encoding_columns_are_frame_columns() {
        let value = serde_json::to_value(frame_row()).unwrap();
        for focus in [HeatmapFocus::Geographic, HeatmapFocus::AccountSpend, HeatmapFocus::Spot] {
            for spot_metric in [SpotMetric::Budget, SpotMetric::OpportunityScore, SpotMetric::TopPartner] {
                let params = ViewParams {
                    focus,
                    spot_metric,
                    color_by: SpendMetric::TotalLdos,
                    show_account_names: true,
                    ..Default::default()
                };
                for column in params.encoding().columns() {
                    assert!(value.get(column).is_some(), "{} missing from row", column);
                    assert!(FRAME_COLUMNS.contains(&column));
                }
            }
        }
    }

    #[test]
    fn test_frame_counts_unplotted_rows() {
        let mut missing = frame_row();
        missing.latitude = None;
        missing.longitude = None;
        let frame = HeatmapFrame::new(ViewParams::default(), vec![frame_row(), missing]);
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.unplotted, 1);
        assert_eq!(frame.encoding, ViewParams::default().encoding());
    }

    #[test]
    fn test_write_csv() {
        let frame = HeatmapFrame::new(ViewParams::default(), vec![frame_row()]);
        let mut buf = Vec::new();
        frame.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("Account Name,Business Entity,Vertical,Total Spend"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("LINCOLN SCHOOL DISTRICT,,Education,350.0,60601,1,100.0"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_with_all_dedupes_in_order() {
        let out = with_all(["Security", "Networking", "Security"].into_iter());
        assert_eq!(out, vec!["All", "Security", "Networking"]);
    }
}
