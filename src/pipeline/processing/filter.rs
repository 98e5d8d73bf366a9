use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::ALL;
use crate::observability::metrics;
use crate::pipeline::processing::aggregate::AccountSummary;

/// A single filter value, or the `"All"` sentinel for no filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn only(value: impl Into<String>) -> Self {
        Selection::Only(value.into())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    /// Whether a row value passes this selection. `None` passes only `All`.
    pub fn admits(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => value == Some(wanted.as_str()),
        }
    }
}

impl From<String> for Selection {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == ALL {
            Selection::All
        } else {
            Selection::Only(trimmed.to_string())
        }
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        Selection::from(value.to_string())
    }
}

impl From<Selection> for String {
    fn from(value: Selection) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str(ALL),
            Selection::Only(value) => f.write_str(value),
        }
    }
}

/// Equality predicates over the account frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub vertical: Selection,
    pub business_entity: Selection,
    pub vendor: Selection,
}

impl FilterSet {
    /// Apply vertical, then business entity, then vendor, as a conjunction.
    /// Returns a new vector; `rows` is left untouched.
    pub fn apply(&self, rows: &[AccountSummary]) -> Vec<AccountSummary> {
        let retained: Vec<AccountSummary> = rows
            .iter()
            .filter(|r| self.vertical.admits(Some(r.vertical.as_str())))
            .filter(|r| self.business_entity.admits(r.business_entity.as_deref()))
            .filter(|r| self.vendor.admits(r.opportunity.primary_vendor.as_deref()))
            .cloned()
            .collect();

        debug!(
            input = rows.len(),
            retained = retained.len(),
            vertical = %self.vertical,
            business_entity = %self.business_entity,
            vendor = %self.vendor,
            "Applied filters"
        );
        metrics::filter::rows_retained(retained.len());

        retained
    }
}
