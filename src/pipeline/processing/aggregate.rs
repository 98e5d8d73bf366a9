use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::observability::metrics;
use crate::pipeline::processing::normalize::{InstallationRecord, OpportunityMetrics, Vertical};

/// How installation rows are grouped into account rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupingMode {
    /// One row per account
    Account,
    /// One row per (account, business entity)
    AccountAndEntity,
}

/// One row of the account frame. Serialized field names are the dashboard's
/// column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    #[serde(rename = "Account Name")]
    pub account_name: String,
    /// Set only when grouping by account and business entity
    #[serde(rename = "Business Entity")]
    pub business_entity: Option<String>,
    #[serde(rename = "Vertical")]
    pub vertical: Vertical,
    #[serde(rename = "Total Spend")]
    pub total_spend: f64,
    /// Most common postal code among the group's sites
    #[serde(rename = "Install Site Postal Code")]
    pub postal_code: Option<String>,
    #[serde(rename = "Total Sites")]
    pub total_sites: usize,
    /// Spend on products with a last-day-of-service date, per account
    #[serde(rename = "Total LDoS")]
    pub total_ldos: Option<f64>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(flatten)]
    pub opportunity: OpportunityMetrics,
}

impl AccountSummary {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Frequency count that remembers first-seen order, so the mode is
/// deterministic: among tied values the earliest one wins.
#[derive(Debug, Clone)]
pub struct Tally<T> {
    positions: HashMap<T, usize>,
    counts: Vec<(T, usize)>,
}

impl<T: Eq + Hash + Clone> Default for Tally<T> {
    fn default() -> Self {
        Self {
            positions: HashMap::new(),
            counts: Vec::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> Tally<T> {
    pub fn add(&mut self, value: T) {
        match self.positions.get(&value) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.positions.insert(value.clone(), self.counts.len());
                self.counts.push((value, 1));
            }
        }
    }

    /// Number of distinct values seen.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn mode(&self) -> Option<&T> {
        let mut best: Option<&(T, usize)> = None;
        for entry in &self.counts {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(value, _)| value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    account_name: String,
    business_entity: Option<String>,
}

#[derive(Default)]
struct GroupState {
    total_spend: f64,
    verticals: Tally<Vertical>,
    postal_codes: Tally<String>,
}

/// Roll installation rows up into account rows, sorted by grouping key.
///
/// In `AccountAndEntity` mode rows with no business entity form their own
/// `(account, None)` group, so spend is conserved across modes. Total LDoS is
/// always computed per account and merged back by account name alone.
pub fn aggregate(records: &[InstallationRecord], mode: GroupingMode) -> Vec<AccountSummary> {
    let mut groups: BTreeMap<GroupKey, GroupState> = BTreeMap::new();

    for record in records {
        let key = GroupKey {
            account_name: record.account_name.clone(),
            business_entity: match mode {
                GroupingMode::Account => None,
                GroupingMode::AccountAndEntity => record.business_entity.clone(),
            },
        };
        let state = groups.entry(key).or_default();
        state.total_spend += record.spend.unwrap_or(0.0);
        state.verticals.add(record.vertical());
        if let Some(code) = &record.site.postal_code {
            state.postal_codes.add(code.clone());
        }
    }

    let ldos = ldos_spend_by_account(records);

    let summaries: Vec<AccountSummary> = groups
        .into_iter()
        .map(|(key, state)| {
            let vertical = state
                .verticals
                .mode()
                .copied()
                .unwrap_or_else(|| Vertical::from_account_name(&key.account_name));
            AccountSummary {
                total_ldos: ldos.get(&key.account_name).copied(),
                account_name: key.account_name,
                business_entity: key.business_entity,
                vertical,
                total_spend: state.total_spend,
                postal_code: state.postal_codes.mode().cloned(),
                total_sites: state.postal_codes.distinct(),
                latitude: None,
                longitude: None,
                opportunity: OpportunityMetrics::default(),
            }
        })
        .collect();

    debug!(
        input_rows = records.len(),
        groups = summaries.len(),
        ?mode,
        "Aggregated installation records"
    );
    metrics::aggregate::groups(summaries.len());

    summaries
}

/// Sum spend over rows that carry a last-day-of-service year, per account.
pub fn ldos_spend_by_account(records: &[InstallationRecord]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for record in records.iter().filter(|r| r.ldos_fy.is_some()) {
        *totals.entry(record.account_name.clone()).or_insert(0.0) += record.spend.unwrap_or(0.0);
    }
    totals
}
