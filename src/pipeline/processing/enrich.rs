use std::collections::HashMap;

use tracing::{debug, warn};

use crate::observability::metrics;
use crate::pipeline::processing::aggregate::AccountSummary;
use crate::pipeline::processing::normalize::{OpportunityMetrics, OpportunityRecord};

/// Counts from one join pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub matched: usize,
    pub unmatched: usize,
    /// Rows added because an account appears more than once in SPOT data
    pub fan_out: usize,
}

/// Trait for enriching account rows with data keyed by account name
pub trait Enricher {
    fn enrich(&self, rows: Vec<AccountSummary>) -> (Vec<AccountSummary>, JoinStats);
}

/// Left join of account rows with SPOT opportunity metrics on account name.
pub struct OpportunityEnricher<'a> {
    by_account: HashMap<&'a str, Vec<&'a OpportunityMetrics>>,
}

impl<'a> OpportunityEnricher<'a> {
    pub fn new(opportunities: &'a [OpportunityRecord]) -> Self {
        let mut by_account: HashMap<&'a str, Vec<&'a OpportunityMetrics>> = HashMap::new();
        for record in opportunities {
            by_account
                .entry(record.account_name.as_str())
                .or_default()
                .push(&record.metrics);
        }
        Self { by_account }
    }

    /// Account names listed more than once in the opportunity table.
    pub fn duplicate_accounts(&self) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = self
            .by_account
            .iter()
            .filter(|(_, matches)| matches.len() > 1)
            .map(|(name, _)| *name)
            .collect();
        names.sort_unstable();
        names
    }
}

impl Enricher for OpportunityEnricher<'_> {
    /// Unmatched rows keep null opportunity fields. An account listed `n`
    /// times in SPOT data produces `n` output rows; duplicates are reported,
    /// not collapsed.
    fn enrich(&self, rows: Vec<AccountSummary>) -> (Vec<AccountSummary>, JoinStats) {
        let mut stats = JoinStats::default();
        let mut joined = Vec::with_capacity(rows.len());

        for row in rows {
            match self.by_account.get(row.account_name.as_str()) {
                None => {
                    stats.unmatched += 1;
                    joined.push(AccountSummary {
                        opportunity: OpportunityMetrics::default(),
                        ..row
                    });
                }
                Some(matches) => {
                    stats.matched += 1;
                    stats.fan_out += matches.len() - 1;
                    for found in matches {
                        joined.push(AccountSummary {
                            opportunity: (*found).clone(),
                            ..row.clone()
                        });
                    }
                }
            }
        }

        if stats.fan_out > 0 {
            warn!(
                extra_rows = stats.fan_out,
                duplicates = ?self.duplicate_accounts(),
                "Duplicate account names in SPOT data fanned out the join"
            );
        }
        debug!(matched = stats.matched, unmatched = stats.unmatched, "Joined SPOT metrics");
        metrics::join::matched(stats.matched);
        metrics::join::unmatched(stats.unmatched);
        metrics::join::fan_out(stats.fan_out);

        (joined, stats)
    }
}
