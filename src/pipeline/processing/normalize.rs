use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::pipeline::ingestion::sheet::Row;

static SHARE_PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*%?").expect("valid regex"));

/// Business segment of an account, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vertical {
    #[serde(rename = "Education")]
    Education,
    #[serde(rename = "State & Local Gov")]
    StateLocalGov,
}

impl Vertical {
    pub fn from_account_name(account_name: &str) -> Self {
        if account_name.contains(EDUCATION_MARKER) {
            Vertical::Education
        } else {
            Vertical::StateLocalGov
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::Education => "Education",
            Vertical::StateLocalGov => "State & Local Gov",
        }
    }

    pub fn all() -> [Vertical; 2] {
        [Vertical::StateLocalGov, Vertical::Education]
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallSite {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// Kept as text so leading zeros survive.
    pub postal_code: Option<String>,
}

/// One installed product at one site, from the Ready report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationRecord {
    pub account_name: String,
    pub business_entity: Option<String>,
    /// Product list price. Missing prices contribute nothing to sums.
    pub spend: Option<f64>,
    /// Last-day-of-service fiscal year; present only for products with an
    /// announced end of life.
    pub ldos_fy: Option<String>,
    pub site: InstallSite,
}

impl InstallationRecord {
    /// Build a record from a projected Ready row. Rows without an account
    /// name cannot be grouped and yield `None`.
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        let account_name = row.text(ACCOUNT_NAME)?;
        Some(Self {
            account_name,
            business_entity: row.text(BUSINESS_ENTITY),
            spend: row.number(TOTAL_SPEND),
            ldos_fy: row.text(LDOS_FY),
            site: InstallSite {
                name: row.text(INSTALL_SITE_NAME),
                address: row.text(INSTALL_SITE_ADDRESS),
                city: row.text(INSTALL_SITE_CITY),
                state: row.text(INSTALL_SITE_STATE),
                postal_code: row.text(INSTALL_SITE_POSTAL_CODE),
            },
        })
    }

    pub fn vertical(&self) -> Vertical {
        Vertical::from_account_name(&self.account_name)
    }
}

/// SPOT metrics for one account. Every field is nullable; an account with no
/// SPOT row carries `OpportunityMetrics::default()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityMetrics {
    #[serde(rename = "Top EquipMake Share%")]
    pub top_equipment_share: Option<String>,
    #[serde(rename = "Top Provider Share%")]
    pub top_provider_share: Option<String>,
    #[serde(rename = "Oppty Score")]
    pub opportunity_score: Option<f64>,
    #[serde(rename = "Threat Score")]
    pub threat_score: Option<f64>,
    #[serde(rename = "Budget ($K)")]
    pub budget_k: Option<f64>,
    #[serde(rename = "Remaining Budget ($K)")]
    pub remaining_budget_k: Option<f64>,
    #[serde(rename = "Primary Vendor")]
    pub primary_vendor: Option<String>,
    #[serde(rename = "Primary Vendor Share %")]
    pub primary_vendor_share: Option<f64>,
    #[serde(rename = "Top Partner")]
    pub top_partner: Option<String>,
    #[serde(rename = "Top Partner Share %")]
    pub top_partner_share: Option<f64>,
}

/// One SPOT row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub account_name: String,
    pub metrics: OpportunityMetrics,
}

impl OpportunityRecord {
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        let account_name = row.text(ACCOUNT_NAME)?;
        let top_equipment_share = row.text(TOP_EQUIPMAKE_SHARE);
        let top_provider_share = row.text(TOP_PROVIDER_SHARE);

        let vendor = top_equipment_share.as_deref().map(split_share);
        let partner = top_provider_share.as_deref().map(split_share);

        Some(Self {
            account_name,
            metrics: OpportunityMetrics {
                opportunity_score: row.number(OPPTY_SCORE),
                threat_score: row.number(THREAT_SCORE),
                budget_k: row.number(BUDGET_K),
                remaining_budget_k: row.number(REMAINING_BUDGET_K),
                primary_vendor: vendor.as_ref().and_then(|s| s.name.clone()),
                primary_vendor_share: vendor.as_ref().and_then(|s| s.percent),
                top_partner: partner.as_ref().and_then(|s| s.name.clone()),
                top_partner_share: partner.as_ref().and_then(|s| s.percent),
                top_equipment_share,
                top_provider_share,
            },
        })
    }
}

/// A share string like `"Cisco (42%)"` split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub name: Option<String>,
    pub percent: Option<f64>,
}

/// Split a share string on its first `(`. Without a parenthesis the whole
/// string is the name and the percentage is null.
pub fn split_share(raw: &str) -> Share {
    let (name, rest) = match raw.split_once('(') {
        Some((name, rest)) => (name, Some(rest)),
        None => (raw, None),
    };
    let name = name.trim();
    Share {
        name: (!name.is_empty()).then(|| name.to_string()),
        percent: rest
            .and_then(|r| SHARE_PERCENT.captures(r))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok()),
    }
}
