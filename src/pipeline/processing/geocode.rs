use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::observability::metrics;
use crate::pipeline::processing::aggregate::AccountSummary;

// GeoNames postal code dump layout (tab separated, no header)
const GEONAMES_COUNTRY: usize = 0;
const GEONAMES_POSTAL_CODE: usize = 1;
const GEONAMES_LATITUDE: usize = 9;
const GEONAMES_LONGITUDE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Trait for resolving postal codes to coordinates
pub trait Geocoder: Send + Sync {
    /// Coordinates for one postal code, or `None` when unknown.
    fn locate(&self, postal_code: &str) -> Option<Coordinates>;
}

/// Latitude and longitude as parallel nullable columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeColumns {
    pub latitudes: Vec<Option<f64>>,
    pub longitudes: Vec<Option<f64>>,
}

impl GeocodeColumns {
    pub fn len(&self) -> usize {
        self.latitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latitudes.is_empty()
    }
}

/// Geocode a column of postal codes. The output has exactly one entry per
/// input entry, in input order; missing or unknown codes map to null.
pub fn query_postal_codes(geocoder: &dyn Geocoder, codes: &[Option<String>]) -> GeocodeColumns {
    let mut columns = GeocodeColumns {
        latitudes: Vec::with_capacity(codes.len()),
        longitudes: Vec::with_capacity(codes.len()),
    };
    for code in codes {
        let found = code.as_deref().and_then(|c| geocoder.locate(c));
        columns.latitudes.push(found.map(|c| c.latitude));
        columns.longitudes.push(found.map(|c| c.longitude));
    }
    columns
}

/// Attach coordinates to each account row from its representative postal
/// code. Rows that do not resolve are kept with null coordinates.
pub fn annotate(rows: Vec<AccountSummary>, geocoder: &dyn Geocoder) -> Vec<AccountSummary> {
    let codes: Vec<Option<String>> = rows.iter().map(|r| r.postal_code.clone()).collect();
    let columns = query_postal_codes(geocoder, &codes);
    debug_assert_eq!(columns.len(), rows.len());

    let annotated: Vec<AccountSummary> = rows
        .into_iter()
        .zip(columns.latitudes.into_iter().zip(columns.longitudes))
        .map(|(mut row, (latitude, longitude))| {
            row.latitude = latitude;
            row.longitude = longitude;
            row
        })
        .collect();

    let resolved = annotated.iter().filter(|r| r.has_coordinates()).count();
    let unresolved = annotated.len() - resolved;
    metrics::geocode::resolved(resolved);
    metrics::geocode::unresolved(unresolved);
    debug!(resolved, unresolved, "Geocoded account rows");

    annotated
}

/// Canonical lookup form of a postal code for `country`.
///
/// For `US` this keeps the five-digit prefix of ZIP+4 codes and restores
/// leading zeros that spreadsheet tools strip from numeric codes.
pub fn normalize_postal_code(country: &str, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if country.eq_ignore_ascii_case("US") {
        let base = trimmed.split('-').next().unwrap_or(trimmed).trim();
        if !base.is_empty() && base.len() < 5 && base.chars().all(|c| c.is_ascii_digit()) {
            return Some(format!("{:0>5}", base));
        }
        return Some(base.to_string());
    }
    Some(trimmed.to_uppercase())
}

/// Static, country-scoped postal code reference table.
#[derive(Debug, Clone)]
pub struct PostalTable {
    country: String,
    entries: HashMap<String, Coordinates>,
}

impl PostalTable {
    /// A table with no entries; every lookup resolves to null.
    pub fn empty(country: &str) -> Self {
        Self {
            country: country.to_uppercase(),
            entries: HashMap::new(),
        }
    }

    /// Build from (postal code, latitude, longitude) triples. Codes listed more
    /// than once resolve to the mean of their coordinates.
    pub fn from_entries<I, S>(country: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64, f64)>,
        S: AsRef<str>,
    {
        let mut sums: HashMap<String, (f64, f64, u32)> = HashMap::new();
        for (code, latitude, longitude) in entries {
            let Some(code) = normalize_postal_code(country, code.as_ref()) else {
                continue;
            };
            let slot = sums.entry(code).or_insert((0.0, 0.0, 0));
            slot.0 += latitude;
            slot.1 += longitude;
            slot.2 += 1;
        }

        let entries = sums
            .into_iter()
            .map(|(code, (lat, lon, n))| {
                (
                    code,
                    Coordinates {
                        latitude: lat / n as f64,
                        longitude: lon / n as f64,
                    },
                )
            })
            .collect();

        Self {
            country: country.to_uppercase(),
            entries,
        }
    }

    /// Parse a GeoNames postal code dump, keeping rows for `country`.
    pub fn from_geonames_reader<R: Read>(country: &str, reader: R) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut triples = Vec::new();
        let mut skipped = 0usize;
        for record in csv_reader.records() {
            let record = record?;
            let matches_country = record
                .get(GEONAMES_COUNTRY)
                .map_or(false, |c| c.trim().eq_ignore_ascii_case(country));
            if !matches_country {
                continue;
            }
            let parsed = (
                record.get(GEONAMES_POSTAL_CODE),
                record.get(GEONAMES_LATITUDE).and_then(|v| v.trim().parse::<f64>().ok()),
                record.get(GEONAMES_LONGITUDE).and_then(|v| v.trim().parse::<f64>().ok()),
            );
            match parsed {
                (Some(code), Some(lat), Some(lon)) => triples.push((code.to_string(), lat, lon)),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "Skipped postal reference rows without usable coordinates");
        }

        Ok(Self::from_entries(country, triples))
    }

    pub fn load(path: &Path, country: &str) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path).map_err(|error| LoadError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let table = Self::from_geonames_reader(country, std::io::BufReader::new(file))?;
        info!(
            path = %path.display(),
            country = %table.country,
            postal_codes = table.len(),
            "Loaded postal code reference table"
        );
        Ok(table)
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Geocoder for PostalTable {
    fn locate(&self, postal_code: &str) -> Option<Coordinates> {
        let code = normalize_postal_code(&self.country, postal_code)?;
        self.entries.get(&code).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::aggregate::AccountSummary;
    use crate::pipeline::processing::normalize::{OpportunityMetrics, Vertical};

    fn table() -> PostalTable {
        PostalTable::from_entries(
            "US",
            vec![
                ("60601", 41.8858, -87.6181),
                ("02134", 42.3539, -71.1337),
                ("98101", 47.6110, -122.3340),
            ],
        )
    }

    fn summary(name: &str, postal: Option<&str>) -> AccountSummary {
        AccountSummary {
            account_name: name.to_string(),
            business_entity: None,
            vertical: Vertical::StateLocalGov,
            total_spend: 1.0,
            postal_code: postal.map(str::to_string),
            total_sites: 1,
            total_ldos: None,
            latitude: None,
            longitude: None,
            opportunity: OpportunityMetrics::default(),
        }
    }

    #[test]
    fn test_output_is_parallel_to_input() {
        let codes = vec![
            Some("98101".to_string()),
            None,
            Some("00000".to_string()),
            Some("60601".to_string()),
            Some("98101".to_string()),
        ];
        let columns = query_postal_codes(&table(), &codes);

        assert_eq!(columns.latitudes.len(), codes.len());
        assert_eq!(columns.longitudes.len(), codes.len());
        assert_eq!(columns.latitudes[0], Some(47.6110));
        assert_eq!(columns.latitudes[1], None);
        assert_eq!(columns.latitudes[2], None);
        assert_eq!(columns.longitudes[3], Some(-87.6181));
        assert_eq!(columns.latitudes[4], columns.latitudes[0]);
    }

    #[test]
    fn test_unknown_code_keeps_row() {
        let rows = vec![summary("CITY OF NOWHERE", Some("00000")), summary("CITY OF CHICAGO", Some("60601"))];
        let annotated = annotate(rows, &table());

        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].latitude, None);
        assert_eq!(annotated[0].longitude, None);
        assert!(annotated[1].has_coordinates());
    }

    #[test]
    fn test_us_normalization() {
        assert_eq!(normalize_postal_code("US", "2134"), Some("02134".to_string()));
        assert_eq!(normalize_postal_code("US", "60601-1234"), Some("60601".to_string()));
        assert_eq!(normalize_postal_code("US", " 98101 "), Some("98101".to_string()));
        assert_eq!(normalize_postal_code("US", ""), None);
        assert_eq!(normalize_postal_code("CA", "k1a 0b1"), Some("K1A 0B1".to_string()));
        assert!(table().locate("2134").is_some());
    }

    #[test]
    fn test_duplicate_codes_are_averaged() {
        let table = PostalTable::from_entries("US", vec![("10001", 40.0, -74.0), ("10001", 42.0, -72.0)]);
        assert_eq!(
            table.locate("10001"),
            Some(Coordinates {
                latitude: 41.0,
                longitude: -73.0
            })
        );
    }

    #[test]
    fn test_geonames_reader_filters_country() {
        let dump = "US\t60601\tChicago\tIllinois\tIL\tCook\t031\t\t\t41.8858\t-87.6181\t4\n\
                    CA\tK1A\tOttawa\tOntario\tON\t\t\t\t\t45.4215\t-75.6972\t4\n\
                    US\t99999\tBroken\t\t\t\t\t\t\tnot-a-number\t0\t\n";
        let table = PostalTable::from_geonames_reader("US", dump.as_bytes()).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.country(), "US");
        assert!(table.locate("60601").is_some());
        assert!(table.locate("K1A").is_none());
    }

    #[test]
    fn test_empty_table_resolves_nothing() {
        let empty = PostalTable::empty("us");
        assert!(empty.is_empty());
        assert_eq!(empty.locate("60601"), None);
    }
}
