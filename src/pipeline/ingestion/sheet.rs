use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::LoadError;

static NUMERIC_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s$,]").expect("valid regex"));

/// A single spreadsheet cell, reduced to the shapes the pipeline cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Text rendering of the cell. Integral numbers render without a decimal
    /// point so numeric postal codes and fiscal years read naturally.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Cell::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
        }
    }

    /// Numeric value of the cell. Text tolerates currency symbols, thousands
    /// separators and padding. Non-finite values (`NaN`, `inf`, overflow)
    /// read as missing.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => {
                let cleaned = NUMERIC_NOISE.replace_all(s, "");
                if cleaned.is_empty() {
                    None
                } else {
                    cleaned.parse::<f64>().ok()
                }
            }
            Cell::Empty | Cell::Bool(_) => None,
        };
        value.filter(|n| n.is_finite())
    }

    pub fn is_present(&self) -> bool {
        self.as_text().is_some()
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }
}

/// First worksheet of a source file: a header row plus data rows.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Read the first worksheet of `path`. `.csv` goes through the csv reader,
/// every other supported extension through calamine.
pub fn read_sheet(source_name: &str, path: &Path) -> Result<RawSheet, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mut rows = match extension.as_str() {
        "csv" => read_csv_rows(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "xla" | "ods" => read_workbook_rows(path)?,
        _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
    .into_iter();

    let headers = rows
        .next()
        .map(|header| {
            header
                .iter()
                .map(|c| c.as_text().unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .filter(|h| h.iter().any(|name| !name.is_empty()))
        .ok_or_else(|| LoadError::EmptySheet {
            source_name: source_name.to_string(),
            path: path.to_path_buf(),
        })?;

    Ok(RawSheet {
        headers,
        rows: rows.collect(),
    })
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<Cell>>, LoadError> {
    let file = std::fs::File::open(path).map_err(|error| LoadError::Io {
        path: path.to_path_buf(),
        error,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<Cell>>, LoadError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Vec::new()),
    };
    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect())
}

/// A sheet restricted to an allowlist of columns, with renames applied.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row {
            index: &self.index,
            cells,
        })
    }
}

/// Borrowed view of one table row, addressed by column name.
pub struct Row<'a> {
    index: &'a HashMap<String, usize>,
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn cell(&self, column: &str) -> &'a Cell {
        static EMPTY: Cell = Cell::Empty;
        self.index
            .get(column)
            .and_then(|&i| self.cells.get(i))
            .unwrap_or(&EMPTY)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.cell(column).as_text()
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.cell(column).as_number()
    }
}

impl RawSheet {
    /// Keep only `keep` (in that order) and rename per `renames`. Header names
    /// are matched after trimming, so a stray trailing space in an export does
    /// not break the load. Any missing column fails the whole load.
    pub fn project(
        &self,
        source_name: &str,
        path: &Path,
        keep: &[&str],
        renames: &[(&str, &str)],
    ) -> Result<Table, LoadError> {
        let mut positions = Vec::with_capacity(keep.len());
        for wanted in keep {
            let position = self
                .headers
                .iter()
                .position(|h| h.trim() == wanted.trim())
                .ok_or_else(|| LoadError::MissingColumn {
                    source_name: source_name.to_string(),
                    column: wanted.to_string(),
                    path: path.to_path_buf(),
                })?;
            positions.push(position);
        }

        let columns: Vec<String> = keep
            .iter()
            .map(|name| {
                renames
                    .iter()
                    .find(|(from, _)| from == name)
                    .map(|(_, to)| to.to_string())
                    .unwrap_or_else(|| name.to_string())
            })
            .collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|&p| row.get(p).cloned().unwrap_or(Cell::Empty))
                    .collect()
            })
            .collect();

        Ok(Table {
            columns,
            index,
            rows,
        })
    }
}
