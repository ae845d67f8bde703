//! In-memory delimited table with loosely typed cells.

use crate::constants::NOISE_TOKENS;
use crate::error::{IngestError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static THOUSANDS_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,3}(\.\d{3})+$").expect("valid thousands regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn is_noise(&self) -> bool {
        match self {
            Cell::Text(s) => is_noise_token(s),
            _ => false,
        }
    }

    /// Numeric view of the cell. Text goes through [`parse_quantity`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_quantity(s),
            Cell::Missing => None,
        }
    }

    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
        }
    }
}

pub fn is_noise_token(s: &str) -> bool {
    let s = s.trim();
    NOISE_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t))
}

/// Parse a quantity written the way the source writes it: decimal comma,
/// dots as thousands separators. Noise tokens and anything else that is not
/// a number yield `None`.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let s: String = raw.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() || is_noise_token(&s) {
        return None;
    }
    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else if THOUSANDS_ONLY.is_match(&s) {
        s.replace('.', "")
    } else {
        s
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A column is a year column when its label is a bare integer.
pub fn is_year_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    /// Parse delimited bytes. The first record is the header; repeated labels
    /// are suffixed `.1`, `.2`, ... so split columns can be coalesced later.
    pub fn from_delimited(bytes: &[u8], delimiter: u8) -> Result<Self> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(bytes);

        let mut records = reader.byte_records();
        let header = match records.next() {
            Some(record) => record.map_err(|source| IngestError::TableParse { source })?,
            None => return Ok(Self::default()),
        };
        let columns = dedupe_labels(
            header
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned()),
        );

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(|source| IngestError::TableParse { source })?;
            let mut row: Vec<Cell> = record
                .iter()
                .take(columns.len())
                .map(|field| {
                    if field.is_empty() {
                        Cell::Missing
                    } else {
                        Cell::Text(String::from_utf8_lossy(field).into_owned())
                    }
                })
                .collect();
            row.resize(columns.len(), Cell::Missing);
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    pub fn year_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, label)| is_year_label(label))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn dedupe_labels(labels: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for label in labels {
        let mut candidate = label.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}.{}", label, n);
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
