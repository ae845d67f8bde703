//! Wide-to-long normalization of a published Vitibrasil table.
//!
//! The published files have one row per product (or country) and one column
//! per year. Some years appear split over several columns, cells carry noise
//! tokens and decimal commas, and section header rows are interleaved with
//! the leaf rows. [`normalize`] turns such a table into typed records, one per
//! (entity, year) pair.
//!
//! The steps run in a fixed order and each assumes the cleanup done before it.

use super::table::{Cell, RawTable};
use crate::domain::{DatasetRecord, FieldMap};
use crate::error::{IngestError, Result};
use crate::observability::metrics;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Normalize raw delimited bytes into records of `R`.
pub fn normalize_bytes<R: DatasetRecord>(bytes: &[u8], delimiter: u8) -> Result<Vec<R>> {
    let table = RawTable::from_delimited(bytes, delimiter)?;
    normalize::<R>(table)
}

/// Normalize a parsed table into records of `R`.
///
/// An unknown category code aborts the whole batch. Any other per-row
/// construction failure is logged and the row is skipped.
pub fn normalize<R: DatasetRecord>(table: RawTable) -> Result<Vec<R>> {
    let started = Instant::now();
    let rows_in = table.len();
    metrics::normalize::rows_in(rows_in);

    let mut table = table;
    translate_columns(&mut table, R::COLUMN_TRANSLATIONS);
    trim(&mut table);
    fill_missing(&mut table);
    coalesce_split_columns(&mut table);
    drop_all_zero_rows(&mut table);
    keep_leaf_rows(&mut table);
    coerce_year_columns(&mut table);
    strip_parentheses(&mut table);
    let long = melt(&table, R::VALUE_FIELD);
    debug!(rows_in, long_rows = long.rows.len(), "Reshaped table to long format");

    let mut records = Vec::with_capacity(long.rows.len());
    let mut skipped = 0usize;
    for (idx, row) in long.rows.iter().enumerate() {
        let fields = map_fields::<R>(&long.columns, row);
        match R::from_fields(&fields, idx + 1) {
            Ok(record) => records.push(record),
            Err(e @ IngestError::InvalidCategoryCode { .. }) => return Err(e),
            Err(e) => {
                warn!(row = idx + 1, error = %e, "Skipping row that failed construction");
                skipped += 1;
            }
        }
    }

    metrics::normalize::records_out(records.len());
    metrics::normalize::rows_dropped(skipped);
    metrics::normalize::duration(started.elapsed().as_secs_f64());
    info!(
        rows_in,
        records = records.len(),
        skipped,
        value_field = R::VALUE_FIELD,
        "Normalized table"
    );
    Ok(records)
}

/// Rename columns through the translation table. Lookup is on the lower-cased
/// label; a `.N` duplicate suffix is carried over to the translated name.
fn translate_columns(table: &mut RawTable, translations: &[(&str, &str)]) {
    for label in table.columns.iter_mut() {
        let lowered = label.trim().to_lowercase();
        let (base, suffix) = match lowered.split_once('.') {
            Some((base, suffix)) => (base, Some(suffix)),
            None => (lowered.as_str(), None),
        };
        if let Some((_, field)) = translations.iter().find(|(from, _)| *from == base) {
            *label = match suffix {
                Some(suffix) => format!("{}.{}", field, suffix),
                None => field.to_string(),
            };
        }
    }
}

fn trim(table: &mut RawTable) {
    for label in table.columns.iter_mut() {
        *label = label.trim().to_string();
    }
    for cell in table.rows.iter_mut().flatten() {
        let replacement = match cell {
            Cell::Text(s) if s.trim().is_empty() => Some(Cell::Missing),
            Cell::Text(s) if s.trim().len() != s.len() => Some(Cell::Text(s.trim().to_string())),
            _ => None,
        };
        if let Some(replacement) = replacement {
            *cell = replacement;
        }
    }
}

fn fill_missing(table: &mut RawTable) {
    for cell in table.rows.iter_mut().flatten() {
        if cell.is_missing() {
            *cell = Cell::Number(0.0);
        }
    }
}

fn base_label(label: &str) -> &str {
    label.split_once('.').map(|(base, _)| base).unwrap_or(label)
}

/// Merge columns sharing a base label (`2019`, `2019.1`, ...) into one column
/// named after the base. Numeric parts are summed; a noise token in any part
/// wins so the merged cell still reads as missing later on.
fn coalesce_split_columns(table: &mut RawTable) {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (idx, label) in table.columns.iter().enumerate() {
        let base = base_label(label);
        match groups.iter_mut().find(|(b, _)| b == base) {
            Some((_, members)) => members.push(idx),
            None => groups.push((base.to_string(), vec![idx])),
        }
    }
    if groups.iter().all(|(_, members)| members.len() == 1) {
        return;
    }

    let mut columns = Vec::with_capacity(groups.len());
    let mut anchors = Vec::with_capacity(groups.len());
    for (base, members) in &groups {
        // The merged column sits where the base column sat, or the first member
        let anchor = members
            .iter()
            .copied()
            .find(|&i| table.columns[i] == *base)
            .unwrap_or(members[0]);
        anchors.push((anchor, base.clone(), members.clone()));
    }
    anchors.sort_by_key(|(anchor, _, _)| *anchor);

    for (_, base, _) in &anchors {
        columns.push(base.clone());
    }
    let rows = table
        .rows
        .iter()
        .map(|row| {
            anchors
                .iter()
                .map(|(_, _, members)| merge_cells(members.iter().map(|&i| &row[i])))
                .collect()
        })
        .collect();

    debug!(
        before = table.columns.len(),
        after = columns.len(),
        "Coalesced split columns"
    );
    table.columns = columns;
    table.rows = rows;
}

fn merge_cells<'a>(cells: impl Iterator<Item = &'a Cell> + Clone) -> Cell {
    let first = match cells.clone().next() {
        Some(cell) => cell.clone(),
        None => return Cell::Missing,
    };
    if let Some(noise) = cells.clone().find(|c| c.is_noise()) {
        return noise.clone();
    }
    let numbers: Vec<f64> = cells.filter_map(Cell::as_number).collect();
    if numbers.is_empty() {
        first
    } else {
        Cell::Number(numbers.iter().sum())
    }
}

/// Drop rows whose year cells add up to zero. Noise counts as zero here.
fn drop_all_zero_rows(table: &mut RawTable) {
    let years = table.year_columns();
    if years.is_empty() {
        return;
    }
    let before = table.rows.len();
    table.rows.retain(|row| {
        let total: f64 = years
            .iter()
            .map(|&i| row[i].as_number().unwrap_or(0.0))
            .sum();
        total != 0.0
    });
    debug!(dropped = before - table.rows.len(), "Dropped all-zero rows");
}

/// Section headers and totals have a control token without an underscore.
fn keep_leaf_rows(table: &mut RawTable) {
    let Some(control) = table.column_index("control") else {
        return;
    };
    let before = table.rows.len();
    table.rows.retain(|row| {
        row[control]
            .to_text()
            .map(|s| s.contains('_'))
            .unwrap_or(false)
    });
    debug!(dropped = before - table.rows.len(), "Dropped non-leaf rows");
}

fn coerce_year_columns(table: &mut RawTable) {
    let years = table.year_columns();
    for row in table.rows.iter_mut() {
        for &i in &years {
            row[i] = match row[i].as_number() {
                Some(n) => Cell::Number(n),
                None => Cell::Missing,
            };
        }
    }
}

fn strip_parentheses(table: &mut RawTable) {
    let years = table.year_columns();
    for row in table.rows.iter_mut() {
        for (i, cell) in row.iter_mut().enumerate() {
            if years.contains(&i) {
                continue;
            }
            if let Cell::Text(s) = cell {
                if s.contains(['(', ')']) {
                    *s = s.replace(['(', ')'], "");
                }
            }
        }
    }
}

/// Reshape year columns into `year` + `value_field`. Output is ordered year
/// column by year column, each block following the input row order. Rows
/// with a missing value are not emitted.
fn melt(table: &RawTable, value_field: &str) -> RawTable {
    let years = table.year_columns();
    let info: Vec<usize> = (0..table.columns.len())
        .filter(|i| !years.contains(i))
        .collect();

    let mut columns: Vec<String> = info.iter().map(|&i| table.columns[i].clone()).collect();
    columns.push("year".to_string());
    columns.push(value_field.to_string());

    let mut rows = Vec::new();
    for &y in &years {
        let Ok(year) = table.columns[y].parse::<f64>() else {
            continue;
        };
        for row in &table.rows {
            let value = &row[y];
            if value.is_missing() {
                continue;
            }
            let mut out: Vec<Cell> = info.iter().map(|&i| row[i].clone()).collect();
            out.push(Cell::Number(year));
            out.push(value.clone());
            rows.push(out);
        }
    }
    RawTable::new(columns, rows)
}

/// Copy the fields `R` declares from one long-format row.
fn map_fields<R: DatasetRecord>(columns: &[String], row: &[Cell]) -> FieldMap {
    let mut fields = FieldMap::new();
    for (label, cell) in columns.iter().zip(row) {
        let lowered = label.to_lowercase();
        if let Some(field) = R::FIELDS.iter().find(|f| **f == lowered) {
            fields.insert(*field, cell.clone());
        }
    }
    fields
}
