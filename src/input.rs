//! Thin CSV readers for game records and metric snapshots.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::correlation::MetricTable;
use crate::error::{ChartError, Result};

/// Quote-aware reader that tolerates ragged rows and trims every field.
fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn read_header<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>> {
    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if header.iter().all(|h| h.is_empty()) {
        return Err(ChartError::Input("CSV file is empty".to_string()));
    }
    Ok(header)
}

fn parse_cell(field: &str) -> f64 {
    field.parse::<f64>().unwrap_or(f64::NAN)
}

fn column_index(header: &[String], name: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            ChartError::Input(format!("column '{}' not found in header {:?}", name, header))
        })
}

/// Read `(timestamp text, value)` rows from a headed CSV.
///
/// Rows too short to hold either column are skipped; a value that does not
/// parse is kept as `NaN` so the series builder counts it as dropped.
pub fn read_series<R: Read>(
    reader: R,
    date_column: &str,
    value_column: &str,
) -> Result<Vec<(String, f64)>> {
    let mut reader = csv_reader(reader);
    let header = read_header(&mut reader)?;
    let date_idx = column_index(&header, date_column)?;
    let value_idx = column_index(&header, value_column)?;

    let mut rows = Vec::new();
    let mut short = 0usize;
    for record in reader.records() {
        let record = record?;
        match (record.get(date_idx), record.get(value_idx)) {
            (Some(date), Some(value)) => rows.push((date.to_string(), parse_cell(value))),
            _ => short += 1,
        }
    }
    if short > 0 {
        tracing::warn!(short, "skipped rows missing the date or value column");
    }
    Ok(rows)
}

pub fn load_series_csv(
    path: impl AsRef<Path>,
    date_column: &str,
    value_column: &str,
) -> Result<Vec<(String, f64)>> {
    let file = File::open(path)?;
    read_series(BufReader::new(file), date_column, value_column)
}

/// Read every numeric column of a headed CSV into a [`MetricTable`].
///
/// Non-numeric cells become `NaN`; a column with no numeric cell at all
/// (names, dates) is left out. Short rows are padded with `NaN`.
pub fn read_metric_table<R: Read>(reader: R) -> Result<MetricTable> {
    let mut reader = csv_reader(reader);
    let header = read_header(&mut reader)?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); header.len()];
    for record in reader.records() {
        let record = record?;
        for (idx, column) in columns.iter_mut().enumerate() {
            column.push(record.get(idx).map_or(f64::NAN, parse_cell));
        }
    }

    let mut table = MetricTable::new();
    for (name, column) in header.into_iter().zip(columns) {
        if column.iter().any(|v| v.is_finite()) {
            table.push_column(name, column);
        } else {
            tracing::debug!(column = %name, "skipping non-numeric column");
        }
    }
    Ok(table)
}

pub fn load_metric_table(path: impl AsRef<Path>) -> Result<MetricTable> {
    let file = File::open(path)?;
    read_metric_table(BufReader::new(file))
}
