use crate::error::FileReadError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Default number of raw rows carried in a summary preview
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Descriptive statistics for a single numeric column
///
/// Every statistic except `count` is `None` when the column has no
/// non-missing values left after dropping missing entries. The standard
/// deviation is the sample standard deviation and additionally requires at
/// least two values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Number of non-missing values
    pub count: u64,

    /// Arithmetic mean
    pub mean: Option<f64>,

    /// Median (midpoint of the sorted values)
    pub median: Option<f64>,

    /// Sample standard deviation (n - 1 denominator)
    pub std: Option<f64>,

    /// Smallest value
    pub min: Option<f64>,

    /// Largest value
    pub max: Option<f64>,
}

/// Structured statistical summary of one uploaded dataset
///
/// This is the value cached on a dataset record and merged into the summary
/// endpoint's response. Field names match the stored/serialized payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Total data rows in the file (header excluded)
    pub rows: usize,

    /// All column names, in file order
    pub columns: Vec<String>,

    /// Names of the columns inferred as numeric, in file order
    pub numeric_columns: Vec<String>,

    /// Per-column statistics, keyed by numeric column name in file order
    pub summary: IndexMap<String, ColumnStats>,

    /// First rows of the file as column-name to raw-value mappings
    pub raw_preview: Vec<Map<String, Value>>,
}

/// Result of a summary computation as cached on a dataset record
///
/// Upload never hard-fails because summarization failed; the record keeps an
/// error marker in place of the summary instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryOutcome {
    /// Computation succeeded
    Ready(Summary),

    /// Computation failed; the marker preserves the cause
    Failed {
        /// Human-readable failure description
        error: String,
    },
}

/// Per-cell classification used during column type inference
enum CellKind {
    Missing,
    Number(f64),
    Text,
}

fn classify_cell(raw: &str) -> CellKind {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellKind::Missing;
    }
    match trimmed.parse::<f64>() {
        // "NaN"/"nan" parse successfully but carry no value; treat as missing
        Ok(v) if v.is_nan() => CellKind::Missing,
        Ok(v) => CellKind::Number(v),
        Err(_) => CellKind::Text,
    }
}

/// Compute descriptive statistics over one column's non-missing values
///
/// # Arguments
/// * `values` - The non-missing numeric values of the column
///
/// # Returns
/// * `ColumnStats` - count plus mean/median/std/min/max, each `None` when
///   undefined for the input size
///
/// # Examples
/// ```
/// use equipviz::summary::column_stats;
///
/// let stats = column_stats(&[1.0, 2.0, 3.0, 4.0]);
/// assert_eq!(stats.count, 4);
/// assert_eq!(stats.mean, Some(2.5));
/// assert_eq!(stats.median, Some(2.5));
/// assert_eq!(stats.min, Some(1.0));
/// assert_eq!(stats.max, Some(4.0));
///
/// let empty = column_stats(&[]);
/// assert_eq!(empty.count, 0);
/// assert_eq!(empty.mean, None);
/// ```
pub fn column_stats(values: &[f64]) -> ColumnStats {
    if values.is_empty() {
        return ColumnStats {
            count: 0,
            mean: None,
            median: None,
            std: None,
            min: None,
            max: None,
        };
    }

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = if count % 2 == 1 {
        sorted[count / 2]
    } else {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    };

    // Sample standard deviation; undefined for a single observation
    let std = if count >= 2 {
        let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        Some((ss / (count - 1) as f64).sqrt())
    } else {
        None
    };

    ColumnStats {
        count: count as u64,
        mean: Some(mean),
        median: Some(median),
        std,
        min: Some(sorted[0]),
        max: Some(sorted[count - 1]),
    }
}

/// Read a CSV file and compute its statistical summary
///
/// Parses the file, infers a numeric/other type per column from its values,
/// computes descriptive statistics for every numeric column and collects a
/// raw preview of the first `preview_rows` rows. The computation is a pure
/// read: the same immutable file always yields the same summary.
///
/// A column is inferred numeric when none of its non-missing cells fails to
/// parse as a number; empty cells (and literal NaN) are missing and do not
/// disqualify the column. A column consisting only of missing values is
/// numeric with `count = 0` and null statistics.
///
/// # Arguments
/// * `path` - Path of the CSV file
/// * `preview_rows` - How many leading rows to keep as raw preview
///
/// # Returns
/// * `Result<Summary, FileReadError>` - The summary, or the categorized
///   read/parse failure
///
/// # Examples
/// ```no_run
/// use equipviz::summary::{compute_summary, DEFAULT_PREVIEW_ROWS};
///
/// match compute_summary("equipment.csv", DEFAULT_PREVIEW_ROWS) {
///     Ok(summary) => println!("{} rows, {} numeric columns",
///         summary.rows, summary.numeric_columns.len()),
///     Err(e) => eprintln!("summary failed: {}", e),
/// }
/// ```
pub fn compute_summary(
    path: impl AsRef<Path>,
    preview_rows: usize,
) -> Result<Summary, FileReadError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut records: Vec<csv::StringRecord> = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }

    // Type inference: a column stays numeric until a cell refuses to parse
    let mut is_numeric = vec![true; columns.len()];
    let mut numeric_values: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
    for record in &records {
        for (idx, _) in columns.iter().enumerate() {
            let raw = record.get(idx).unwrap_or("");
            match classify_cell(raw) {
                CellKind::Missing => {}
                CellKind::Number(v) => numeric_values[idx].push(v),
                CellKind::Text => is_numeric[idx] = false,
            }
        }
    }

    let mut numeric_columns = Vec::new();
    let mut summary = IndexMap::new();
    for (idx, name) in columns.iter().enumerate() {
        if is_numeric[idx] {
            numeric_columns.push(name.clone());
            summary.insert(name.clone(), column_stats(&numeric_values[idx]));
        }
    }

    let raw_preview = records
        .iter()
        .take(preview_rows)
        .map(|record| {
            let mut row = Map::new();
            for (idx, name) in columns.iter().enumerate() {
                let raw = record.get(idx).unwrap_or("");
                row.insert(name.clone(), Value::String(raw.to_string()));
            }
            row
        })
        .collect();

    Ok(Summary {
        rows: records.len(),
        columns,
        numeric_columns,
        summary,
        raw_preview,
    })
}
