use equipviz::summary::{ColumnStats, column_stats, compute_summary};
use proptest::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// A small equipment dataset: four numeric columns and one text column
fn equipment_csv() -> String {
    let mut csv = String::from("ID,Flowrate,Pressure,Temperature,Note\n");
    for i in 1..=15 {
        csv.push_str(&format!(
            "{},{}.5,{},{},unit-{}\n",
            i,
            i * 10,
            100 + i,
            20 + i % 4,
            i
        ));
    }
    csv
}

#[test]
fn infers_numeric_and_text_columns() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "equipment.csv", &equipment_csv());

    let summary = compute_summary(&path, 20).unwrap();

    assert_eq!(summary.rows, 15);
    assert_eq!(
        summary.columns,
        vec!["ID", "Flowrate", "Pressure", "Temperature", "Note"]
    );
    assert_eq!(
        summary.numeric_columns,
        vec!["ID", "Flowrate", "Pressure", "Temperature"]
    );
    assert_eq!(summary.summary.len(), 4);
    assert!(!summary.summary.contains_key("Note"));
    assert_eq!(summary.raw_preview.len(), 15);

    // Preview cells keep the raw text of the file
    let first = &summary.raw_preview[0];
    assert_eq!(first.get("ID").unwrap(), "1");
    assert_eq!(first.get("Flowrate").unwrap(), "10.5");
    assert_eq!(first.get("Note").unwrap(), "unit-1");
}

#[test]
fn computes_exact_statistics() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "small.csv", "a,b\n1,x\n2,y\n3,z\n4,w\n");

    let summary = compute_summary(&path, 20).unwrap();
    assert_eq!(summary.numeric_columns, vec!["a"]);

    let stats = &summary.summary["a"];
    assert_eq!(stats.count, 4);
    assert_eq!(stats.mean, Some(2.5));
    assert_eq!(stats.median, Some(2.5));
    assert_eq!(stats.min, Some(1.0));
    assert_eq!(stats.max, Some(4.0));
    // Sample std of 1..4 is sqrt(5/3)
    let std = stats.std.unwrap();
    assert!((std - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
}

#[test]
fn missing_cells_do_not_disqualify_a_column() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "gaps.csv", "v,w\n1,a\n,b\nNaN,c\n3,d\n");

    let summary = compute_summary(&path, 20).unwrap();
    assert_eq!(summary.numeric_columns, vec!["v"]);

    let stats = &summary.summary["v"];
    assert_eq!(stats.count, 2);
    assert_eq!(stats.mean, Some(2.0));
    assert_eq!(stats.min, Some(1.0));
    assert_eq!(stats.max, Some(3.0));
}

#[test]
fn all_missing_column_is_numeric_with_null_stats() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "hollow.csv", "empty,other\n,1\n,2\n,3\n");

    let summary = compute_summary(&path, 20).unwrap();
    assert!(summary.numeric_columns.contains(&"empty".to_string()));

    let stats = &summary.summary["empty"];
    assert_eq!(stats.count, 0);
    assert_eq!(stats.mean, None);
    assert_eq!(stats.median, None);
    assert_eq!(stats.std, None);
    assert_eq!(stats.min, None);
    assert_eq!(stats.max, None);
}

#[test]
fn single_value_column_has_no_std() {
    let stats = column_stats(&[7.0]);
    assert_eq!(stats.count, 1);
    assert_eq!(stats.mean, Some(7.0));
    assert_eq!(stats.median, Some(7.0));
    assert_eq!(stats.std, None);
    assert_eq!(stats.min, Some(7.0));
    assert_eq!(stats.max, Some(7.0));
}

#[test]
fn preview_is_capped_but_stats_cover_all_rows() {
    let dir = TempDir::new().unwrap();
    let mut csv = String::from("n\n");
    for i in 0..500 {
        csv.push_str(&format!("{}\n", i));
    }
    let path = write_csv(&dir, "big.csv", &csv);

    let summary = compute_summary(&path, 20).unwrap();
    assert_eq!(summary.rows, 500);
    assert_eq!(summary.raw_preview.len(), 20);
    assert_eq!(summary.summary["n"].count, 500);
    assert_eq!(summary.summary["n"].max, Some(499.0));
}

#[test]
fn stats_map_keeps_source_column_order() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "equipment.csv", &equipment_csv());

    let summary = compute_summary(&path, 20).unwrap();
    let keys: Vec<&str> = summary.summary.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["ID", "Flowrate", "Pressure", "Temperature"]);

    // The serialized payload preserves the same order
    let value = serde_json::to_value(&summary).unwrap();
    let object = value["summary"].as_object().unwrap();
    let serialized: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
    assert_eq!(serialized, vec!["ID", "Flowrate", "Pressure", "Temperature"]);
}

#[test]
fn same_file_yields_same_summary() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "equipment.csv", &equipment_csv());

    let first = compute_summary(&path, 20).unwrap();
    let second = compute_summary(&path, 20).unwrap();
    assert_eq!(first, second);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "ragged.csv", "a,b\n1,2\n3\n");
    assert!(compute_summary(&path, 20).is_err());
}

fn approx_stats(values: &[f64]) -> ColumnStats {
    column_stats(values)
}

proptest! {
    #[test]
    fn stats_invariants_hold(values in prop::collection::vec(-1e6f64..1e6, 1..200)) {
        let stats = approx_stats(&values);
        let min = stats.min.unwrap();
        let max = stats.max.unwrap();
        let mean = stats.mean.unwrap();
        let median = stats.median.unwrap();

        prop_assert_eq!(stats.count as usize, values.len());
        prop_assert!(min <= median && median <= max);
        prop_assert!(mean >= min - 1e-9 && mean <= max + 1e-9);

        match stats.std {
            Some(std) => {
                prop_assert!(values.len() >= 2);
                prop_assert!(std >= 0.0);
            }
            None => prop_assert_eq!(values.len(), 1),
        }
    }
}
