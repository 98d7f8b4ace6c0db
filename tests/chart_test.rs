use equipviz::chart::{ChartOptions, coerce_values, render_column_chart};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

#[test]
fn renders_a_png_for_numeric_values() {
    let values: Vec<f64> = (0..60).map(|i| (i as f64) * 0.7 + 1.0).collect();
    let png = render_column_chart("Flowrate", &values, &ChartOptions::default()).unwrap();
    assert!(png.starts_with(PNG_MAGIC));
}

#[test]
fn constant_column_still_renders() {
    let values = vec![42.0; 10];
    let png = render_column_chart("Pressure", &values, &ChartOptions::default()).unwrap();
    assert!(png.starts_with(PNG_MAGIC));
}

#[test]
fn empty_values_yield_a_placeholder_image() {
    let png = render_column_chart("Temperature", &[], &ChartOptions::default()).unwrap();
    assert!(png.starts_with(PNG_MAGIC));
}

#[test]
fn coercion_drops_missing_and_text() {
    let raw: Vec<String> = ["1.5", "", "  ", "oops", "NaN", "-3"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(coerce_values(&raw), vec![1.5, -3.0]);
}
