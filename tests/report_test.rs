use chrono::Utc;
use equipviz::error::RenderError;
use equipviz::report::{
    FALLBACK_NOTICE, FlowPdfRenderer, HtmlPdfRenderer, RenderStrategy, ReportContext,
    generate_with_strategies,
};
use equipviz::store::Dataset;
use equipviz::summary::compute_summary;
use std::fs;
use tempfile::TempDir;

/// Strategy stub that always fails at render time
struct FailingStrategy;

impl RenderStrategy for FailingStrategy {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn render(&self, _ctx: &ReportContext) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Engine("boom".to_string()))
    }
}

/// Strategy stub whose engine is never present
struct UnavailableStrategy;

impl RenderStrategy for UnavailableStrategy {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn render(&self, _ctx: &ReportContext) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::EngineUnavailable("never runs".to_string()))
    }
}

/// Strategy stub that returns a fixed payload
struct CannedStrategy;

impl RenderStrategy for CannedStrategy {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn render(&self, _ctx: &ReportContext) -> Result<Vec<u8>, RenderError> {
        Ok(b"%PDF-canned".to_vec())
    }
}

fn sample_context(dir: &TempDir) -> ReportContext {
    let path = dir.path().join("equipment.csv");
    let mut csv = String::from("ID,Flowrate,Pressure,Note\n");
    for i in 1..=12 {
        csv.push_str(&format!("{},{}.25,{},pump-{}\n", i, i * 3, 90 + i, i));
    }
    fs::write(&path, csv).unwrap();

    let summary = compute_summary(&path, 20).unwrap();
    let dataset = Dataset {
        id: 7,
        owner: "alice".to_string(),
        file: path,
        original_filename: "equipment.csv".to_string(),
        uploaded_at: Utc::now(),
        summary_json: None,
    };
    ReportContext::build(&dataset, &summary)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn context_carries_charts_and_preview() {
    let dir = TempDir::new().unwrap();
    let ctx = sample_context(&dir);

    assert_eq!(ctx.dataset_id, 7);
    assert_eq!(ctx.rows, 12);
    assert_eq!(ctx.numeric_columns, vec!["ID", "Flowrate", "Pressure"]);
    assert_eq!(ctx.stats_rows.len(), 3);
    // Three numeric columns, three charts (the limit)
    assert_eq!(ctx.charts.len(), 3);
    assert_eq!(ctx.preview_rows.len(), 10);
    assert_eq!(ctx.preview_header.len(), 4);
    assert!(ctx.fallback_notice.is_none());
}

#[test]
fn primary_success_skips_the_fallback() {
    let dir = TempDir::new().unwrap();
    let ctx = sample_context(&dir);

    let report = generate_with_strategies(&ctx, &CannedStrategy, &FailingStrategy).unwrap();
    assert!(!report.fallback_used);
    assert_eq!(report.bytes, b"%PDF-canned");
}

#[test]
fn primary_failure_falls_back_to_flow_pdf() {
    let dir = TempDir::new().unwrap();
    let ctx = sample_context(&dir);

    let report = generate_with_strategies(&ctx, &FailingStrategy, &FlowPdfRenderer).unwrap();
    assert!(report.fallback_used);
    assert!(report.bytes.starts_with(b"%PDF"));
    assert!(contains(&report.bytes, b"%%EOF"));
}

#[test]
fn unavailable_primary_falls_back_without_rendering() {
    let dir = TempDir::new().unwrap();
    let ctx = sample_context(&dir);

    let report =
        generate_with_strategies(&ctx, &UnavailableStrategy, &FlowPdfRenderer).unwrap();
    assert!(report.fallback_used);
    assert!(report.bytes.starts_with(b"%PDF"));
}

#[test]
fn both_strategies_failing_is_an_error() {
    let dir = TempDir::new().unwrap();
    let ctx = sample_context(&dir);

    let err = generate_with_strategies(&ctx, &FailingStrategy, &FailingStrategy).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("primary"));
    assert!(message.contains("fallback"));
}

#[test]
fn flow_pdf_carries_the_fallback_notice_only_when_set() {
    let dir = TempDir::new().unwrap();
    let mut ctx = sample_context(&dir);

    let plain = FlowPdfRenderer.render(&ctx).unwrap();
    assert!(!contains(&plain, b"using fallback PDF generator"));

    ctx.fallback_notice = Some(FALLBACK_NOTICE.to_string());
    let noticed = FlowPdfRenderer.render(&ctx).unwrap();
    assert!(contains(&noticed, b"using fallback PDF generator"));
    assert_ne!(plain, noticed);
}

#[test]
fn html_carries_the_fallback_notice_only_when_set() {
    let dir = TempDir::new().unwrap();
    let renderer = HtmlPdfRenderer::new();

    let mut ctx = sample_context(&dir);
    let plain = renderer.render_html(&ctx).unwrap();
    assert!(!plain.contains(FALLBACK_NOTICE));
    assert!(plain.contains("Chemical Equipment"));
    assert!(plain.contains("Flowrate"));

    ctx.fallback_notice = Some(FALLBACK_NOTICE.to_string());
    let noticed = renderer.render_html(&ctx).unwrap();
    assert!(noticed.contains("using fallback PDF generator"));
}

#[test]
fn report_renders_without_any_charts() {
    let dir = TempDir::new().unwrap();
    let mut ctx = sample_context(&dir);
    ctx.charts.clear();

    let report = generate_with_strategies(&ctx, &FailingStrategy, &FlowPdfRenderer).unwrap();
    assert!(report.bytes.starts_with(b"%PDF"));
}
