use crate::chart::{self, ChartOptions};
use crate::error::{RenderError, ReportGenerationError};
use crate::store::Dataset;
use crate::summary::Summary;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use handlebars::Handlebars;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use log::warn;
use printpdf::{BuiltinFont, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;

/// Notice inserted into the document body when the fallback strategy ran
pub const FALLBACK_NOTICE: &str =
    "Note: primary HTML renderer not available — using fallback PDF generator.";

/// How many numeric columns get a chart in the report
const REPORT_CHART_LIMIT: usize = 3;

/// How many preview rows the report's data table shows
const REPORT_PREVIEW_ROWS: usize = 10;

/// One row of the numeric summary table, pre-stringified (blank for null)
#[derive(Debug, Clone)]
pub struct StatsRow {
    pub column: String,
    pub count: String,
    pub mean: String,
    pub median: String,
    pub std: String,
    pub min: String,
    pub max: String,
}

/// A rendered chart ready for embedding
#[derive(Debug, Clone)]
pub struct ChartBlock {
    pub title: String,
    pub caption: String,
    pub png: Vec<u8>,
}

/// Everything a rendering strategy needs to lay out the report document
///
/// Built once per report request from the dataset record and its summary;
/// both strategies consume the same context so the two documents carry the
/// same content in the same order.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub dataset_id: u64,
    pub rows: usize,
    pub generated_at: String,
    pub columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub stats_rows: Vec<StatsRow>,
    pub charts: Vec<ChartBlock>,
    pub preview_header: Vec<String>,
    pub preview_rows: Vec<Vec<String>>,
    pub fallback_notice: Option<String>,
}

fn fmt_float(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v)
    } else {
        format!("{:.4}", v)
    }
}

fn fmt_stat(v: Option<f64>) -> String {
    v.map(fmt_float).unwrap_or_default()
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Raw per-column values to draw charts from
///
/// Precedence: the cached preview rows when present and non-empty, otherwise
/// a full re-read of the backing file. `None` when neither source is
/// available, in which case the chart section is omitted entirely.
fn chart_source_columns(summary: &Summary, file: &Path) -> Option<HashMap<String, Vec<String>>> {
    if !summary.raw_preview.is_empty() {
        let mut series: HashMap<String, Vec<String>> = HashMap::new();
        for column in &summary.numeric_columns {
            // A column absent from the preview rows cannot be charted
            if !summary.raw_preview[0].contains_key(column) {
                continue;
            }
            let values = summary
                .raw_preview
                .iter()
                .map(|row| row.get(column).map(cell_to_string).unwrap_or_default())
                .collect();
            series.insert(column.clone(), values);
        }
        return Some(series);
    }

    if file.exists() {
        if let Ok(full) = crate::summary::compute_summary(file, usize::MAX) {
            let mut series: HashMap<String, Vec<String>> = HashMap::new();
            for column in &summary.numeric_columns {
                if !full.columns.contains(column) {
                    continue;
                }
                let values = full
                    .raw_preview
                    .iter()
                    .map(|row| row.get(column).map(cell_to_string).unwrap_or_default())
                    .collect();
                series.insert(column.clone(), values);
            }
            return Some(series);
        }
    }

    None
}

impl ReportContext {
    /// Assemble the report context for a dataset and its summary
    ///
    /// Generates chart images for the first three numeric columns; a column
    /// whose data cannot be located, or whose chart fails to render, is
    /// skipped silently so the rest of the report still goes out.
    pub fn build(dataset: &Dataset, summary: &Summary) -> Self {
        let stats_rows = summary
            .numeric_columns
            .iter()
            .map(|column| {
                let stats = summary.summary.get(column);
                StatsRow {
                    column: column.clone(),
                    count: stats.map(|s| s.count.to_string()).unwrap_or_default(),
                    mean: fmt_stat(stats.and_then(|s| s.mean)),
                    median: fmt_stat(stats.and_then(|s| s.median)),
                    std: fmt_stat(stats.and_then(|s| s.std)),
                    min: fmt_stat(stats.and_then(|s| s.min)),
                    max: fmt_stat(stats.and_then(|s| s.max)),
                }
            })
            .collect();

        let mut charts = Vec::new();
        if let Some(series) = chart_source_columns(summary, &dataset.file) {
            for column in summary.numeric_columns.iter().take(REPORT_CHART_LIMIT) {
                let Some(raw) = series.get(column) else {
                    continue;
                };
                let values = chart::coerce_values(raw);
                match chart::render_column_chart(column, &values, &ChartOptions::default()) {
                    Ok(png) => charts.push(ChartBlock {
                        title: column.clone(),
                        caption: format!("{} distribution + boxplot", column),
                        png,
                    }),
                    Err(e) => warn!("report: skipping chart for column {}: {}", column, e),
                }
            }
        }

        let preview_header: Vec<String> = summary
            .raw_preview
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_else(|| summary.columns.clone());
        let preview_rows = summary
            .raw_preview
            .iter()
            .take(REPORT_PREVIEW_ROWS)
            .map(|row| {
                preview_header
                    .iter()
                    .map(|column| row.get(column).map(cell_to_string).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            dataset_id: dataset.id,
            rows: summary.rows,
            generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
            columns: summary.columns.clone(),
            numeric_columns: summary.numeric_columns.clone(),
            stats_rows,
            charts,
            preview_header,
            preview_rows,
            fallback_notice: None,
        }
    }
}

/// One way to turn a report context into PDF bytes
///
/// Two implementations exist: the rich HTML-to-PDF path and the procedural
/// flow-element path. Selection is by availability and runtime success, not
/// by caller choice.
pub trait RenderStrategy {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Whether this strategy's engine can run on this host
    fn is_available(&self) -> bool {
        true
    }

    /// Produce a complete PDF document
    fn render(&self, ctx: &ReportContext) -> Result<Vec<u8>, RenderError>;
}

/// A finished report
#[derive(Debug)]
pub struct Report {
    /// Complete PDF document bytes
    pub bytes: Vec<u8>,

    /// Whether the fallback strategy produced the document
    pub fallback_used: bool,
}

/// Primary strategy: handlebars HTML template converted by headless Chrome
///
/// Gives full layout control and shares its markup with any browsable view,
/// but needs a Chrome/Chromium executable on the host. Availability is
/// probed per call by locating that executable.
pub struct HtmlPdfRenderer {
    registry: Handlebars<'static>,
}

impl HtmlPdfRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry
            .register_template_string("report", include_str!("./templates/report.hbs"))
            .expect("bundled report template is valid");
        Self { registry }
    }

    /// Expand the report template to an HTML string
    pub fn render_html(&self, ctx: &ReportContext) -> Result<String, RenderError> {
        Ok(self.registry.render("report", &template_data(ctx))?)
    }
}

impl Default for HtmlPdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn template_data(ctx: &ReportContext) -> Value {
    json!({
        "dataset_id": ctx.dataset_id,
        "rows": ctx.rows,
        "generated_at": ctx.generated_at,
        "columns_joined": ctx.columns.join(", "),
        "fallback_notice": ctx.fallback_notice,
        "stats_rows": ctx.stats_rows.iter().map(|r| json!({
            "column": r.column,
            "count": r.count,
            "mean": r.mean,
            "median": r.median,
            "std": r.std,
            "min": r.min,
            "max": r.max,
        })).collect::<Vec<_>>(),
        "charts": ctx.charts.iter().map(|c| json!({
            "title": c.title,
            "caption": c.caption,
            "image_b64": BASE64.encode(&c.png),
        })).collect::<Vec<_>>(),
        "preview_header": ctx.preview_header,
        "preview_rows": ctx.preview_rows,
    })
}

impl RenderStrategy for HtmlPdfRenderer {
    fn name(&self) -> &'static str {
        "html-pdf"
    }

    fn is_available(&self) -> bool {
        headless_chrome::browser::default_executable().is_ok()
    }

    fn render(&self, ctx: &ReportContext) -> Result<Vec<u8>, RenderError> {
        let html = self.render_html(ctx)?;

        let launch = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .map_err(|e| RenderError::EngineUnavailable(e.to_string()))?;
        let browser = Browser::new(launch).map_err(|e| RenderError::Engine(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| RenderError::Engine(e.to_string()))?;

        let url = format!("data:text/html;base64,{}", BASE64.encode(html.as_bytes()));
        tab.navigate_to(&url)
            .map_err(|e| RenderError::Engine(e.to_string()))?;
        tab.wait_until_navigated()
            .map_err(|e| RenderError::Engine(e.to_string()))?;

        let bytes = tab
            .print_to_pdf(Some(PrintToPdfOptions {
                print_background: Some(true),
                ..Default::default()
            }))
            .map_err(|e| RenderError::Engine(e.to_string()))?;

        if !bytes.starts_with(b"%PDF") {
            return Err(RenderError::Engine(
                "engine returned a malformed document".to_string(),
            ));
        }
        Ok(bytes)
    }
}

/// Fallback strategy: procedural flow-element PDF built with printpdf
///
/// No external engine required; builds the document from explicit flow
/// elements (paragraphs, text tables, embedded chart images) using the
/// built-in Helvetica fonts. Visually simpler than the HTML path but carries
/// the same content in the same order.
pub struct FlowPdfRenderer;

impl RenderStrategy for FlowPdfRenderer {
    fn name(&self) -> &'static str {
        "flow-pdf"
    }

    fn render(&self, ctx: &ReportContext) -> Result<Vec<u8>, RenderError> {
        let mut writer = FlowWriter::new(&format!("Dataset report {}", ctx.dataset_id))?;

        writer.heading("Chemical Equipment — Dataset Report", 16.0);
        writer.text(
            &format!(
                "Dataset: {} | Rows: {} | Generated: {}",
                ctx.dataset_id, ctx.rows, ctx.generated_at
            ),
            10.0,
        );
        if let Some(notice) = &ctx.fallback_notice {
            writer.spacer(2.0);
            writer.wrapped(notice, 10.0, 100);
        }
        writer.spacer(4.0);

        writer.heading("Columns", 12.0);
        writer.wrapped(&ctx.columns.join(", "), 10.0, 100);
        writer.spacer(4.0);

        if !ctx.stats_rows.is_empty() {
            writer.heading("Numeric summary", 12.0);
            let header = ["Column", "count", "mean", "median", "std", "min", "max"];
            writer.table_row(&header.map(String::from), 9.0, true);
            for row in &ctx.stats_rows {
                writer.table_row(
                    &[
                        row.column.clone(),
                        row.count.clone(),
                        row.mean.clone(),
                        row.median.clone(),
                        row.std.clone(),
                        row.min.clone(),
                        row.max.clone(),
                    ],
                    9.0,
                    false,
                );
            }
            writer.spacer(4.0);
        }

        if !ctx.charts.is_empty() {
            writer.heading("Charts", 12.0);
            for block in &ctx.charts {
                writer.heading(&block.title, 11.0);
                writer.image(&block.png)?;
            }
        }

        if !ctx.preview_rows.is_empty() {
            writer.heading("Data preview (first rows)", 12.0);
            writer.table_row(&ctx.preview_header.clone(), 8.0, true);
            for row in &ctx.preview_rows {
                writer.table_row(row, 8.0, false);
            }
        }

        writer.finish()
    }
}

const PAGE_WIDTH: f64 = 210.0;
const PAGE_HEIGHT: f64 = 297.0;
const MARGIN: f64 = 18.0;
const USABLE_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN;
const CHART_DPI: f64 = 150.0;

/// Top-down flow cursor over a printpdf document
struct FlowWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f64,
}

impl FlowWriter {
    fn new(title: &str) -> Result<Self, RenderError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH as f32), Mm(PAGE_HEIGHT as f32), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Document(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Document(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    /// Approximate line height in mm for a point size
    fn line_height(size: f64) -> f64 {
        size * 0.46
    }

    /// Approximate character budget for a column width in mm
    fn chars_for(width_mm: f64, size: f64) -> usize {
        ((width_mm / (size * 0.185)) as usize).max(3)
    }

    fn ensure_space(&mut self, needed: f64) {
        if self.y - needed < MARGIN {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH as f32), Mm(PAGE_HEIGHT as f32), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn line(&mut self, text: &str, size: f64, bold: bool) {
        let height = Self::line_height(size);
        self.ensure_space(height);
        let font = if bold { &self.bold } else { &self.regular };
        self.y -= height;
        self.layer.use_text(text, size as f32, Mm(MARGIN as f32), Mm(self.y as f32), font);
    }

    fn heading(&mut self, text: &str, size: f64) {
        self.ensure_space(Self::line_height(size) + 2.0);
        self.line(text, size, true);
        self.y -= 1.5;
    }

    fn text(&mut self, text: &str, size: f64) {
        self.line(text, size, false);
    }

    fn wrapped(&mut self, text: &str, size: f64, max_chars: usize) {
        let mut current = String::new();
        for word in text.split_whitespace() {
            if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
                self.line(&current, size, false);
                current.clear();
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            self.line(&current, size, false);
        }
    }

    fn table_row(&mut self, cells: &[String], size: f64, bold: bool) {
        if cells.is_empty() {
            return;
        }
        let height = Self::line_height(size);
        self.ensure_space(height);
        let font = if bold { &self.bold } else { &self.regular };
        let col_width = USABLE_WIDTH / cells.len() as f64;
        let budget = Self::chars_for(col_width - 1.0, size);
        self.y -= height;
        for (i, cell) in cells.iter().enumerate() {
            let text: String = cell.chars().take(budget).collect();
            let x = MARGIN + i as f64 * col_width;
            self.layer.use_text(text, size as f32, Mm(x as f32), Mm(self.y as f32), font);
        }
    }

    fn spacer(&mut self, mm: f64) {
        self.y -= mm;
    }

    fn image(&mut self, png: &[u8]) -> Result<(), RenderError> {
        let decoded =
            image::load_from_memory(png).map_err(|e| RenderError::Document(e.to_string()))?;
        let height_mm = decoded.height() as f64 / CHART_DPI * 25.4;
        self.ensure_space(height_mm + 4.0);
        self.y -= height_mm;

        let img = printpdf::Image::from_dynamic_image(&decoded);
        img.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN as f32)),
                translate_y: Some(Mm(self.y as f32)),
                dpi: Some(CHART_DPI as f32),
                ..Default::default()
            },
        );
        self.y -= 4.0;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, RenderError> {
        self.doc
            .save_to_bytes()
            .map_err(|e| RenderError::Document(e.to_string()))
    }
}

/// Generate the report with the default strategy pair
pub fn generate_report(ctx: &ReportContext) -> Result<Report, ReportGenerationError> {
    let primary = HtmlPdfRenderer::new();
    generate_with_strategies(ctx, &primary, &FlowPdfRenderer)
}

/// Generate the report with explicit strategies
///
/// The primary strategy is attempted first when its engine is available; on
/// unavailability or any runtime failure the fallback runs instead, with a
/// visible notice added to the document body. A primary failure alone never
/// sinks the report; it only fails outright when the fallback fails too.
pub fn generate_with_strategies(
    ctx: &ReportContext,
    primary: &dyn RenderStrategy,
    fallback: &dyn RenderStrategy,
) -> Result<Report, ReportGenerationError> {
    let primary_failure = if primary.is_available() {
        match primary.render(ctx) {
            Ok(bytes) => {
                return Ok(Report {
                    bytes,
                    fallback_used: false,
                });
            }
            Err(e) => {
                warn!(
                    "report: primary strategy {} failed, falling back: {}",
                    primary.name(),
                    e
                );
                e.to_string()
            }
        }
    } else {
        warn!(
            "report: primary strategy {} unavailable, falling back",
            primary.name()
        );
        format!("{} engine unavailable", primary.name())
    };

    let mut fallback_ctx = ctx.clone();
    fallback_ctx.fallback_notice = Some(FALLBACK_NOTICE.to_string());

    match fallback.render(&fallback_ctx) {
        Ok(bytes) => Ok(Report {
            bytes,
            fallback_used: true,
        }),
        Err(e) => Err(ReportGenerationError {
            primary: primary_failure,
            fallback: e.to_string(),
        }),
    }
}
