use thiserror::Error;

/// Failure to read or parse an uploaded dataset file
///
/// Raised by the summary engine when a backing file is missing, unreadable,
/// or cannot be parsed as delimited tabular data. Callers decide whether to
/// surface it directly (fetch-on-demand path) or cache it as an error marker
/// on the dataset record (upload path); it is never silently discarded.
#[derive(Debug, Error)]
pub enum FileReadError {
    /// The file could not be opened or read
    #[error("failed to read dataset file: {0}")]
    Io(#[from] std::io::Error),

    /// The file contents are not valid tabular data
    #[error("failed to parse dataset file: {0}")]
    Parse(#[from] csv::Error),
}

/// Failure while producing a chart image
#[derive(Debug, Error)]
pub enum ChartError {
    /// Plotting backend failure while drawing the chart
    #[error("chart drawing failed: {0}")]
    Draw(String),

    /// The drawn raster could not be encoded as PNG
    #[error("chart encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Failure of a single report rendering strategy
///
/// Caught internally by the report generator: a primary-strategy error
/// triggers the fallback strategy and is only surfaced (inside a
/// [`ReportGenerationError`]) when the fallback fails too.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The strategy's rendering engine is not present on this host
    #[error("rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    /// HTML template expansion failed
    #[error("template rendering failed: {0}")]
    Template(#[from] handlebars::RenderError),

    /// The rendering engine failed at runtime
    #[error("rendering engine failed: {0}")]
    Engine(String),

    /// Procedural document assembly failed
    #[error("document assembly failed: {0}")]
    Document(String),
}

/// Both report rendering strategies failed; no document is returned
#[derive(Debug, Error)]
#[error("report generation failed (primary: {primary}; fallback: {fallback})")]
pub struct ReportGenerationError {
    /// What went wrong on the primary (HTML to PDF) path
    pub primary: String,

    /// What went wrong on the fallback (flow element) path
    pub fallback: String,
}

/// Failure of the dataset record store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record file could not be read or written
    #[error("record store io error: {0}")]
    Io(#[from] std::io::Error),

    /// The record file contents could not be (de)serialized
    #[error("record store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
