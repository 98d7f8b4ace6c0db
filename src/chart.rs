use crate::error::ChartError;
use plotters::prelude::*;

/// Configuration options for column chart generation
///
/// Controls the dimensions of the generated image and the histogram bucket
/// count. Defaults mirror the report layout: a wide strip split into a
/// histogram on the left and a boxplot on the right.
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Width of the chart image in pixels
    pub width: u32,

    /// Height of the chart image in pixels
    pub height: u32,

    /// Number of histogram buckets
    pub buckets: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 900,
            height: 360,
            buckets: 15,
        }
    }
}

/// Coerce raw cell values to numbers, dropping missing and non-numeric ones
pub fn coerce_values(raw: &[String]) -> Vec<f64> {
    raw.iter()
        .filter_map(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
        })
        .collect()
}

/// Render a histogram + boxplot image for one numeric column
///
/// Produces PNG bytes with a histogram of the values on the left and a
/// horizontal boxplot on the right. Values should already be coerced (see
/// [`coerce_values`]); an empty slice yields a placeholder image rather than
/// an error so a single hollow column never sinks a whole report.
///
/// # Arguments
/// * `name` - Column name, used in the chart captions
/// * `values` - The column's non-missing numeric values
/// * `options` - Image dimensions and bucket count
///
/// # Returns
/// * `Result<Vec<u8>, ChartError>` - PNG image bytes or a drawing/encoding error
pub fn render_column_chart(
    name: &str,
    values: &[f64],
    options: &ChartOptions,
) -> Result<Vec<u8>, ChartError> {
    let (width, height) = (options.width, options.height);
    let mut raw = vec![0u8; (width * height * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut raw, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        if values.is_empty() {
            root.draw(&Text::new(
                format!("{} — no numeric data", name),
                (20, 20),
                ("sans-serif", 22).into_font(),
            ))
            .map_err(draw_err)?;
        } else {
            let (left, right) = root.split_horizontally((width / 2) as i32);
            draw_histogram(&left, name, values, options.buckets)?;
            draw_boxplot(&right, name, values)?;
        }

        root.present().map_err(draw_err)?;
    }

    encode_png(width, height, raw)
}

fn draw_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Draw(e.to_string())
}

fn encode_png(width: u32, height: u32, raw: Vec<u8>) -> Result<Vec<u8>, ChartError> {
    let img = image::RgbImage::from_raw(width, height, raw)
        .ok_or_else(|| ChartError::Draw("pixel buffer size mismatch".to_string()))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)?;
    Ok(png)
}

/// Spread of the data, widened so a constant column still has a drawable range
fn value_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

fn draw_histogram<'a>(
    area: &DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>,
    name: &str,
    values: &[f64],
    buckets: usize,
) -> Result<(), ChartError> {
    let (min, max) = value_range(values);
    let bucket_width = (max - min) / buckets as f64;

    let mut counts = vec![0u64; buckets];
    for &v in values {
        let mut idx = ((v - min) / bucket_width) as usize;
        if idx >= buckets {
            idx = buckets - 1; // the maximum lands in the last bucket
        }
        counts[idx] += 1;
    }
    let tallest = counts.iter().copied().max().unwrap_or(1).max(1);

    let mut chart = ChartBuilder::on(area)
        .caption(format!("Histogram — {}", name), ("sans-serif", 20).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(min..max, 0f64..tallest as f64 * 1.05)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc(name)
        .y_desc("Count")
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, &count)| {
            let lo = min + i as f64 * bucket_width;
            let hi = lo + bucket_width;
            Rectangle::new([(lo, 0.0), (hi, count as f64)], BLUE.filled())
        }))
        .map_err(draw_err)?;

    Ok(())
}

/// Linear-interpolated quantile of an already sorted slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn draw_boxplot<'a>(
    area: &DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>,
    name: &str,
    values: &[f64],
) -> Result<(), ChartError> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);
    let lo_whisker = sorted[0];
    let hi_whisker = sorted[sorted.len() - 1];

    let (min, max) = value_range(values);
    let pad = (max - min) * 0.08;

    let mut chart = ChartBuilder::on(area)
        .caption(format!("Boxplot — {}", name), ("sans-serif", 20).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d((min - pad)..(max + pad), 0f64..1f64)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc(name)
        .y_labels(0)
        .draw()
        .map_err(draw_err)?;

    // Interquartile box with its border, median line, then whiskers and caps
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(q1, 0.35), (q3, 0.65)],
            BLUE.mix(0.25).filled(),
        )))
        .map_err(draw_err)?;
    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(q1, 0.35), (q3, 0.65)],
            BLUE,
        )))
        .map_err(draw_err)?;
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(median, 0.35), (median, 0.65)],
            RED,
        )))
        .map_err(draw_err)?;
    chart
        .draw_series(
            [
                vec![(lo_whisker, 0.5), (q1, 0.5)],
                vec![(q3, 0.5), (hi_whisker, 0.5)],
                vec![(lo_whisker, 0.42), (lo_whisker, 0.58)],
                vec![(hi_whisker, 0.42), (hi_whisker, 0.58)],
            ]
            .into_iter()
            .map(|points| PathElement::new(points, BLUE)),
        )
        .map_err(draw_err)?;

    Ok(())
}
