//! # Attribution Charts
//!
//! Text-free chart renderings of attribution results. Bars are drawn red for
//! positive contributions and blue for negative ones, matching the visual
//! convention of the upstream explanation tooling.

use ndarray::Array2;
use plotters::prelude::*;

use super::{RenderError, RenderResult};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// Supported attribution chart forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Decision,
    Force,
    Waterfall,
}

impl ChartKind {
    /// Stable name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Decision => "decision",
            ChartKind::Force => "force",
            ChartKind::Waterfall => "waterfall",
        }
    }
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

fn encode_png(rgb: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    use image::ImageEncoder;
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(rgb, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(out)
}

fn padded(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span > 0.0 {
        (min - 0.05 * span, max + 0.05 * span)
    } else {
        (min - 1.0, max + 1.0)
    }
}

/// Render one attribution vector in the requested chart form
pub fn attribution_chart(
    kind: ChartKind,
    expected: f64,
    values: &[f64],
) -> RenderResult<Vec<u8>> {
    if values.is_empty() {
        return Err(RenderError::Empty("attribution vector is empty".to_string()));
    }
    let mut buf = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        match kind {
            ChartKind::Bar => draw_bar(&root, values)?,
            ChartKind::Decision => draw_decision(&root, expected, values)?,
            ChartKind::Force => draw_force(&root, expected, values)?,
            ChartKind::Waterfall => draw_waterfall(&root, expected, values)?,
        }
        root.present().map_err(draw_err)?;
    }
    encode_png(&buf, WIDTH, HEIGHT)
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

fn draw_bar(root: &Area<'_>, values: &[f64]) -> RenderResult<()> {
    let d = values.len();
    let min = values.iter().copied().fold(0.0f64, f64::min);
    let max = values.iter().copied().fold(0.0f64, f64::max);
    let (x_min, x_max) = padded(min, max);

    let mut chart = ChartBuilder::on(root)
        .margin(24)
        .build_cartesian_2d(x_min..x_max, 0f64..d as f64)
        .map_err(draw_err)?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            let y = (d - 1 - i) as f64;
            let color = if *v >= 0.0 { RED } else { BLUE };
            let (lo, hi) = if *v >= 0.0 { (0.0, *v) } else { (*v, 0.0) };
            Rectangle::new([(lo, y + 0.2), (hi, y + 0.8)], color.filled())
        }))
        .map_err(draw_err)?;

    chart
        .draw_series(LineSeries::new(
            vec![(0.0, 0.0), (0.0, d as f64)],
            BLACK.stroke_width(1),
        ))
        .map_err(draw_err)?;
    Ok(())
}

fn draw_waterfall(root: &Area<'_>, expected: f64, values: &[f64]) -> RenderResult<()> {
    let d = values.len();
    let mut cumulative = Vec::with_capacity(d + 1);
    let mut acc = expected;
    cumulative.push(acc);
    for v in values {
        acc += v;
        cumulative.push(acc);
    }
    let min = cumulative.iter().copied().fold(f64::INFINITY, f64::min);
    let max = cumulative.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (x_min, x_max) = padded(min, max);

    let mut chart = ChartBuilder::on(root)
        .margin(24)
        .build_cartesian_2d(x_min..x_max, 0f64..d as f64)
        .map_err(draw_err)?;

    chart
        .draw_series(values.iter().enumerate().map(|(i, v)| {
            let y = (d - 1 - i) as f64;
            let start = cumulative[i];
            let end = cumulative[i + 1];
            let color = if *v >= 0.0 { RED } else { BLUE };
            let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
            Rectangle::new([(lo, y + 0.2), (hi, y + 0.8)], color.filled())
        }))
        .map_err(draw_err)?;

    // Baseline marker at the expected value
    chart
        .draw_series(LineSeries::new(
            vec![(expected, 0.0), (expected, d as f64)],
            BLACK.stroke_width(1),
        ))
        .map_err(draw_err)?;
    Ok(())
}

fn draw_force(root: &Area<'_>, expected: f64, values: &[f64]) -> RenderResult<()> {
    let positive: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    let negative: Vec<f64> = values.iter().copied().filter(|v| *v < 0.0).collect();
    let pos_total: f64 = positive.iter().sum();
    let neg_total: f64 = negative.iter().sum();
    let (x_min, x_max) = padded(expected + neg_total, expected + pos_total);

    let mut chart = ChartBuilder::on(root)
        .margin(24)
        .build_cartesian_2d(x_min..x_max, 0f64..1f64)
        .map_err(draw_err)?;

    let mut cursor = expected;
    let mut segments = Vec::new();
    for (i, v) in positive.iter().enumerate() {
        let shade = RED.mix(1.0 - 0.5 * (i as f64 / positive.len().max(1) as f64));
        segments.push(Rectangle::new(
            [(cursor, 0.35), (cursor + v, 0.65)],
            shade.filled(),
        ));
        cursor += v;
    }
    let mut cursor = expected;
    for (i, v) in negative.iter().enumerate() {
        let shade = BLUE.mix(1.0 - 0.5 * (i as f64 / negative.len().max(1) as f64));
        segments.push(Rectangle::new(
            [(cursor + v, 0.35), (cursor, 0.65)],
            shade.filled(),
        ));
        cursor += v;
    }
    chart.draw_series(segments).map_err(draw_err)?;

    chart
        .draw_series(LineSeries::new(
            vec![(expected, 0.2), (expected, 0.8)],
            BLACK.stroke_width(2),
        ))
        .map_err(draw_err)?;
    Ok(())
}

fn draw_decision(root: &Area<'_>, expected: f64, values: &[f64]) -> RenderResult<()> {
    let d = values.len();
    let mut path = Vec::with_capacity(d + 1);
    let mut acc = expected;
    path.push((acc, 0.0));
    for (i, v) in values.iter().enumerate() {
        acc += v;
        path.push((acc, (i + 1) as f64));
    }
    let min = path.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
    let max = path
        .iter()
        .map(|(x, _)| *x)
        .fold(f64::NEG_INFINITY, f64::max);
    let (x_min, x_max) = padded(min, max);

    let mut chart = ChartBuilder::on(root)
        .margin(24)
        .build_cartesian_2d(x_min..x_max, 0f64..d as f64)
        .map_err(draw_err)?;

    chart
        .draw_series(LineSeries::new(
            vec![(expected, 0.0), (expected, d as f64)],
            BLACK.stroke_width(1),
        ))
        .map_err(draw_err)?;
    chart
        .draw_series(LineSeries::new(path, RED.stroke_width(2)))
        .map_err(draw_err)?;
    Ok(())
}

/// Render a dataset-wide attribution summary: mean absolute contribution per
/// feature, strongest first
pub fn summary_chart(values: &Array2<f64>) -> RenderResult<Vec<u8>> {
    let (n, d) = values.dim();
    if n == 0 || d == 0 {
        return Err(RenderError::Empty(
            "attribution matrix is empty".to_string(),
        ));
    }
    let mut importance: Vec<f64> = (0..d)
        .map(|j| values.column(j).iter().map(|v| v.abs()).sum::<f64>() / n as f64)
        .collect();
    importance.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let max = importance.first().copied().unwrap_or(1.0);
    let (x_min, x_max) = padded(0.0, max);

    let mut buf = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(24)
            .build_cartesian_2d(x_min..x_max, 0f64..d as f64)
            .map_err(draw_err)?;
        chart
            .draw_series(importance.iter().enumerate().map(|(i, v)| {
                let y = (d - 1 - i) as f64;
                Rectangle::new([(0.0, y + 0.2), (*v, y + 0.8)], RED.mix(0.8).filled())
            }))
            .map_err(draw_err)?;
        root.present().map_err(draw_err)?;
    }
    encode_png(&buf, WIDTH, HEIGHT)
}

/// Render the query instance against its counterfactual rows, one bar group
/// per feature, values normalized per feature
pub fn comparison_chart(
    instance: &[f64],
    counterfactuals: &[Vec<f64>],
) -> RenderResult<Vec<u8>> {
    let d = instance.len();
    if d == 0 {
        return Err(RenderError::Empty("instance has no features".to_string()));
    }
    let series_count = counterfactuals.len() + 1;

    // Per-feature min/max over the instance and all counterfactuals
    let mut mins = instance.to_vec();
    let mut maxs = instance.to_vec();
    for row in counterfactuals {
        for j in 0..d.min(row.len()) {
            mins[j] = mins[j].min(row[j]);
            maxs[j] = maxs[j].max(row[j]);
        }
    }
    let normalize = |j: usize, v: f64| -> f64 {
        let span = maxs[j] - mins[j];
        if span > 0.0 {
            (v - mins[j]) / span
        } else {
            0.5
        }
    };

    let mut buf = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(24)
            .build_cartesian_2d(0f64..d as f64, 0f64..1.05f64)
            .map_err(draw_err)?;

        let band = 0.8 / series_count as f64;
        let mut bars = Vec::new();
        for j in 0..d {
            let base = j as f64 + 0.1;
            bars.push(Rectangle::new(
                [
                    (base, 0.0),
                    (base + band, normalize(j, instance[j]).max(0.02)),
                ],
                BLUE.filled(),
            ));
            for (s, row) in counterfactuals.iter().enumerate() {
                if j >= row.len() {
                    continue;
                }
                let x0 = base + band * (s + 1) as f64;
                let shade = RED.mix(1.0 - 0.4 * (s as f64 / series_count as f64));
                bars.push(Rectangle::new(
                    [(x0, 0.0), (x0 + band, normalize(j, row[j]).max(0.02))],
                    shade.filled(),
                ));
            }
        }
        chart.draw_series(bars).map_err(draw_err)?;
        root.present().map_err(draw_err)?;
    }
    encode_png(&buf, WIDTH, HEIGHT)
}
