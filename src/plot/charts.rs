//! SVG charts rendered with Plotters.
//!
//! Charts are described as data (`Panel`s holding `Series`) and rendered in one
//! call, so the analysis code only prepares points and never touches Plotters.

use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::AppError;

pub const BLUE_POINTS: RGBColor = RGBColor(31, 119, 180);
pub const ORANGE_POINTS: RGBColor = RGBColor(255, 127, 14);
pub const GREEN_LINE: RGBColor = RGBColor(44, 160, 44);
pub const RED_LINE: RGBColor = RGBColor(214, 39, 40);
pub const GREY_LINE: RGBColor = RGBColor(127, 127, 127);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    /// Filled circles.
    Points,
    /// Circles with vertical error bars.
    ErrorBars,
    /// Connected line through the points.
    Line,
}

/// One data series. Points are `(x, y, y_err)`; `y_err` is ignored unless the
/// series draws error bars.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: Option<String>,
    pub points: Vec<(f64, f64, f64)>,
    pub color: RGBColor,
    pub kind: SeriesKind,
}

impl Series {
    pub fn new(kind: SeriesKind, color: RGBColor, points: Vec<(f64, f64, f64)>) -> Self {
        Self {
            label: None,
            points,
            color,
            kind,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn finite_points(&self) -> impl Iterator<Item = &(f64, f64, f64)> {
        self.points.iter().filter(|(x, y, _)| x.is_finite() && y.is_finite())
    }
}

/// Scatter/line panel.
#[derive(Debug, Clone, Default)]
pub struct XyPanel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
    /// Horizontal reference lines.
    pub hlines: Vec<(f64, RGBColor)>,
    /// Vertical markers (instrument changes and similar).
    pub vlines: Vec<(f64, RGBColor)>,
    /// Shaded horizontal band `(low, high)`.
    pub band: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct HistogramPanel {
    pub title: String,
    pub x_label: String,
    pub values: Vec<f64>,
    pub bins: usize,
    pub vlines: Vec<(f64, RGBColor)>,
}

#[derive(Debug, Clone)]
pub enum Panel {
    Xy(XyPanel),
    Histogram(HistogramPanel),
}

/// Padded axis range covering `values`; a fallback unit range when nothing
/// finite is present.
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    let span = hi - lo;
    let pad = if span > 0.0 { span * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - pad)..(hi + pad)
}

impl XyPanel {
    fn x_range(&self) -> Range<f64> {
        let xs = self.series.iter().flat_map(|s| s.finite_points().map(|p| p.0));
        padded_range(xs.chain(self.vlines.iter().map(|v| v.0)))
    }

    fn y_range(&self) -> Range<f64> {
        let ys = self.series.iter().flat_map(|s| {
            let with_err = s.kind == SeriesKind::ErrorBars;
            s.finite_points().flat_map(move |&(_, y, e)| {
                let e = if with_err && e.is_finite() { e } else { 0.0 };
                [y - e, y + e]
            })
        });
        let extra = self.hlines.iter().map(|h| h.0);
        let band = self.band.iter().flat_map(|&(lo, hi)| [lo, hi]);
        padded_range(ys.chain(extra).chain(band))
    }
}

/// Counts of `values` in `bins` equal-width bins spanning their range.
pub fn histogram_counts(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }
    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, n)| (lo + i as f64 * width, lo + (i + 1) as f64 * width, n))
        .collect()
}

type DrawResult<DB> = Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

fn draw_xy<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, panel: &XyPanel) -> DrawResult<DB> {
    let (x_range, y_range) = (panel.x_range(), panel.y_range());
    let (x0, x1) = (x_range.start, x_range.end);
    let (y0, y1) = (y_range.start, y_range.end);
    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 16))
        .margin(8)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .x_labels(6)
        .y_labels(6)
        .draw()?;

    // 1) Background band and reference lines.
    if let Some((lo, hi)) = panel.band {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x0, lo), (x1, hi)],
            GREY_LINE.mix(0.2).filled(),
        )))?;
    }
    for &(y, color) in &panel.hlines {
        chart.draw_series(LineSeries::new([(x0, y), (x1, y)], &color))?;
    }
    for &(x, color) in &panel.vlines {
        chart.draw_series(LineSeries::new([(x, y0), (x, y1)], &color))?;
    }

    // 2) Data.
    let mut any_label = false;
    for series in &panel.series {
        let color = series.color;
        let points: Vec<(f64, f64, f64)> = series.finite_points().copied().collect();
        let anno = match series.kind {
            SeriesKind::Line => chart.draw_series(LineSeries::new(points.iter().map(|p| (p.0, p.1)), &color))?,
            SeriesKind::Points => {
                chart.draw_series(points.iter().map(|p| Circle::new((p.0, p.1), 3, color.filled())))?
            }
            SeriesKind::ErrorBars => {
                chart.draw_series(
                    points
                        .iter()
                        .filter(|p| p.2.is_finite())
                        .map(|p| ErrorBar::new_vertical(p.0, p.1 - p.2, p.1, p.1 + p.2, color.filled(), 4)),
                )?;
                chart.draw_series(points.iter().map(|p| Circle::new((p.0, p.1), 3, color.filled())))?
            }
        };
        if let Some(label) = &series.label {
            any_label = true;
            anno.label(label.as_str())
                .legend(move |(x, y)| Circle::new((x + 8, y), 3, color.filled()));
        }
    }
    if any_label {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_histogram<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, panel: &HistogramPanel) -> DrawResult<DB> {
    let counts = histogram_counts(&panel.values, panel.bins);
    let x_range = padded_range(
        counts
            .iter()
            .flat_map(|c| [c.0, c.1])
            .chain(panel.vlines.iter().map(|v| v.0)),
    );
    let top = counts.iter().map(|c| c.2).max().unwrap_or(1).max(1) as f64;
    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 16))
        .margin(8)
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(x_range, 0.0..top * 1.1)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc("Count")
        .draw()?;

    chart.draw_series(
        counts
            .iter()
            .map(|&(lo, hi, n)| Rectangle::new([(lo, 0.0), (hi, n as f64)], BLUE_POINTS.mix(0.6).filled())),
    )?;
    for &(x, color) in &panel.vlines {
        chart.draw_series(LineSeries::new([(x, 0.0), (x, top * 1.1)], &color))?;
    }
    Ok(())
}

/// Render `panels` into a `rows` x `cols` grid and write an SVG file.
///
/// Panels fill the grid row by row; extra cells stay blank.
pub fn render_panels(path: &Path, panels: &[Panel], rows: usize, cols: usize, size: (u32, u32)) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    let plot_err = |e: DrawingAreaErrorKind<std::io::Error>| {
        AppError::new(2, format!("Failed to draw plot '{}': {e}", path.display()))
    };

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let cells = root.split_evenly((rows.max(1), cols.max(1)));
    for (panel, cell) in panels.iter().zip(cells.iter()) {
        match panel {
            Panel::Xy(p) => draw_xy(cell, p).map_err(plot_err)?,
            Panel::Histogram(h) => draw_histogram(cell, h).map_err(plot_err)?,
        }
    }
    root.present().map_err(plot_err)
}
