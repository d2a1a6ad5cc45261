use std::collections::HashMap;
use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use crate::signals::table::{is_missing, Column, ColumnData};
use crate::signals::SignalError;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesKind {
    Line,
    Scatter,
}
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub label: String,
    pub kind: SeriesKind,
    pub points: Vec<[f64; 2]>,
}
/// Toolkit-neutral figure, drawn by the GUI and exported by [`render_figure_png`].
#[derive(Clone, Debug, PartialEq)]
pub struct PlotFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}
impl PlotFigure {
    /// One line per sequence, indexed by sample position.
    pub fn sequences(title: &str, sequences: Vec<Vec<f64>>) -> Self {
        let many = sequences.len() > 1;
        let series = sequences
            .into_iter()
            .enumerate()
            .map(|(idx, values)| Series {
                label: if many { format!("{title}[{idx}]") } else { title.to_owned() },
                kind: SeriesKind::Line,
                points: indexed(values.into_iter().map(Some)),
            })
            .collect();
        Self {
            title: title.to_owned(),
            x_label: "Sample".into(),
            y_label: "Value".into(),
            series,
        }
    }
    /// Scatter of paired values when both columns are numeric, otherwise the
    /// y column alone in row order. Categorical values are drawn as their
    /// first-appearance ordinal.
    pub fn from_columns(x: &Column, y: &Column) -> Self {
        let series = match (&x.data, &y.data) {
            (ColumnData::Numeric(xs), ColumnData::Numeric(ys)) => Series {
                label: y.name.clone(),
                kind: SeriesKind::Scatter,
                points: xs
                    .iter()
                    .zip(ys)
                    .filter_map(|(x, y)| Some([(*x)?, (*y)?]))
                    .filter(|p| p[0].is_finite() && p[1].is_finite())
                    .collect(),
            },
            (_, ColumnData::Numeric(ys)) => Series {
                label: y.name.clone(),
                kind: SeriesKind::Line,
                points: indexed(ys.iter().copied()),
            },
            (_, ColumnData::Categorical(cells)) => Series {
                label: y.name.clone(),
                kind: SeriesKind::Line,
                points: indexed(ordinals(cells)),
            },
        };
        Self {
            title: format!("{} vs {}", y.name, x.name),
            x_label: x.name.clone(),
            y_label: y.name.clone(),
            series: vec![series],
        }
    }
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
    /// `(x range, y range)` over every point, or `None` when there are none.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let mut points = self.series.iter().flat_map(|s| s.points.iter());
        let first = points.next()?;
        let init = ([first[0], first[0]], [first[1], first[1]]);
        Some(points.fold(init, |(x, y), p| {
            ([x[0].min(p[0]), x[1].max(p[0])], [y[0].min(p[1]), y[1].max(p[1])])
        }))
    }
}
fn indexed(values: impl Iterator<Item = Option<f64>>) -> Vec<[f64; 2]> {
    values
        .enumerate()
        .filter_map(|(i, v)| Some([i as f64, v?]))
        .filter(|p| p[1].is_finite())
        .collect()
}
fn ordinals(cells: &[String]) -> impl Iterator<Item = Option<f64>> + '_ {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    cells.iter().map(move |cell| {
        if is_missing(cell) {
            return None;
        }
        let next = seen.len();
        Some(*seen.entry(cell.trim()).or_insert(next) as f64)
    })
}
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
    /// Caption, axis labels and legend; these need a system font.
    pub text: bool,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 500,
            background: WHITE,
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA, BLACK],
            text: true,
        }
    }
}
pub fn render_figure_png(figure: &PlotFigure, style: &PlotStyle) -> Result<Vec<u8>, SignalError> {
    let (x_range, y_range) = figure
        .bounds()
        .ok_or_else(|| SignalError::Plot("figure has no points".into()))?;
    let (x_range, y_range) = (padded(x_range), padded(y_range));
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if style.text {
            builder
                .caption(&figure.title, ("sans-serif", 20).into_font())
                .set_label_area_size(LabelAreaPosition::Left, 50)
                .set_label_area_size(LabelAreaPosition::Bottom, 40);
        }
        let mut chart = builder.build_cartesian_2d(x_range[0]..x_range[1], y_range[0]..y_range[1])?;
        if style.text {
            chart
                .configure_mesh()
                .x_desc(&figure.x_label)
                .y_desc(&figure.y_label)
                .light_line_style(&BLACK.mix(0.05))
                .draw()?;
        } else {
            chart
                .configure_mesh()
                .x_labels(0)
                .y_labels(0)
                .light_line_style(&BLACK.mix(0.05))
                .draw()?;
        }
        for (idx, series) in figure.series.iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            let points = series.points.iter().map(|p| (p[0], p[1]));
            let drawn = match series.kind {
                SeriesKind::Line => chart.draw_series(LineSeries::new(points, &color))?,
                SeriesKind::Scatter => chart.draw_series(
                    points.map(|p| Circle::new(p, 3, color.filled())),
                )?,
            };
            drawn
                .label(series.label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        if style.text && figure.series.len() > 1 {
            chart
                .configure_series_labels()
                .border_style(&BLACK.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
// Degenerate ranges get a unit margin so the axis is never empty.
fn padded(range: [f64; 2]) -> [f64; 2] {
    if (range[1] - range[0]).abs() < f64::EPSILON {
        [range[0] - 1.0, range[1] + 1.0]
    } else {
        range
    }
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, SignalError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| SignalError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
