use std::io::Cursor;
use std::ops::Range;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::drivers::error::StreamError;
use crate::drivers::WindowFrame;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: vec![
                RGBColor(255, 107, 220),
                RGBColor(0, 229, 255),
                RGBColor(255, 20, 147),
                RGBColor(147, 112, 219),
                RGBColor(65, 105, 225),
                GREEN,
                YELLOW,
                WHITE,
            ],
        }
    }
}
/// History of one smoothed scalar, `(timestamp, value)` pairs.
#[derive(Clone, Debug, Default)]
pub struct ScalarTrend {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}
struct Series<'a> {
    label: &'a str,
    points: Vec<(f64, f64)>,
}
/// Every channel of the window against its timestamps.
pub fn render_window_png(frame: &WindowFrame, style: PlotStyle) -> Result<Vec<u8>, StreamError> {
    if frame.is_empty() {
        return Err(StreamError::Plot("window has no samples".into()));
    }
    let series: Vec<Series> = frame
        .values
        .iter()
        .zip(&frame.channel_labels)
        .map(|(column, label)| Series {
            label,
            points: frame.timestamps.iter().copied().zip(column.iter().copied()).collect(),
        })
        .collect();
    render_series("EEG Power Bands", &series, style)
}
/// Scalar histories over time, e.g. attention vs meditation.
pub fn render_trend_png(
    caption: &str,
    trends: &[ScalarTrend],
    style: PlotStyle,
) -> Result<Vec<u8>, StreamError> {
    if trends.iter().all(|t| t.points.is_empty()) {
        return Err(StreamError::Plot("no scalar history to plot".into()));
    }
    let series: Vec<Series> = trends
        .iter()
        .map(|t| Series {
            label: &t.label,
            points: t.points.clone(),
        })
        .collect();
    render_series(caption, &series, style)
}
fn bounds(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        0.0..1.0
    } else if (max - min).abs() < f64::EPSILON {
        (min - 1.0)..(max + 1.0)
    } else {
        min..max
    }
}
fn render_series(caption: &str, series: &[Series], style: PlotStyle) -> Result<Vec<u8>, StreamError> {
    let palette = if style.palette.is_empty() {
        PlotStyle::default().palette
    } else {
        style.palette.clone()
    };
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let x_range = bounds(series.iter().flat_map(|s| s.points.iter().map(|p| p.0)));
        let y_range = bounds(series.iter().flat_map(|s| s.points.iter().map(|p| p.1)));
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(caption, ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x_range, y_range)?;
        chart
            .configure_mesh()
            .light_line_style(&WHITE.mix(0.1))
            .draw()?;
        for (idx, s) in series.iter().enumerate() {
            let color = palette[idx % palette.len()];
            chart
                .draw_series(LineSeries::new(s.points.iter().copied(), &color))?
                .label(s.label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        chart
            .configure_series_labels()
            .border_style(&WHITE.mix(0.2))
            .background_style(&style.background)
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, StreamError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| StreamError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
