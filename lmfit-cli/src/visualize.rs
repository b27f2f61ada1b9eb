use lmfit::{CurveFit, models::BuiltinModel, textual::Problem};
use plotters::{coord::types::RangedCoordf64, prelude::*};

const POINT_COLOR: RGBColor = RGBColor(0x58, 0x50, 0x8d);
const CURVE_COLOR: RGBColor = RGBColor(0xff, 0x63, 0x61);
const BAND_COLOR: RGBColor = RGBColor(0xbc, 0x50, 0x90);

use crate::Cli;

const LABEL_STYLE: (&str, i32) = ("sans-serif", 30);

/// How many straight segments approximate the fitted curve.
const CURVE_SAMPLES: usize = 400;

pub fn save_png(
    cli: &Cli,
    problem: &Problem,
    fit: &CurveFit<BuiltinModel>,
    output_path: String,
) -> anyhow::Result<()> {
    let chart_name = cli.chart_name();
    let points = points_from_problem(problem);
    let curve = sample_curve(fit, &points);
    let bounds = Bounds::new(&points, &curve);

    let width = 800;
    let height = 800;
    let dpi_scale = 2;
    let root = BitMapBackend::new(&output_path, (width * dpi_scale, height * dpi_scale))
        .into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .caption(chart_name, ("sans-serif", 50))
        .build_cartesian_2d(bounds.min_x..bounds.max_x, bounds.min_y..bounds.max_y)?;

    draw_axes(&mut chart)?;
    draw_band(&mut chart, &curve)?;
    draw_curve(&mut chart, &curve)?;
    for pt in points {
        draw_point(&mut chart, pt)?;
    }

    // Finished.
    root.present()?;
    println!("Plot saved to {output_path}");
    Ok(())
}

struct PointToDraw {
    x: f64,
    y: f64,
    sigma: Option<f64>,
}

fn points_from_problem(problem: &Problem) -> Vec<PointToDraw> {
    problem
        .x
        .iter()
        .zip(&problem.y)
        .enumerate()
        .map(|(i, (&x, &y))| PointToDraw {
            x,
            y,
            sigma: problem.sigma.as_ref().map(|s| s[i]),
        })
        .collect()
}

/// One sample of the fitted curve, with its 1σ uncertainty.
struct CurveSample {
    x: f64,
    y: f64,
    sigma: f64,
}

fn sample_curve(fit: &CurveFit<BuiltinModel>, points: &[PointToDraw]) -> Vec<CurveSample> {
    let min_x = points.iter().map(|p| p.x).reduce(f64::min).unwrap_or(0.0);
    let max_x = points.iter().map(|p| p.x).reduce(f64::max).unwrap_or(0.0);
    (0..=CURVE_SAMPLES)
        .map(|i| {
            let t = i as f64 / CURVE_SAMPLES as f64;
            let x = min_x + (max_x - min_x) * t;
            CurveSample {
                x,
                y: fit.value_at(x),
                sigma: fit.variance_at(x).max(0.0).sqrt(),
            }
        })
        .filter(|s| s.y.is_finite() && s.sigma.is_finite())
        .collect()
}

/// Span of the chart area
struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    pub fn new(points: &[PointToDraw], curve: &[CurveSample]) -> Self {
        // Get the furthest X and Y component in each direction,
        // so we can establish the span of the graph.
        let mut xs = Vec::with_capacity(points.len() + curve.len());
        let mut ys = Vec::with_capacity(2 * (points.len() + curve.len()));
        for pt in points {
            let sigma = pt.sigma.unwrap_or(0.0);
            xs.push(pt.x);
            ys.push(pt.y - sigma);
            ys.push(pt.y + sigma);
        }
        for sample in curve {
            xs.push(sample.x);
            ys.push(sample.y - sample.sigma);
            ys.push(sample.y + sample.sigma);
        }
        let min_x = xs.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let max_x = xs.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let min_y = ys.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let max_y = ys.iter().copied().reduce(f64::max).unwrap_or(0.0);
        // Pad by a tenth of the span, or by 1 if all the data sits on one value.
        let pad_x = padding(max_x - min_x);
        let pad_y = padding(max_y - min_y);
        Self {
            min_x: min_x - pad_x,
            max_x: max_x + pad_x,
            min_y: min_y - pad_y,
            max_y: max_y + pad_y,
        }
    }
}

fn padding(span: f64) -> f64 {
    if span > 0.0 { 0.1 * span } else { 1.0 }
}

fn draw_axes<DB: DrawingBackend>(
    chart: &mut ChartContext<DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
) -> anyhow::Result<()>
where
    <DB as plotters::prelude::DrawingBackend>::ErrorType: 'static,
{
    chart
        .configure_mesh()
        .label_style(LABEL_STYLE) // axis labels
        .axis_desc_style(LABEL_STYLE) // x/y axis captions
        .x_desc("x")
        .y_desc("y")
        .draw()?;
    Ok(())
}

/// Shades the region within one standard deviation of the fitted curve.
fn draw_band<DB: DrawingBackend>(
    chart: &mut ChartContext<DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    curve: &[CurveSample],
) -> anyhow::Result<()>
where
    <DB as plotters::prelude::DrawingBackend>::ErrorType: 'static,
{
    let upper = curve.iter().map(|s| (s.x, s.y + s.sigma));
    let lower = curve.iter().rev().map(|s| (s.x, s.y - s.sigma));
    let outline: Vec<_> = upper.chain(lower).collect();
    chart.draw_series(std::iter::once(Polygon::new(
        outline,
        BAND_COLOR.mix(0.2).filled(),
    )))?;
    Ok(())
}

fn draw_curve<DB: DrawingBackend>(
    chart: &mut ChartContext<DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    curve: &[CurveSample],
) -> anyhow::Result<()>
where
    <DB as plotters::prelude::DrawingBackend>::ErrorType: 'static,
{
    chart.draw_series(LineSeries::new(
        curve.iter().map(|s| (s.x, s.y)),
        CURVE_COLOR.stroke_width(3),
    ))?;
    Ok(())
}

fn draw_point<DB: DrawingBackend>(
    chart: &mut ChartContext<DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    point: PointToDraw,
) -> anyhow::Result<()>
where
    <DB as plotters::prelude::DrawingBackend>::ErrorType: 'static,
{
    if let Some(sigma) = point.sigma {
        chart.draw_series(std::iter::once(ErrorBar::new_vertical(
            point.x,
            point.y - sigma,
            point.y,
            point.y + sigma,
            POINT_COLOR.stroke_width(2),
            10,
        )))?;
    }
    chart.draw_series(PointSeries::of_element(
        vec![(point.x, point.y)],
        5,
        &POINT_COLOR,
        &|coord, size, style| {
            EmptyElement::at(coord) + plotters::prelude::Circle::new((0, 0), size, style.filled())
        },
    ))?;
    Ok(())
}
