use std::error::Error;
use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::models::{Problem, Tour};
use crate::solver::RunReport;

const COLORS: [RGBColor; 7] = [RED, BLUE, GREEN, MAGENTA, CYAN, RGBColor(255, 140, 0), BLACK];

/// Plots every route of `tour` in its own colour. Customers are grey dots, charging stations
/// triangles and the depot a black square.
pub fn plot_solution(problem: &Problem, tour: &Tour, path: &Path) -> Result<(), Box<dyn Error>> {
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for node in &problem.nodes {
        min_x = min_x.min(node.x);
        max_x = max_x.max(node.x);
        min_y = min_y.min(node.y);
        max_y = max_y.max(node.y);
    }
    let margin = 0.05 * (max_x - min_x).max(max_y - min_y).max(1.0);
    min_x -= margin;
    max_x += margin;
    min_y -= margin;
    max_y += margin;

    let root = BitMapBackend::new(path, (800, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let caption = match tour.length() {
        Some(length) => format!("{} ({:.2})", problem.name, length),
        None => problem.name.clone(),
    };
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(min_x..max_x, min_y..max_y)?;
    chart.configure_mesh().draw()?;

    let at = |n: usize| (problem.nodes[n].x, problem.nodes[n].y);
    for (i, segment) in tour.segments(problem).into_iter().enumerate() {
        let color = COLORS[i % COLORS.len()];
        let points: Vec<(f64, f64)> = segment.iter().map(|&n| at(n)).collect();
        chart.draw_series(LineSeries::new(points, color.stroke_width(2)))?;
    }

    chart.draw_series(problem.customers().iter().map(|&c| {
        Circle::new(at(c), 3, ShapeStyle::from(&RGBColor(128, 128, 128)).filled())
    }))?;
    chart.draw_series(
        problem
            .stations()
            .iter()
            .map(|&s| TriangleMarker::new(at(s), 6, ShapeStyle::from(&GREEN).filled())),
    )?;
    let (dx, dy) = at(problem.depot);
    let half = margin / 4.0;
    chart.draw_series(std::iter::once(Rectangle::new(
        [(dx - half, dy - half), (dx + half, dy + half)],
        ShapeStyle::from(&BLACK).filled(),
    )))?;

    root.present()?;
    info!(path = %path.display(), "solution plot written");
    Ok(())
}

/// Plots best length against time for every trial.
pub fn plot_convergence(reports: &[RunReport], path: &Path) -> Result<(), Box<dyn Error>> {
    let points = reports.iter().flat_map(|r| r.trace.iter());
    let mut x_max: f64 = 0.0;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for point in points {
        x_max = x_max.max(point.seconds);
        y_min = y_min.min(point.best_length);
        y_max = y_max.max(point.best_length);
    }
    if !y_min.is_finite() || !y_max.is_finite() {
        return Ok(());
    }
    let x_max = reports
        .iter()
        .map(|r| r.elapsed_secs)
        .fold(x_max, f64::max)
        .max(0.01);
    let pad = ((y_max - y_min) * 0.05).max(1.0);

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Best tour length", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, (y_min - pad)..(y_max + pad))?;
    chart
        .configure_mesh()
        .x_desc("seconds")
        .y_desc("length")
        .draw()?;

    for (run, report) in reports.iter().enumerate() {
        let color = COLORS[run % COLORS.len()];
        // Hold the last best until the run ended.
        let mut series: Vec<(f64, f64)> = Vec::with_capacity(report.trace.len() * 2 + 1);
        for point in &report.trace {
            if let Some(&(_, previous)) = series.last() {
                series.push((point.seconds, previous));
            }
            series.push((point.seconds, point.best_length));
        }
        if let Some(&(_, last)) = series.last() {
            series.push((report.elapsed_secs, last));
        }
        chart.draw_series(LineSeries::new(series, &color))?;
    }

    root.present()?;
    info!(path = %path.display(), "convergence plot written");
    Ok(())
}
