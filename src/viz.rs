//! Visualization of cluster results using Plotters.
//!
//! The scatter plot intentionally shows only the GWA/income plane even
//! though clustering runs in more dimensions; it matches what the
//! dashboard displays.

use plotters::prelude::*;

use crate::engine::ClusterView;
use crate::error::SegmentError;
use crate::Result;

/// Color palette for clusters; wraps around for k beyond the palette.
const CLUSTER_COLORS: [RGBColor; 10] = [
    RED,
    BLUE,
    GREEN,
    MAGENTA,
    CYAN,
    RGBColor(255, 140, 0),   // orange
    RGBColor(128, 0, 128),   // purple
    RGBColor(139, 69, 19),   // brown
    RGBColor(0, 128, 128),   // teal
    RGBColor(105, 105, 105), // gray
];

fn cluster_color(cluster: Option<usize>) -> RGBColor {
    match cluster {
        Some(c) => CLUSTER_COLORS[c % CLUSTER_COLORS.len()],
        None => BLACK, // unclustered
    }
}

/// Scatter plot of students on the GWA (x) / income (y) plane, colored by
/// cluster, with centroid markers.
pub fn render_cluster_plot(view: &ClusterView, output_path: &str) -> Result<()> {
    if view.plot.is_empty() {
        return Err(SegmentError::computation("no plottable points"));
    }

    let xs: Vec<f64> = view.plot.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = view.plot.iter().map(|p| p.y).collect();

    let x_min = xs.iter().fold(f64::INFINITY, |a, &b| a.min(b)) - 2.0;
    let x_max = xs.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)) + 2.0;
    let y_min = (ys.iter().fold(f64::INFINITY, |a, &b| a.min(b)) * 0.9).max(0.0);
    let y_max = ys.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)) * 1.1;

    let root = BitMapBackend::new(output_path, (900, 650)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| SegmentError::computation(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Student Clusters (k={})", view.k),
            ("sans-serif", 30),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| SegmentError::computation(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc("GWA")
        .y_desc("Monthly Household Income (PHP)")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(|e| SegmentError::computation(e.to_string()))?;

    for point in &view.plot {
        let color = cluster_color(point.cluster);
        chart
            .draw_series(std::iter::once(Circle::new(
                (point.x, point.y),
                4,
                color.filled(),
            )))
            .map_err(|e| SegmentError::computation(e.to_string()))?;
    }

    // Centroids as larger hollow squares in the same palette.
    for (cluster, &(cx, cy)) in view.centroids.iter().enumerate() {
        let color = cluster_color(Some(cluster));
        let [lower, upper] = centroid_marker(cx, cy, x_max - x_min, y_max - y_min);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [lower, upper],
                color.stroke_width(3),
            )))
            .map_err(|e| SegmentError::computation(e.to_string()))?;
    }

    root.present()
        .map_err(|e| SegmentError::computation(e.to_string()))?;
    Ok(())
}

/// Bar chart of cluster sizes (including the unclustered bucket when it is
/// non-empty).
pub fn render_cluster_sizes(view: &ClusterView, output_path: &str) -> Result<()> {
    let mut sizes: Vec<(String, usize)> = view
        .clusters
        .iter()
        .map(|(c, members)| (format!("C{c}"), members.len()))
        .collect();
    if !view.unclustered.is_empty() {
        sizes.push(("Uncl.".to_string(), view.unclustered.len()));
    }
    if sizes.is_empty() {
        return Err(SegmentError::computation("no clusters to chart"));
    }

    let max_size = sizes.iter().map(|(_, n)| *n).max().unwrap_or(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| SegmentError::computation(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cluster Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..(sizes.len() as f64), 0f64..(max_size * 1.1))
        .map_err(|e| SegmentError::computation(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc("Cluster")
        .y_desc("Number of Students")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(|e| SegmentError::computation(e.to_string()))?;

    for (i, (_, size)) in sizes.iter().enumerate() {
        let color = CLUSTER_COLORS[i % CLUSTER_COLORS.len()];
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, *size as f64)],
                color.filled(),
            )))
            .map_err(|e| SegmentError::computation(e.to_string()))?;
    }

    root.present()
        .map_err(|e| SegmentError::computation(e.to_string()))?;
    Ok(())
}

/// Marker extent proportional to the plotted axis ranges, so the rectangle
/// keeps a visible size even for a centroid sitting at zero income.
fn centroid_marker(cx: f64, cy: f64, x_span: f64, y_span: f64) -> [(f64, f64); 2] {
    let dx = x_span * 0.012;
    let dy = y_span * 0.015;
    [(cx - dx, cy - dy), (cx + dx, cy + dy)]
}

/// Render both charts next to each other: `<path>.png` and `<path>_sizes.png`.
pub fn render_report(view: &ClusterView, base_output_path: &str) -> Result<()> {
    render_cluster_plot(view, base_output_path)?;
    let sizes_path = base_output_path.replace(".png", "_sizes.png");
    render_cluster_sizes(view, &sizes_path)?;
    Ok(())
}
