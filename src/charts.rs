use plotters::prelude::{AreaSeries, BitMapBackend, IntoDrawingArea};
use plotters::style::{Color, BLUE, WHITE};

use crate::error::{Error, Result};

/// Renders the history of one logged scalar to `<dir>/<name>.png`.
pub fn metric_chart(dir: &str, name: &str, series: &[(u32, f64)]) -> Result<()> {
    if series.is_empty() {
        return Err(Error::validation(format!("no history recorded for {name}")));
    }

    let path = format!("{dir}/{name}.png");
    let root = BitMapBackend::new(path.as_str(), (1024, 768)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| Error::Chart(e.to_string()))?;

    let x_max = series.last().map(|(episode, _)| *episode).unwrap_or(0);
    let y_min = series
        .iter()
        .map(|(_, value)| *value)
        .fold(f64::INFINITY, f64::min)
        .min(0.0) as f32;
    let y_max = series
        .iter()
        .map(|(_, value)| *value)
        .fold(f64::NEG_INFINITY, f64::max)
        .max(1.0) as f32
        * 1.1;

    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_cartesian_2d(0..x_max + 1, y_min..y_max)
        .map_err(|e| Error::Chart(e.to_string()))?;

    chart
        .configure_mesh()
        .light_line_style(WHITE)
        .draw()
        .map_err(|e| Error::Chart(e.to_string()))?;

    chart
        .draw_series(
            AreaSeries::new(
                series
                    .iter()
                    .map(|(episode, value)| (*episode, *value as f32)),
                0.0,
                BLUE.mix(0.2),
            )
            .border_style(BLUE),
        )
        .map_err(|e| Error::Chart(e.to_string()))?;

    root.present().map_err(|e| Error::Chart(e.to_string()))?;

    Ok(())
}
