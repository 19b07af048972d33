//! Diagnostic log-log plot of a fit, rendered to SVG.
//!
//! Layers, bottom to top: every retained candle (faint grey), bin averages
//! (red), smart-money bins (green with black rim), and the fitted line over
//! the smart-money range (blue).

use std::path::Path;

use anyhow::{anyhow, Result};
use plotters::prelude::*;

use impactlab_core::estimator::FitResult;

use crate::verdict::Verdict;

const SIZE: (u32, u32) = (1200, 800);
const RAW: RGBColor = RGBColor(204, 204, 204);
const LIME: RGBColor = RGBColor(50, 205, 50);

fn plot_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("plot rendering failed: {e}")
}

/// Padded `[min, max]` of a series.
fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 0.5 };
    (lo - pad)..(hi + pad)
}

/// Render `fit` for `ticker` to an SVG file at `path`.
pub fn render_fit_svg(ticker: &str, fit: &FitResult, verdict: Verdict, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let x_range = padded_range(fit.observations.iter().map(|p| p.log_q));
    let y_range = padded_range(fit.observations.iter().map(|p| p.log_i));

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!(
                "Market Impact Law: {ticker} | Status: {verdict} (R2={:.2})",
                fit.r2
            ),
            ("sans-serif", 26),
        )
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("ln(volume)")
        .y_desc("ln(high - low)")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(
            fit.observations
                .iter()
                .map(|p| Circle::new((p.log_q, p.log_i), 2, RAW.mix(0.25).filled())),
        )
        .map_err(plot_err)?
        .label("Raw candles")
        .legend(|(x, y)| Circle::new((x, y), 3, RAW.filled()));

    chart
        .draw_series(
            fit.bins
                .iter()
                .map(|b| Circle::new((b.log_q, b.log_i), 4, RED.filled())),
        )
        .map_err(plot_err)?
        .label("Binned average")
        .legend(|(x, y)| Circle::new((x, y), 4, RED.filled()));

    chart
        .draw_series(fit.smart_money.iter().map(|b| {
            EmptyElement::at((b.log_q, b.log_i))
                + Circle::new((0, 0), 7, LIME.filled())
                + Circle::new((0, 0), 7, BLACK.stroke_width(1))
        }))
        .map_err(plot_err)?
        .label("Smart money")
        .legend(|(x, y)| Circle::new((x, y), 6, LIME.filled()));

    let (start, end) = fit.fit_line();
    chart
        .draw_series(LineSeries::new(vec![start, end], BLUE.stroke_width(3)))
        .map_err(plot_err)?
        .label(format!("Fit (k={:.2})", fit.alpha))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(3)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    tracing::debug!(ticker, path = %path.display(), "plot written");
    Ok(())
}
