//! Reporting and export: console summary, JSON report, bin table CSV.
//!
//! Persisted reports carry a `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use impactlab_core::estimator::FitResult;

use crate::analysis::{ImpactReport, SCHEMA_VERSION};

// ─── Console ────────────────────────────────────────────────────────

/// Human-readable summary block for one fitted ticker.
pub fn format_summary(report: &ImpactReport) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(&format!("=== {} ===\n", report.ticker));
    out.push_str(&format!("  Alpha (slope): {:.4}\n", report.alpha));
    out.push_str(&format!("  R^2:           {:.4}\n", report.r2));
    out.push_str(&format!("  Verdict:       {}\n", report.verdict));
    out.push_str(&format!(
        "  Bins:          {} of {} requested ({}), {} smart money\n",
        report.bin_count, report.requested_bins, report.binning, report.smart_money_count
    ));
    out.push_str(&format!(
        "  Candles:       {} ({} with non-zero range)\n",
        report.candle_count, report.observation_count
    ));
    if report.synthetic {
        out.push_str("  Data:          SYNTHETIC\n");
    }
    out
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize an `ImpactReport` to pretty JSON.
pub fn export_json(report: &ImpactReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ImpactReport to JSON")
}

/// Deserialize an `ImpactReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ImpactReport> {
    let report: ImpactReport =
        serde_json::from_str(json).context("failed to deserialize ImpactReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the bin table as CSV.
///
/// Columns: index, lower, upper, count, log_q, log_i, smart_money
pub fn export_bins_csv(report: &ImpactReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "index",
        "lower",
        "upper",
        "count",
        "log_q",
        "log_i",
        "smart_money",
    ])?;

    for bin in &report.bins {
        let smart = report.smart_money.iter().any(|s| s.index == bin.index);
        wtr.write_record([
            &bin.index.to_string(),
            &format!("{:.6}", bin.lower),
            &format!("{:.6}", bin.upper),
            &bin.count.to_string(),
            &format!("{:.6}", bin.log_q),
            &format!("{:.6}", bin.log_i),
            &smart.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one ticker.
///
/// Creates `{output_dir}/{TICKER}/` containing:
/// - `report.json`: the full `ImpactReport`
/// - `bins.csv`: the bin table
/// - `impact.svg`: diagnostic plot, when `plot` is set and the `plot`
///   feature is enabled
///
/// Existing files are overwritten. Returns the ticker directory.
pub fn save_artifacts(
    report: &ImpactReport,
    fit: &FitResult,
    output_dir: &Path,
    plot: bool,
) -> Result<PathBuf> {
    let dir = output_dir.join(&report.ticker);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    let json = export_json(report)?;
    std::fs::write(dir.join("report.json"), json)
        .with_context(|| format!("failed to write {}/report.json", dir.display()))?;

    let bins_csv = export_bins_csv(report)?;
    std::fs::write(dir.join("bins.csv"), bins_csv)
        .with_context(|| format!("failed to write {}/bins.csv", dir.display()))?;

    if plot {
        write_plot(report, fit, &dir)?;
    }

    tracing::info!(ticker = %report.ticker, dir = %dir.display(), "artifacts saved");
    Ok(dir)
}

#[cfg(feature = "plot")]
fn write_plot(report: &ImpactReport, fit: &FitResult, dir: &Path) -> Result<()> {
    crate::plot::render_fit_svg(&report.ticker, fit, report.verdict, &dir.join("impact.svg"))
}

#[cfg(not(feature = "plot"))]
fn write_plot(report: &ImpactReport, _fit: &FitResult, _dir: &Path) -> Result<()> {
    tracing::warn!(ticker = %report.ticker, "built without the `plot` feature, skipping plot");
    Ok(())
}

/// Load an `ImpactReport` from a ticker's artifact directory.
pub fn load_report(dir: &Path) -> Result<ImpactReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
