//! Walk-forward prediction backtester.
//!
//! # Usage
//!
//! ```bash
//! # Generate demo input files
//! prediction-backtest synthetic --hours 960 --output data
//!
//! # Run a backtest over the inputs
//! prediction-backtest run --predictions data/predictions.json --prices data/prices.json \
//!     --config config/default.toml
//!
//! # List stored reports
//! prediction-backtest history --reports results --limit 5
//!
//! # Inspect one window of a stored report
//! prediction-backtest window --report results/backtest_20240601T120000.000Z.json --id 3
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};

use prediction_backtest::backtest::{
    BacktestConfig, BacktestEngine, BacktestReport, JsonReportStore,
};
use prediction_backtest::data::{write_records, JsonFileSource, SyntheticConfig};
use prediction_backtest::metrics::MetricName;

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "prediction-backtest")]
#[command(about = "Walk-forward accuracy evaluation for price predictions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a walk-forward backtest over prediction and price files
    Run {
        /// JSON array of prediction records
        #[arg(long)]
        predictions: PathBuf,

        /// JSON array of price records
        #[arg(long)]
        prices: PathBuf,

        /// Path to configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Start of the range (YYYY-MM-DD or RFC 3339); defaults to the first prediction
        #[arg(long)]
        start: Option<String>,

        /// End of the range (YYYY-MM-DD or RFC 3339); defaults to the last prediction
        #[arg(long)]
        end: Option<String>,

        /// Training window in days
        #[arg(long)]
        train_days: Option<u32>,

        /// Test window in days
        #[arg(long)]
        test_days: Option<u32>,

        /// Alignment tolerance in minutes
        #[arg(long)]
        tolerance_minutes: Option<i64>,

        /// Output directory for reports
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Print the full report as JSON instead of the text summary
        #[arg(long)]
        json: bool,
    },

    /// Write deterministic demo input files
    Synthetic {
        /// Number of hourly points
        #[arg(long, default_value_t = 960)]
        hours: usize,

        /// First timestamp (YYYY-MM-DD or RFC 3339)
        #[arg(long, default_value = "2024-01-01")]
        start: String,

        /// Output directory
        #[arg(short, long, default_value = "data")]
        output: PathBuf,
    },

    /// List stored reports, newest first
    History {
        /// Report directory
        #[arg(long, default_value = "results")]
        reports: PathBuf,

        /// Maximum number of reports
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show one window of a stored report
    Window {
        /// Report file
        #[arg(long)]
        report: PathBuf,

        /// Window number (1-based)
        #[arg(long)]
        id: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("prediction_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            predictions,
            prices,
            config,
            start,
            end,
            train_days,
            test_days,
            tolerance_minutes,
            output,
            json,
        } => {
            let mut config = match config {
                Some(path) => BacktestConfig::from_toml_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => BacktestConfig::default(),
            };
            if let Some(days) = train_days {
                config.train_window_days = days;
            }
            if let Some(days) = test_days {
                config.test_window_days = days;
            }
            if let Some(minutes) = tolerance_minutes {
                config.alignment_tolerance_minutes = minutes;
            }
            config.validate().context("Invalid configuration")?;

            let source = Arc::new(JsonFileSource::new(predictions, prices));
            let (start, end) = resolve_range(&source, start, end).await?;
            let store = Arc::new(JsonReportStore::new(&output));
            let engine = BacktestEngine::new(config, source.clone(), source, store);

            let report = engine
                .run_backtest(start, end)
                .await
                .context("Backtest failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(report.as_ref())?);
            } else {
                print_report(&report);
            }
        }
        Commands::Synthetic {
            hours,
            start,
            output,
        } => {
            let start = parse_timestamp(&start, false).context("Invalid start date format")?;
            cmd_synthetic(&output, start, hours).await?;
        }
        Commands::History { reports, limit } => {
            cmd_history(reports, limit).await?;
        }
        Commands::Window { report, id } => {
            let report = JsonReportStore::load(&report)
                .await
                .with_context(|| format!("Failed to read report {}", report.display()))?;
            print_window(&report, id)?;
        }
    }

    Ok(())
}

/// Accepts RFC 3339 or a bare date. A bare end date covers the whole day.
fn parse_timestamp(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Expected YYYY-MM-DD or RFC 3339, got {:?}", value))?;
    let start = date.and_time(NaiveTime::MIN).and_utc();
    Ok(if end_of_day {
        start + Duration::days(1) - Duration::seconds(1)
    } else {
        start
    })
}

async fn resolve_range(
    source: &JsonFileSource,
    start: Option<String>,
    end: Option<String>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = start.map(|s| parse_timestamp(&s, false)).transpose()?;
    let end = end.map(|e| parse_timestamp(&e, true)).transpose()?;

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (start, end) => {
            let span = source
                .prediction_span()
                .await
                .context("Failed to read predictions")?;
            let Some((first, last)) = span else {
                bail!("Prediction file is empty; pass --start and --end explicitly");
            };
            (start.unwrap_or(first), end.unwrap_or(last))
        }
    };

    if end < start {
        bail!("End {} is before start {}", end, start);
    }
    Ok((start, end))
}

async fn cmd_synthetic(output: &Path, start: DateTime<Utc>, hours: usize) -> Result<()> {
    let data = prediction_backtest::data::generate(&SyntheticConfig::new(start, hours));

    let predictions_path = output.join("predictions.json");
    let prices_path = output.join("prices.json");
    write_records(&predictions_path, &data.predictions)
        .await
        .with_context(|| format!("Failed to write {}", predictions_path.display()))?;
    write_records(&prices_path, &data.prices)
        .await
        .with_context(|| format!("Failed to write {}", prices_path.display()))?;

    println!("Wrote {} predictions to {}", data.predictions.len(), predictions_path.display());
    println!("Wrote {} prices to {}", data.prices.len(), prices_path.display());
    Ok(())
}

async fn cmd_history(dir: PathBuf, limit: usize) -> Result<()> {
    let store = JsonReportStore::new(&dir);
    let reports = store
        .history(limit)
        .await
        .with_context(|| format!("Failed to read reports from {}", dir.display()))?;

    if reports.is_empty() {
        println!("No reports in {}", dir.display());
        return Ok(());
    }

    println!("{}", SEPARATOR);
    println!(
        "{:<26} {:<12} {:<12} {:>8} {:>10}",
        "Generated", "Start", "End", "Windows", "Dir. Acc."
    );
    println!("{}", SEPARATOR);
    for report in &reports {
        println!(
            "{:<26} {:<12} {:<12} {:>8} {:>9.1}%",
            report.generated_at.format("%Y-%m-%d %H:%M:%S"),
            report.start_date.date_naive(),
            report.end_date.date_naive(),
            report.window_count,
            report.aggregate.overall_directional_accuracy,
        );
    }
    Ok(())
}

fn print_report(report: &BacktestReport) {
    println!("{}", SEPARATOR);
    println!("{}", report.summary());
    println!("{}", SEPARATOR);
    println!("{}", report.aggregate.summary());
}

fn print_window(report: &BacktestReport, id: usize) -> Result<()> {
    let window = report.window(id)?;

    println!("{}", SEPARATOR);
    println!("Window {} of {}", window.window_id, report.window_count);
    println!(
        "  Train: {} to {} ({} points)",
        window.train_period.start, window.train_period.end, window.train_period.samples
    );
    println!(
        "  Test:  {} to {} ({} points)",
        window.test_period.start, window.test_period.end, window.test_period.samples
    );
    println!("{}", SEPARATOR);

    for name in MetricName::ALL {
        println!("  {:<26} {:>12.4}", name, window.metrics.get(name));
    }
    println!(
        "  Samples: {} for MAPE, {} directional comparisons",
        window.sample_counts.mape, window.sample_counts.directional
    );

    if !window.pillar_correlations.is_empty() {
        println!("\n  Pillar correlation with absolute error:");
        for (pillar, r) in &window.pillar_correlations {
            let coverage = window.pillar_coverage.get(pillar).copied().unwrap_or(0);
            println!(
                "    {:<20} {:>+7.3}  ({}/{} points)",
                pillar, r, coverage, window.test_period.samples
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use prediction_backtest::data::PredictionRecord;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bare_date_bounds() {
        let day = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01", false).unwrap(), day);
        assert_eq!(
            parse_timestamp("2024-03-01", true).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_rfc3339_is_used_as_given() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00+02:00", true).unwrap(), expected);
        assert!(parse_timestamp("03/01/2024", false).is_err());
    }

    #[tokio::test]
    async fn test_end_before_start_is_rejected() {
        // Both bounds given, so the files are never read.
        let source = JsonFileSource::new("/nonexistent/p.json", "/nonexistent/q.json");
        let err = resolve_range(&source, Some("2024-03-02".into()), Some("2024-03-01".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is before start"));

        // The same bare date covers its whole day.
        let (start, end) =
            resolve_range(&source, Some("2024-03-01".into()), Some("2024-03-01".into()))
                .await
                .unwrap();
        assert_eq!(end - start, Duration::days(1) - Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_missing_bounds_fall_back_to_prediction_span() {
        let dir = tempfile::tempdir().unwrap();
        let predictions_path = dir.path().join("predictions.json");
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let predictions: Vec<_> = (0..5)
            .map(|i| PredictionRecord::new(first + Duration::hours(i), dec!(100)))
            .collect();
        write_records(&predictions_path, &predictions).await.unwrap();
        let source = JsonFileSource::new(&predictions_path, dir.path().join("prices.json"));

        let (start, end) = resolve_range(&source, None, None).await.unwrap();
        assert_eq!(start, first);
        assert_eq!(end, first + Duration::hours(4));

        let (start, _) = resolve_range(&source, Some("2024-03-01T02:00:00Z".into()), None)
            .await
            .unwrap();
        assert_eq!(start, first + Duration::hours(2));

        let empty = dir.path().join("empty.json");
        write_records::<PredictionRecord>(&empty, &[]).await.unwrap();
        let source = JsonFileSource::new(&empty, dir.path().join("prices.json"));
        assert!(resolve_range(&source, None, None).await.is_err());
    }
}
