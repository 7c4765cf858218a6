//! ficp-runner: headless daily generator for the FICP data lake.
//!
//! Usage:
//!   ficp-runner --date 2024-03-01 [--overwrite]
//!   ficp-runner --from 2023-01-01 --to 2024-12-31 --skip-weekends
//!   ficp-runner --sqlite lake.db --from 2024-01-01 --to 2024-01-31
//!   ficp-runner --validate
//!
//! Common flags: --lake DIR (default ./ficp_data_lake), --sqlite FILE,
//! --config FILE (default ./data/ficp_config.json when present), --json.

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use chrono::NaiveDate;
use ficp_core::{
    config::SimConfig,
    engine::{BatchReport, DailySimulator, DayOutcome, RunOptions},
    store::{FsStore, ObjectStore, SqliteStore},
    validate::{validate_lake, ValidationReport},
};

const DEFAULT_CONFIG: &str = "./data/ficp_config.json";

fn main() -> Result<ExitCode> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let overwrite = has_flag(&args, "--overwrite");
    let skip_weekends = has_flag(&args, "--skip-weekends");
    let json = has_flag(&args, "--json");
    let lake = find_arg(&args, "--lake").unwrap_or("./ficp_data_lake");

    let config = match find_arg(&args, "--config") {
        Some(path) => SimConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => SimConfig::load(DEFAULT_CONFIG)?,
        None => SimConfig::default(),
    };

    log::debug!("config: {config:?}");

    let store: Box<dyn ObjectStore> = match find_arg(&args, "--sqlite") {
        Some(path) => {
            let store = SqliteStore::open(path)?;
            store.migrate()?;
            Box::new(store)
        }
        None => Box::new(FsStore::new(lake)),
    };

    if has_flag(&args, "--validate") {
        let report = validate_lake(store.as_ref(), &config)?;
        print_validation(&report, json)?;
        return Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let today = chrono::Local::now().date_naive();
    let (start, end) = match (parse_date_arg(&args, "--from")?, parse_date_arg(&args, "--to")?) {
        (Some(from), Some(to)) => (from, to),
        (Some(from), None) => (from, from),
        (None, Some(to)) => (to, to),
        (None, None) => {
            let day = parse_date_arg(&args, "--date")?.unwrap_or(today);
            (day, day)
        }
    };
    if start > end {
        anyhow::bail!("--from {start} is after --to {end}");
    }

    let simulator = DailySimulator::new(config, store.as_ref())?;
    if !json {
        println!("FICP daily generator");
        println!("  store:      {}", store.describe());
        println!("  seed:       {}", simulator.config().master_seed);
        println!("  days:       {start} ..= {end}");
        println!("  overwrite:  {overwrite}");
        println!("  weekends:   {}", if skip_weekends { "skipped" } else { "generated" });
        println!();
    }

    let options = RunOptions {
        overwrite,
        skip_weekends,
    };
    // Interruption between days is supported by the library; the runner
    // itself always runs the range to completion.
    let cancel = AtomicBool::new(false);
    let report = simulator.run_range(start, end, &options, &cancel);

    print_batch(&report, json)?;
    Ok(if report.failed() == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_batch(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("=== RUN SUMMARY ===");
    println!("  run_id:   {}", report.run_id);
    for outcome in &report.days {
        match outcome {
            DayOutcome::Written(r) => println!(
                "  {} | inscriptions {:>3} sched + {:>3} direct | surveillances {:>3} | strike-offs {:>3} | consultations {:>4}",
                r.day,
                r.scheduled_inscriptions,
                r.direct_inscriptions,
                r.new_surveillances,
                r.strike_offs,
                r.consultations
            ),
            DayOutcome::Skipped { day, reason } => println!("  {day} | skipped ({reason})"),
            DayOutcome::Conflict { day, name } => {
                println!("  {day} | EXISTS: {name} (use --overwrite to regenerate)")
            }
            DayOutcome::Failed { day, error } => println!("  {day} | FAILED: {error}"),
        }
    }
    println!("  written:  {}", report.written());
    println!("  failed:   {}", report.failed());
    if report.interrupted {
        println!("  (interrupted; re-run from the first missing day, see --validate)");
    }
    Ok(())
}

fn print_validation(report: &ValidationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("VALIDATION: {}", if report.is_clean() { "PASS" } else { "FAIL" });
    println!("  files checked: {}", report.files_checked);
    for v in report.violations.iter().take(50) {
        println!(
            "  - {} [{:?}] {}: {}",
            v.object,
            v.rule,
            v.entity_key.as_deref().unwrap_or("-"),
            v.detail
        );
    }
    if report.violations.len() > 50 {
        println!("  ... {} more", report.violations.len() - 50);
    }
    if let Some(first) = report.missing_days.first() {
        println!(
            "  missing days: {} (first: {}{})",
            report.missing_days.len(),
            first.dataset,
            first.day
        );
    }
    Ok(())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn find_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_date_arg(args: &[String], flag: &str) -> Result<Option<NaiveDate>> {
    find_arg(args, flag)
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| anyhow::anyhow!("{flag}: invalid date '{s}', expected YYYY-MM-DD"))
        })
        .transpose()
}
