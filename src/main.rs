use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

use helio_intake::{
    run_intake, run_monitor, DataMode, IntakeConfig, IntakeOutcome, MonitorOutcome, Severity,
    StreakStatus, VERSION,
};

const DEFAULT_CONFIG_FILE: &str = "config_thresholds.json";
const DEFAULT_DATA_DIR: &str = "data";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Exit 0 covers every completed run, recovery included; non-zero is
    // reserved for fatal environment failures
    match run() {
        Ok(()) => {}
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal error, aborting run");
            eprintln!("✗ FATAL: {e:#}");
            process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("intake") => {
            let input = match args.get(2) {
                Some(path) => PathBuf::from(path),
                None => {
                    print_usage();
                    process::exit(2);
                }
            };
            let config_path = args
                .get(3)
                .cloned()
                .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
            run_intake_command(&input, Path::new(&config_path))
        }
        Some("monitor") => {
            let data_dir = args
                .get(2)
                .cloned()
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
            let config_path = args
                .get(3)
                .cloned()
                .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
            run_monitor_command(Path::new(&data_dir), Path::new(&config_path))
        }
        _ => {
            print_usage();
            process::exit(2);
        }
    }
}

fn print_usage() {
    eprintln!("helio-intake v{}", VERSION);
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  helio-intake intake <measurements.csv> [config.json]");
    eprintln!("  helio-intake monitor [data-dir] [config.json]");
}

fn run_intake_command(input: &Path, config_path: &Path) -> Result<()> {
    println!("🛰️  Measurement Intake - profile, validate, audit");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = IntakeConfig::load_or_default(config_path);

    println!("\n📂 Processing {}...", input.display());
    let outcome = run_intake(input, &config)?;
    print_intake_summary(&outcome);

    Ok(())
}

fn print_intake_summary(outcome: &IntakeOutcome) {
    if outcome.recovered {
        println!(
            "⚠ Input was {} - placeholder data generated and processed",
            outcome.source_state.name()
        );
    }

    let audit = &outcome.audit;
    println!(
        "✓ {} rows x {} columns, hash {}...{}",
        audit.row_count,
        audit.column_count,
        &audit.input_file_hash[..8],
        &audit.input_file_hash[audit.input_file_hash.len() - 8..]
    );
    println!("✓ {}", audit.report.summary());

    for message in &audit.report.messages {
        let marker = match message.severity {
            Severity::Info => "✓",
            Severity::Warning => "⚠",
            Severity::Error => "✗",
        };
        println!("  {} {}", marker, message.text);
    }

    println!("\n💾 Audit capsule {} appended", audit.capsule_id);

    if outcome.events.is_empty() {
        println!("✓ No event rules triggered");
    } else {
        println!("⚡ {} event capsule(s):", outcome.events.len());
        for event in &outcome.events {
            println!(
                "  - {} @ {} ({})",
                event.event_type, event.triggering_row_timestamp, event.rule_expression
            );
        }
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if audit.report.passed() {
        println!("✓ Validation PASSED (quality {:.1}%)", audit.quality_score * 100.0);
    } else {
        println!(
            "⚠ Validation FAILED (quality {:.1}%) - advisory only, capsule persisted",
            audit.quality_score * 100.0
        );
    }
}

fn run_monitor_command(data_dir: &Path, config_path: &Path) -> Result<()> {
    println!("🛰️  Heartbeat Monitor - resilient ingest + streak analysis");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = IntakeConfig::load_or_default(config_path);
    let outcome = run_monitor(data_dir, &config)?;
    print_monitor_summary(&outcome);

    Ok(())
}

fn print_monitor_summary(outcome: &MonitorOutcome) {
    let summary = &outcome.summary;

    for source in &summary.sources {
        if source.recovered {
            println!(
                "⚠ {} source was {} - placeholder regenerated",
                source.source,
                source.state.name()
            );
        } else {
            println!("✓ {} source loaded", source.source);
        }
    }

    println!(
        "\nData mode: {}",
        match summary.data_mode {
            DataMode::Real => "REAL",
            DataMode::Placeholder => "PLACEHOLDER",
        }
    );

    if let Some(plasma) = &summary.plasma {
        println!("\nPlasma parameters:");
        println!("  Density:     {:.2} p/cm³", plasma.density);
        println!("  Speed:       {:.1} km/s", plasma.speed);
        println!("  Temperature: {:.2e} K", plasma.temperature);
    }

    if let Some(mag) = &summary.magnetic_field {
        println!("\nMagnetic field (GSM):");
        println!("  Bx: {:.2} nT", mag.bx);
        println!("  By: {:.2} nT", mag.by);
        println!("  Bz: {:.2} nT", mag.bz);
        println!("  Bt: {:.2} nT", mag.bt);
    }

    let streak = &summary.streak;
    println!("\nχ streak analysis:");
    println!("  Status:       {}", streak.status.name());
    println!("  Run length:   {} consecutive locks", streak.current_run_length);
    println!("  Observations: {}", streak.total_observations);
    if let Some(chi) = streak.latest_value {
        println!("  Latest χ:     {:.4}", chi);
    }

    match streak.status {
        StreakStatus::Superstreak => println!("  ⚡ SUPERSTREAK - sustained lock condition"),
        StreakStatus::Active => println!("  ✓ Active lock sequence"),
        StreakStatus::Quiet => {}
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Run summary: {}", outcome.summary_path.display());
}
