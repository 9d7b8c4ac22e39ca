//! Retrain the sentiment model from labeled CSV files and install it.

use std::path::PathBuf;

use sentrain::cancel::CancelToken;
use sentrain::classifier::NaiveBayesBackend;
use sentrain::config::{self, Settings};
use sentrain::corpus::StrategyKind;
use sentrain::install::ModelSlot;
use sentrain::pipeline::{TrainReport, TrainRequest};
use sentrain::registry::ModelRegistry;
use sentrain::worker::{JobMessage, TrainingJob, spawn_training_job};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    files: Vec<PathBuf>,
    test_files: Vec<PathBuf>,
    config_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    strategy: Option<StrategyKind>,
    seed: Option<u64>,
    split_share: Option<f64>,
    holdout: Option<f64>,
    name: Option<String>,
    notes: String,
    no_history: bool,
    verbose: bool,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    sentrain::logging::init("sentrain-train", options.verbose).map_err(|err| err.to_string())?;

    let settings = apply_overrides(load_settings(&options)?, &options);
    let slot_path = match &options.model_path {
        Some(path) => path.clone(),
        None => config::model_slot_path(&settings).map_err(|err| err.to_string())?,
    };
    let registry = if options.no_history {
        None
    } else {
        Some(ModelRegistry::open_default().map_err(|err| err.to_string())?)
    };

    println!(
        "Training on {} file(s) with neutral strategy '{}'",
        options.files.len(),
        settings.training.neutral_strategy
    );
    let handle = spawn_training_job(TrainingJob {
        settings,
        backend: NaiveBayesBackend::new(),
        slot: ModelSlot::new(slot_path),
        request: TrainRequest {
            files: options.files,
            holdout_files: options.test_files,
            name: options.name,
            notes: options.notes,
        },
        registry,
        cancel: CancelToken::new(),
    });
    let report = handle
        .wait(|message| match message {
            JobMessage::Progress(progress) => eprint!(
                "\rTraining {}/{} ({:.0}%)",
                progress.examples_processed,
                progress.total_examples,
                progress.fraction() * 100.0
            ),
            JobMessage::Phase(phase) => eprintln!("\nInstall: {}", phase.label()),
            JobMessage::Finished(_) => {}
        })
        .map_err(|err| err.to_string())?;
    print_report(&report);
    Ok(())
}

fn load_settings(options: &CliOptions) -> Result<Settings, String> {
    match &options.config_path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())
}

fn apply_overrides(mut settings: Settings, options: &CliOptions) -> Settings {
    if let Some(strategy) = options.strategy {
        settings.training.neutral_strategy = strategy;
    }
    if let Some(seed) = options.seed {
        settings.training.seed = seed;
    }
    if let Some(share) = options.split_share {
        settings.training.split_positive_share = share;
    }
    if let Some(holdout) = options.holdout {
        settings.training.holdout_fraction = holdout;
    }
    settings
}

fn print_report(report: &TrainReport) {
    println!();
    for source in &report.sources {
        let path = source
            .path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());
        println!(
            "- {path}: {} rows, {} skipped, {} invalid ({}, {}{})",
            source.rows,
            source.skipped,
            source.invalid,
            source.format.encoding.name(),
            source.format.delimiter_name(),
            if source.had_decode_errors {
                ", lossy decode"
            } else {
                ""
            }
        );
    }
    let redistribution = &report.redistribution;
    println!(
        "Neutral: {} seen, {} -> positive, {} -> negative, {} dropped",
        redistribution.neutral_seen,
        redistribution.neutral_to_positive,
        redistribution.neutral_to_negative,
        redistribution.neutral_dropped
    );
    println!(
        "Trained on {} examples, {} held out",
        report.trained_on, report.held_out
    );
    match report.baseline_accuracy {
        Some(accuracy) => println!("Previous model held-out accuracy: {:.2}%", accuracy * 100.0),
        None => println!("Previous model held-out accuracy: n/a"),
    }
    match report.holdout_accuracy {
        Some(accuracy) => println!("New model held-out accuracy: {:.2}%", accuracy * 100.0),
        None => println!("New model held-out accuracy: n/a"),
    }
    println!(
        "Installed {} ({} bytes, sha256 {})",
        report.install.path.display(),
        report.install.size,
        report.install.sha256
    );
    if let Some(backup) = &report.install.backup_path {
        println!("Previous model backed up to {}", backup.display());
    }
    if let Some(record) = &report.history {
        println!("History id: {}", record.id);
    }
    println!(
        "Skipped rows: {}, invalid labels: {}",
        report.skipped_row_count, report.invalid_label_count
    );
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "-v" | "--verbose" => options.verbose = true,
            "--no-history" => options.no_history = true,
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                options.model_path = Some(PathBuf::from(value));
            }
            "--strategy" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--strategy requires a value".to_string())?;
                options.strategy = Some(value.parse()?);
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                options.seed = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            "--split-share" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--split-share requires a value".to_string())?;
                options.split_share = Some(parse_fraction("--split-share", value, 1.0)?);
            }
            "--test" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--test requires a value".to_string())?;
                options.test_files.push(PathBuf::from(value));
            }
            "--holdout" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--holdout requires a value".to_string())?;
                options.holdout = Some(parse_fraction("--holdout", value, 0.9)?);
            }
            "--name" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--name requires a value".to_string())?;
                options.name = Some(value.to_string());
            }
            "--notes" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--notes requires a value".to_string())?;
                options.notes = value.to_string();
            }
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            file => options.files.push(PathBuf::from(file)),
        }
        idx += 1;
    }
    if options.files.is_empty() {
        return Err(help_text());
    }
    Ok(options)
}

fn parse_fraction(flag: &str, value: &str, max: f64) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("Invalid {flag} value: {value}"))?;
    if !(0.0..=max).contains(&parsed) {
        return Err(format!("{flag} must be between 0 and {max}"));
    }
    Ok(parsed)
}

fn help_text() -> String {
    [
        "sentrain-train",
        "",
        "Retrains the sentiment model from labeled CSV files and installs it,",
        "keeping a backup of the previous model. Every usable row is trained on;",
        "pass --test files (or --holdout) to compare old and new accuracy.",
        "",
        "Usage:",
        "  sentrain-train <file.csv>... [--strategy exclude|auto_balance|force_positive|force_negative|random|split]",
        "                 [--seed <n>] [--split-share <0..1>]",
        "                 [--test <file.csv>]... [--holdout <0..0.9>]",
        "                 [--model <slot path>] [--config <sentrain.toml>]",
        "                 [--name <history name>] [--notes <text>] [--no-history] [-v]",
    ]
    .join("\n")
}
