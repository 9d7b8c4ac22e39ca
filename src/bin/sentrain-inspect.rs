//! Report detected format and label distribution of CSV files without training.

use std::path::{Path, PathBuf};

use serde::Serialize;

use sentrain::config;
use sentrain::ingest::{Ingestor, LabelDistribution};
use sentrain::pipeline::ingestor;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    files: Vec<PathBuf>,
    config_path: Option<PathBuf>,
    json: bool,
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct FileReport {
    path: String,
    encoding: &'static str,
    delimiter: &'static str,
    headers: Vec<String>,
    content_column: String,
    sentiment_column: String,
    had_decode_errors: bool,
    utilization: f64,
    distribution: LabelDistribution,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    sentrain::logging::init("sentrain-inspect", options.verbose).map_err(|err| err.to_string())?;

    let settings = match &options.config_path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    let ingestor = ingestor(&settings).map_err(|err| err.to_string())?;

    let mut reports = Vec::with_capacity(options.files.len());
    for path in &options.files {
        reports.push(inspect_file(&ingestor, path)?);
    }
    if options.json {
        let json = serde_json::to_string_pretty(&reports).map_err(|err| err.to_string())?;
        println!("{json}");
    } else {
        reports.iter().for_each(print_report);
    }
    Ok(())
}

fn inspect_file(ingestor: &Ingestor, path: &Path) -> Result<FileReport, String> {
    let bytes =
        std::fs::read(path).map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
    let reader = ingestor
        .open_bytes(&bytes)
        .map_err(|err| format!("{}: {err}", path.display()))?;
    let distribution = LabelDistribution::collect(&reader, ingestor.vocabulary());
    let columns = reader.columns();
    let header = |idx: usize| reader.headers().get(idx).cloned().unwrap_or_default();
    Ok(FileReport {
        path: path.display().to_string(),
        encoding: reader.format().encoding.name(),
        delimiter: reader.format().delimiter_name(),
        headers: reader.headers().to_vec(),
        content_column: header(columns.content),
        sentiment_column: header(columns.sentiment),
        had_decode_errors: reader.had_decode_errors(),
        utilization: distribution.utilization(),
        distribution,
    })
}

fn print_report(report: &FileReport) {
    let classes = &report.distribution.classes;
    println!("{}", report.path);
    println!("  encoding: {}, delimiter: {}", report.encoding, report.delimiter);
    if report.had_decode_errors {
        println!("  warning: some bytes could not be decoded and were replaced");
    }
    println!(
        "  columns: content <- '{}', sentiment <- '{}' (headers: {})",
        report.content_column,
        report.sentiment_column,
        report.headers.join(", ")
    );
    println!(
        "  rows: {} ({} empty)",
        report.distribution.total_rows(),
        report.distribution.empty_rows
    );
    println!(
        "  positive={} negative={} neutral={} invalid={}",
        classes.positive, classes.negative, classes.neutral, classes.invalid
    );
    println!("  utilization: {:.1}%", report.utilization * 100.0);
    println!("  raw labels:");
    for (label, count) in &report.distribution.raw_labels {
        println!("    {label:?}: {count}");
    }
    if !report.distribution.unrecognized.is_empty() {
        let unrecognized: Vec<String> = report
            .distribution
            .unrecognized
            .iter()
            .map(|(label, count)| format!("{label:?} x{count}"))
            .collect();
        println!("  unrecognized: {}", unrecognized.join(", "));
    }
    println!(
        "  Skipped rows: {}, invalid labels: {}",
        report.distribution.empty_rows, classes.invalid
    );
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "-v" | "--verbose" => options.verbose = true,
            "--json" => options.json = true,
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
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

fn help_text() -> String {
    [
        "sentrain-inspect",
        "",
        "Shows the detected encoding, delimiter, column mapping and label distribution",
        "of CSV files, without training.",
        "",
        "Usage:",
        "  sentrain-inspect <file.csv>... [--json] [--config <sentrain.toml>] [-v]",
    ]
    .join("\n")
}
