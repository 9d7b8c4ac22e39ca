//! Score the installed (or a given) sentiment model against labeled CSV files.

use std::path::PathBuf;

use sentrain::classifier::{ModelHandle, NaiveBayesBackend, NaiveBayesModel};
use sentrain::config::{self, Settings};
use sentrain::evaluate::{EvaluationReport, Evaluator, Thresholds, smoke_test};
use sentrain::pipeline::{load_dataset, scoring_mode};

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
    model_path: Option<PathBuf>,
    three_way: bool,
    smoke: bool,
    json: bool,
    verbose: bool,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    sentrain::logging::init("sentrain-eval", options.verbose).map_err(|err| err.to_string())?;

    let settings = match &options.config_path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    let model_path = match &options.model_path {
        Some(path) => path.clone(),
        None => config::model_slot_path(&settings).map_err(|err| err.to_string())?,
    };
    let backend = NaiveBayesBackend::new();
    let model = ModelHandle::load(&backend, &model_path).map_err(|err| err.to_string())?;
    println!("Model: {}", model.path().display());

    if !options.files.is_empty() {
        let dataset = load_dataset(&settings, &options.files).map_err(|err| err.to_string())?;
        let mode = scoring_mode(&settings, options.three_way).map_err(|err| err.to_string())?;
        let report = Evaluator::new(&model, mode)
            .evaluate(&dataset)
            .map_err(|err| err.to_string())?;
        if options.json {
            let json = serde_json::to_string_pretty(&report).map_err(|err| err.to_string())?;
            println!("{json}");
        } else {
            print_report(&report);
        }
    }
    if options.smoke {
        print_smoke(&model, &settings)?;
    }
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!(
        "Accuracy: {:.2}% over {} examples",
        report.accuracy * 100.0,
        report.evaluated
    );
    for class in &report.classes {
        if let Some(stats) = report.per_class.get(class) {
            println!(
                "- {class}: precision={:.3} recall={:.3} support={}",
                stats.precision, stats.recall, stats.support
            );
        }
    }
    println!("Confusion (rows=truth, cols=predicted): {}", report.classes.join(", "));
    for truth in 0..report.confusion.n_classes {
        let row: Vec<String> = (0..report.confusion.n_classes)
            .map(|predicted| report.confusion.get(truth, predicted).to_string())
            .collect();
        println!("  {}", row.join("\t"));
    }
    if report.neutral_dropped > 0 {
        println!("Neutral examples not scored: {}", report.neutral_dropped);
    }
    println!(
        "Skipped rows: {}, invalid labels: {}",
        report.skipped_row_count, report.invalid_label_count
    );
}

fn print_smoke(model: &ModelHandle<NaiveBayesModel>, settings: &Settings) -> Result<(), String> {
    let thresholds = Thresholds::new(
        settings.evaluation.negative_threshold,
        settings.evaluation.positive_threshold,
    )
    .map_err(|err| err.to_string())?;
    println!("Smoke test:");
    for result in smoke_test(model, &thresholds) {
        println!(
            "- {:.3} {:<8} {}",
            result.positive_probability, result.verdict.as_str(), result.text
        );
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "-v" | "--verbose" => options.verbose = true,
            "--three-way" => options.three_way = true,
            "--smoke" => options.smoke = true,
            "--json" => options.json = true,
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
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            file => options.files.push(PathBuf::from(file)),
        }
        idx += 1;
    }
    if options.files.is_empty() && !options.smoke {
        return Err(help_text());
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "sentrain-eval",
        "",
        "Scores a sentiment model against labeled CSV files and/or the built-in smoke sentences.",
        "Binary scoring resolves neutral labels with the configured strategy; --three-way keeps",
        "them as a class and bins the probability with the configured thresholds.",
        "",
        "Usage:",
        "  sentrain-eval [<file.csv>...] [--three-way] [--smoke] [--json]",
        "                [--model <model path>] [--config <sentrain.toml>] [-v]",
    ]
    .join("\n")
}
