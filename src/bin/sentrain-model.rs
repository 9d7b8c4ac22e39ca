//! Inspect the installed model slot, restore its backup, and manage model history.

use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use sentrain::classifier::NaiveBayesBackend;
use sentrain::config;
use sentrain::install::{FileStatus, ModelInstaller, ModelSlot};
use sentrain::pipeline::activate;
use sentrain::registry::ModelRegistry;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

enum Command {
    Status,
    Restore,
    History { limit: usize },
    Activate { id: String },
    Remove { id: String },
}

struct CliOptions {
    command: Command,
    model_path: Option<PathBuf>,
    verbose: bool,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    sentrain::logging::init("sentrain-model", options.verbose).map_err(|err| err.to_string())?;
    let settings = config::load_or_default().map_err(|err| err.to_string())?;
    let slot_path = match options.model_path {
        Some(path) => path,
        None => config::model_slot_path(&settings).map_err(|err| err.to_string())?,
    };
    let mut slot = ModelSlot::new(slot_path);
    let backend = NaiveBayesBackend::new();

    match options.command {
        Command::Status => {
            let status = slot.status(&backend);
            print_file("Installed", &slot.path().display().to_string(), status.installed.as_ref());
            print_file("Backup", &slot.backup_path().display().to_string(), status.backup.as_ref());
        }
        Command::Restore => {
            let report = ModelInstaller::new(&mut slot, &backend)
                .restore()
                .map_err(|err| err.to_string())?;
            println!("Restored {} (sha256 {})", report.path.display(), report.sha256);
        }
        Command::History { limit } => {
            let registry = ModelRegistry::open_default().map_err(|err| err.to_string())?;
            let installed = slot.status(&backend).installed.map(|file| file.sha256);
            let records = registry.list().map_err(|err| err.to_string())?;
            if records.is_empty() {
                println!("No models in history");
            }
            for record in records.into_iter().take(limit) {
                let marker = if installed.as_deref() == Some(record.sha256.as_str()) {
                    "*"
                } else {
                    " "
                };
                let accuracy = record
                    .holdout_accuracy
                    .map(|acc| format!("{:.2}%", acc * 100.0))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "{marker} {} | {} | created_at={} | samples={} | strategy={} | accuracy={accuracy} | files={}",
                    record.id,
                    record.name,
                    record.created_at,
                    record.train_samples,
                    record.neutral_strategy,
                    record.train_files.join(", ")
                );
                if !record.notes.is_empty() {
                    println!("    {}", record.notes);
                }
            }
        }
        Command::Activate { id } => {
            let registry = ModelRegistry::open_default().map_err(|err| err.to_string())?;
            let (record, install) = activate(&registry, &id, &mut slot, &backend, |phase| {
                eprintln!("Install: {}", phase.label())
            })
            .map_err(|err| err.to_string())?;
            println!(
                "Activated {} ({}) at {}",
                record.id,
                record.name,
                install.path.display()
            );
        }
        Command::Remove { id } => {
            let registry = ModelRegistry::open_default().map_err(|err| err.to_string())?;
            let record = registry.remove(&id).map_err(|err| err.to_string())?;
            println!("Removed {} ({})", record.id, record.name);
        }
    }
    Ok(())
}

fn print_file(label: &str, path: &str, status: Option<&FileStatus>) {
    let Some(status) = status else {
        println!("{label}: {path} (missing)");
        return;
    };
    let modified = status
        .modified
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|age| age.as_secs().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let validity = match &status.load_error {
        None => "loads".to_string(),
        Some(err) => format!("does not load: {err}"),
    };
    println!(
        "{label}: {path} ({} bytes, modified={modified}, sha256 {}, {validity})",
        status.size, status.sha256
    );
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut model_path = None;
    let mut verbose = false;
    let mut limit = 20usize;
    let mut positional = Vec::new();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "-v" | "--verbose" => verbose = true,
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model_path = Some(PathBuf::from(value));
            }
            "--limit" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--limit requires a value".to_string())?;
                limit = value
                    .parse()
                    .map_err(|_| format!("Invalid --limit value: {value}"))?;
            }
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            value => positional.push(value.to_string()),
        }
        idx += 1;
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or_else(help_text)?;
    let mut id = || {
        positional
            .next()
            .ok_or_else(|| format!("{name} requires a model id"))
    };
    let command = match name.as_str() {
        "status" => Command::Status,
        "restore" => Command::Restore,
        "history" => Command::History { limit },
        "activate" => Command::Activate { id: id()? },
        "remove" => Command::Remove { id: id()? },
        other => return Err(format!("Unknown command: {other}\n\n{}", help_text())),
    };
    Ok(CliOptions {
        command,
        model_path,
        verbose,
    })
}

fn help_text() -> String {
    [
        "sentrain-model",
        "",
        "Manages the installed sentiment model and the history of trained models.",
        "",
        "Usage:",
        "  sentrain-model status [--model <slot path>]",
        "  sentrain-model restore [--model <slot path>]",
        "  sentrain-model history [--limit <n>]",
        "  sentrain-model activate <model id> [--model <slot path>]",
        "  sentrain-model remove <model id>",
    ]
    .join("\n")
}
