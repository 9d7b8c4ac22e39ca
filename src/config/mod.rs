//! TOML-backed settings stored under the app root.

mod defaults;
mod errors;
mod io;
mod types;

pub use errors::ConfigError;
pub use io::{
    CONFIG_FILE_NAME, MODEL_FILE_NAME, config_path, load_from, load_or_default, model_slot_path,
    save, save_to_path,
};
pub use types::{EvaluationSettings, IngestSettings, LabelSettings, Settings, TrainingSettings};
