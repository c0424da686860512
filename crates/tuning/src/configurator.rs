//! Editable experiment draft and its validation into a `TuningConfig`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::presets::{default_preset, detect_preset, preset_text, CUSTOM_PRESET};
use crate::schema::{DatasetPreview, ModelType, TuningConfig, TuningMethod, TEST_SIZE};

pub const DEFAULT_N_TRIALS: u32 = 30;
pub const DEFAULT_CV_FOLDS: u32 = 5;
pub const FALLBACK_N_TRIALS: u32 = 10;
pub const FALLBACK_CV_FOLDS: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Please select a target column")]
    MissingTarget,

    #[error("Target column {0:?} is not in the dataset")]
    UnknownTarget(String),

    #[error("Model {model} has no preset named {name:?}")]
    UnknownPreset { model: ModelType, name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetSelection {
    Named(String),
    Custom,
}

impl PresetSelection {
    pub fn label(&self) -> &str {
        match self {
            PresetSelection::Named(name) => name,
            PresetSelection::Custom => CUSTOM_PRESET,
        }
    }
}

/// One user edit on the configuration screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DraftUpdate {
    SelectTarget { column: String },
    SelectModel { model: ModelType },
    SelectMethod { method: TuningMethod },
    SelectPreset { name: String },
    EditHyperparams { text: String },
    SetTrials { input: String },
    SetFolds { input: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigDraft {
    pub target_column: Option<String>,
    pub model_type: ModelType,
    pub tuning_method: TuningMethod,
    pub preset: PresetSelection,
    pub hyperparams: String,
    pub n_trials: u32,
    pub cv_folds: u32,
}

/// Integer-prefix parse of a count field; no digits, zero or negative yields `fallback`.
pub fn parse_count(input: &str, fallback: u32) -> u32 {
    let s = input.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits.bytes().take_while(u8::is_ascii_digit).count();
    if end == 0 || negative {
        return fallback;
    }
    match digits[..end].parse::<u64>() {
        Ok(0) => fallback,
        Ok(n) => u32::try_from(n).unwrap_or(u32::MAX),
        Err(_) => u32::MAX,
    }
}

impl ConfigDraft {
    pub fn new(dataset: &DatasetPreview) -> Self {
        let model_type = ModelType::RandomForest;
        let (preset, text) = default_preset(model_type);
        Self {
            target_column: dataset.columns.last().cloned(),
            model_type,
            tuning_method: TuningMethod::BayesianOptuna,
            preset: PresetSelection::Named(preset.to_string()),
            hyperparams: text.to_string(),
            n_trials: DEFAULT_N_TRIALS,
            cv_folds: DEFAULT_CV_FOLDS,
        }
    }

    /// Draft restored from a submitted config; the preset is re-detected from the text.
    pub fn from_config(config: &TuningConfig) -> Self {
        let preset = match detect_preset(config.model_type, &config.hyperparams) {
            Some(name) => PresetSelection::Named(name.to_string()),
            None => PresetSelection::Custom,
        };
        Self {
            target_column: Some(config.target_column.clone()),
            model_type: config.model_type,
            tuning_method: config.tuning_method,
            preset,
            hyperparams: config.hyperparams.clone(),
            n_trials: config.n_trials,
            cv_folds: config.cv_folds,
        }
    }

    /// Switching model reloads its default preset text.
    pub fn select_model(&mut self, model: ModelType) {
        let (preset, text) = default_preset(model);
        self.model_type = model;
        self.preset = PresetSelection::Named(preset.to_string());
        self.hyperparams = text.to_string();
    }

    pub fn select_preset(&mut self, name: &str) -> Result<(), ConfigError> {
        if name == CUSTOM_PRESET {
            self.preset = PresetSelection::Custom;
            return Ok(());
        }
        let text = preset_text(self.model_type, name).ok_or_else(|| ConfigError::UnknownPreset {
            model: self.model_type,
            name: name.to_string(),
        })?;
        self.preset = PresetSelection::Named(name.to_string());
        self.hyperparams = text.to_string();
        Ok(())
    }

    pub fn edit_hyperparams(&mut self, text: impl Into<String>) {
        self.hyperparams = text.into();
        self.preset = PresetSelection::Custom;
    }

    pub fn set_target(&mut self, column: &str, dataset: &DatasetPreview) -> Result<(), ConfigError> {
        if column.is_empty() {
            return Err(ConfigError::MissingTarget);
        }
        if !dataset.columns.iter().any(|c| c == column) {
            return Err(ConfigError::UnknownTarget(column.to_string()));
        }
        self.target_column = Some(column.to_string());
        Ok(())
    }

    pub fn apply(&mut self, update: DraftUpdate, dataset: &DatasetPreview) -> Result<(), ConfigError> {
        match update {
            DraftUpdate::SelectTarget { column } => self.set_target(&column, dataset)?,
            DraftUpdate::SelectModel { model } => self.select_model(model),
            DraftUpdate::SelectMethod { method } => self.tuning_method = method,
            DraftUpdate::SelectPreset { name } => self.select_preset(&name)?,
            DraftUpdate::EditHyperparams { text } => self.edit_hyperparams(text),
            DraftUpdate::SetTrials { input } => self.n_trials = parse_count(&input, FALLBACK_N_TRIALS),
            DraftUpdate::SetFolds { input } => self.cv_folds = parse_count(&input, FALLBACK_CV_FOLDS),
        }
        Ok(())
    }

    /// Hyperparameter text is passed through verbatim.
    pub fn build(&self, dataset: &DatasetPreview) -> Result<TuningConfig, ConfigError> {
        let target = match self.target_column.as_deref() {
            None | Some("") => return Err(ConfigError::MissingTarget),
            Some(t) => t,
        };
        if !dataset.columns.iter().any(|c| c == target) {
            return Err(ConfigError::UnknownTarget(target.to_string()));
        }
        Ok(TuningConfig {
            target_column: target.to_string(),
            model_type: self.model_type,
            tuning_method: self.tuning_method,
            test_size: TEST_SIZE,
            n_trials: self.n_trials,
            cv_folds: self.cv_folds,
            hyperparams: self.hyperparams.clone(),
        })
    }
}
