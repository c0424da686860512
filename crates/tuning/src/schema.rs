use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Hash32 = [u8; 32];

/// Fraction of rows held out for evaluation. Not user-editable.
pub const TEST_SIZE: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "RandomForest")]
    RandomForest,
    #[serde(rename = "ExtraTrees")]
    ExtraTrees,
    #[serde(rename = "XGBoost")]
    XgBoost,
    #[serde(rename = "LightGBM")]
    LightGbm,
    #[serde(rename = "CatBoost")]
    CatBoost,
    #[serde(rename = "GradientBoosting")]
    GradientBoosting,
    #[serde(rename = "AdaBoost")]
    AdaBoost,
    #[serde(rename = "SVM")]
    Svm,
    #[serde(rename = "LogisticRegression")]
    LogisticRegression,
    #[serde(rename = "DecisionTree")]
    DecisionTree,
    #[serde(rename = "KNearestNeighbors")]
    KNearestNeighbors,
    #[serde(rename = "LinearRegression")]
    LinearRegression,
}

impl ModelType {
    /// Display order of the model picker.
    pub const ALL: [ModelType; 12] = [
        ModelType::RandomForest,
        ModelType::ExtraTrees,
        ModelType::XgBoost,
        ModelType::LightGbm,
        ModelType::CatBoost,
        ModelType::GradientBoosting,
        ModelType::AdaBoost,
        ModelType::Svm,
        ModelType::LogisticRegression,
        ModelType::DecisionTree,
        ModelType::KNearestNeighbors,
        ModelType::LinearRegression,
    ];

    /// Identifier used on the wire and in prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "RandomForest",
            ModelType::ExtraTrees => "ExtraTrees",
            ModelType::XgBoost => "XGBoost",
            ModelType::LightGbm => "LightGBM",
            ModelType::CatBoost => "CatBoost",
            ModelType::GradientBoosting => "GradientBoosting",
            ModelType::AdaBoost => "AdaBoost",
            ModelType::Svm => "SVM",
            ModelType::LogisticRegression => "LogisticRegression",
            ModelType::DecisionTree => "DecisionTree",
            ModelType::KNearestNeighbors => "KNearestNeighbors",
            ModelType::LinearRegression => "LinearRegression",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "Random Forest",
            ModelType::ExtraTrees => "Extra Trees",
            ModelType::XgBoost => "XGBoost",
            ModelType::LightGbm => "LightGBM",
            ModelType::CatBoost => "CatBoost",
            ModelType::GradientBoosting => "Gradient Boosting",
            ModelType::AdaBoost => "AdaBoost",
            ModelType::Svm => "Support Vector Machine",
            ModelType::LogisticRegression => "Logistic Regression",
            ModelType::DecisionTree => "Decision Tree",
            ModelType::KNearestNeighbors => "K-Nearest Neighbors",
            ModelType::LinearRegression => "Linear Regression",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "Versatile ensemble of trees. Excellent general-purpose model that resists overfitting.",
            ModelType::ExtraTrees => "Extremely Randomized Trees. Often faster and lower variance than Random Forest.",
            ModelType::XgBoost => "Extreme Gradient Boosting. The industry standard for high-performance tabular data competitions.",
            ModelType::LightGbm => "Gradient boosting framework that uses tree-based learning. Faster and lower memory usage than XGBoost.",
            ModelType::CatBoost => "High-performance library for gradient boosting on decision trees. Handles categorical data automatically.",
            ModelType::GradientBoosting => "Builds models sequentially to correct previous errors. Powerful but slower to train.",
            ModelType::AdaBoost => "Adaptive Boosting. Meta-estimator that focuses on hard-to-classify instances.",
            ModelType::Svm => "Effective in high-dimensional spaces. Finds the optimal hyperplane to separate classes.",
            ModelType::LogisticRegression => "The go-to baseline for classification. Simple, interpretable, and fast to train.",
            ModelType::DecisionTree => "Highly interpretable flow-chart structure. Good for capturing non-linear patterns.",
            ModelType::KNearestNeighbors => "Instance-based learning. Classifies data based on proximity to similar examples.",
            ModelType::LinearRegression => "Fundamental baseline for regression tasks. Models linear relationships between variables.",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TuningMethod {
    #[serde(rename = "Random Search")]
    RandomSearch,
    #[serde(rename = "Grid Search")]
    GridSearch,
    #[serde(rename = "Bayesian Optimization (Optuna)")]
    BayesianOptuna,
    #[serde(rename = "Hyperband (Optuna)")]
    Hyperband,
}

impl TuningMethod {
    pub const ALL: [TuningMethod; 4] = [
        TuningMethod::RandomSearch,
        TuningMethod::GridSearch,
        TuningMethod::BayesianOptuna,
        TuningMethod::Hyperband,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TuningMethod::RandomSearch => "Random Search",
            TuningMethod::GridSearch => "Grid Search",
            TuningMethod::BayesianOptuna => "Bayesian Optimization (Optuna)",
            TuningMethod::Hyperband => "Hyperband (Optuna)",
        }
    }

    pub fn badge(&self) -> &'static str {
        match self {
            TuningMethod::RandomSearch => "Fast",
            TuningMethod::GridSearch => "Exhaustive",
            TuningMethod::BayesianOptuna => "Recommended",
            TuningMethod::Hyperband => "Efficient",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TuningMethod::RandomSearch => "Randomly samples hyperparameter combinations. Fast, simple, and effective for baselines.",
            TuningMethod::GridSearch => "Exhaustive search over specified parameter values. Guarantees finding the best combination but is computationally expensive.",
            TuningMethod::BayesianOptuna => "Uses probabilistic models to suggest the next best parameters. Converges faster to optimal solutions.",
            TuningMethod::Hyperband => "Variation of random search that uses early stopping to allocate resources dynamically. Extremely efficient for deep learning or slow models.",
        }
    }
}

impl std::fmt::Display for TuningMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lightweight view of an uploaded table. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub filename: String,
    pub columns: Vec<String>,
    /// Exact only when `truncated` is false; otherwise a placeholder.
    pub row_count: u64,
    pub truncated: bool,
    pub sample_data: Vec<BTreeMap<String, String>>,
    #[serde(with = "hex", rename = "prefix_hash_hex")]
    pub prefix_hash: Hash32, // BLAKE3(bytes read)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    pub target_column: String,
    pub model_type: ModelType,
    pub tuning_method: TuningMethod,
    pub test_size: f32,
    pub n_trials: u32,
    pub cv_folds: u32,
    pub hyperparams: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub best_params: serde_json::Map<String, serde_json::Value>,
    pub best_score: f64,
    pub metric: String,
    pub python_script: String,
    pub execution_log: Vec<String>,
}

/// Payload returned by the generation collaborator.
///
/// An error-flagged payload has a `script` starting with the reserved marker
/// and carries the reason in `logs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub script: String,
    pub logs: Vec<String>,
    #[serde(default)]
    pub best_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub best_score: f64,
    pub metric: String,
}

impl GenerationResult {
    pub fn is_error(&self) -> bool {
        self.script.starts_with(crate::collaborator::ERROR_MARKER)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStep {
    AccessGate,
    Upload,
    Config,
    Tuning,
    Results,
}

/// Time-bounded grant derived from a validated access code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_code: String,
    pub expiry: DateTime<Utc>,
    pub is_admin: bool,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry
    }
}
