//! Hyperparameter search-space presets per model type, in display order.

use crate::schema::ModelType;

/// Selector value once the text no longer matches a named preset.
pub const CUSTOM_PRESET: &str = "Custom";

const PREFERRED_PRESET: &str = "Balanced";

type Preset = (&'static str, &'static str);

const RANDOM_FOREST: &[Preset] = &[
    ("Fast", "n_estimators: [50]\nmax_depth: [10]\nmax_features: ['sqrt']\nn_jobs: [-1]"),
    ("Standard", "n_estimators: [100]\nmax_depth: [None, 10, 20]\nmin_samples_split: [2, 5]\nmax_features: ['sqrt']"),
    ("Balanced", "n_estimators: [100, 200]\nmax_depth: [None, 15, 30]\nmin_samples_split: [2, 5, 10]\nmin_samples_leaf: [1, 2, 4]\nbootstrap: [True, False]"),
    ("Prevent Overfitting", "n_estimators: [100, 200]\nmax_depth: [5, 10]\nmin_samples_leaf: [5, 10, 20]\nmax_features: ['sqrt']"),
    ("High Accuracy", "n_estimators: [200, 500, 800]\nmax_depth: [None, 20, 40, 60]\nmin_samples_split: [2, 5, 10]\nmin_samples_leaf: [1, 2, 4]\nmax_features: ['sqrt', 'log2', None]\nbootstrap: [True, False]\ncriterion: ['gini', 'entropy']"),
];

const EXTRA_TREES: &[Preset] = &[
    ("Fast", "n_estimators: [50]\nmax_depth: [10]\nn_jobs: [-1]"),
    ("Standard", "n_estimators: [100]\nmax_depth: [None, 10, 20]\nmin_samples_split: [2, 5]"),
    ("Balanced", "n_estimators: [100, 200]\nmax_depth: [None, 15, 30]\nmin_samples_split: [2, 5, 10]\nmin_samples_leaf: [1, 2, 4]\nbootstrap: [True, False]"),
    ("Prevent Overfitting", "n_estimators: [100, 200]\nmax_depth: [5, 10]\nmin_samples_leaf: [5, 10, 20]"),
    ("High Accuracy", "n_estimators: [200, 500, 800]\nmax_depth: [None, 20, 40, 60]\nmin_samples_split: [2, 5, 10]\nmin_samples_leaf: [1, 2, 4]\nmax_features: ['sqrt', 'log2', None]\nbootstrap: [True, False]\ncriterion: ['gini', 'entropy']"),
];

const XGBOOST: &[Preset] = &[
    ("Fast", "n_estimators: [50]\nmax_depth: [3]\nlearning_rate: [0.1]\nn_jobs: [-1]"),
    ("Standard", "n_estimators: [100]\nmax_depth: [3, 6]\nlearning_rate: [0.05, 0.1]\nsubsample: [0.8, 1.0]"),
    ("Balanced", "n_estimators: [100, 300]\nmax_depth: [3, 6, 9]\nlearning_rate: [0.05, 0.1, 0.2]\nmin_child_weight: [1, 3]\nsubsample: [0.8, 1.0]\ncolsample_bytree: [0.8, 1.0]"),
    ("Prevent Overfitting", "n_estimators: [100, 200]\nmax_depth: [3, 4, 5]\nlearning_rate: [0.01, 0.05]\ngamma: [1, 5]\nmin_child_weight: [5, 10]\nsubsample: [0.6, 0.8]"),
    ("High Accuracy", "n_estimators: [500, 1000]\nmax_depth: [3, 5, 7, 10]\nlearning_rate: [0.005, 0.01, 0.05]\nsubsample: [0.6, 0.8, 1.0]\ncolsample_bytree: [0.6, 0.8, 1.0]\nmin_child_weight: [1, 3, 5]\ngamma: [0, 0.1, 0.5]\nreg_alpha: [0, 0.1, 1, 10]\nreg_lambda: [0, 1, 10]"),
];

const LIGHTGBM: &[Preset] = &[
    ("Fast", "n_estimators: [50]\nlearning_rate: [0.1]\nnum_leaves: [31]\nn_jobs: [-1]"),
    ("Standard", "n_estimators: [100]\nlearning_rate: [0.05, 0.1]\nnum_leaves: [31, 63]"),
    ("Balanced", "n_estimators: [100, 300]\nlearning_rate: [0.01, 0.05, 0.1]\nnum_leaves: [31, 63, 127]\nmax_depth: [-1, 10, 20]\nsubsample: [0.8, 1.0]"),
    ("Prevent Overfitting", "n_estimators: [100, 200]\nnum_leaves: [15, 31]\nmin_child_samples: [50, 100]\nmax_depth: [3, 5]\nreg_lambda: [5, 10]"),
    ("High Accuracy", "n_estimators: [500, 1000]\nlearning_rate: [0.005, 0.01, 0.05]\nnum_leaves: [31, 63, 127, 255]\nmax_depth: [-1, 15, 30]\nmin_child_samples: [20, 50]\nreg_alpha: [0, 0.1, 1]\nreg_lambda: [0, 0.1, 1]\ncolsample_bytree: [0.6, 0.8, 1.0]"),
];

const CATBOOST: &[Preset] = &[
    ("Fast", "iterations: [50]\nlearning_rate: [0.1]\ndepth: [6]\nthread_count: [-1]"),
    ("Standard", "iterations: [100]\nlearning_rate: [0.05, 0.1]\ndepth: [6, 8]"),
    ("Balanced", "iterations: [100, 300]\nlearning_rate: [0.03, 0.05, 0.1]\ndepth: [4, 6, 8, 10]\nl2_leaf_reg: [1, 3, 5]"),
    ("Robust", "iterations: [200, 500]\ndepth: [4, 6]\nl2_leaf_reg: [5, 10]\nlearning_rate: [0.01, 0.05]"),
    ("High Accuracy", "iterations: [500, 1000]\nlearning_rate: [0.01, 0.03]\ndepth: [4, 6, 8, 10]\nl2_leaf_reg: [1, 3, 5, 7, 9]\nbagging_temperature: [0, 1]\nborder_count: [32, 64, 128]"),
];

const GRADIENT_BOOSTING: &[Preset] = &[
    ("Default", "n_estimators: [100]\nlearning_rate: [0.1]\nmax_depth: [3]"),
    ("Fast", "n_estimators: [50]\nlearning_rate: [0.1]\nmax_depth: [3]"),
    ("Standard", "n_estimators: [100]\nlearning_rate: [0.05, 0.1]\nmax_depth: [3, 5]"),
    ("Balanced", "n_estimators: [100, 200]\nlearning_rate: [0.05, 0.1]\nmax_depth: [3, 5, 8]\nsubsample: [0.8, 1.0]\nmax_features: ['sqrt', None]"),
    ("Prevent Overfitting", "n_estimators: [100]\nlearning_rate: [0.05]\nmax_depth: [3]\nmin_samples_leaf: [5, 10]\nsubsample: [0.7, 0.8]"),
    ("Conservative", "n_estimators: [100, 200]\nlearning_rate: [0.01, 0.05]\nmax_depth: [2, 3]\nmin_samples_leaf: [5, 10]\nsubsample: [0.8]"),
    ("Aggressive", "n_estimators: [200, 500]\nlearning_rate: [0.1, 0.2]\nmax_depth: [5, 8, 10]\nmin_samples_split: [2]\nsubsample: [0.7, 0.9]"),
    ("High Accuracy", "n_estimators: [200, 500]\nlearning_rate: [0.01, 0.05, 0.1]\nmax_depth: [3, 5, 8, 10]\nmin_samples_split: [2, 5]\nmin_samples_leaf: [1, 2]\nsubsample: [0.6, 0.8, 1.0]\nmax_features: ['sqrt', 'log2', None]"),
];

const SVM: &[Preset] = &[
    ("Fast", "C: [1.0]\nkernel: ['rbf']"),
    ("Standard", "C: [0.1, 1, 10]\nkernel: ['rbf', 'linear']\ngamma: ['scale']"),
    ("Linear Only", "C: [0.01, 0.1, 1, 10, 100]\nkernel: ['linear']"),
    ("Balanced", "C: [0.1, 1, 10, 100]\nkernel: ['linear', 'rbf', 'poly']\ngamma: ['scale', 'auto']\ndegree: [3]"),
    ("High Accuracy", "C: [0.1, 1, 10, 100, 1000]\nkernel: ['linear', 'rbf', 'poly', 'sigmoid']\ngamma: ['scale', 'auto', 0.01, 0.1, 1]\ndegree: [2, 3, 4]\ncoef0: [0.0, 0.1, 0.5]"),
];

const LOGISTIC_REGRESSION: &[Preset] = &[
    ("Fast", "C: [1.0]\nsolver: ['lbfgs']"),
    ("Standard", "C: [0.1, 1, 10]\nsolver: ['lbfgs']\nmax_iter: [1000]"),
    ("L1 Regularization", "C: [0.1, 1, 10, 100]\npenalty: ['l1']\nsolver: ['liblinear', 'saga']"),
    ("ElasticNet", "C: [0.1, 1, 10]\npenalty: ['elasticnet']\nsolver: ['saga']\nl1_ratio: [0.1, 0.5, 0.9]\nmax_iter: [2000]"),
    ("High Accuracy", "C: [0.001, 0.01, 0.1, 1, 10, 100]\nsolver: ['newton-cg', 'lbfgs', 'liblinear', 'sag', 'saga']\npenalty: ['l2', 'l1', 'elasticnet', None]\nmax_iter: [5000]"),
];

const KNN: &[Preset] = &[
    ("Fast", "n_neighbors: [5]\nalgorithm: ['auto']"),
    ("Standard", "n_neighbors: [3, 5, 7]\nweights: ['uniform']"),
    ("Balanced", "n_neighbors: [3, 5, 7, 9, 11]\nweights: ['uniform', 'distance']\np: [1, 2]"),
    ("Large K", "n_neighbors: [20, 30, 50]\nweights: ['distance']"),
    ("High Accuracy", "n_neighbors: [3, 5, 7, 9, 11, 15]\nweights: ['uniform', 'distance']\nalgorithm: ['auto', 'ball_tree', 'kd_tree']\nleaf_size: [10, 30]\np: [1, 2]\nmetric: ['euclidean', 'manhattan', 'minkowski']"),
];

const ADABOOST: &[Preset] = &[
    ("Fast", "n_estimators: [30]\nlearning_rate: [1.0]"),
    ("Standard", "n_estimators: [50]\nlearning_rate: [0.1, 1.0]"),
    ("Balanced", "n_estimators: [50, 100, 200]\nlearning_rate: [0.1, 0.5, 1.0]\nalgorithm: ['SAMME.R', 'SAMME']"),
    ("Robust", "n_estimators: [100, 200]\nlearning_rate: [0.01, 0.05, 0.1]"),
    ("High Accuracy", "n_estimators: [50, 100, 200, 500]\nlearning_rate: [0.01, 0.1, 0.5, 1.0]\nalgorithm: ['SAMME.R', 'SAMME']"),
];

const DECISION_TREE: &[Preset] = &[
    ("Default", "max_depth: [None]\nmin_samples_split: [2]\ncriterion: ['gini']"),
    ("Fast", "max_depth: [5]\nmin_samples_split: [2]"),
    ("Standard", "max_depth: [None, 10]\nmin_samples_split: [2, 5]\ncriterion: ['gini']"),
    ("Prevent Overfitting", "max_depth: [3, 5, 8]\nmin_samples_leaf: [10, 20, 50]"),
    ("Balanced", "max_depth: [None, 10, 20]\nmin_samples_split: [2, 5, 10]\nmin_samples_leaf: [1, 2, 4]"),
    ("Conservative", "max_depth: [3, 4, 5]\nmin_samples_leaf: [10, 20]\nmin_samples_split: [10, 20]"),
    ("Aggressive", "max_depth: [20, 50, None]\nmin_samples_split: [2]\nmin_samples_leaf: [1]\ncriterion: ['gini', 'entropy']"),
    ("High Accuracy", "max_depth: [None, 10, 20, 30, 50]\nmin_samples_split: [2, 5, 10]\nmin_samples_leaf: [1, 2, 4]\ncriterion: ['gini', 'entropy', 'log_loss']\nmax_features: ['sqrt', 'log2', None]\nccp_alpha: [0.0, 0.005, 0.01]"),
];

const LINEAR_REGRESSION: &[Preset] = &[
    ("Default", "fit_intercept: [True]"),
    ("Fast", "fit_intercept: [True]"),
    ("Standard", "fit_intercept: [True, False]"),
    ("Balanced", "fit_intercept: [True, False]\npositive: [False]"),
    ("Conservative", "fit_intercept: [True]\npositive: [False]"),
    ("Aggressive", "fit_intercept: [True, False]\npositive: [True, False]\ncopy_X: [True, False]"),
    ("Non-Negative", "fit_intercept: [True]\npositive: [True]"),
    ("High Accuracy", "fit_intercept: [True, False]\npositive: [False, True]"),
];

/// Named presets for `model`, in declaration order.
pub fn presets_for(model: ModelType) -> &'static [(&'static str, &'static str)] {
    match model {
        ModelType::RandomForest => RANDOM_FOREST,
        ModelType::ExtraTrees => EXTRA_TREES,
        ModelType::XgBoost => XGBOOST,
        ModelType::LightGbm => LIGHTGBM,
        ModelType::CatBoost => CATBOOST,
        ModelType::GradientBoosting => GRADIENT_BOOSTING,
        ModelType::Svm => SVM,
        ModelType::LogisticRegression => LOGISTIC_REGRESSION,
        ModelType::KNearestNeighbors => KNN,
        ModelType::AdaBoost => ADABOOST,
        ModelType::DecisionTree => DECISION_TREE,
        ModelType::LinearRegression => LINEAR_REGRESSION,
    }
}

pub fn preset_text(model: ModelType, name: &str) -> Option<&'static str> {
    presets_for(model).iter().find(|(n, _)| *n == name).map(|(_, text)| *text)
}

/// "Balanced" when the model defines it, else its first preset.
pub fn default_preset(model: ModelType) -> (&'static str, &'static str) {
    let presets = presets_for(model);
    presets
        .iter()
        .find(|(n, _)| *n == PREFERRED_PRESET)
        .or_else(|| presets.first())
        .copied()
        .unwrap_or((CUSTOM_PRESET, ""))
}

/// Name of the first preset whose text equals `text` exactly.
pub fn detect_preset(model: ModelType, text: &str) -> Option<&'static str> {
    presets_for(model).iter().find(|(_, t)| *t == text).map(|(n, _)| *n)
}
