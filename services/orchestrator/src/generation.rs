//! `GenerationCollaborator` backed by an `LLMProvider`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use tuning::{
    parse_generation_reply, strip_code_fence, validate_request, DatasetPreview, GenerationCollaborator, GenerationResult,
    TuningConfig, ADVICE_FALLBACK, SHAP_FALLBACK,
};

use crate::provider::{LLMProvider, ResponseFormat};

const SHAP_EMPTY: &str = "# Failed to generate SHAP script.";
const ADVICE_EMPTY: &str = "Analysis unavailable.";

pub struct LlmCollaborator {
    provider: Arc<dyn LLMProvider>,
}

impl LlmCollaborator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

fn sample_json(dataset: &DatasetPreview, rows: usize) -> String {
    let take = rows.min(dataset.sample_data.len());
    serde_json::to_string(&dataset.sample_data[..take]).unwrap_or_else(|_| "[]".to_string())
}

pub fn generation_prompt(dataset: &DatasetPreview, config: &TuningConfig) -> String {
    let model = config.model_type;
    format!(
        r##"Act as an ML engineer.

TASK:
1. Write a production-ready Python script for hyperparameter tuning.
2. Simulate its execution and produce brief logs.

CONTEXT:
- Model: {model}
- Target: "{target}"
- Columns: [{columns}]
- Sample: {sample}
- Method: {method}
- Hyperparams: {hyperparams}
- CV Folds: {folds}
- Trials: {trials}
- Test size: {test_size}

REQUIREMENTS:
- Load 'dataset.csv' with pandas.
- Preprocessing: impute missing values (SimpleImputer), encode categoricals (OneHotEncoder/LabelEncoder), drop high-cardinality ID columns.
- Model classes:
  * RandomForest / ExtraTrees / GradientBoosting / AdaBoost: sklearn.ensemble *Classifier/*Regressor
  * DecisionTree: sklearn.tree.DecisionTreeClassifier/Regressor
  * XGBoost: xgboost.XGBClassifier/XGBRegressor
  * LightGBM: lightgbm.LGBMClassifier/LGBMRegressor
  * CatBoost: catboost.CatBoostClassifier/CatBoostRegressor
  * SVM: sklearn.svm.SVC/SVR
  * KNearestNeighbors: sklearn.neighbors.KNeighborsClassifier/Regressor
  * LogisticRegression / LinearRegression: sklearn.linear_model
- Tuning engine:
  * Grid Search: sklearn.model_selection.GridSearchCV
  * Random Search: RandomizedSearchCV or optuna RandomSampler
  * Bayesian Optimization (Optuna): optuna with TPESampler
  * Hyperband (Optuna): optuna with HyperbandPruner
- Hyperparameter validation: you are the validation engine for the Hyperparams string.
  * If it is malformed or invalid for {model}, the script must start EXACTLY with
    "# Error: Invalid Hyperparameter Configuration" followed by comments explaining why,
    and logs must be ["Error: Hyperparameter validation failed.", "<specific reason>"].
    Do not produce a working script in that case.
  * If it is valid, use it as the search space. Fall back to sensible defaults only when it is empty.
- Execution: {folds}-fold CV, {trials} trials, retrain on the full data, save 'model.pkl' with joblib.
- Return only raw code in "script", without comments or docstrings.

OUTPUT FORMAT (JSON only):
{{
  "script": "string",
  "logs": ["3-5 concise lines: preprocessing, one trial, result"],
  "best_params": {{"param_name": value}},
  "best_score": number between 0.0 and 1.0,
  "metric": "string, e.g. Accuracy or RMSE"
}}"##,
        target = config.target_column,
        columns = dataset.columns.join(", "),
        sample = sample_json(dataset, 3),
        method = config.tuning_method,
        hyperparams = config.hyperparams,
        folds = config.cv_folds,
        trials = config.n_trials,
        test_size = config.test_size,
    )
}

pub fn shap_prompt(dataset: &DatasetPreview, config: &TuningConfig) -> String {
    format!(
        r##"Act as an ML engineer. Write a Python script that explains a trained model with SHAP.

CONTEXT:
- Dataset columns: [{columns}]
- Target: "{target}"
- Model type: {model}
- Files present: 'model.pkl' (trained model), 'dataset.csv' (data)

REQUIREMENTS:
1. Include the comment "# Requires: pip install shap matplotlib".
2. Import pandas, shap, joblib and matplotlib.pyplot.
3. Load 'model.pkl' and 'dataset.csv'.
4. Preprocess the data the way a standard pipeline would (drop the target, encode categoricals) so it matches the model input.
5. Explainer choice:
   - Tree models (RandomForest, XGBoost, LightGBM, CatBoost, DecisionTree, GradientBoosting, ExtraTrees, AdaBoost): shap.TreeExplainer
   - Linear models (LinearRegression, LogisticRegression, linear SVM): shap.LinearExplainer
   - Anything else (KNearestNeighbors, RBF SVM): shap.KernelExplainer with a 50-row background sample
6. Compute SHAP values for the first 100 rows (or all rows if fewer).
7. Build shap.summary_plot and shap.dependence_plot for the most important feature; print "Plot generated" instead of showing them.
8. Output only raw Python code, no Markdown."##,
        columns = dataset.columns.join(", "),
        target = config.target_column,
        model = config.model_type,
    )
}

pub fn advice_prompt(dataset: &DatasetPreview) -> String {
    format!(
        "Analyze this dataset schema briefly:\nColumns: {}\nSample Data: {}\n\n\
         Suggest 1 recommended model type (e.g. \"Random Forest for Classification\" or \
         \"XGBoost for Regression\") and explain why in 1 short sentence.",
        dataset.columns.join(", "),
        sample_json(dataset, 2),
    )
}

#[async_trait]
impl GenerationCollaborator for LlmCollaborator {
    async fn generate(&self, dataset: &DatasetPreview, config: &TuningConfig) -> anyhow::Result<GenerationResult> {
        validate_request(dataset, config)?;

        let prompt = generation_prompt(dataset, config);
        match self.provider.complete(&prompt, ResponseFormat::Json).await {
            Ok(text) => Ok(parse_generation_reply(&text)),
            Err(e) => {
                let kind = e.kind();
                warn!(provider=%self.provider.info().name, ?kind, error=%e, "generation call failed");
                Ok(GenerationResult::failure(kind, &e.to_string()))
            }
        }
    }

    async fn explain(&self, dataset: &DatasetPreview, config: &TuningConfig) -> String {
        match self.provider.complete(&shap_prompt(dataset, config), ResponseFormat::Text).await {
            Ok(text) => {
                let script = strip_code_fence(&text);
                if script.is_empty() { SHAP_EMPTY.to_string() } else { script.to_string() }
            }
            Err(e) => {
                warn!(kind=?e.kind(), error=%e, "shap generation failed");
                SHAP_FALLBACK.to_string()
            }
        }
    }

    async fn advise(&self, dataset: &DatasetPreview) -> String {
        match self.provider.complete(&advice_prompt(dataset), ResponseFormat::Text).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => ADVICE_EMPTY.to_string(),
            Err(e) => {
                warn!(kind=?e.kind(), error=%e, "dataset analysis failed");
                ADVICE_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderError, ProviderInfo};
    use std::sync::Mutex;
    use tuning::{ConfigDraft, IngestLimits, RemoteErrorKind};

    struct Canned {
        reply: Mutex<Option<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<(String, ResponseFormat)>>,
    }

    impl Canned {
        fn new(reply: Result<String, ProviderError>) -> Arc<Self> {
            Arc::new(Self { reply: Mutex::new(Some(reply)), prompts: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl LLMProvider for Canned {
        async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push((prompt.to_string(), format));
            self.reply.lock().unwrap().take().unwrap_or(Err(ProviderError::Empty))
        }

        async fn ping(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        fn info(&self) -> ProviderInfo {
            ProviderInfo { name: "canned".into(), base_url: "http://test".into(), model: "m".into() }
        }
    }

    fn dataset() -> DatasetPreview {
        let body = b"age,income,churn\n34,52000,no\n51,61000,yes\n";
        tuning::ingest_bytes("churn.csv", body.len() as u64, body, &IngestLimits::default()).unwrap()
    }

    fn config(ds: &DatasetPreview) -> TuningConfig {
        ConfigDraft::new(ds).build(ds).unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_context_in_json_mode() {
        let provider = Canned::new(Ok(r#"{"script":"import optuna","logs":["ok"],"metric":"F1"}"#.into()));
        let collab = LlmCollaborator::new(provider.clone());
        let ds = dataset();
        let cfg = config(&ds);

        let r = collab.generate(&ds, &cfg).await.unwrap();
        assert_eq!(r.script, "import optuna");
        assert_eq!(r.metric, "F1");

        let prompts = provider.prompts.lock().unwrap();
        let (prompt, format) = &prompts[0];
        assert_eq!(*format, ResponseFormat::Json);
        assert!(prompt.contains("Target: \"churn\""));
        assert!(prompt.contains("Columns: [age, income, churn]"));
        assert!(prompt.contains(&format!("Trials: {}", cfg.n_trials)));
        assert!(prompt.contains("\"# Error: Invalid Hyperparameter Configuration\""));
        assert!(prompt.trim_end().ends_with('}'));

        let shap = shap_prompt(&ds, &cfg);
        assert!(shap.contains("\"# Requires: pip install shap matplotlib\""));
        assert!(shap.ends_with("no Markdown."));
    }

    #[tokio::test]
    async fn test_rate_limit_becomes_error_payload() {
        let provider = Canned::new(Err(ProviderError::Status { status: 429, body: "quota".into() }));
        let collab = LlmCollaborator::new(provider);
        let ds = dataset();

        let r = collab.generate(&ds, &config(&ds)).await.unwrap();
        assert!(r.is_error());
        assert_eq!(r.logs, vec![format!("Error: {}", RemoteErrorKind::RateLimited.user_message())]);
        assert!(r.script.contains("HTTP 429: quota"));
    }

    #[tokio::test]
    async fn test_unknown_target_never_reaches_provider() {
        let provider = Canned::new(Ok("{}".into()));
        let collab = LlmCollaborator::new(provider.clone());
        let ds = dataset();
        let mut cfg = config(&ds);
        cfg.target_column = "nope".into();

        assert!(collab.generate(&ds, &cfg).await.is_err());
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_explain_and_advise_fallbacks() {
        let ds = dataset();
        let cfg = config(&ds);

        let shap = LlmCollaborator::new(Canned::new(Ok("```python\nimport shap\n```".into())));
        assert_eq!(shap.explain(&ds, &cfg).await, "import shap");

        let failing = LlmCollaborator::new(Canned::new(Err(ProviderError::Transport("down".into()))));
        assert_eq!(failing.explain(&ds, &cfg).await, SHAP_FALLBACK);

        let failing = LlmCollaborator::new(Canned::new(Err(ProviderError::Transport("down".into()))));
        assert_eq!(failing.advise(&ds).await, ADVICE_FALLBACK);

        let blank = LlmCollaborator::new(Canned::new(Ok("   ".into())));
        assert_eq!(blank.advise(&ds).await, ADVICE_EMPTY);
    }
}
