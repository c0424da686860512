//! Downloadable files produced from a finished run.

use serde::Serialize;

use crate::schema::TuningResult;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub filename: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

pub fn script_artifact(result: &TuningResult) -> Artifact {
    Artifact {
        filename: "train_best_model.py",
        content_type: "text/x-python",
        body: result.python_script.clone(),
    }
}

pub fn params_artifact(result: &TuningResult) -> Result<Artifact, serde_json::Error> {
    Ok(Artifact {
        filename: "best_params.json",
        content_type: "application/json",
        body: serde_json::to_string_pretty(&result.best_params)?,
    })
}

pub fn shap_artifact(script: impl Into<String>) -> Artifact {
    Artifact {
        filename: "shap_analysis.py",
        content_type: "text/x-python",
        body: script.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_are_pretty_printed() {
        let mut best_params = serde_json::Map::new();
        best_params.insert("max_depth".into(), serde_json::json!(10));
        let result = TuningResult {
            best_params,
            best_score: 0.9,
            metric: "Accuracy".into(),
            python_script: "import joblib".into(),
            execution_log: vec![],
        };
        let a = params_artifact(&result).unwrap();
        assert_eq!(a.body, "{\n  \"max_depth\": 10\n}");
        assert_eq!(script_artifact(&result).filename, "train_best_model.py");
    }
}
