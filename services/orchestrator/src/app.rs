use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::state::SharedState;
use crate::{
    routes_access, routes_catalog, routes_config, routes_dataset, routes_results, routes_runtime, routes_tuning,
    routes_workflows,
};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/catalog", get(routes_catalog::get_catalog))
        .route("/runtime", get(routes_runtime::get_runtime))
        .route("/workflows", post(routes_workflows::create_workflow))
        .route(
            "/workflows/:id",
            get(routes_workflows::get_workflow).delete(routes_workflows::delete_workflow),
        )
        .route("/workflows/:id/gate/open", post(routes_workflows::open_gate))
        .route("/workflows/:id/gate/dismiss", post(routes_workflows::dismiss_gate))
        .route("/workflows/:id/access/login", post(routes_access::login))
        .route("/workflows/:id/access/codes", post(routes_access::mint_code))
        .route("/workflows/:id/access/enter", post(routes_access::enter_as_admin))
        // Uploads are streamed and cut to a prefix, so the default body cap does not apply.
        .route(
            "/workflows/:id/dataset",
            post(routes_dataset::upload_dataset).layer(DefaultBodyLimit::disable()),
        )
        .route("/workflows/:id/config", post(routes_config::update_draft))
        .route("/workflows/:id/config/advice", get(routes_config::get_advice))
        .route("/workflows/:id/config/back", post(routes_config::back_to_upload))
        .route(
            "/workflows/:id/tuning",
            post(routes_tuning::submit_tuning).get(routes_tuning::get_tuning),
        )
        .route("/workflows/:id/tuning/retry", post(routes_tuning::retry_tuning))
        .route("/workflows/:id/tuning/back", post(routes_tuning::back_to_config))
        .route("/workflows/:id/results/script", get(routes_results::download_script))
        .route("/workflows/:id/results/params", get(routes_results::download_params))
        .route("/workflows/:id/results/shap", post(routes_results::generate_shap))
        .route("/workflows/:id/reset", post(routes_workflows::reset_workflow))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use kvstore::InMemoryStorage;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tuning::KvSessionStore;

    use crate::config::AppConfig;
    use crate::provider::{LLMProvider, ProviderError, ProviderInfo, ResponseFormat};
    use crate::state::AppState;

    const REPLY: &str = r#"{"script":"import optuna","logs":["Preprocessing done","Trial 1: 0.81","Best: 0.86"],"best_params":{"max_depth":7},"best_score":0.86,"metric":"Accuracy"}"#;

    /// Scripted provider: JSON requests get `REPLY`, text requests get a SHAP script.
    struct Scripted;

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn complete(&self, _prompt: &str, format: ResponseFormat) -> Result<String, ProviderError> {
            match format {
                ResponseFormat::Json => Ok(REPLY.to_string()),
                ResponseFormat::Text => Ok("import shap".to_string()),
            }
        }

        async fn ping(&self) -> Result<(), ProviderError> {
            Err(ProviderError::Transport("offline".into()))
        }

        fn info(&self) -> ProviderInfo {
            ProviderInfo { name: "scripted".into(), base_url: "http://test".into(), model: "m".into() }
        }
    }

    fn app_state() -> SharedState {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HT_PROVIDER", "lmstudio"),
            ("HT_VERIFY_DELAY_MS", "0"),
            ("HT_STARTUP_INTERVAL_MS", "1"),
            ("HT_PLAYBACK_INTERVAL_MS", "0"),
            ("HT_FINALIZE_DELAY_MS", "0"),
        ]);
        let cfg = AppConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        let store = Arc::new(KvSessionStore::new(InMemoryStorage::new()));
        Arc::new(AppState::new(&cfg, store, Arc::new(Scripted)))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn upload(app: &Router, id: &str, filename: &str, csv: &str) -> (StatusCode, Value) {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\r\n{csv}\r\n--{boundary}--\r\n"
        );
        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/workflows/{id}/dataset"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn new_workflow(app: &Router) -> String {
        let (status, body) = call(app, Method::POST, "/workflows", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["workflow_id"].as_str().unwrap().to_string()
    }

    const CSV: &str = "sepal,petal,species\n5.1,1.4,setosa\n7.0,4.7,versicolor\n";

    #[tokio::test]
    async fn test_full_experiment_over_http() {
        let app = router(app_state());
        let id = new_workflow(&app).await;

        let (status, view) = upload(&app, &id, "iris.csv", CSV).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "CONFIG");
        assert_eq!(view["draft"]["target_column"], "species");

        let (status, view) = call(
            &app,
            Method::POST,
            &format!("/workflows/{id}/config"),
            Some(json!({"action": "set_trials", "input": "12abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["draft"]["n_trials"], 12);

        let (status, body) = call(&app, Method::POST, &format!("/workflows/{id}/tuning"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["view"]["step"], "TUNING");

        let mut view = Value::Null;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let (_, v) = call(&app, Method::GET, &format!("/workflows/{id}"), None).await;
            if v["step"] == "RESULTS" {
                view = v;
                break;
            }
        }
        assert_eq!(view["result"]["best_score"], 0.86);
        assert_eq!(view["config"]["n_trials"], 12);

        let req = Request::get(format!("/workflows/{id}/results/script")).body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"train_best_model.py\""
        );
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"import optuna");

        let req = Request::post(format!("/workflows/{id}/results/shap")).body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let (status, view) = call(&app, Method::POST, &format!("/workflows/{id}/reset"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], "UPLOAD");
        assert!(view["dataset"].is_null() && view["result"].is_null());
    }

    #[tokio::test]
    async fn test_rejects_non_csv_and_out_of_order_actions() {
        let app = router(app_state());
        let id = new_workflow(&app).await;

        let (status, _) = upload(&app, &id, "data.xlsx", CSV).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::POST, &format!("/workflows/{id}/tuning"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, view) = call(&app, Method::GET, &format!("/workflows/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["usage_count"], 0);

        let (status, _) = call(&app, Method::GET, "/workflows/00000000-0000-0000-0000-000000000000", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_extension_rejected_before_body_is_read() {
        let app = router(app_state());
        let id = new_workflow(&app).await;

        // The file part never terminates; only the part headers can be read.
        let body = "--XBOUNDARYX\r\nContent-Disposition: form-data; name=\"file\"; filename=\"dump.bin\"\r\n\
                    Content-Type: application/octet-stream\r\n\r\n0123456789";
        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/workflows/{id}/dataset"))
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARYX")
            .body(Body::from(body))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let err: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(err["error"].as_str().unwrap().starts_with("Unsupported file dump.bin"));
    }

    #[tokio::test]
    async fn test_trial_budget_then_login() {
        let app = router(app_state());
        let id = new_workflow(&app).await;

        for _ in 0..2 {
            let (status, _) = upload(&app, &id, "iris.csv", CSV).await;
            assert_eq!(status, StatusCode::OK);
            call(&app, Method::POST, &format!("/workflows/{id}/config/back"), None).await;
        }

        let (_, view) = call(&app, Method::GET, &format!("/workflows/{id}"), None).await;
        assert_eq!(view["step"], "ACCESS_GATE");
        assert_eq!(view["locked"], true);

        let (status, _) = upload(&app, &id, "iris.csv", CSV).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&app, Method::POST, &format!("/workflows/{id}/gate/dismiss"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let login = format!("/workflows/{id}/access/login");
        let (status, _) = call(&app, Method::POST, &login, Some(json!({"code": "WRONG"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, Method::POST, &login, Some(json!({"code": " DEMO-123 "}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gate"]["state"], "granted");
        assert_eq!(body["view"]["step"], "UPLOAD");
        assert_eq!(body["view"]["locked"], false);
    }

    #[tokio::test]
    async fn test_admin_mints_code_for_another_tab() {
        let state = app_state();
        let app = router(state);
        let admin = new_workflow(&app).await;

        let (status, _) = call(&app, Method::POST, &format!("/workflows/{admin}/gate/open"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            call(&app, Method::POST, &format!("/workflows/{admin}/access/login"), Some(json!({"code": "kopihitamenak"})))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gate"]["state"], "admin_unlocked");

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/workflows/{admin}/access/codes"),
            Some(json!({"user_name": "ada", "duration_days": 7})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let code = body["code"].as_str().unwrap().to_string();
        assert!(code.starts_with("ADA-"));

        let (status, body) = call(&app, Method::POST, &format!("/workflows/{admin}/access/enter"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view"]["session"]["is_admin"], true);

        let user = new_workflow(&app).await;
        call(&app, Method::POST, &format!("/workflows/{user}/gate/open"), None).await;
        let (status, body) =
            call(&app, Method::POST, &format!("/workflows/{user}/access/login"), Some(json!({"code": code}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view"]["session"]["is_admin"], false);
    }

    #[tokio::test]
    async fn test_idle_workflows_are_evicted() {
        let state = app_state();
        let app = router(state.clone());
        let idle = new_workflow(&app).await;
        let active = new_workflow(&app).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        let (status, _) = call(&app, Method::GET, &format!("/workflows/{active}"), None).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(state.evict_idle(Duration::from_millis(100)).await, 1);

        let (status, _) = call(&app, Method::GET, &format!("/workflows/{idle}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::GET, &format!("/workflows/{active}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_evicting_a_tab_cancels_its_run() {
        let state = app_state();
        let app = router(state.clone());
        let id = new_workflow(&app).await;
        upload(&app, &id, "iris.csv", CSV).await;
        let (status, _) = call(&app, Method::POST, &format!("/workflows/{id}/tuning"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let uuid: uuid::Uuid = id.parse().unwrap();
        let handle = state.workflow(uuid).await.unwrap();
        assert!(handle.lock().await.run.is_some());

        assert_eq!(state.evict_idle(Duration::ZERO).await, 1);
        assert!(handle.lock().await.run.is_none());
        assert!(state.workflows.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_runtime_reports_failed_probe() {
        let state = app_state();
        assert!(!crate::runtime_reload::probe_once(&state).await);

        let app = router(state);
        let (status, body) = call(&app, Method::GET, "/runtime", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "Failed");
        assert_eq!(body["kind"], "unavailable");
        assert_eq!(body["provider"]["name"], "scripted");
    }
}
