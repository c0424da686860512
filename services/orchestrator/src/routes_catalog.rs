use axum::Json;
use serde::Serialize;
use tuning::{default_preset, presets_for, ModelType, TuningMethod, TEST_SIZE};

#[derive(Serialize)]
pub struct PresetEntry {
    pub name: &'static str,
    pub hyperparams: &'static str,
}

#[derive(Serialize)]
pub struct ModelEntry {
    pub value: ModelType,
    pub label: &'static str,
    pub description: &'static str,
    pub default_preset: &'static str,
    pub presets: Vec<PresetEntry>,
}

#[derive(Serialize)]
pub struct MethodEntry {
    pub value: TuningMethod,
    pub badge: &'static str,
    pub description: &'static str,
}

#[derive(Serialize)]
pub struct CatalogResponse {
    pub models: Vec<ModelEntry>,
    pub tuning_methods: Vec<MethodEntry>,
    pub test_size: f64,
}

pub fn catalog() -> CatalogResponse {
    let models = ModelType::ALL
        .iter()
        .map(|&m| ModelEntry {
            value: m,
            label: m.label(),
            description: m.description(),
            default_preset: default_preset(m).0,
            presets: presets_for(m)
                .iter()
                .map(|&(name, hyperparams)| PresetEntry { name, hyperparams })
                .collect(),
        })
        .collect();

    let tuning_methods = TuningMethod::ALL
        .iter()
        .map(|&t| MethodEntry { value: t, badge: t.badge(), description: t.description() })
        .collect();

    CatalogResponse { models, tuning_methods, test_size: f64::from(TEST_SIZE) }
}

pub async fn get_catalog() -> Json<CatalogResponse> {
    Json(catalog())
}
