//! Request handlers
//!
//! Pipeline failures never surface as HTTP errors; every handler answers
//! 200 with an `error` field so existing frontend clients keep working.
//! Training and attribution are CPU-bound, so each request runs the
//! pipeline on the blocking pool.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{error, info};

use super::state::AppState;
use crate::dataset::PatientRecord;
use crate::error::RiskError;

/// Convert a pipeline error into the in-band JSON body.
fn error_body(err: &RiskError) -> Value {
    match err {
        RiskError::SchemaMismatch { input_columns, training_columns } => json!({
            "error": "Input schema does not match training data",
            "input_df_columns": input_columns,
            "training_columns": training_columns,
            "shapes": {
                "input": input_columns.len(),
                "training": training_columns.len(),
            },
        }),
        RiskError::AttributionShapeMismatch {
            contributions_len,
            column_count,
            columns,
            contributions,
        } => json!({
            "error": "SHAP output does not align with feature columns",
            "shap_arr": contributions,
            "shap_len": contributions_len,
            "columns": columns,
            "column_count": column_count,
        }),
        other => json!({ "error": other.to_string() }),
    }
}

/// POST /api/predict
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(patient): Json<PatientRecord>,
) -> Json<Value> {
    let result = tokio::task::spawn_blocking(move || {
        let pipeline = state.pipeline();
        pipeline.predict(&patient)
    })
    .await;

    match result {
        Ok(Ok(prediction)) => {
            info!(
                probability = prediction.probability,
                factors = prediction.contributing_factors.len(),
                "prediction served"
            );
            Json(json!(prediction))
        }
        Ok(Err(e)) => {
            error!(error = %e, "prediction failed");
            Json(error_body(&e))
        }
        Err(e) => {
            error!(error = %e, "prediction task panicked");
            Json(json!({ "error": "internal task failure" }))
        }
    }
}

/// GET /api/data-science-metrics
pub async fn data_science_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    let result = tokio::task::spawn_blocking(move || {
        let pipeline = state.pipeline();
        pipeline.data_science_metrics()
    })
    .await;

    match result {
        Ok(Ok(report)) => Json(json!(report)),
        Ok(Err(e)) => {
            error!(error = %e, "metrics computation failed");
            Json(error_body(&e))
        }
        Err(e) => {
            error!(error = %e, "metrics task panicked");
            Json(json!({ "error": "internal task failure" }))
        }
    }
}

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "bonehealth",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "bonehealth",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}
