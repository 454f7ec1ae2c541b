use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::{
    error::ForecastError,
    forecast::Metric,
    service::InferenceService,
    types::{ErrorOut, PredictOut, PredictRequest},
};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub svc: InferenceService,
}

// ---------- Handlers ----------

fn error_response(e: &ForecastError) -> (StatusCode, Json<ErrorOut>) {
    let status = if e.is_internal() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(ErrorOut::new(e.to_string())))
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictOut>, (StatusCode, Json<ErrorOut>)> {
    // malformed bodies get the same error envelope as pipeline failures
    let Json(payload) = payload.map_err(|rejection| {
        tracing::warn!("predict rejected body: {}", rejection.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorOut::new(rejection.body_text())),
        )
    })?;
    let metric = Metric::from_is_amount(payload.is_amount);
    match state.svc.run(&payload) {
        Ok(prediction) => {
            tracing::info!(
                "predict date={} PU={} DO={} metric={:?} variant={} ok",
                payload.date,
                payload.pu_location_id,
                payload.do_location_id,
                metric,
                payload.model_number
            );
            Ok(Json(PredictOut::success(metric, prediction)))
        }
        Err(e) => {
            tracing::warn!("predict {:?} failed: {}", payload, e);
            Err(error_response(&e))
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (rows, cols) = state.svc.distances().shape();
    Json(json!({
        "status": "ok",
        "variants": state.svc.variant_ids().collect::<Vec<_>>(),
        "distance_matrix": { "rows": rows, "cols": cols },
    }))
}

pub fn router(svc: InferenceService) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .with_state(AppState { svc })
}
