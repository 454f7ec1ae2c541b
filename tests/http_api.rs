/// HTTP surface tests: drive the axum router in-process
///
/// Run with: cargo test --test http_api -- --nocapture
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use tower::ServiceExt;
use trip_forecast::{
    distance::DistanceMatrix,
    model::{ModelError, ModelSchema, Regressor},
    server,
    service::VariantModels,
    InferenceService,
};

/// Answers with the trip distance, or refuses every row when `reject` is set.
struct DistanceEcho {
    schema: ModelSchema,
    reject: bool,
}

impl Regressor for DistanceEcho {
    fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    fn predict_row(&self, row: &[f32]) -> Result<f32, ModelError> {
        if self.reject {
            return Err(ModelError::FeatureLength {
                got: row.len(),
                expected: row.len() + 1,
            });
        }
        Ok(row[0])
    }
}

fn app() -> Router {
    let distances = DistanceMatrix::from_csv_path(
        &PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/trip_distance_matrix.csv"),
    )
    .unwrap();
    let echo = |reject| -> Arc<dyn Regressor> {
        Arc::new(DistanceEcho {
            schema: ModelSchema::new(["trip_distance", "hour_sin"]),
            reject,
        })
    };

    let mut variants = BTreeMap::new();
    variants.insert(
        1,
        VariantModels {
            fare: echo(false),
            duration: echo(false),
        },
    );
    variants.insert(
        2,
        VariantModels {
            fare: echo(true),
            duration: echo(true),
        },
    );
    server::router(InferenceService::new(distances, variants))
}

async fn post_predict(body: Value) -> (StatusCode, Value) {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_predict_success() {
    println!("\n=== Test: POST /predict success ===");
    let (status, body) = post_predict(json!({
        "date": "2024-08-15",
        "is_amount": false,
        "model_number": 1,
        "PULocationID": 2,
        "DOLocationID": 2
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["metric"], "duration");
    assert_eq!(body["unit"], "seconds");
    let prediction = body["prediction"].as_array().unwrap();
    assert_eq!(prediction.len(), 24);
    for v in prediction {
        assert!((v.as_f64().unwrap() - 3.4).abs() < 1e-6);
    }
    println!("✓ 24 values returned");
}

#[tokio::test]
async fn test_predict_request_errors() {
    println!("\n=== Test: POST /predict request errors ===");
    let (status, body) = post_predict(json!({
        "date": "2024-08-15",
        "is_amount": true,
        "model_number": 1,
        "PULocationID": 3,
        "DOLocationID": 4
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("origin zone 3"));

    let (status, body) = post_predict(json!({
        "date": "15-08-2024",
        "is_amount": true,
        "PULocationID": 2,
        "DOLocationID": 2
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("invalid date"));

    let (status, _) = post_predict(json!({
        "date": "2024-08-15",
        "is_amount": true,
        "model_number": 9,
        "PULocationID": 2,
        "DOLocationID": 2
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    println!("✓ Input problems answer 400");
}

#[tokio::test]
async fn test_predict_schema_mismatch_is_server_error() {
    println!("\n=== Test: POST /predict schema mismatch ===");
    let (status, body) = post_predict(json!({
        "date": "2024-08-15",
        "is_amount": true,
        "model_number": 2,
        "PULocationID": 2,
        "DOLocationID": 2
    }))
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    println!("✓ Model rejection answers 500");
}

#[tokio::test]
async fn test_health_reports_loaded_state() {
    println!("\n=== Test: GET /health ===");
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["variants"], json!([1, 2]));
    assert_eq!(body["distance_matrix"]["rows"], 4);
    assert_eq!(body["distance_matrix"]["cols"], 4);
    println!("✓ {body}");
}

#[tokio::test]
async fn test_predict_malformed_body_uses_error_envelope() {
    println!("\n=== Test: POST /predict malformed body ===");
    for body in [
        json!({"date": "2024-08-15", "is_amount": true, "PULocationID": 2}),
        json!({"date": "2024-08-15", "is_amount": true, "PULocationID": -1, "DOLocationID": 2}),
    ] {
        let (status, out) = post_predict(body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(out["status"], "error");
        assert!(out["message"].as_str().is_some());
    }

    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let out: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(out["status"], "error");
    println!("✓ Body rejections answer 400 with a JSON envelope");
}
