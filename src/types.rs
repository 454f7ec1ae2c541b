use serde::{Deserialize, Serialize};

use crate::forecast::{ForecastResult, Metric};

/// Body of `POST /predict`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictRequest {
    pub date: String, // "YYYY-MM-DD"
    #[serde(rename = "PULocationID")]
    pub pu_location_id: u32,
    #[serde(rename = "DOLocationID")]
    pub do_location_id: u32,
    pub is_amount: bool, // true = fare, false = duration
    #[serde(default = "default_model_number")]
    pub model_number: u32,
}

fn default_model_number() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictOut {
    pub status: &'static str,
    pub metric: Metric,
    pub unit: &'static str,
    pub prediction: ForecastResult,
}

impl PredictOut {
    pub fn success(metric: Metric, prediction: ForecastResult) -> Self {
        Self {
            status: "success",
            metric,
            unit: metric.unit(),
            prediction,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub status: &'static str,
    pub message: String,
}

impl ErrorOut {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}
