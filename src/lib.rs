//! Hourly taxi fare and trip-duration forecasts for a pickup/dropoff zone pair.
//!
//! A request names a date and two zones; the service resolves the trip
//! distance, builds one feature row per hour of that date and scores all 24
//! rows against a pre-trained gradient-boosted model.

pub mod calendar;
pub mod config;
pub mod distance;
pub mod error;
pub mod features;
pub mod forecast;
pub mod model;
pub mod predictor;
pub mod server;
pub mod service;
pub mod types;

pub use error::ForecastError;
pub use forecast::{ForecastRequest, ForecastResult, Metric};
pub use service::InferenceService;
