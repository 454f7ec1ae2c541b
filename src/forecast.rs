use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    calendar::{self, HOURS_PER_DAY},
    distance::DistanceMatrix,
    error::ForecastError,
    features::{self, FeatureRecord, TripContext},
    model::Regressor,
    predictor,
};

const HOURS: usize = HOURS_PER_DAY as usize;

/// Which quantity a model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Fare,
    Duration,
}

impl Metric {
    pub fn from_is_amount(is_amount: bool) -> Self {
        if is_amount {
            Metric::Fare
        } else {
            Metric::Duration
        }
    }

    /// Native unit of the model output. Nothing in the pipeline converts it.
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Fare => "currency",
            Metric::Duration => "seconds",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastRequest {
    pub date: NaiveDate,
    pub origin_zone: u32,
    pub destination_zone: u32,
    pub metric: Metric,
    pub model_variant: u32,
}

/// One value per hour of the day, index = hour. `None` marks an hour with no
/// usable prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ForecastResult([Option<f32>; HOURS]);

impl ForecastResult {
    /// Wraps a batch of hourly predictions. Anything other than exactly 24
    /// values yields 24 empty markers.
    pub fn from_predictions(values: Vec<f32>) -> Self {
        if values.len() != HOURS {
            tracing::warn!(
                "forecast batch has {} values, expected {}; discarding",
                values.len(),
                HOURS
            );
            return Self::unavailable();
        }
        let mut hours = [None; HOURS];
        for (slot, v) in hours.iter_mut().zip(values) {
            *slot = Some(v);
        }
        Self(hours)
    }

    /// 24 empty markers, for callers that degrade instead of failing.
    pub fn unavailable() -> Self {
        Self([None; HOURS])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn get(&self, hour: u32) -> Option<f32> {
        self.0.get(hour as usize).copied().flatten()
    }

    pub fn hours(&self) -> &[Option<f32>; HOURS] {
        &self.0
    }

    /// (hour, value) in ascending hour order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Option<f32>)> + '_ {
        self.0.iter().enumerate().map(|(h, v)| (h as u32, *v))
    }
}

/// Runs the full 24-hour sweep for one zone pair on `date`.
///
/// Distance is resolved once before the loop; date-derived calendar fields are
/// computed once and only the hour changes per step. Any failure aborts the
/// whole sweep.
pub fn forecast(
    date: NaiveDate,
    origin_zone: u32,
    destination_zone: u32,
    distances: &DistanceMatrix,
    model: &dyn Regressor,
) -> Result<ForecastResult, ForecastError> {
    let base = calendar::encode(date, 0);
    let trip = TripContext {
        trip_distance: distances.resolve(origin_zone, destination_zone)?,
        origin_zone,
        destination_zone,
    };

    let mut values = Vec::with_capacity(HOURS);
    for hour in 0..HOURS_PER_DAY {
        let record = FeatureRecord::assemble(features::transform(&base.at_hour(hour)), trip);
        if hour == 0 {
            log_record(date, &record);
        }
        values.push(predictor::predict(&record, model)?);
    }
    tracing::debug!(
        "forecast {} origin={} destination={} distance={:.3} done",
        date,
        origin_zone,
        destination_zone,
        trip.trip_distance
    );
    Ok(ForecastResult::from_predictions(values))
}

/// Single-hour counterpart of [`forecast`].
pub fn predict_hour(
    date: NaiveDate,
    origin_zone: u32,
    destination_zone: u32,
    hour: u32,
    distances: &DistanceMatrix,
    model: &dyn Regressor,
) -> Result<f32, ForecastError> {
    if hour >= HOURS_PER_DAY {
        return Err(ForecastError::HourOutOfRange(hour));
    }
    let trip = TripContext {
        trip_distance: distances.resolve(origin_zone, destination_zone)?,
        origin_zone,
        destination_zone,
    };
    let fields = features::transform(&calendar::encode(date, hour));
    predictor::predict(&FeatureRecord::assemble(fields, trip), model)
}

fn log_record(date: NaiveDate, record: &FeatureRecord) {
    if tracing::enabled!(tracing::Level::DEBUG) {
        let pairs: Vec<String> = record
            .iter()
            .map(|(name, v)| format!("{}={:.4}", name.as_str(), v))
            .collect();
        tracing::debug!("forecast {} hour 0 record: {}", date, pairs.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::FeatureName,
        model::{ModelError, ModelSchema},
    };
    use std::sync::Mutex;

    /// Records every row it is asked to score and answers with the hour it
    /// recovers from hour_sin/hour_cos.
    struct Recorder {
        schema: ModelSchema,
        seen: Mutex<Vec<Vec<f32>>>,
        fail_at: Option<usize>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                schema: ModelSchema::new(FeatureName::ALL.iter().map(|n| n.as_str())),
                seen: Mutex::new(Vec::new()),
                fail_at: None,
            }
        }
    }

    impl Regressor for Recorder {
        fn schema(&self) -> &ModelSchema {
            &self.schema
        }

        fn predict_row(&self, row: &[f32]) -> Result<f32, ModelError> {
            let mut seen = self.seen.lock().unwrap();
            if Some(seen.len()) == self.fail_at {
                return Err(ModelError::Runtime("boom".into()));
            }
            seen.push(row.to_vec());
            let angle = (row[0] as f64).atan2(row[1] as f64);
            let hour = (angle.rem_euclid(2.0 * std::f64::consts::PI) * 24.0
                / (2.0 * std::f64::consts::PI))
                .round();
            Ok(hour as f32 % 24.0)
        }
    }

    fn matrix() -> DistanceMatrix {
        DistanceMatrix::from_rows(vec![vec![1.0, 2.0], vec![f64::NAN, 3.4]]).unwrap()
    }

    fn thursday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 15).unwrap()
    }

    #[test]
    fn sweeps_hours_in_order_with_fixed_distance() {
        let model = Recorder::new();
        let result = forecast(thursday(), 2, 2, &matrix(), &model).unwrap();

        assert_eq!(result.len(), 24);
        assert!(result.is_complete());
        for (hour, value) in result.iter() {
            assert_eq!(value, Some(hour as f32));
        }

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 24);
        // trip_distance is column 7 in this schema
        assert!(seen.iter().all(|row| row[7] == 3.4f32));
        // day_of_month, month and weekend don't move
        assert!(seen.iter().all(|row| row[4] == 15.0 && row[5] == 8.0 && row[6] == 0.0));
    }

    #[test]
    fn missing_distance_aborts_before_any_prediction() {
        let model = Recorder::new();
        let err = forecast(thursday(), 1, 2, &matrix(), &model).unwrap_err();
        assert_eq!(
            err,
            ForecastError::MissingDistance {
                origin: 1,
                destination: 2
            }
        );
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_hour_aborts_the_sweep() {
        let mut model = Recorder::new();
        model.fail_at = Some(13);
        let err = forecast(thursday(), 2, 2, &matrix(), &model).unwrap_err();
        assert!(matches!(err, ForecastError::SchemaMismatch(_)));
    }

    #[test]
    fn single_hour_matches_the_sweep() {
        let model = Recorder::new();
        let sweep = forecast(thursday(), 2, 2, &matrix(), &model).unwrap();
        for hour in [0, 7, 23] {
            let one = predict_hour(thursday(), 2, 2, hour, &matrix(), &model).unwrap();
            assert_eq!(Some(one), sweep.get(hour));
        }
    }

    #[test]
    fn single_hour_rejects_hours_past_the_day() {
        let model = Recorder::new();
        for hour in [24, 30, u32::MAX] {
            assert_eq!(
                predict_hour(thursday(), 2, 2, hour, &matrix(), &model),
                Err(ForecastError::HourOutOfRange(hour))
            );
        }
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn wrong_sized_batches_become_placeholders() {
        let short = ForecastResult::from_predictions(vec![1.0; 23]);
        assert_eq!(short, ForecastResult::unavailable());
        assert_eq!(short.len(), 24);
        assert!(short.iter().all(|(_, v)| v.is_none()));

        let long = ForecastResult::from_predictions(vec![1.0; 25]);
        assert!(!long.is_complete());
    }

    #[test]
    fn serializes_as_a_plain_array() {
        let mut values = vec![0.0; 24];
        values[3] = 1.5;
        let json = serde_json::to_value(ForecastResult::from_predictions(values)).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 24);
        assert_eq!(json[3], 1.5);
        assert_eq!(
            serde_json::to_value(ForecastResult::unavailable()).unwrap()[0],
            serde_json::Value::Null
        );
    }
}
