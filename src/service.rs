//! Long-lived inference handle: the distance table and every configured model,
//! loaded once and shared read-only by all requests.

use anyhow::{Context, Result};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    calendar,
    config::ServiceConfig,
    distance::DistanceMatrix,
    error::ForecastError,
    forecast::{self, ForecastRequest, ForecastResult, Metric},
    model::{self, Regressor},
    types::PredictRequest,
};

/// Fare and duration models for one variant.
#[derive(Clone)]
pub struct VariantModels {
    pub fare: Arc<dyn Regressor>,
    pub duration: Arc<dyn Regressor>,
}

impl VariantModels {
    pub fn for_metric(&self, metric: Metric) -> &dyn Regressor {
        match metric {
            Metric::Fare => self.fare.as_ref(),
            Metric::Duration => self.duration.as_ref(),
        }
    }
}

#[derive(Clone)]
pub struct InferenceService {
    distances: Arc<DistanceMatrix>,
    variants: Arc<BTreeMap<u32, VariantModels>>,
}

impl InferenceService {
    pub fn new(distances: DistanceMatrix, variants: BTreeMap<u32, VariantModels>) -> Self {
        Self {
            distances: Arc::new(distances),
            variants: Arc::new(variants),
        }
    }

    /// Reads the distance table and every model named in `cfg`.
    pub fn load(cfg: &ServiceConfig) -> Result<Self> {
        let distances = DistanceMatrix::from_csv_path(&cfg.distance_matrix)?;
        let (rows, cols) = distances.shape();
        tracing::info!(
            "loaded distance matrix {} ({} x {})",
            cfg.distance_matrix.display(),
            rows,
            cols
        );

        let mut variants = BTreeMap::new();
        for (&variant, spec) in &cfg.variants {
            let fare = model::load_model(&spec.fare)
                .with_context(|| format!("variant {} fare model", variant))?;
            let duration = model::load_model(&spec.duration)
                .with_context(|| format!("variant {} duration model", variant))?;
            tracing::info!(
                "loaded variant {}: fare={} duration={}",
                variant,
                fare.describe(),
                duration.describe()
            );
            tracing::debug!("variant {} fare schema: {:?}", variant, fare.schema().names());
            variants.insert(variant, VariantModels { fare, duration });
        }
        if variants.is_empty() {
            tracing::warn!("no model variants configured; every request will fail");
        }

        Ok(Self::new(distances, variants))
    }

    pub fn distances(&self) -> &DistanceMatrix {
        &self.distances
    }

    pub fn variant_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.variants.keys().copied()
    }

    fn model_for(&self, variant: u32, metric: Metric) -> Result<&dyn Regressor, ForecastError> {
        self.variants
            .get(&variant)
            .map(|v| v.for_metric(metric))
            .ok_or(ForecastError::UnsupportedModelVariant(variant))
    }

    pub fn forecast(&self, req: &ForecastRequest) -> Result<ForecastResult, ForecastError> {
        let model = self.model_for(req.model_variant, req.metric)?;
        forecast::forecast(
            req.date,
            req.origin_zone,
            req.destination_zone,
            &self.distances,
            model,
        )
    }

    pub fn predict_at(&self, req: &ForecastRequest, hour: u32) -> Result<f32, ForecastError> {
        let model = self.model_for(req.model_variant, req.metric)?;
        forecast::predict_hour(
            req.date,
            req.origin_zone,
            req.destination_zone,
            hour,
            &self.distances,
            model,
        )
    }

    /// Inference entry point for the wire request.
    pub fn run(&self, input: &PredictRequest) -> Result<ForecastResult, ForecastError> {
        self.forecast(&to_request(input)?)
    }
}

pub fn to_request(input: &PredictRequest) -> Result<ForecastRequest, ForecastError> {
    Ok(ForecastRequest {
        date: calendar::parse_date(&input.date)?,
        origin_zone: input.pu_location_id,
        destination_zone: input.do_location_id,
        metric: Metric::from_is_amount(input.is_amount),
        model_variant: input.model_number,
    })
}
