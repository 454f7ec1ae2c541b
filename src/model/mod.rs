//! The opaque model boundary: an ordered input schema plus a single-row
//! `predict_row`. Backends live in submodules.

use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ModelFormat, ModelSpec};

#[cfg(feature = "torch")]
pub mod torchscript;
pub mod xgboost;

/// Column names a model was fit on, in the order it expects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSchema(Vec<String>);

impl ModelSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    FeatureLength { got: usize, expected: usize },
    #[error("model runtime error: {0}")]
    Runtime(String),
}

/// A loaded regression model. Implementations are immutable after load and
/// safe to call from concurrent requests.
pub trait Regressor: Send + Sync {
    fn schema(&self) -> &ModelSchema;

    /// Predicts one row laid out in `schema()` order.
    fn predict_row(&self, row: &[f32]) -> Result<f32, ModelError>;

    /// Short label for logs.
    fn describe(&self) -> String {
        format!("regressor[{} features]", self.schema().len())
    }
}

pub(crate) fn check_width(row: &[f32], schema: &ModelSchema) -> Result<(), ModelError> {
    if row.len() != schema.len() {
        return Err(ModelError::FeatureLength {
            got: row.len(),
            expected: schema.len(),
        });
    }
    Ok(())
}

/// Loads the artifact described by `spec`.
pub fn load_model(spec: &ModelSpec) -> Result<Arc<dyn Regressor>> {
    match spec.format {
        ModelFormat::Xgboost => {
            let model = xgboost::XgbRegressor::from_path(&spec.path)?;
            Ok(Arc::new(model))
        }
        #[cfg(feature = "torch")]
        ModelFormat::Torchscript => {
            let meta = spec.meta.as_ref().ok_or_else(|| {
                anyhow::anyhow!("torchscript model {} needs a meta path", spec.path.display())
            })?;
            let model = torchscript::TorchRegressor::new(&spec.path, meta)?;
            Ok(Arc::new(model))
        }
        #[cfg(not(feature = "torch"))]
        ModelFormat::Torchscript => anyhow::bail!(
            "model {} is TorchScript but this build lacks the `torch` feature",
            spec.path.display()
        ),
    }
}
