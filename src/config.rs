use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    #[default]
    Xgboost,
    Torchscript,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub format: ModelFormat,
    /// TorchScript only: the `meta.json` holding `feat_list`.
    #[serde(default)]
    pub meta: Option<PathBuf>,
}

impl ModelSpec {
    pub fn xgboost(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: ModelFormat::Xgboost,
            meta: None,
        }
    }
}

/// Fare and duration artifacts for one model variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub fare: ModelSpec,
    pub duration: ModelSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub port: u16,
    pub distance_matrix: PathBuf,
    pub variants: BTreeMap<u32, VariantSpec>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let mut variants = BTreeMap::new();
        variants.insert(
            1,
            VariantSpec {
                fare: ModelSpec::xgboost("models/total_amount_base_model.json"),
                duration: ModelSpec::xgboost("models/travel_time_base_model.json"),
            },
        );
        Self {
            port: 5000,
            distance_matrix: PathBuf::from("trip_distance_matrix.csv"),
            variants,
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid config JSON in {}", path.display()))
    }

    /// `CONFIG_PATH` names a JSON file (defaults otherwise); `PORT` and
    /// `DISTANCE_MATRIX_PATH` override single fields.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("CONFIG_PATH") {
            Ok(p) => Self::load(Path::new(&p))?,
            Err(_) => Self::default(),
        };
        if let Some(port) = std::env::var("PORT").ok().and_then(|s| s.parse().ok()) {
            cfg.port = port;
        }
        if let Ok(p) = std::env::var("DISTANCE_MATRIX_PATH") {
            cfg.distance_matrix = PathBuf::from(p);
        }
        Ok(cfg)
    }
}
