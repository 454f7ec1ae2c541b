use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};
use tch::{kind::Kind, CModule, Device, Tensor};

use super::{check_width, ModelError, ModelSchema, Regressor};

#[derive(Deserialize)]
struct MetaJson {
    feat_list: Vec<String>,
    in_dim: Option<usize>,
}

/// A TorchScript regressor exported with a `meta.json` describing its inputs.
pub struct TorchRegressor {
    model: CModule,
    device: Device,
    schema: ModelSchema,
}

impl TorchRegressor {
    pub fn new(model_path: &Path, meta_path: &Path) -> Result<Self> {
        let device = Device::Cpu;

        // feat_list is the authoritative input order
        let meta_txt = fs::read_to_string(meta_path)
            .with_context(|| format!("failed to read meta at {}", meta_path.display()))?;
        let meta: MetaJson =
            serde_json::from_str(&meta_txt).with_context(|| "failed to parse meta.json")?;
        if let Some(in_dim) = meta.in_dim {
            if in_dim != meta.feat_list.len() {
                bail!(
                    "meta.in_dim ({}) != feat_list.len() ({})",
                    in_dim,
                    meta.feat_list.len()
                );
            }
        }

        let model = CModule::load_on_device(model_path, device)
            .with_context(|| format!("failed to load TorchScript {}", model_path.display()))?;

        // Probe with a zero row; a regressor must answer with one value
        let dummy = Tensor::zeros([1, meta.feat_list.len() as i64], (Kind::Float, device));
        let out = model.forward_ts(&[dummy])?;
        if out.numel() != 1 {
            bail!("unexpected model output size: {:?}", out.size());
        }

        Ok(Self {
            model,
            device,
            schema: ModelSchema::new(meta.feat_list),
        })
    }
}

impl Regressor for TorchRegressor {
    fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    fn predict_row(&self, row: &[f32]) -> Result<f32, ModelError> {
        check_width(row, &self.schema)?;
        let input = Tensor::from_slice(row)
            .reshape([1, row.len() as i64])
            .to_device(self.device);
        let out = self
            .model
            .forward_ts(&[input])
            .map_err(|e| ModelError::Runtime(e.to_string()))?;
        if out.numel() != 1 {
            return Err(ModelError::Runtime(format!(
                "unexpected model output size: {:?}",
                out.size()
            )));
        }
        Ok(out.reshape([-1]).double_value(&[0]) as f32)
    }

    fn describe(&self) -> String {
        format!("torchscript[{} features]", self.schema.len())
    }
}
