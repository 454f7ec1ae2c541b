//! Native evaluation of XGBoost models saved with `save_model("*.json")`.
//!
//! Only the pieces needed for single-output regression are read: the feature
//! names, the tree arrays of a gbtree or dart booster, the objective name and
//! `base_score`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use std::{fs, path::Path};

use super::{check_width, ModelError, ModelSchema, Regressor};

// --- JSON document --------------------------------------------------------------

/// `base_score` shows up as 0.5, "0.5", [0.5] or "[5E-1]" depending on the
/// XGBoost version that wrote the file.
fn deserialize_base_score<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    let mut cur = Value::deserialize(deserializer)?;
    loop {
        match cur {
            Value::Number(n) => {
                return n
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| SerdeError::custom("invalid number"));
            }
            Value::String(s) => {
                let t = s.trim();
                if let Ok(f) = t.parse::<f32>() {
                    return Ok(f);
                }
                if let Some(inner) = t.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                    if let Ok(f) = inner.trim().parse::<f32>() {
                        return Ok(f);
                    }
                }
                return Err(SerdeError::custom(format!(
                    "cannot parse base_score from string: {}",
                    s
                )));
            }
            Value::Array(arr) => match arr.into_iter().next() {
                Some(first) => cur = first,
                None => return Err(SerdeError::custom("empty base_score array")),
            },
            _ => {
                return Err(SerdeError::custom(
                    "base_score must be number, string, or array",
                ))
            }
        }
    }
}

/// `default_left` is written as 0/1 integers by most versions and as booleans
/// by a few.
fn deserialize_flags<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|v| -> Result<bool, D::Error> {
            match v {
                Value::Bool(b) => Ok(b),
                Value::Number(n) => n
                    .as_i64()
                    .map(|i| i != 0)
                    .ok_or_else(|| SerdeError::custom("invalid number for flag")),
                other => Err(SerdeError::custom(format!("unsupported flag value {}", other))),
            }
        })
        .collect()
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
struct TreeParam {
    #[serde_as(as = "DisplayFromStr")]
    num_nodes: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeJson {
    tree_param: TreeParam,
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i32>,
    split_conditions: Vec<f32>,
    #[serde(deserialize_with = "deserialize_flags")]
    default_left: Vec<bool>,
    /// 0 = numerical, 1 = categorical. Older exports omit it.
    #[serde(default)]
    split_type: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelTrees {
    trees: Vec<TreeJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct GbTreeDefinition {
    model: ModelTrees,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    Dart {
        gbtree: GbTreeDefinition,
        weight_drop: Vec<f32>,
    },
    Gblinear {
        #[allow(dead_code)]
        model: Value,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct ObjectiveJson {
    name: String,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    base_score: f32,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    num_class: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    objective: ObjectiveJson,
    learner_model_param: LearnerModelParam,
}

#[derive(Debug, Clone, Deserialize)]
struct XgbModelJson {
    learner: Learner,
}

// --- evaluation -----------------------------------------------------------------

/// How the summed margin maps back to the prediction space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Identity,
    Logit,
    Log,
}

impl Link {
    fn for_objective(name: &str) -> Result<Self> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:pseudohubererror"
            | "reg:squaredlogerror" | "reg:absoluteerror" | "reg:quantileerror" => {
                Ok(Link::Identity)
            }
            "reg:logistic" | "binary:logistic" => Ok(Link::Logit),
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Ok(Link::Log),
            other => bail!("objective '{}' is not a scalar regression objective", other),
        }
    }

    fn margin_of(self, base_score: f32) -> f32 {
        match self {
            Link::Identity => base_score,
            Link::Logit => {
                let p = base_score.clamp(1e-7, 1.0 - 1e-7);
                (p / (1.0 - p)).ln()
            }
            Link::Log => base_score.max(1e-7).ln(),
        }
    }

    fn output_of(self, margin: f32) -> f32 {
        match self {
            Link::Identity => margin,
            Link::Logit => 1.0 / (1.0 + (-margin).exp()),
            Link::Log => margin.exp(),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    /// `None` marks a leaf.
    split: Option<Split>,
    value: f32,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f32,
    left: usize,
    right: usize,
    default_left: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    weight: f32,
}

impl Tree {
    fn from_json(tree: &TreeJson, idx: usize, weight: f32, n_features: usize) -> Result<Self> {
        let n = tree.tree_param.num_nodes;
        if n == 0 {
            bail!("tree {} has no nodes", idx);
        }
        for (field, len) in [
            ("left_children", tree.left_children.len()),
            ("right_children", tree.right_children.len()),
            ("split_indices", tree.split_indices.len()),
            ("split_conditions", tree.split_conditions.len()),
            ("default_left", tree.default_left.len()),
        ] {
            if len != n {
                bail!("tree {}: {} has {} entries, expected {}", idx, field, len, n);
            }
        }
        if !tree.split_type.is_empty() && tree.split_type.len() != n {
            bail!(
                "tree {}: split_type has {} entries, expected {}",
                idx,
                tree.split_type.len(),
                n
            );
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (tree.left_children[i], tree.right_children[i]);
            if left == -1 {
                nodes.push(Node {
                    split: None,
                    value: tree.split_conditions[i],
                });
                continue;
            }
            // children always come after their parent, which also rules out cycles
            for child in [left, right] {
                if child <= i as i32 || child as usize >= n {
                    bail!("tree {}: node {} has invalid child {}", idx, i, child);
                }
            }
            if tree.split_type.get(i).is_some_and(|&t| t != 0) {
                bail!(
                    "tree {}: node {} is a categorical split, which is not supported",
                    idx,
                    i
                );
            }
            let feature = tree.split_indices[i];
            if feature < 0 || feature as usize >= n_features {
                bail!(
                    "tree {}: node {} splits on feature {} but the model has {} features",
                    idx,
                    i,
                    feature,
                    n_features
                );
            }
            nodes.push(Node {
                split: Some(Split {
                    feature: feature as usize,
                    threshold: tree.split_conditions[i],
                    left: left as usize,
                    right: right as usize,
                    default_left: tree.default_left[i],
                }),
                value: 0.0,
            });
        }
        Ok(Self { nodes, weight })
    }

    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut node = &self.nodes[0];
        while let Some(split) = node.split {
            let x = row[split.feature];
            let go_left = if x.is_nan() {
                split.default_left
            } else {
                x < split.threshold
            };
            node = &self.nodes[if go_left { split.left } else { split.right }];
        }
        node.value * self.weight
    }
}

/// A gbtree or dart ensemble with a scalar output.
#[derive(Debug, Clone)]
pub struct XgbRegressor {
    schema: ModelSchema,
    trees: Vec<Tree>,
    base_margin: f32,
    link: Link,
    objective: String,
}

impl XgbRegressor {
    pub fn from_path(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read model at {}", path.display()))?;
        Self::from_json_str(&txt)
            .with_context(|| format!("failed to load XGBoost model {}", path.display()))
    }

    pub fn from_json_str(txt: &str) -> Result<Self> {
        let doc: XgbModelJson =
            serde_json::from_str(txt).with_context(|| "failed to parse XGBoost JSON")?;
        Self::from_document(doc)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let doc: XgbModelJson =
            serde_json::from_value(value).with_context(|| "failed to parse XGBoost JSON")?;
        Self::from_document(doc)
    }

    fn from_document(doc: XgbModelJson) -> Result<Self> {
        let learner = doc.learner;
        if learner.feature_names.is_empty() {
            bail!("model carries no feature names; its column order is unknown");
        }
        if learner.learner_model_param.num_class > 1 {
            bail!(
                "multi-class model ({} classes) cannot produce a scalar prediction",
                learner.learner_model_param.num_class
            );
        }
        let link = Link::for_objective(&learner.objective.name)?;
        let n_features = learner.feature_names.len();

        let (model_trees, weights) = match &learner.gradient_booster {
            GradientBooster::Gbtree { model } => (model, None),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => (&gbtree.model, Some(weight_drop)),
            GradientBooster::Gblinear { .. } => bail!("gblinear boosters are not supported"),
        };
        if let Some(w) = weights {
            if w.len() != model_trees.trees.len() {
                bail!(
                    "dart model has {} tree weights for {} trees",
                    w.len(),
                    model_trees.trees.len()
                );
            }
        }

        let trees = model_trees
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let weight = weights.map(|w| w[i]).unwrap_or(1.0);
                Tree::from_json(t, i, weight, n_features)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema: ModelSchema::new(learner.feature_names),
            trees,
            base_margin: link.margin_of(learner.learner_model_param.base_score),
            link,
            objective: learner.objective.name,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for XgbRegressor {
    fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    fn predict_row(&self, row: &[f32]) -> Result<f32, ModelError> {
        check_width(row, &self.schema)?;
        let margin = self
            .trees
            .iter()
            .fold(self.base_margin, |acc, t| acc + t.leaf_value(row));
        Ok(self.link.output_of(margin))
    }

    fn describe(&self) -> String {
        format!(
            "xgboost[{} trees, {}, {} features]",
            self.trees.len(),
            self.objective,
            self.schema.len()
        )
    }
}
