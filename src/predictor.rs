use crate::{
    error::ForecastError,
    features::FeatureSource,
    model::{ModelSchema, Regressor},
};

/// Lays `source` out in schema order. Columns the source lacks become 0.0;
/// source columns the schema doesn't name are ignored. Order always comes from
/// the schema, never from the source.
pub fn align<S: FeatureSource + ?Sized>(source: &S, schema: &ModelSchema) -> Vec<f32> {
    let mut v = Vec::with_capacity(schema.len());
    for name in schema.iter() {
        v.push(source.value(name).unwrap_or(0.0) as f32);
    }
    v
}

/// Aligns `source` to the model's schema and runs a single-row prediction.
pub fn predict<S: FeatureSource + ?Sized>(
    source: &S,
    model: &dyn Regressor,
) -> Result<f32, ForecastError> {
    let schema = model.schema();
    let row = align(source, schema);

    if tracing::enabled!(tracing::Level::DEBUG) {
        let nz = row.iter().filter(|x| **x != 0.0).count();
        let sample = schema
            .iter()
            .zip(&row)
            .take(6)
            .map(|(name, x)| format!("{}={:.3}", name, x))
            .collect::<Vec<_>>();
        tracing::debug!(
            "aligned in_dim={} nonzero={} sample=[{}]",
            row.len(),
            nz,
            sample.join(", ")
        );
    }

    model
        .predict_row(&row)
        .map_err(|e| ForecastError::SchemaMismatch(e.to_string()))
}
