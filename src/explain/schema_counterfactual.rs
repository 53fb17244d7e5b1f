//! # Schema-Only Counterfactual Orchestrator
//!
//! Builds a synthetic-data domain from the descriptor's declared feature
//! schema (mandatory for this method), applies per-feature precision
//! overrides, and invokes the random/genetic generator. An instance with no
//! valid counterfactual is flagged in the payload and rendered as an
//! explicit notice, never dropped.

use std::collections::HashMap;

use ndarray::Array1;
use serde_json::{json, Map, Value};

use crate::algorithms::synthetic::{
    self, DesiredClass, Domain, DomainFeature, GenerationMethod, SyntheticConfig,
};
use crate::backend::PredictionOracle;
use crate::render::counterfactual_table_html;
use crate::repository::{FeatureDomain, FeatureSpec, ModelDescriptor};

use super::errors::{ExplainError, ExplainResult};
use super::request::SchemaCounterfactualParams;
use super::{ExplanationResult, RenderPlan};

pub fn orchestrate(
    oracle: &dyn PredictionOracle,
    instance_values: &[f64],
    descriptor: &ModelDescriptor,
    params: &SchemaCounterfactualParams,
) -> ExplainResult<ExplanationResult> {
    let schema = descriptor.features.as_deref().ok_or_else(|| {
        ExplainError::Configuration(
            "the dataset \"features\" schema was not specified for this model".to_string(),
        )
    })?;
    if schema.is_empty() {
        return Err(ExplainError::Configuration(
            "the declared feature schema is empty".to_string(),
        ));
    }

    // The instance may carry a trailing target value; keep the schema's worth
    if instance_values.len() < schema.len() {
        return Err(ExplainError::Configuration(format!(
            "instance has {} values but the schema declares {} features",
            instance_values.len(),
            schema.len()
        )));
    }
    let instance: Vec<f64> = instance_values[..schema.len()].to_vec();

    let domain = build_domain(schema, params.type_and_precision.as_ref())?;
    let config = SyntheticConfig {
        total: params.num_cfs.unwrap_or(3),
        desired_class: parse_desired_class(params.desired_class.as_ref())?,
        features_to_vary: parse_features_to_vary(params.features_to_vary.as_ref(), schema)?,
        method: parse_method(params.method.as_deref())?,
        ..SyntheticConfig::default()
    };

    let outcome = synthetic::generate(
        oracle,
        &Array1::from_vec(instance.clone()),
        &domain,
        &config,
    )?;

    let names: Vec<String> = schema.iter().map(|f| f.name.clone()).collect();
    let html = counterfactual_table_html(&names, &instance, &outcome.counterfactuals);

    let records: Vec<Value> = outcome
        .counterfactuals
        .iter()
        .map(|row| {
            let mut record = Map::new();
            for (name, value) in names.iter().zip(row.iter()) {
                record.insert(name.clone(), json!(value));
            }
            Value::Object(record)
        })
        .collect();

    let payload = if records.is_empty() {
        json!({
            "counterfactuals": [],
            "target_name": descriptor.target_name,
            "desired_class": outcome.desired,
            "notice": "No counterfactuals were found for this instance. \
                       Perhaps try with different features.",
        })
    } else {
        json!({
            "counterfactuals": records,
            "target_name": descriptor.target_name,
            "desired_class": outcome.desired,
        })
    };

    Ok(ExplanationResult {
        payload,
        render: RenderPlan::CounterfactualTable {
            html,
            instance,
            counterfactuals: outcome.counterfactuals,
        },
        artifacts: Vec::new(),
    })
}

fn build_domain(
    schema: &[FeatureSpec],
    overrides: Option<&HashMap<String, Value>>,
) -> ExplainResult<Domain> {
    let mut features = Vec::with_capacity(schema.len());
    for spec in schema {
        let feature = match &spec.domain {
            FeatureDomain::Continuous {
                min,
                max,
                precision,
            } => {
                let mut precision = *precision;
                if let Some(setting) = overrides.and_then(|map| map.get(&spec.name)) {
                    precision = Some(parse_precision(&spec.name, setting)?);
                }
                DomainFeature::Continuous {
                    min: *min,
                    max: *max,
                    precision,
                }
            }
            FeatureDomain::Categorical { values } => DomainFeature::Categorical {
                values: values.clone(),
            },
        };
        features.push(feature);
    }
    Ok(Domain { features })
}

/// "int" means whole values; ["float", p] means p decimals
fn parse_precision(name: &str, setting: &Value) -> ExplainResult<u32> {
    match setting {
        Value::String(s) if s == "int" => Ok(0),
        Value::Array(parts) => {
            let is_float = parts
                .first()
                .and_then(Value::as_str)
                .map(|s| s == "float")
                .unwrap_or(false);
            let precision = parts.get(1).and_then(Value::as_u64);
            match (is_float, precision) {
                (true, Some(p)) => Ok(p as u32),
                _ => Err(invalid_precision(name)),
            }
        }
        _ => Err(invalid_precision(name)),
    }
}

fn invalid_precision(name: &str) -> ExplainError {
    ExplainError::Configuration(format!(
        "type_and_precision entry for '{}' must be \"int\" or [\"float\", precision]",
        name
    ))
}

fn parse_desired_class(value: Option<&Value>) -> ExplainResult<DesiredClass> {
    match value {
        None => Ok(DesiredClass::Index(1)),
        Some(Value::String(s)) if s == "opposite" => Ok(DesiredClass::Opposite),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|i| DesiredClass::Index(i as usize))
            .ok_or_else(|| {
                ExplainError::Configuration(
                    "desired_class index must be a non-negative integer".to_string(),
                )
            }),
        Some(other) => Err(ExplainError::Configuration(format!(
            "desired_class must be a class index or 'opposite', got {}",
            other
        ))),
    }
}

fn parse_method(value: Option<&str>) -> ExplainResult<GenerationMethod> {
    match value {
        None => Ok(GenerationMethod::Random),
        Some(name) => GenerationMethod::parse(name).ok_or_else(|| {
            ExplainError::Configuration(format!(
                "unsupported generation method '{}'; use 'random' or 'genetic'",
                name
            ))
        }),
    }
}

fn parse_features_to_vary(
    value: Option<&Value>,
    schema: &[FeatureSpec],
) -> ExplainResult<Option<Vec<usize>>> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) if s == "all" => Ok(None),
        Some(Value::Array(names)) => {
            let mut indices = Vec::with_capacity(names.len());
            for name in names {
                let name = name.as_str().ok_or_else(|| {
                    ExplainError::Configuration(
                        "features_to_vary must be 'all' or a list of feature names".to_string(),
                    )
                })?;
                let index = schema
                    .iter()
                    .position(|f| f.name == name)
                    .ok_or_else(|| {
                        ExplainError::Configuration(format!(
                            "unknown feature name in features_to_vary: '{}'",
                            name
                        ))
                    })?;
                indices.push(index);
            }
            Ok(Some(indices))
        }
        Some(other) => Err(ExplainError::Configuration(format!(
            "features_to_vary must be 'all' or a list of feature names, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResult;
    use crate::tensor::Tensor;
    use ndarray::{Array2, Axis};

    /// Class 1 iff x0 + x1 > 10
    struct SumOracle;

    impl PredictionOracle for SumOracle {
        fn predict(&self, batch: &Tensor) -> BackendResult<Tensor> {
            let rows = crate::tensor::flatten_rows(batch).unwrap();
            let n = rows.nrows();
            let mut out = Array2::zeros((n, 2));
            for (i, row) in rows.axis_iter(Axis(0)).enumerate() {
                let p1 = 1.0 / (1.0 + (-(row[0] + row[1] - 10.0)).exp());
                out[[i, 0]] = 1.0 - p1;
                out[[i, 1]] = p1;
            }
            Ok(out.into_dyn())
        }
    }

    fn descriptor() -> ModelDescriptor {
        serde_json::from_str(
            r#"{
                "backend": "graph",
                "features": [
                    {"name": "Height", "kind": "continuous", "min": 0.0, "max": 10.0},
                    {"name": "Weight", "kind": "continuous", "min": 0.0, "max": 10.0}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_counterfactual_records_are_named() {
        let result = orchestrate(
            &SumOracle,
            &[1.0, 1.0, 0.0], // trailing target value is truncated
            &descriptor(),
            &SchemaCounterfactualParams::default(),
        )
        .unwrap();
        let records = result.payload["counterfactuals"].as_array().unwrap();
        assert!(!records.is_empty());
        assert!(records[0].get("Height").is_some());
        assert!(records[0].get("Weight").is_some());
    }

    #[test]
    fn test_missing_schema_is_configuration_error() {
        let bare: ModelDescriptor = serde_json::from_str(r#"{"backend": "graph"}"#).unwrap();
        let err = orchestrate(
            &SumOracle,
            &[1.0, 1.0],
            &bare,
            &SchemaCounterfactualParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExplainError::Configuration(_)));
        assert!(err.to_string().contains("features"));
    }

    #[test]
    fn test_precision_override_applies() {
        let mut overrides = HashMap::new();
        overrides.insert("Height".to_string(), json!("int"));
        let params = SchemaCounterfactualParams {
            type_and_precision: Some(overrides),
            ..SchemaCounterfactualParams::default()
        };
        let result = orchestrate(&SumOracle, &[1.0, 1.0], &descriptor(), &params).unwrap();
        match &result.render {
            RenderPlan::CounterfactualTable { counterfactuals, .. } => {
                for row in counterfactuals {
                    assert_eq!(row[0], row[0].trunc(), "Height must be integral");
                }
            }
            other => panic!("unexpected render plan: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_method_rejected() {
        let params = SchemaCounterfactualParams {
            method: Some("quantum".to_string()),
            ..SchemaCounterfactualParams::default()
        };
        assert!(matches!(
            orchestrate(&SumOracle, &[1.0, 1.0], &descriptor(), &params),
            Err(ExplainError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_feature_name_rejected() {
        let params = SchemaCounterfactualParams {
            features_to_vary: Some(json!(["Age"])),
            ..SchemaCounterfactualParams::default()
        };
        assert!(matches!(
            orchestrate(&SumOracle, &[1.0, 1.0], &descriptor(), &params),
            Err(ExplainError::Configuration(_))
        ));
    }
}
