//! Hypothesised assignment of items to latent factors.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::ModelConfig;
use crate::errors::{Result, StudyError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatentFactor {
    pub name: String,
    pub items: Vec<String>,
}

/// Fixed measurement model: every item loads on exactly one factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasurementModel {
    factors: Vec<LatentFactor>,
}

/// A model resolved against the columns of a correlation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundModel {
    /// Column of each model item, in model order
    pub columns: Vec<usize>,
    /// Factor index of each model item, in model order
    pub factor_of: Vec<usize>,
}

impl MeasurementModel {
    pub fn new(factors: Vec<LatentFactor>) -> Result<Self> {
        if factors.is_empty() {
            return Err(StudyError::model_spec("the model has no factors"));
        }
        let mut names = HashSet::new();
        let mut items = HashSet::new();
        for factor in &factors {
            if !names.insert(factor.name.as_str()) {
                return Err(StudyError::model_spec(format!(
                    "factor '{}' is defined twice",
                    factor.name
                )));
            }
            if factor.items.is_empty() {
                return Err(StudyError::model_spec(format!(
                    "factor '{}' has no items",
                    factor.name
                )));
            }
            for item in &factor.items {
                if !items.insert(item.as_str()) {
                    return Err(StudyError::model_spec(format!(
                        "item '{}' is assigned to more than one factor",
                        item
                    )));
                }
            }
        }
        Ok(Self { factors })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Self::new(
            config
                .factors
                .iter()
                .map(|f| LatentFactor {
                    name: f.name.clone(),
                    items: f.items.clone(),
                })
                .collect(),
        )
    }

    pub fn factors(&self) -> &[LatentFactor] {
        &self.factors
    }

    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn n_items(&self) -> usize {
        self.factors.iter().map(|f| f.items.len()).sum()
    }

    /// Item labels in model order.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.factors
            .iter()
            .flat_map(|f| f.items.iter().map(String::as_str))
    }

    pub fn factor_of(&self, item: &str) -> Option<usize> {
        self.factors
            .iter()
            .position(|f| f.items.iter().any(|i| i == item))
    }

    /// Free parameters: one loading per item plus the factor correlations.
    pub fn n_parameters(&self) -> usize {
        let k = self.n_factors();
        self.n_items() + k * (k - 1) / 2
    }

    /// Off-diagonal correlations minus free parameters.
    pub fn degrees_of_freedom(&self) -> i64 {
        let p = self.n_items();
        (p * (p - 1) / 2) as i64 - self.n_parameters() as i64
    }

    /// Resolve model items to matrix columns.
    pub fn bind(&self, labels: &[String]) -> Result<BoundModel> {
        let mut columns = Vec::with_capacity(self.n_items());
        let mut factor_of = Vec::with_capacity(self.n_items());
        for (f, factor) in self.factors.iter().enumerate() {
            for item in &factor.items {
                let col = labels.iter().position(|l| l == item).ok_or_else(|| {
                    StudyError::model_spec(format!(
                        "factor '{}' names item '{}', which is not in the data",
                        factor.name, item
                    ))
                })?;
                columns.push(col);
                factor_of.push(f);
            }
        }
        let df = self.degrees_of_freedom();
        if df <= 0 {
            return Err(StudyError::model_spec(format!(
                "model is not over-identified ({} degrees of freedom)",
                df
            )));
        }
        Ok(BoundModel { columns, factor_of })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StudyConfig;

    fn factor(name: &str, items: &[&str]) -> LatentFactor {
        LatentFactor {
            name: name.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_reference_model_counts() {
        let model = MeasurementModel::from_config(&StudyConfig::default().model).unwrap();
        assert_eq!(model.n_factors(), 3);
        assert_eq!(model.n_items(), 15);
        assert_eq!(model.n_parameters(), 18);
        assert_eq!(model.degrees_of_freedom(), 87);
        assert_eq!(model.factor_of("E3"), Some(1));
    }

    #[test]
    fn test_overlapping_items_rejected() {
        let err = MeasurementModel::new(vec![factor("F1", &["A", "B"]), factor("F2", &["B"])])
            .unwrap_err();
        assert!(matches!(err, StudyError::ModelSpecification(_)));
    }

    #[test]
    fn test_bind_reports_missing_item() {
        let model = MeasurementModel::new(vec![factor("F1", &["A", "B", "C", "Z"])]).unwrap();
        let labels: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let err = model.bind(&labels).unwrap_err();
        assert!(err.to_string().contains("'Z'"));
    }

    #[test]
    fn test_just_identified_model_rejected() {
        let model = MeasurementModel::new(vec![factor("F1", &["A", "B", "C"])]).unwrap();
        let labels: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        assert!(model.bind(&labels).is_err());
    }

    #[test]
    fn test_bind_follows_model_order() {
        let model =
            MeasurementModel::new(vec![factor("F1", &["C", "A"]), factor("F2", &["B", "D"])])
                .unwrap();
        let labels: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let bound = model.bind(&labels).unwrap();
        assert_eq!(bound.columns, vec![2, 0, 1, 3]);
        assert_eq!(bound.factor_of, vec![0, 0, 1, 1]);
    }
}
