//! Convergent validity and composite reliability from a confirmatory fit.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::cfa::ConfirmatoryFit;
use crate::math::matrix::serialize_matrix;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorReliability {
    pub factor: String,
    pub n_items: usize,
    /// Average variance extracted
    pub ave: f64,
    /// Composite reliability
    pub cr: f64,
}

/// AVE and CR side by side; values outside [0, 1] are kept as computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FornellLarcker {
    pub factors: Vec<String>,
    /// Diagonal: AVE. Off-diagonal: squared factor correlation.
    #[serde(serialize_with = "serialize_matrix")]
    pub matrix: DMatrix<f64>,
    /// Per factor: AVE exceeds every squared correlation with another factor
    pub discriminant: Vec<bool>,
}

/// Mean squared standardized loading.
pub fn ave_from_loadings(loadings: &[f64]) -> f64 {
    loadings.iter().map(|l| l * l).sum::<f64>() / loadings.len() as f64
}

/// `(sum l)^2 / ((sum l)^2 + sum (1 - l^2))`
pub fn cr_from_loadings(loadings: &[f64]) -> f64 {
    let sum: f64 = loadings.iter().sum();
    let error: f64 = loadings.iter().map(|l| 1.0 - l * l).sum();
    sum * sum / (sum * sum + error)
}

pub fn average_variance_extracted(fit: &ConfirmatoryFit) -> Vec<(String, f64)> {
    per_factor(fit, ave_from_loadings)
}

pub fn composite_reliability(fit: &ConfirmatoryFit) -> Vec<(String, f64)> {
    per_factor(fit, cr_from_loadings)
}

fn per_factor(fit: &ConfirmatoryFit, f: fn(&[f64]) -> f64) -> Vec<(String, f64)> {
    fit.model()
        .factors()
        .iter()
        .enumerate()
        .map(|(k, factor)| (factor.name.clone(), f(&fit.factor_loadings(k))))
        .collect()
}

pub fn reliability_table(fit: &ConfirmatoryFit) -> Vec<FactorReliability> {
    fit.model()
        .factors()
        .iter()
        .enumerate()
        .map(|(k, factor)| {
            let loadings = fit.factor_loadings(k);
            FactorReliability {
                factor: factor.name.clone(),
                n_items: loadings.len(),
                ave: ave_from_loadings(&loadings),
                cr: cr_from_loadings(&loadings),
            }
        })
        .collect()
}

pub fn fornell_larcker(fit: &ConfirmatoryFit) -> FornellLarcker {
    let ave: Vec<f64> = average_variance_extracted(fit)
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    let phi = fit.phi();
    let k = ave.len();
    let matrix = DMatrix::from_fn(k, k, |a, b| {
        if a == b {
            ave[a]
        } else {
            phi[(a, b)] * phi[(a, b)]
        }
    });
    let discriminant = (0..k)
        .map(|a| (0..k).filter(|&b| b != a).all(|b| ave[a] > matrix[(a, b)]))
        .collect();

    FornellLarcker {
        factors: fit
            .model()
            .factors()
            .iter()
            .map(|f| f.name.clone())
            .collect(),
        matrix,
        discriminant,
    }
}
