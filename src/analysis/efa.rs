//! Exploratory factor analysis on a correlation matrix.

use nalgebra::DMatrix;
use serde::Serialize;

use super::polychoric::CorrelationMatrix;
use super::rotation::{sort_and_reflect, varimax};
use crate::config::{EfaConfig, Rotation};
use crate::errors::{FitFailureReason, FitModel, Result, StudyError};
use crate::math::matrix::{serialize_matrix, sorted_symmetric_eigen, spd_inverse};

/// Communalities are held below one to keep uniquenesses invertible
const MAX_COMMUNALITY: f64 = 0.995;

#[derive(Debug, Clone, Serialize)]
pub struct ExploratoryFit {
    pub labels: Vec<String>,
    pub factor_names: Vec<String>,
    /// Items x factors, rotated, factors ordered by explained variance
    #[serde(serialize_with = "serialize_matrix")]
    pub loadings: DMatrix<f64>,
    pub communalities: Vec<f64>,
    pub uniquenesses: Vec<f64>,
    pub ss_loadings: Vec<f64>,
    pub proportion_variance: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
    /// Root mean square of off-diagonal residual correlations
    pub rmsr: f64,
    pub iterations: usize,
    pub rotation: Rotation,
    pub display_threshold: f64,
}

impl ExploratoryFit {
    /// Loading as printed: `None` when below the display threshold.
    /// The full value stays available in `loadings`.
    pub fn display_loading(&self, item: usize, factor: usize) -> Option<f64> {
        let v = self.loadings[(item, factor)];
        (v.abs() >= self.display_threshold).then_some(v)
    }

    /// Factor with the largest absolute loading for an item.
    pub fn primary_factor(&self, item: usize) -> usize {
        (0..self.loadings.ncols())
            .max_by(|&a, &b| {
                self.loadings[(item, a)]
                    .abs()
                    .total_cmp(&self.loadings[(item, b)].abs())
            })
            .unwrap_or(0)
    }
}

pub fn fit_efa(cor: &CorrelationMatrix, config: &EfaConfig) -> Result<ExploratoryFit> {
    let r = cor.matrix();
    let p = r.nrows();
    let k = config.n_factors;
    if k == 0 || k >= p {
        return Err(StudyError::model_spec(format!(
            "cannot extract {} factors from {} items",
            k, p
        )));
    }
    let df = ((p - k) * (p - k)) as i64 - (p + k) as i64;
    if df < 0 {
        log::warn!("{} factors for {} items leaves negative degrees of freedom", k, p);
    }

    let (unrotated, iterations) = extract(r, k, config.max_iterations, config.tolerance)?;
    let loadings = match config.rotation {
        Rotation::Varimax => sort_and_reflect(&varimax(&unrotated)?.0),
        Rotation::None => sort_and_reflect(&unrotated),
    };

    let communalities: Vec<f64> = (0..p).map(|i| loadings.row(i).norm_squared()).collect();
    let uniquenesses = communalities.iter().map(|h| 1.0 - h).collect();
    let ss_loadings: Vec<f64> = (0..k).map(|j| loadings.column(j).norm_squared()).collect();
    let proportion_variance: Vec<f64> = ss_loadings.iter().map(|s| s / p as f64).collect();
    let cumulative_variance = proportion_variance
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect();

    let implied = &loadings * loadings.transpose();
    let mut squared = 0.0;
    for i in 0..p {
        for j in (0..p).filter(|&j| j != i) {
            squared += (r[(i, j)] - implied[(i, j)]).powi(2);
        }
    }
    let rmsr = (squared / (p * (p - 1)) as f64).sqrt();
    log::info!(
        "EFA converged in {} iterations, RMSR = {:.4}",
        iterations,
        rmsr
    );

    Ok(ExploratoryFit {
        labels: cor.labels().to_vec(),
        factor_names: (1..=k).map(|j| format!("EF{}", j)).collect(),
        loadings,
        communalities,
        uniquenesses,
        ss_loadings,
        proportion_variance,
        cumulative_variance,
        rmsr,
        iterations,
        rotation: config.rotation,
        display_threshold: config.display_threshold,
    })
}

/// Squared multiple correlations, or the largest absolute correlation of
/// each item when the matrix cannot be inverted.
pub fn initial_communalities(r: &DMatrix<f64>) -> Vec<f64> {
    let p = r.nrows();
    match spd_inverse(r, "correlation matrix") {
        Ok(inv) => (0..p)
            .map(|i| (1.0 - 1.0 / inv[(i, i)]).clamp(0.0, MAX_COMMUNALITY))
            .collect(),
        Err(_) => (0..p)
            .map(|i| {
                (0..p)
                    .filter(|&j| j != i)
                    .map(|j| r[(i, j)].abs())
                    .fold(0.0, f64::max)
                    .min(MAX_COMMUNALITY)
            })
            .collect(),
    }
}

/// Weighted least squares extraction.
///
/// Minimises `sum_{i != j} w_i w_j (r_ij - (LL')_ij)^2` with fixed weights
/// `w_i = 1 / (1 - SMC_i)`, so items with little unique variance count
/// more. With `D = diag(sqrt(w))` this is an unweighted off-diagonal fit of
/// `D R D`, solved by iterated principal axes: each step refits the
/// loadings to the weighted matrix with its diagonal set to the current
/// communalities, which never increases the residual.
fn extract(
    r: &DMatrix<f64>,
    k: usize,
    max_iterations: usize,
    tolerance: f64,
) -> Result<(DMatrix<f64>, usize)> {
    let p = r.nrows();
    let mut h = initial_communalities(r);
    let weights: Vec<f64> = h
        .iter()
        .map(|&h| 1.0 / (1.0 - h).max(1.0 - MAX_COMMUNALITY))
        .collect();
    let scale: Vec<f64> = weights.iter().map(|w| w.sqrt()).collect();
    let weighted = DMatrix::from_fn(p, p, |i, j| r[(i, j)] * scale[i] * scale[j]);
    let mut change = f64::INFINITY;

    for iteration in 1..=max_iterations {
        let mut reduced = weighted.clone();
        for i in 0..p {
            reduced[(i, i)] = h[i] * weights[i];
        }
        let (values, vectors) = sorted_symmetric_eigen(&reduced);
        let scaled_loadings =
            DMatrix::from_fn(p, k, |i, c| vectors[(i, c)] * values[c].max(0.0).sqrt());

        let next: Vec<f64> = (0..p)
            .map(|i| (scaled_loadings.row(i).norm_squared() / weights[i]).min(MAX_COMMUNALITY))
            .collect();
        change = next
            .iter()
            .zip(&h)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        h = next;
        if change < tolerance {
            let loadings = DMatrix::from_fn(p, k, |i, c| scaled_loadings[(i, c)] / scale[i]);
            return Ok((loadings, iteration));
        }
    }

    Err(StudyError::fit_failure(
        FitModel::Efa,
        FitFailureReason::NotConverged {
            iterations: max_iterations,
            objective: change,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orthogonal_three_factor() -> CorrelationMatrix {
        let factor_of = [0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2];
        let lambda = [0.7, 0.75, 0.8, 0.65, 0.7, 0.6, 0.75, 0.8, 0.7, 0.65, 0.8, 0.7, 0.6, 0.75, 0.7];
        let p = factor_of.len();
        let m = DMatrix::from_fn(p, p, |i, j| {
            if i == j {
                1.0
            } else if factor_of[i] == factor_of[j] {
                lambda[i] * lambda[j]
            } else {
                0.0
            }
        });
        let labels = (1..=p).map(|i| format!("I{}", i)).collect();
        CorrelationMatrix::from_matrix(labels, m, 400).unwrap()
    }

    #[test]
    fn test_recovers_population_loadings() {
        let cor = orthogonal_three_factor();
        let fit = fit_efa(&cor, &EfaConfig::default()).unwrap();
        assert_eq!(fit.loadings.shape(), (15, 3));
        assert!(fit.rmsr < 1e-3, "rmsr = {}", fit.rmsr);

        // Items of the same population factor share a primary factor
        let primaries: Vec<usize> = (0..15).map(|i| fit.primary_factor(i)).collect();
        assert!(primaries[0..4].iter().all(|&f| f == primaries[0]));
        assert!(primaries[4..10].iter().all(|&f| f == primaries[4]));
        assert!(primaries[10..15].iter().all(|&f| f == primaries[10]));
        assert!((fit.loadings[(2, primaries[2])] - 0.8).abs() < 0.01);
        assert!((fit.communalities[0] - 0.49).abs() < 0.01);
    }

    fn weighted_residual(r: &DMatrix<f64>, loadings: &DMatrix<f64>, weights: &[f64]) -> f64 {
        let implied = loadings * loadings.transpose();
        let p = r.nrows();
        let mut total = 0.0;
        for i in 0..p {
            for j in (0..p).filter(|&j| j != i) {
                total += weights[i] * weights[j] * (r[(i, j)] - implied[(i, j)]).powi(2);
            }
        }
        total
    }

    #[test]
    fn test_extraction_minimises_weighted_residual() {
        let base = orthogonal_three_factor();
        let r = DMatrix::from_fn(15, 15, |i, j| {
            if i == j {
                1.0
            } else {
                base.get(i, j) + 0.02 * (((i + 1) * (j + 1)) as f64).sin()
            }
        });
        let (loadings, _) = extract(&r, 3, 500, 1e-9).unwrap();
        let weights: Vec<f64> = initial_communalities(&r)
            .iter()
            .map(|h| 1.0 / (1.0 - h))
            .collect();
        let best = weighted_residual(&r, &loadings, &weights);

        for (item, factor) in [(0, 0), (5, 1), (12, 2), (3, 1)] {
            for delta in [-0.02, 0.02] {
                let mut moved = loadings.clone();
                moved[(item, factor)] += delta;
                assert!(
                    weighted_residual(&r, &moved, &weights) > best,
                    "moving ({}, {}) by {} lowered the objective",
                    item,
                    factor,
                    delta
                );
            }
        }
    }

    #[test]
    fn test_display_threshold_hides_small_loadings_only() {
        let cor = orthogonal_three_factor();
        let fit = fit_efa(&cor, &EfaConfig::default()).unwrap();
        let f = fit.primary_factor(0);
        let other = (f + 1) % 3;
        assert!(fit.display_loading(0, f).is_some());
        assert!(fit.display_loading(0, other).is_none());
        assert!(fit.loadings[(0, other)].is_finite());
    }

    #[test]
    fn test_factors_ordered_by_variance() {
        let fit = fit_efa(&orthogonal_three_factor(), &EfaConfig::default()).unwrap();
        assert!(fit.ss_loadings.windows(2).all(|w| w[0] >= w[1]));
        let last = *fit.cumulative_variance.last().unwrap();
        let total: f64 = fit.proportion_variance.iter().sum();
        assert!((last - total).abs() < 1e-12);
    }

    #[test]
    fn test_iteration_limit_is_fit_failure() {
        let config = EfaConfig {
            max_iterations: 1,
            tolerance: 1e-12,
            ..EfaConfig::default()
        };
        let err = fit_efa(&orthogonal_three_factor(), &config).unwrap_err();
        assert!(err.is_fit_failure());
    }

    #[test]
    fn test_too_many_factors_rejected() {
        let config = EfaConfig {
            n_factors: 15,
            ..EfaConfig::default()
        };
        let err = fit_efa(&orthogonal_three_factor(), &config).unwrap_err();
        assert!(matches!(err, StudyError::ModelSpecification(_)));
    }
}
