//! Diagonally weighted least squares estimation of a measurement model.
//!
//! Latent variances are fixed to one and item variances are one (delta
//! parameterisation), so the implied correlation of items i and j is
//! `lambda_i * lambda_j * phi(f_i, f_j)` and every estimate is already
//! standardized. The objective is the weighted sum of squared residual
//! correlations with weights equal to the inverse sampling variances.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use super::fit_indices::{FitIndices, FitStatistics};
use super::model::{BoundModel, MeasurementModel};
use crate::analysis::CorrelationMatrix;
use crate::config::CfaConfig;
use crate::errors::{FitFailureReason, FitModel, Result, StudyError};
use crate::math::matrix::{is_positive_definite, serialize_matrix};

const MIN_VARIANCE: f64 = 1e-12;
const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e12;
const START_LOADING_RANGE: (f64, f64) = (0.2, 0.95);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizedLoading {
    pub factor: String,
    pub item: String,
    pub loading: f64,
    /// 1 - loading^2; negative values are reported, never clamped
    pub residual_variance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorCorrelation {
    pub left: String,
    pub right: String,
    pub value: f64,
}

/// A converged, admissible confirmatory solution.
///
/// Only [`fit_cfa`] creates values of this type, so holding one means the
/// estimation succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmatoryFit {
    model: MeasurementModel,
    loadings: Vec<StandardizedLoading>,
    factor_correlations: Vec<FactorCorrelation>,
    #[serde(serialize_with = "serialize_matrix")]
    phi: DMatrix<f64>,
    indices: FitIndices,
    n_observations: usize,
    iterations: usize,
    warnings: Vec<String>,
}

impl ConfirmatoryFit {
    pub fn model(&self) -> &MeasurementModel {
        &self.model
    }

    /// Standardized loadings in model order.
    pub fn loadings(&self) -> &[StandardizedLoading] {
        &self.loadings
    }

    /// Loadings of one factor's items.
    pub fn factor_loadings(&self, factor: usize) -> Vec<f64> {
        let name = &self.model.factors()[factor].name;
        self.loadings
            .iter()
            .filter(|l| &l.factor == name)
            .map(|l| l.loading)
            .collect()
    }

    pub fn factor_correlations(&self) -> &[FactorCorrelation] {
        &self.factor_correlations
    }

    /// Standardized factor covariance matrix (unit diagonal).
    pub fn phi(&self) -> &DMatrix<f64> {
        &self.phi
    }

    pub fn indices(&self) -> &FitIndices {
        &self.indices
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Residual problem over the model's item pairs.
struct Problem<'a> {
    bound: &'a BoundModel,
    n_factors: usize,
    /// (i, j) positions in model order, i < j
    pairs: Vec<(usize, usize)>,
    r: Vec<f64>,
    w: Vec<f64>,
    /// Parameter index of phi(a, b), a != b
    phi_index: Vec<Vec<usize>>,
}

impl<'a> Problem<'a> {
    fn new(cor: &CorrelationMatrix, bound: &'a BoundModel, n_factors: usize) -> Self {
        let p = bound.columns.len();
        let n = cor.n_observations().max(1) as f64;
        let mut pairs = Vec::new();
        let mut r = Vec::new();
        let mut w = Vec::new();
        for i in 0..p {
            for j in (i + 1)..p {
                let (ci, cj) = (bound.columns[i], bound.columns[j]);
                let rij = cor.get(ci, cj);
                let var = cor.sampling_variance(ci, cj);
                let var = if var.is_finite() && var > 0.0 {
                    var
                } else {
                    (1.0 - rij * rij).powi(2) / n
                };
                pairs.push((i, j));
                r.push(rij);
                w.push(1.0 / var.max(MIN_VARIANCE));
            }
        }

        let mut phi_index = vec![vec![usize::MAX; n_factors]; n_factors];
        let mut next = p;
        for a in 0..n_factors {
            for b in (a + 1)..n_factors {
                phi_index[a][b] = next;
                phi_index[b][a] = next;
                next += 1;
            }
        }

        Self {
            bound,
            n_factors,
            pairs,
            r,
            w,
            phi_index,
        }
    }

    fn n_items(&self) -> usize {
        self.bound.columns.len()
    }

    fn n_parameters(&self) -> usize {
        self.n_items() + self.n_factors * (self.n_factors - 1) / 2
    }

    fn phi(&self, theta: &DVector<f64>, a: usize, b: usize) -> f64 {
        if a == b {
            1.0
        } else {
            theta[self.phi_index[a][b]]
        }
    }

    fn implied(&self, theta: &DVector<f64>, i: usize, j: usize) -> f64 {
        let (fi, fj) = (self.bound.factor_of[i], self.bound.factor_of[j]);
        theta[i] * theta[j] * self.phi(theta, fi, fj)
    }

    fn residuals(&self, theta: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.pairs.len(),
            self.pairs
                .iter()
                .zip(&self.r)
                .map(|(&(i, j), r)| r - self.implied(theta, i, j)),
        )
    }

    fn objective(&self, theta: &DVector<f64>) -> f64 {
        self.residuals(theta)
            .iter()
            .zip(&self.w)
            .map(|(e, w)| w * e * e)
            .sum()
    }

    /// Derivatives of the implied correlations.
    fn jacobian(&self, theta: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.pairs.len(), self.n_parameters());
        for (row, &(i, j)) in self.pairs.iter().enumerate() {
            let (fi, fj) = (self.bound.factor_of[i], self.bound.factor_of[j]);
            let phi = self.phi(theta, fi, fj);
            jac[(row, i)] = theta[j] * phi;
            jac[(row, j)] = theta[i] * phi;
            if fi != fj {
                jac[(row, self.phi_index[fi][fj])] = theta[i] * theta[j];
            }
        }
        jac
    }

    /// Loadings from within-factor correlations, factor correlations from
    /// the between-factor block.
    fn start_values(&self) -> DVector<f64> {
        let p = self.n_items();
        let mut theta = DVector::zeros(self.n_parameters());
        let mut within = vec![(0.0, 0usize); p];
        for (&(i, j), &r) in self.pairs.iter().zip(&self.r) {
            if self.bound.factor_of[i] == self.bound.factor_of[j] {
                within[i].0 += r.abs();
                within[i].1 += 1;
                within[j].0 += r.abs();
                within[j].1 += 1;
            }
        }
        for i in 0..p {
            let (sum, count) = within[i];
            let start = if count > 0 {
                (sum / count as f64).sqrt()
            } else {
                0.7
            };
            theta[i] = start.clamp(START_LOADING_RANGE.0, START_LOADING_RANGE.1);
        }

        let k = self.n_factors;
        let mut between = vec![vec![(0.0, 0usize); k]; k];
        for (&(i, j), &r) in self.pairs.iter().zip(&self.r) {
            let (fi, fj) = (self.bound.factor_of[i], self.bound.factor_of[j]);
            if fi != fj {
                let scaled = r / (theta[i] * theta[j]);
                between[fi][fj].0 += scaled;
                between[fi][fj].1 += 1;
            }
        }
        for a in 0..k {
            for b in (a + 1)..k {
                let (s1, c1) = between[a][b];
                let (s2, c2) = between[b][a];
                let count = (c1 + c2).max(1) as f64;
                theta[self.phi_index[a][b]] = ((s1 + s2) / count).clamp(-0.9, 0.9);
            }
        }
        theta
    }
}

/// Levenberg-Marquardt minimisation of the DWLS objective.
fn minimize(problem: &Problem, config: &CfaConfig) -> Result<(DVector<f64>, f64, usize)> {
    let q = problem.n_parameters();
    let w = DVector::from_vec(problem.w.clone());
    let mut theta = problem.start_values();
    let mut f = problem.objective(&theta);
    let mut damping = INITIAL_DAMPING;

    for iteration in 1..=config.max_iterations {
        let e = problem.residuals(&theta);
        let jac = problem.jacobian(&theta);
        let weighted_t = DMatrix::from_fn(q, jac.nrows(), |c, r| jac[(r, c)] * w[r]);
        let normal = &weighted_t * &jac;
        let gradient = &weighted_t * &e;

        let mut accepted = None;
        while damping <= MAX_DAMPING {
            let mut damped = normal.clone();
            for d in 0..q {
                damped[(d, d)] += damping * normal[(d, d)].max(MIN_VARIANCE);
            }
            if let Some(chol) = damped.cholesky() {
                let candidate = &theta + chol.solve(&gradient);
                let fc = problem.objective(&candidate);
                if fc.is_finite() && fc < f {
                    accepted = Some((candidate, fc));
                    damping = (damping / 10.0).max(1e-12);
                    break;
                }
            }
            damping *= 10.0;
        }

        let Some((candidate, fc)) = accepted else {
            // No downhill step exists at any damping: a numerical minimum
            return Ok((theta, f, iteration));
        };
        let decrease = f - fc;
        theta = candidate;
        f = fc;
        if decrease <= config.tolerance * (f + decrease + config.tolerance) {
            return Ok((theta, f, iteration));
        }
    }

    Err(StudyError::fit_failure(
        FitModel::Cfa,
        FitFailureReason::NotConverged {
            iterations: config.max_iterations,
            objective: f,
        },
    ))
}

/// Fit a measurement model to a correlation matrix by DWLS.
pub fn fit_cfa(
    cor: &CorrelationMatrix,
    model: &MeasurementModel,
    config: &CfaConfig,
) -> Result<ConfirmatoryFit> {
    let bound = model.bind(cor.labels())?;
    let k = model.n_factors();
    let problem = Problem::new(cor, &bound, k);
    let (mut theta, chi_square, iterations) = minimize(&problem, config)?;

    // Reflect factors whose loadings point mostly negative
    for a in 0..k {
        let sum: f64 = (0..problem.n_items())
            .filter(|&i| bound.factor_of[i] == a)
            .map(|i| theta[i])
            .sum();
        if sum < 0.0 {
            for i in (0..problem.n_items()).filter(|&i| bound.factor_of[i] == a) {
                theta[i] = -theta[i];
            }
            for b in (0..k).filter(|&b| b != a) {
                let idx = problem.phi_index[a][b];
                theta[idx] = -theta[idx];
            }
        }
    }

    let phi = DMatrix::from_fn(k, k, |a, b| problem.phi(&theta, a, b));
    if !is_positive_definite(&phi) {
        return Err(StudyError::fit_failure(
            FitModel::Cfa,
            FitFailureReason::NonPositiveDefinite {
                matrix: "factor correlation matrix".to_string(),
            },
        ));
    }
    let p = problem.n_items();
    let implied = DMatrix::from_fn(p, p, |i, j| {
        if i == j {
            1.0
        } else {
            problem.implied(&theta, i, j)
        }
    });
    if !is_positive_definite(&implied) {
        return Err(StudyError::fit_failure(
            FitModel::Cfa,
            FitFailureReason::NonPositiveDefinite {
                matrix: "model-implied correlation matrix".to_string(),
            },
        ));
    }

    let items: Vec<&str> = model.items().collect();
    let mut warnings = Vec::new();
    let loadings: Vec<StandardizedLoading> = (0..p)
        .map(|i| {
            let loading = theta[i];
            let residual_variance = 1.0 - loading * loading;
            if residual_variance < 0.0 {
                warnings.push(format!(
                    "item '{}' has a negative residual variance ({:.3})",
                    items[i], residual_variance
                ));
            }
            StandardizedLoading {
                factor: model.factors()[bound.factor_of[i]].name.clone(),
                item: items[i].to_string(),
                loading,
                residual_variance,
            }
        })
        .collect();
    for w in &warnings {
        log::warn!("{}", w);
    }

    let mut factor_correlations = Vec::new();
    for a in 0..k {
        for b in (a + 1)..k {
            factor_correlations.push(FactorCorrelation {
                left: model.factors()[a].name.clone(),
                right: model.factors()[b].name.clone(),
                value: phi[(a, b)],
            });
        }
    }

    let residuals = problem.residuals(&theta);
    let srmr = (residuals.norm_squared() / residuals.len() as f64).sqrt();
    let weighted_total: f64 = problem.r.iter().zip(&problem.w).map(|(r, w)| w * r * r).sum();
    let stats = FitStatistics {
        chi_square,
        df: model.degrees_of_freedom() as f64,
        baseline_chi_square: weighted_total,
        baseline_df: problem.pairs.len() as f64,
        n_observations: cor.n_observations(),
        n_elements: problem.pairs.len(),
        weighted_total,
        srmr,
    };
    let indices = FitIndices::compute(&stats)?;
    log::info!(
        "CFA converged in {} iterations: chisq = {:.2}, df = {}, CFI = {:.3}, RMSEA = {:.3}",
        iterations,
        indices.chi_square,
        indices.df,
        indices.cfi,
        indices.rmsea
    );

    Ok(ConfirmatoryFit {
        model: model.clone(),
        loadings,
        factor_correlations,
        phi,
        indices,
        n_observations: cor.n_observations(),
        iterations,
        warnings,
    })
}
