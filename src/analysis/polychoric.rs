//! Polychoric correlations between ordinal items.
//!
//! Each item is treated as a discretised standard normal variable. The
//! estimator is the usual two-step one:
//!
//! 1. thresholds come from the marginal cumulative proportions of each item;
//! 2. with thresholds fixed, the latent correlation maximises the multinomial
//!    likelihood of the bivariate contingency table.
//!
//! The sampling variance of each estimate comes from the curvature of the
//! log-likelihood at the optimum and is carried alongside the matrix, since
//! the confirmatory estimator weights residuals by it.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::config::CorrelationConfig;
use crate::data::ItemResponses;
use crate::errors::{Result, StudyError};
use crate::math::matrix::{pearson_correlation, serialize_matrix, smooth_correlation};
use crate::math::normal::{bvn_cdf, qnorm};
use crate::math::optimize::brent_minimize;
use crate::math::SmoothingReport;

/// Search interval for a latent correlation
const RHO_BOUND: f64 = 0.9999;
const BRENT_TOLERANCE: f64 = 1e-8;
const BRENT_MAX_ITER: usize = 200;
const MIN_PROBABILITY: f64 = 1e-300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    Polychoric,
    Pearson,
    /// Matrix given directly rather than estimated here
    Supplied,
}

/// Estimate for one item pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEstimate {
    pub rho: f64,
    /// Asymptotic sampling variance, NaN when the curvature is not usable
    pub variance: f64,
    pub iterations: usize,
}

/// Immutable item correlation matrix.
///
/// Symmetric with unit diagonal and entries in [-1, 1]. Built once per data
/// set and shared by reference between consumers.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    method: CorrelationMethod,
    labels: Vec<String>,
    n_observations: usize,
    #[serde(serialize_with = "serialize_matrix")]
    matrix: DMatrix<f64>,
    #[serde(skip)]
    sampling_variance: DMatrix<f64>,
    #[serde(skip)]
    thresholds: Vec<Vec<f64>>,
    smoothing: SmoothingReport,
}

impl CorrelationMatrix {
    /// Polychoric correlations of every item pair.
    pub fn polychoric(items: &ItemResponses, config: &CorrelationConfig) -> Result<Self> {
        let n = items.n_respondents();
        if n < 2 {
            return Err(StudyError::degenerate(format!(
                "{} respondents are too few for correlations",
                n
            )));
        }

        let ordinal: Vec<OrdinalItem> = items
            .labels()
            .iter()
            .enumerate()
            .map(|(j, label)| OrdinalItem::new(label, &items.column(j)))
            .collect::<Result<_>>()?;

        let p = ordinal.len();
        let mut raw = DMatrix::identity(p, p);
        let mut variance = DMatrix::zeros(p, p);
        for i in 0..p {
            for j in (i + 1)..p {
                let est = estimate_pair(&ordinal[i], &ordinal[j], config.zero_cell_correction);
                raw[(i, j)] = est.rho;
                raw[(j, i)] = est.rho;
                variance[(i, j)] = est.variance;
                variance[(j, i)] = est.variance;
            }
        }

        let (matrix, smoothing) = smooth_correlation(&raw, config.smoothing_epsilon);
        if smoothing.applied {
            log::warn!(
                "Polychoric matrix was not positive definite (min eigenvalue {:.3e}); \
                 smoothed {} eigenvalue(s), max entry change {:.4}",
                smoothing.min_eigenvalue_before,
                smoothing.eigenvalues_adjusted,
                smoothing.max_abs_change
            );
        }

        Ok(Self {
            method: CorrelationMethod::Polychoric,
            labels: items.labels().to_vec(),
            n_observations: n,
            matrix,
            sampling_variance: variance,
            thresholds: ordinal.into_iter().map(|o| o.thresholds).collect(),
            smoothing,
        })
    }

    /// Product-moment correlations, with normal-theory sampling variances.
    pub fn pearson(items: &ItemResponses, config: &CorrelationConfig) -> Result<Self> {
        let n = items.n_respondents();
        if n < 3 {
            return Err(StudyError::degenerate(format!(
                "{} respondents are too few for correlations",
                n
            )));
        }
        let raw = pearson_correlation(&items.to_matrix(), items.labels())?;
        let variance = raw.map(|r| (1.0 - r * r).powi(2) / n as f64);
        let (matrix, smoothing) = smooth_correlation(&raw, config.smoothing_epsilon);
        Ok(Self {
            method: CorrelationMethod::Pearson,
            labels: items.labels().to_vec(),
            n_observations: n,
            matrix,
            sampling_variance: variance,
            thresholds: Vec::new(),
            smoothing,
        })
    }

    /// Wrap a known correlation matrix estimated from `n` observations.
    pub fn from_matrix(labels: Vec<String>, matrix: DMatrix<f64>, n: usize) -> Result<Self> {
        let p = labels.len();
        if matrix.shape() != (p, p) {
            return Err(StudyError::data_shape(format!(
                "{} labels for a {}x{} matrix",
                p,
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        for i in 0..p {
            if (matrix[(i, i)] - 1.0).abs() > 1e-9 {
                return Err(StudyError::data_shape(format!(
                    "diagonal entry {} is {}, expected 1",
                    i + 1,
                    matrix[(i, i)]
                )));
            }
            for j in 0..i {
                let v = matrix[(i, j)];
                if (v - matrix[(j, i)]).abs() > 1e-9 || !(-1.0..=1.0).contains(&v) {
                    return Err(StudyError::data_shape(format!(
                        "entry ({}, {}) breaks symmetry or leaves [-1, 1]",
                        i + 1,
                        j + 1
                    )));
                }
            }
        }
        let variance = matrix.map(|r| (1.0 - r * r).powi(2) / n.max(1) as f64);
        Ok(Self {
            method: CorrelationMethod::Supplied,
            labels,
            n_observations: n,
            matrix,
            sampling_variance: variance,
            thresholds: Vec::new(),
            smoothing: SmoothingReport::default(),
        })
    }

    pub fn method(&self) -> CorrelationMethod {
        self.method
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn n_items(&self) -> usize {
        self.labels.len()
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    pub fn sampling_variance(&self, i: usize, j: usize) -> f64 {
        self.sampling_variance[(i, j)]
    }

    /// Latent thresholds of item `i`, without the infinite end points.
    /// Empty for Pearson matrices.
    pub fn thresholds(&self, i: usize) -> &[f64] {
        self.thresholds
            .get(i)
            .map(|t| &t[1..t.len() - 1])
            .unwrap_or(&[])
    }

    pub fn smoothing(&self) -> &SmoothingReport {
        &self.smoothing
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// One item recoded to consecutive categories.
struct OrdinalItem {
    codes: Vec<usize>,
    /// k + 1 cut points including -inf and +inf
    thresholds: Vec<f64>,
}

impl OrdinalItem {
    fn new(label: &str, values: &[i32]) -> Result<Self> {
        let mut categories = values.to_vec();
        categories.sort_unstable();
        categories.dedup();
        if categories.len() < 2 {
            return Err(StudyError::degenerate(format!(
                "item '{}' has fewer than two observed categories",
                label
            )));
        }

        let codes: Vec<usize> = values
            .iter()
            .map(|v| categories.binary_search(v).unwrap_or_default())
            .collect();
        let mut counts = vec![0usize; categories.len()];
        for &c in &codes {
            counts[c] += 1;
        }

        let n = values.len() as f64;
        let mut thresholds = Vec::with_capacity(categories.len() + 1);
        thresholds.push(f64::NEG_INFINITY);
        let mut cumulative = 0usize;
        for &count in &counts[..counts.len() - 1] {
            cumulative += count;
            thresholds.push(qnorm(cumulative as f64 / n));
        }
        thresholds.push(f64::INFINITY);

        Ok(Self { codes, thresholds })
    }

    fn n_categories(&self) -> usize {
        self.thresholds.len() - 1
    }
}

/// Polychoric correlation of two ordinal vectors of equal length.
pub fn polychoric_pair(x: &[i32], y: &[i32], zero_cell_correction: f64) -> Result<PairEstimate> {
    if x.len() != y.len() {
        return Err(StudyError::data_shape(format!(
            "item vectors differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let a = OrdinalItem::new("x", x)?;
    let b = OrdinalItem::new("y", y)?;
    Ok(estimate_pair(&a, &b, zero_cell_correction))
}

fn estimate_pair(x: &OrdinalItem, y: &OrdinalItem, correction: f64) -> PairEstimate {
    let table = contingency_table(x, y, correction);
    let negative_loglik =
        |rho: f64| -log_likelihood(&table, &x.thresholds, &y.thresholds, rho);

    let best = brent_minimize(
        negative_loglik,
        -RHO_BOUND,
        RHO_BOUND,
        BRENT_TOLERANCE,
        BRENT_MAX_ITER,
    );

    let h = 1e-4_f64.min((1.0 - best.x.abs()) / 2.0);
    let curvature = (negative_loglik(best.x + h) - 2.0 * best.value + negative_loglik(best.x - h))
        / (h * h);
    let variance = if curvature.is_finite() && curvature > 0.0 {
        1.0 / curvature
    } else {
        f64::NAN
    };

    PairEstimate {
        rho: best.x,
        variance,
        iterations: best.iterations,
    }
}

fn contingency_table(x: &OrdinalItem, y: &OrdinalItem, correction: f64) -> Vec<Vec<f64>> {
    let mut table = vec![vec![0.0; y.n_categories()]; x.n_categories()];
    for (&a, &b) in x.codes.iter().zip(&y.codes) {
        table[a][b] += 1.0;
    }
    for cell in table.iter_mut().flatten() {
        if *cell == 0.0 {
            *cell = correction;
        }
    }
    table
}

fn log_likelihood(table: &[Vec<f64>], tx: &[f64], ty: &[f64], rho: f64) -> f64 {
    let cdf: Vec<Vec<f64>> = tx
        .iter()
        .map(|&h| ty.iter().map(|&k| bvn_cdf(h, k, rho)).collect())
        .collect();

    let mut total = 0.0;
    for (a, row) in table.iter().enumerate() {
        for (b, &count) in row.iter().enumerate() {
            if count == 0.0 {
                continue;
            }
            let p = cdf[a + 1][b + 1] - cdf[a][b + 1] - cdf[a + 1][b] + cdf[a][b];
            total += count * p.max(MIN_PROBABILITY).ln();
        }
    }
    total
}
