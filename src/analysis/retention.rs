//! Factor retention criteria.
//!
//! Every criterion works on the descending eigenvalues of the item
//! correlation matrix and recommends a number of factors. The results are
//! advisory: the confirmatory model's factor count is fixed by theory and
//! never taken from here.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;

use super::polychoric::CorrelationMatrix;
use crate::config::{ParallelReference, RetentionConfig};
use crate::errors::{Result, StudyError};
use crate::math::matrix::{pearson_correlation, sorted_eigenvalues, sorted_symmetric_eigen};
use crate::math::stats::{mean, quantile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionCriterion {
    Kaiser,
    ParallelAnalysis,
    OptimalCoordinates,
    AccelerationFactor,
    VelicerMap,
    EmpiricalKaiser,
}

impl fmt::Display for RetentionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Kaiser => "Kaiser (eigenvalue > 1)",
            Self::ParallelAnalysis => "Parallel analysis",
            Self::OptimalCoordinates => "Optimal coordinates",
            Self::AccelerationFactor => "Acceleration factor",
            Self::VelicerMap => "Velicer MAP",
            Self::EmpiricalKaiser => "Empirical Kaiser criterion",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionResult {
    pub criterion: RetentionCriterion,
    pub factors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionReport {
    pub eigenvalues: Vec<f64>,
    /// Random-data reference eigenvalues from parallel analysis
    pub parallel_reference: Vec<f64>,
    /// Average squared partial correlation after removing 0..p-1 components
    pub map_values: Vec<f64>,
    pub criteria: Vec<CriterionResult>,
    pub consensus: usize,
    /// Share of criteria agreeing with the consensus
    pub support: f64,
}

pub fn estimate_factor_count(
    cor: &CorrelationMatrix,
    config: &RetentionConfig,
) -> Result<RetentionReport> {
    let eigenvalues = sorted_eigenvalues(cor.matrix());
    let p = eigenvalues.len();
    if p < 3 {
        return Err(StudyError::degenerate(format!(
            "factor retention needs at least 3 items, got {}",
            p
        )));
    }

    let parallel_reference = parallel_reference(cor.n_observations(), p, config)?;
    let map_values = velicer_map_values(cor.matrix());

    let criteria = vec![
        CriterionResult {
            criterion: RetentionCriterion::Kaiser,
            factors: kaiser(&eigenvalues),
        },
        CriterionResult {
            criterion: RetentionCriterion::ParallelAnalysis,
            factors: leading_above(&eigenvalues, &parallel_reference),
        },
        CriterionResult {
            criterion: RetentionCriterion::OptimalCoordinates,
            factors: optimal_coordinates(&eigenvalues, &parallel_reference),
        },
        CriterionResult {
            criterion: RetentionCriterion::AccelerationFactor,
            factors: acceleration_factor(&eigenvalues),
        },
        CriterionResult {
            criterion: RetentionCriterion::VelicerMap,
            factors: argmin(&map_values),
        },
        CriterionResult {
            criterion: RetentionCriterion::EmpiricalKaiser,
            factors: empirical_kaiser(&eigenvalues, cor.n_observations()),
        },
    ];

    let (consensus, support) = consensus(&criteria);
    log::info!(
        "Factor retention consensus: {} factor(s) ({:.0}% of criteria)",
        consensus,
        support * 100.0
    );

    Ok(RetentionReport {
        eigenvalues,
        parallel_reference,
        map_values,
        criteria,
        consensus,
        support,
    })
}

/// Number of eigenvalues greater than one.
pub fn kaiser(eigenvalues: &[f64]) -> usize {
    eigenvalues.iter().filter(|&&v| v > 1.0).count()
}

/// Count of leading eigenvalues above their reference values.
fn leading_above(eigenvalues: &[f64], reference: &[f64]) -> usize {
    eigenvalues
        .iter()
        .zip(reference)
        .take_while(|(v, r)| v > r)
        .count()
}

/// Horn's parallel analysis reference: eigenvalues of correlation matrices
/// of uncorrelated normal data with the same shape.
pub fn parallel_reference(n: usize, p: usize, config: &RetentionConfig) -> Result<Vec<f64>> {
    if n <= p {
        return Err(StudyError::degenerate(format!(
            "parallel analysis needs more observations ({}) than items ({})",
            n, p
        )));
    }
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
    let labels: Vec<String> = (1..=p).map(|i| format!("V{}", i)).collect();
    let mut draws: Vec<Vec<f64>> = vec![Vec::with_capacity(config.parallel_iterations); p];

    for _ in 0..config.parallel_iterations {
        let data = DMatrix::from_fn(n, p, |_, _| {
            let z: f64 = StandardNormal.sample(&mut rng);
            z
        });
        let r = pearson_correlation(&data, &labels)?;
        for (k, v) in sorted_eigenvalues(&r).into_iter().enumerate() {
            draws[k].push(v);
        }
    }

    Ok(draws
        .iter()
        .map(|values| match config.reference {
            ParallelReference::Mean => mean(values),
            ParallelReference::Percentile => quantile(values, config.percentile),
        })
        .collect())
}

/// Optimal coordinates: leading eigenvalues that exceed both the value
/// extrapolated from the line through the next and the last eigenvalue, and
/// the parallel-analysis reference.
pub fn optimal_coordinates(eigenvalues: &[f64], reference: &[f64]) -> usize {
    let p = eigenvalues.len();
    let last = eigenvalues[p - 1];
    let mut count = 0;
    for i in 0..p.saturating_sub(2) {
        let next = eigenvalues[i + 1];
        let span = (p - 1 - (i + 1)) as f64;
        let slope = (last - next) / span;
        let predicted = next - slope;
        if eigenvalues[i] > predicted && eigenvalues[i] > reference[i] {
            count += 1;
        } else {
            break;
        }
    }
    count
}

/// Acceleration factor: the elbow where the second difference peaks,
/// minus one.
pub fn acceleration_factor(eigenvalues: &[f64]) -> usize {
    let p = eigenvalues.len();
    let mut best = (1, f64::NEG_INFINITY);
    for i in 1..p - 1 {
        let af = eigenvalues[i + 1] - 2.0 * eigenvalues[i] + eigenvalues[i - 1];
        if af > best.1 {
            best = (i, af);
        }
    }
    // `i` is 0-based, so the 1-based elbow minus one equals `i`
    best.0
}

/// Velicer's minimum average partial values for 0..p-1 extracted components.
pub fn velicer_map_values(r: &DMatrix<f64>) -> Vec<f64> {
    let p = r.nrows();
    let (values, vectors) = sorted_symmetric_eigen(r);
    let off_diagonal = (p * (p - 1)) as f64;

    let mut out = Vec::with_capacity(p);
    out.push(
        (0..p)
            .flat_map(|i| (0..p).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| r[(i, j)] * r[(i, j)])
            .sum::<f64>()
            / off_diagonal,
    );

    for m in 1..p {
        let loadings = DMatrix::from_fn(p, m, |i, k| vectors[(i, k)] * values[k].max(0.0).sqrt());
        let partial_cov = r - &loadings * loadings.transpose();
        let d: Vec<f64> = (0..p).map(|i| partial_cov[(i, i)]).collect();
        if d.iter().any(|&v| v <= 1e-12) {
            break;
        }
        let mut sum = 0.0;
        for i in 0..p {
            for j in (0..p).filter(|&j| j != i) {
                let pc = partial_cov[(i, j)] / (d[i] * d[j]).sqrt();
                sum += pc * pc;
            }
        }
        out.push(sum / off_diagonal);
    }
    out
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Empirical Kaiser criterion (Braeken & van Assen).
pub fn empirical_kaiser(eigenvalues: &[f64], n: usize) -> usize {
    let p = eigenvalues.len() as f64;
    let base = (1.0 + (p / n as f64).sqrt()).powi(2);
    let mut explained = 0.0;
    let mut count = 0;
    for (j, &v) in eigenvalues.iter().enumerate() {
        let reference = (base * (p - explained) / (p - j as f64)).max(1.0);
        if v > reference {
            count += 1;
            explained += v;
        } else {
            break;
        }
    }
    count
}

/// Most frequent recommendation; ties go to the smaller factor count.
pub fn consensus(criteria: &[CriterionResult]) -> (usize, f64) {
    let mut votes: BTreeMap<usize, usize> = BTreeMap::new();
    for c in criteria {
        *votes.entry(c.factors).or_default() += 1;
    }
    let (factors, count) = votes
        .iter()
        .fold((0, 0), |best, (&k, &v)| if v > best.1 { (k, v) } else { best });
    (factors, count as f64 / criteria.len().max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Population correlation matrix of a three-factor model.
    fn three_factor_matrix(sizes: &[usize], loading: f64, phi: f64) -> CorrelationMatrix {
        let factor_of: Vec<usize> = sizes
            .iter()
            .enumerate()
            .flat_map(|(f, &s)| std::iter::repeat(f).take(s))
            .collect();
        let p = factor_of.len();
        let m = DMatrix::from_fn(p, p, |i, j| {
            if i == j {
                1.0
            } else if factor_of[i] == factor_of[j] {
                loading * loading
            } else {
                loading * loading * phi
            }
        });
        let labels = (1..=p).map(|i| format!("I{}", i)).collect();
        CorrelationMatrix::from_matrix(labels, m, 500).unwrap()
    }

    #[test]
    fn test_three_factor_structure_recovered() {
        let cor = three_factor_matrix(&[4, 6, 5], 0.7, 0.3);
        let report = estimate_factor_count(&cor, &RetentionConfig::default()).unwrap();
        let by = |c: RetentionCriterion| {
            report
                .criteria
                .iter()
                .find(|r| r.criterion == c)
                .map(|r| r.factors)
                .unwrap()
        };
        assert_eq!(by(RetentionCriterion::Kaiser), 3);
        assert_eq!(by(RetentionCriterion::ParallelAnalysis), 3);
        assert_eq!(by(RetentionCriterion::EmpiricalKaiser), 3);
        assert_eq!(by(RetentionCriterion::VelicerMap), 3);
        assert_eq!(report.consensus, 3);
        assert_eq!(report.eigenvalues.len(), 15);
    }

    #[test]
    fn test_acceleration_factor_elbow() {
        // Sharp elbow after the first eigenvalue
        let eig = [5.0, 1.0, 0.9, 0.8, 0.7];
        assert_eq!(acceleration_factor(&eig), 1);
    }

    #[test]
    fn test_consensus_tie_goes_to_fewer_factors() {
        let results = [2, 3, 3, 2, 4]
            .iter()
            .map(|&factors| CriterionResult {
                criterion: RetentionCriterion::Kaiser,
                factors,
            })
            .collect::<Vec<_>>();
        let (k, support) = consensus(&results);
        assert_eq!(k, 2);
        assert!((support - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_parallel_reference_is_reproducible_and_decreasing() {
        let config = RetentionConfig {
            parallel_iterations: 20,
            ..RetentionConfig::default()
        };
        let a = parallel_reference(200, 6, &config).unwrap();
        let b = parallel_reference(200, 6, &config).unwrap();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] >= w[1]));
        assert!(a[0] > 1.0);
    }

    #[test]
    fn test_identity_matrix_has_no_factors() {
        let labels = (1..=5).map(|i| format!("I{}", i)).collect();
        let cor = CorrelationMatrix::from_matrix(labels, DMatrix::identity(5, 5), 300).unwrap();
        let eig = sorted_eigenvalues(cor.matrix());
        assert_eq!(kaiser(&eig), 0);
        assert_eq!(empirical_kaiser(&eig, 300), 0);
        assert_eq!(argmin(&velicer_map_values(cor.matrix())), 0);
    }
}
