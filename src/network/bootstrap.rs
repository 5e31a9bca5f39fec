//! Bootstrap stability of the network dimensions.
//!
//! Every replicate resamples respondents with replacement, re-estimates the
//! correlation matrix and the network, and records its communities.
//! Replicate `i` draws from its own generator seeded with `seed + i`, so the
//! report does not depend on the number of workers or on scheduling.

use indicatif::{ParallelProgressIterator, ProgressBar};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::Serialize;

use super::ega::{dimension_items, exploratory_graph_analysis, EgaResult};
use crate::analysis::CorrelationMatrix;
use crate::config::{CorrelationConfig, NetworkConfig, NetworkCorrelation};
use crate::data::ItemResponses;
use crate::errors::{Result, StudyError};
use crate::math::matrix::serialize_matrix;
use crate::math::stats::median;
use crate::observability::{increment_processed, set_phase, set_progress, StudyPhase};

/// Share of replicates estimating a given number of dimensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionFrequency {
    pub n_dimensions: usize,
    pub count: usize,
    pub proportion: f64,
}

/// How often an item lands in the replicate community matched to its
/// empirical dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStability {
    pub item: String,
    pub empirical_dimension: Option<usize>,
    /// `None` for items the empirical network leaves unassigned
    pub stability: Option<f64>,
}

/// How often an empirical dimension reappears with exactly the same items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionConsistency {
    pub dimension: usize,
    pub items: Vec<String>,
    pub consistency: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub iterations: usize,
    pub successful: usize,
    pub failed: usize,
    pub seed: u64,
    pub workers: usize,
    pub median_dimensions: f64,
    pub frequencies: Vec<DimensionFrequency>,
    pub item_stability: Vec<ItemStability>,
    pub structural_consistency: Vec<DimensionConsistency>,
    pub labels: Vec<String>,
    /// Share of replicates placing both items in the same dimension
    #[serde(serialize_with = "serialize_matrix")]
    pub co_assignment: DMatrix<f64>,
}

/// Communities of one successful replicate.
#[derive(Debug, Clone, PartialEq)]
struct Replicate {
    membership: Vec<Option<usize>>,
    n_dimensions: usize,
}

/// Correlation matrix of the kind the network is configured to use.
pub fn network_correlation(
    items: &ItemResponses,
    network: &NetworkConfig,
    correlation: &CorrelationConfig,
) -> Result<CorrelationMatrix> {
    match network.correlation {
        NetworkCorrelation::Polychoric => CorrelationMatrix::polychoric(items, correlation),
        NetworkCorrelation::Pearson => CorrelationMatrix::pearson(items, correlation),
    }
}

/// Row indices drawn with replacement.
pub fn resample_rows(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

fn run_replicate(
    items: &ItemResponses,
    index: usize,
    network: &NetworkConfig,
    correlation: &CorrelationConfig,
) -> Option<Replicate> {
    let rows = resample_rows(items.n_respondents(), network.seed.wrapping_add(index as u64));
    let sample = items.select_rows(&rows);
    let outcome = network_correlation(&sample, network, correlation)
        .and_then(|cor| exploratory_graph_analysis(&cor, network));
    increment_processed();
    match outcome {
        Ok(ega) => Some(Replicate {
            membership: ega.membership,
            n_dimensions: ega.n_dimensions,
        }),
        Err(e) => {
            log::debug!("bootstrap replicate {} failed: {}", index, e);
            None
        }
    }
}

/// Resample, refit and summarise on a dedicated pool of `network.workers`
/// threads.
pub fn bootstrap_stability(
    items: &ItemResponses,
    empirical: &EgaResult,
    network: &NetworkConfig,
    correlation: &CorrelationConfig,
    progress: &ProgressBar,
) -> Result<BootstrapReport> {
    let iterations = network.bootstrap_iterations;
    if iterations == 0 {
        return Err(StudyError::config("network.bootstrap_iterations must be at least 1"));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(network.workers.max(1))
        .build()
        .map_err(|e| StudyError::analysis(format!("failed to start bootstrap workers: {}", e)))?;

    log::info!(
        "Bootstrapping network dimensions: {} replicates on {} workers",
        iterations,
        network.workers
    );
    let _phase = set_phase(StudyPhase::Bootstrap);
    set_progress(0, iterations);
    progress.set_length(iterations as u64);
    let outcomes: Vec<Option<Replicate>> = pool.install(|| {
        (0..iterations)
            .into_par_iter()
            .progress_with(progress.clone())
            .map(|i| run_replicate(items, i, network, correlation))
            .collect()
    });
    progress.finish_and_clear();

    let replicates: Vec<Replicate> = outcomes.into_iter().flatten().collect();
    let failed = iterations - replicates.len();
    if replicates.is_empty() {
        return Err(StudyError::analysis(format!(
            "all {} bootstrap replicates failed",
            iterations
        )));
    }
    if failed > 0 {
        log::warn!("{} of {} bootstrap replicates failed", failed, iterations);
    }

    Ok(summarise(empirical, &replicates, iterations, network))
}

fn summarise(
    empirical: &EgaResult,
    replicates: &[Replicate],
    iterations: usize,
    network: &NetworkConfig,
) -> BootstrapReport {
    let labels = empirical.labels().to_vec();
    let counts: Vec<f64> = replicates.iter().map(|r| r.n_dimensions as f64).collect();
    let empirical_dims = dimension_items(&empirical.membership, empirical.n_dimensions);

    BootstrapReport {
        iterations,
        successful: replicates.len(),
        failed: iterations - replicates.len(),
        seed: network.seed,
        workers: network.workers,
        median_dimensions: median(&counts),
        frequencies: dimension_frequencies(replicates),
        item_stability: item_stability(
            &labels,
            &empirical.membership,
            &empirical_dims,
            replicates,
        ),
        structural_consistency: structural_consistency(&labels, &empirical_dims, replicates),
        co_assignment: co_assignment(labels.len(), replicates),
        labels,
    }
}

fn dimension_frequencies(replicates: &[Replicate]) -> Vec<DimensionFrequency> {
    let max = replicates.iter().map(|r| r.n_dimensions).max().unwrap_or(0);
    let mut counts = vec![0usize; max + 1];
    for r in replicates {
        counts[r.n_dimensions] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .filter(|(_, count)| *count > 0)
        .map(|(n_dimensions, count)| DimensionFrequency {
            n_dimensions,
            count,
            proportion: count as f64 / replicates.len() as f64,
        })
        .collect()
}

/// Replicate dimension sharing the most items with `target`; ties go to the
/// lower dimension, and no overlap at all means no match.
fn best_match(target: &[usize], replicate: &Replicate) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for d in 1..=replicate.n_dimensions {
        let overlap = target
            .iter()
            .filter(|&&item| replicate.membership[item] == Some(d))
            .count();
        if overlap > 0 && best.map_or(true, |(_, o)| overlap > o) {
            best = Some((d, overlap));
        }
    }
    best.map(|(d, _)| d)
}

fn item_stability(
    labels: &[String],
    membership: &[Option<usize>],
    empirical_dims: &[Vec<usize>],
    replicates: &[Replicate],
) -> Vec<ItemStability> {
    let mut hits = vec![0usize; labels.len()];
    for replicate in replicates {
        for items in empirical_dims {
            let Some(matched) = best_match(items, replicate) else {
                continue;
            };
            for &item in items {
                if replicate.membership[item] == Some(matched) {
                    hits[item] += 1;
                }
            }
        }
    }
    labels
        .iter()
        .zip(membership)
        .zip(hits)
        .map(|((label, &dimension), hit)| ItemStability {
            item: label.clone(),
            empirical_dimension: dimension,
            stability: dimension.map(|_| hit as f64 / replicates.len() as f64),
        })
        .collect()
}

fn structural_consistency(
    labels: &[String],
    empirical_dims: &[Vec<usize>],
    replicates: &[Replicate],
) -> Vec<DimensionConsistency> {
    empirical_dims
        .iter()
        .enumerate()
        .map(|(d, items)| {
            let identical = replicates
                .iter()
                .filter(|r| {
                    let replicated = dimension_items(&r.membership, r.n_dimensions);
                    replicated.iter().any(|dim| dim == items)
                })
                .count();
            DimensionConsistency {
                dimension: d + 1,
                items: items.iter().map(|&i| labels[i].clone()).collect(),
                consistency: identical as f64 / replicates.len() as f64,
            }
        })
        .collect()
}

fn co_assignment(p: usize, replicates: &[Replicate]) -> DMatrix<f64> {
    let mut together = DMatrix::zeros(p, p);
    for r in replicates {
        for i in 0..p {
            for j in 0..p {
                if r.membership[i].is_some() && r.membership[i] == r.membership[j] {
                    together[(i, j)] += 1.0;
                }
            }
        }
    }
    together / replicates.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn replicate(membership: &[Option<usize>]) -> Replicate {
        let n_dimensions = membership.iter().flatten().max().copied().unwrap_or(0);
        Replicate {
            membership: membership.to_vec(),
            n_dimensions,
        }
    }

    #[test]
    fn test_resample_reproducible_and_in_range() {
        let a = resample_rows(50, 7);
        assert_eq!(a, resample_rows(50, 7));
        assert_ne!(a, resample_rows(50, 8));
        assert!(a.iter().all(|&r| r < 50));
    }

    #[test]
    fn test_best_match_prefers_largest_overlap() {
        let r = replicate(&[Some(1), Some(2), Some(2), Some(1)]);
        assert_eq!(best_match(&[1, 2, 3], &r), Some(2));
        assert_eq!(best_match(&[0, 1], &r), Some(1));
    }

    #[test]
    fn test_item_stability_counts_matched_items() {
        let labels: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let membership = vec![Some(1), Some(1), Some(2), Some(2)];
        let dims = dimension_items(&membership, 2);
        let replicates = vec![
            replicate(&[Some(1), Some(1), Some(2), Some(2)]),
            // Labels permuted, same structure
            replicate(&[Some(2), Some(2), Some(1), Some(1)]),
            // Item b moved to the other dimension
            replicate(&[Some(1), Some(2), Some(2), Some(2)]),
            replicate(&[Some(1), Some(1), None, Some(1)]),
        ];
        let stability = item_stability(&labels, &membership, &dims, &replicates);
        let values: Vec<f64> = stability.iter().map(|s| s.stability.unwrap()).collect();
        assert_eq!(values, vec![1.0, 0.75, 0.75, 1.0]);
    }

    #[test]
    fn test_unassigned_item_has_no_stability() {
        let labels: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let membership = vec![Some(1), Some(1), None];
        let dims = dimension_items(&membership, 1);
        let stability = item_stability(
            &labels,
            &membership,
            &dims,
            &[replicate(&[Some(1), Some(1), Some(1)])],
        );
        assert_eq!(stability[2].stability, None);
        assert_eq!(stability[0].stability, Some(1.0));
    }

    #[test]
    fn test_structural_consistency_requires_identical_items() {
        let labels: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let dims = vec![vec![0, 1], vec![2, 3]];
        let replicates = vec![
            replicate(&[Some(2), Some(2), Some(1), Some(1)]),
            replicate(&[Some(1), Some(1), Some(1), None]),
        ];
        let consistency = structural_consistency(&labels, &dims, &replicates);
        assert_eq!(consistency[0].consistency, 0.5);
        assert_eq!(consistency[1].consistency, 0.5);
        assert_eq!(consistency[1].items, vec!["c", "d"]);
    }

    #[test]
    fn test_frequencies_and_co_assignment() {
        let replicates = vec![
            replicate(&[Some(1), Some(1), Some(2)]),
            replicate(&[Some(1), Some(1), Some(1)]),
        ];
        let frequencies = dimension_frequencies(&replicates);
        assert_eq!(
            frequencies,
            vec![
                DimensionFrequency {
                    n_dimensions: 1,
                    count: 1,
                    proportion: 0.5
                },
                DimensionFrequency {
                    n_dimensions: 2,
                    count: 1,
                    proportion: 0.5
                },
            ]
        );
        let together = co_assignment(3, &replicates);
        assert_eq!(together[(0, 1)], 1.0);
        assert_eq!(together[(0, 2)], 0.5);
        assert_eq!(together[(2, 2)], 1.0);
    }
}
