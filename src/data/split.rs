//! Reproducible exploratory/confirmatory partition.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;

use super::items::ItemResponses;
use crate::config::SplitConfig;
use crate::errors::{Result, StudyError};

#[derive(Debug, Clone)]
pub struct SampleSplit {
    pub exploratory: ItemResponses,
    pub confirmatory: ItemResponses,
    pub summary: SplitSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub seed: u64,
    pub exploratory_rows: Vec<usize>,
    pub confirmatory_rows: Vec<usize>,
    /// Always false; the partition is simple random
    pub stratified: bool,
}

/// Row indices of the exploratory half, ascending.
pub fn exploratory_indices(n: usize, fraction: f64, seed: u64) -> Vec<usize> {
    let k = ((n as f64) * fraction).floor() as usize;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, n, k.min(n)).into_vec();
    picked.sort_unstable();
    picked
}

pub fn split_sample(items: &ItemResponses, config: &SplitConfig) -> Result<SampleSplit> {
    let n = items.n_respondents();
    let exploratory_rows = exploratory_indices(n, config.exploratory_fraction, config.seed);
    let mut in_exploratory = vec![false; n];
    for &i in &exploratory_rows {
        in_exploratory[i] = true;
    }
    let confirmatory_rows: Vec<usize> = (0..n).filter(|&i| !in_exploratory[i]).collect();

    if exploratory_rows.is_empty() || confirmatory_rows.is_empty() {
        return Err(StudyError::data_shape(format!(
            "{} respondents cannot be split into two non-empty halves",
            n
        )));
    }
    log::info!(
        "Split {} respondents: {} exploratory, {} confirmatory (seed {})",
        n,
        exploratory_rows.len(),
        confirmatory_rows.len(),
        config.seed
    );

    Ok(SampleSplit {
        exploratory: items.select_rows(&exploratory_rows),
        confirmatory: items.select_rows(&confirmatory_rows),
        summary: SplitSummary {
            seed: config.seed,
            exploratory_rows,
            confirmatory_rows,
            stratified: false,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn items(n: usize) -> ItemResponses {
        let rows = (0..n).map(|i| vec![(i % 5) as i32 + 1, 1]).collect();
        ItemResponses::new(vec!["A1".into(), "A2".into()], rows).unwrap()
    }

    #[test]
    fn test_floor_half_to_exploratory() {
        let split = split_sample(&items(11), &SplitConfig::default()).unwrap();
        assert_eq!(split.exploratory.n_respondents(), 5);
        assert_eq!(split.confirmatory.n_respondents(), 6);
    }

    #[test]
    fn test_reproducible_for_seed() {
        let a = split_sample(&items(50), &SplitConfig::default()).unwrap();
        let b = split_sample(&items(50), &SplitConfig::default()).unwrap();
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn test_different_seed_different_split() {
        let a = exploratory_indices(200, 0.5, 1);
        let b = exploratory_indices(200, 0.5, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_single_respondent_cannot_split() {
        assert!(split_sample(&items(1), &SplitConfig::default()).is_err());
    }

    proptest! {
        #[test]
        fn prop_partition_is_exact(n in 2usize..300, seed in any::<u64>()) {
            let config = SplitConfig { seed, exploratory_fraction: 0.5 };
            let split = split_sample(&items(n), &config).unwrap();
            let mut all: Vec<usize> = split.summary.exploratory_rows.clone();
            all.extend(&split.summary.confirmatory_rows);
            all.sort_unstable();
            prop_assert_eq!(all, (0..n).collect::<Vec<_>>());
            prop_assert_eq!(split.summary.exploratory_rows.len(), n / 2);
        }
    }
}
