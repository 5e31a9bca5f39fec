//! The bootstrap is a function of the seed alone: worker count and
//! scheduling never change the report.

mod common;

use indicatif::ProgressBar;
use pretty_assertions::assert_eq;
use scaleval::analysis::CorrelationMatrix;
use scaleval::config::{NetworkCorrelation, StudyConfig};
use scaleval::network::analyze_network;
use scaleval::pipeline::prepare_sample;

fn config(workers: usize, seed: u64, method: NetworkCorrelation) -> StudyConfig {
    let mut config = StudyConfig::default();
    config.network.bootstrap_iterations = 8;
    config.network.n_lambda = 25;
    config.network.correlation = method;
    config.network.workers = workers;
    config.network.seed = seed;
    config
}

fn bootstrap_json(workers: usize, seed: u64, method: NetworkCorrelation) -> serde_json::Value {
    let table = common::synthetic_table(300, 21);
    let config = config(workers, seed, method);
    let sample = prepare_sample(&table, &config).unwrap();
    let exploratory = match method {
        NetworkCorrelation::Polychoric => {
            Some(CorrelationMatrix::polychoric(&sample.exploratory, &config.correlation).unwrap())
        }
        NetworkCorrelation::Pearson => None,
    };
    let report = analyze_network(
        &sample.exploratory,
        exploratory.as_ref(),
        &config.network,
        &config.correlation,
        &ProgressBar::hidden(),
    )
    .unwrap();
    let mut value = serde_json::to_value(&report.bootstrap).unwrap();
    value
        .as_object_mut()
        .unwrap()
        .remove("workers");
    value
}

#[test]
fn test_same_seed_same_report_across_worker_counts() {
    let method = NetworkCorrelation::Pearson;
    assert_eq!(bootstrap_json(1, 99, method), bootstrap_json(4, 99, method));
}

#[test]
fn test_polychoric_bootstrap_same_across_worker_counts() {
    let method = NetworkCorrelation::Polychoric;
    assert_eq!(bootstrap_json(1, 17, method), bootstrap_json(4, 17, method));
}

#[test]
fn test_empirical_network_recovers_three_dimensions() {
    let table = common::synthetic_table(400, 8);
    let config = config(2, 1, NetworkCorrelation::Pearson);
    let sample = prepare_sample(&table, &config).unwrap();
    let report = analyze_network(
        &sample.exploratory,
        None,
        &config.network,
        &config.correlation,
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert_eq!(report.ega.n_dimensions, 3);
    let dims = report.ega.dimensions();
    assert_eq!(dims[0], vec!["A1", "A2", "A3", "A4"]);
    assert_eq!(report.bootstrap.co_assignment.nrows(), 15);
}
