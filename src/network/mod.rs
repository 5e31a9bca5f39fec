//! Graph-based dimensionality: exploratory graph analysis of the item
//! network and the bootstrap stability of its communities.

pub mod bootstrap;
pub mod community;
pub mod ega;
pub mod glasso;

use indicatif::ProgressBar;
use serde::Serialize;
use std::borrow::Cow;

use crate::analysis::CorrelationMatrix;
use crate::config::{CorrelationConfig, NetworkConfig, NetworkCorrelation};
use crate::data::ItemResponses;
use crate::errors::{Result, StudyError};

pub use bootstrap::{
    bootstrap_stability, network_correlation, BootstrapReport, DimensionConsistency,
    DimensionFrequency, ItemStability,
};
pub use community::{louvain, Partition};
pub use ega::{estimate_network, exploratory_graph_analysis, EgaResult, NetworkEstimate};

#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub ega: EgaResult,
    pub bootstrap: BootstrapReport,
}

/// Matrix the empirical network is estimated from.
///
/// A polychoric network reuses `exploratory`, the matrix already estimated
/// on `items`; otherwise the configured correlation is computed here.
pub fn empirical_correlation<'a>(
    items: &ItemResponses,
    exploratory: Option<&'a CorrelationMatrix>,
    network: &NetworkConfig,
    correlation: &CorrelationConfig,
) -> Result<Cow<'a, CorrelationMatrix>> {
    match (network.correlation, exploratory) {
        (NetworkCorrelation::Polychoric, Some(shared)) => {
            if shared.labels() != items.labels()
                || shared.n_observations() != items.n_respondents()
            {
                return Err(StudyError::data_shape(
                    "exploratory correlation matrix does not describe the network items",
                ));
            }
            Ok(Cow::Borrowed(shared))
        }
        _ => network_correlation(items, network, correlation).map(Cow::Owned),
    }
}

/// Empirical network of `items` followed by its bootstrap.
pub fn analyze_network(
    items: &ItemResponses,
    exploratory: Option<&CorrelationMatrix>,
    network: &NetworkConfig,
    correlation: &CorrelationConfig,
    progress: &ProgressBar,
) -> Result<NetworkReport> {
    let cor = empirical_correlation(items, exploratory, network, correlation)?;
    let ega = exploratory_graph_analysis(&cor, network)?;
    log::info!(
        "Network analysis found {} dimension(s), {} edge(s)",
        ega.n_dimensions,
        ega.network.n_edges
    );
    let bootstrap = bootstrap_stability(items, &ega, network, correlation, progress)?;
    Ok(NetworkReport { ega, bootstrap })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CorrelationMethod;
    use nalgebra::DMatrix;

    fn items() -> ItemResponses {
        let rows = vec![
            vec![1, 2, 1],
            vec![2, 2, 3],
            vec![3, 4, 2],
            vec![4, 3, 4],
            vec![2, 1, 2],
            vec![5, 5, 4],
        ];
        ItemResponses::new(vec!["A1".into(), "A2".into(), "B1".into()], rows).unwrap()
    }

    fn shared(labels: Vec<String>, n: usize) -> CorrelationMatrix {
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 0.6, 0.2, 0.6, 1.0, 0.3, 0.2, 0.3, 1.0]);
        CorrelationMatrix::from_matrix(labels, m, n).unwrap()
    }

    #[test]
    fn test_polychoric_network_reuses_exploratory_matrix() {
        let items = items();
        let exploratory = shared(items.labels().to_vec(), 6);
        let cor = empirical_correlation(
            &items,
            Some(&exploratory),
            &NetworkConfig::default(),
            &CorrelationConfig::default(),
        )
        .unwrap();
        assert!(matches!(cor, Cow::Borrowed(_)));
        assert!(std::ptr::eq(cor.as_ref(), &exploratory));
    }

    #[test]
    fn test_pearson_network_computes_its_own_matrix() {
        let items = items();
        let exploratory = shared(items.labels().to_vec(), 6);
        let network = NetworkConfig {
            correlation: NetworkCorrelation::Pearson,
            ..NetworkConfig::default()
        };
        let cor = empirical_correlation(
            &items,
            Some(&exploratory),
            &network,
            &CorrelationConfig::default(),
        )
        .unwrap();
        assert_eq!(cor.method(), CorrelationMethod::Pearson);
    }

    #[test]
    fn test_mismatched_exploratory_matrix_is_rejected() {
        let items = items();
        let exploratory = shared(vec!["X".into(), "Y".into(), "Z".into()], 6);
        let err = empirical_correlation(
            &items,
            Some(&exploratory),
            &NetworkConfig::default(),
            &CorrelationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StudyError::DataShape(_)));
    }
}
