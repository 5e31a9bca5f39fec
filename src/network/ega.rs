//! Exploratory graph analysis: a regularised partial-correlation network and
//! its communities as an estimate of dimensionality.

use nalgebra::DMatrix;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;

use super::community::{louvain, Partition};
use super::glasso::{graphical_lasso, lambda_max, lambda_path};
use crate::analysis::CorrelationMatrix;
use crate::config::NetworkConfig;
use crate::errors::{FitFailureReason, FitModel, Result, StudyError};
use crate::math::matrix::{log_determinant, serialize_matrix};

/// Precision entries smaller than this count as absent edges
const EDGE_EPSILON: f64 = 1.490_116_119_384_765_6e-8;

/// The EBIC-selected network.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkEstimate {
    pub labels: Vec<String>,
    pub lambda: f64,
    pub ebic: f64,
    pub n_edges: usize,
    /// Penalties tried, largest first
    pub lambdas_tried: usize,
    pub lambdas_converged: usize,
    #[serde(serialize_with = "serialize_matrix")]
    pub partial_correlations: DMatrix<f64>,
    #[serde(skip)]
    pub graph: UnGraph<String, f64>,
}

/// Dimensionality estimate from network communities.
#[derive(Debug, Clone, Serialize)]
pub struct EgaResult {
    pub network: NetworkEstimate,
    /// Dimension (1-based) of each item; `None` for items outside any
    /// community of two or more items
    pub membership: Vec<Option<usize>>,
    pub n_dimensions: usize,
    pub modularity: f64,
}

impl EgaResult {
    pub fn labels(&self) -> &[String] {
        &self.network.labels
    }

    /// Items of each dimension, in item order.
    pub fn dimensions(&self) -> Vec<Vec<String>> {
        dimension_items(&self.membership, self.n_dimensions)
            .into_iter()
            .map(|items| {
                items
                    .into_iter()
                    .map(|i| self.network.labels[i].clone())
                    .collect()
            })
            .collect()
    }

    pub fn unassigned(&self) -> Vec<&str> {
        self.membership
            .iter()
            .zip(&self.network.labels)
            .filter(|(m, _)| m.is_none())
            .map(|(_, label)| label.as_str())
            .collect()
    }
}

/// Item indices of each dimension.
pub(crate) fn dimension_items(
    membership: &[Option<usize>],
    n_dimensions: usize,
) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::new(); n_dimensions];
    for (item, m) in membership.iter().enumerate() {
        if let Some(d) = m {
            out[d - 1].push(item);
        }
    }
    out
}

/// `-θij / sqrt(θii θjj)` with a zero diagonal.
pub fn partial_correlations(precision: &DMatrix<f64>) -> DMatrix<f64> {
    let p = precision.nrows();
    DMatrix::from_fn(p, p, |i, j| {
        if i == j {
            0.0
        } else {
            -precision[(i, j)] / (precision[(i, i)] * precision[(j, j)]).sqrt()
        }
    })
}

/// Extended BIC of a precision matrix:
/// `-2 loglik + E ln n + 4 E γ ln p` with `loglik = n/2 (ln det Θ - tr SΘ)`.
///
/// Returns `None` when `Θ` is not positive definite.
pub fn ebic(
    s: &DMatrix<f64>,
    precision: &DMatrix<f64>,
    n: usize,
    gamma: f64,
) -> Option<(f64, usize)> {
    let p = s.nrows();
    let logdet = log_determinant(precision)?;
    let trace = (s * precision).trace();
    let loglik = n as f64 / 2.0 * (logdet - trace);
    let edges = count_edges(precision);
    let e = edges as f64;
    let value = -2.0 * loglik + e * (n as f64).ln() + 4.0 * e * gamma * (p as f64).ln();
    Some((value, edges))
}

fn count_edges(precision: &DMatrix<f64>) -> usize {
    let p = precision.nrows();
    (0..p)
        .flat_map(|i| ((i + 1)..p).map(move |j| (i, j)))
        .filter(|&(i, j)| precision[(i, j)].abs() > EDGE_EPSILON)
        .count()
}

/// Fit the graphical lasso path and keep the EBIC minimiser.
///
/// Penalties whose solve does not converge, or whose precision is not
/// positive definite, are skipped; if none is left the network fit fails.
pub fn estimate_network(
    cor: &CorrelationMatrix,
    config: &NetworkConfig,
) -> Result<NetworkEstimate> {
    let s = cor.matrix();
    let n = cor.n_observations();
    let p = cor.n_items();
    if p < 2 {
        return Err(StudyError::degenerate(format!(
            "a network needs at least two items, got {}",
            p
        )));
    }

    let top = lambda_max(s);
    if !(top > 0.0) {
        return Err(StudyError::degenerate(
            "all item correlations are zero, the network has no edges to select",
        ));
    }
    let path = lambda_path(top, config.lambda_min_ratio, config.n_lambda);

    let mut warm = None;
    let mut best: Option<(f64, f64, usize, DMatrix<f64>)> = None;
    let mut converged = 0;
    let mut last_objective = f64::NAN;
    for &lambda in &path {
        let fit = graphical_lasso(
            s,
            lambda,
            config.glasso_max_iterations,
            config.glasso_tolerance,
            &mut warm,
        );
        if !fit.converged {
            log::debug!("glasso did not converge at lambda {:.5}", lambda);
            continue;
        }
        let Some((value, edges)) = ebic(s, &fit.precision, n, config.gamma) else {
            continue;
        };
        converged += 1;
        last_objective = value;
        // Ties keep the sparser, earlier network
        if best.as_ref().map_or(true, |(b, ..)| value < *b) {
            best = Some((value, lambda, edges, fit.precision));
        }
    }

    let Some((value, lambda, edges, precision)) = best else {
        return Err(StudyError::fit_failure(
            FitModel::Network,
            FitFailureReason::NoAdmissibleSolution {
                detail: format!(
                    "graphical lasso did not converge for any of {} penalties (last objective {})",
                    path.len(),
                    last_objective
                ),
            },
        ));
    };

    let partial = partial_correlations(&precision);
    let graph = build_graph(cor.labels(), &partial);
    log::debug!(
        "network selected lambda {:.5} with {} edges (EBIC {:.3})",
        lambda,
        edges,
        value
    );
    Ok(NetworkEstimate {
        labels: cor.labels().to_vec(),
        lambda,
        ebic: value,
        n_edges: graph.edge_count(),
        lambdas_tried: path.len(),
        lambdas_converged: converged,
        graph,
        partial_correlations: partial,
    })
}

/// Undirected graph with one node per item and one edge per non-zero
/// partial correlation.
fn build_graph(labels: &[String], partial: &DMatrix<f64>) -> UnGraph<String, f64> {
    let mut graph = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = labels.iter().map(|l| graph.add_node(l.clone())).collect();
    for i in 0..labels.len() {
        for j in (i + 1)..labels.len() {
            let w = partial[(i, j)];
            if w.abs() > EDGE_EPSILON {
                graph.add_edge(nodes[i], nodes[j], w);
            }
        }
    }
    graph
}

/// Dimensions are communities with at least two items, numbered from 1 in
/// order of their first item.
pub fn dimensions_from_partition(partition: &Partition) -> (Vec<Option<usize>>, usize) {
    let sizes: Vec<usize> = partition.communities().iter().map(Vec::len).collect();
    let mut numbering: Vec<Option<usize>> = vec![None; sizes.len()];
    let mut next = 0;
    let membership = partition
        .membership
        .iter()
        .map(|&c| {
            if sizes[c] < 2 {
                return None;
            }
            Some(*numbering[c].get_or_insert_with(|| {
                next += 1;
                next
            }))
        })
        .collect();
    (membership, next)
}

/// Network estimate plus community-based dimensions.
pub fn exploratory_graph_analysis(
    cor: &CorrelationMatrix,
    config: &NetworkConfig,
) -> Result<EgaResult> {
    let network = estimate_network(cor, config)?;
    let partition = louvain(&network.graph);
    let (membership, n_dimensions) = dimensions_from_partition(&partition);
    Ok(EgaResult {
        network,
        membership,
        n_dimensions,
        modularity: partition.modularity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_correlation(sizes: &[usize], within: f64, between: f64) -> CorrelationMatrix {
        let factor_of: Vec<usize> = sizes
            .iter()
            .enumerate()
            .flat_map(|(f, &s)| std::iter::repeat(f).take(s))
            .collect();
        let p = factor_of.len();
        let labels = (0..p).map(|i| format!("X{}", i + 1)).collect();
        let m = DMatrix::from_fn(p, p, |i, j| {
            if i == j {
                1.0
            } else if factor_of[i] == factor_of[j] {
                within
            } else {
                between
            }
        });
        CorrelationMatrix::from_matrix(labels, m, 300).unwrap()
    }

    fn config() -> NetworkConfig {
        NetworkConfig {
            n_lambda: 30,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_three_blocks_three_dimensions() {
        let cor = block_correlation(&[4, 5, 4], 0.5, 0.1);
        let ega = exploratory_graph_analysis(&cor, &config()).unwrap();
        assert_eq!(ega.n_dimensions, 3);
        let expected: Vec<Option<usize>> = [1, 1, 1, 1, 2, 2, 2, 2, 2, 3, 3, 3, 3]
            .into_iter()
            .map(Some)
            .collect();
        assert_eq!(ega.membership, expected);
        assert!(ega.unassigned().is_empty());
        assert_eq!(ega.dimensions()[0], vec!["X1", "X2", "X3", "X4"]);
    }

    #[test]
    fn test_selected_lambda_on_path() {
        let cor = block_correlation(&[3, 3], 0.5, 0.2);
        let net = estimate_network(&cor, &config()).unwrap();
        assert!(net.lambda <= 0.5 + 1e-12);
        assert!(net.lambda >= 0.05 - 1e-12);
        assert_eq!(net.lambdas_tried, 30);
        assert!(net.lambdas_converged > 0);
        assert_eq!(net.graph.node_count(), 6);
        assert_eq!(net.graph.edge_count(), net.n_edges);
    }

    #[test]
    fn test_partial_correlations_symmetric() {
        let cor = block_correlation(&[3, 3], 0.5, 0.2);
        let net = estimate_network(&cor, &config()).unwrap();
        let pc = &net.partial_correlations;
        for i in 0..6 {
            assert_eq!(pc[(i, i)], 0.0);
            for j in 0..6 {
                assert!((pc[(i, j)] - pc[(j, i)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_no_converged_lambda_is_fit_failure() {
        let cor = block_correlation(&[3, 3], 0.5, 0.2);
        let config = NetworkConfig {
            glasso_max_iterations: 0,
            ..config()
        };
        let err = estimate_network(&cor, &config).unwrap_err();
        assert!(err.is_fit_failure());
        assert!(matches!(
            err,
            StudyError::FitFailure {
                model: FitModel::Network,
                ..
            }
        ));
    }

    #[test]
    fn test_identity_correlation_is_degenerate() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let cor = CorrelationMatrix::from_matrix(labels, DMatrix::identity(3, 3), 100).unwrap();
        let err = estimate_network(&cor, &config()).unwrap_err();
        assert!(matches!(err, StudyError::DegenerateInput(_)));
    }

    #[test]
    fn test_singleton_communities_unassigned() {
        let partition = Partition {
            membership: vec![0, 1, 0, 2, 2],
            modularity: 0.1,
        };
        let (membership, n) = dimensions_from_partition(&partition);
        assert_eq!(n, 2);
        assert_eq!(membership, vec![Some(1), None, Some(1), Some(2), Some(2)]);
    }

    #[test]
    fn test_ebic_penalises_edges() {
        let s = DMatrix::<f64>::identity(3, 3);
        let (empty, e0) = ebic(&s, &DMatrix::identity(3, 3), 100, 0.5).unwrap();
        let mut dense = DMatrix::identity(3, 3);
        dense[(0, 1)] = 0.1;
        dense[(1, 0)] = 0.1;
        let (with_edge, e1) = ebic(&s, &dense, 100, 0.5).unwrap();
        assert_eq!((e0, e1), (0, 1));
        assert!(with_edge > empty);
    }
}
