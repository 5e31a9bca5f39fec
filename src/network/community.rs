//! Community detection on a weighted item network.
//!
//! Implements the Louvain method on absolute edge weights: local moves that
//! raise modularity, then aggregation of each community into a single node,
//! repeated until a level makes no move.
//!
//! # Pure Function Properties
//!
//! All functions in this module are pure:
//! - Deterministic output for same input (nodes visited in index order,
//!   ties keep the current community)
//! - No side effects (no I/O, no logging)
//! - Thread-safe

use nalgebra::DMatrix;
use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;

const MAX_LEVELS: usize = 32;
const MAX_PASSES_PER_LEVEL: usize = 100;
/// Gains below this are treated as ties
const MIN_GAIN: f64 = 1e-12;

/// Community assignment of every node.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Community id per node, numbered 0.. in order of first appearance
    pub membership: Vec<usize>,
    pub modularity: f64,
}

impl Partition {
    pub fn n_communities(&self) -> usize {
        self.membership.iter().max().map_or(0, |&m| m + 1)
    }

    /// Members of each community, in node order.
    pub fn communities(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.n_communities()];
        for (node, &c) in self.membership.iter().enumerate() {
            out[c].push(node);
        }
        out
    }
}

/// Louvain partition of an undirected weighted graph.
///
/// Edge weights are taken in absolute value. A graph without edges yields
/// one singleton community per node and modularity 0.
pub fn louvain<N>(graph: &UnGraph<N, f64>) -> Partition {
    let adjacency = absolute_adjacency(graph);
    louvain_dense(&adjacency)
}

/// Louvain partition of a symmetric non-negative weight matrix.
pub fn louvain_dense(adjacency: &DMatrix<f64>) -> Partition {
    let n = adjacency.nrows();
    if adjacency.sum() <= 0.0 {
        return Partition {
            membership: (0..n).collect(),
            modularity: 0.0,
        };
    }

    let mut node_community: Vec<usize> = (0..n).collect();
    let mut level_graph = adjacency.clone();

    for _ in 0..MAX_LEVELS {
        let (local, moved) = local_moves(&level_graph);
        if !moved {
            break;
        }
        for c in node_community.iter_mut() {
            *c = local[*c];
        }
        level_graph = aggregate(&level_graph, &local);
    }

    let membership = renumber(&node_community);
    let modularity = modularity(adjacency, &membership);
    Partition {
        membership,
        modularity,
    }
}

fn absolute_adjacency<N>(graph: &UnGraph<N, f64>) -> DMatrix<f64> {
    let n = graph.node_count();
    let mut adjacency = DMatrix::zeros(n, n);
    for edge in graph.edge_references() {
        let (a, b) = (edge.source().index(), edge.target().index());
        let w = edge.weight().abs();
        adjacency[(a, b)] += w;
        if a != b {
            adjacency[(b, a)] += w;
        }
    }
    adjacency
}

/// Newman modularity of a membership vector.
pub fn modularity(adjacency: &DMatrix<f64>, membership: &[usize]) -> f64 {
    let two_m = adjacency.sum();
    if two_m <= 0.0 {
        return 0.0;
    }
    let n = adjacency.nrows();
    let degree: Vec<f64> = (0..n).map(|i| adjacency.row(i).sum()).collect();
    let mut q = 0.0;
    for i in 0..n {
        for j in 0..n {
            if membership[i] == membership[j] {
                q += adjacency[(i, j)] - degree[i] * degree[j] / two_m;
            }
        }
    }
    q / two_m
}

/// One Louvain level: move single nodes to the neighbouring community with
/// the best modularity gain until a full pass moves nothing.
///
/// Returns the compacted community of every node and whether any node
/// moved.
fn local_moves(adjacency: &DMatrix<f64>) -> (Vec<usize>, bool) {
    let n = adjacency.nrows();
    let two_m = adjacency.sum();
    let degree: Vec<f64> = (0..n).map(|i| adjacency.row(i).sum()).collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut total: Vec<f64> = degree.clone();
    let mut moved_any = false;

    for _ in 0..MAX_PASSES_PER_LEVEL {
        let mut moved = false;
        for node in 0..n {
            let current = community[node];
            total[current] -= degree[node];

            let links = links_to_communities(adjacency, &community, node);
            let gain = |c: usize, k_in: f64| k_in - total[c] * degree[node] / two_m;
            let current_links = links
                .iter()
                .find(|(c, _)| *c == current)
                .map_or(0.0, |(_, w)| *w);

            let mut best = current;
            let mut best_gain = gain(current, current_links);
            for &(c, k_in) in &links {
                let g = gain(c, k_in);
                if g > best_gain + MIN_GAIN {
                    best = c;
                    best_gain = g;
                }
            }

            total[best] += degree[node];
            if best != current {
                community[node] = best;
                moved = true;
                moved_any = true;
            }
        }
        if !moved {
            break;
        }
    }

    (renumber(&community), moved_any)
}

/// Summed edge weight from `node` into each neighbouring community,
/// ordered by community id. Self loops are excluded.
fn links_to_communities(
    adjacency: &DMatrix<f64>,
    community: &[usize],
    node: usize,
) -> Vec<(usize, f64)> {
    let mut links: Vec<(usize, f64)> = Vec::new();
    for other in 0..adjacency.nrows() {
        let w = adjacency[(node, other)];
        if other == node || w <= 0.0 {
            continue;
        }
        let c = community[other];
        match links.iter_mut().find(|(id, _)| *id == c) {
            Some((_, total)) => *total += w,
            None => links.push((c, w)),
        }
    }
    links.sort_by_key(|(c, _)| *c);
    links
}

/// Collapse each community into one node; internal weight becomes a self
/// loop so degrees and total weight are preserved.
fn aggregate(adjacency: &DMatrix<f64>, community: &[usize]) -> DMatrix<f64> {
    let k = community.iter().max().map_or(0, |&m| m + 1);
    let mut out = DMatrix::zeros(k, k);
    for i in 0..adjacency.nrows() {
        for j in 0..adjacency.ncols() {
            out[(community[i], community[j])] += adjacency[(i, j)];
        }
    }
    out
}

/// Relabel ids as 0.. in order of first appearance.
fn renumber(labels: &[usize]) -> Vec<usize> {
    let mut mapping: Vec<(usize, usize)> = Vec::new();
    labels
        .iter()
        .map(|&label| match mapping.iter().find(|(old, _)| *old == label) {
            Some(&(_, new)) => new,
            None => {
                let new = mapping.len();
                mapping.push((label, new));
                new
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two cliques of `size` nodes joined by one weak edge.
    fn two_cliques(size: usize, bridge: f64) -> UnGraph<String, f64> {
        let mut graph = UnGraph::new_undirected();
        let nodes: Vec<_> = (0..2 * size)
            .map(|i| graph.add_node(format!("n{}", i)))
            .collect();
        for block in 0..2 {
            for a in 0..size {
                for b in (a + 1)..size {
                    graph.add_edge(nodes[block * size + a], nodes[block * size + b], 0.4);
                }
            }
        }
        graph.add_edge(nodes[size - 1], nodes[size], bridge);
        graph
    }

    #[test]
    fn test_two_cliques_split() {
        let partition = louvain(&two_cliques(4, 0.05));
        assert_eq!(partition.n_communities(), 2);
        assert_eq!(partition.membership, vec![0, 0, 0, 0, 1, 1, 1, 1]);
        assert!(partition.modularity > 0.3);
    }

    #[test]
    fn test_negative_weights_use_magnitude() {
        let mut graph = two_cliques(3, 0.05);
        for w in graph.edge_weights_mut() {
            *w = -*w;
        }
        let partition = louvain(&graph);
        assert_eq!(partition.membership, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_empty_graph_is_all_singletons() {
        let mut graph: UnGraph<String, f64> = UnGraph::new_undirected();
        for i in 0..4 {
            graph.add_node(i.to_string());
        }
        let partition = louvain(&graph);
        assert_eq!(partition.membership, vec![0, 1, 2, 3]);
        assert_eq!(partition.modularity, 0.0);
    }

    #[test]
    fn test_isolated_node_stays_alone() {
        let mut graph = two_cliques(3, 0.05);
        let lonely = graph.add_node("lonely".to_string());
        let partition = louvain(&graph);
        let c = partition.membership[lonely.index()];
        assert_eq!(
            partition.membership.iter().filter(|&&m| m == c).count(),
            1
        );
    }

    #[test]
    fn test_deterministic() {
        let graph = two_cliques(5, 0.1);
        assert_eq!(louvain(&graph), louvain(&graph));
    }

    #[test]
    fn test_modularity_of_single_community_is_zero() {
        let adjacency = DMatrix::from_fn(3, 3, |i, j| if i == j { 0.0 } else { 1.0 });
        assert!(modularity(&adjacency, &[0, 0, 0]).abs() < 1e-12);
    }

    #[test]
    fn test_renumber_first_appearance() {
        assert_eq!(renumber(&[5, 2, 5, 9, 2]), vec![0, 1, 0, 2, 1]);
    }
}
