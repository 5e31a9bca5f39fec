//! Graphical lasso by block coordinate descent.
//!
//! Solves `max log det Θ - tr(SΘ) - λ Σ_{i≠j} |θij|` for a correlation
//! matrix `S`. The diagonal is not penalised, so the working covariance
//! starts at `S` itself. Each sweep visits every column and solves the
//! lasso subproblem for it against the remaining block; the sweep loop stops
//! once the mean absolute change of the working covariance falls below
//! `tolerance` times the mean absolute off-diagonal of `S`.

use nalgebra::DMatrix;

/// Inner coordinate descent budget per column
const LASSO_MAX_ITERATIONS: usize = 1000;
const LASSO_TOLERANCE: f64 = 1e-8;

/// Outcome of one graphical lasso solve.
#[derive(Debug, Clone)]
pub struct GlassoSolution {
    /// Estimated covariance `W = Θ⁻¹`
    pub covariance: DMatrix<f64>,
    /// Estimated precision `Θ`
    pub precision: DMatrix<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Warm start carried along a decreasing λ path.
#[derive(Debug, Clone)]
pub struct WarmStart {
    covariance: DMatrix<f64>,
    /// Column j holds the lasso coefficients for variable j, indexed by the
    /// other variables in their natural order
    coefficients: DMatrix<f64>,
}

impl WarmStart {
    fn cold(s: &DMatrix<f64>) -> Self {
        let p = s.nrows();
        Self {
            covariance: s.clone(),
            coefficients: DMatrix::zeros(p.saturating_sub(1), p),
        }
    }
}

fn soft_threshold(x: f64, lambda: f64) -> f64 {
    if x > lambda {
        x - lambda
    } else if x < -lambda {
        x + lambda
    } else {
        0.0
    }
}

/// Indices of every variable other than `j`.
fn others(p: usize, j: usize) -> Vec<usize> {
    (0..p).filter(|&k| k != j).collect()
}

/// Coordinate descent for `min ½βᵀW11β - s12ᵀβ + λ‖β‖₁`.
fn lasso_subproblem(
    w: &DMatrix<f64>,
    idx: &[usize],
    s12: &[f64],
    lambda: f64,
    beta: &mut [f64],
) {
    let m = idx.len();
    for _ in 0..LASSO_MAX_ITERATIONS {
        let mut max_change: f64 = 0.0;
        for k in 0..m {
            let wkk = w[(idx[k], idx[k])];
            let partial: f64 = (0..m)
                .filter(|&l| l != k)
                .map(|l| w[(idx[k], idx[l])] * beta[l])
                .sum();
            let updated = soft_threshold(s12[k] - partial, lambda) / wkk;
            max_change = max_change.max((updated - beta[k]).abs());
            beta[k] = updated;
        }
        if max_change < LASSO_TOLERANCE {
            break;
        }
    }
}

fn mean_abs_off_diagonal(m: &DMatrix<f64>) -> f64 {
    let p = m.nrows();
    if p < 2 {
        return 0.0;
    }
    let sum: f64 = (0..p)
        .flat_map(|i| (0..p).filter(move |&j| j != i).map(move |j| (i, j)))
        .map(|(i, j)| m[(i, j)].abs())
        .sum();
    sum / (p * (p - 1)) as f64
}

/// Fit the graphical lasso at one penalty.
///
/// `warm` is updated in place so the next, smaller penalty on a path starts
/// from this solution.
pub fn graphical_lasso(
    s: &DMatrix<f64>,
    lambda: f64,
    max_iterations: usize,
    tolerance: f64,
    warm: &mut Option<WarmStart>,
) -> GlassoSolution {
    let p = s.nrows();
    let start = warm.take().unwrap_or_else(|| WarmStart::cold(s));
    let mut w = start.covariance;
    let mut b = start.coefficients;
    for i in 0..p {
        w[(i, i)] = s[(i, i)];
    }

    let threshold = tolerance * mean_abs_off_diagonal(s).max(f64::EPSILON);
    let mut converged = p < 2;
    let mut iterations = 0;

    while !converged && iterations < max_iterations {
        iterations += 1;
        let previous = w.clone();
        for j in 0..p {
            let idx = others(p, j);
            let s12: Vec<f64> = idx.iter().map(|&k| s[(k, j)]).collect();
            let mut beta: Vec<f64> = b.column(j).iter().copied().collect();
            lasso_subproblem(&w, &idx, &s12, lambda, &mut beta);
            for (k, &row) in idx.iter().enumerate() {
                let w12: f64 = idx
                    .iter()
                    .zip(&beta)
                    .map(|(&l, &bl)| w[(row, l)] * bl)
                    .sum();
                w[(row, j)] = w12;
                w[(j, row)] = w12;
                b[(k, j)] = beta[k];
            }
        }
        let change = (&w - &previous).abs().sum() / (p * p) as f64;
        converged = change < threshold;
    }

    let precision = precision_from(&w, &b);
    *warm = Some(WarmStart {
        covariance: w.clone(),
        coefficients: b,
    });
    GlassoSolution {
        covariance: w,
        precision,
        iterations,
        converged,
    }
}

/// Recover `Θ` column by column from `W` and the lasso coefficients.
fn precision_from(w: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    let p = w.nrows();
    let mut theta = DMatrix::zeros(p, p);
    for j in 0..p {
        let idx = others(p, j);
        let w12_beta: f64 = idx
            .iter()
            .enumerate()
            .map(|(k, &row)| w[(row, j)] * b[(k, j)])
            .sum();
        let theta_jj = 1.0 / (w[(j, j)] - w12_beta);
        theta[(j, j)] = theta_jj;
        for (k, &row) in idx.iter().enumerate() {
            theta[(row, j)] = -b[(k, j)] * theta_jj;
        }
    }
    // Columns are solved separately; average to restore exact symmetry
    let transpose = theta.transpose();
    (theta + transpose) * 0.5
}

/// `n` penalties spaced evenly on the log scale from `max` down to
/// `max * min_ratio`.
pub fn lambda_path(max: f64, min_ratio: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![max];
    }
    let (hi, lo) = (max.ln(), (max * min_ratio).ln());
    (0..n)
        .map(|i| (hi - (hi - lo) * i as f64 / (n - 1) as f64).exp())
        .collect()
}

/// Largest absolute off-diagonal entry, the smallest penalty that empties
/// the network.
pub fn lambda_max(s: &DMatrix<f64>) -> f64 {
    let p = s.nrows();
    let mut max: f64 = 0.0;
    for i in 0..p {
        for j in (i + 1)..p {
            max = max.max(s[(i, j)].abs());
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(p: usize, rho: f64) -> DMatrix<f64> {
        DMatrix::from_fn(p, p, |i, j| rho.powi((i as i32 - j as i32).abs()))
    }

    #[test]
    fn test_lambda_path_endpoints() {
        let path = lambda_path(0.6, 0.1, 5);
        assert_eq!(path.len(), 5);
        assert!((path[0] - 0.6).abs() < 1e-12);
        assert!((path[4] - 0.06).abs() < 1e-12);
        assert!(path.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_lambda_max_empties_network() {
        let s = chain(5, 0.5);
        let lambda = lambda_max(&s);
        let fit = graphical_lasso(&s, lambda, 100, 1e-4, &mut None);
        assert!(fit.converged);
        for i in 0..5 {
            for j in 0..5 {
                if i != j {
                    assert!(fit.precision[(i, j)].abs() < 1e-8);
                }
            }
        }
    }

    #[test]
    fn test_zero_penalty_recovers_inverse() {
        let s = chain(4, 0.5);
        let fit = graphical_lasso(&s, 0.0, 500, 1e-8, &mut None);
        assert!(fit.converged);
        let inverse = s.clone().try_inverse().unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert!(
                    (fit.precision[(i, j)] - inverse[(i, j)]).abs() < 1e-3,
                    "({}, {}): {} vs {}",
                    i,
                    j,
                    fit.precision[(i, j)],
                    inverse[(i, j)]
                );
            }
        }
    }

    #[test]
    fn test_chain_structure_dominated_by_neighbours() {
        // AR(1) precision is tridiagonal
        let s = chain(5, 0.6);
        let fit = graphical_lasso(&s, 0.05, 500, 1e-6, &mut None);
        assert!(fit.converged);
        let adjacent = fit.precision[(0, 1)];
        assert!(adjacent < 0.0);
        assert!(fit.precision[(0, 3)].abs() < 0.25 * adjacent.abs());
        assert!(fit.precision[(0, 4)].abs() < 0.25 * adjacent.abs());
    }

    #[test]
    fn test_diagonal_unpenalised() {
        let s = chain(4, 0.4);
        let fit = graphical_lasso(&s, 0.1, 200, 1e-6, &mut None);
        for i in 0..4 {
            assert!((fit.covariance[(i, i)] - 1.0).abs() < 1e-12);
        }
    }
}
