//! Dense matrix helpers shared by the correlation, factor and network code.

use crate::errors::{Result, StudyError};
use nalgebra::DMatrix;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// How a correlation matrix was repaired to become positive definite.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SmoothingReport {
    /// Whether any eigenvalue had to be raised
    pub applied: bool,
    /// Number of eigenvalues below the tolerance
    pub eigenvalues_adjusted: usize,
    /// Smallest eigenvalue before smoothing
    pub min_eigenvalue_before: f64,
    /// Largest absolute change of any entry
    pub max_abs_change: f64,
}

/// Eigen decomposition of a symmetric matrix with eigenvalues in descending
/// order and eigenvectors as matching columns.
pub fn sorted_symmetric_eigen(m: &DMatrix<f64>) -> (Vec<f64>, DMatrix<f64>) {
    let eigen = m.clone().symmetric_eigen();
    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let values = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let vectors = DMatrix::from_fn(m.nrows(), order.len(), |r, c| {
        eigen.eigenvectors[(r, order[c])]
    });
    (values, vectors)
}

/// Descending eigenvalues of a symmetric matrix.
pub fn sorted_eigenvalues(m: &DMatrix<f64>) -> Vec<f64> {
    let mut values: Vec<f64> = m.clone().symmetric_eigenvalues().iter().copied().collect();
    values.sort_by(|a, b| b.total_cmp(a));
    values
}

/// Cholesky-based positive definiteness check.
pub fn is_positive_definite(m: &DMatrix<f64>) -> bool {
    m.clone().cholesky().is_some()
}

/// Log-determinant of a positive definite matrix, `None` otherwise.
pub fn log_determinant(m: &DMatrix<f64>) -> Option<f64> {
    let chol = m.clone().cholesky()?;
    let l = chol.l();
    Some(2.0 * (0..l.nrows()).map(|i| l[(i, i)].ln()).sum::<f64>())
}

/// Eigenvalue ratio below which a matrix counts as numerically singular
const SINGULAR_RATIO: f64 = 1e-12;

/// Inverse of a positive definite matrix.
///
/// Matrices whose smallest eigenvalue is negligible relative to the largest
/// are rejected as singular rather than inverted.
pub fn spd_inverse(m: &DMatrix<f64>, what: &str) -> Result<DMatrix<f64>> {
    let values = sorted_eigenvalues(m);
    let largest = values.first().copied().unwrap_or(0.0);
    let smallest = values.last().copied().unwrap_or(0.0);
    if !(largest > 0.0) || smallest <= SINGULAR_RATIO * largest {
        return Err(StudyError::degenerate(format!(
            "{} is singular (smallest eigenvalue {:.3e})",
            what, smallest
        )));
    }
    m.clone()
        .cholesky()
        .map(|c| c.inverse())
        .ok_or_else(|| StudyError::degenerate(format!("{} is singular", what)))
}

/// Rescale a covariance matrix to unit diagonal.
pub fn cov_to_cor(m: &DMatrix<f64>) -> DMatrix<f64> {
    let sd: Vec<f64> = (0..m.nrows()).map(|i| m[(i, i)].sqrt()).collect();
    DMatrix::from_fn(m.nrows(), m.ncols(), |r, c| {
        if r == c {
            1.0
        } else {
            (m[(r, c)] / (sd[r] * sd[c])).clamp(-1.0, 1.0)
        }
    })
}

/// Raise near-zero or negative eigenvalues of a correlation matrix.
///
/// Eigenvalues below `epsilon` become `100 * epsilon`, the spectrum is
/// rescaled to sum to the dimension, and the rebuilt matrix is rescaled to
/// unit diagonal. Matrices that are already positive definite are returned
/// unchanged with `applied == false`.
pub fn smooth_correlation(m: &DMatrix<f64>, epsilon: f64) -> (DMatrix<f64>, SmoothingReport) {
    let (values, vectors) = sorted_symmetric_eigen(m);
    let min_eigenvalue_before = values.last().copied().unwrap_or(f64::NAN);

    if min_eigenvalue_before >= epsilon {
        return (
            m.clone(),
            SmoothingReport {
                applied: false,
                eigenvalues_adjusted: 0,
                min_eigenvalue_before,
                max_abs_change: 0.0,
            },
        );
    }

    let adjusted = values.iter().filter(|v| **v < epsilon).count();
    let raised: Vec<f64> = values
        .iter()
        .map(|&v| if v < epsilon { 100.0 * epsilon } else { v })
        .collect();
    let total: f64 = raised.iter().sum();
    let scale = m.nrows() as f64 / total;
    let diag = DMatrix::from_diagonal(&nalgebra::DVector::from_iterator(
        raised.len(),
        raised.iter().map(|v| v * scale),
    ));
    let rebuilt = cov_to_cor(&(&vectors * diag * vectors.transpose()));

    let max_abs_change = (&rebuilt - m).abs().max();
    (
        rebuilt,
        SmoothingReport {
            applied: true,
            eigenvalues_adjusted: adjusted,
            min_eigenvalue_before,
            max_abs_change,
        },
    )
}

/// Pearson correlation matrix of the columns of `data`.
///
/// `labels` names the columns for error messages.
pub fn pearson_correlation(data: &DMatrix<f64>, labels: &[String]) -> Result<DMatrix<f64>> {
    let cov = covariance(data, 1);
    for i in 0..cov.nrows() {
        if cov[(i, i)] <= 0.0 {
            let name = labels.get(i).map(String::as_str).unwrap_or("?");
            return Err(StudyError::degenerate(format!(
                "item '{}' has zero variance",
                name
            )));
        }
    }
    Ok(cov_to_cor(&cov))
}

/// Column covariance matrix with divisor `n - ddof`.
pub fn covariance(data: &DMatrix<f64>, ddof: usize) -> DMatrix<f64> {
    let n = data.nrows();
    let means = data.row_mean();
    let centered = DMatrix::from_fn(n, data.ncols(), |r, c| data[(r, c)] - means[c]);
    let divisor = (n.saturating_sub(ddof)).max(1) as f64;
    (centered.transpose() * &centered) / divisor
}

/// Serialize a matrix as a list of rows.
pub fn serialize_matrix<S: Serializer>(
    m: &DMatrix<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(m.nrows()))?;
    for r in 0..m.nrows() {
        let row: Vec<f64> = m.row(r).iter().copied().collect();
        seq.serialize_element(&row)?;
    }
    seq.end()
}
