//! Orthogonal rotation of factor loadings.

use nalgebra::DMatrix;

use crate::errors::{Result, StudyError};

const VARIMAX_MAX_ITER: usize = 1000;
const VARIMAX_EPS: f64 = 1e-5;

/// Kaiser-normalised varimax rotation.
///
/// Rows are scaled to unit length before rotating and scaled back after.
/// Returns the rotated loadings and the rotation matrix.
pub fn varimax(loadings: &DMatrix<f64>) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let (p, k) = loadings.shape();
    if k < 2 {
        return Ok((loadings.clone(), DMatrix::identity(k, k)));
    }

    let norms: Vec<f64> = (0..p)
        .map(|i| loadings.row(i).norm().max(f64::MIN_POSITIVE))
        .collect();
    let x = DMatrix::from_fn(p, k, |i, j| loadings[(i, j)] / norms[i]);

    let mut rotation = DMatrix::<f64>::identity(k, k);
    let mut criterion = 0.0;
    for _ in 0..VARIMAX_MAX_ITER {
        let z = &x * &rotation;
        let column_ss: Vec<f64> = (0..k).map(|j| z.column(j).norm_squared()).collect();
        let target = DMatrix::from_fn(p, k, |i, j| {
            z[(i, j)].powi(3) - z[(i, j)] * column_ss[j] / p as f64
        });
        let b = x.transpose() * target;

        let svd = b.svd(true, true);
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(StudyError::analysis("varimax SVD did not produce factors"));
        };
        rotation = u * v_t;

        let previous = criterion;
        criterion = svd.singular_values.sum();
        if criterion < previous * (1.0 + VARIMAX_EPS) {
            break;
        }
    }

    let z = &x * &rotation;
    let rotated = DMatrix::from_fn(p, k, |i, j| z[(i, j)] * norms[i]);
    Ok((rotated, rotation))
}

/// Order factors by decreasing sum of squared loadings and make each
/// column's loading sum positive.
pub fn sort_and_reflect(loadings: &DMatrix<f64>) -> DMatrix<f64> {
    let (p, k) = loadings.shape();
    let ss: Vec<f64> = (0..k).map(|j| loadings.column(j).norm_squared()).collect();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| ss[b].total_cmp(&ss[a]));

    let signs: Vec<f64> = order
        .iter()
        .map(|&j| if loadings.column(j).sum() < 0.0 { -1.0 } else { 1.0 })
        .collect();
    DMatrix::from_fn(p, k, |i, c| loadings[(i, order[c])] * signs[c])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two clusters of three items with small cross-loadings.
    fn noisy_structure() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            6,
            2,
            &[
                0.75, 0.10, 0.70, 0.05, 0.65, 0.15, 0.10, 0.72, 0.05, 0.68, 0.12, 0.60,
            ],
        )
    }

    fn turn(degrees: f64) -> DMatrix<f64> {
        let (s, c) = (degrees.to_radians().sin(), degrees.to_radians().cos());
        DMatrix::from_row_slice(2, 2, &[c, -s, s, c])
    }

    /// Varimax criterion on Kaiser-normalised rows.
    fn criterion(loadings: &DMatrix<f64>) -> f64 {
        let (p, k) = loadings.shape();
        let z = DMatrix::from_fn(p, k, |i, j| loadings[(i, j)] / loadings.row(i).norm());
        (0..k)
            .map(|j| {
                let squares: Vec<f64> = z.column(j).iter().map(|v| v * v).collect();
                let mean = squares.iter().sum::<f64>() / p as f64;
                squares.iter().map(|s| s * s).sum::<f64>() / p as f64 - mean * mean
            })
            .sum()
    }

    fn primary_factor(loadings: &DMatrix<f64>, row: usize) -> usize {
        if loadings[(row, 0)].abs() >= loadings[(row, 1)].abs() {
            0
        } else {
            1
        }
    }

    #[test]
    fn test_varimax_reaches_criterion_maximum() {
        let best = (0..720)
            .map(|step| criterion(&(noisy_structure() * turn(step as f64 * 0.25))))
            .fold(f64::MIN, f64::max);

        for degrees in [10.0, 25.0, 35.0] {
            let mixed = noisy_structure() * turn(degrees);
            let (rotated, _) = varimax(&mixed).unwrap();
            let reached = criterion(&rotated);
            assert!(
                reached > criterion(&mixed) + 0.01,
                "{} degrees: criterion did not rise",
                degrees
            );
            assert!(
                reached > best - 1e-3,
                "{} degrees: {} vs grid maximum {}",
                degrees,
                reached,
                best
            );
        }
    }

    #[test]
    fn test_varimax_recovers_primary_factors() {
        let mixed = noisy_structure() * turn(25.0);
        let (rotated, _) = varimax(&mixed).unwrap();
        let result = sort_and_reflect(&rotated);

        let first = primary_factor(&result, 0);
        for row in 0..3 {
            assert_eq!(primary_factor(&result, row), first, "item {}", row);
        }
        for row in 3..6 {
            assert_ne!(primary_factor(&result, row), first, "item {}", row);
        }
        for row in 0..6 {
            let main = result[(row, primary_factor(&result, row))];
            assert!(main > 0.55, "item {} loads {}", row, main);
        }
    }

    #[test]
    fn test_rotation_preserves_communalities() {
        let l = DMatrix::from_row_slice(3, 2, &[0.6, 0.3, 0.5, -0.4, 0.2, 0.7]);
        let (rotated, rotation) = varimax(&l).unwrap();
        for i in 0..3 {
            assert!((rotated.row(i).norm_squared() - l.row(i).norm_squared()).abs() < 1e-10);
        }
        let identity = rotation.transpose() * &rotation;
        assert!((identity - DMatrix::<f64>::identity(2, 2)).abs().max() < 1e-10);
    }

    #[test]
    fn test_sort_and_reflect() {
        let l = DMatrix::from_row_slice(2, 2, &[-0.1, 0.9, -0.2, 0.8]);
        let out = sort_and_reflect(&l);
        assert_eq!(out[(0, 0)], 0.9);
        assert_eq!(out[(1, 1)], 0.2);
    }
}
