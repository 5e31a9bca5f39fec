//! Numerical building blocks: distributions, matrix helpers, summary
//! statistics and scalar optimisation.

pub mod matrix;
pub mod normal;
pub mod optimize;
pub mod stats;

pub use matrix::{
    cov_to_cor, covariance, is_positive_definite, log_determinant, pearson_correlation,
    smooth_correlation, sorted_eigenvalues, sorted_symmetric_eigen, spd_inverse,
    SmoothingReport,
};
pub use normal::{bvn_cdf, pnorm, qnorm};
