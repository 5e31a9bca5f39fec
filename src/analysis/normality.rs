//! Multivariate and univariate normality tests on item responses.

use nalgebra::DMatrix;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::data::ItemResponses;
use crate::errors::{Result, StudyError};
use crate::math::matrix::{covariance, spd_inverse};
use crate::math::normal::pnorm;
use crate::math::stats::{excess_kurtosis, mean, sample_sd, skewness};

const ALPHA: f64 = 0.05;
const MIN_AD_SAMPLE: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MardiaTest {
    pub n: usize,
    pub p: usize,
    /// Multivariate skewness b1,p
    pub skewness: f64,
    pub skewness_statistic: f64,
    pub skewness_df: f64,
    pub skewness_p: f64,
    /// Multivariate kurtosis b2,p
    pub kurtosis: f64,
    pub kurtosis_z: f64,
    pub kurtosis_p: f64,
}

impl MardiaTest {
    pub fn is_normal(&self) -> bool {
        self.skewness_p > ALPHA && self.kurtosis_p > ALPHA
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnivariateNormality {
    pub item: String,
    /// Anderson-Darling A^2
    pub statistic: f64,
    pub p_value: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl UnivariateNormality {
    pub fn is_normal(&self) -> bool {
        self.p_value > ALPHA
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalityReport {
    pub mardia: MardiaTest,
    pub univariate: Vec<UnivariateNormality>,
}

pub fn assess_normality(items: &ItemResponses) -> Result<NormalityReport> {
    let mardia = mardia_test(&items.to_matrix())?;
    let univariate = items
        .labels()
        .iter()
        .enumerate()
        .map(|(j, label)| {
            let values = items.column_f64(j);
            let (statistic, p_value) = anderson_darling(&values).map_err(|e| match e {
                StudyError::DegenerateInput(msg) => {
                    StudyError::degenerate(format!("item '{}': {}", label, msg))
                }
                other => other,
            })?;
            Ok(UnivariateNormality {
                item: label.clone(),
                statistic,
                p_value,
                skewness: skewness(&values),
                kurtosis: excess_kurtosis(&values),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NormalityReport { mardia, univariate })
}

/// Mardia's multivariate skewness and kurtosis tests.
pub fn mardia_test(data: &DMatrix<f64>) -> Result<MardiaTest> {
    let (n, p) = data.shape();
    if n <= p {
        return Err(StudyError::degenerate(format!(
            "Mardia's test needs more respondents ({}) than items ({})",
            n, p
        )));
    }

    let cov = covariance(data, 0);
    let inv = spd_inverse(&cov, "item covariance matrix")?;
    let means = data.row_mean();
    let centered = DMatrix::from_fn(n, p, |r, c| data[(r, c)] - means[c]);
    let d = &centered * inv * centered.transpose();

    let nf = n as f64;
    let pf = p as f64;
    let b1 = d.iter().map(|v| v * v * v).sum::<f64>() / (nf * nf);
    let b2 = (0..n).map(|i| d[(i, i)] * d[(i, i)]).sum::<f64>() / nf;

    let skewness_statistic = nf * b1 / 6.0;
    let skewness_df = pf * (pf + 1.0) * (pf + 2.0) / 6.0;
    let chi = ChiSquared::new(skewness_df)
        .map_err(|e| StudyError::analysis(format!("chi-square distribution: {}", e)))?;
    let skewness_p = chi.sf(skewness_statistic);

    let kurtosis_z = (b2 - pf * (pf + 2.0)) / (8.0 * pf * (pf + 2.0) / nf).sqrt();
    let kurtosis_p = 2.0 * (1.0 - pnorm(kurtosis_z.abs()));

    Ok(MardiaTest {
        n,
        p,
        skewness: b1,
        skewness_statistic,
        skewness_df,
        skewness_p,
        kurtosis: b2,
        kurtosis_z,
        kurtosis_p,
    })
}

/// Anderson-Darling test for normality with estimated mean and variance.
///
/// Returns `(A^2, p)` using the D'Agostino-Stephens p-value approximation.
pub fn anderson_darling(values: &[f64]) -> Result<(f64, f64)> {
    let n = values.len();
    if n < MIN_AD_SAMPLE {
        return Err(StudyError::degenerate(format!(
            "Anderson-Darling needs at least {} observations, got {}",
            MIN_AD_SAMPLE, n
        )));
    }
    let sd = sample_sd(values);
    if !(sd > 0.0) {
        return Err(StudyError::degenerate("zero variance"));
    }
    let m = mean(values);

    let mut z: Vec<f64> = values.iter().map(|v| (v - m) / sd).collect();
    z.sort_by(f64::total_cmp);

    let nf = n as f64;
    let sum: f64 = (0..n)
        .map(|i| {
            let lower = pnorm(z[i]).max(f64::MIN_POSITIVE).ln();
            let upper = pnorm(-z[n - 1 - i]).max(f64::MIN_POSITIVE).ln();
            (2.0 * i as f64 + 1.0) * (lower + upper)
        })
        .sum();
    let a2 = -nf - sum / nf;
    let adjusted = a2 * (1.0 + 0.75 / nf + 2.25 / (nf * nf));

    Ok((a2, ad_p_value(adjusted)))
}

fn ad_p_value(aa: f64) -> f64 {
    let p = if aa < 0.2 {
        1.0 - (-13.436 + 101.14 * aa - 223.73 * aa * aa).exp()
    } else if aa < 0.34 {
        1.0 - (-8.318 + 42.796 * aa - 59.938 * aa * aa).exp()
    } else if aa < 0.6 {
        (0.9177 - 4.279 * aa - 1.38 * aa * aa).exp()
    } else if aa < 10.0 {
        (1.2937 - 5.709 * aa + 0.0186 * aa * aa).exp()
    } else {
        3.7e-24
    };
    p.clamp(0.0, 1.0)
}
