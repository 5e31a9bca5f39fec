//! Kaiser-Meyer-Olkin sampling adequacy and Bartlett's sphericity test.

use nalgebra::DMatrix;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::data::ItemResponses;
use crate::errors::{Result, StudyError};
use crate::math::matrix::{log_determinant, pearson_correlation, spd_inverse};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BartlettTest {
    pub chi_square: f64,
    pub df: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorabilityReport {
    pub kmo: f64,
    pub kmo_verdict: &'static str,
    /// Per-item measure of sampling adequacy, in item order
    pub msa: Vec<(String, f64)>,
    pub bartlett: BartlettTest,
}

/// Kaiser's labels for overall KMO values.
pub fn kmo_verdict(kmo: f64) -> &'static str {
    match kmo {
        k if k >= 0.9 => "marvelous",
        k if k >= 0.8 => "meritorious",
        k if k >= 0.7 => "middling",
        k if k >= 0.6 => "mediocre",
        k if k >= 0.5 => "miserable",
        _ => "unacceptable",
    }
}

pub fn assess_factorability(items: &ItemResponses) -> Result<FactorabilityReport> {
    let r = pearson_correlation(&items.to_matrix(), items.labels())?;
    let (kmo, msa) = kaiser_meyer_olkin(&r)?;
    let bartlett = bartlett_sphericity(&r, items.n_respondents())?;
    log::debug!("KMO = {:.3}, Bartlett chi2 = {:.2}", kmo, bartlett.chi_square);

    Ok(FactorabilityReport {
        kmo,
        kmo_verdict: kmo_verdict(kmo),
        msa: items.labels().iter().cloned().zip(msa).collect(),
        bartlett,
    })
}

/// Overall KMO and per-item MSA from a correlation matrix.
pub fn kaiser_meyer_olkin(r: &DMatrix<f64>) -> Result<(f64, Vec<f64>)> {
    let inv = spd_inverse(r, "correlation matrix")?;
    let p = r.nrows();
    let partial = |i: usize, j: usize| -inv[(i, j)] / (inv[(i, i)] * inv[(j, j)]).sqrt();

    let mut r2_total = 0.0;
    let mut a2_total = 0.0;
    let mut msa = Vec::with_capacity(p);
    for i in 0..p {
        let mut r2 = 0.0;
        let mut a2 = 0.0;
        for j in (0..p).filter(|&j| j != i) {
            r2 += r[(i, j)] * r[(i, j)];
            a2 += partial(i, j).powi(2);
        }
        msa.push(r2 / (r2 + a2));
        r2_total += r2;
        a2_total += a2;
    }
    Ok((r2_total / (r2_total + a2_total), msa))
}

pub fn bartlett_sphericity(r: &DMatrix<f64>, n: usize) -> Result<BartlettTest> {
    let p = r.nrows() as f64;
    let log_det = log_determinant(r)
        .ok_or_else(|| StudyError::degenerate("correlation matrix is singular"))?;
    let chi_square = -((n as f64) - 1.0 - (2.0 * p + 5.0) / 6.0) * log_det;
    let df = p * (p - 1.0) / 2.0;
    let chi = ChiSquared::new(df)
        .map_err(|e| StudyError::analysis(format!("chi-square distribution: {}", e)))?;
    Ok(BartlettTest {
        chi_square,
        df,
        p_value: chi.sf(chi_square),
    })
}
