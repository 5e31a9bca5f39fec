//! Global fit indices of a confirmatory model.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::errors::{Result, StudyError};

/// Raw quantities the indices are derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitStatistics {
    pub chi_square: f64,
    pub df: f64,
    pub baseline_chi_square: f64,
    pub baseline_df: f64,
    pub n_observations: usize,
    /// Number of modelled correlations
    pub n_elements: usize,
    /// Weighted sum of squared sample correlations
    pub weighted_total: f64,
    /// Root mean square of the correlation residuals
    pub srmr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitIndices {
    pub chi_square: f64,
    pub df: f64,
    pub p_value: f64,
    pub gfi: f64,
    pub agfi: f64,
    pub rmsea: f64,
    pub srmr: f64,
    pub cfi: f64,
    pub tli: f64,
    pub nfi: f64,
    pub pnfi: f64,
    pub ifi: f64,
    pub baseline_chi_square: f64,
    pub baseline_df: f64,
}

impl FitIndices {
    pub fn compute(s: &FitStatistics) -> Result<Self> {
        let chi = ChiSquared::new(s.df)
            .map_err(|e| StudyError::analysis(format!("chi-square distribution: {}", e)))?;
        let (x2, df, xb, dfb) = (s.chi_square, s.df, s.baseline_chi_square, s.baseline_df);

        let gfi = if s.weighted_total > 0.0 {
            1.0 - x2 / s.weighted_total
        } else {
            f64::NAN
        };
        let agfi = 1.0 - (s.n_elements as f64 / df) * (1.0 - gfi);

        let excess = (x2 - df).max(0.0);
        let baseline_excess = (xb - dfb).max(0.0);
        let cfi_denominator = excess.max(baseline_excess);
        let cfi = if cfi_denominator > 0.0 {
            1.0 - excess / cfi_denominator
        } else {
            1.0
        };

        let tli = ((xb / dfb) - (x2 / df)) / ((xb / dfb) - 1.0);
        let nfi = (xb - x2) / xb;
        let rmsea = (excess / (df * s.n_observations as f64)).sqrt();

        Ok(Self {
            chi_square: x2,
            df,
            p_value: chi.sf(x2),
            gfi,
            agfi,
            rmsea,
            srmr: s.srmr,
            cfi,
            tli,
            nfi,
            pnfi: (df / dfb) * nfi,
            ifi: (xb - x2) / (xb - df),
            baseline_chi_square: xb,
            baseline_df: dfb,
        })
    }

    /// Index table in reporting order.
    pub fn rows(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("chisq", self.chi_square),
            ("df", self.df),
            ("pvalue", self.p_value),
            ("gfi", self.gfi),
            ("rmsea", self.rmsea),
            ("srmr", self.srmr),
            ("cfi", self.cfi),
            ("tli", self.tli),
            ("agfi", self.agfi),
            ("nfi", self.nfi),
            ("pnfi", self.pnfi),
            ("ifi", self.ifi),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(chi_square: f64) -> FitStatistics {
        FitStatistics {
            chi_square,
            df: 87.0,
            baseline_chi_square: 2400.0,
            baseline_df: 105.0,
            n_observations: 247,
            n_elements: 105,
            weighted_total: 2400.0,
            srmr: 0.05,
        }
    }

    #[test]
    fn test_perfect_fit() {
        let idx = FitIndices::compute(&stats(0.0)).unwrap();
        assert_eq!(idx.cfi, 1.0);
        assert_eq!(idx.rmsea, 0.0);
        assert_eq!(idx.gfi, 1.0);
        assert!(idx.tli > 1.0);
        assert!((idx.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_values() {
        let idx = FitIndices::compute(&stats(150.0)).unwrap();
        let cfi = 1.0 - 63.0 / 2295.0;
        assert!((idx.cfi - cfi).abs() < 1e-12);
        let rmsea = (63.0f64 / (87.0 * 247.0)).sqrt();
        assert!((idx.rmsea - rmsea).abs() < 1e-12);
        let tli = (2400.0 / 105.0 - 150.0 / 87.0) / (2400.0 / 105.0 - 1.0);
        assert!((idx.tli - tli).abs() < 1e-12);
        assert!((idx.pnfi - (87.0 / 105.0) * idx.nfi).abs() < 1e-12);
        assert!(idx.p_value < 0.001);
    }

    #[test]
    fn test_rows_cover_every_index() {
        let idx = FitIndices::compute(&stats(120.0)).unwrap();
        let rows = idx.rows();
        assert_eq!(rows.len(), 12);
        assert!(rows.iter().all(|(_, v)| v.is_finite()));
    }
}
