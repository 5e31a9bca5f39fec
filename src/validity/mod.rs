//! Reliability and validity evidence derived from the confirmatory fit.

pub mod htmt;
pub mod reliability;

use serde::Serialize;

use crate::analysis::CorrelationMatrix;
use crate::cfa::{ConfirmatoryFit, MeasurementModel};
use crate::errors::Result;

pub use htmt::{htmt, HtmtMatrix, HTMT_THRESHOLD};
pub use reliability::{
    average_variance_extracted, composite_reliability, fornell_larcker, reliability_table,
    FactorReliability, FornellLarcker,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidityReport {
    pub reliability: Vec<FactorReliability>,
    pub fornell_larcker: FornellLarcker,
    pub htmt: HtmtMatrix,
}

/// AVE, CR and Fornell-Larcker come from the fitted model; HTMT comes from
/// the item correlations of the exploratory half.
pub fn assess_validity(
    fit: &ConfirmatoryFit,
    cor: &CorrelationMatrix,
    model: &MeasurementModel,
) -> Result<ValidityReport> {
    Ok(ValidityReport {
        reliability: reliability_table(fit),
        fornell_larcker: fornell_larcker(fit),
        htmt: htmt(cor, model)?,
    })
}
