//! Exploratory half analyses: distribution checks, correlations, factor
//! retention and exploratory factor analysis.

pub mod efa;
pub mod factorability;
pub mod normality;
pub mod polychoric;
pub mod retention;
pub mod rotation;

pub use efa::{fit_efa, ExploratoryFit};
pub use factorability::{assess_factorability, FactorabilityReport};
pub use normality::{assess_normality, NormalityReport};
pub use polychoric::{CorrelationMatrix, CorrelationMethod};
pub use retention::{estimate_factor_count, RetentionCriterion, RetentionReport};
