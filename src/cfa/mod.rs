//! Confirmatory factor analysis of a fixed measurement model.

pub mod dwls;
pub mod fit_indices;
pub mod model;

pub use dwls::{fit_cfa, ConfirmatoryFit, FactorCorrelation, StandardizedLoading};
pub use fit_indices::FitIndices;
pub use model::{LatentFactor, MeasurementModel};
