//! Heterotrait-monotrait ratio of correlations.

use serde::Serialize;

use crate::analysis::CorrelationMatrix;
use crate::cfa::MeasurementModel;
use crate::errors::{Result, StudyError};

/// Conventional upper bound for discriminant validity
pub const HTMT_THRESHOLD: f64 = 0.85;

/// Symmetric factor-by-factor HTMT values.
///
/// Cells are `None` on the diagonal and wherever a ratio is undefined; each
/// undefined off-diagonal cell is explained in `notes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmtMatrix {
    pub factors: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
    pub notes: Vec<String>,
}

impl HtmtMatrix {
    pub fn get(&self, a: usize, b: usize) -> Option<f64> {
        self.values[a][b]
    }

    /// Unordered factor pairs with their ratio.
    pub fn pairs(&self) -> Vec<(&str, &str, Option<f64>)> {
        let k = self.factors.len();
        let mut out = Vec::new();
        for a in 0..k {
            for b in (a + 1)..k {
                out.push((
                    self.factors[a].as_str(),
                    self.factors[b].as_str(),
                    self.values[a][b],
                ));
            }
        }
        out
    }
}

fn columns(cor: &CorrelationMatrix, items: &[String]) -> Result<Vec<usize>> {
    items
        .iter()
        .map(|item| {
            cor.index_of(item).ok_or_else(|| {
                StudyError::model_spec(format!("item '{}' is not in the correlation matrix", item))
            })
        })
        .collect()
}

/// Mean absolute correlation among distinct items of one factor.
fn monotrait_mean(cor: &CorrelationMatrix, cols: &[usize]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0;
    for (n, &i) in cols.iter().enumerate() {
        for &j in &cols[n + 1..] {
            sum += cor.get(i, j).abs();
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

fn heterotrait_mean(cor: &CorrelationMatrix, a: &[usize], b: &[usize]) -> f64 {
    let sum: f64 = a
        .iter()
        .flat_map(|&i| b.iter().map(move |&j| (i, j)))
        .map(|(i, j)| cor.get(i, j).abs())
        .sum();
    sum / (a.len() * b.len()) as f64
}

/// HTMT for every unordered factor pair, from item correlations.
pub fn htmt(cor: &CorrelationMatrix, model: &MeasurementModel) -> Result<HtmtMatrix> {
    let factors = model.factors();
    let cols: Vec<Vec<usize>> = factors
        .iter()
        .map(|f| columns(cor, &f.items))
        .collect::<Result<_>>()?;

    let mut notes = Vec::new();
    let monotrait: Vec<Option<f64>> = factors
        .iter()
        .zip(&cols)
        .map(|(factor, c)| match monotrait_mean(cor, c) {
            None => {
                notes.push(format!(
                    "factor '{}' has a single item, so its monotrait correlation is undefined",
                    factor.name
                ));
                None
            }
            Some(m) if m == 0.0 => {
                notes.push(format!(
                    "factor '{}' has zero mean within-factor correlation",
                    factor.name
                ));
                None
            }
            Some(m) => Some(m),
        })
        .collect();

    let k = factors.len();
    let mut values = vec![vec![None; k]; k];
    for a in 0..k {
        for b in (a + 1)..k {
            let ratio = match (monotrait[a], monotrait[b]) {
                (Some(ma), Some(mb)) => {
                    Some(heterotrait_mean(cor, &cols[a], &cols[b]) / (ma * mb).sqrt())
                }
                _ => None,
            };
            values[a][b] = ratio;
            values[b][a] = ratio;
        }
    }

    Ok(HtmtMatrix {
        factors: factors.iter().map(|f| f.name.clone()).collect(),
        values,
        notes,
    })
}
