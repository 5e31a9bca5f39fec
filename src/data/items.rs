use nalgebra::DMatrix;

use crate::errors::{Result, StudyError};

/// Ordinal item responses: one row per respondent, one column per item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResponses {
    labels: Vec<String>,
    /// Row-major values
    values: Vec<i32>,
    n_rows: usize,
}

impl ItemResponses {
    pub fn new(labels: Vec<String>, rows: Vec<Vec<i32>>) -> Result<Self> {
        let width = labels.len();
        if width == 0 {
            return Err(StudyError::data_shape("no item columns"));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(StudyError::data_shape(format!(
                "respondent {} has {} item values, expected {}",
                i + 1,
                row.len(),
                width
            )));
        }
        let n_rows = rows.len();
        Ok(Self {
            labels,
            values: rows.into_iter().flatten().collect(),
            n_rows,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn n_respondents(&self) -> usize {
        self.n_rows
    }

    pub fn n_items(&self) -> usize {
        self.labels.len()
    }

    pub fn value(&self, row: usize, item: usize) -> i32 {
        self.values[row * self.labels.len() + item]
    }

    pub fn row(&self, row: usize) -> &[i32] {
        let w = self.labels.len();
        &self.values[row * w..(row + 1) * w]
    }

    pub fn column(&self, item: usize) -> Vec<i32> {
        (0..self.n_rows).map(|r| self.value(r, item)).collect()
    }

    pub fn column_f64(&self, item: usize) -> Vec<f64> {
        (0..self.n_rows).map(|r| self.value(r, item) as f64).collect()
    }

    /// Row totals.
    pub fn totals(&self) -> Vec<i64> {
        (0..self.n_rows)
            .map(|r| self.row(r).iter().map(|&v| v as i64).sum())
            .collect()
    }

    /// Responses as a dense real matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n_rows, self.labels.len(), |r, c| {
            self.value(r, c) as f64
        })
    }

    /// Responses of the given respondents, in the given order. Indices may
    /// repeat (bootstrap resamples).
    pub fn select_rows(&self, rows: &[usize]) -> ItemResponses {
        let w = self.labels.len();
        let mut values = Vec::with_capacity(rows.len() * w);
        for &r in rows {
            values.extend_from_slice(self.row(r));
        }
        ItemResponses {
            labels: self.labels.clone(),
            values,
            n_rows: rows.len(),
        }
    }

    /// Column index of an item label.
    pub fn item_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}
