//! Consent filtering, total scores and Hampel outlier screening.

use serde::Serialize;

use super::items::ItemResponses;
use super::survey::SurveyTable;
use crate::config::CleaningConfig;
use crate::errors::{Result, StudyError};
use crate::math::stats::{mad, median};

/// Median-centred acceptance interval for total scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HampelBounds {
    pub median: f64,
    pub mad: f64,
    pub lower: f64,
    pub upper: f64,
}

impl HampelBounds {
    /// `median +/- multiplier * mad_constant * MAD`
    pub fn from_values(values: &[f64], multiplier: f64, mad_constant: f64) -> Self {
        let center = median(values);
        let spread = mad(values, mad_constant);
        Self {
            median: center,
            mad: spread,
            lower: center - multiplier * spread,
            upper: center + multiplier * spread,
        }
    }

    /// Bounds are inclusive.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningSummary {
    pub raw_rows: usize,
    pub consented: usize,
    pub excluded_no_consent: usize,
    pub bounds: HampelBounds,
    pub excluded_outliers: usize,
    /// Source row numbers (1-based) of the dropped outliers
    pub outlier_rows: Vec<usize>,
    pub retained: usize,
}

/// Consented, outlier-screened respondents.
#[derive(Debug, Clone)]
pub struct CleanedSample {
    /// Retained rows with every original column, for descriptives
    pub table: SurveyTable,
    pub items: ItemResponses,
    pub totals: Vec<i64>,
    pub summary: CleaningSummary,
}

/// Parse one item cell. Integral decimals such as `"3.0"` are accepted.
pub fn parse_item_value(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i32>() {
        return Some(v);
    }
    let v = trimmed.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0 && v.abs() <= i32::MAX as f64).then_some(v as i32)
}

pub fn clean_survey(table: &SurveyTable, config: &CleaningConfig) -> Result<CleanedSample> {
    let consent_idx = table.column_index(&config.consent_column)?;
    let item_idx = table.resolve_items(&config.items)?;
    if item_idx.len() != config.item_labels.len() {
        return Err(StudyError::data_shape(format!(
            "{} item columns selected but {} labels configured",
            item_idx.len(),
            config.item_labels.len()
        )));
    }

    let consented: Vec<usize> = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row[consent_idx].trim() == config.consent_value)
        .map(|(i, _)| i)
        .collect();
    log::info!(
        "{} of {} respondents gave consent",
        consented.len(),
        table.n_rows()
    );

    let mut item_rows = Vec::with_capacity(consented.len());
    for &i in &consented {
        let row = &table.rows()[i];
        let mut values = Vec::with_capacity(item_idx.len());
        for &c in &item_idx {
            let value = parse_item_value(&row[c]).ok_or_else(|| {
                StudyError::data_shape(format!(
                    "row {}, column '{}': '{}' is not an integer item response",
                    table.source_row(i),
                    table.headers()[c],
                    row[c]
                ))
            })?;
            values.push(value);
        }
        item_rows.push(values);
    }

    let totals: Vec<i64> = item_rows
        .iter()
        .map(|r| r.iter().map(|&v| v as i64).sum())
        .collect();
    let total_f: Vec<f64> = totals.iter().map(|&t| t as f64).collect();
    let bounds =
        HampelBounds::from_values(&total_f, config.hampel_multiplier, config.mad_constant);

    let mut keep = Vec::new();
    let mut kept_items = Vec::new();
    let mut kept_totals = Vec::new();
    let mut outlier_rows = Vec::new();
    for ((&row, values), &total) in consented.iter().zip(item_rows).zip(&totals) {
        if bounds.contains(total as f64) {
            keep.push(row);
            kept_items.push(values);
            kept_totals.push(total);
        } else {
            outlier_rows.push(table.source_row(row));
        }
    }

    if keep.is_empty() {
        return Err(StudyError::data_shape(
            "no respondents left after consent filtering and outlier removal",
        ));
    }
    if !outlier_rows.is_empty() {
        log::info!(
            "Removed {} outliers outside [{:.2}, {:.2}]",
            outlier_rows.len(),
            bounds.lower,
            bounds.upper
        );
    }

    let summary = CleaningSummary {
        raw_rows: table.n_rows(),
        consented: consented.len(),
        excluded_no_consent: table.n_rows() - consented.len(),
        bounds,
        excluded_outliers: outlier_rows.len(),
        outlier_rows,
        retained: keep.len(),
    };

    Ok(CleanedSample {
        table: table.select_rows(&keep),
        items: ItemResponses::new(config.item_labels.clone(), kept_items)?,
        totals: kept_totals,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ItemColumns;
    use indoc::indoc;
    use proptest::prelude::*;

    fn config() -> CleaningConfig {
        CleaningConfig {
            items: ItemColumns::Positions { first: 3, last: 4 },
            item_labels: vec!["X1".into(), "X2".into()],
            ..CleaningConfig::default()
        }
    }

    #[test]
    fn test_parse_item_value() {
        assert_eq!(parse_item_value(" 3 "), Some(3));
        assert_eq!(parse_item_value("4.0"), Some(4));
        assert_eq!(parse_item_value("3.5"), None);
        assert_eq!(parse_item_value(""), None);
        assert_eq!(parse_item_value("agree"), None);
    }

    #[test]
    fn test_consent_filter_and_totals() {
        let text = indoc! {"
            id,consent,q1,q2
            1,Yes,3,4
            2,No,x,y
            3,Yes,2,2
            4,Yes,3,3
        "};
        let table = SurveyTable::from_reader(text.as_bytes(), ',').unwrap();
        let cleaned = clean_survey(&table, &config()).unwrap();
        assert_eq!(cleaned.summary.consented, 3);
        assert_eq!(cleaned.summary.excluded_no_consent, 1);
        assert_eq!(cleaned.totals, vec![7, 4, 6]);
        assert_eq!(cleaned.items.labels(), &["X1", "X2"]);
    }

    #[test]
    fn test_outlier_removed() {
        // totals 6,6,7,5,6,20 -> median 6, MAD 0.5, bounds [4.5, 7.5]
        let text = indoc! {"
            id,consent,q1,q2
            1,Yes,3,3
            2,Yes,3,3
            3,Yes,3,4
            4,Yes,2,3
            5,Yes,3,3
            6,Yes,10,10
        "};
        let table = SurveyTable::from_reader(text.as_bytes(), ',').unwrap();
        let cleaned = clean_survey(&table, &config()).unwrap();
        assert_eq!(cleaned.summary.excluded_outliers, 1);
        assert_eq!(cleaned.summary.outlier_rows, vec![6]);
        assert_eq!(cleaned.summary.bounds.median, 6.0);
        assert_eq!(cleaned.summary.bounds.mad, 0.5);
        assert_eq!(cleaned.items.n_respondents(), 5);
        assert_eq!(cleaned.table.n_rows(), 5);
    }

    #[test]
    fn test_non_numeric_item_names_row_and_column() {
        let text = indoc! {"
            id,consent,q1,q2
            1,Yes,3,4
            2,Yes,3,often
        "};
        let table = SurveyTable::from_reader(text.as_bytes(), ',').unwrap();
        let err = clean_survey(&table, &config()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("row 2"));
        assert!(message.contains("q2"));
    }

    #[test]
    fn test_missing_consent_column() {
        let table = SurveyTable::from_reader("id,q1,q2\n1,2,3\n".as_bytes(), ',').unwrap();
        let err = clean_survey(&table, &config()).unwrap_err();
        assert!(matches!(err, StudyError::DataShape(_)));
    }

    #[test]
    fn test_nobody_consented() {
        let table =
            SurveyTable::from_reader("id,consent,q1,q2\n1,No,2,3\n".as_bytes(), ',').unwrap();
        assert!(clean_survey(&table, &config()).is_err());
    }

    #[test]
    fn test_bounds_symmetric() {
        let b = HampelBounds::from_values(&[1.0, 5.0, 9.0, 2.0, 40.0], 3.0, 1.0);
        assert!(((b.median - b.lower) - (b.upper - b.median)).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_bounds_centred_on_median(
            values in prop::collection::vec(0.0f64..150.0, 1..60),
            multiplier in 0.5f64..5.0,
        ) {
            let b = HampelBounds::from_values(&values, multiplier, 1.4826);
            prop_assert!(b.lower <= b.upper);
            prop_assert!(b.contains(b.median));
            prop_assert!(((b.median - b.lower) - (b.upper - b.median)).abs() < 1e-9);
        }
    }
}
