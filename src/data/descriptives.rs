//! Sociodemographic, satisfaction and item summaries for the report.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::items::ItemResponses;
use super::survey::SurveyTable;
use crate::config::DescriptivesConfig;
use crate::errors::{Result, StudyError};
use crate::math::stats::{excess_kurtosis, mean, median, sample_sd, skewness};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyRow {
    pub value: String,
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyTable {
    pub column: String,
    pub rows: Vec<FrequencyRow>,
    /// Blank cells, excluded from the percentages
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub n: usize,
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDescriptive {
    pub item: String,
    pub mean: f64,
    pub sd: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveReport {
    pub sociodemographic: Vec<FrequencyTable>,
    pub satisfaction: Vec<FrequencyTable>,
    pub numeric: Vec<NumericSummary>,
    pub items: Vec<ItemDescriptive>,
}

pub fn describe(
    table: &SurveyTable,
    items: &ItemResponses,
    config: &DescriptivesConfig,
) -> Result<DescriptiveReport> {
    let frequencies = |columns: &[String]| -> Result<Vec<FrequencyTable>> {
        columns
            .iter()
            .map(|c| frequency_table(table, c, config.value_labels.get(c)))
            .collect()
    };

    Ok(DescriptiveReport {
        sociodemographic: frequencies(&config.categorical)?,
        satisfaction: frequencies(&config.satisfaction)?,
        numeric: config
            .numeric
            .iter()
            .map(|c| numeric_summary(table, c))
            .collect::<Result<_>>()?,
        items: item_descriptives(items),
    })
}

pub fn frequency_table(
    table: &SurveyTable,
    column: &str,
    labels: Option<&BTreeMap<String, String>>,
) -> Result<FrequencyTable> {
    let values = table.column(column)?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut missing = 0;
    for v in values {
        let v = v.trim();
        if v.is_empty() {
            missing += 1;
        } else {
            *counts.entry(v).or_default() += 1;
        }
    }

    let answered: usize = counts.values().sum();
    let mut rows: Vec<FrequencyRow> = counts
        .into_iter()
        .map(|(value, count)| FrequencyRow {
            value: value.to_string(),
            label: labels
                .and_then(|l| l.get(value).cloned())
                .unwrap_or_else(|| value.to_string()),
            count,
            percent: 100.0 * count as f64 / answered.max(1) as f64,
        })
        .collect();
    rows.sort_by(|a, b| compare_values(&a.value, &b.value));

    Ok(FrequencyTable {
        column: column.to_string(),
        rows,
        missing,
    })
}

/// Numeric order when both values are numbers, lexical otherwise.
fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

pub fn numeric_summary(table: &SurveyTable, column: &str) -> Result<NumericSummary> {
    let mut values = Vec::new();
    for (i, raw) in table.column(column)?.into_iter().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let v = raw.parse::<f64>().map_err(|_| {
            StudyError::data_shape(format!(
                "row {}, column '{}': '{}' is not numeric",
                table.source_row(i),
                column,
                raw
            ))
        })?;
        values.push(v);
    }

    Ok(NumericSummary {
        column: column.to_string(),
        n: values.len(),
        mean: mean(&values),
        sd: sample_sd(&values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        median: median(&values),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

pub fn item_descriptives(items: &ItemResponses) -> Vec<ItemDescriptive> {
    items
        .labels()
        .iter()
        .enumerate()
        .map(|(j, label)| {
            let column = items.column(j);
            let values = items.column_f64(j);
            ItemDescriptive {
                item: label.clone(),
                mean: mean(&values),
                sd: sample_sd(&values),
                skewness: skewness(&values),
                kurtosis: excess_kurtosis(&values),
                min: column.iter().copied().min().unwrap_or_default(),
                max: column.iter().copied().max().unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn table() -> SurveyTable {
        let text = indoc! {"
            sex,age,year
            F,19,2
            M,21,10
            F,,1
            ,20,2
        "};
        SurveyTable::from_reader(text.as_bytes(), ',').unwrap()
    }

    #[test]
    fn test_frequency_counts_and_labels() {
        let mut labels = BTreeMap::new();
        labels.insert("F".to_string(), "Female".to_string());
        let freq = frequency_table(&table(), "sex", Some(&labels)).unwrap();
        assert_eq!(freq.missing, 1);
        assert_eq!(freq.rows[0].label, "Female");
        assert_eq!(freq.rows[0].count, 2);
        assert!((freq.rows[0].percent - 66.666_666).abs() < 1e-3);
        assert_eq!(freq.rows[1].label, "M");
    }

    #[test]
    fn test_numeric_values_sorted_numerically() {
        let freq = frequency_table(&table(), "year", None).unwrap();
        let order: Vec<&str> = freq.rows.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(order, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_numeric_summary_skips_blanks() {
        let summary = numeric_summary(&table(), "age").unwrap();
        assert_eq!(summary.n, 3);
        assert_eq!(summary.mean, 20.0);
        assert_eq!(summary.min, 19.0);
        assert_eq!(summary.max, 21.0);
    }

    #[test]
    fn test_numeric_summary_rejects_text() {
        let err = numeric_summary(&table(), "sex").unwrap_err();
        assert!(matches!(err, StudyError::DataShape(_)));
    }
}
