//! Content validity of items from expert judge ratings (Aiken's V).
//!
//! For `n` judges rating an item on `[lo, hi]`,
//! `V = Σ (r - lo) / (n (hi - lo))`. Intervals follow the score method of
//! Penfield and Giacobbi, which stays inside [0, 1] for small panels.

use serde::Serialize;

use crate::config::ContentValidityConfig;
use crate::data::SurveyTable;
use crate::errors::{Result, StudyError};
use crate::math::normal::qnorm;

/// One judge's rating of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeRating {
    pub criterion: Option<String>,
    pub item: String,
    pub judge: String,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AikenV {
    pub criterion: Option<String>,
    pub item: String,
    pub n_judges: usize,
    pub v: f64,
    pub lower: f64,
    pub upper: f64,
    pub adequate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentValidityReport {
    pub scale_min: f64,
    pub scale_max: f64,
    pub confidence: f64,
    pub min_lower_bound: f64,
    pub items: Vec<AikenV>,
}

impl ContentValidityReport {
    pub fn n_adequate(&self) -> usize {
        self.items.iter().filter(|v| v.adequate).count()
    }
}

/// Ratings from a long-format table: one row per (criterion, item, judge).
pub fn read_ratings(
    table: &SurveyTable,
    config: &ContentValidityConfig,
) -> Result<Vec<JudgeRating>> {
    let item = table.column_index(&config.item_column)?;
    let judge = table.column_index(&config.judge_column)?;
    let rating = table.column_index(&config.rating_column)?;
    let criterion = config
        .criterion_column
        .as_deref()
        .map(|c| table.column_index(c))
        .transpose()?;

    table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let raw = row[rating].trim();
            let value: f64 = raw.parse().map_err(|_| {
                StudyError::data_shape(format!(
                    "row {}: rating '{}' in column '{}' is not numeric",
                    table.source_row(i),
                    raw,
                    config.rating_column
                ))
            })?;
            Ok(JudgeRating {
                criterion: criterion.map(|c| row[c].trim().to_string()),
                item: row[item].trim().to_string(),
                judge: row[judge].trim().to_string(),
                rating: value,
            })
        })
        .collect()
}

/// Aiken's V of one item's ratings.
pub fn aiken_v(ratings: &[f64], scale_min: f64, scale_max: f64) -> Result<f64> {
    if ratings.is_empty() {
        return Err(StudyError::degenerate("Aiken's V needs at least one rating"));
    }
    if !(scale_max > scale_min) {
        return Err(StudyError::config(format!(
            "rating scale [{}, {}] is empty",
            scale_min, scale_max
        )));
    }
    if let Some(r) = ratings
        .iter()
        .find(|r| !(scale_min..=scale_max).contains(*r))
    {
        return Err(StudyError::data_shape(format!(
            "rating {} is outside the scale [{}, {}]",
            r, scale_min, scale_max
        )));
    }
    let sum: f64 = ratings.iter().map(|r| r - scale_min).sum();
    Ok(sum / (ratings.len() as f64 * (scale_max - scale_min)))
}

/// Score confidence interval for V from `n` judges on a scale spanning `k`
/// steps.
pub fn score_interval(v: f64, n: usize, k: f64, confidence: f64) -> (f64, f64) {
    let z = qnorm(1.0 - (1.0 - confidence) / 2.0);
    let nk = n as f64 * k;
    let centre = 2.0 * nk * v + z * z;
    let spread = z * (4.0 * nk * v * (1.0 - v) + z * z).sqrt();
    let denominator = 2.0 * (nk + z * z);
    ((centre - spread) / denominator, (centre + spread) / denominator)
}

/// V and its interval for every (criterion, item), in order of first
/// appearance.
pub fn content_validity(
    ratings: &[JudgeRating],
    config: &ContentValidityConfig,
) -> Result<ContentValidityReport> {
    if ratings.is_empty() {
        return Err(StudyError::data_shape("ratings table has no rows"));
    }

    let mut groups: Vec<((Option<String>, String), Vec<&JudgeRating>)> = Vec::new();
    for rating in ratings {
        let key = (rating.criterion.clone(), rating.item.clone());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => {
                if members.iter().any(|m| m.judge == rating.judge) {
                    return Err(StudyError::data_shape(format!(
                        "judge '{}' rated item '{}' more than once",
                        rating.judge, rating.item
                    )));
                }
                members.push(rating);
            }
            None => groups.push((key, vec![rating])),
        }
    }

    let k = config.scale_max - config.scale_min;
    let items = groups
        .into_iter()
        .map(|((criterion, item), members)| {
            let values: Vec<f64> = members.iter().map(|m| m.rating).collect();
            let v = aiken_v(&values, config.scale_min, config.scale_max).map_err(|e| match e {
                StudyError::DataShape(msg) => {
                    StudyError::data_shape(format!("item '{}': {}", item, msg))
                }
                other => other,
            })?;
            let (lower, upper) = score_interval(v, values.len(), k, config.confidence);
            Ok(AikenV {
                criterion,
                item,
                n_judges: values.len(),
                v,
                lower,
                upper,
                adequate: lower >= config.min_lower_bound,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ContentValidityReport {
        scale_min: config.scale_min,
        scale_max: config.scale_max,
        confidence: config.confidence,
        min_lower_bound: config.min_lower_bound,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn table(text: &str) -> SurveyTable {
        SurveyTable::from_reader(text.as_bytes(), ',').unwrap()
    }

    #[test]
    fn test_aiken_v_bounds() {
        assert_eq!(aiken_v(&[4.0, 4.0, 4.0], 1.0, 4.0).unwrap(), 1.0);
        assert_eq!(aiken_v(&[1.0, 1.0], 1.0, 4.0).unwrap(), 0.0);
        // (2 + 3 + 3 + 1) / (4 * 3)
        let v = aiken_v(&[3.0, 4.0, 4.0, 2.0], 1.0, 4.0).unwrap();
        assert!((v - 9.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_rating_outside_scale_is_data_shape() {
        let err = aiken_v(&[5.0], 1.0, 4.0).unwrap_err();
        assert!(matches!(err, StudyError::DataShape(_)));
    }

    #[test]
    fn test_score_interval_contains_v() {
        // Published example: 10 judges, 5-point scale, V = 0.8
        let (lower, upper) = score_interval(0.8, 10, 4.0, 0.95);
        assert!(lower < 0.8 && 0.8 < upper);
        assert!((lower - 0.652).abs() < 0.005, "lower = {}", lower);
        assert!((upper - 0.895).abs() < 0.005, "upper = {}", upper);
    }

    #[test]
    fn test_perfect_agreement_interval_stays_in_unit_range() {
        let (lower, upper) = score_interval(1.0, 5, 3.0, 0.95);
        assert!(lower > 0.0 && lower < 1.0);
        assert!((upper - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_report_groups_by_criterion_and_item() {
        let t = table(indoc! {"
            criterion,item,judge,rating
            clarity,A1,j1,4
            clarity,A1,j2,4
            relevance,A1,j1,3
            relevance,A1,j2,2
            clarity,A2,j1,1
            clarity,A2,j2,2
        "});
        let config = ContentValidityConfig {
            criterion_column: Some("criterion".to_string()),
            ..ContentValidityConfig::default()
        };
        let ratings = read_ratings(&t, &config).unwrap();
        let report = content_validity(&ratings, &config).unwrap();
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.items[0].criterion.as_deref(), Some("clarity"));
        assert_eq!(report.items[0].v, 1.0);
        assert_eq!(report.items[1].criterion.as_deref(), Some("relevance"));
        assert!((report.items[1].v - 0.5).abs() < 1e-12);
        assert_eq!(report.items[2].item, "A2");
        assert!(!report.items[2].adequate);
    }

    #[test]
    fn test_duplicate_judge_rejected() {
        let t = table(indoc! {"
            item,judge,rating
            A1,j1,4
            A1,j1,3
        "});
        let config = ContentValidityConfig::default();
        let ratings = read_ratings(&t, &config).unwrap();
        let err = content_validity(&ratings, &config).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_non_numeric_rating_names_row() {
        let t = table(indoc! {"
            item,judge,rating
            A1,j1,high
        "});
        let err = read_ratings(&t, &ContentValidityConfig::default()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
