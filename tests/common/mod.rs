// Shared fixtures for scaleval integration tests
#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs;
use std::path::{Path, PathBuf};

use scaleval::data::SurveyTable;

/// The 15 columns that precede the items, in export order.
pub const LEADING_COLUMNS: [&str; 15] = [
    "id",
    "timestamp",
    "consent",
    "sex",
    "age",
    "campus",
    "modality",
    "field",
    "year",
    "sat_program",
    "sat_teaching",
    "sat_resources",
    "sat_services",
    "sat_overall",
    "email",
];

/// Items per factor in the default model: A1-A4, E1-E6, C1-C5.
pub const FACTOR_SIZES: [usize; 3] = [4, 6, 5];

const CUTS: [f64; 4] = [-1.3, -0.45, 0.35, 1.2];

fn ordinal(z: f64) -> i32 {
    1 + CUTS.iter().filter(|&&c| z > c).count() as i32
}

/// Survey export with three correlated factors behind items q16-q30.
/// Every 25th respondent declines consent.
pub fn synthetic_survey_csv(n: usize, loading: f64, seed: u64) -> String {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut out = LEADING_COLUMNS.join(",");
    for q in 16..=30 {
        out.push_str(&format!(",q{}", q));
    }
    out.push('\n');

    let unique = (1.0 - loading * loading).sqrt();
    for r in 0..n {
        let general: f64 = StandardNormal.sample(&mut rng);
        let factors: Vec<f64> = (0..3)
            .map(|_| {
                let own: f64 = StandardNormal.sample(&mut rng);
                0.4 * general + (1.0 - 0.16f64).sqrt() * own
            })
            .collect();

        let consent = if r % 25 == 24 { "No" } else { "Yes" };
        let sex = if rng.gen_bool(0.5) { "F" } else { "M" };
        let age = rng.gen_range(17..=35);
        let campus = ["North", "South"][rng.gen_range(0..2)];
        let modality = ["Onsite", "Online"][rng.gen_range(0..2)];
        let field = ["Health", "Engineering", "Business"][rng.gen_range(0..3)];
        let year = rng.gen_range(1..=5);
        let mut row = vec![
            (r + 1).to_string(),
            format!("2024-03-{:02} 10:00", 1 + r % 28),
            consent.to_string(),
            sex.to_string(),
            age.to_string(),
            campus.to_string(),
            modality.to_string(),
            field.to_string(),
            year.to_string(),
        ];
        for _ in 0..5 {
            row.push(rng.gen_range(1..=5).to_string());
        }
        row.push(format!("student{}@example.edu", r + 1));

        for (f, size) in FACTOR_SIZES.iter().enumerate() {
            for _ in 0..*size {
                let e: f64 = StandardNormal.sample(&mut rng);
                row.push(ordinal(loading * factors[f] + unique * e).to_string());
            }
        }
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

pub fn synthetic_table(n: usize, seed: u64) -> SurveyTable {
    let csv = synthetic_survey_csv(n, 0.75, seed);
    SurveyTable::from_reader(csv.as_bytes(), ',').unwrap()
}

pub fn write_survey(dir: &Path, n: usize, seed: u64) -> PathBuf {
    let path = dir.join("survey.csv");
    fs::write(&path, synthetic_survey_csv(n, 0.75, seed)).unwrap();
    path
}
