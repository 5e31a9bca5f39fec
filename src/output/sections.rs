//! Report sections as plain rows, shared by the terminal and markdown
//! renderers.

use crate::content_validity::ContentValidityReport;
use crate::data::descriptives::FrequencyTable;
use crate::math::SmoothingReport;
use crate::network::NetworkReport;
use crate::pipeline::StudyReport;

/// A titled table with optional notes underneath.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub notes: Vec<String>,
}

impl Section {
    fn new(title: impl Into<String>, header: &[&str]) -> Self {
        Self {
            title: title.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Fixed-decimal number, `n/a` for non-finite values.
pub fn number(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        "n/a".to_string()
    }
}

fn optional(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| number(v, decimals))
}

fn p_value(p: f64, decimals: usize) -> String {
    let floor = 10f64.powi(-(decimals as i32));
    if p.is_finite() && p < floor {
        format!("< {}", number(floor, decimals))
    } else {
        number(p, decimals)
    }
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "yes" } else { "no" };
    text.to_string()
}

pub fn study_sections(report: &StudyReport, decimals: usize) -> Vec<Section> {
    let d = decimals;
    let mut sections = vec![sample_section(report, d)];
    sections.extend(
        report
            .descriptives
            .sociodemographic
            .iter()
            .chain(&report.descriptives.satisfaction)
            .map(|t| frequency_section(t, d)),
    );
    if !report.descriptives.numeric.is_empty() {
        sections.push(numeric_section(report, d));
    }
    sections.push(item_section(report, d));
    sections.push(normality_section(report, d));
    sections.push(factorability_section(report, d));
    sections.push(retention_section(report));
    sections.push(efa_section(report, d));
    sections.push(fit_index_section(report, d));
    sections.push(loading_section(report, d));
    sections.push(factor_correlation_section(report, d));
    sections.push(reliability_section(report, d));
    sections.push(fornell_larcker_section(report, d));
    sections.push(htmt_section(report, d));
    if let Some(network) = &report.network {
        sections.extend(network_sections(network, d));
    }
    sections
}

fn sample_section(report: &StudyReport, d: usize) -> Section {
    let c = &report.cleaning;
    let mut s = Section::new("Sample", &["Step", "Value"]);
    s.row(vec!["Rows read".into(), c.raw_rows.to_string()]);
    s.row(vec!["Without consent".into(), c.excluded_no_consent.to_string()]);
    s.row(vec![
        "Outlier bounds (total score)".into(),
        format!("[{}, {}]", number(c.bounds.lower, d), number(c.bounds.upper, d)),
    ]);
    s.row(vec!["Outliers removed".into(), c.excluded_outliers.to_string()]);
    s.row(vec!["Retained".into(), c.retained.to_string()]);
    s.row(vec![
        "Exploratory half".into(),
        report.split.exploratory_rows.len().to_string(),
    ]);
    s.row(vec![
        "Confirmatory half".into(),
        report.split.confirmatory_rows.len().to_string(),
    ]);
    s.row(vec!["Split seed".into(), report.split.seed.to_string()]);
    if !report.split.stratified {
        s.note("The split is a simple random partition; it is not stratified by any respondent group.");
    }
    let halves = [
        ("Exploratory", report.correlation.smoothing()),
        ("Confirmatory", &report.confirmatory_smoothing),
    ];
    for (half, smoothing) in halves {
        if let Some(note) = smoothing_note(half, smoothing) {
            s.note(note);
        }
    }
    s
}

fn smoothing_note(half: &str, smoothing: &SmoothingReport) -> Option<String> {
    smoothing.applied.then(|| {
        format!(
            "{} polychoric matrix smoothed to positive definite: {} eigenvalue(s) raised \
             (smallest was {:.3e}), max entry change {:.2e}",
            half,
            smoothing.eigenvalues_adjusted,
            smoothing.min_eigenvalue_before,
            smoothing.max_abs_change
        )
    })
}

fn frequency_section(table: &FrequencyTable, d: usize) -> Section {
    let mut s = Section::new(format!("Distribution: {}", table.column), &["Value", "n", "%"]);
    for row in &table.rows {
        s.row(vec![
            row.label.clone(),
            row.count.to_string(),
            number(row.percent, d.min(1)),
        ]);
    }
    if table.missing > 0 {
        s.note(format!("{} missing value(s)", table.missing));
    }
    s
}

fn numeric_section(report: &StudyReport, d: usize) -> Section {
    let mut s = Section::new(
        "Numeric variables",
        &["Variable", "n", "Mean", "SD", "Min", "Median", "Max"],
    );
    for n in &report.descriptives.numeric {
        s.row(vec![
            n.column.clone(),
            n.n.to_string(),
            number(n.mean, d),
            number(n.sd, d),
            number(n.min, d),
            number(n.median, d),
            number(n.max, d),
        ]);
    }
    s
}

fn item_section(report: &StudyReport, d: usize) -> Section {
    let mut s = Section::new(
        "Item descriptives",
        &["Item", "Mean", "SD", "Skewness", "Kurtosis", "Min", "Max"],
    );
    for item in &report.descriptives.items {
        s.row(vec![
            item.item.clone(),
            number(item.mean, d),
            number(item.sd, d),
            number(item.skewness, d),
            number(item.kurtosis, d),
            item.min.to_string(),
            item.max.to_string(),
        ]);
    }
    s
}

fn normality_section(report: &StudyReport, d: usize) -> Section {
    let n = &report.normality;
    let mut s = Section::new(
        "Normality (exploratory half)",
        &["Test", "Statistic", "p", "Normal"],
    );
    let m = &n.mardia;
    s.row(vec![
        "Mardia skewness".into(),
        number(m.skewness_statistic, d),
        p_value(m.skewness_p, d),
        yes_no(m.skewness_p >= 0.05),
    ]);
    s.row(vec![
        "Mardia kurtosis".into(),
        number(m.kurtosis_z, d),
        p_value(m.kurtosis_p, d),
        yes_no(m.kurtosis_p >= 0.05),
    ]);
    for u in &n.univariate {
        s.row(vec![
            format!("Anderson-Darling {}", u.item),
            number(u.statistic, d),
            p_value(u.p_value, d),
            yes_no(u.is_normal()),
        ]);
    }
    s
}

fn factorability_section(report: &StudyReport, d: usize) -> Section {
    let f = &report.factorability;
    let mut s = Section::new("Factorability", &["Measure", "Value"]);
    s.row(vec![
        "KMO".into(),
        format!("{} ({})", number(f.kmo, d), f.kmo_verdict),
    ]);
    s.row(vec![
        "Bartlett chi-square".into(),
        number(f.bartlett.chi_square, d),
    ]);
    s.row(vec!["Bartlett df".into(), number(f.bartlett.df, 0)]);
    s.row(vec!["Bartlett p".into(), p_value(f.bartlett.p_value, d)]);
    for (item, msa) in &f.msa {
        s.row(vec![format!("MSA {}", item), number(*msa, d)]);
    }
    s
}

fn retention_section(report: &StudyReport) -> Section {
    let r = &report.retention;
    let mut s = Section::new("Number of factors", &["Criterion", "Factors"]);
    for c in &r.criteria {
        s.row(vec![c.criterion.to_string(), c.factors.to_string()]);
    }
    s.note(format!(
        "Consensus: {} factor(s), supported by {:.0}% of criteria. Advisory only; the confirmatory model is fixed.",
        r.consensus,
        r.support * 100.0
    ));
    s
}

fn efa_section(report: &StudyReport, d: usize) -> Section {
    let efa = &report.efa;
    let mut header: Vec<&str> = vec!["Item"];
    header.extend(efa.factor_names.iter().map(String::as_str));
    header.push("h2");
    let mut s = Section::new("Exploratory factor loadings", &header);
    for (i, item) in efa.labels.iter().enumerate() {
        let mut row = vec![item.clone()];
        row.extend((0..efa.factor_names.len()).map(|f| {
            efa.display_loading(i, f)
                .map_or_else(String::new, |v| number(v, d))
        }));
        row.push(number(efa.communalities[i], d));
        s.row(row);
    }
    let summary = |name: &str, values: &[f64]| {
        let mut row = vec![name.to_string()];
        row.extend(values.iter().map(|v| number(*v, d)));
        row.push(String::new());
        row
    };
    s.row(summary("SS loadings", &efa.ss_loadings));
    s.row(summary("Proportion var", &efa.proportion_variance));
    s.row(summary("Cumulative var", &efa.cumulative_variance));
    s.note(format!(
        "Loadings below {} hidden. RMSR = {}.",
        number(efa.display_threshold, 2),
        number(efa.rmsr, d)
    ));
    s
}

fn fit_index_section(report: &StudyReport, d: usize) -> Section {
    let mut s = Section::new("Confirmatory fit indices", &["Index", "Value"]);
    for (name, value) in report.cfa.indices().rows() {
        let cell = match name {
            "df" => number(value, 0),
            "pvalue" => p_value(value, d),
            _ => number(value, d),
        };
        s.row(vec![name.to_string(), cell]);
    }
    for warning in report.cfa.warnings() {
        s.note(warning.clone());
    }
    s
}

fn loading_section(report: &StudyReport, d: usize) -> Section {
    let mut s = Section::new(
        "Standardized loadings",
        &["Factor", "Item", "Loading", "Residual variance"],
    );
    for l in report.cfa.loadings() {
        s.row(vec![
            l.factor.clone(),
            l.item.clone(),
            number(l.loading, d),
            number(l.residual_variance, d),
        ]);
    }
    s
}

fn factor_correlation_section(report: &StudyReport, d: usize) -> Section {
    let mut s = Section::new("Factor covariances (standardized)", &["Factors", "Value"]);
    for c in report.cfa.factor_correlations() {
        s.row(vec![format!("{} ~~ {}", c.left, c.right), number(c.value, d)]);
    }
    s
}

fn reliability_section(report: &StudyReport, d: usize) -> Section {
    let mut s = Section::new("Composite reliability", &["Factor", "Items", "AVE", "CR"]);
    for r in &report.validity.reliability {
        s.row(vec![
            r.factor.clone(),
            r.n_items.to_string(),
            number(r.ave, d),
            number(r.cr, d),
        ]);
    }
    s
}

fn fornell_larcker_section(report: &StudyReport, d: usize) -> Section {
    let fl = &report.validity.fornell_larcker;
    let mut header: Vec<&str> = vec![""];
    header.extend(fl.factors.iter().map(String::as_str));
    header.push("Discriminant");
    let mut s = Section::new("Convergent and discriminant validity", &header);
    for (a, name) in fl.factors.iter().enumerate() {
        let mut row = vec![name.clone()];
        row.extend((0..fl.factors.len()).map(|b| {
            if b <= a {
                number(fl.matrix[(a, b)], d)
            } else {
                String::new()
            }
        }));
        row.push(yes_no(fl.discriminant[a]));
        s.row(row);
    }
    s.note("Diagonal: AVE. Below the diagonal: squared factor correlations.");
    s
}

fn htmt_section(report: &StudyReport, d: usize) -> Section {
    let h = &report.validity.htmt;
    let mut header: Vec<&str> = vec![""];
    header.extend(h.factors.iter().map(String::as_str));
    let mut s = Section::new("Heterotrait-monotrait ratio", &header);
    for (a, name) in h.factors.iter().enumerate() {
        let mut row = vec![name.clone()];
        row.extend((0..h.factors.len()).map(|b| match b.cmp(&a) {
            std::cmp::Ordering::Less => optional(h.get(a, b), d),
            std::cmp::Ordering::Equal => "1".to_string(),
            std::cmp::Ordering::Greater => String::new(),
        }));
        s.row(row);
    }
    for note in &h.notes {
        s.note(note.clone());
    }
    s
}

pub fn network_sections(network: &NetworkReport, d: usize) -> Vec<Section> {
    let ega = &network.ega;
    let mut dims = Section::new("Network dimensions", &["Dimension", "Items"]);
    for (i, items) in ega.dimensions().iter().enumerate() {
        dims.row(vec![(i + 1).to_string(), items.join(", ")]);
    }
    let unassigned = ega.unassigned();
    if !unassigned.is_empty() {
        dims.row(vec!["unassigned".into(), unassigned.join(", ")]);
    }
    dims.note(format!(
        "{} dimension(s); {} edge(s) at lambda {} (EBIC {}); modularity {}.",
        ega.n_dimensions,
        ega.network.n_edges,
        number(ega.network.lambda, 4),
        number(ega.network.ebic, 2),
        number(ega.modularity, d)
    ));

    let boot = &network.bootstrap;
    let mut freq = Section::new(
        "Bootstrap dimension frequencies",
        &["Dimensions", "Replicates", "Proportion"],
    );
    for f in &boot.frequencies {
        freq.row(vec![
            f.n_dimensions.to_string(),
            f.count.to_string(),
            number(f.proportion, d),
        ]);
    }
    freq.note(format!(
        "{} replicates ({} failed), seed {}, median {} dimension(s).",
        boot.iterations,
        boot.failed,
        boot.seed,
        number(boot.median_dimensions, 1)
    ));

    let mut items = Section::new("Item stability", &["Item", "Dimension", "Stability"]);
    for item in &boot.item_stability {
        items.row(vec![
            item.item.clone(),
            item.empirical_dimension
                .map_or_else(|| "-".to_string(), |dim| dim.to_string()),
            optional(item.stability, d),
        ]);
    }

    let mut structure = Section::new(
        "Structural consistency",
        &["Dimension", "Items", "Consistency"],
    );
    for c in &boot.structural_consistency {
        structure.row(vec![
            c.dimension.to_string(),
            c.items.join(", "),
            number(c.consistency, d),
        ]);
    }

    vec![dims, freq, items, structure]
}

pub fn content_validity_sections(report: &ContentValidityReport, decimals: usize) -> Vec<Section> {
    let d = decimals;
    let mut s = Section::new(
        "Content validity (Aiken's V)",
        &["Criterion", "Item", "Judges", "V", "Lower", "Upper", "Adequate"],
    );
    for v in &report.items {
        s.row(vec![
            v.criterion.clone().unwrap_or_else(|| "-".to_string()),
            v.item.clone(),
            v.n_judges.to_string(),
            number(v.v, d),
            number(v.lower, d),
            number(v.upper, d),
            yes_no(v.adequate),
        ]);
    }
    s.note(format!(
        "Scale [{}, {}]; {:.0}% score intervals; adequate when the lower bound is at least {}. {} of {} adequate.",
        report.scale_min,
        report.scale_max,
        report.confidence * 100.0,
        report.min_lower_bound,
        report.n_adequate(),
        report.items.len()
    ));
    vec![s]
}
