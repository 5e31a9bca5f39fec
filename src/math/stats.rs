//! Univariate summary statistics.

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (divisor n - 1).
pub fn sample_sd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Median of the values (average of the two middle values for even n).
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation from the median, multiplied by `constant`.
pub fn mad(values: &[f64], constant: f64) -> f64 {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    constant * median(&deviations)
}

/// Moment-based skewness `m3 / m2^1.5`.
pub fn skewness(values: &[f64]) -> f64 {
    let (m2, m3, _) = central_moments(values);
    m3 / m2.powf(1.5)
}

/// Moment-based excess kurtosis `m4 / m2^2 - 3`.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let (m2, _, m4) = central_moments(values);
    m4 / (m2 * m2) - 3.0
}

fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let m = mean(values);
    values.iter().fold((0.0, 0.0, 0.0), |(a, b, c), v| {
        let d = v - m;
        (a + d * d / n, b + d * d * d / n, c + d * d * d * d / n)
    })
}

/// Linear-interpolation quantile (R type 7).
pub fn quantile(values: &[f64], prob: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let h = (sorted.len() - 1) as f64 * prob.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}
