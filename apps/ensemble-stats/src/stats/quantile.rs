/// Non-missing (non-NaN) values sorted ascending with `total_cmp`.
pub fn sorted_present(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Linear interpolation between closest ranks on an already sorted slice.
///
/// `q` is a fraction in `[0, 1]`; `pos = q * (n - 1)`. Returns `None` for an empty slice or
/// an out-of-range `q`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&q) || sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let pos = q * (sorted.len() as f64 - 1.0);
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    let a = sorted[idx];
    let b = sorted[(idx + 1).min(sorted.len() - 1)];
    if frac == 0.0 {
        return Some(a);
    }
    Some(a + (b - a) * frac)
}

/// Percentile (`0..=100`) ignoring NaN; NaN when nothing is left.
pub fn nan_percentile(values: &[f64], percentile: f64) -> f64 {
    quantile_sorted(&sorted_present(values), percentile / 100.0).unwrap_or(f64::NAN)
}

pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        return f64::NAN;
    }
    sum / n as f64
}
