/// Pearson correlation over the pairwise-complete observations of two aligned series.
///
/// Rows where either side is NaN are skipped. Returns `None` with fewer than two complete
/// pairs, or when either side is constant over those pairs. The result is clamped to `[-1, 1]`.
pub fn pearson_pairwise(x: &[f64], y: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(xi, yi)| !xi.is_nan() && !yi.is_nan())
        .map(|(&xi, &yi)| (xi, yi))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let (x0, y0) = pairs[0];
    if pairs.iter().all(|(xi, _)| *xi == x0) || pairs.iter().all(|(_, yi)| *yi == y0) {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(xi, _)| xi).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, yi)| yi).sum::<f64>() / n;
    let (cov, var_x, var_y) = pairs
        .iter()
        .fold((0.0, 0.0, 0.0), |(cov, vx, vy), &(xi, yi)| {
            let dx = xi - mean_x;
            let dy = yi - mean_y;
            (cov + dx * dy, vx + dx * dx, vy + dy * dy)
        });

    let denom = (var_x * var_y).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return None;
    }
    let r = cov / denom;
    if !r.is_finite() {
        return None;
    }
    Some(r.max(-1.0).min(1.0))
}
