//! Pearson correlation.

/// Linear correlation between two equal-length series.
///
/// Returns 0 when the lengths differ, either series is empty, or either series
/// is constant (zero denominator). The result is clamped to [-1, 1].
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return 0.0;
    }

    let n = x.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0, 0.0, 0.0);

    for (&a, &b) in x.iter().zip(y) {
        sum_x += a;
        sum_y += b;
        sum_xy += a * b;
        sum_x2 += a * a;
        sum_y2 += b * b;
    }

    let denominator = ((n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y)).sqrt();
    // Rounding can push a near-zero variance product negative.
    if denominator.is_nan() || denominator == 0.0 {
        return 0.0;
    }

    ((n * sum_xy - sum_x * sum_y) / denominator).clamp(-1.0, 1.0)
}
