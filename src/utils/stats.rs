//! NaN-aware descriptive statistics

/// Mean of the finite-or-infinite, non-`NaN` values; `None` if there are none
pub fn nanmean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Sample standard deviation (n - 1 denominator) of the non-`NaN` values.
///
/// `NaN` when fewer than two values remain.
pub fn sample_std<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let kept: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if kept.len() < 2 {
        return f64::NAN;
    }
    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    let squares: f64 = kept.iter().map(|v| (v - mean) * (v - mean)).sum();
    (squares / (kept.len() - 1) as f64).sqrt()
}
