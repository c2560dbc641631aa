//! Scalar smoothing over the tail of a series.
//!
//! `smooth_tail` takes the last `k` values: with fewer than `k` available it
//! returns their arithmetic mean, otherwise an exponential moving average with
//! `alpha = 2 / (k + 1)` seeded with the oldest of the `k` values.

/// Smoothing factor for a window of `k` values.
pub fn ema_alpha(k: usize) -> f64 {
    2.0 / (k as f64 + 1.0)
}
/// Left fold `ema[0] = v[0]`, `ema[i] = v[i] * alpha + ema[i - 1] * (1 - alpha)`.
pub fn exponential_moving_average(values: &[f64], alpha: f64) -> f64 {
    let Some((&first, rest)) = values.split_first() else {
        return 0.0;
    };
    rest.iter()
        .fold(first, |ema, &v| v * alpha + ema * (1.0 - alpha))
}
pub fn arithmetic_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
/// Smoothed value of the most recent `k` entries of `values`.
pub fn smooth_tail(values: &[f64], k: usize) -> f64 {
    let tail = &values[values.len().saturating_sub(k)..];
    if tail.len() < k {
        arithmetic_mean(tail)
    } else {
        exponential_moving_average(tail, ema_alpha(k))
    }
}
/// Display value for a radial gauge: rounded and clamped to `[0, 100]`.
pub fn gauge_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0).round()
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn ema_matches_hand_computed_fold() {
        let v = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert!((ema_alpha(5) - 1.0 / 3.0).abs() < 1e-12);
        // 10 -> 13.33 -> 18.89 -> 25.93 -> 33.95
        let expected = 2750.0 / 81.0;
        assert!((smooth_tail(&v, 5) - expected).abs() < 1e-6);
        assert!((smooth_tail(&v, 5) - 33.950617).abs() < 1e-6);
    }
    #[test]
    fn short_series_uses_plain_mean() {
        assert_eq!(smooth_tail(&[10.0, 20.0, 60.0], 5), 30.0);
        assert_eq!(smooth_tail(&[7.5], 2), 7.5);
    }
    #[test]
    fn only_the_last_k_values_count() {
        let v = [1000.0, -1000.0, 10.0, 20.0, 30.0, 40.0, 50.0];
        assert!((smooth_tail(&v, 5) - 2750.0 / 81.0).abs() < 1e-6);
    }
    #[test]
    fn empty_input_is_zero() {
        assert_eq!(smooth_tail(&[], 5), 0.0);
        assert_eq!(smooth_tail(&[1.0, 2.0], 0), 0.0);
        assert_eq!(exponential_moving_average(&[], 0.5), 0.0);
    }
    #[test]
    fn gauge_is_clamped_and_rounded() {
        assert_eq!(gauge_percent(33.95), 34.0);
        assert_eq!(gauge_percent(140.0), 100.0);
        assert_eq!(gauge_percent(-3.0), 0.0);
        assert_eq!(gauge_percent(f64::NAN), 0.0);
    }
}
