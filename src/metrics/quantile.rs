//! Linear-interpolation quantile (R-7).

use crate::error::{MetricsError, MetricsResult};

/// Value at `percentile` (1..=100) of `values`.
///
/// Sorts ascending, takes rank `p/100 * (n-1)` and interpolates between the
/// neighbouring ranked values.
pub fn quantile(values: &[f64], percentile: f64) -> MetricsResult<f64> {
  if !(1.0..=100.0).contains(&percentile) {
    return Err(MetricsError::InvalidPercentile(percentile));
  }
  if values.is_empty() {
    return Err(MetricsError::EmptyInput);
  }

  let mut sorted = values.to_vec();
  sorted.sort_by(f64::total_cmp);

  let rank = percentile / 100.0 * (sorted.len() - 1) as f64;
  let lo = rank.floor() as usize;
  let hi = rank.ceil() as usize;
  let fraction = rank - lo as f64;

  Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * fraction)
}
