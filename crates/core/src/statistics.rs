// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Aggregate statistics over benchmark samples.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Percentiles reported by [`StatisticalSummary::from_values`].
pub const REPORTED_PERCENTILES: [u8; 4] = [50, 90, 95, 99];

/// Statistical summary of a set of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSummary {
    /// Number of samples.
    pub count: u64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median.
    pub median: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Sample standard deviation; absent for fewer than two samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
    /// Percentiles keyed as `p50`, `p90`, ...
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub percentiles: BTreeMap<String, f64>,
}

impl StatisticalSummary {
    /// Summarize the finite values of `values`.
    ///
    /// Returns `None` when there is no finite value to summarize.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let stddev = (n > 1).then(|| {
            let variance =
                sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            variance.sqrt()
        });

        let percentiles = REPORTED_PERCENTILES
            .iter()
            .map(|p| (format!("p{p}"), interpolate(&sorted, f64::from(*p))))
            .collect();

        Some(Self {
            count: n as u64,
            mean,
            median: interpolate(&sorted, 50.0),
            min: sorted[0],
            max: sorted[n - 1],
            stddev,
            percentiles,
        })
    }
}

/// Linear interpolation between closest ranks. `sorted` must be non-empty.
fn interpolate(sorted: &[f64], percentile: f64) -> f64 {
    let rank = percentile / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_no_summary() {
        assert!(StatisticalSummary::from_values(&[]).is_none());
        assert!(StatisticalSummary::from_values(&[f64::NAN]).is_none());
    }

    #[test]
    fn test_single_value() {
        let summary = StatisticalSummary::from_values(&[4.0]).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.mean, 4.0);
        assert_eq!(summary.median, 4.0);
        assert!(summary.stddev.is_none());
        assert_eq!(summary.percentiles["p99"], 4.0);
    }

    #[test]
    fn test_basic_statistics() {
        let summary = StatisticalSummary::from_values(&[5.0, 1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.median, 3.0);
        // Sample variance of 1..=5 is 2.5.
        assert!((summary.stddev.unwrap() - 2.5f64.sqrt()).abs() < 1e-12);
        assert!((summary.percentiles["p90"] - 4.6).abs() < 1e-12);
    }

    #[test]
    fn test_even_count_median_interpolates() {
        let summary = StatisticalSummary::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(summary.median, 2.5);
        assert_eq!(summary.percentiles.len(), REPORTED_PERCENTILES.len());
    }
}
