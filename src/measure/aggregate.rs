//! Summary statistics over raw measurements.

use serde::{Deserialize, Serialize};

/// Count, mean and population standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Summary {
    /// Summarises `samples`; an empty sample has no summary.
    ///
    /// # Examples
    ///
    /// ```
    /// use mooclet::Summary;
    ///
    /// let s = Summary::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
    /// assert_eq!(s.count, 8);
    /// assert_eq!(s.mean, 5.0);
    /// assert_eq!(s.std_dev, 2.0);
    /// assert!(Summary::of(&[]).is_none());
    /// ```
    #[must_use]
    pub fn of(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            count: samples.len(),
            mean,
            std_dev: variance.sqrt(),
        })
    }
}
