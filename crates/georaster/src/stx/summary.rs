//! Running count, extrema, mean and standard deviation.
use crate::error::Result;
use crate::stx::{MergeStxOp, StxOp, Tile};

/// Welford accumulator; partial results from disjoint tiles merge exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryStxOp {
    count: u64,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl SummaryStxOp {
    pub fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
        }
    }

    #[inline]
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance (`n - 1` denominator); zero for a single sample.
    pub fn variance(&self) -> Option<f64> {
        match self.count {
            0 => None,
            1 => Some(0.0),
            n => Some(self.m2 / (n - 1) as f64),
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

impl Default for SummaryStxOp {
    fn default() -> Self {
        Self::new()
    }
}

impl StxOp for SummaryStxOp {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn accumulate(&mut self, tile: &Tile<'_>) {
        tile.for_each_valid(|v| self.add(v));
    }
}

impl MergeStxOp for SummaryStxOp {
    fn empty_like(&self) -> Self {
        Self::new()
    }

    fn merge(&mut self, other: &Self) -> Result<()> {
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            *self = other.clone();
            return Ok(());
        }
        let n = (self.count + other.count) as f64;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * self.count as f64 * other.count as f64 / n;
        self.mean += delta * other.count as f64 / n;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::stx::SampleData;

    fn summary_of(values: &[f64]) -> SummaryStxOp {
        let mut op = SummaryStxOp::new();
        op.accumulate(&Tile::new(SampleData::F64(values), values.len(), 1).unwrap());
        op
    }

    #[test]
    fn moments_of_a_small_sample() {
        let op = summary_of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(op.count(), 8);
        assert_eq!(op.min(), Some(2.0));
        assert_eq!(op.max(), Some(9.0));
        assert_relative_eq!(op.mean().unwrap(), 5.0);
        assert_relative_eq!(op.variance().unwrap(), 32.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_summary_has_no_moments() {
        let op = SummaryStxOp::new();
        assert_eq!(op.mean(), None);
        assert_eq!(op.std_dev(), None);
        assert_eq!(summary_of(&[3.0]).std_dev(), Some(0.0));
    }

    #[test]
    fn merged_partials_match_a_single_pass() {
        let all: Vec<f64> = (0..40).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
        let whole = summary_of(&all);
        let mut left = summary_of(&all[..13]);
        left.merge(&summary_of(&all[13..])).unwrap();
        let mut empty = SummaryStxOp::new();
        empty.merge(&left).unwrap();

        assert_eq!(left.count(), whole.count());
        assert_eq!(left.min(), whole.min());
        assert_eq!(left.max(), whole.max());
        assert_relative_eq!(left.mean().unwrap(), whole.mean().unwrap(), epsilon = 1e-12);
        assert_relative_eq!(left.std_dev().unwrap(), whole.std_dev().unwrap(), epsilon = 1e-12);
        assert_eq!(empty, left);
    }
}
