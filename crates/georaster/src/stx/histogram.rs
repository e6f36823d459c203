//! Fixed-range histogram accumulation.
use tracing::trace;

use crate::error::{Error, Result};
use crate::stx::{MergeStxOp, StxOp, Tile};

/// Area skipped on the left end by [`HistogramStxOp::find_range_95`].
pub const LEFT_AREA_SKIPPED_95: f64 = 0.025;
/// Area skipped on the right end by [`HistogramStxOp::find_range_95`].
pub const RIGHT_AREA_SKIPPED_95: f64 = 0.025;

/// Histogram of `num_bins` equal-width bins over `[low, high]`.
///
/// A value `v` with `low <= v <= high` lands in bin `floor((v - low) / bin_width)`, clamped
/// to the last bin, so `v == high` counts into the last bin. Values outside the range,
/// NaN values and masked samples are skipped. Accumulation only adds to bin counts, so the
/// result does not depend on the order in which tiles arrive.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramStxOp {
    low: f64,
    high: f64,
    bins: Vec<u64>,
}

impl HistogramStxOp {
    pub fn new(num_bins: usize, low: f64, high: f64) -> Result<Self> {
        if num_bins == 0 {
            return Err(Error::InvalidConfig("histogram needs at least one bin".into()));
        }
        if !low.is_finite() || !high.is_finite() || low >= high {
            return Err(Error::InvalidConfig(format!(
                "histogram range requires finite low < high, got [{low}, {high}]"
            )));
        }
        Ok(Self {
            low,
            high,
            bins: vec![0; num_bins],
        })
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.bins.len() as f64
    }

    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    pub fn total_count(&self) -> u64 {
        self.bins.iter().sum()
    }

    pub fn max_bin_count(&self) -> u64 {
        self.bins.iter().copied().max().unwrap_or(0)
    }

    /// Bin receiving `value`, `None` if the value is outside `[low, high]` or NaN.
    #[inline]
    pub fn bin_index(&self, value: f64) -> Option<usize> {
        if !(value >= self.low && value <= self.high) {
            return None;
        }
        let n = self.bins.len();
        let index = ((value - self.low) / (self.high - self.low) * n as f64).floor() as usize;
        Some(index.min(n - 1))
    }

    /// Value range `[start, end)` covered by bin `index`.
    pub fn bin_range(&self, index: usize) -> Option<(f64, f64)> {
        (index < self.bins.len()).then(|| self.span(index, index))
    }

    fn span(&self, first: usize, last: usize) -> (f64, f64) {
        let n = self.bins.len() as f64;
        let delta = self.high - self.low;
        (
            self.low + first as f64 * delta / n,
            self.low + (last + 1) as f64 * delta / n,
        )
    }

    /// Counts one value.
    #[inline]
    pub fn add(&mut self, value: f64) {
        if let Some(index) = self.bin_index(value) {
            self.bins[index] += 1;
        }
    }

    /// Value range left after skipping the given fractions of the total count from the lower
    /// and upper end. An empty histogram yields the full range.
    pub fn find_range(&self, left_skipped: f64, right_skipped: f64) -> Result<(f64, f64)> {
        if !(0.0..1.0).contains(&left_skipped)
            || !(0.0..1.0).contains(&right_skipped)
            || left_skipped + right_skipped >= 1.0
        {
            return Err(Error::InvalidConfig(format!(
                "skipped areas {left_skipped} and {right_skipped} must be >= 0 and sum to < 1"
            )));
        }
        let total = self.total_count();
        let last = self.bins.len() - 1;
        if total == 0 {
            return Ok((self.low, self.high));
        }
        let total = total as f64;

        let mut j1 = 0;
        let mut sum = 0u64;
        while j1 <= last {
            sum += self.bins[j1];
            if sum as f64 / total > left_skipped {
                break;
            }
            j1 += 1;
        }
        let mut j1 = j1.min(last);

        let mut j2 = last as isize;
        let mut sum = 0u64;
        while j2 >= 0 {
            sum += self.bins[j2 as usize];
            if sum as f64 / total > right_skipped {
                break;
            }
            j2 -= 1;
        }
        let mut j2 = j2.max(0) as usize;

        if j1 > j2 {
            std::mem::swap(&mut j1, &mut j2);
        } else if j1 == j2 {
            if j2 < last {
                j2 += 1;
            } else if j1 > 0 {
                j1 -= 1;
            }
        }
        trace!(lower_bin = j1, upper_bin = j2, "histogram range");
        Ok(self.span(j1, j2))
    }

    /// Range holding the central 95% of the counted samples.
    pub fn find_range_95(&self) -> Result<(f64, f64)> {
        self.find_range(LEFT_AREA_SKIPPED_95, RIGHT_AREA_SKIPPED_95)
    }
}

impl StxOp for HistogramStxOp {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn accumulate(&mut self, tile: &Tile<'_>) {
        tile.for_each_valid(|v| self.add(v));
    }
}

impl MergeStxOp for HistogramStxOp {
    fn empty_like(&self) -> Self {
        Self {
            low: self.low,
            high: self.high,
            bins: vec![0; self.bins.len()],
        }
    }

    /// Element-wise sum of the bins; both histograms must share range and bin count.
    fn merge(&mut self, other: &Self) -> Result<()> {
        if self.bins.len() != other.bins.len() || self.low != other.low || self.high != other.high
        {
            return Err(Error::InvalidConfig(format!(
                "cannot merge histogram of {} bins over [{}, {}] into {} bins over [{}, {}]",
                other.bins.len(),
                other.low,
                other.high,
                self.bins.len(),
                self.low,
                self.high
            )));
        }
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            *a += b;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::stx::SampleData;

    fn uniform(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * f64::from(rng.next_u32()) / (f64::from(u32::MAX) + 1.0)
    }

    fn histogram_of(values: &[f64], bins: usize, low: f64, high: f64) -> HistogramStxOp {
        let mut op = HistogramStxOp::new(bins, low, high).unwrap();
        let tile = Tile::new(SampleData::F64(values), values.len(), 1).unwrap();
        op.accumulate(&tile);
        op
    }

    #[test]
    fn out_of_range_values_are_skipped() {
        let op = histogram_of(&[10.0, 30.0, 30.0, 99.0, -5.0, 150.0], 4, 0.0, 100.0);
        assert_eq!(op.bins(), &[1, 2, 0, 1]);
        assert_eq!(op.total_count(), 4);
        assert_eq!(op.max_bin_count(), 2);
    }

    #[test]
    fn high_value_lands_in_last_bin() {
        let op = histogram_of(&[0.0, 100.0, 75.0, f64::NAN], 4, 0.0, 100.0);
        assert_eq!(op.bins(), &[1, 0, 0, 2]);
        assert_eq!(op.bin_index(100.0), Some(3));
        assert_eq!(op.bin_index(100.000_001), None);
        assert_eq!(op.bin_range(1), Some((25.0, 50.0)));
        assert_eq!(op.bin_range(4), None);
    }

    #[test]
    fn integer_and_float_storage_bin_alike() {
        let ints = [0u16, 24, 25, 26, 99, 100, 101];
        let floats: Vec<f32> = ints.iter().map(|v| f32::from(*v)).collect();
        let mut a = HistogramStxOp::new(4, 0.0, 100.0).unwrap();
        let mut b = a.clone();
        a.accumulate(&Tile::new(SampleData::U16(&ints), 7, 1).unwrap());
        b.accumulate(&Tile::new(SampleData::F32(&floats), 7, 1).unwrap());
        assert_eq!(a, b);
        assert_eq!(a.bins(), &[2, 2, 0, 2]);
    }

    #[test]
    fn merge_law_holds_for_random_tiles() {
        let mut rng = StdRng::seed_from_u64(7);
        let t1: Vec<f64> = (0..500).map(|_| uniform(&mut rng, -20.0, 120.0)).collect();
        let t2: Vec<f64> = (0..300).map(|_| uniform(&mut rng, -20.0, 120.0)).collect();
        let tile1 = Tile::new(SampleData::F64(&t1), 50, 10).unwrap();
        let tile2 = Tile::new(SampleData::F64(&t2), 30, 10).unwrap();

        let template = HistogramStxOp::new(16, 0.0, 100.0).unwrap();
        let mut forward = template.empty_like();
        forward.accumulate(&tile1);
        forward.accumulate(&tile2);
        let mut backward = template.empty_like();
        backward.accumulate(&tile2);
        backward.accumulate(&tile1);
        let mut split = template.empty_like();
        split.accumulate(&tile1);
        let mut other = template.empty_like();
        other.accumulate(&tile2);
        split.merge(&other).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, split);
    }

    #[test]
    fn merge_rejects_other_layouts() {
        let mut a = HistogramStxOp::new(4, 0.0, 1.0).unwrap();
        assert!(a.merge(&HistogramStxOp::new(5, 0.0, 1.0).unwrap()).is_err());
        assert!(a.merge(&HistogramStxOp::new(4, 0.0, 2.0).unwrap()).is_err());
    }

    #[test]
    fn construction_is_validated() {
        assert!(HistogramStxOp::new(0, 0.0, 1.0).is_err());
        assert!(HistogramStxOp::new(4, 1.0, 1.0).is_err());
        assert!(HistogramStxOp::new(4, 2.0, 1.0).is_err());
        assert!(HistogramStxOp::new(4, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn find_range_skips_tails() {
        // 100 bins over [0, 100): one sample per bin
        let values: Vec<f64> = (0..100).map(|v| v as f64 + 0.5).collect();
        let op = histogram_of(&values, 100, 0.0, 100.0);
        let (lo, hi) = op.find_range_95().unwrap();
        assert_eq!((lo, hi), (2.0, 98.0));
        assert_eq!(op.find_range(0.0, 0.0).unwrap(), (0.0, 100.0));
        assert!(op.find_range(0.6, 0.5).is_err());
    }

    #[test]
    fn find_range_widens_single_bin() {
        let op = histogram_of(&[30.0; 10], 4, 0.0, 100.0);
        assert_eq!(op.find_range_95().unwrap(), (25.0, 75.0));
        let empty = HistogramStxOp::new(4, 0.0, 100.0).unwrap();
        assert_eq!(empty.find_range_95().unwrap(), (0.0, 100.0));
    }
}
