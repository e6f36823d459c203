//! Scene time spans and per-row time interpolation.
//!
//! A [`LineTimeCoding`] maps raster rows to absolute times by interpolating linearly
//! between the scene's start and end time, as for push-broom sensors where each row is
//! acquired at a later instant than the one above it.
use chrono::{DateTime, Duration, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geocoding::PixelPos;

/// Sensing start and end time. Both are optional; when both are set, `start <= end`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeSpan {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl TimeSpan {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        check_order(start, end)?;
        Ok(Self { start, end })
    }

    /// A span with both bounds set.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        Self::new(Some(start), Some(end))
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn set_start(&mut self, start: Option<DateTime<Utc>>) -> Result<()> {
        check_order(start, self.end)?;
        self.start = start;
        Ok(())
    }

    pub fn set_end(&mut self, end: Option<DateTime<Utc>>) -> Result<()> {
        check_order(self.start, end)?;
        self.end = end;
        Ok(())
    }

    /// Length of the span, `None` unless both bounds are set.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.end? - self.start?)
    }

    /// Both bounds as set, non-epoch values.
    fn resolved(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start.filter(is_set), self.end.filter(is_set)) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(Error::InvalidConfig(
                "start and end time must both be set".into(),
            )),
        }
    }
}

fn check_order(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(Error::InvalidConfig(format!(
                "start time {start} is after end time {end}"
            )));
        }
    }
    Ok(())
}

/// The Unix epoch stands in for "no time" in many product formats.
fn is_set(time: &DateTime<Utc>) -> bool {
    time.timestamp() != 0 || time.timestamp_subsec_nanos() != 0
}

/// Linear row-to-time mapping for a `width` x `height` raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTimeCoding {
    span: TimeSpan,
    width: usize,
    height: usize,
}

impl LineTimeCoding {
    pub fn new(span: TimeSpan, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(
                "raster width and height must be > 0".into(),
            ));
        }
        Ok(Self {
            span,
            width,
            height,
        })
    }

    pub fn span(&self) -> &TimeSpan {
        &self.span
    }

    /// Time at which row `y` was acquired.
    ///
    /// `t = start + (end - start) * y / (height - 1)`; a single-row raster maps to `start`.
    pub fn time_at_row(&self, y: f64) -> Result<DateTime<Utc>> {
        if !(y >= 0.0 && y < self.height as f64) {
            return Err(Error::out_of_bounds("row", y, self.height));
        }
        let (start, end) = self.span.resolved()?;
        if self.height == 1 {
            return Ok(start);
        }
        let fraction = y / (self.height - 1) as f64;
        Ok(start + scale_duration(end - start, fraction))
    }

    /// Time at which the pixel was acquired; checks `x` against the raster width.
    pub fn time_at_pixel(&self, pos: &PixelPos) -> Result<DateTime<Utc>> {
        if !(pos.x >= 0.0 && pos.x < self.width as f64) {
            return Err(Error::out_of_bounds("column", pos.x, self.width));
        }
        self.time_at_row(pos.y)
    }

    /// Fractional row acquired at `time`; may lie outside the raster.
    pub fn row_at_time(&self, time: DateTime<Utc>) -> Result<f64> {
        let (start, end) = self.span.resolved()?;
        let total = micros(end - start);
        if total == 0.0 || self.height == 1 {
            return Ok(0.0);
        }
        Ok(micros(time - start) / total * (self.height - 1) as f64)
    }
}

fn micros(d: Duration) -> f64 {
    match d.num_microseconds() {
        Some(us) => us as f64,
        None => d.num_milliseconds() as f64 * 1_000.0,
    }
}

fn scale_duration(d: Duration, fraction: f64) -> Duration {
    Duration::microseconds((micros(d) * fraction).round() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn coding(height: usize) -> LineTimeCoding {
        LineTimeCoding::new(TimeSpan::between(day(0), day(10)).unwrap(), 4, height).unwrap()
    }

    #[test]
    fn interpolates_rows_linearly() {
        let coding = coding(11);
        assert_eq!(coding.time_at_row(0.0).unwrap(), day(0));
        assert_eq!(coding.time_at_row(5.0).unwrap(), day(5));
        assert_eq!(coding.time_at_row(10.0).unwrap(), day(10));
        assert_eq!(coding.time_at_row(2.5).unwrap(), day(2) + Duration::hours(12));
    }

    #[test]
    fn rejects_rows_outside_raster() {
        let coding = coding(11);
        assert!(matches!(
            coding.time_at_row(11.0),
            Err(Error::OutOfBounds { what: "row", .. })
        ));
        assert!(coding.time_at_row(-0.5).is_err());
        assert!(coding.time_at_row(f64::NAN).is_err());
    }

    #[test]
    fn pixel_lookup_checks_columns() {
        let coding = coding(11);
        assert_eq!(coding.time_at_pixel(&PixelPos::new(3.5, 10.0)).unwrap(), day(10));
        assert!(matches!(
            coding.time_at_pixel(&PixelPos::new(4.0, 1.0)),
            Err(Error::OutOfBounds { what: "column", .. })
        ));
    }

    #[test]
    fn single_row_maps_to_start() {
        assert_eq!(coding(1).time_at_row(0.0).unwrap(), day(0));
    }

    #[test]
    fn unset_or_epoch_bounds_fail() {
        let open = TimeSpan::new(Some(day(0)), None).unwrap();
        let coding = LineTimeCoding::new(open, 2, 2).unwrap();
        assert!(matches!(coding.time_at_row(0.0), Err(Error::InvalidConfig(_))));

        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let span = TimeSpan::between(epoch, day(0)).unwrap();
        let coding = LineTimeCoding::new(span, 2, 2).unwrap();
        assert!(coding.time_at_row(0.0).is_err());
    }

    #[test]
    fn span_enforces_order_on_construction_and_mutation() {
        assert!(TimeSpan::between(day(2), day(1)).is_err());

        let mut span = TimeSpan::between(day(1), day(2)).unwrap();
        assert!(span.set_start(Some(day(3))).is_err());
        assert_eq!(span.start(), Some(day(1)));
        assert!(span.set_end(Some(day(0))).is_err());
        span.set_end(None).unwrap();
        span.set_start(Some(day(5))).unwrap();
        assert_eq!(span.duration(), None);
    }

    #[test]
    fn row_at_time_inverts_time_at_row() {
        let coding = coding(11);
        let t = coding.time_at_row(7.25).unwrap();
        assert!((coding.row_at_time(t).unwrap() - 7.25).abs() < 1e-6);
    }
}
