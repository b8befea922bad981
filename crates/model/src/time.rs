//! Rational timeline positions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A position on the asset's timeline: `value / timescale` seconds.
///
/// Equality and ordering compare the raw `(value, timescale)` pair; every
/// time in one plan shares the asset's timescale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleTime {
    /// Offset in timescale ticks.
    pub value: i64,
    /// Ticks per second.
    pub timescale: u32,
}

impl SampleTime {
    pub const fn new(value: i64, timescale: u32) -> Self {
        Self { value, timescale }
    }

    pub const fn zero(timescale: u32) -> Self {
        Self::new(0, timescale)
    }

    /// Offset in seconds. A zero timescale yields 0.0.
    pub fn seconds(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        self.value as f64 / f64::from(self.timescale)
    }
}

impl fmt::Display for SampleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.timescale)
    }
}

/// The immutable, strictly increasing list of times sampled in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePlan {
    times: Vec<SampleTime>,
}

impl SamplePlan {
    /// Wrap a list of times.
    ///
    /// # Panics
    ///
    /// If the times are not strictly increasing.
    pub fn new(times: Vec<SampleTime>) -> Self {
        assert!(
            times.windows(2).all(|w| w[0] < w[1]),
            "sample times must be strictly increasing"
        );
        Self { times }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[SampleTime] {
        &self.times
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleTime> {
        self.times.iter()
    }

    pub fn get(&self, index: usize) -> Option<SampleTime> {
        self.times.get(index).copied()
    }

    pub fn first(&self) -> Option<SampleTime> {
        self.times.first().copied()
    }

    pub fn last(&self) -> Option<SampleTime> {
        self.times.last().copied()
    }

    /// Position of `time` in the plan, if it was requested.
    pub fn index_of(&self, time: SampleTime) -> Option<usize> {
        self.times.binary_search(&time).ok()
    }

    /// Fraction of the analyzed span covered once `time` has been applied.
    ///
    /// Clamped to `[0, 1]`. A plan whose last sample sits at offset 0 reports
    /// 1.0; an empty plan reports 1.0.
    pub fn progress_at(&self, time: SampleTime) -> f64 {
        let Some(last) = self.last() else {
            return 1.0;
        };
        let end = last.seconds();
        if end <= 0.0 {
            return 1.0;
        }
        (time.seconds() / end).clamp(0.0, 1.0)
    }
}

impl<'a> IntoIterator for &'a SamplePlan {
    type Item = &'a SampleTime;
    type IntoIter = std::slice::Iter<'a, SampleTime>;

    fn into_iter(self) -> Self::IntoIter {
        self.times.iter()
    }
}
