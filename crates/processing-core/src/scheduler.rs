//! Sample time planning.
//!
//! Spreads a bounded number of samples evenly over the analyzed span,
//! expressed in the asset's own timescale so decoders can seek exactly.

use ghosttrail_common::config::AnalysisConfig;
use ghosttrail_model::asset::AssetMetadata;
use ghosttrail_model::time::{SamplePlan, SampleTime};

/// Inputs to [`plan`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanRequest {
    /// Length of the whole asset in seconds.
    pub asset_duration_secs: f64,
    /// Asset ticks per second.
    pub timescale: u32,
    /// Nominal frames per second.
    pub frame_rate: f64,
    /// How much of the asset, from the start, to analyze.
    pub requested_duration_secs: f64,
    /// Sample budget.
    pub max_samples: usize,
}

/// Compute the sample times for one run.
///
/// Never plans more samples than the asset has frames, and never more than
/// there are timescale ticks in the span, so the offsets `i * step` are
/// strictly increasing. Degenerate inputs (zero, negative or non-finite
/// durations, zero frame rate or timescale) produce an empty plan.
pub fn plan(request: PlanRequest) -> SamplePlan {
    let asset_secs = finite_non_negative(request.asset_duration_secs);
    // NaN.max(0.0) is 0.0 and +inf.min(asset) is the asset length.
    let seconds_to_analyze = request.requested_duration_secs.max(0.0).min(asset_secs);
    let frame_rate = finite_non_negative(request.frame_rate);

    let total_frames = (asset_secs * frame_rate).floor() as u64;
    let total_time_units = (seconds_to_analyze * f64::from(request.timescale)).floor() as u64;
    let sample_size = (request.max_samples as u64)
        .min(total_frames)
        .min(total_time_units);

    if sample_size == 0 {
        tracing::debug!(
            total_frames,
            total_time_units,
            max_samples = request.max_samples,
            "Nothing to sample"
        );
        return SamplePlan::empty();
    }

    let step = total_time_units / sample_size;
    let times = (0..sample_size)
        .map(|i| SampleTime::new((i * step) as i64, request.timescale))
        .collect();

    tracing::debug!(
        sample_size,
        step,
        timescale = request.timescale,
        "Sample plan computed"
    );

    SamplePlan::new(times)
}

fn finite_non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Plans runs for one asset under a fixed sample budget.
#[derive(Debug, Clone, Copy)]
pub struct SampleScheduler {
    max_samples: usize,
}

impl SampleScheduler {
    pub fn new(max_samples: usize) -> Self {
        Self { max_samples }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.max_samples)
    }

    /// Plan over the first `requested_secs` of the asset, or all of it.
    pub fn plan_for(&self, asset: &AssetMetadata, requested_secs: Option<f64>) -> SamplePlan {
        plan(PlanRequest {
            asset_duration_secs: asset.duration_seconds,
            timescale: asset.timescale,
            frame_rate: asset.nominal_frame_rate,
            requested_duration_secs: requested_secs.unwrap_or(asset.duration_seconds),
            max_samples: self.max_samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(duration: f64, fps: f64, requested: f64, max: usize) -> PlanRequest {
        PlanRequest {
            asset_duration_secs: duration,
            timescale: 600,
            frame_rate: fps,
            requested_duration_secs: requested,
            max_samples: max,
        }
    }

    fn values(plan: &SamplePlan) -> Vec<i64> {
        plan.iter().map(|t| t.value).collect()
    }

    #[test]
    fn test_ten_second_asset_five_samples() {
        let p = plan(request(10.0, 30.0, 10.0, 5));
        assert_eq!(values(&p), vec![0, 1200, 2400, 3600, 4800]);
        assert!(p.iter().all(|t| t.timescale == 600));
    }

    #[test]
    fn test_budget_capped_by_frame_count() {
        // 2 seconds at 10 fps has 20 frames.
        let p = plan(request(2.0, 10.0, 2.0, 1500));
        assert_eq!(p.len(), 20);
        assert_eq!(p.get(1).unwrap().value, 60);
    }

    #[test]
    fn test_requested_duration_clamped_to_asset() {
        let p = plan(request(4.0, 30.0, 100.0, 4));
        assert_eq!(values(&p), vec![0, 600, 1200, 1800]);
    }

    #[test]
    fn test_partial_duration() {
        let p = plan(request(10.0, 30.0, 5.0, 5));
        assert_eq!(values(&p), vec![0, 600, 1200, 1800, 2400]);
    }

    #[test]
    fn test_degenerate_inputs_yield_empty_plan() {
        assert!(plan(request(0.0, 30.0, 10.0, 5)).is_empty());
        assert!(plan(request(10.0, 0.0, 10.0, 5)).is_empty());
        assert!(plan(request(10.0, 30.0, 0.0, 5)).is_empty());
        assert!(plan(request(10.0, 30.0, 10.0, 0)).is_empty());
        assert!(plan(request(f64::NAN, 30.0, 10.0, 5)).is_empty());
        assert!(plan(request(-3.0, 30.0, 10.0, 5)).is_empty());
        assert!(plan(request(10.0, f64::INFINITY, 10.0, 5)).is_empty());

        let mut zero_timescale = request(10.0, 30.0, 10.0, 5);
        zero_timescale.timescale = 0;
        assert!(plan(zero_timescale).is_empty());
    }

    #[test]
    fn test_tiny_span_never_repeats_offsets() {
        // 3 ticks of span but 100 frames available: only 3 distinct offsets.
        let mut coarse = request(10.0, 10.0, 1.5, 100);
        coarse.timescale = 2;
        assert_eq!(values(&plan(coarse)), vec![0, 1, 2]);
    }

    #[test]
    fn test_scheduler_defaults_to_whole_asset() {
        let asset = AssetMetadata {
            duration_seconds: 10.0,
            timescale: 600,
            nominal_frame_rate: 30.0,
            ..AssetMetadata::empty()
        };
        let scheduler = SampleScheduler::new(5);
        assert_eq!(scheduler.plan_for(&asset, None).len(), 5);
        assert_eq!(
            scheduler.plan_for(&asset, Some(5.0)).last().unwrap().value,
            2400
        );
    }

    proptest! {
        #[test]
        fn prop_plan_is_bounded_and_strictly_increasing(
            duration in 0.0f64..600.0,
            fps in 0.0f64..120.0,
            requested in 0.0f64..900.0,
            timescale in 1u32..100_000,
            max_samples in 0usize..3000,
        ) {
            let p = plan(PlanRequest {
                asset_duration_secs: duration,
                timescale,
                frame_rate: fps,
                requested_duration_secs: requested,
                max_samples,
            });
            let total_frames = (duration * fps).floor() as u64;
            let total_time_units =
                (requested.min(duration) * f64::from(timescale)).floor() as u64;
            let budget = (max_samples as u64).min(total_frames);
            prop_assert!(p.len() as u64 <= budget);
            if total_time_units >= budget {
                prop_assert_eq!(p.len() as u64, budget);
            } else {
                prop_assert_eq!(p.len() as u64, total_time_units);
            }
            if let Some(first) = p.first() {
                prop_assert_eq!(first.value, 0);
            }
            prop_assert!(p.times().windows(2).all(|w| w[0].value < w[1].value));
        }
    }
}
