//! Time-decay analyzer — classifies the shape of an outlet's revenue series
//! across the pre/during/post campaign windows.

use impact_core::labels::DecayScenario;
use impact_core::types::Outlet;
use impact_core::AnalysisConfig;
use serde::Serialize;

use crate::classifier::has_baseline;
use crate::stats::{mean, sample_std_dev};

/// Revenue series of one outlet split by phase, missing periods as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecaySeries {
    pub pre: Vec<f64>,
    pub during: Vec<f64>,
    pub post: Vec<f64>,
}

impl DecaySeries {
    pub fn build(outlet: &Outlet, config: &AnalysisConfig) -> Self {
        let window = &config.window;
        let series = |range: impact_core::PeriodRange| -> Vec<f64> {
            range.periods().map(|p| outlet.revenue_at(p)).collect()
        };
        Self {
            pre: series(window.pre),
            during: series(window.during),
            post: series(window.post),
        }
    }

    /// Values above `baseline + band` count as elevated, where the band is
    /// the larger of the relative tolerance and `decay_sigma` deviations.
    pub fn elevation_threshold(&self, config: &AnalysisConfig) -> f64 {
        let baseline = mean(&self.pre);
        let relative = baseline * config.decay_elevation_pct / 100.0;
        let spread = config.decay_sigma * sample_std_dev(&self.pre);
        baseline + relative.max(spread)
    }
}

/// Decay label, or `None` when the outlet has no pre-campaign record
/// (reported as insufficient history, never as no effect).
pub fn classify_decay(outlet: &Outlet, config: &AnalysisConfig) -> Option<DecayScenario> {
    if !has_baseline(outlet, &config.window) {
        return None;
    }
    Some(classify_series(&DecaySeries::build(outlet, config), config))
}

/// Post offsets count periods from the campaign end: the first post period
/// is offset 1.
pub fn classify_series(series: &DecaySeries, config: &AnalysisConfig) -> DecayScenario {
    let threshold = series.elevation_threshold(config);
    let elevated = |v: &f64| *v > threshold;
    let peak = |values: &[f64]| values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let leading_post_run = series.post.iter().take_while(|&v| elevated(v)).count();
    if leading_post_run >= config.sustained_growth_periods {
        return DecayScenario::SustainedGrowth;
    }

    let during_elevated = series.during.iter().any(elevated);
    let peaked_during = peak(&series.during) >= peak(&series.post);
    let settled = !series.post.last().is_some_and(elevated);
    if during_elevated && peaked_during && settled {
        return DecayScenario::ImmediateSpike;
    }

    match series.post.iter().position(elevated) {
        Some(index) if index + 1 >= config.delayed_impact_lag => DecayScenario::DelayedImpact,
        _ => DecayScenario::NoEffect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pre: &[f64], during: &[f64], post: &[f64]) -> DecaySeries {
        DecaySeries {
            pre: pre.to_vec(),
            during: during.to_vec(),
            post: post.to_vec(),
        }
    }

    fn classify(s: DecaySeries) -> DecayScenario {
        classify_series(&s, &AnalysisConfig::default())
    }

    const FLAT: [f64; 4] = [100.0, 100.0, 100.0, 100.0];

    #[test]
    fn test_immediate_spike() {
        let s = series(&FLAT, &[180.0, 200.0, 150.0, 120.0], &[90.0, 95.0, 100.0, 100.0]);
        assert_eq!(classify(s), DecayScenario::ImmediateSpike);
    }

    #[test]
    fn test_spike_with_short_tail_is_still_a_spike() {
        let s = series(&FLAT, &[180.0, 200.0, 150.0, 120.0], &[150.0, 130.0, 100.0, 100.0]);
        assert_eq!(classify(s), DecayScenario::ImmediateSpike);
    }

    #[test]
    fn test_sustained_growth_needs_n_post_periods() {
        let s = series(&FLAT, &[150.0; 4], &[150.0, 140.0, 130.0, 100.0]);
        assert_eq!(classify(s), DecayScenario::SustainedGrowth);

        let config = AnalysisConfig {
            sustained_growth_periods: 4,
            ..AnalysisConfig::default()
        };
        let s = series(&FLAT, &[150.0; 4], &[150.0, 140.0, 130.0, 100.0]);
        assert_eq!(classify_series(&s, &config), DecayScenario::ImmediateSpike);
    }

    #[test]
    fn test_delayed_impact_after_lag() {
        let s = series(&FLAT, &FLAT, &[100.0, 100.0, 160.0, 170.0]);
        assert_eq!(classify(s), DecayScenario::DelayedImpact);
    }

    #[test]
    fn test_early_post_bump_without_lag_is_no_effect() {
        let s = series(&FLAT, &FLAT, &[160.0, 100.0, 100.0, 100.0]);
        assert_eq!(classify(s), DecayScenario::NoEffect);
    }

    #[test]
    fn test_delayed_impact_two_periods_after_end() {
        let s = series(&FLAT, &FLAT, &[100.0, 160.0, 170.0, 100.0]);
        assert_eq!(classify(s), DecayScenario::DelayedImpact);
    }

    #[test]
    fn test_late_surge_after_small_bump_is_delayed() {
        let s = series(&FLAT, &[115.0, 100.0, 100.0, 100.0], &[100.0, 100.0, 400.0, 400.0]);
        assert_eq!(classify(s), DecayScenario::DelayedImpact);
    }

    #[test]
    fn test_spike_that_never_settles_is_not_a_spike() {
        let s = series(&FLAT, &[300.0, 100.0, 100.0, 100.0], &[100.0, 100.0, 100.0, 150.0]);
        assert_eq!(classify(s), DecayScenario::DelayedImpact);
    }

    #[test]
    fn test_flat_series_is_no_effect() {
        let s = series(&FLAT, &[105.0, 95.0, 100.0, 108.0], &[100.0; 4]);
        assert_eq!(classify(s), DecayScenario::NoEffect);
    }

    #[test]
    fn test_noisy_baseline_widens_band() {
        // std of pre ≈ 57.7, band ≈ 115 > 10% of 100
        let s = series(&[50.0, 150.0, 50.0, 150.0], &[180.0; 4], &[100.0; 4]);
        assert_eq!(classify(s), DecayScenario::NoEffect);
    }

    #[test]
    fn test_zero_baseline_any_revenue_is_elevated() {
        let s = series(&[0.0; 4], &[10.0, 0.0, 0.0, 0.0], &[0.0; 4]);
        assert_eq!(classify(s), DecayScenario::ImmediateSpike);
    }
}
