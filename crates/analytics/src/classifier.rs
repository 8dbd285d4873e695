//! Scenario classifier — exposure and behavior-change axes, evaluated per
//! outlet over its full period history.

use impact_core::labels::{BehaviorScenario, ExposureScenario, OutletLabels};
use impact_core::types::{Group, Outlet};
use impact_core::{AnalysisConfig, CampaignWindow};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::decay::classify_decay;
use crate::redemption::classify_redemption;

/// An outlet with every axis classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedOutlet {
    pub outlet_id: String,
    pub group: Group,
    pub segments: Vec<String>,
    pub labels: OutletLabels,
    /// `false` when the outlet has no pre-campaign record.
    pub has_baseline: bool,
}

/// Pre-window baseline against the during/post response, mean revenue per
/// period with missing periods counted as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BehaviorProfile {
    pub baseline: f64,
    pub response: f64,
    /// `None` when the baseline is zero.
    pub change_pct: Option<f64>,
}

/// Classify all four axes for one outlet. Pure and order-independent.
pub fn classify_outlet(outlet: &Outlet, config: &AnalysisConfig) -> ClassifiedOutlet {
    let exposure = classify_exposure(outlet, &config.window);
    let behavior = classify_behavior(outlet, config);
    let redemption = classify_redemption(outlet, &config.window, behavior);
    let decay = classify_decay(outlet, config);

    ClassifiedOutlet {
        outlet_id: outlet.id.clone(),
        group: outlet.group,
        segments: outlet.segments.clone(),
        labels: OutletLabels {
            exposure,
            behavior,
            redemption,
            decay,
        },
        has_baseline: has_baseline(outlet, &config.window),
    }
}

/// At least one record inside the pre-campaign window.
pub fn has_baseline(outlet: &Outlet, window: &CampaignWindow) -> bool {
    outlet
        .records_between(window.pre.start, window.pre.end)
        .next()
        .is_some()
}

pub fn classify_exposure(outlet: &Outlet, window: &CampaignWindow) -> ExposureScenario {
    let during: Vec<_> = outlet
        .records_between(window.during.start, window.during.end)
        .filter(|r| r.exposed)
        .collect();

    if during.is_empty() {
        ExposureScenario::NotReached
    } else if during.iter().any(|r| r.is_engaged()) {
        ExposureScenario::ReachedEngaged
    } else {
        ExposureScenario::ReachedNotEngaged
    }
}

pub fn behavior_profile(outlet: &Outlet, window: &CampaignWindow) -> BehaviorProfile {
    let baseline = mean_revenue(outlet, window.pre.start, window.pre.end, window.pre.len());
    let response_periods = window.during.len() + window.post.len();
    let response = mean_revenue(outlet, window.during.start, window.post.end, response_periods);
    let change_pct = if baseline > 0.0 {
        Some((response - baseline) / baseline * 100.0)
    } else {
        None
    };
    BehaviorProfile {
        baseline,
        response,
        change_pct,
    }
}

/// Behavior-change label, or `None` without pre-campaign history.
///
/// Rule order: new activation, reactivation, drop-off, cross-sell, upsell,
/// no change. Threshold comparisons are strict, so a change exactly at the
/// threshold stays `NoChange`.
pub fn classify_behavior(outlet: &Outlet, config: &AnalysisConfig) -> Option<BehaviorScenario> {
    let window = &config.window;
    if !has_baseline(outlet, window) {
        return None;
    }

    let pre_active = outlet
        .records_between(window.pre.start, window.pre.end)
        .any(|r| r.is_active());
    let response_active = outlet
        .records_between(window.during.start, window.post.end)
        .any(|r| r.is_active());

    if !pre_active {
        return Some(if response_active {
            BehaviorScenario::NewActivation
        } else {
            BehaviorScenario::NoChange
        });
    }

    let gap_start = (window.pre.end - config.reactivation_gap_periods as i64 + 1).max(window.pre.start);
    let lapsed = !outlet
        .records_between(gap_start, window.pre.end)
        .any(|r| r.is_active());
    if lapsed && response_active {
        return Some(BehaviorScenario::Reactivation);
    }

    let profile = behavior_profile(outlet, window);
    let threshold = config.behavior_change_threshold_pct;
    let Some(change) = profile.change_pct else {
        // Orders without revenue in the baseline
        return Some(if profile.response > 0.0 {
            BehaviorScenario::Upsell
        } else {
            BehaviorScenario::NoChange
        });
    };

    if change < -threshold {
        return Some(BehaviorScenario::DropOff);
    }
    if has_new_category(outlet, window) {
        return Some(BehaviorScenario::CrossSell);
    }
    if change > threshold {
        return Some(BehaviorScenario::Upsell);
    }
    Some(BehaviorScenario::NoChange)
}

fn mean_revenue(outlet: &Outlet, start: i64, end: i64, periods: usize) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    let total: f64 = outlet.records_between(start, end).map(|r| r.revenue).sum();
    total / periods as f64
}

fn has_new_category(outlet: &Outlet, window: &CampaignWindow) -> bool {
    let categories = |start: i64, end: i64| -> BTreeSet<&str> {
        outlet
            .records_between(start, end)
            .filter(|r| r.is_active())
            .filter_map(|r| r.category.as_deref())
            .collect()
    };
    let before = categories(window.pre.start, window.pre.end);
    let after = categories(window.during.start, window.post.end);
    after.difference(&before).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use impact_core::fixtures::{FixtureBuilder, OutletFixture};

    fn outlet(fixture: OutletFixture) -> Outlet {
        let lines = FixtureBuilder::new().outlet(fixture).build_lines();
        let mut batch = normalize(&lines, &CampaignWindow::default());
        assert!(batch.rejected.is_empty(), "{:?}", batch.rejected);
        batch.outlets.remove(0)
    }

    fn behavior(fixture: OutletFixture) -> Option<BehaviorScenario> {
        classify_behavior(&outlet(fixture), &AnalysisConfig::default())
    }

    #[test]
    fn test_never_exposed_is_not_reached() {
        let o = outlet(OutletFixture::new("o", "A").sales(-4, 7, 100.0, 1));
        assert_eq!(
            classify_exposure(&o, &CampaignWindow::default()),
            ExposureScenario::NotReached
        );
        assert_eq!(o.group, Group::Control);
    }

    #[test]
    fn test_exposure_with_interaction_is_engaged() {
        let o = outlet(OutletFixture::new("o", "A").exposed(1).sale(1, 50.0, 1));
        assert_eq!(
            classify_exposure(&o, &CampaignWindow::default()),
            ExposureScenario::ReachedEngaged
        );

        let o = outlet(OutletFixture::new("o", "A").exposed(1).redeemed(1));
        assert_eq!(
            classify_exposure(&o, &CampaignWindow::default()),
            ExposureScenario::ReachedEngaged
        );
    }

    #[test]
    fn test_exposure_interaction_must_share_the_period() {
        let o = outlet(OutletFixture::new("o", "A").exposed(1).sale(2, 50.0, 1));
        assert_eq!(
            classify_exposure(&o, &CampaignWindow::default()),
            ExposureScenario::ReachedNotEngaged
        );
    }

    #[test]
    fn test_pre_window_exposure_does_not_count_as_reach() {
        let o = outlet(OutletFixture::new("o", "A").exposed(-2).sale(-2, 10.0, 1));
        assert_eq!(
            classify_exposure(&o, &CampaignWindow::default()),
            ExposureScenario::NotReached
        );
    }

    #[test]
    fn test_out_of_window_exposure_defaults_to_control() {
        let o = outlet(
            OutletFixture::new("o", "A")
                .sales(-4, 7, 50.0, 1)
                .exposed(-2)
                .exposed(5),
        );
        assert_eq!(
            classify_exposure(&o, &CampaignWindow::default()),
            ExposureScenario::NotReached
        );
        assert_eq!(o.group, Group::Control);
    }

    #[test]
    fn test_new_activation() {
        let fixture = OutletFixture::new("o", "A").idle_range(-4, -1).sale(1, 80.0, 1);
        assert_eq!(behavior(fixture), Some(BehaviorScenario::NewActivation));
    }

    #[test]
    fn test_no_baseline_has_no_behavior_label() {
        let fixture = OutletFixture::new("o", "A").sale(1, 80.0, 1);
        assert_eq!(behavior(fixture), None);
    }

    #[test]
    fn test_reactivation_after_gap() {
        let fixture = OutletFixture::new("o", "A")
            .sales(-4, -3, 100.0, 1)
            .idle_range(-2, -1)
            .sale(0, 100.0, 1);
        assert_eq!(behavior(fixture), Some(BehaviorScenario::Reactivation));
    }

    #[test]
    fn test_upsell_above_threshold() {
        let fixture = OutletFixture::new("o", "A")
            .sales(-4, -1, 100.0, 1)
            .sales(0, 7, 130.0, 1);
        assert_eq!(behavior(fixture), Some(BehaviorScenario::Upsell));
    }

    #[test]
    fn test_change_exactly_at_threshold_is_no_change() {
        let fixture = OutletFixture::new("o", "A")
            .sales(-4, -1, 100.0, 1)
            .sales(0, 7, 110.0, 1);
        assert_eq!(behavior(fixture), Some(BehaviorScenario::NoChange));

        let fixture = OutletFixture::new("o", "A")
            .sales(-4, -1, 100.0, 1)
            .sales(0, 7, 90.0, 1);
        assert_eq!(behavior(fixture), Some(BehaviorScenario::NoChange));
    }

    #[test]
    fn test_drop_off_below_baseline() {
        let fixture = OutletFixture::new("o", "A")
            .sales(-4, -1, 100.0, 1)
            .sales(0, 7, 50.0, 1);
        assert_eq!(behavior(fixture), Some(BehaviorScenario::DropOff));
    }

    #[test]
    fn test_cross_sell_on_new_category() {
        let fixture = OutletFixture::new("o", "A")
            .sales(-4, -1, 100.0, 1)
            .category(-4, "Core")
            .sales(0, 7, 100.0, 1)
            .category(0, "Core")
            .category(1, "Premium");
        assert_eq!(behavior(fixture), Some(BehaviorScenario::CrossSell));
    }

    #[test]
    fn test_drop_off_wins_over_cross_sell() {
        let fixture = OutletFixture::new("o", "A")
            .sales(-4, -1, 100.0, 1)
            .sale(1, 40.0, 1)
            .category(1, "Premium");
        assert_eq!(behavior(fixture), Some(BehaviorScenario::DropOff));
    }

    #[test]
    fn test_classify_outlet_fills_all_axes() {
        let o = outlet(
            OutletFixture::new("o", "A")
                .sales(-4, -1, 100.0, 1)
                .sales(0, 7, 150.0, 2)
                .exposed(0)
                .redeemed(0),
        );
        let classified = classify_outlet(&o, &AnalysisConfig::default());
        assert!(classified.has_baseline);
        assert_eq!(classified.labels.exposure, ExposureScenario::ReachedEngaged);
        assert_eq!(classified.labels.behavior, Some(BehaviorScenario::Upsell));
        assert!(classified.labels.redemption.is_some());
        assert!(classified.labels.decay.is_some());
    }
}
