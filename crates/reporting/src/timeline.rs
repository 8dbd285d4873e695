//! Campaign timeline — one row per period of the analysis window.

use impact_core::types::{Group, MetricValue, Outlet, Phase};
use impact_core::CampaignWindow;
use serde::Serialize;

/// Per-period totals across every outlet that reported in that period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub period: i64,
    pub phase: Phase,
    pub outlets_reporting: usize,
    pub engagement_rate: MetricValue,
    pub conversion_rate: MetricValue,
    pub revenue: f64,
    pub orders: u64,
    pub test_revenue: f64,
    pub control_revenue: f64,
}

impl TimelinePoint {
    fn empty(period: i64, phase: Phase) -> Self {
        Self {
            period,
            phase,
            outlets_reporting: 0,
            engagement_rate: MetricValue::NoData,
            conversion_rate: MetricValue::NoData,
            revenue: 0.0,
            orders: 0,
            test_revenue: 0.0,
            control_revenue: 0.0,
        }
    }
}

/// Build the timeline. `outlets` must be sorted by id so that floating-point
/// sums are accumulated in a fixed order.
pub fn build_timeline(outlets: &[Outlet], window: &CampaignWindow) -> Vec<TimelinePoint> {
    window
        .timeline()
        .map(|(period, phase)| {
            let mut point = TimelinePoint::empty(period, phase);
            let mut engaged = 0usize;
            let mut converted = 0usize;

            let reporting = outlets
                .iter()
                .filter_map(|o| o.record(period).map(|r| (o.group, r)));
            for (group, record) in reporting {
                point.outlets_reporting += 1;
                point.revenue += record.revenue;
                point.orders += record.orders;
                match group {
                    Group::Test => point.test_revenue += record.revenue,
                    Group::Control => point.control_revenue += record.revenue,
                }
                if record.is_engaged() {
                    engaged += 1;
                }
                if record.orders > 0 {
                    converted += 1;
                }
            }

            let reporting = point.outlets_reporting as f64;
            point.engagement_rate = MetricValue::percentage(engaged as f64, reporting);
            point.conversion_rate = MetricValue::percentage(converted as f64, reporting);
            point
        })
        .collect()
}
