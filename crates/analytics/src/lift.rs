//! Lift & significance calculator — compares a test group against a control
//! group for one metric.

use impact_core::types::{
    AggregateMetric, ComparisonResult, ComparisonScope, Lift, LiftDirection, MetricKind,
    MetricValue, Outlet, Significance,
};
use impact_core::{AnalysisConfig, PeriodRange};
use serde::Serialize;
use tracing::debug;

use crate::stats::{two_proportion_z, welch_t};

/// One outlet's contribution to group metrics over a measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutletSample {
    pub engaged: bool,
    pub converted: bool,
    pub revenue: f64,
    pub orders: u64,
}

impl OutletSample {
    /// Measure `outlet` over `range`. Engagement comes from the exposure
    /// classification, which always looks at the campaign window.
    pub fn measure(outlet: &Outlet, range: PeriodRange, engaged: bool) -> Self {
        let mut sample = Self {
            engaged,
            converted: false,
            revenue: 0.0,
            orders: 0,
        };
        for record in outlet.records_between(range.start, range.end) {
            sample.revenue += record.revenue;
            sample.orders += record.orders;
        }
        sample.converted = sample.orders > 0;
        sample
    }

    /// Average order value for this outlet alone.
    pub fn order_value(&self) -> Option<f64> {
        (self.orders > 0).then(|| self.revenue / self.orders as f64)
    }
}

/// Group value of `metric` as shown on segment rows. Revenue is the total.
pub fn aggregate(metric: MetricKind, samples: &[OutletSample]) -> AggregateMetric {
    let n = samples.len();
    let (value, sample_size) = match metric {
        MetricKind::EngagementRate => (
            MetricValue::percentage(count(samples, |s| s.engaged) as f64, n as f64),
            n,
        ),
        MetricKind::ConversionRate => (
            MetricValue::percentage(count(samples, |s| s.converted) as f64, n as f64),
            n,
        ),
        MetricKind::AverageOrderValue => {
            let (revenue, orders) = totals(samples);
            (
                MetricValue::ratio(revenue, orders as f64),
                count(samples, |s| s.orders > 0),
            )
        }
        MetricKind::Revenue => {
            let value = if n == 0 {
                MetricValue::NoData
            } else {
                MetricValue::Value(totals(samples).0)
            };
            (value, n)
        }
    };
    AggregateMetric {
        metric,
        value,
        sample_size,
    }
}

/// Group value of `metric` for comparisons. Revenue is per outlet so that
/// groups of different sizes are comparable.
pub fn comparison_value(metric: MetricKind, samples: &[OutletSample]) -> AggregateMetric {
    match metric {
        MetricKind::Revenue => AggregateMetric {
            metric,
            value: MetricValue::ratio(totals(samples).0, samples.len() as f64),
            sample_size: samples.len(),
        },
        _ => aggregate(metric, samples),
    }
}

/// Compare `test` against `control` for one metric.
pub fn compare(
    metric: MetricKind,
    scope: ComparisonScope,
    control: &[OutletSample],
    test: &[OutletSample],
    config: &AnalysisConfig,
) -> ComparisonResult {
    let control_metric = comparison_value(metric, control);
    let test_metric = comparison_value(metric, test);
    let lift = Lift::between(control_metric.value, test_metric.value);
    let significance = significance(metric, control, test);

    let low_confidence = control_metric.sample_size < config.min_sample_size
        || test_metric.sample_size < config.min_sample_size;
    let direction = direction(lift, test_metric.value, significance.as_ref(), config);

    debug!(
        metric = %metric,
        scope = %scope,
        control_n = control_metric.sample_size,
        test_n = test_metric.sample_size,
        low_confidence,
        "Comparison computed"
    );

    ComparisonResult {
        metric,
        scope,
        control_value: control_metric.value,
        test_value: test_metric.value,
        lift,
        significance,
        control_sample_size: control_metric.sample_size,
        test_sample_size: test_metric.sample_size,
        low_confidence,
        direction,
    }
}

fn significance(
    metric: MetricKind,
    control: &[OutletSample],
    test: &[OutletSample],
) -> Option<Significance> {
    match metric {
        MetricKind::EngagementRate => two_proportion_z(
            count(test, |s| s.engaged),
            test.len(),
            count(control, |s| s.engaged),
            control.len(),
        ),
        MetricKind::ConversionRate => two_proportion_z(
            count(test, |s| s.converted),
            test.len(),
            count(control, |s| s.converted),
            control.len(),
        ),
        MetricKind::AverageOrderValue => {
            let values = |samples: &[OutletSample]| -> Vec<f64> {
                samples.iter().filter_map(|s| s.order_value()).collect()
            };
            welch_t(&values(test), &values(control))
        }
        MetricKind::Revenue => {
            let values = |samples: &[OutletSample]| -> Vec<f64> {
                samples.iter().map(|s| s.revenue).collect()
            };
            welch_t(&values(test), &values(control))
        }
    }
}

fn direction(
    lift: Lift,
    test_value: MetricValue,
    significance: Option<&Significance>,
    config: &AnalysisConfig,
) -> LiftDirection {
    let significant = significance
        .map(|s| s.confidence_pct >= config.confidence_level_pct)
        .unwrap_or(false);
    match lift {
        Lift::NoData => LiftDirection::Undetermined,
        Lift::New => match test_value.value() {
            Some(v) if v > 0.0 => LiftDirection::Positive,
            _ => LiftDirection::Neutral,
        },
        Lift::Percent { value } if significant && value > 0.0 => LiftDirection::Positive,
        Lift::Percent { value } if significant && value < 0.0 => LiftDirection::Negative,
        Lift::Percent { .. } => LiftDirection::Neutral,
    }
}

fn count(samples: &[OutletSample], pred: impl Fn(&OutletSample) -> bool) -> usize {
    samples.iter().filter(|s| pred(s)).count()
}

fn totals(samples: &[OutletSample]) -> (f64, u64) {
    samples
        .iter()
        .fold((0.0, 0), |(revenue, orders), s| (revenue + s.revenue, orders + s.orders))
}
