//! Report assembler — merges classification, segment rollups, and the
//! timeline into the final impact report.

use impact_analytics::{ClassifiedOutlet, NormalizedBatch, RollupOutput, SegmentReport};
use impact_core::labels::{
    BehaviorScenario, DecayScenario, ExposureScenario, OutletLabels, RedemptionScenario, Scenario,
};
use impact_core::types::{ComparisonResult, Group, MetricValue, RecordRejection, Warning};
use impact_core::{AnalysisConfig, AnalyticsError, AnalyticsResult};
use serde::Serialize;
use tracing::info;

use crate::timeline::{build_timeline, TimelinePoint};

pub const INSUFFICIENT_HISTORY: &str = "insufficient-history";
pub const NO_CAMPAIGN_ACTIVITY: &str = "no-campaign-activity";

/// Outlets carrying one label, or excluded from the axis altogether.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioBucket {
    pub scenario: String,
    pub outlet_count: usize,
    pub share_pct: f64,
    pub outlets: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub excluded: bool,
}

/// Headline numbers for the campaign overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignSummary {
    pub total_outlets: usize,
    pub test_outlets: usize,
    pub control_outlets: usize,
    pub reached_outlets: usize,
    /// Engaged outlets among reached outlets.
    pub engagement_rate: MetricValue,
    /// Outlets with at least one during-window order, over all outlets.
    pub conversion_rate: MetricValue,
    pub campaign_revenue: f64,
    pub records_read: usize,
    pub records_rejected: usize,
}

/// The full output of one run. Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactReport {
    pub summary: CampaignSummary,
    pub exposure_scenarios: Vec<ScenarioBucket>,
    pub behavior_scenarios: Vec<ScenarioBucket>,
    pub redemption_scenarios: Vec<ScenarioBucket>,
    pub decay_scenarios: Vec<ScenarioBucket>,
    pub segments: Vec<SegmentReport>,
    pub comparisons: Vec<ComparisonResult>,
    pub timeline: Vec<TimelinePoint>,
    pub rejected_records: Vec<RecordRejection>,
    pub warnings: Vec<Warning>,
}

impl ImpactReport {
    pub fn to_json(&self, pretty: bool) -> AnalyticsResult<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn bucket_total(buckets: &[ScenarioBucket]) -> usize {
        buckets.iter().map(|b| b.outlet_count).sum()
    }
}

/// Assemble the report. `classified` must be sorted by outlet id.
pub fn assemble(
    batch: &NormalizedBatch,
    classified: &[ClassifiedOutlet],
    rollup: RollupOutput,
    config: &AnalysisConfig,
) -> AnalyticsResult<ImpactReport> {
    let exposure_scenarios = buckets(classified, |l| Some(l.exposure), None);
    let behavior_scenarios = buckets::<BehaviorScenario>(
        classified,
        |l| l.behavior,
        Some(INSUFFICIENT_HISTORY),
    );
    let redemption_scenarios = buckets::<RedemptionScenario>(
        classified,
        |l| l.redemption,
        Some(NO_CAMPAIGN_ACTIVITY),
    );
    let decay_scenarios =
        buckets::<DecayScenario>(classified, |l| l.decay, Some(INSUFFICIENT_HISTORY));

    for (axis, axis_buckets) in [
        (ExposureScenario::AXIS, &exposure_scenarios),
        (BehaviorScenario::AXIS, &behavior_scenarios),
        (RedemptionScenario::AXIS, &redemption_scenarios),
        (DecayScenario::AXIS, &decay_scenarios),
    ] {
        for bucket in axis_buckets {
            check_references(batch, &format!("{axis}:{}", bucket.scenario), &bucket.outlets)?;
        }
    }
    for segment in &rollup.segments {
        check_references(batch, &format!("segment:{}", segment.segment), &segment.outlets)?;
    }

    let mut warnings: Vec<Warning> = classified
        .iter()
        .filter(|c| !c.has_baseline)
        .map(|c| Warning::insufficient_history(&c.outlet_id))
        .collect();
    for comparison in &rollup.comparisons {
        warnings.extend(Warning::for_comparison(comparison, config.min_sample_size));
    }
    warnings.sort();
    warnings.dedup();

    let summary = summarize(batch, classified, config);
    let timeline = build_timeline(&batch.outlets, &config.window);

    info!(
        outlets = summary.total_outlets,
        segments = rollup.segments.len(),
        comparisons = rollup.comparisons.len(),
        warnings = warnings.len(),
        "Impact report assembled"
    );

    Ok(ImpactReport {
        summary,
        exposure_scenarios,
        behavior_scenarios,
        redemption_scenarios,
        decay_scenarios,
        segments: rollup.segments,
        comparisons: rollup.comparisons,
        timeline,
        rejected_records: batch.rejected.clone(),
        warnings,
    })
}

fn buckets<S: Scenario>(
    classified: &[ClassifiedOutlet],
    pick: impl Fn(&OutletLabels) -> Option<S>,
    exclusion: Option<&'static str>,
) -> Vec<ScenarioBucket> {
    let total = classified.len();
    let bucket = |scenario: &str, outlets: Vec<String>, excluded: bool| ScenarioBucket {
        scenario: scenario.to_string(),
        outlet_count: outlets.len(),
        share_pct: share(outlets.len(), total),
        outlets,
        excluded,
    };

    let mut result: Vec<ScenarioBucket> = S::all()
        .iter()
        .map(|label| {
            let outlets = classified
                .iter()
                .filter(|c| pick(&c.labels) == Some(*label))
                .map(|c| c.outlet_id.clone())
                .collect();
            bucket(label.as_str(), outlets, false)
        })
        .collect();

    if let Some(name) = exclusion {
        let outlets = classified
            .iter()
            .filter(|c| pick(&c.labels).is_none())
            .map(|c| c.outlet_id.clone())
            .collect();
        result.push(bucket(name, outlets, true));
    }
    result
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn check_references(batch: &NormalizedBatch, category: &str, outlets: &[String]) -> AnalyticsResult<()> {
    match outlets.iter().find(|id| !batch.contains(id)) {
        Some(orphan) => Err(AnalyticsError::OrphanReference {
            category: category.to_string(),
            outlet_id: orphan.clone(),
        }),
        None => Ok(()),
    }
}

fn summarize(
    batch: &NormalizedBatch,
    classified: &[ClassifiedOutlet],
    config: &AnalysisConfig,
) -> CampaignSummary {
    let during = config.window.during;
    let test_outlets = classified.iter().filter(|c| c.group == Group::Test).count();
    let reached = classified
        .iter()
        .filter(|c| c.labels.exposure != ExposureScenario::NotReached)
        .count();
    let engaged = classified
        .iter()
        .filter(|c| c.labels.exposure == ExposureScenario::ReachedEngaged)
        .count();

    let mut converted = 0usize;
    let mut campaign_revenue = 0.0;
    for outlet in &batch.outlets {
        let mut orders = 0u64;
        for record in outlet.records_between(during.start, during.end) {
            campaign_revenue += record.revenue;
            orders += record.orders;
        }
        if orders > 0 {
            converted += 1;
        }
    }

    CampaignSummary {
        total_outlets: classified.len(),
        test_outlets,
        control_outlets: classified.len() - test_outlets,
        reached_outlets: reached,
        engagement_rate: MetricValue::percentage(engaged as f64, reached as f64),
        conversion_rate: MetricValue::percentage(converted as f64, classified.len() as f64),
        campaign_revenue,
        records_read: batch.records_read,
        records_rejected: batch.rejected.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impact_analytics::{classify_outlet, normalize, SegmentAccumulator};
    use impact_core::fixtures::{FixtureBuilder, OutletFixture};
    use impact_core::types::WarningKind;

    fn run(builder: FixtureBuilder) -> (NormalizedBatch, Vec<ClassifiedOutlet>, RollupOutput) {
        let config = AnalysisConfig::default();
        let batch = normalize(&builder.build_lines(), &config.window);
        let mut acc = SegmentAccumulator::new();
        let classified: Vec<_> = batch
            .outlets
            .iter()
            .map(|o| {
                let c = classify_outlet(o, &config);
                acc.add(&c, o, &config.window);
                c
            })
            .collect();
        let rollup = acc.finalize(&config);
        (batch, classified, rollup)
    }

    fn sample() -> FixtureBuilder {
        FixtureBuilder::new()
            .outlet(OutletFixture::new("a", "A").sales(-4, -1, 100.0, 1).sale(0, 150.0, 1).exposed(0))
            .outlet(OutletFixture::new("b", "A").sales(-4, 3, 100.0, 1))
            .outlet(OutletFixture::new("c", "B").sale(1, 50.0, 1).exposed(1))
            .outlet(OutletFixture::new("d", "B").sales(-4, -1, 80.0, 1).sales(4, 7, 80.0, 1))
    }

    #[test]
    fn test_bucket_counts_sum_to_outlets() {
        let (batch, classified, rollup) = run(sample());
        let report = assemble(&batch, &classified, rollup, &AnalysisConfig::default()).unwrap();
        for axis in [
            &report.exposure_scenarios,
            &report.behavior_scenarios,
            &report.redemption_scenarios,
            &report.decay_scenarios,
        ] {
            assert_eq!(ImpactReport::bucket_total(axis), 4);
        }

        let excluded = report.decay_scenarios.last().unwrap();
        assert!(excluded.excluded);
        assert_eq!(excluded.scenario, INSUFFICIENT_HISTORY);
        assert_eq!(excluded.outlets, vec!["c".to_string()]);

        let inactive = report.redemption_scenarios.last().unwrap();
        assert_eq!(inactive.scenario, NO_CAMPAIGN_ACTIVITY);
        assert_eq!(inactive.outlets, vec!["d".to_string()]);
    }

    #[test]
    fn test_insufficient_history_warning() {
        let (batch, classified, rollup) = run(sample());
        let report = assemble(&batch, &classified, rollup, &AnalysisConfig::default()).unwrap();
        let warning = report
            .warnings
            .iter()
            .find(|w| w.kind == WarningKind::InsufficientHistory)
            .unwrap();
        assert_eq!(warning.outlet_id.as_deref(), Some("c"));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::LowConfidence));
        let mut sorted = report.warnings.clone();
        sorted.sort();
        assert_eq!(sorted, report.warnings);
    }

    #[test]
    fn test_summary_counts() {
        let (batch, classified, rollup) = run(sample());
        let report = assemble(&batch, &classified, rollup, &AnalysisConfig::default()).unwrap();
        let summary = &report.summary;
        assert_eq!(summary.total_outlets, 4);
        assert_eq!(summary.test_outlets, 2);
        assert_eq!(summary.reached_outlets, 2);
        assert_eq!(summary.engagement_rate, MetricValue::Value(100.0));
        assert_eq!(summary.conversion_rate, MetricValue::Value(75.0));
        assert_eq!(summary.campaign_revenue, 150.0 + 400.0 + 50.0);
    }

    #[test]
    fn test_orphan_reference_is_fatal() {
        let (batch, mut classified, rollup) = run(sample());
        classified.push(ClassifiedOutlet {
            outlet_id: "ghost".to_string(),
            ..classified[0].clone()
        });
        let err = assemble(&batch, &classified, rollup, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::OrphanReference { ref outlet_id, .. } if outlet_id == "ghost"
        ));
    }

    #[test]
    fn test_serialized_key_order() {
        let (batch, classified, rollup) = run(sample());
        let report = assemble(&batch, &classified, rollup, &AnalysisConfig::default()).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let keys = [
            "\"summary\"",
            "\"exposure_scenarios\"",
            "\"behavior_scenarios\"",
            "\"redemption_scenarios\"",
            "\"decay_scenarios\"",
            "\"segments\"",
            "\"comparisons\"",
            "\"timeline\"",
            "\"rejected_records\"",
            "\"warnings\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
