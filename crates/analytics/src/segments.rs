//! Segment aggregator — per-segment rollups and the global test-vs-control
//! comparisons.
//!
//! Partials are keyed per outlet id, so merging chunk results is a map union
//! and the finalized numbers depend only on the set of outlets, never on the
//! order they arrived in.

use std::collections::BTreeMap;

use impact_core::config::SegmentBaseline;
use impact_core::labels::ExposureScenario;
use impact_core::types::{
    AggregateMetric, ComparisonResult, ComparisonScope, Group, MetricKind, Outlet,
};
use impact_core::{AnalysisConfig, CampaignWindow};
use serde::Serialize;
use tracing::debug;

use crate::classifier::ClassifiedOutlet;
use crate::lift::{aggregate, compare, OutletSample};

#[derive(Debug, Clone, Copy, PartialEq)]
struct SegmentEntry {
    group: Group,
    during: OutletSample,
    pre: OutletSample,
}

/// One row of the segment table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub segment: String,
    pub outlet_count: usize,
    pub test_outlets: usize,
    pub control_outlets: usize,
    pub metrics: Vec<AggregateMetric>,
    /// `None` when the configured baseline has nothing to compare against.
    pub lift: Option<ComparisonResult>,
    pub outlets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RollupOutput {
    pub segments: Vec<SegmentReport>,
    pub comparisons: Vec<ComparisonResult>,
}

/// Mergeable partial aggregate over a subset of outlets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentAccumulator {
    segments: BTreeMap<String, BTreeMap<String, SegmentEntry>>,
    all: BTreeMap<String, SegmentEntry>,
}

impl SegmentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, classified: &ClassifiedOutlet, outlet: &Outlet, window: &CampaignWindow) {
        let engaged_during = classified.labels.exposure == ExposureScenario::ReachedEngaged;
        let engaged_pre = outlet
            .records_between(window.pre.start, window.pre.end)
            .any(|r| r.is_engaged());
        let entry = SegmentEntry {
            group: classified.group,
            during: OutletSample::measure(outlet, window.during, engaged_during),
            pre: OutletSample::measure(outlet, window.pre, engaged_pre),
        };

        for segment in &classified.segments {
            self.segments
                .entry(segment.clone())
                .or_default()
                .insert(classified.outlet_id.clone(), entry);
        }
        self.all.insert(classified.outlet_id.clone(), entry);
    }

    /// Union with another partial. An outlet id present in both keeps the
    /// entry already held; ids are unique per batch so the two never differ.
    pub fn merge(&mut self, other: SegmentAccumulator) {
        for (segment, entries) in other.segments {
            let target = self.segments.entry(segment).or_default();
            for (id, entry) in entries {
                target.entry(id).or_insert(entry);
            }
        }
        for (id, entry) in other.all {
            self.all.entry(id).or_insert(entry);
        }
    }

    pub fn outlet_count(&self) -> usize {
        self.all.len()
    }

    pub fn finalize(&self, config: &AnalysisConfig) -> RollupOutput {
        let (control, test) = split_by_group(&self.all);
        let mut comparisons: Vec<ComparisonResult> = config
            .comparison_metrics
            .iter()
            .map(|&metric| compare(metric, ComparisonScope::Global, &control, &test, config))
            .collect();

        let segments: Vec<SegmentReport> = self
            .segments
            .iter()
            .map(|(name, entries)| self.segment_report(name, entries, config))
            .collect();

        comparisons.extend(segments.iter().filter_map(|s| s.lift.clone()));

        debug!(
            segments = segments.len(),
            comparisons = comparisons.len(),
            "Segment rollup finalized"
        );

        RollupOutput {
            segments,
            comparisons,
        }
    }

    fn segment_report(
        &self,
        name: &str,
        entries: &BTreeMap<String, SegmentEntry>,
        config: &AnalysisConfig,
    ) -> SegmentReport {
        let during: Vec<OutletSample> = entries.values().map(|e| e.during).collect();
        let metrics = MetricKind::ALL
            .iter()
            .map(|&metric| aggregate(metric, &during))
            .collect();

        let metric = config.segment_lift_metric;
        let scope = || ComparisonScope::Segment(name.to_string());
        let lift = match &config.segment_baseline {
            SegmentBaseline::ControlGroup => {
                let (control, test) = split_by_group(entries);
                Some(compare(metric, scope(), &control, &test, config))
            }
            SegmentBaseline::PriorPeriod => {
                let pre: Vec<OutletSample> = entries.values().map(|e| e.pre).collect();
                Some(compare(metric, scope(), &pre, &during, config))
            }
            SegmentBaseline::ControlSegments { pairs } => pairs.get(name).map(|control_name| {
                let control: Vec<OutletSample> = self
                    .segments
                    .get(control_name)
                    .map(|c| c.values().map(|e| e.during).collect())
                    .unwrap_or_default();
                compare(metric, scope(), &control, &during, config)
            }),
        };

        let test_outlets = entries.values().filter(|e| e.group == Group::Test).count();
        SegmentReport {
            segment: name.to_string(),
            outlet_count: entries.len(),
            test_outlets,
            control_outlets: entries.len() - test_outlets,
            metrics,
            lift,
            outlets: entries.keys().cloned().collect(),
        }
    }
}

fn split_by_group(entries: &BTreeMap<String, SegmentEntry>) -> (Vec<OutletSample>, Vec<OutletSample>) {
    let mut control = Vec::new();
    let mut test = Vec::new();
    for entry in entries.values() {
        match entry.group {
            Group::Control => control.push(entry.during),
            Group::Test => test.push(entry.during),
        }
    }
    (control, test)
}
