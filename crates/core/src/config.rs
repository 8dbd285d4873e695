use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::{MetricKind, Phase};

/// Root analysis configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CAMPAIGN_IMPACT__`.
///
/// The value is immutable for the duration of a run and is passed
/// explicitly into every stage.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub window: CampaignWindow,
    #[serde(default = "default_behavior_change_threshold_pct")]
    pub behavior_change_threshold_pct: f64,
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,
    #[serde(default = "default_sustained_growth_periods")]
    pub sustained_growth_periods: usize,
    #[serde(default = "default_delayed_impact_lag")]
    pub delayed_impact_lag: usize,
    #[serde(default = "default_reactivation_gap_periods")]
    pub reactivation_gap_periods: usize,
    #[serde(default = "default_decay_elevation_pct")]
    pub decay_elevation_pct: f64,
    #[serde(default = "default_decay_sigma")]
    pub decay_sigma: f64,
    #[serde(default = "default_confidence_level_pct")]
    pub confidence_level_pct: f64,
    #[serde(default = "default_segment_lift_metric")]
    pub segment_lift_metric: MetricKind,
    #[serde(default)]
    pub segment_baseline: SegmentBaseline,
    #[serde(default = "default_comparison_metrics")]
    pub comparison_metrics: Vec<MetricKind>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

/// Inclusive range of period indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PeriodRange {
    pub start: i64,
    pub end: i64,
}

impl PeriodRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, period: i64) -> bool {
        period >= self.start && period <= self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn periods(&self) -> impl Iterator<Item = i64> {
        self.start..=self.end
    }
}

/// Pre/during/post campaign boundaries, supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CampaignWindow {
    #[serde(default = "default_pre_range")]
    pub pre: PeriodRange,
    #[serde(default = "default_during_range")]
    pub during: PeriodRange,
    #[serde(default = "default_post_range")]
    pub post: PeriodRange,
}

impl CampaignWindow {
    pub fn new(pre: PeriodRange, during: PeriodRange, post: PeriodRange) -> Self {
        Self { pre, during, post }
    }

    /// Phase a period belongs to, or `None` if it falls outside every range.
    pub fn phase_of(&self, period: i64) -> Option<Phase> {
        if self.pre.contains(period) {
            Some(Phase::Pre)
        } else if self.during.contains(period) {
            Some(Phase::During)
        } else if self.post.contains(period) {
            Some(Phase::Post)
        } else {
            None
        }
    }

    pub fn range(&self, phase: Phase) -> PeriodRange {
        match phase {
            Phase::Pre => self.pre,
            Phase::During => self.during,
            Phase::Post => self.post,
        }
    }

    /// Every period of the window in ascending order, paired with its phase.
    pub fn timeline(&self) -> impl Iterator<Item = (i64, Phase)> + '_ {
        [Phase::Pre, Phase::During, Phase::Post]
            .into_iter()
            .flat_map(move |phase| self.range(phase).periods().map(move |p| (p, phase)))
    }

    fn validate(&self) -> AnalyticsResult<()> {
        for (name, range) in [("pre", self.pre), ("during", self.during), ("post", self.post)] {
            if range.is_empty() {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "window.{name} is empty ({}..={})",
                    range.start, range.end
                )));
            }
        }
        if self.pre.end >= self.during.start || self.during.end >= self.post.start {
            return Err(AnalyticsError::InvalidConfig(
                "window ranges must be ordered pre < during < post without overlap".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a segment's lift is measured against.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentBaseline {
    /// Control-group outlets of the same segment.
    #[default]
    ControlGroup,
    /// The same outlets during the pre-campaign window.
    PriorPeriod,
    /// Explicit test segment -> control segment pairs.
    ControlSegments {
        #[serde(default)]
        pairs: BTreeMap<String, String>,
    },
}

// Default functions
fn default_behavior_change_threshold_pct() -> f64 {
    10.0
}
fn default_min_sample_size() -> usize {
    30
}
fn default_sustained_growth_periods() -> usize {
    3
}
fn default_delayed_impact_lag() -> usize {
    2
}
fn default_reactivation_gap_periods() -> usize {
    2
}
fn default_decay_elevation_pct() -> f64 {
    10.0
}
fn default_decay_sigma() -> f64 {
    2.0
}
fn default_confidence_level_pct() -> f64 {
    95.0
}
fn default_segment_lift_metric() -> MetricKind {
    MetricKind::AverageOrderValue
}
fn default_comparison_metrics() -> Vec<MetricKind> {
    MetricKind::ALL.to_vec()
}
fn default_worker_count() -> usize {
    4
}
fn default_pre_range() -> PeriodRange {
    PeriodRange::new(-4, -1)
}
fn default_during_range() -> PeriodRange {
    PeriodRange::new(0, 3)
}
fn default_post_range() -> PeriodRange {
    PeriodRange::new(4, 7)
}

impl Default for CampaignWindow {
    fn default() -> Self {
        Self {
            pre: default_pre_range(),
            during: default_during_range(),
            post: default_post_range(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window: CampaignWindow::default(),
            behavior_change_threshold_pct: default_behavior_change_threshold_pct(),
            min_sample_size: default_min_sample_size(),
            sustained_growth_periods: default_sustained_growth_periods(),
            delayed_impact_lag: default_delayed_impact_lag(),
            reactivation_gap_periods: default_reactivation_gap_periods(),
            decay_elevation_pct: default_decay_elevation_pct(),
            decay_sigma: default_decay_sigma(),
            confidence_level_pct: default_confidence_level_pct(),
            segment_lift_metric: default_segment_lift_metric(),
            segment_baseline: SegmentBaseline::default(),
            comparison_metrics: default_comparison_metrics(),
            worker_count: default_worker_count(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (`CAMPAIGN_IMPACT__MIN_SAMPLE_SIZE=50`, ...). The result is
    /// validated before it is returned.
    pub fn load(path: Option<&Path>) -> AnalyticsResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_IMPACT")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("comparison_metrics"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(
            path = ?path,
            workers = config.worker_count,
            metrics = config.comparison_metrics.len(),
            "Analysis configuration loaded"
        );
        Ok(config)
    }

    /// Reject configurations that would make classification ill-defined.
    pub fn validate(&self) -> AnalyticsResult<()> {
        self.window.validate()?;
        if !self.behavior_change_threshold_pct.is_finite() || self.behavior_change_threshold_pct < 0.0
        {
            return Err(AnalyticsError::InvalidConfig(
                "behavior_change_threshold_pct must be a non-negative number".to_string(),
            ));
        }
        if !self.decay_elevation_pct.is_finite() || self.decay_elevation_pct < 0.0 {
            return Err(AnalyticsError::InvalidConfig(
                "decay_elevation_pct must be a non-negative number".to_string(),
            ));
        }
        if !self.decay_sigma.is_finite() || self.decay_sigma < 0.0 {
            return Err(AnalyticsError::InvalidConfig(
                "decay_sigma must be a non-negative number".to_string(),
            ));
        }
        if !(self.confidence_level_pct > 0.0 && self.confidence_level_pct < 100.0) {
            return Err(AnalyticsError::InvalidConfig(
                "confidence_level_pct must lie strictly between 0 and 100".to_string(),
            ));
        }
        if self.min_sample_size == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "min_sample_size must be at least 1".to_string(),
            ));
        }
        if self.sustained_growth_periods == 0 || self.reactivation_gap_periods == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "sustained_growth_periods and reactivation_gap_periods must be at least 1"
                    .to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if let SegmentBaseline::ControlSegments { pairs } = &self.segment_baseline {
            if let Some((test, _)) = pairs.iter().find(|(test, control)| test == control) {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "segment '{test}' cannot be its own control"
                )));
            }
        }
        Ok(())
    }
}
