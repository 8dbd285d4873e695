use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Campaign phase a period belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pre,
    During,
    Post,
}

/// Experimental group membership, fixed at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Test,
    Control,
}

/// One outlet's activity for one period. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletPeriodRecord {
    pub outlet_id: String,
    pub period: i64,
    pub exposed: bool,
    pub redeemed: bool,
    pub revenue: f64,
    pub orders: u64,
    pub segments: Vec<String>,
    /// Product category the period's purchases fell into, when known.
    #[serde(default)]
    pub category: Option<String>,
    /// Explicit group assignment carried on the record, if any.
    #[serde(default)]
    pub group: Option<Group>,
}

impl OutletPeriodRecord {
    /// A period counts as active when anything was bought.
    pub fn is_active(&self) -> bool {
        self.revenue > 0.0 || self.orders > 0
    }

    /// Exposure paired with a qualifying interaction in the same period.
    pub fn is_engaged(&self) -> bool {
        self.exposed && (self.redeemed || self.orders > 0)
    }
}

/// An outlet and its full, period-ordered history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlet {
    pub id: String,
    /// Sorted, de-duplicated segment tags.
    pub segments: Vec<String>,
    pub group: Group,
    /// Sorted by period, at most one record per period.
    pub records: Vec<OutletPeriodRecord>,
}

impl Outlet {
    pub fn record(&self, period: i64) -> Option<&OutletPeriodRecord> {
        self.records
            .binary_search_by_key(&period, |r| r.period)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn records_between(&self, start: i64, end: i64) -> impl Iterator<Item = &OutletPeriodRecord> {
        self.records
            .iter()
            .filter(move |r| r.period >= start && r.period <= end)
    }

    /// Revenue for a period, treating a missing record as zero.
    pub fn revenue_at(&self, period: i64) -> f64 {
        self.record(period).map(|r| r.revenue).unwrap_or(0.0)
    }
}

/// Metric names the engine aggregates and compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    EngagementRate,
    ConversionRate,
    AverageOrderValue,
    Revenue,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::EngagementRate,
        MetricKind::ConversionRate,
        MetricKind::AverageOrderValue,
        MetricKind::Revenue,
    ];

    /// Rate metrics are proportions of outlets and use binomial variance.
    pub fn is_rate(&self) -> bool {
        matches!(self, MetricKind::EngagementRate | MetricKind::ConversionRate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::EngagementRate => "engagement_rate",
            MetricKind::ConversionRate => "conversion_rate",
            MetricKind::AverageOrderValue => "average_order_value",
            MetricKind::Revenue => "revenue",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric value, or the explicit absence of one.
///
/// Serializes as a bare number, or as the string `"no data"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Value(f64),
    NoData,
}

impl MetricValue {
    /// `numerator / denominator`, with a zero denominator meaning no data.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            MetricValue::NoData
        } else {
            MetricValue::Value(numerator / denominator)
        }
    }

    /// Same as [`MetricValue::ratio`], scaled to a percentage.
    pub fn percentage(numerator: f64, denominator: f64) -> Self {
        match Self::ratio(numerator, denominator) {
            MetricValue::Value(v) => MetricValue::Value(v * 100.0),
            MetricValue::NoData => MetricValue::NoData,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            MetricValue::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, MetricValue::NoData)
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Value(v) => serializer.serialize_f64(*v),
            MetricValue::NoData => serializer.serialize_str("no data"),
        }
    }
}

/// A named metric scoped to a segment, scenario, or group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateMetric {
    pub metric: MetricKind,
    pub value: MetricValue,
    /// Number of outlets the value was computed over.
    pub sample_size: usize,
}

/// Relative difference between a test and a control value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Lift {
    Percent { value: f64 },
    /// Control value is zero; shown as "New" on the dashboard.
    New,
    /// One side has no data at all.
    NoData,
}

impl Lift {
    pub fn between(control: MetricValue, test: MetricValue) -> Self {
        match (control, test) {
            (MetricValue::Value(c), MetricValue::Value(t)) => {
                if c == 0.0 {
                    Lift::New
                } else {
                    Lift::Percent {
                        value: (t - c) / c * 100.0,
                    }
                }
            }
            _ => Lift::NoData,
        }
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            Lift::Percent { value } => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignificanceTest {
    TwoProportionZ,
    WelchT,
}

/// Two-sample significance estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Significance {
    pub test: SignificanceTest,
    pub statistic: f64,
    pub p_value: f64,
    pub confidence_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiftDirection {
    Positive,
    Neutral,
    Negative,
    Undetermined,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ComparisonScope {
    Global,
    Segment(String),
}

impl fmt::Display for ComparisonScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonScope::Global => f.write_str("global"),
            ComparisonScope::Segment(name) => write!(f, "segment:{name}"),
        }
    }
}

/// Control-vs-test comparison of one metric. Recomputed, never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub metric: MetricKind,
    pub scope: ComparisonScope,
    pub control_value: MetricValue,
    pub test_value: MetricValue,
    pub lift: Lift,
    pub significance: Option<Significance>,
    pub control_sample_size: usize,
    pub test_sample_size: usize,
    pub low_confidence: bool,
    pub direction: LiftDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionKind {
    MalformedRecord,
    DuplicateRecord,
}

/// Audit entry for an input record excluded during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRejection {
    /// 1-based position of the record in the input stream.
    pub line: usize,
    pub outlet_id: Option<String>,
    pub kind: RejectionKind,
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    InsufficientHistory,
    LowConfidence,
    ZeroBaseline,
}

/// Non-fatal observation attached to the report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricKind>,
    pub message: String,
}

impl Warning {
    pub fn insufficient_history(outlet_id: &str) -> Self {
        Self {
            kind: WarningKind::InsufficientHistory,
            outlet_id: Some(outlet_id.to_string()),
            scope: None,
            metric: None,
            message: "no pre-campaign baseline; excluded from behavior and decay axes".to_string(),
        }
    }

    /// Warnings a finished comparison implies.
    pub fn for_comparison(comparison: &ComparisonResult, min_sample_size: usize) -> Vec<Self> {
        let mut warnings = Vec::new();
        if comparison.low_confidence {
            warnings.push(Self {
                kind: WarningKind::LowConfidence,
                outlet_id: None,
                scope: Some(comparison.scope.to_string()),
                metric: Some(comparison.metric),
                message: format!(
                    "sample sizes test={} control={} below minimum {}",
                    comparison.test_sample_size, comparison.control_sample_size, min_sample_size
                ),
            });
        }
        if comparison.lift == Lift::New {
            warnings.push(Self {
                kind: WarningKind::ZeroBaseline,
                outlet_id: None,
                scope: Some(comparison.scope.to_string()),
                metric: Some(comparison.metric),
                message: "control value is zero; lift reported as new".to_string(),
            });
        }
        warnings
    }
}
