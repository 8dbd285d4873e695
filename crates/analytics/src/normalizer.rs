//! Record normalizer — validates raw outlet-period objects into typed
//! records and groups them into per-outlet histories.

use impact_core::input::RawLine;
use impact_core::types::{Group, Outlet, OutletPeriodRecord, RecordRejection, RejectionKind};
use impact_core::CampaignWindow;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{info, warn};

const OUTLET_ID: &[&str] = &["outlet_id", "outletId", "outlet"];
const PERIOD: &[&str] = &["period", "week"];
const EXPOSED: &[&str] = &["exposed", "is_exposed", "reached"];
const REDEEMED: &[&str] = &["redeemed", "redemption"];
const REVENUE: &[&str] = &["revenue", "sales"];
const ORDERS: &[&str] = &["orders", "order_count"];
const SEGMENT: &[&str] = &["segment", "segments"];
const CATEGORY: &[&str] = &["category", "product_category"];
const GROUP: &[&str] = &["group"];

/// Validated input, grouped per outlet.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    /// Sorted by outlet id.
    pub outlets: Vec<Outlet>,
    /// In input order.
    pub rejected: Vec<RecordRejection>,
    pub records_read: usize,
}

impl NormalizedBatch {
    pub fn contains(&self, outlet_id: &str) -> bool {
        self.outlets
            .binary_search_by(|o| o.id.as_str().cmp(outlet_id))
            .is_ok()
    }

    pub fn record_count(&self) -> usize {
        self.outlets.iter().map(|o| o.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.outlets.is_empty()
    }
}

/// A field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldError {
    field: &'static str,
    reason: String,
}

impl FieldError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub struct RecordNormalizer<'a> {
    window: &'a CampaignWindow,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(window: &'a CampaignWindow) -> Self {
        Self { window }
    }

    /// Validate every line. Bad records are rejected individually and the
    /// rest of the batch continues.
    pub fn normalize(&self, lines: &[RawLine]) -> NormalizedBatch {
        let mut rejected = Vec::new();
        let mut seen: HashSet<(String, i64)> = HashSet::new();
        let mut by_outlet: BTreeMap<String, Vec<(usize, OutletPeriodRecord)>> = BTreeMap::new();

        for raw in lines {
            let value = match &raw.parsed {
                Ok(value) => value,
                Err(e) => {
                    rejected.push(RecordRejection {
                        line: raw.line,
                        outlet_id: None,
                        kind: RejectionKind::MalformedRecord,
                        field: "<json>".to_string(),
                        reason: e.clone(),
                    });
                    continue;
                }
            };

            match self.parse_record(value) {
                Ok(record) => {
                    if !seen.insert((record.outlet_id.clone(), record.period)) {
                        rejected.push(RecordRejection {
                            line: raw.line,
                            outlet_id: Some(record.outlet_id.clone()),
                            kind: RejectionKind::DuplicateRecord,
                            field: "period".to_string(),
                            reason: format!(
                                "duplicate record for outlet '{}' period {}",
                                record.outlet_id, record.period
                            ),
                        });
                        continue;
                    }
                    by_outlet
                        .entry(record.outlet_id.clone())
                        .or_default()
                        .push((raw.line, record));
                }
                Err((outlet_id, err)) => rejected.push(RecordRejection {
                    line: raw.line,
                    outlet_id,
                    kind: RejectionKind::MalformedRecord,
                    field: err.field.to_string(),
                    reason: err.reason,
                }),
            }
        }

        let mut outlets = Vec::with_capacity(by_outlet.len());
        for (outlet_id, records) in by_outlet {
            match build_outlet(outlet_id, records, self.window) {
                Ok(outlet) => outlets.push(outlet),
                Err(mut group_conflicts) => rejected.append(&mut group_conflicts),
            }
        }
        rejected.sort_by_key(|r| r.line);

        if !rejected.is_empty() {
            metrics::counter!("impact.records.rejected").increment(rejected.len() as u64);
            warn!(
                rejected = rejected.len(),
                read = lines.len(),
                "Records rejected during normalization"
            );
        }
        info!(
            outlets = outlets.len(),
            read = lines.len(),
            rejected = rejected.len(),
            "Normalization complete"
        );

        NormalizedBatch {
            outlets,
            rejected,
            records_read: lines.len(),
        }
    }

    fn parse_record(
        &self,
        value: &Value,
    ) -> Result<OutletPeriodRecord, (Option<String>, FieldError)> {
        let obj = value.as_object().ok_or_else(|| {
            (
                None,
                FieldError::new("<record>", "record must be a JSON object"),
            )
        })?;

        let outlet_id = parse_outlet_id(obj).map_err(|e| (None, e))?;
        let with_id = |e: FieldError| (Some(outlet_id.clone()), e);

        let period = parse_period(obj).map_err(with_id)?;
        if self.window.phase_of(period).is_none() {
            return Err(with_id(FieldError::new(
                "period",
                format!("period {period} is outside the configured campaign window"),
            )));
        }

        Ok(OutletPeriodRecord {
            period,
            exposed: parse_flag(obj, "exposed", EXPOSED).map_err(with_id)?,
            redeemed: parse_flag(obj, "redeemed", REDEEMED).map_err(with_id)?,
            revenue: parse_revenue(obj).map_err(with_id)?,
            orders: parse_orders(obj).map_err(with_id)?,
            segments: parse_segments(obj).map_err(with_id)?,
            category: parse_optional_string(obj, "category", CATEGORY).map_err(with_id)?,
            group: parse_group(obj).map_err(with_id)?,
            outlet_id,
        })
    }
}

/// Convenience wrapper around [`RecordNormalizer`].
pub fn normalize(lines: &[RawLine], window: &CampaignWindow) -> NormalizedBatch {
    RecordNormalizer::new(window).normalize(lines)
}

fn build_outlet(
    outlet_id: String,
    mut records: Vec<(usize, OutletPeriodRecord)>,
    window: &CampaignWindow,
) -> Result<Outlet, Vec<RecordRejection>> {
    let explicit: BTreeSet<Group> = records.iter().filter_map(|(_, r)| r.group).collect();
    if explicit.len() > 1 {
        return Err(records
            .into_iter()
            .map(|(line, _)| RecordRejection {
                line,
                outlet_id: Some(outlet_id.clone()),
                kind: RejectionKind::MalformedRecord,
                field: "group".to_string(),
                reason: format!("outlet '{outlet_id}' has conflicting group assignments"),
            })
            .collect());
    }

    // Outlets not exposed during the campaign fall back to control unless assigned.
    let group = explicit.into_iter().next().unwrap_or_else(|| {
        if records
            .iter()
            .any(|(_, r)| r.exposed && window.during.contains(r.period))
        {
            Group::Test
        } else {
            Group::Control
        }
    });

    records.sort_by_key(|(_, r)| r.period);
    let segments: BTreeSet<String> = records
        .iter()
        .flat_map(|(_, r)| r.segments.iter().cloned())
        .collect();

    Ok(Outlet {
        id: outlet_id,
        segments: segments.into_iter().collect(),
        group,
        records: records.into_iter().map(|(_, r)| r).collect(),
    })
}

fn field<'v>(obj: &'v Map<String, Value>, names: &[&str]) -> Option<&'v Value> {
    names
        .iter()
        .find_map(|name| obj.get(*name))
        .filter(|v| !v.is_null())
}

fn parse_outlet_id(obj: &Map<String, Value>) -> Result<String, FieldError> {
    match field(obj, OUTLET_ID) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(FieldError::new("outlet_id", "must be a non-empty string")),
        None => Err(FieldError::new("outlet_id", "missing")),
    }
}

fn parse_period(obj: &Map<String, Value>) -> Result<i64, FieldError> {
    match field(obj, PERIOD) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| FieldError::new("period", format!("{n} is not an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| FieldError::new("period", format!("'{s}' is not an integer"))),
        Some(other) => Err(FieldError::new(
            "period",
            format!("expected an integer, got {other}"),
        )),
        None => Err(FieldError::new("period", "missing")),
    }
}

fn parse_flag(
    obj: &Map<String, Value>,
    name: &'static str,
    aliases: &[&str],
) -> Result<bool, FieldError> {
    let value = field(obj, aliases).ok_or_else(|| FieldError::new(name, "missing"))?;
    coerce_bool(value)
        .ok_or_else(|| FieldError::new(name, format!("{value} is not boolean-coercible")))
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 => Some(false),
            Some(v) if v == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_revenue(obj: &Map<String, Value>) -> Result<f64, FieldError> {
    let revenue = match field(obj, REVENUE) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
        None => return Err(FieldError::new("revenue", "missing")),
    }
    .ok_or_else(|| FieldError::new("revenue", "must be a decimal number"))?;

    if !revenue.is_finite() {
        return Err(FieldError::new("revenue", "must be finite"));
    }
    if revenue < 0.0 {
        return Err(FieldError::new(
            "revenue",
            format!("must be non-negative, got {revenue}"),
        ));
    }
    Ok(revenue)
}

fn parse_orders(obj: &Map<String, Value>) -> Result<u64, FieldError> {
    let text = match field(obj, ORDERS) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(FieldError::new("orders", "must be an integer")),
        None => return Err(FieldError::new("orders", "missing")),
    };

    match text.parse::<u64>() {
        Ok(orders) => Ok(orders),
        Err(_) if text.parse::<i64>().is_ok() => Err(FieldError::new(
            "orders",
            format!("must be non-negative, got {text}"),
        )),
        Err(_) => Err(FieldError::new("orders", format!("'{text}' is not an integer"))),
    }
}

fn parse_segments(obj: &Map<String, Value>) -> Result<Vec<String>, FieldError> {
    let segments = match field(obj, SEGMENT) {
        Some(Value::String(s)) => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| FieldError::new("segment", "segment tags must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(FieldError::new(
                "segment",
                "must be a string or an array of strings",
            ))
        }
        None => return Err(FieldError::new("segment", "missing")),
    };

    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(FieldError::new("segment", "segment tags must be non-empty"));
    }
    Ok(segments)
}

fn parse_optional_string(
    obj: &Map<String, Value>,
    name: &'static str,
    aliases: &[&str],
) -> Result<Option<String>, FieldError> {
    match field(obj, aliases) {
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(FieldError::new(name, "must be a string")),
        None => Ok(None),
    }
}

fn parse_group(obj: &Map<String, Value>) -> Result<Option<Group>, FieldError> {
    match parse_optional_string(obj, "group", GROUP)? {
        None => Ok(None),
        Some(s) => match s.to_ascii_lowercase().as_str() {
            "test" => Ok(Some(Group::Test)),
            "control" => Ok(Some(Group::Control)),
            _ => Err(FieldError::new(
                "group",
                format!("'{s}' is not one of test, control"),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impact_core::input::{from_values, read_json_lines};
    use serde_json::json;

    fn record(outlet: &str, period: i64) -> Value {
        json!({
            "outlet_id": outlet,
            "period": period,
            "segment": "Urban",
            "exposed": false,
            "redeemed": false,
            "revenue": 10.0,
            "orders": 1
        })
    }

    #[test]
    fn test_valid_records_grouped_by_outlet() {
        let lines = from_values(vec![record("b", 1), record("a", 2), record("a", -1)]);
        let batch = normalize(&lines, &CampaignWindow::default());
        assert!(batch.rejected.is_empty());
        assert_eq!(batch.outlets.len(), 2);
        assert_eq!(batch.outlets[0].id, "a");
        assert_eq!(batch.outlets[0].records[0].period, -1);
        assert_eq!(batch.outlets[0].group, Group::Control);
        assert!(batch.contains("b"));
        assert!(!batch.contains("c"));
    }

    #[test]
    fn test_aliases_and_coercion() {
        let lines = from_values(vec![json!({
            "outletId": "x-1",
            "week": "2",
            "is_exposed": "yes",
            "redemption": 0,
            "sales": "125.50",
            "order_count": 3,
            "segments": ["Urban", "Loyalty"],
            "product_category": "Premium"
        })]);
        let batch = normalize(&lines, &CampaignWindow::default());
        assert!(batch.rejected.is_empty(), "{:?}", batch.rejected);
        let outlet = &batch.outlets[0];
        let r = &outlet.records[0];
        assert_eq!(r.period, 2);
        assert!(r.exposed);
        assert!(!r.redeemed);
        assert_eq!(r.revenue, 125.5);
        assert_eq!(r.orders, 3);
        assert_eq!(r.category.as_deref(), Some("Premium"));
        assert_eq!(outlet.segments, vec!["Loyalty".to_string(), "Urban".to_string()]);
        assert_eq!(outlet.group, Group::Test);
    }

    #[test]
    fn test_malformed_records_rejected_individually() {
        let mut negative = record("a", 0);
        negative["revenue"] = json!(-5.0);
        let mut bad_flag = record("b", 0);
        bad_flag["exposed"] = json!("maybe");
        let mut outside = record("c", 0);
        outside["period"] = json!(99);
        let mut fractional = record("d", 0);
        fractional["period"] = json!(1.5);
        let mut negative_orders = record("e", 0);
        negative_orders["orders"] = json!(-1);

        let lines = from_values(vec![
            negative,
            bad_flag,
            outside,
            fractional,
            negative_orders,
            record("ok", 0),
        ]);
        let batch = normalize(&lines, &CampaignWindow::default());

        assert_eq!(batch.outlets.len(), 1);
        assert_eq!(batch.rejected.len(), 5);
        let fields: Vec<&str> = batch.rejected.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, vec!["revenue", "exposed", "period", "period", "orders"]);
        assert!(batch
            .rejected
            .iter()
            .all(|r| r.kind == RejectionKind::MalformedRecord));
        assert_eq!(batch.rejected[0].outlet_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_duplicate_outlet_period_rejected() {
        let mut dup = record("a", 0);
        dup["revenue"] = json!(999.0);
        let lines = from_values(vec![record("a", 0), dup]);
        let batch = normalize(&lines, &CampaignWindow::default());
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].kind, RejectionKind::DuplicateRecord);
        assert_eq!(batch.rejected[0].line, 2);
        assert_eq!(batch.outlets[0].records[0].revenue, 10.0);
    }

    #[test]
    fn test_conflicting_groups_reject_outlet() {
        let mut a0 = record("a", 0);
        a0["group"] = json!("test");
        let mut a1 = record("a", 1);
        a1["group"] = json!("control");
        let lines = from_values(vec![a0, a1, record("b", 0)]);
        let batch = normalize(&lines, &CampaignWindow::default());
        assert_eq!(batch.outlets.len(), 1);
        assert_eq!(batch.rejected.len(), 2);
        assert!(batch.rejected.iter().all(|r| r.field == "group"));
    }

    #[test]
    fn test_explicit_group_overrides_exposure_default() {
        let mut a0 = record("a", 0);
        a0["group"] = json!("test");
        let lines = from_values(vec![a0]);
        let batch = normalize(&lines, &CampaignWindow::default());
        assert_eq!(batch.outlets[0].group, Group::Test);
    }

    #[test]
    fn test_exposure_outside_campaign_leaves_outlet_in_control() {
        let mut pre = record("a", -2);
        pre["exposed"] = json!(true);
        let mut post = record("a", 5);
        post["exposed"] = json!(true);
        let mut during = record("b", 1);
        during["exposed"] = json!(true);
        let lines = from_values(vec![pre, record("a", 1), post, during]);
        let batch = normalize(&lines, &CampaignWindow::default());
        assert_eq!(batch.outlets[0].group, Group::Control);
        assert_eq!(batch.outlets[1].group, Group::Test);
        assert_eq!(batch.record_count(), 4);
    }

    #[test]
    fn test_unparseable_line_is_audited() {
        let lines = read_json_lines("{oops\n".as_bytes()).unwrap();
        let batch = normalize(&lines, &CampaignWindow::default());
        assert!(batch.is_empty());
        assert_eq!(batch.rejected[0].field, "<json>");
        assert_eq!(batch.rejected[0].outlet_id, None);
    }
}
