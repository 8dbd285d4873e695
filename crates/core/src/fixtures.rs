//! Test-fixture builder producing raw outlet-period streams with controlled
//! properties. Compiled only with the `test-fixtures` feature.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::config::CampaignWindow;
use crate::input::{from_values, RawLine};
use crate::types::Group;

#[derive(Debug, Clone, Default)]
struct PeriodFixture {
    exposed: bool,
    redeemed: bool,
    revenue: f64,
    orders: u64,
    category: Option<String>,
}

/// One outlet's synthetic history.
#[derive(Debug, Clone)]
pub struct OutletFixture {
    id: String,
    segment: String,
    group: Option<Group>,
    periods: BTreeMap<i64, PeriodFixture>,
}

impl OutletFixture {
    pub fn new(id: &str, segment: &str) -> Self {
        Self {
            id: id.to_string(),
            segment: segment.to_string(),
            group: None,
            periods: BTreeMap::new(),
        }
    }

    pub fn test(mut self) -> Self {
        self.group = Some(Group::Test);
        self
    }

    pub fn control(mut self) -> Self {
        self.group = Some(Group::Control);
        self
    }

    /// Record a purchase period. Creates the period if needed.
    pub fn sale(mut self, period: i64, revenue: f64, orders: u64) -> Self {
        let entry = self.periods.entry(period).or_default();
        entry.revenue = revenue;
        entry.orders = orders;
        self
    }

    /// Same revenue and orders for every period in `start..=end`.
    pub fn sales(mut self, start: i64, end: i64, revenue: f64, orders: u64) -> Self {
        for period in start..=end {
            self = self.sale(period, revenue, orders);
        }
        self
    }

    /// A period with a record but no purchases.
    pub fn idle(mut self, period: i64) -> Self {
        self.periods.entry(period).or_default();
        self
    }

    pub fn idle_range(mut self, start: i64, end: i64) -> Self {
        for period in start..=end {
            self = self.idle(period);
        }
        self
    }

    pub fn exposed(mut self, period: i64) -> Self {
        self.periods.entry(period).or_default().exposed = true;
        self
    }

    pub fn redeemed(mut self, period: i64) -> Self {
        self.periods.entry(period).or_default().redeemed = true;
        self
    }

    pub fn category(mut self, period: i64, category: &str) -> Self {
        self.periods.entry(period).or_default().category = Some(category.to_string());
        self
    }

    fn to_values(&self) -> Vec<Value> {
        self.periods
            .iter()
            .map(|(period, p)| {
                let mut value = json!({
                    "outlet_id": self.id,
                    "period": period,
                    "segment": self.segment,
                    "exposed": p.exposed,
                    "redeemed": p.redeemed,
                    "revenue": p.revenue,
                    "orders": p.orders,
                });
                if let Some(group) = self.group {
                    value["group"] = serde_json::to_value(group).unwrap_or(Value::Null);
                }
                if let Some(category) = &p.category {
                    value["category"] = json!(category);
                }
                value
            })
            .collect()
    }
}

/// Collects outlet fixtures into a raw input stream.
#[derive(Debug, Clone, Default)]
pub struct FixtureBuilder {
    outlets: Vec<OutletFixture>,
    extra: Vec<Value>,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outlet(mut self, outlet: OutletFixture) -> Self {
        self.outlets.push(outlet);
        self
    }

    pub fn outlets(mut self, outlets: impl IntoIterator<Item = OutletFixture>) -> Self {
        self.outlets.extend(outlets);
        self
    }

    /// Append a hand-written raw record, e.g. a deliberately malformed one.
    pub fn raw(mut self, value: Value) -> Self {
        self.extra.push(value);
        self
    }

    /// A mixed population: test outlets exposed during the campaign with a
    /// random response shape, and unexposed control outlets with flat sales.
    pub fn random_population(
        mut self,
        seed: u64,
        count: usize,
        segments: &[&str],
        window: &CampaignWindow,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        for i in 0..count {
            let segment = segments[i % segments.len().max(1)];
            let id = format!("outlet-{i:04}");
            let baseline = rng.gen_range(50.0..500.0_f64).round();
            let is_test = rng.gen_bool(0.6);
            let mut outlet = OutletFixture::new(&id, segment);
            outlet = if is_test { outlet.test() } else { outlet.control() };

            if rng.gen_bool(0.1) {
                // no baseline history at all
            } else if rng.gen_bool(0.15) {
                outlet = outlet.idle_range(window.pre.start, window.pre.end);
            } else {
                outlet = outlet.sales(window.pre.start, window.pre.end, baseline, rng.gen_range(1..4));
            }

            let uplift = if is_test { rng.gen_range(0.7..1.8) } else { rng.gen_range(0.9..1.1) };
            for period in window.during.periods() {
                let revenue = (baseline * uplift).round();
                if rng.gen_bool(0.85) {
                    outlet = outlet.sale(period, revenue, rng.gen_range(0..4));
                } else {
                    outlet = outlet.idle(period);
                }
                if is_test && rng.gen_bool(0.7) {
                    outlet = outlet.exposed(period);
                    if rng.gen_bool(0.4) {
                        outlet = outlet.redeemed(period);
                    }
                }
            }
            let carry = rng.gen_range(0.6..1.5);
            for period in window.post.periods() {
                outlet = outlet.sale(period, (baseline * carry).round(), rng.gen_range(0..3));
            }
            self.outlets.push(outlet);
        }
        self
    }

    pub fn build_values(&self) -> Vec<Value> {
        let mut values: Vec<Value> = self.outlets.iter().flat_map(|o| o.to_values()).collect();
        values.extend(self.extra.iter().cloned());
        values
    }

    pub fn build_lines(&self) -> Vec<RawLine> {
        from_values(self.build_values())
    }

    /// Same records in a seeded random order.
    pub fn build_shuffled(&self, seed: u64) -> Vec<RawLine> {
        let mut values = self.build_values();
        values.shuffle(&mut StdRng::seed_from_u64(seed));
        from_values(values)
    }

    /// The stream as JSON Lines text.
    pub fn build_jsonl(&self) -> String {
        self.build_values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
