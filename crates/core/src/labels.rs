//! Scenario labels — four independent classification axes.

use serde::Serialize;

/// A closed set of labels on one classification axis.
pub trait Scenario: Copy + Eq + Ord + 'static {
    /// Axis name as used in the report.
    const AXIS: &'static str;

    /// Every label, in report order.
    fn all() -> &'static [Self];

    fn as_str(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExposureScenario {
    ReachedEngaged,
    ReachedNotEngaged,
    NotReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BehaviorScenario {
    NewActivation,
    Reactivation,
    Upsell,
    CrossSell,
    NoChange,
    DropOff,
}

impl BehaviorScenario {
    /// Collapse to the increased/not-increased flag used by the redemption axis.
    pub fn is_increase(&self) -> bool {
        matches!(
            self,
            BehaviorScenario::NewActivation
                | BehaviorScenario::Reactivation
                | BehaviorScenario::Upsell
                | BehaviorScenario::CrossSell
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedemptionScenario {
    RedeemedIncreased,
    RedeemedOnly,
    NoRedeemIncreased,
    NoRedeemNoChange,
}

impl RedemptionScenario {
    pub fn from_flags(redeemed: bool, increased: bool) -> Self {
        match (redeemed, increased) {
            (true, true) => RedemptionScenario::RedeemedIncreased,
            (true, false) => RedemptionScenario::RedeemedOnly,
            (false, true) => RedemptionScenario::NoRedeemIncreased,
            (false, false) => RedemptionScenario::NoRedeemNoChange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecayScenario {
    ImmediateSpike,
    SustainedGrowth,
    DelayedImpact,
    NoEffect,
}

impl Scenario for ExposureScenario {
    const AXIS: &'static str = "exposure";

    fn all() -> &'static [Self] {
        &[
            ExposureScenario::ReachedEngaged,
            ExposureScenario::ReachedNotEngaged,
            ExposureScenario::NotReached,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            ExposureScenario::ReachedEngaged => "reached-engaged",
            ExposureScenario::ReachedNotEngaged => "reached-not-engaged",
            ExposureScenario::NotReached => "not-reached",
        }
    }
}

impl Scenario for BehaviorScenario {
    const AXIS: &'static str = "behavior";

    fn all() -> &'static [Self] {
        &[
            BehaviorScenario::NewActivation,
            BehaviorScenario::Reactivation,
            BehaviorScenario::Upsell,
            BehaviorScenario::CrossSell,
            BehaviorScenario::NoChange,
            BehaviorScenario::DropOff,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            BehaviorScenario::NewActivation => "new-activation",
            BehaviorScenario::Reactivation => "reactivation",
            BehaviorScenario::Upsell => "upsell",
            BehaviorScenario::CrossSell => "cross-sell",
            BehaviorScenario::NoChange => "no-change",
            BehaviorScenario::DropOff => "drop-off",
        }
    }
}

impl Scenario for RedemptionScenario {
    const AXIS: &'static str = "redemption";

    fn all() -> &'static [Self] {
        &[
            RedemptionScenario::RedeemedIncreased,
            RedemptionScenario::RedeemedOnly,
            RedemptionScenario::NoRedeemIncreased,
            RedemptionScenario::NoRedeemNoChange,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            RedemptionScenario::RedeemedIncreased => "redeemed-increased",
            RedemptionScenario::RedeemedOnly => "redeemed-only",
            RedemptionScenario::NoRedeemIncreased => "no-redeem-increased",
            RedemptionScenario::NoRedeemNoChange => "no-redeem-no-change",
        }
    }
}

impl Scenario for DecayScenario {
    const AXIS: &'static str = "decay";

    fn all() -> &'static [Self] {
        &[
            DecayScenario::ImmediateSpike,
            DecayScenario::SustainedGrowth,
            DecayScenario::DelayedImpact,
            DecayScenario::NoEffect,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            DecayScenario::ImmediateSpike => "immediate-spike",
            DecayScenario::SustainedGrowth => "sustained-growth",
            DecayScenario::DelayedImpact => "delayed-impact",
            DecayScenario::NoEffect => "no-effect",
        }
    }
}

/// Any label on any axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "axis", content = "label", rename_all = "snake_case")]
pub enum ScenarioLabel {
    Exposure(ExposureScenario),
    Behavior(BehaviorScenario),
    Redemption(RedemptionScenario),
    Decay(DecayScenario),
}

impl ScenarioLabel {
    pub fn axis(&self) -> &'static str {
        match self {
            ScenarioLabel::Exposure(_) => ExposureScenario::AXIS,
            ScenarioLabel::Behavior(_) => BehaviorScenario::AXIS,
            ScenarioLabel::Redemption(_) => RedemptionScenario::AXIS,
            ScenarioLabel::Decay(_) => DecayScenario::AXIS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioLabel::Exposure(s) => s.as_str(),
            ScenarioLabel::Behavior(s) => s.as_str(),
            ScenarioLabel::Redemption(s) => s.as_str(),
            ScenarioLabel::Decay(s) => s.as_str(),
        }
    }
}

/// The labels one outlet carries; at most one per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutletLabels {
    pub exposure: ExposureScenario,
    pub behavior: Option<BehaviorScenario>,
    pub redemption: Option<RedemptionScenario>,
    pub decay: Option<DecayScenario>,
}

impl OutletLabels {
    pub fn labels(&self) -> Vec<ScenarioLabel> {
        let mut labels = vec![ScenarioLabel::Exposure(self.exposure)];
        labels.extend(self.behavior.map(ScenarioLabel::Behavior));
        labels.extend(self.redemption.map(ScenarioLabel::Redemption));
        labels.extend(self.decay.map(ScenarioLabel::Decay));
        labels
    }
}
