//! Redemption analyzer — redemption flag × sales-change flag.

use impact_core::labels::{BehaviorScenario, RedemptionScenario};
use impact_core::types::Outlet;
use impact_core::CampaignWindow;

/// Cross-tab label, or `None` when the outlet has no during-campaign record.
/// An outlet without a behavior label counts as not increased.
pub fn classify_redemption(
    outlet: &Outlet,
    window: &CampaignWindow,
    behavior: Option<BehaviorScenario>,
) -> Option<RedemptionScenario> {
    let mut during = outlet
        .records_between(window.during.start, window.during.end)
        .peekable();
    during.peek()?;

    let redeemed = during.any(|r| r.redeemed);
    let increased = behavior.map(|b| b.is_increase()).unwrap_or(false);
    Some(RedemptionScenario::from_flags(redeemed, increased))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use impact_core::fixtures::{FixtureBuilder, OutletFixture};

    fn outlet(fixture: OutletFixture) -> Outlet {
        let lines = FixtureBuilder::new().outlet(fixture).build_lines();
        normalize(&lines, &CampaignWindow::default()).outlets.remove(0)
    }

    #[test]
    fn test_four_buckets() {
        let window = CampaignWindow::default();
        let redeemer = outlet(OutletFixture::new("o", "A").sale(0, 10.0, 1).redeemed(0));
        let quiet = outlet(OutletFixture::new("o", "A").sale(0, 10.0, 1));

        assert_eq!(
            classify_redemption(&redeemer, &window, Some(BehaviorScenario::Upsell)),
            Some(RedemptionScenario::RedeemedIncreased)
        );
        assert_eq!(
            classify_redemption(&redeemer, &window, Some(BehaviorScenario::NoChange)),
            Some(RedemptionScenario::RedeemedOnly)
        );
        assert_eq!(
            classify_redemption(&quiet, &window, Some(BehaviorScenario::CrossSell)),
            Some(RedemptionScenario::NoRedeemIncreased)
        );
        assert_eq!(
            classify_redemption(&quiet, &window, Some(BehaviorScenario::DropOff)),
            Some(RedemptionScenario::NoRedeemNoChange)
        );
    }

    #[test]
    fn test_missing_behavior_is_not_increased() {
        let redeemer = outlet(OutletFixture::new("o", "A").sale(1, 10.0, 1).redeemed(1));
        assert_eq!(
            classify_redemption(&redeemer, &CampaignWindow::default(), None),
            Some(RedemptionScenario::RedeemedOnly)
        );
    }

    #[test]
    fn test_no_campaign_record_is_excluded() {
        let o = outlet(OutletFixture::new("o", "A").sales(-4, -1, 10.0, 1).sale(5, 10.0, 1));
        assert_eq!(
            classify_redemption(&o, &CampaignWindow::default(), Some(BehaviorScenario::NoChange)),
            None
        );
    }
}
