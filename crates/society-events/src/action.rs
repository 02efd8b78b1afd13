//! Action Vocabulary
//!
//! The actions an agent can choose each tick and the kinds of social
//! interaction those actions produce.

use serde::{Deserialize, Serialize};

/// Number of real actions the decision engine chooses between.
pub const PRIMARY_ACTION_COUNT: usize = 14;

/// Number of action columns including the illicit pseudo-actions.
pub const ACTION_COUNT: usize = 16;

/// An action an agent can select.
///
/// The declaration order is the column order of every Q-table and every
/// network output layer, so it must never be rearranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Eat,
    Work,
    Rest,
    Mate,
    Search,
    PlantFood,
    HarvestFood,
    GiftFood,
    GiftMoney,
    Invest,
    BuyFood,
    SellFood,
    TradeFoodForMoney,
    TradeMoneyForFood,
    /// Harvest a yielding farm planted by someone else
    StealCrops,
    /// Trade money for food while short-changing the partner
    ScamTrade,
}

impl ActionKind {
    /// Returns all actions in column order.
    pub fn all() -> &'static [ActionKind; ACTION_COUNT] {
        &[
            ActionKind::Eat,
            ActionKind::Work,
            ActionKind::Rest,
            ActionKind::Mate,
            ActionKind::Search,
            ActionKind::PlantFood,
            ActionKind::HarvestFood,
            ActionKind::GiftFood,
            ActionKind::GiftMoney,
            ActionKind::Invest,
            ActionKind::BuyFood,
            ActionKind::SellFood,
            ActionKind::TradeFoodForMoney,
            ActionKind::TradeMoneyForFood,
            ActionKind::StealCrops,
            ActionKind::ScamTrade,
        ]
    }

    /// Column index of this action.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Action for a column index, if in range.
    pub fn from_index(index: usize) -> Option<ActionKind> {
        Self::all().get(index).copied()
    }

    /// Stable kebab-case name, used in metrics and logs.
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Eat => "eat",
            ActionKind::Work => "work",
            ActionKind::Rest => "rest",
            ActionKind::Mate => "mate",
            ActionKind::Search => "search",
            ActionKind::PlantFood => "plant-food",
            ActionKind::HarvestFood => "harvest-food",
            ActionKind::GiftFood => "gift-food",
            ActionKind::GiftMoney => "gift-money",
            ActionKind::Invest => "invest",
            ActionKind::BuyFood => "buy-food",
            ActionKind::SellFood => "sell-food",
            ActionKind::TradeFoodForMoney => "trade-food-for-money",
            ActionKind::TradeMoneyForFood => "trade-money-for-food",
            ActionKind::StealCrops => "steal-crops",
            ActionKind::ScamTrade => "scam-trade",
        }
    }

    /// Pseudo-actions exist only as illicit variants of real ones.
    pub fn is_pseudo(self) -> bool {
        matches!(self, ActionKind::StealCrops | ActionKind::ScamTrade)
    }

    /// Actions that target another agent rather than a farm or workplace.
    pub fn targets_agent(self) -> bool {
        matches!(
            self,
            ActionKind::Mate
                | ActionKind::GiftFood
                | ActionKind::GiftMoney
                | ActionKind::TradeFoodForMoney
                | ActionKind::TradeMoneyForFood
                | ActionKind::ScamTrade
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of social interaction recorded between two agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Gift,
    Trade,
    Mate,
    Work,
    Invest,
    Violence,
    Theft,
    ScamTrade,
    WorkSabotage,
    InvestmentFraud,
}

impl InteractionKind {
    /// Base (trust, affinity) magnitude applied when this interaction happens.
    pub fn modifiers(self) -> (f32, f32) {
        match self {
            InteractionKind::Gift => (0.2, 0.15),
            InteractionKind::Trade => (0.1, 0.05),
            InteractionKind::Mate => (0.3, 0.4),
            InteractionKind::Work => (0.1, 0.05),
            InteractionKind::Invest => (0.2, 0.1),
            InteractionKind::Violence => (0.4, 0.5),
            InteractionKind::Theft => (0.3, 0.2),
            InteractionKind::ScamTrade => (0.3, 0.2),
            InteractionKind::WorkSabotage => (0.25, 0.15),
            InteractionKind::InvestmentFraud => (0.35, 0.25),
        }
    }

    /// Antisocial interactions always lower trust and trigger gossip.
    pub fn is_antisocial(self) -> bool {
        matches!(
            self,
            InteractionKind::Violence
                | InteractionKind::Theft
                | InteractionKind::ScamTrade
                | InteractionKind::WorkSabotage
                | InteractionKind::InvestmentFraud
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            InteractionKind::Gift => "gift",
            InteractionKind::Trade => "trade",
            InteractionKind::Mate => "mate",
            InteractionKind::Work => "work",
            InteractionKind::Invest => "invest",
            InteractionKind::Violence => "violence",
            InteractionKind::Theft => "theft",
            InteractionKind::ScamTrade => "scam_trade",
            InteractionKind::WorkSabotage => "work_sabotage",
            InteractionKind::InvestmentFraud => "investment_fraud",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_index_roundtrip_covers_all_columns() {
        for (i, action) in ActionKind::all().iter().enumerate() {
            assert_eq!(action.index(), i);
            assert_eq!(ActionKind::from_index(i), Some(*action));
        }
        assert_eq!(ActionKind::from_index(ACTION_COUNT), None);
    }

    #[test]
    fn test_action_serialization_uses_kebab_names() {
        assert_eq!(
            serde_json::to_string(&ActionKind::TradeFoodForMoney).unwrap(),
            r#""trade-food-for-money""#
        );
        assert_eq!(serde_json::to_string(&ActionKind::StealCrops).unwrap(), r#""steal-crops""#);
        for action in ActionKind::all() {
            let json = serde_json::to_string(action).unwrap();
            assert_eq!(json.trim_matches('"'), action.name());
        }
    }

    #[test]
    fn test_pseudo_actions_follow_primary_actions() {
        let pseudo: Vec<usize> = ActionKind::all()
            .iter()
            .filter(|a| a.is_pseudo())
            .map(|a| a.index())
            .collect();
        assert_eq!(pseudo, vec![PRIMARY_ACTION_COUNT, PRIMARY_ACTION_COUNT + 1]);
    }

    #[test]
    fn test_antisocial_interactions() {
        assert!(InteractionKind::Theft.is_antisocial());
        assert!(InteractionKind::InvestmentFraud.is_antisocial());
        assert!(!InteractionKind::Gift.is_antisocial());
        assert!(!InteractionKind::Mate.is_antisocial());
        assert_eq!(
            serde_json::to_string(&InteractionKind::WorkSabotage).unwrap(),
            r#""work_sabotage""#
        );
    }
}
