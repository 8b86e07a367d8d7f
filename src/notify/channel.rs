//! Channel kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of change categories a broadcast can announce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Sink that never delivers
    Disabled,

    // Individual entities
    Market,
    MarketLocation,
    Prediction,
    PivotList,
    /// One pivot inside an editor
    Pivot,

    // Canonical collections
    MarketList,
    MarketLocationList,
    PredictionList,
    PivotListList,

    // Store-wide selection
    MarketSelection,
}

impl Channel {
    pub const ALL: [Channel; 11] = [
        Channel::Disabled,
        Channel::Market,
        Channel::MarketLocation,
        Channel::Prediction,
        Channel::PivotList,
        Channel::Pivot,
        Channel::MarketList,
        Channel::MarketLocationList,
        Channel::PredictionList,
        Channel::PivotListList,
        Channel::MarketSelection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Disabled => "disabled",
            Channel::Market => "market",
            Channel::MarketLocation => "market_location",
            Channel::Prediction => "prediction",
            Channel::PivotList => "pivot_list",
            Channel::Pivot => "pivot",
            Channel::MarketList => "market_list",
            Channel::MarketLocationList => "market_location_list",
            Channel::PredictionList => "prediction_list",
            Channel::PivotListList => "pivot_list_list",
            Channel::MarketSelection => "market_selection",
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Channel::Disabled)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notify:{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = Channel::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), Channel::ALL.len());
    }

    #[test]
    fn test_display() {
        assert_eq!(Channel::PivotListList.to_string(), "notify:pivot_list_list");
        assert!(Channel::Disabled.is_disabled());
        assert!(!Channel::Market.is_disabled());
    }
}
