//! Domain entities
//!
//! Every mutable entity is a cheap clonable handle; clones observe the same
//! fields and the same notification toggle.

mod cell;
pub mod ids;
pub mod location;
pub mod market;
pub mod pivot;
pub mod prediction;

pub use ids::{EntityId, IdAllocator, IdAllocators};
pub use location::{BuiltinLocation, CustomLocation, LocationFields, LocationRecord, MarketLocation};
pub use market::{BuiltinMarket, CustomMarket, CustomMarketFields, Market, MarketRecord};
pub use pivot::{PivotEditor, PivotListFields, PivotListRecord, PivotView, PricePivot, PricePivotList};
pub use prediction::{
    CompletionOutcome, Prediction, PredictionFields, PredictionRecord, PredictionState, RunType,
};

/// Anything stored in a canonical collection; identity is the id
pub trait Entity {
    fn id(&self) -> EntityId;

    /// True if both refer to the same underlying entity, not merely the same id
    fn is_same(&self, other: &Self) -> bool;
}

/// Entities that the market selection filters on
pub trait MarketScoped {
    fn market_id(&self) -> Option<EntityId>;
}
