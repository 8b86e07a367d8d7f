//! Market-filtered views and index translation
//!
//! A view is recomputed from canonical state on every call. Positions in a
//! view are translated back by id, so a translation always lands on the
//! entity the caller saw, or on nothing.

use super::{Collection, DataStore};
use crate::models::{Entity, EntityId, MarketScoped, PricePivotList, Prediction};

/// Items whose market matches `selection`; everything when unselected
pub fn filtered<T>(collection: &Collection<T>, selection: Option<EntityId>) -> Vec<T>
where
    T: Entity + MarketScoped + Clone,
{
    match selection {
        None => collection.snapshot(),
        Some(market_id) => collection.filter(|item| item.market_id() == Some(market_id)),
    }
}

/// Canonical index of the item at `position` in the filtered view
pub fn translate_index<T>(
    collection: &Collection<T>,
    selection: Option<EntityId>,
    position: usize,
) -> Option<usize>
where
    T: Entity + MarketScoped + Clone,
{
    let view = filtered(collection, selection);
    let id = view.get(position)?.id();
    collection.index_of_id(id)
}

impl DataStore {
    pub fn filtered_pivot_lists(&self) -> Vec<PricePivotList> {
        filtered(self.pivot_lists(), self.current_market_id())
    }

    pub fn filtered_predictions(&self) -> Vec<Prediction> {
        filtered(self.predictions(), self.current_market_id())
    }

    pub fn translate_filtered_pivot_list_index(&self, position: usize) -> Option<usize> {
        translate_index(self.pivot_lists(), self.current_market_id(), position)
    }

    pub fn translate_filtered_prediction_index(&self, position: usize) -> Option<usize> {
        translate_index(self.predictions(), self.current_market_id(), position)
    }

    pub fn filtered_pivot_list_at(&self, position: usize) -> Option<PricePivotList> {
        self.filtered_pivot_lists().into_iter().nth(position)
    }

    pub fn filtered_prediction_at(&self, position: usize) -> Option<Prediction> {
        self.filtered_predictions().into_iter().nth(position)
    }
}
