//! Canonical data store
//!
//! Owns the four entity collections, the id allocators and the market
//! selection. Every mutation broadcasts its list channel once; selection
//! changes broadcast [`Channel::MarketSelection`]. Subscribers re-query the
//! store (or the filtered views in [`filter`]) when told.

mod collection;
pub mod filter;
pub mod seed;

pub use collection::Collection;

use crate::error::{AppError, Result};
use crate::models::{
    BuiltinLocation, BuiltinMarket, CustomLocation, CustomMarket, CustomMarketFields, Entity, EntityId,
    IdAllocator, IdAllocators, LocationFields, Market, MarketLocation, PricePivotList, Prediction,
};
use crate::notify::{Channel, NotificationBus};
use parking_lot::RwLock;
use serde::Serialize;

/// How many stored entities reference a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MarketDependents {
    pub pivot_lists: usize,
    pub predictions: usize,
}

impl MarketDependents {
    pub fn total(&self) -> usize {
        self.pivot_lists + self.predictions
    }
}

pub struct DataStore {
    bus: NotificationBus,
    ids: IdAllocators,
    markets: Collection<Market>,
    locations: Collection<MarketLocation>,
    pivot_lists: Collection<PricePivotList>,
    predictions: Collection<Prediction>,
    current_market: RwLock<Option<Market>>,
}

impl DataStore {
    /// Built-in markets and locations, nothing else
    pub fn new(bus: &NotificationBus) -> Self {
        let markets = BuiltinMarket::all().into_iter().map(Market::from).collect();
        let locations = BuiltinLocation::all()
            .into_iter()
            .map(MarketLocation::from)
            .collect();

        Self {
            bus: bus.clone(),
            ids: IdAllocators::new(),
            markets: Collection::new(bus, Channel::MarketList, markets),
            locations: Collection::new(bus, Channel::MarketLocationList, locations),
            pivot_lists: Collection::new(bus, Channel::PivotListList, Vec::new()),
            predictions: Collection::new(bus, Channel::PredictionList, Vec::new()),
            current_market: RwLock::new(None),
        }
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn ids(&self) -> &IdAllocators {
        &self.ids
    }

    pub fn markets(&self) -> &Collection<Market> {
        &self.markets
    }

    pub fn locations(&self) -> &Collection<MarketLocation> {
        &self.locations
    }

    pub fn pivot_lists(&self) -> &Collection<PricePivotList> {
        &self.pivot_lists
    }

    pub fn predictions(&self) -> &Collection<Prediction> {
        &self.predictions
    }

    // ---- selection ----

    pub fn current_market(&self) -> Option<Market> {
        self.current_market.read().clone()
    }

    pub fn current_market_id(&self) -> Option<EntityId> {
        self.current_market.read().as_ref().map(Market::id)
    }

    /// Replace the selection and broadcast once
    pub fn set_current_market(&self, market: Option<Market>) {
        *self.current_market.write() = market;
        tracing::debug!("Market selection -> {:?}", self.current_market_id());
        self.bus.broadcast(Channel::MarketSelection);
    }

    /// Select by id; `None` clears the selection
    pub fn select_market_id(&self, id: Option<EntityId>) -> Result<()> {
        let market = match id {
            Some(id) => Some(
                self.markets
                    .by_id(id)
                    .ok_or_else(|| AppError::NotFound(format!("market {}", id)))?,
            ),
            None => None,
        };
        self.set_current_market(market);
        Ok(())
    }

    // ---- markets ----

    pub fn append_market(&self, market: Market) -> usize {
        self.markets.append(market)
    }

    /// Removes a custom market. A removed selection is cleared first.
    ///
    /// Selection subscribers may reshape the list before the removal; the
    /// market is found again by handle and `None` is returned if it is gone.
    pub fn remove_market_at(&self, index: usize) -> Result<Option<Market>> {
        let Some(market) = self.markets.get(index) else {
            return Ok(None);
        };
        if market.is_builtin() {
            return Err(read_only("market", &market.name()));
        }
        if self.current_market_id() == Some(market.id()) {
            self.set_current_market(None);
        }
        let dependents = self.market_dependents(market.id());
        if dependents.total() > 0 {
            tracing::warn!(
                "Removing market {} still referenced by {} pivot lists and {} predictions",
                market.id(),
                dependents.pivot_lists,
                dependents.predictions
            );
        }
        let removed = self.markets.remove_same(&market);
        if removed.is_none() {
            tracing::debug!("Market {} was removed while clearing the selection", market.id());
        }
        Ok(removed)
    }

    pub fn replace_market_at(&self, index: usize, market: Market) -> Result<Option<Market>> {
        match self.markets.get(index) {
            None => Ok(None),
            Some(existing) if existing.is_builtin() => Err(read_only("market", &existing.name())),
            Some(_) => Ok(self.markets.replace_at(index, market)),
        }
    }

    /// New custom market carrying the previewed id
    pub fn draft_market(&self, fields: CustomMarketFields) -> CustomMarket {
        CustomMarket::new(self.ids.markets.peek_next(), fields, &self.bus)
    }

    /// Replace in place if this handle is stored, otherwise assign and append
    pub fn commit_market(&self, market: CustomMarket) -> Result<usize> {
        self.commit(&self.markets, &self.ids.markets, Market::from(market))
    }

    // ---- locations ----

    pub fn append_location(&self, location: MarketLocation) -> usize {
        self.locations.append(location)
    }

    pub fn remove_location_at(&self, index: usize) -> Result<Option<MarketLocation>> {
        match self.locations.get(index) {
            None => Ok(None),
            Some(existing) if existing.is_builtin() => {
                Err(read_only("location", &existing.name()))
            }
            Some(_) => Ok(self.locations.remove_at(index)),
        }
    }

    pub fn replace_location_at(
        &self,
        index: usize,
        location: MarketLocation,
    ) -> Result<Option<MarketLocation>> {
        match self.locations.get(index) {
            None => Ok(None),
            Some(existing) if existing.is_builtin() => {
                Err(read_only("location", &existing.name()))
            }
            Some(_) => Ok(self.locations.replace_at(index, location)),
        }
    }

    pub fn draft_location(&self, fields: LocationFields) -> CustomLocation {
        CustomLocation::new(self.ids.locations.peek_next(), fields, &self.bus)
    }

    pub fn commit_location(&self, location: CustomLocation) -> Result<usize> {
        self.commit(
            &self.locations,
            &self.ids.locations,
            MarketLocation::from(location),
        )
    }

    // ---- pivot lists ----

    pub fn append_pivot_list(&self, list: PricePivotList) -> usize {
        self.pivot_lists.append(list)
    }

    pub fn remove_pivot_list_at(&self, index: usize) -> Option<PricePivotList> {
        self.pivot_lists.remove_at(index)
    }

    pub fn replace_pivot_list_at(&self, index: usize, list: PricePivotList) -> Option<PricePivotList> {
        self.pivot_lists.replace_at(index, list)
    }

    pub fn draft_pivot_list(&self, market_id: EntityId) -> PricePivotList {
        PricePivotList::new(self.ids.pivot_lists.peek_next(), market_id, &self.bus)
    }

    pub fn commit_pivot_list(&self, list: PricePivotList) -> Result<usize> {
        self.commit(&self.pivot_lists, &self.ids.pivot_lists, list)
    }

    // ---- predictions ----

    pub fn append_prediction(&self, prediction: Prediction) -> usize {
        self.predictions.append(prediction)
    }

    pub fn remove_prediction_at(&self, index: usize) -> Option<Prediction> {
        self.predictions.remove_at(index)
    }

    pub fn replace_prediction_at(&self, index: usize, prediction: Prediction) -> Option<Prediction> {
        self.predictions.replace_at(index, prediction)
    }

    pub fn draft_prediction(&self) -> Prediction {
        Prediction::new(self.ids.predictions.peek_next(), &self.bus)
    }

    pub fn commit_prediction(&self, prediction: Prediction) -> Result<usize> {
        self.commit(&self.predictions, &self.ids.predictions, prediction)
    }

    /// Pivot lists and predictions pointing at `market_id`
    pub fn market_dependents(&self, market_id: EntityId) -> MarketDependents {
        MarketDependents {
            pivot_lists: self
                .pivot_lists
                .count_where(|l| l.market_id() == market_id),
            predictions: self
                .predictions
                .count_where(|p| p.market_id() == Some(market_id)),
        }
    }

    /// A stored handle is replaced in place. Anything else must carry the
    /// allocator's next id; a stale draft is refused without consuming one.
    fn commit<T>(&self, collection: &Collection<T>, allocator: &IdAllocator, item: T) -> Result<usize>
    where
        T: Entity + Clone,
    {
        let item = match collection.replace_same(item) {
            Ok(index) => return Ok(index),
            Err(item) => item,
        };
        let id = item.id();
        if let Err(next) = allocator.claim(id) {
            tracing::warn!("Draft id {} is stale; next free id is {}", id, next);
            return Err(AppError::StaleDraft { id, next });
        }
        Ok(collection.append(item))
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("markets", &self.markets.len())
            .field("locations", &self.locations.len())
            .field("pivot_lists", &self.pivot_lists.len())
            .field("predictions", &self.predictions.len())
            .field("current_market", &self.current_market_id())
            .finish()
    }
}

fn read_only(kind: &str, name: &str) -> AppError {
    tracing::warn!("Built-in {} '{}' is read-only", kind, name);
    AppError::ReadOnly(format!("built-in {} '{}'", kind, name))
}
