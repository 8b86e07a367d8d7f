//! Market Service
//!
//! Catalog edits behind the market and location screens: custom market and
//! location commits, market deletion and selection.

use crate::error::{AppError, Result};
use crate::models::{
    CustomMarketFields, EntityId, LocationFields, LocationRecord, Market, MarketLocation,
    MarketRecord,
};
use crate::store::{DataStore, MarketDependents};
use serde::Serialize;
use tracing::info;

/// Result of committing a market
#[derive(Debug, Clone, Serialize)]
pub struct MarketResult {
    pub index: usize,
    pub market: MarketRecord,
}

/// Result of deleting a market
#[derive(Debug, Clone, Serialize)]
pub struct DeleteMarketResult {
    pub removed: MarketRecord,
    /// Entities still pointing at the removed id
    pub dependents: MarketDependents,
}

pub struct MarketService;

impl MarketService {
    pub fn list_markets(store: &DataStore) -> Vec<MarketRecord> {
        store.markets().snapshot().iter().map(Market::record).collect()
    }

    pub fn list_locations(store: &DataStore) -> Vec<LocationRecord> {
        store
            .locations()
            .snapshot()
            .iter()
            .map(MarketLocation::record)
            .collect()
    }

    /// Create a custom market under the next market id
    pub fn create_market(store: &DataStore, fields: CustomMarketFields) -> Result<MarketResult> {
        info!("MarketService::create_market {}", fields.name);
        Self::validate_market(store, &fields)?;

        let market = store.draft_market(fields);
        let index = store.commit_market(market.clone())?;
        Ok(MarketResult {
            index,
            market: Market::from(market).record(),
        })
    }

    /// Rewrite a custom market's fields in place
    pub fn update_market(
        store: &DataStore,
        id: EntityId,
        fields: CustomMarketFields,
    ) -> Result<MarketResult> {
        info!("MarketService::update_market {}", id);
        let market = store
            .markets()
            .by_id(id)
            .ok_or_else(|| AppError::NotFound(format!("market {}", id)))?;
        let custom = market.as_custom().cloned().ok_or_else(|| {
            tracing::warn!("Market {} is built-in; refusing update", id);
            AppError::ReadOnly(format!("built-in market '{}'", market.name()))
        })?;
        Self::validate_market(store, &fields)?;

        custom.edit_batch(|m| {
            m.set_name(fields.name);
            m.set_origin(fields.origin);
            m.set_location_id(fields.location_id);
        });
        let index = store.commit_market(custom)?;
        Ok(MarketResult {
            index,
            market: market.record(),
        })
    }

    /// Remove a custom market; dependents are reported, not deleted
    pub fn delete_market(store: &DataStore, id: EntityId) -> Result<DeleteMarketResult> {
        info!("MarketService::delete_market {}", id);
        let index = store
            .markets()
            .index_of_id(id)
            .ok_or_else(|| AppError::NotFound(format!("market {}", id)))?;
        let dependents = store.market_dependents(id);
        let removed = store
            .remove_market_at(index)?
            .ok_or_else(|| AppError::NotFound(format!("market {}", id)))?;

        Ok(DeleteMarketResult {
            removed: removed.record(),
            dependents,
        })
    }

    pub fn select_market(store: &DataStore, id: Option<EntityId>) -> Result<Option<MarketRecord>> {
        store.select_market_id(id)?;
        Ok(store.current_market().map(|m| m.record()))
    }

    pub fn create_location(store: &DataStore, fields: LocationFields) -> Result<LocationRecord> {
        info!("MarketService::create_location {}", fields.name);
        Self::validate_location(&fields)?;

        let location = store.draft_location(fields);
        store.commit_location(location.clone())?;
        Ok(MarketLocation::from(location).record())
    }

    fn validate_market(store: &DataStore, fields: &CustomMarketFields) -> Result<()> {
        if fields.name.trim().is_empty() {
            return Err(AppError::Validation("market name is required".to_string()));
        }
        if let Some(location_id) = fields.location_id {
            if !store.locations().contains_id(location_id) {
                return Err(AppError::NotFound(format!("location {}", location_id)));
            }
        }
        Ok(())
    }

    fn validate_location(fields: &LocationFields) -> Result<()> {
        if fields.name.trim().is_empty() {
            return Err(AppError::Validation("location name is required".to_string()));
        }
        if !(-90.0..=90.0).contains(&fields.latitude) {
            return Err(AppError::Validation(format!(
                "latitude {} out of range",
                fields.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&fields.longitude) {
            return Err(AppError::Validation(format!(
                "longitude {} out of range",
                fields.longitude
            )));
        }
        if !(-14.0..=14.0).contains(&fields.timezone) {
            return Err(AppError::Validation(format!(
                "timezone offset {} out of range",
                fields.timezone
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PricePivotList;
    use crate::notify::NotificationBus;

    fn fields(name: &str) -> CustomMarketFields {
        CustomMarketFields {
            name: name.to_string(),
            ..CustomMarketFields::default()
        }
    }

    #[test]
    fn test_create_and_list() {
        let store = DataStore::new(&NotificationBus::new());
        let result = MarketService::create_market(&store, fields("Lumber")).unwrap();
        assert_eq!(result.index, 5);
        assert_eq!(result.market.id, 100);
        assert!(result.market.custom);

        let names: Vec<_> = MarketService::list_markets(&store)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names.last().map(String::as_str), Some("Lumber"));
    }

    #[test]
    fn test_create_validates() {
        let store = DataStore::new(&NotificationBus::new());
        assert!(matches!(
            MarketService::create_market(&store, fields("  ")),
            Err(AppError::Validation(_))
        ));
        let mut bad_location = fields("Wheat");
        bad_location.location_id = Some(20_099);
        assert!(matches!(
            MarketService::create_market(&store, bad_location),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(store.ids().markets.peek_next(), 100);
    }

    #[test]
    fn test_update_custom_only() {
        let store = DataStore::new(&NotificationBus::new());
        MarketService::create_market(&store, fields("Lumber")).unwrap();

        let mut renamed = fields("Lumber Futures");
        renamed.location_id = Some(20_002);
        let result = MarketService::update_market(&store, 100, renamed).unwrap();
        assert_eq!(result.market.name, "Lumber Futures");
        assert_eq!(result.market.location_id, Some(20_002));
        assert_eq!(store.markets().len(), 6);

        assert!(matches!(
            MarketService::update_market(&store, 0, fields("Junk")),
            Err(AppError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_delete_reports_dependents_without_cascade() {
        let store = DataStore::new(&NotificationBus::new());
        MarketService::create_market(&store, fields("Lumber")).unwrap();
        let list = store.draft_pivot_list(100);
        store.commit_pivot_list(list).unwrap();
        MarketService::select_market(&store, Some(100)).unwrap();

        let result = MarketService::delete_market(&store, 100).unwrap();
        assert_eq!(result.dependents.pivot_lists, 1);
        assert!(store.current_market().is_none());
        let orphan: PricePivotList = store.pivot_lists().get(0).unwrap();
        assert_eq!(orphan.market_id(), 100);

        assert!(matches!(
            MarketService::delete_market(&store, 100),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            MarketService::delete_market(&store, 2),
            Err(AppError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_create_location() {
        let store = DataStore::new(&NotificationBus::new());
        let record = MarketService::create_location(
            &store,
            LocationFields {
                name: "Mumbai".to_string(),
                latitude: 19.07,
                longitude: 72.87,
                timezone: 5.5,
            },
        )
        .unwrap();
        assert_eq!(record.id, 20_050);
        assert_eq!(MarketService::list_locations(&store).len(), 6);

        let bad = LocationFields {
            name: "Nowhere".to_string(),
            latitude: 120.0,
            ..LocationFields::default()
        };
        assert!(MarketService::create_location(&store, bad).is_err());
    }
}
