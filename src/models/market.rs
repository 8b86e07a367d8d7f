//! Markets
//!
//! The built-in set is fixed and read-only. Custom markets share the same
//! shape, carry editable fields, and take ids from [`CUSTOM_MARKET_ID_BASE`]
//! upward.
//!
//! [`CUSTOM_MARKET_ID_BASE`]: super::ids::CUSTOM_MARKET_ID_BASE

use super::cell::EntityCell;
use super::ids::EntityId;
use super::Entity;
use crate::notify::{Channel, NotificationBus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Built-in market names; the index is the id
pub const BUILTIN_MARKET_NAMES: [&str; 5] = ["Bonds", "Cocoa", "Silver", "Gold", "Crude Oil"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinMarket {
    id: EntityId,
    name: &'static str,
}

impl BuiltinMarket {
    pub fn from_id(id: EntityId) -> Option<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|index| BUILTIN_MARKET_NAMES.get(index).copied())
            .map(|name| Self { id, name })
    }

    pub fn all() -> Vec<Self> {
        BUILTIN_MARKET_NAMES
            .into_iter()
            .enumerate()
            .map(|(index, name)| Self {
                id: index as EntityId,
                name,
            })
            .collect()
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Editable part of a custom market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomMarketFields {
    pub name: String,
    /// Trading origin date
    pub origin: Option<NaiveDate>,
    pub location_id: Option<EntityId>,
}

/// Shared handle to a user-defined market
#[derive(Debug, Clone)]
pub struct CustomMarket {
    cell: Arc<EntityCell<CustomMarketFields>>,
}

impl CustomMarket {
    pub fn new(id: EntityId, fields: CustomMarketFields, bus: &NotificationBus) -> Self {
        Self {
            cell: Arc::new(EntityCell::new(id, fields, bus, Channel::Market)),
        }
    }

    pub fn id(&self) -> EntityId {
        self.cell.id()
    }

    /// Clones of one handle compare equal; separate drafts never do
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn fields(&self) -> CustomMarketFields {
        self.cell.fields()
    }

    pub fn name(&self) -> String {
        self.cell.read(|f| f.name.clone())
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.cell.update(|f| f.name = name);
    }

    pub fn origin(&self) -> Option<NaiveDate> {
        self.cell.read(|f| f.origin)
    }

    pub fn set_origin(&self, origin: Option<NaiveDate>) {
        self.cell.update(|f| f.origin = origin);
    }

    pub fn location_id(&self) -> Option<EntityId> {
        self.cell.read(|f| f.location_id)
    }

    pub fn set_location_id(&self, location_id: Option<EntityId>) {
        self.cell.update(|f| f.location_id = location_id);
    }

    pub fn is_notifying(&self) -> bool {
        self.cell.notifier().is_notifying()
    }

    pub fn set_notifying(&self, notifying: bool) {
        self.cell.notifier().set_notifying(notifying);
    }

    /// Apply several edits with a single broadcast at the end
    pub fn edit_batch<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.cell.notifier().batch(|| f(self))
    }
}

/// Any market in the catalog
#[derive(Debug, Clone)]
pub enum Market {
    Builtin(BuiltinMarket),
    Custom(CustomMarket),
}

impl Market {
    pub fn id(&self) -> EntityId {
        match self {
            Market::Builtin(m) => m.id(),
            Market::Custom(m) => m.id(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Market::Builtin(m) => m.name().to_string(),
            Market::Custom(m) => m.name(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Market::Builtin(_))
    }

    /// Built-ins match by id; custom entries by handle
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Market::Builtin(a), Market::Builtin(b)) => a.id() == b.id(),
            (Market::Custom(a), Market::Custom(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomMarket> {
        match self {
            Market::Custom(m) => Some(m),
            Market::Builtin(_) => None,
        }
    }

    pub fn record(&self) -> MarketRecord {
        match self {
            Market::Builtin(m) => MarketRecord {
                id: m.id(),
                name: m.name().to_string(),
                custom: false,
                origin: None,
                location_id: None,
            },
            Market::Custom(m) => {
                let fields = m.fields();
                MarketRecord {
                    id: m.id(),
                    name: fields.name,
                    custom: true,
                    origin: fields.origin,
                    location_id: fields.location_id,
                }
            }
        }
    }
}

impl Entity for Market {
    fn id(&self) -> EntityId {
        Market::id(self)
    }

    fn is_same(&self, other: &Self) -> bool {
        Market::ptr_eq(self, other)
    }
}

impl From<BuiltinMarket> for Market {
    fn from(market: BuiltinMarket) -> Self {
        Market::Builtin(market)
    }
}

impl From<CustomMarket> for Market {
    fn from(market: CustomMarket) -> Self {
        Market::Custom(market)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Serializable view of a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub id: EntityId,
    pub name: String,
    pub custom: bool,
    pub origin: Option<NaiveDate>,
    pub location_id: Option<EntityId>,
}
