//! Market locations
//!
//! Built-in locations are looked up from a fixed table by id; there is no
//! way to build one for an id outside the table. Custom locations own every
//! field and broadcast on [`Channel::MarketLocation`] when notifying.

use super::cell::EntityCell;
use super::ids::EntityId;
use super::Entity;
use crate::notify::{Channel, NotificationBus};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

struct LocationRow {
    id: EntityId,
    name: &'static str,
    latitude: f64,
    longitude: f64,
    /// Hours from UTC
    timezone: f64,
}

const BUILTIN_LOCATIONS: [LocationRow; 5] = [
    LocationRow { id: 20_001, name: "New York", latitude: 40.7128, longitude: -74.0060, timezone: -5.0 },
    LocationRow { id: 20_002, name: "Chicago", latitude: 41.8781, longitude: -87.6298, timezone: -6.0 },
    LocationRow { id: 20_003, name: "London", latitude: 51.5074, longitude: -0.1278, timezone: 0.0 },
    LocationRow { id: 20_004, name: "Tokyo", latitude: 35.6762, longitude: 139.6503, timezone: 9.0 },
    LocationRow { id: 20_005, name: "Brussels", latitude: 50.8503, longitude: 4.3517, timezone: 1.0 },
];

fn offset_from_hours(hours: f64) -> Option<FixedOffset> {
    FixedOffset::east_opt((hours * 3600.0).round() as i32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinLocation {
    /// Position in the built-in table
    index: usize,
}

impl BuiltinLocation {
    pub fn from_id(id: EntityId) -> Option<Self> {
        BUILTIN_LOCATIONS
            .iter()
            .position(|r| r.id == id)
            .map(|index| Self { index })
    }

    pub fn is_builtin_id(id: EntityId) -> bool {
        Self::from_id(id).is_some()
    }

    /// In ascending id order
    pub fn all() -> Vec<Self> {
        (0..BUILTIN_LOCATIONS.len()).map(|index| Self { index }).collect()
    }

    fn row(&self) -> &'static LocationRow {
        &BUILTIN_LOCATIONS[self.index]
    }

    pub fn id(&self) -> EntityId {
        self.row().id
    }

    pub fn name(&self) -> &'static str {
        self.row().name
    }

    pub fn latitude(&self) -> f64 {
        self.row().latitude
    }

    pub fn longitude(&self) -> f64 {
        self.row().longitude
    }

    pub fn timezone(&self) -> f64 {
        self.row().timezone
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationFields {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Hours from UTC
    pub timezone: f64,
}

/// Shared handle to a user-defined location
#[derive(Debug, Clone)]
pub struct CustomLocation {
    cell: Arc<EntityCell<LocationFields>>,
}

impl CustomLocation {
    pub fn new(id: EntityId, fields: LocationFields, bus: &NotificationBus) -> Self {
        Self {
            cell: Arc::new(EntityCell::new(id, fields, bus, Channel::MarketLocation)),
        }
    }

    pub fn id(&self) -> EntityId {
        self.cell.id()
    }

    /// Clones of one handle compare equal; separate drafts never do
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn fields(&self) -> LocationFields {
        self.cell.fields()
    }

    pub fn name(&self) -> String {
        self.cell.read(|f| f.name.clone())
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.cell.update(|f| f.name = name);
    }

    pub fn latitude(&self) -> f64 {
        self.cell.read(|f| f.latitude)
    }

    pub fn set_latitude(&self, latitude: f64) {
        self.cell.update(|f| f.latitude = latitude);
    }

    pub fn longitude(&self) -> f64 {
        self.cell.read(|f| f.longitude)
    }

    pub fn set_longitude(&self, longitude: f64) {
        self.cell.update(|f| f.longitude = longitude);
    }

    pub fn timezone(&self) -> f64 {
        self.cell.read(|f| f.timezone)
    }

    pub fn set_timezone(&self, timezone: f64) {
        self.cell.update(|f| f.timezone = timezone);
    }

    pub fn is_notifying(&self) -> bool {
        self.cell.notifier().is_notifying()
    }

    pub fn set_notifying(&self, notifying: bool) {
        self.cell.notifier().set_notifying(notifying);
    }

    pub fn edit_batch<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.cell.notifier().batch(|| f(self))
    }
}

#[derive(Debug, Clone)]
pub enum MarketLocation {
    Builtin(BuiltinLocation),
    Custom(CustomLocation),
}

impl MarketLocation {
    pub fn id(&self) -> EntityId {
        match self {
            MarketLocation::Builtin(l) => l.id(),
            MarketLocation::Custom(l) => l.id(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            MarketLocation::Builtin(l) => l.name().to_string(),
            MarketLocation::Custom(l) => l.name(),
        }
    }

    pub fn latitude(&self) -> f64 {
        match self {
            MarketLocation::Builtin(l) => l.latitude(),
            MarketLocation::Custom(l) => l.latitude(),
        }
    }

    pub fn longitude(&self) -> f64 {
        match self {
            MarketLocation::Builtin(l) => l.longitude(),
            MarketLocation::Custom(l) => l.longitude(),
        }
    }

    pub fn timezone(&self) -> f64 {
        match self {
            MarketLocation::Builtin(l) => l.timezone(),
            MarketLocation::Custom(l) => l.timezone(),
        }
    }

    /// `None` when the stored offset is outside +/-24h
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        offset_from_hours(self.timezone())
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, MarketLocation::Builtin(_))
    }

    /// Built-ins match by id; custom entries by handle
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MarketLocation::Builtin(a), MarketLocation::Builtin(b)) => a.id() == b.id(),
            (MarketLocation::Custom(a), MarketLocation::Custom(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomLocation> {
        match self {
            MarketLocation::Custom(l) => Some(l),
            MarketLocation::Builtin(_) => None,
        }
    }

    pub fn record(&self) -> LocationRecord {
        LocationRecord {
            id: self.id(),
            name: self.name(),
            latitude: self.latitude(),
            longitude: self.longitude(),
            timezone: self.timezone(),
            custom: !self.is_builtin(),
        }
    }
}

impl Entity for MarketLocation {
    fn id(&self) -> EntityId {
        MarketLocation::id(self)
    }

    fn is_same(&self, other: &Self) -> bool {
        MarketLocation::ptr_eq(self, other)
    }
}

impl From<BuiltinLocation> for MarketLocation {
    fn from(location: BuiltinLocation) -> Self {
        MarketLocation::Builtin(location)
    }
}

impl From<CustomLocation> for MarketLocation {
    fn from(location: CustomLocation) -> Self {
        MarketLocation::Custom(location)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: EntityId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: f64,
    pub custom: bool,
}
