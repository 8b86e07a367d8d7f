//! Price pivots and pivot lists
//!
//! A pivot is a turning point in a market's price: a date, a price, and
//! whether it was a top or a bottom. Pivots only exist inside a list, and a
//! list belongs to one market.

use super::cell::EntityCell;
use super::ids::EntityId;
use super::{Entity, MarketScoped};
use crate::error::{AppError, Result};
use crate::notify::{Channel, NotificationBus, Notifier};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePivot {
    pub date: NaiveDate,
    pub price: f64,
    pub is_top: bool,
}

impl fmt::Display for PricePivot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_top { "Top" } else { "Bot" };
        write!(f, "{:.2} {} {}", self.price, kind, self.date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotListFields {
    pub market_id: EntityId,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub pivots: Vec<PricePivot>,
}

/// Shared handle to an identified list of pivots
#[derive(Debug, Clone)]
pub struct PricePivotList {
    cell: Arc<EntityCell<PivotListFields>>,
}

impl PricePivotList {
    pub fn new(id: EntityId, market_id: EntityId, bus: &NotificationBus) -> Self {
        let fields = PivotListFields {
            market_id,
            ..PivotListFields::default()
        };
        Self::with_fields(id, fields, bus)
    }

    pub fn with_fields(id: EntityId, fields: PivotListFields, bus: &NotificationBus) -> Self {
        Self {
            cell: Arc::new(EntityCell::new(id, fields, bus, Channel::PivotList)),
        }
    }

    pub fn id(&self) -> EntityId {
        self.cell.id()
    }

    /// Clones of one handle compare equal; separate drafts never do
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn fields(&self) -> PivotListFields {
        self.cell.fields()
    }

    pub fn market_id(&self) -> EntityId {
        self.cell.read(|f| f.market_id)
    }

    pub fn set_market_id(&self, market_id: EntityId) {
        self.cell.update(|f| f.market_id = market_id);
    }

    pub fn name(&self) -> Option<String> {
        self.cell.read(|f| f.name.clone())
    }

    pub fn set_name(&self, name: Option<String>) {
        self.cell.update(|f| f.name = name);
    }

    pub fn notes(&self) -> Option<String> {
        self.cell.read(|f| f.notes.clone())
    }

    pub fn set_notes(&self, notes: Option<String>) {
        self.cell.update(|f| f.notes = notes);
    }

    /// Copy of the pivots
    pub fn pivots(&self) -> Vec<PricePivot> {
        self.cell.read(|f| f.pivots.clone())
    }

    pub fn pivot_count(&self) -> usize {
        self.cell.read(|f| f.pivots.len())
    }

    pub fn set_pivots(&self, pivots: Vec<PricePivot>) {
        self.cell.update(|f| f.pivots = pivots);
    }

    pub fn push_pivot(&self, pivot: PricePivot) {
        self.cell.update(|f| f.pivots.push(pivot));
    }

    /// Returns the replaced pivot, or `None` if `index` is out of range
    pub fn replace_pivot(&self, index: usize, pivot: PricePivot) -> Option<PricePivot> {
        self.cell.try_update(|f| {
            f.pivots
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, pivot))
        })
    }

    pub fn remove_pivot(&self, index: usize) -> Option<PricePivot> {
        self.cell.try_update(|f| {
            if index < f.pivots.len() {
                Some(f.pivots.remove(index))
            } else {
                None
            }
        })
    }

    /// The user's name, or "List <id>"
    pub fn standard_name(&self) -> String {
        self.name().unwrap_or_else(|| format!("List {}", self.id()))
    }

    /// Earliest and latest pivot dates
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.cell.read(|f| {
            let min = f.pivots.iter().map(|p| p.date).min()?;
            let max = f.pivots.iter().map(|p| p.date).max()?;
            Some((min, max))
        })
    }

    pub fn describe(&self) -> String {
        match self.date_range() {
            Some((min, max)) => format!("{} prices from {} to {}", self.pivot_count(), min, max),
            None => "0 prices".to_string(),
        }
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

    pub fn record(&self) -> PivotListRecord {
        let fields = self.fields();
        PivotListRecord {
            id: self.id(),
            market_id: fields.market_id,
            name: fields.name,
            notes: fields.notes,
            pivots: fields.pivots,
            notifying: self.is_notifying(),
        }
    }
}

impl Entity for PricePivotList {
    fn id(&self) -> EntityId {
        PricePivotList::id(self)
    }

    fn is_same(&self, other: &Self) -> bool {
        PricePivotList::ptr_eq(self, other)
    }
}

impl MarketScoped for PricePivotList {
    fn market_id(&self) -> Option<EntityId> {
        Some(PricePivotList::market_id(self))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotListRecord {
    pub id: EntityId,
    pub market_id: EntityId,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub pivots: Vec<PricePivot>,
    pub notifying: bool,
}

/// Working copy of one pivot while it is edited.
///
/// Each change broadcasts [`Channel::Pivot`] while notifying. Nothing reaches
/// a list until [`PivotEditor::save`].
#[derive(Debug)]
pub struct PivotEditor {
    pivot: Mutex<PricePivot>,
    notifier: Notifier,
}

impl PivotEditor {
    pub fn new(pivot: PricePivot, bus: &NotificationBus) -> Self {
        Self {
            pivot: Mutex::new(pivot),
            notifier: Notifier::new(bus, Channel::Pivot),
        }
    }

    pub fn pivot(&self) -> PricePivot {
        *self.pivot.lock()
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.pivot.lock().date = date;
        self.notifier.notify();
    }

    pub fn set_price(&self, price: f64) {
        self.pivot.lock().price = price;
        self.notifier.notify();
    }

    pub fn set_is_top(&self, is_top: bool) {
        self.pivot.lock().is_top = is_top;
        self.notifier.notify();
    }

    pub fn is_notifying(&self) -> bool {
        self.notifier.is_notifying()
    }

    pub fn set_notifying(&self, notifying: bool) {
        self.notifier.set_notifying(notifying);
    }

    pub fn edit_batch<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.notifier.batch(|| f(self))
    }

    /// Write the pivot back at `index`, or append when `index` is `None`.
    ///
    /// Returns the pivot's position, or `None` if `index` is out of range.
    pub fn save(&self, list: &PricePivotList, index: Option<usize>) -> Option<usize> {
        let pivot = self.pivot();
        match index {
            Some(index) => list.replace_pivot(index, pivot).map(|_| index),
            None => {
                list.push_pivot(pivot);
                Some(list.pivot_count() - 1)
            }
        }
    }
}

/// Pivots as seen by a pivot editor: either a live list, or a frozen copy
/// (a prediction's snapshot) that refuses writes.
#[derive(Debug, Clone)]
pub enum PivotView {
    Editable(PricePivotList),
    ReadOnly(Arc<[PricePivot]>),
}

impl PivotView {
    pub fn read_only(pivots: Vec<PricePivot>) -> Self {
        PivotView::ReadOnly(pivots.into())
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, PivotView::ReadOnly(_))
    }

    pub fn pivots(&self) -> Vec<PricePivot> {
        match self {
            PivotView::Editable(list) => list.pivots(),
            PivotView::ReadOnly(pivots) => pivots.to_vec(),
        }
    }

    pub fn title(&self) -> String {
        match self {
            PivotView::Editable(list) => list.standard_name(),
            PivotView::ReadOnly(_) => "Prices".to_string(),
        }
    }

    /// Replace the pivots. A read-only view logs a warning and skips the write.
    pub fn set_pivots(&self, pivots: Vec<PricePivot>) -> Result<()> {
        match self {
            PivotView::Editable(list) => {
                list.set_pivots(pivots);
                Ok(())
            }
            PivotView::ReadOnly(_) => {
                tracing::warn!("Attempt to set pivots through a read-only view");
                Err(AppError::ReadOnly("pivot data".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pivot(day: u32, price: f64, is_top: bool) -> PricePivot {
        PricePivot {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            price,
            is_top,
        }
    }

    fn watch(bus: &NotificationBus) -> (Arc<AtomicUsize>, crate::notify::Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let sub = bus.subscribe(Channel::PivotList, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn test_silent_list_never_broadcasts() {
        let bus = NotificationBus::new();
        let (hits, _sub) = watch(&bus);
        let list = PricePivotList::new(1000, 2, &bus);

        list.set_name(Some("Silver swings".to_string()));
        list.set_notes(Some("weekly".to_string()));
        list.push_pivot(pivot(1, 20.0, true));
        list.set_market_id(3);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        list.set_notifying(true);
        list.push_pivot(pivot(5, 18.5, false));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_range_edits_do_not_broadcast() {
        let bus = NotificationBus::new();
        let (hits, _sub) = watch(&bus);
        let list = PricePivotList::new(1000, 0, &bus);
        list.set_notifying(true);

        assert!(list.replace_pivot(0, pivot(1, 1.0, true)).is_none());
        assert!(list.remove_pivot(3).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        list.push_pivot(pivot(1, 1.0, true));
        let old = list.replace_pivot(0, pivot(2, 2.0, false)).unwrap();
        assert_eq!(old.price, 1.0);
        assert_eq!(list.remove_pivot(0).unwrap().price, 2.0);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_standard_name_and_description() {
        let bus = NotificationBus::new();
        let list = PricePivotList::new(1004, 1, &bus);
        assert_eq!(list.standard_name(), "List 1004");
        assert_eq!(list.describe(), "0 prices");

        list.set_pivots(vec![pivot(9, 12.0, true), pivot(2, 9.0, false), pivot(20, 13.0, true)]);
        assert_eq!(list.describe(), "3 prices from 2024-03-02 to 2024-03-20");

        list.set_name(Some("Cocoa Q1".to_string()));
        assert_eq!(list.standard_name(), "Cocoa Q1");
    }

    #[test]
    fn test_read_only_view_refuses_writes() {
        let bus = NotificationBus::new();
        let frozen = vec![pivot(1, 10.0, true)];
        let view = PivotView::read_only(frozen.clone());

        let err = view.set_pivots(vec![]).unwrap_err();
        assert!(matches!(err, AppError::ReadOnly(_)));
        assert_eq!(view.pivots(), frozen);
        assert_eq!(view.title(), "Prices");

        let list = PricePivotList::new(1001, 0, &bus);
        let editable = PivotView::Editable(list.clone());
        editable.set_pivots(frozen.clone()).unwrap();
        assert_eq!(list.pivots(), frozen);
        assert!(!editable.is_read_only());
    }

    #[test]
    fn test_pivot_editor_broadcasts_pivot_not_list() {
        let bus = NotificationBus::new();
        let (list_hits, _list_sub) = watch(&bus);
        let pivot_hits = Arc::new(AtomicUsize::new(0));
        let counted = pivot_hits.clone();
        let _pivot_sub = bus.subscribe(Channel::Pivot, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        let list = PricePivotList::new(1000, 1, &bus);
        list.set_pivots(vec![pivot(1, 10.0, false), pivot(8, 12.0, true)]);
        list.set_notifying(true);

        let editor = PivotEditor::new(list.pivots()[1], &bus);
        editor.set_price(99.0);
        assert_eq!(pivot_hits.load(Ordering::SeqCst), 0);

        editor.set_notifying(true);
        editor.set_price(13.25);
        editor.edit_batch(|e| {
            e.set_date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
            e.set_is_top(false);
        });
        assert_eq!(pivot_hits.load(Ordering::SeqCst), 2);
        assert_eq!(list_hits.load(Ordering::SeqCst), 0);
        assert_eq!(list.pivots()[1].price, 12.0);

        assert_eq!(editor.save(&list, Some(1)), Some(1));
        assert_eq!(list.pivots()[1], pivot(9, 13.25, false));
        assert_eq!(editor.save(&list, Some(5)), None);
        assert_eq!(editor.save(&list, None), Some(2));
        assert_eq!(list_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pivot_display() {
        assert_eq!(pivot(4, 101.5, true).to_string(), "101.50 Top 2024-03-04");
        assert_eq!(pivot(4, 99.0, false).to_string(), "99.00 Bot 2024-03-04");
    }
}
