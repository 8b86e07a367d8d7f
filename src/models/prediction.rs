//! Predictions
//!
//! A prediction captures its request parameters while `New`, then moves
//! through `InProgress` to a terminal state. The pivot data is a private
//! copy taken from a pivot list; later edits to that list do not reach it.

use super::cell::EntityCell;
use super::ids::EntityId;
use super::pivot::{PivotView, PricePivot, PricePivotList};
use super::{Entity, MarketScoped};
use crate::error::{AppError, Result};
use crate::notify::{Channel, NotificationBus};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const SUCCESS_MESSAGE: &str = "Simulated successful result.";
pub const FAILURE_MESSAGE: &str = "Simulated failure result.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RunType {
    #[default]
    A,
    B,
    AB,
    NatalCheck,
}

impl RunType {
    /// Types a user can request from the sample generator
    pub const REQUESTABLE: [RunType; 3] = [RunType::A, RunType::B, RunType::AB];
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunType::A => "A",
            RunType::B => "B",
            RunType::AB => "AB",
            RunType::NatalCheck => "NC",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PredictionState {
    #[default]
    New,
    InProgress,
    Completed,
    Failed,
}

impl PredictionState {
    /// Forward-only: New -> InProgress -> {Completed, Failed}
    pub fn can_transition_to(self, next: PredictionState) -> bool {
        matches!(
            (self, next),
            (PredictionState::New, PredictionState::InProgress)
                | (PredictionState::InProgress, PredictionState::Completed)
                | (PredictionState::InProgress, PredictionState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PredictionState::Completed | PredictionState::Failed)
    }
}

impl fmt::Display for PredictionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PredictionState::New => "New",
            PredictionState::InProgress => "In Progress",
            PredictionState::Completed => "Completed",
            PredictionState::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// What a finished run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// One value in 0..1000 per day of the run
    Completed(Vec<u32>),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFields {
    pub market_id: Option<EntityId>,
    pub start_date: NaiveDate,
    pub length_in_days: u32,
    pub run_type: RunType,
    pub state: PredictionState,
    pub pivot_data: Vec<PricePivot>,
    pub results: Vec<u32>,
    pub message: Option<String>,
    pub run_date: Option<DateTime<Utc>>,
}

impl Default for PredictionFields {
    fn default() -> Self {
        Self {
            market_id: None,
            start_date: Utc::now().date_naive(),
            length_in_days: 1,
            run_type: RunType::default(),
            state: PredictionState::New,
            pivot_data: Vec::new(),
            results: Vec::new(),
            message: None,
            run_date: None,
        }
    }
}

/// Shared handle to a prediction
#[derive(Debug, Clone)]
pub struct Prediction {
    cell: Arc<EntityCell<PredictionFields>>,
}

impl Prediction {
    /// A `New` prediction with default request parameters
    pub fn new(id: EntityId, bus: &NotificationBus) -> Self {
        Self::with_fields(id, PredictionFields::default(), bus)
    }

    pub fn with_fields(id: EntityId, fields: PredictionFields, bus: &NotificationBus) -> Self {
        Self {
            cell: Arc::new(EntityCell::new(id, fields, bus, Channel::Prediction)),
        }
    }

    pub fn id(&self) -> EntityId {
        self.cell.id()
    }

    /// Clones of one handle compare equal; separate drafts never do
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn fields(&self) -> PredictionFields {
        self.cell.fields()
    }

    pub fn state(&self) -> PredictionState {
        self.cell.read(|f| f.state)
    }

    pub fn market_id(&self) -> Option<EntityId> {
        self.cell.read(|f| f.market_id)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.cell.read(|f| f.start_date)
    }

    pub fn length_in_days(&self) -> u32 {
        self.cell.read(|f| f.length_in_days)
    }

    pub fn run_type(&self) -> RunType {
        self.cell.read(|f| f.run_type)
    }

    pub fn pivot_data(&self) -> Vec<PricePivot> {
        self.cell.read(|f| f.pivot_data.clone())
    }

    /// Snapshot wrapped for a pivot editor; never writable
    pub fn pivot_view(&self) -> PivotView {
        PivotView::read_only(self.pivot_data())
    }

    pub fn results(&self) -> Vec<u32> {
        self.cell.read(|f| f.results.clone())
    }

    pub fn message(&self) -> Option<String> {
        self.cell.read(|f| f.message.clone())
    }

    pub fn run_date(&self) -> Option<DateTime<Utc>> {
        self.cell.read(|f| f.run_date)
    }

    /// `None` only if the date arithmetic overflows
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.cell.read(|f| {
            f.start_date
                .checked_add_days(Days::new(u64::from(f.length_in_days)))
        })
    }

    fn edit_request(&self, what: &str, f: impl FnOnce(&mut PredictionFields)) -> Result<()> {
        let id = self.id();
        let result = self.cell.try_update_with(|fields| {
            if fields.state != PredictionState::New {
                return Err(fields.state);
            }
            f(fields);
            Ok(())
        });
        result.map_err(|state| {
            tracing::warn!("Prediction {} is {}; refusing to change {}", id, state, what);
            AppError::ReadOnly(format!("prediction {} {}", id, what))
        })
    }

    pub fn set_market_id(&self, market_id: Option<EntityId>) -> Result<()> {
        self.edit_request("market", |f| f.market_id = market_id)
    }

    pub fn set_start_date(&self, start_date: NaiveDate) -> Result<()> {
        self.edit_request("start date", |f| f.start_date = start_date)
    }

    pub fn set_length_in_days(&self, length_in_days: u32) -> Result<()> {
        self.edit_request("length", |f| f.length_in_days = length_in_days)
    }

    pub fn set_run_type(&self, run_type: RunType) -> Result<()> {
        self.edit_request("run type", |f| f.run_type = run_type)
    }

    pub fn set_pivot_data(&self, pivots: Vec<PricePivot>) -> Result<()> {
        self.edit_request("pivot data", |f| f.pivot_data = pivots)
    }

    /// Copy the market and pivots of `list` in one step
    pub fn set_pivot_source(&self, list: &PricePivotList) -> Result<()> {
        let source = list.fields();
        self.edit_request("pivot data", |f| {
            f.market_id = Some(source.market_id);
            f.pivot_data = source.pivots;
        })
    }

    fn transition(
        &self,
        next: PredictionState,
        apply: impl FnOnce(&mut PredictionFields),
    ) -> Result<()> {
        self.cell.try_update_with(|fields| {
            if !fields.state.can_transition_to(next) {
                return Err(AppError::InvalidTransition {
                    from: fields.state.to_string(),
                    to: next.to_string(),
                });
            }
            fields.state = next;
            apply(fields);
            Ok(())
        })
    }

    /// New -> InProgress
    pub fn mark_in_progress(&self) -> Result<()> {
        self.transition(PredictionState::InProgress, |_| {})
    }

    /// InProgress -> Completed / Failed, with a single broadcast
    pub fn resolve(&self, outcome: CompletionOutcome, run_date: DateTime<Utc>) -> Result<()> {
        let next = match outcome {
            CompletionOutcome::Completed(_) => PredictionState::Completed,
            CompletionOutcome::Failed => PredictionState::Failed,
        };
        self.transition(next, move |f| {
            f.run_date = Some(run_date);
            match outcome {
                CompletionOutcome::Completed(results) => {
                    f.results = results;
                    f.message = Some(SUCCESS_MESSAGE.to_string());
                }
                CompletionOutcome::Failed => {
                    f.results.clear();
                    f.message = Some(FAILURE_MESSAGE.to_string());
                }
            }
        })
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

    pub fn describe(&self) -> String {
        let f = self.fields();
        let market = f
            .market_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "Type {} run of market {} for {} days from {} ({} with {} prices and {} results)",
            f.run_type,
            market,
            f.length_in_days,
            f.start_date,
            f.state,
            f.pivot_data.len(),
            f.results.len()
        )
    }

    pub fn record(&self) -> PredictionRecord {
        PredictionRecord {
            id: self.id(),
            end_date: self.end_date(),
            notifying: self.is_notifying(),
            fields: self.fields(),
        }
    }
}

impl Entity for Prediction {
    fn id(&self) -> EntityId {
        Prediction::id(self)
    }

    fn is_same(&self, other: &Self) -> bool {
        Prediction::ptr_eq(self, other)
    }
}

impl MarketScoped for Prediction {
    fn market_id(&self) -> Option<EntityId> {
        Prediction::market_id(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: PredictionFields,
    pub end_date: Option<NaiveDate>,
    pub notifying: bool,
}
