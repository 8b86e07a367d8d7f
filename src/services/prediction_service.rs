//! Prediction Service
//!
//! Drafting and submitting prediction requests. A request tracks one pivot
//! list at a time; while the draft is `New` it re-copies that list's pivots
//! whenever a pivot list broadcasts.

use crate::config::RunLengthConfig;
use crate::error::{AppError, Result};
use crate::models::{
    EntityId, PivotView, Prediction, PredictionRecord, PredictionState, PricePivotList, RunType,
};
use crate::notify::{Channel, SubscriptionScope};
use crate::scheduler::{CompletionResponder, CompletionSimulator, TaskHandle};
use crate::store::DataStore;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// A submitted request and its scheduled completion
#[derive(Debug, Clone)]
pub struct Submission {
    pub prediction: Prediction,
    /// Position in the canonical prediction list
    pub index: usize,
    pub task: TaskHandle,
}

/// Draft-side state of the request screen
pub struct PredictionRequest {
    store: Arc<DataStore>,
    prediction: Prediction,
    tracked: Arc<Mutex<Option<PricePivotList>>>,
    run_length: RunLengthConfig,
    subscriptions: SubscriptionScope,
    submitted: bool,
}

impl PredictionRequest {
    pub fn new(store: Arc<DataStore>, run_length: RunLengthConfig) -> Self {
        let prediction = store.draft_prediction();
        let tracked: Arc<Mutex<Option<PricePivotList>>> = Arc::new(Mutex::new(None));
        let subscriptions = follow_tracked(&store, &prediction, &tracked);

        // Drafts start silent, so this does not broadcast
        let _ = prediction.set_length_in_days(run_length.default_days());
        debug!("Drafting prediction {}", prediction.id());

        Self {
            store,
            prediction,
            tracked,
            run_length,
            subscriptions,
            submitted: false,
        }
    }

    pub fn prediction(&self) -> &Prediction {
        &self.prediction
    }

    pub fn tracked_pivot_list(&self) -> Option<PricePivotList> {
        self.tracked.lock().clone()
    }

    /// The snapshot as a pivot editor sees it
    pub fn pivot_view(&self) -> PivotView {
        self.prediction.pivot_view()
    }

    /// Follow `list`: silence the previous one, enable this one, copy its pivots
    pub fn track_pivot_list(&self, list: &PricePivotList) -> Result<()> {
        let previous = self.tracked.lock().replace(list.clone());
        if let Some(previous) = previous {
            if previous.id() != list.id() {
                previous.set_notifying(false);
            }
        }
        list.set_notifying(true);
        self.prediction.set_pivot_source(list)
    }

    pub fn set_start_date(&self, start_date: NaiveDate) -> Result<()> {
        self.prediction.set_start_date(start_date)
    }

    pub fn set_length_in_days(&self, length_in_days: u32) -> Result<()> {
        self.prediction.set_length_in_days(length_in_days)
    }

    pub fn set_run_type(&self, run_type: RunType) -> Result<()> {
        self.prediction.set_run_type(run_type)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = self.prediction.fields();
        if fields.market_id.is_none() {
            return Err(AppError::Validation("no market selected".to_string()));
        }
        if fields.pivot_data.is_empty() {
            return Err(AppError::Validation("no pivot data".to_string()));
        }
        if !self.run_length.contains(fields.length_in_days) {
            return Err(AppError::Validation(format!(
                "run length {} outside {}..={} days",
                fields.length_in_days, self.run_length.min_days, self.run_length.max_days
            )));
        }
        Ok(())
    }

    /// Commit the draft, start the run and schedule its completion.
    ///
    /// On a validation error the draft stays editable.
    pub fn submit(
        &mut self,
        simulator: &CompletionSimulator,
        responder: Arc<dyn CompletionResponder>,
    ) -> Result<Submission> {
        if self.submitted {
            return Err(AppError::InvalidTransition {
                from: self.prediction.state().to_string(),
                to: PredictionState::InProgress.to_string(),
            });
        }
        self.validate()?;

        let id = self.prediction.id();
        if let Err(next) = self.store.ids().predictions.claim(id) {
            tracing::warn!("Prediction draft {} is stale; next free id is {}", id, next);
            return Err(AppError::StaleDraft { id, next });
        }

        self.prediction.mark_in_progress()?;
        self.prediction.set_notifying(true);
        self.silence_tracked();
        self.subscriptions.release();
        self.submitted = true;

        let index = self.store.append_prediction(self.prediction.clone());
        let task = simulator.schedule_default(&self.prediction, responder)?;
        info!(
            "Submitted prediction {} ({} days, type {})",
            self.prediction.id(),
            self.prediction.length_in_days(),
            self.prediction.run_type()
        );

        Ok(Submission {
            prediction: self.prediction.clone(),
            index,
            task,
        })
    }

    /// Move an unsubmitted draft onto the next free id, keeping its fields.
    ///
    /// The way forward after `submit` reports [`AppError::StaleDraft`].
    pub fn redraft(&mut self) -> Result<EntityId> {
        if self.submitted {
            return Err(AppError::ReadOnly(format!(
                "prediction {} was already submitted",
                self.prediction.id()
            )));
        }
        let previous = self.prediction.id();
        let prediction = Prediction::with_fields(
            self.store.ids().predictions.peek_next(),
            self.prediction.fields(),
            self.store.bus(),
        );
        self.subscriptions.release();
        self.subscriptions = follow_tracked(&self.store, &prediction, &self.tracked);
        self.prediction = prediction;
        debug!("Redrafted prediction {} as {}", previous, self.prediction.id());
        Ok(self.prediction.id())
    }

    pub fn record(&self) -> PredictionRecord {
        self.prediction.record()
    }

    fn silence_tracked(&self) {
        if let Some(list) = self.tracked.lock().take() {
            list.set_notifying(false);
        }
    }
}

/// Re-copy the tracked list into `draft` on every pivot list broadcast while `New`
fn follow_tracked(
    store: &DataStore,
    draft: &Prediction,
    tracked: &Arc<Mutex<Option<PricePivotList>>>,
) -> SubscriptionScope {
    let mut subscriptions = SubscriptionScope::new(store.bus());
    let (draft, source) = (draft.clone(), tracked.clone());
    subscriptions.listen(Channel::PivotList, move |_| {
        let list = source.lock().clone();
        if let Some(list) = list {
            if draft.state() == PredictionState::New {
                // Cannot fail while New
                let _ = draft.set_pivot_source(&list);
            }
        }
    });
    subscriptions
}

impl Drop for PredictionRequest {
    fn drop(&mut self) {
        if !self.submitted {
            debug!("Abandoning prediction draft {}", self.prediction.id());
            self.silence_tracked();
        }
    }
}
