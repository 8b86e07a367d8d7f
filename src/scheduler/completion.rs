//! Simulated prediction runs
//!
//! Stands in for the network round trip: after a random delay the target
//! prediction resolves to `Completed` (one value per day) or `Failed`, the
//! entity broadcasts once, and the responder is called.

use super::timer::{OneShotTimer, TaskHandle};
use crate::config::CompletionConfig;
use crate::error::{AppError, Result};
use crate::models::{CompletionOutcome, EntityId, Prediction, PredictionState};
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

/// Exclusive upper bound of a simulated result value
pub const RESULT_CEILING: u32 = 1000;

/// Told when a scheduled prediction has resolved
pub trait CompletionResponder: Send + Sync {
    fn prediction_completed(&self, prediction: &Prediction);
}

impl<F> CompletionResponder for F
where
    F: Fn(&Prediction) + Send + Sync,
{
    fn prediction_completed(&self, prediction: &Prediction) {
        self(prediction)
    }
}

/// Fail with `failure_probability`, else one value in `0..1000` per day
pub fn draw_outcome<R: Rng + ?Sized>(
    rng: &mut R,
    length_in_days: u32,
    failure_probability: f64,
) -> CompletionOutcome {
    if rng.gen_bool(failure_probability) {
        CompletionOutcome::Failed
    } else {
        let results = (0..length_in_days)
            .map(|_| rng.gen_range(0..RESULT_CEILING))
            .collect();
        CompletionOutcome::Completed(results)
    }
}

struct SimulatorInner {
    timer: Arc<dyn OneShotTimer>,
    rng: Mutex<StdRng>,
    config: CompletionConfig,
    pending: Mutex<HashMap<EntityId, TaskHandle>>,
}

impl SimulatorInner {
    fn fire(
        &self,
        target: &Prediction,
        responder: &dyn CompletionResponder,
        failure_probability: f64,
    ) {
        let id = target.id();
        {
            let mut pending = self.pending.lock();
            if pending.get(&id).is_some_and(TaskHandle::has_fired) {
                pending.remove(&id);
            }
        }

        if target.state() != PredictionState::InProgress {
            tracing::warn!(
                "Prediction {} is {} at completion time; skipping",
                id,
                target.state()
            );
            return;
        }

        let outcome = {
            let mut rng = self.rng.lock();
            draw_outcome(&mut *rng, target.length_in_days(), failure_probability)
        };
        if let Err(e) = target.resolve(outcome, Utc::now()) {
            tracing::warn!("Prediction {} could not resolve: {}", id, e);
            return;
        }
        tracing::info!("Prediction {} finished: {}", id, target.state());
        responder.prediction_completed(target);
    }
}

/// Schedules simulated completions and tracks the ones still pending
#[derive(Clone)]
pub struct CompletionSimulator {
    inner: Arc<SimulatorInner>,
}

impl CompletionSimulator {
    pub fn new(timer: Arc<dyn OneShotTimer>, config: CompletionConfig, rng: StdRng) -> Self {
        Self {
            inner: Arc::new(SimulatorInner {
                timer,
                rng: Mutex::new(rng),
                config,
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.inner.config
    }

    /// Resolve `target` once after a delay drawn from `delay`.
    ///
    /// The target must not already have a pending completion.
    pub fn schedule(
        &self,
        target: &Prediction,
        responder: Arc<dyn CompletionResponder>,
        delay: RangeInclusive<Duration>,
        failure_probability: f64,
    ) -> Result<TaskHandle> {
        if !(0.0..=1.0).contains(&failure_probability) {
            return Err(AppError::Validation(format!(
                "failure probability must be within [0, 1], got {}",
                failure_probability
            )));
        }
        if delay.start() > delay.end() {
            return Err(AppError::Validation(format!(
                "delay range {:?} is empty",
                delay
            )));
        }
        let id = target.id();
        if self.inner.pending.lock().contains_key(&id) {
            return Err(AppError::Validation(format!(
                "prediction {} already has a pending completion",
                id
            )));
        }

        let wait = self.inner.rng.lock().gen_range(delay);
        tracing::debug!("Prediction {} completes in {:?}", id, wait);

        let inner = self.inner.clone();
        let target = target.clone();
        let task = self.inner.timer.schedule(
            wait,
            Box::new(move || {
                inner.fire(&target, responder.as_ref(), failure_probability);
            }),
        );

        // A multi-threaded runtime may fire before the insert lands
        let mut pending = self.inner.pending.lock();
        if task.is_pending() {
            pending.insert(id, task.clone());
        }
        Ok(task)
    }

    /// Schedule with the configured delay range and failure probability
    pub fn schedule_default(
        &self,
        target: &Prediction,
        responder: Arc<dyn CompletionResponder>,
    ) -> Result<TaskHandle> {
        let config = &self.inner.config;
        self.schedule(
            target,
            responder,
            config.delay_range(),
            config.failure_probability,
        )
    }

    /// Cancel the pending completion of one prediction
    pub fn cancel(&self, prediction_id: EntityId) -> bool {
        let task = self.inner.pending.lock().remove(&prediction_id);
        match task {
            Some(task) => {
                tracing::debug!("Cancelled completion of prediction {}", prediction_id);
                task.cancel()
            }
            None => false,
        }
    }

    /// Cancel everything still pending; returns how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.inner.pending.lock().drain().collect();
        let cancelled = drained.iter().filter(|(_, task)| task.cancel()).count();
        if cancelled > 0 {
            tracing::info!("Cancelled {} pending completions", cancelled);
        }
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn is_pending(&self, prediction_id: EntityId) -> bool {
        self.inner.pending.lock().contains_key(&prediction_id)
    }
}

impl std::fmt::Debug for CompletionSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSimulator")
            .field("config", &self.inner.config)
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Channel, NotificationBus};
    use crate::scheduler::TokioTimer;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn simulator(seed: u64) -> CompletionSimulator {
        let timer = Arc::new(TokioTimer::current().unwrap());
        CompletionSimulator::new(timer, CompletionConfig::default(), StdRng::seed_from_u64(seed))
    }

    fn in_progress(bus: &NotificationBus, id: EntityId, days: u32) -> Prediction {
        let prediction = Prediction::new(id, bus);
        prediction.set_length_in_days(days).unwrap();
        prediction.mark_in_progress().unwrap();
        prediction.set_notifying(true);
        prediction
    }

    fn counting_responder(hits: &Arc<AtomicUsize>) -> Arc<dyn CompletionResponder> {
        let hits = hits.clone();
        Arc::new(move |_: &Prediction| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_draw_outcome_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(draw_outcome(&mut rng, 12, 1.0), CompletionOutcome::Failed);
        match draw_outcome(&mut rng, 12, 0.0) {
            CompletionOutcome::Completed(results) => {
                assert_eq!(results.len(), 12);
                assert!(results.iter().all(|&v| v < RESULT_CEILING));
            }
            CompletionOutcome::Failed => panic!("probability 0 never fails"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_exactly_once() {
        let bus = NotificationBus::new();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        let counted = broadcasts.clone();
        let _sub = bus.subscribe(Channel::Prediction, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        let responses = Arc::new(AtomicUsize::new(0));
        let sim = simulator(1);
        let prediction = in_progress(&bus, 30_000, 9);

        sim.schedule(
            &prediction,
            counting_responder(&responses),
            Duration::from_secs(2)..=Duration::from_secs(6),
            0.0,
        )
        .unwrap();
        assert_eq!(sim.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(prediction.state(), PredictionState::InProgress);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(prediction.state(), PredictionState::Completed);
        assert_eq!(prediction.results().len(), 9);
        assert_eq!(responses.load(Ordering::SeqCst), 1);
        assert_eq!(broadcasts.load(Ordering::SeqCst), 1);
        assert_eq!(sim.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_certain_failure() {
        let bus = NotificationBus::new();
        let responses = Arc::new(AtomicUsize::new(0));
        let sim = simulator(2);
        let prediction = in_progress(&bus, 30_001, 4);

        let task = sim
            .schedule(
                &prediction,
                counting_responder(&responses),
                Duration::ZERO..=Duration::from_millis(10),
                1.0,
            )
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(task.has_fired());
        assert_eq!(prediction.state(), PredictionState::Failed);
        assert!(prediction.results().is_empty());
        assert_eq!(responses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_resolution() {
        let bus = NotificationBus::new();
        let responses = Arc::new(AtomicUsize::new(0));
        let sim = simulator(3);
        let first = in_progress(&bus, 30_002, 3);
        let second = in_progress(&bus, 30_003, 3);

        sim.schedule_default(&first, counting_responder(&responses)).unwrap();
        sim.schedule_default(&second, counting_responder(&responses)).unwrap();
        assert!(sim.cancel(30_002));
        assert!(!sim.cancel(30_002));
        assert_eq!(sim.cancel_all(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(first.state(), PredictionState::InProgress);
        assert_eq!(second.state(), PredictionState::InProgress);
        assert_eq!(responses.load(Ordering::SeqCst), 0);
        assert_eq!(sim.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_bad_inputs() {
        let bus = NotificationBus::new();
        let sim = simulator(4);
        let prediction = in_progress(&bus, 30_004, 3);
        let responder: Arc<dyn CompletionResponder> = Arc::new(|_: &Prediction| {});

        let bad_probability = sim.schedule(
            &prediction,
            responder.clone(),
            Duration::ZERO..=Duration::from_secs(1),
            1.5,
        );
        assert!(matches!(bad_probability, Err(AppError::Validation(_))));

        let bad_range = sim.schedule(
            &prediction,
            responder.clone(),
            Duration::from_secs(5)..=Duration::from_secs(1),
            0.5,
        );
        assert!(bad_range.is_err());

        sim.schedule_default(&prediction, responder.clone()).unwrap();
        assert!(sim.schedule_default(&prediction, responder).is_err());
        assert_eq!(sim.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_no_longer_in_progress_is_skipped() {
        let bus = NotificationBus::new();
        let responses = Arc::new(AtomicUsize::new(0));
        let sim = simulator(5);
        let prediction = in_progress(&bus, 30_005, 3);

        sim.schedule(
            &prediction,
            counting_responder(&responses),
            Duration::from_secs(1)..=Duration::from_secs(1),
            0.0,
        )
        .unwrap();
        prediction
            .resolve(CompletionOutcome::Failed, Utc::now())
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(prediction.state(), PredictionState::Failed);
        assert_eq!(responses.load(Ordering::SeqCst), 0);
    }
}
