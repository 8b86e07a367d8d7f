//! Pivot Desktop - price pivot tracking and prediction runs
//!
//! The core engine behind the desktop screens: a typed change-notification
//! bus, the canonical data store with its market-filtered views, and the
//! simulated completion of prediction runs.

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod store;

use config::EngineConfig;
use models::Prediction;
use notify::{Channel, SubscriptionScope};
use parking_lot::Mutex;
use scheduler::{CompletionResponder, TokioTimer};
use state::AppState;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging, build the state and run one prediction end to end
pub fn run() -> anyhow::Result<()> {
    let config = EngineConfig::load()?;

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pivot Desktop...");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_demo(config))
}

/// Seed the store, submit a prediction on the first pivot list, wait for it
async fn run_demo(config: EngineConfig) -> anyhow::Result<()> {
    let timer = Arc::new(TokioTimer::current()?);
    let state = AppState::new(config, timer)?;

    let mut watchers = SubscriptionScope::new(&state.bus);
    let store = state.store.clone();
    watchers.listen(Channel::PredictionList, move |_| {
        tracing::info!("Prediction list now holds {}", store.predictions().len());
    });
    watchers.listen(Channel::Prediction, |_| {
        tracing::debug!("A submitted prediction changed");
    });

    let Some(list) = state.store.pivot_lists().get(0) else {
        tracing::info!("No pivot lists to run a prediction on");
        return Ok(());
    };

    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let responder: Arc<dyn CompletionResponder> = Arc::new(move |prediction: &Prediction| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(prediction.clone());
        }
    });

    let mut request = state.new_prediction_request();
    request.track_pivot_list(&list)?;
    tracing::info!("Requesting a run on {}: {}", list.standard_name(), list.describe());
    let submission = request.submit(&state.simulator, responder)?;

    let finished = rx.await?;
    tracing::info!("{}", finished.describe());
    if let Some(message) = finished.message() {
        tracing::info!("{}", message);
    }

    drop(request);
    watchers.release();
    state.shutdown();
    tracing::info!(
        "Prediction {} done; {} predictions stored",
        submission.prediction.id(),
        state.store.predictions().len()
    );
    Ok(())
}
