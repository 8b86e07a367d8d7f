//! Application state management

use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::notify::NotificationBus;
use crate::scheduler::{CompletionSimulator, OneShotTimer};
use crate::services::PredictionRequest;
use crate::store::DataStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Everything a screen needs, created once at startup
pub struct AppState {
    pub config: EngineConfig,

    /// Channel every entity and collection broadcasts on
    pub bus: NotificationBus,

    /// Canonical collections and the market selection
    pub store: Arc<DataStore>,

    /// Simulated prediction runs
    pub simulator: CompletionSimulator,
}

impl AppState {
    /// Create state with generated sample data.
    ///
    /// A configured seed makes both the sample data and the simulated
    /// outcomes reproducible.
    pub fn new(config: EngineConfig, timer: Arc<dyn OneShotTimer>) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => {
                tracing::info!("Using seed {}", seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        let bus = NotificationBus::new();
        let store = Arc::new(DataStore::with_sample_data(&bus, &config, &mut rng)?);
        let simulator_rng = StdRng::from_rng(&mut rng)
            .map_err(|e| AppError::Internal(format!("rng: {}", e)))?;
        let simulator = CompletionSimulator::new(timer, config.completion.clone(), simulator_rng);

        tracing::info!("Application state initialized: {:?}", store);

        Ok(Self {
            config,
            bus,
            store,
            simulator,
        })
    }

    /// Start a new prediction draft
    pub fn new_prediction_request(&self) -> PredictionRequest {
        PredictionRequest::new(self.store.clone(), self.config.run_length.clone())
    }

    /// Stop every pending completion
    pub fn shutdown(&self) -> usize {
        self.simulator.cancel_all()
    }
}
