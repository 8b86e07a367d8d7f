//! Services Layer
//!
//! Workflows that UI screens call into. Services hold no state of their own;
//! they operate on the [`DataStore`](crate::store::DataStore) and the
//! completion simulator.
//!
//! # Services
//!
//! - `MarketService` - Custom markets and locations, deletion, selection
//! - `PredictionRequest` - Draft, track a pivot list, submit for a run

pub mod market_service;
pub mod prediction_service;

pub use market_service::{DeleteMarketResult, MarketResult, MarketService};
pub use prediction_service::{PredictionRequest, Submission};
