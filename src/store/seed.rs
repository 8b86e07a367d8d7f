//! Random startup data
//!
//! Pivot lists alternate top/bottom with rising dates so charts look
//! plausible; predictions arrive already resolved.

use super::DataStore;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{
    BuiltinMarket, CompletionOutcome, EntityId, PivotListFields, PredictionFields, PredictionState,
    PricePivot, PricePivotList, Prediction, RunType,
};
use crate::notify::NotificationBus;
use crate::scheduler::draw_outcome;
use chrono::{Days, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

/// Prices are generated in cents
const MIN_PRICE_CENTS: u32 = 1_000;
const MAX_PRICE_CENTS: u32 = 100_000;

/// A day within the month that started a year before `today`
pub fn random_date<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> NaiveDate {
    let back = 365 - rng.gen_range(0..30u64);
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}

/// 2..15 pivots alternating top and bottom, dates 3..20 days apart
pub fn random_pivots<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> Vec<PricePivot> {
    let count = rng.gen_range(2..15);
    let mid = (MIN_PRICE_CENTS + MAX_PRICE_CENTS) / 2;
    let start = random_date(rng, today);
    let mut offset = 0u64;

    (0..count)
        .map(|i| {
            let is_top = i % 2 == 0;
            let cents = if is_top {
                rng.gen_range(mid..MAX_PRICE_CENTS)
            } else {
                rng.gen_range(MIN_PRICE_CENTS..mid)
            };
            let date = start.checked_add_days(Days::new(offset)).unwrap_or(start);
            offset += rng.gen_range(3..20);
            PricePivot {
                date,
                price: f64::from(cents) / 100.0,
                is_top,
            }
        })
        .collect()
}

fn random_market_id<R: Rng + ?Sized>(rng: &mut R) -> EntityId {
    let markets = BuiltinMarket::all();
    markets
        .choose(rng)
        .map(BuiltinMarket::id)
        .unwrap_or_default()
}

impl DataStore {
    /// Built-ins plus generated pivot lists and resolved predictions
    pub fn with_sample_data<R: Rng + ?Sized>(
        bus: &NotificationBus,
        config: &EngineConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let store = Self::new(bus);
        store.seed(config, rng, Utc::now().date_naive())?;
        Ok(store)
    }

    /// Append sample data; ids come from the store's allocators
    pub fn seed<R: Rng + ?Sized>(
        &self,
        config: &EngineConfig,
        rng: &mut R,
        today: NaiveDate,
    ) -> Result<()> {
        let sample = &config.sample_data;

        let list_count = sample_count(rng, sample.pivot_lists());
        for _ in 0..list_count {
            let fields = PivotListFields {
                market_id: random_market_id(rng),
                pivots: random_pivots(rng, today),
                ..PivotListFields::default()
            };
            let list = PricePivotList::with_fields(self.ids().pivot_lists.assign(), fields, self.bus());
            self.append_pivot_list(list);
        }

        let prediction_count = sample_count(rng, sample.predictions());
        for _ in 0..prediction_count {
            let length_in_days = rng.gen_range(5..30);
            let fields = PredictionFields {
                market_id: Some(random_market_id(rng)),
                start_date: random_date(rng, today),
                length_in_days,
                run_type: RunType::REQUESTABLE
                    .choose(rng)
                    .copied()
                    .unwrap_or_default(),
                state: PredictionState::InProgress,
                pivot_data: random_pivots(rng, today),
                ..PredictionFields::default()
            };
            let prediction = Prediction::with_fields(self.ids().predictions.assign(), fields, self.bus());
            let outcome: CompletionOutcome =
                draw_outcome(rng, length_in_days, config.completion.failure_probability);
            let run_date = random_date(rng, today)
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .unwrap_or_else(Utc::now);
            prediction.resolve(outcome, run_date)?;
            self.append_prediction(prediction);
        }

        tracing::info!(
            "Seeded {} pivot lists and {} predictions",
            list_count,
            prediction_count
        );
        Ok(())
    }
}

/// Draw from a half-open range; an empty range yields its start
fn sample_count<R: Rng + ?Sized>(rng: &mut R, range: std::ops::Range<usize>) -> usize {
    if range.is_empty() {
        range.start
    } else {
        rng.gen_range(range)
    }
}
