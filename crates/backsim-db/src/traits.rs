use anyhow::Result;
use async_trait::async_trait;

use backsim_models::{Event, Investor, Operation, PriceRecord, RiskConfig, SignalRecord};

/// Upstream signal store: signals deposited per-minute by a process outside
/// this core (spec §6 "Inputs").
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// All signals with `timestamp == ts`. Order within a minute is
    /// provider-defined and treated as canonical (spec §5).
    async fn signals(&self, ts: i64) -> Result<Vec<SignalRecord>>;
}

/// Upstream OHLCV bar store, keyed by `(ticker, minute)`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn price(&self, ticker: &str, ts: i64) -> Result<Option<PriceRecord>>;
}

/// Strategy parameter store, loaded on demand by `backsim-strategy-cache` on
/// a cache miss.
#[async_trait]
pub trait StrategyLoader: Send + Sync {
    async fn load(&self, id: i64) -> Result<backsim_models::StrategyParams>;
}

/// Persistence outputs (spec §6 "Outputs"). Every mutation here is its own
/// transaction (spec §5 "Transactionality") — the Simulator Core is
/// responsible for pairing each call with the matching audit event.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Inserts a new operation row and returns the assigned id.
    async fn insert_operation(
        &self,
        op: &Operation,
        investor_total_capital: f64,
        investor_available_capital: f64,
    ) -> Result<i64>;

    async fn update_op_total_close(&self, op: &Operation, motive: &str, id_closing_bar: Option<i64>) -> Result<()>;

    async fn update_op_partial_close(&self, op: &Operation, id_closing_bar: Option<i64>) -> Result<()>;

    async fn update_op_exposure(&self, op: &Operation) -> Result<()>;

    async fn update_unrealized_pyg(&self, op: &Operation, pyg: f64) -> Result<()>;

    async fn update_investor_capital(&self, investor: &Investor) -> Result<()>;

    async fn insert_event_log(&self, event: &Event) -> Result<()>;

    /// Active investors + their immutable risk config for this run.
    async fn active_investors(&self) -> Result<Vec<(Investor, RiskConfig)>>;
}
