use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use backsim_models::{Event, Investor, Operation, PriceRecord, RiskConfig, SignalRecord, StrategyParams};

use crate::traits::{Persistence, PriceSource, SignalSource, StrategyLoader};

/// In-memory `Persistence`/`SignalSource`/`PriceSource`/`StrategyLoader` for
/// unit and integration tests — no live database required.
///
/// Test hook: [`InMemoryPersistence::fail_next`] arms a one-shot failure for
/// a named persistence call, to exercise the engine's
/// `mark_persistence_error` / `desynchronized` path deterministically.
#[derive(Default)]
pub struct InMemoryPersistence {
    next_id: AtomicI64,
    operations: Mutex<BTreeMap<i64, Operation>>,
    events: Mutex<Vec<Event>>,
    capital_snapshots: Mutex<Vec<(i64, f64)>>,
    active: Mutex<Vec<(Investor, RiskConfig)>>,
    fail_next: Mutex<Option<String>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    pub fn with_active_investors(investors: Vec<(Investor, RiskConfig)>) -> Self {
        let s = Self::new();
        *s.active.lock().unwrap() = investors;
        s
    }

    /// Arms a one-shot failure: the next call to the named method returns
    /// `Err` instead of succeeding. `method` matches one of
    /// `"insert_operation"`, `"update_op_total_close"`,
    /// `"update_op_partial_close"`, `"update_op_exposure"`,
    /// `"update_unrealized_pyg"`, `"update_investor_capital"`,
    /// `"insert_event_log"`.
    pub fn fail_next(&self, method: &str) {
        *self.fail_next.lock().unwrap() = Some(method.to_string());
    }

    fn maybe_fail(&self, method: &str) -> Result<()> {
        let mut guard = self.fail_next.lock().unwrap();
        if guard.as_deref() == Some(method) {
            *guard = None;
            return Err(anyhow!("simulated persistence failure in {method}"));
        }
        Ok(())
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.operations.lock().unwrap().values().cloned().collect()
    }

    pub fn operation(&self, id: i64) -> Option<Operation> {
        self.operations.lock().unwrap().get(&id).cloned()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn capital_snapshots(&self) -> Vec<(i64, f64)> {
        self.capital_snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn insert_operation(
        &self,
        op: &Operation,
        _investor_total_capital: f64,
        _investor_available_capital: f64,
    ) -> Result<i64> {
        self.maybe_fail("insert_operation")?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = op.clone();
        stored.id = Some(id);
        self.operations.lock().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn update_op_total_close(&self, op: &Operation, _motive: &str, _id_closing_bar: Option<i64>) -> Result<()> {
        self.maybe_fail("update_op_total_close")?;
        if let Some(id) = op.id {
            self.operations.lock().unwrap().insert(id, op.clone());
        }
        Ok(())
    }

    async fn update_op_partial_close(&self, op: &Operation, _id_closing_bar: Option<i64>) -> Result<()> {
        self.maybe_fail("update_op_partial_close")?;
        if let Some(id) = op.id {
            self.operations.lock().unwrap().insert(id, op.clone());
        }
        Ok(())
    }

    async fn update_op_exposure(&self, op: &Operation) -> Result<()> {
        self.maybe_fail("update_op_exposure")?;
        if let Some(id) = op.id {
            self.operations.lock().unwrap().insert(id, op.clone());
        }
        Ok(())
    }

    async fn update_unrealized_pyg(&self, _op: &Operation, _pyg: f64) -> Result<()> {
        self.maybe_fail("update_unrealized_pyg")?;
        Ok(())
    }

    async fn update_investor_capital(&self, investor: &Investor) -> Result<()> {
        self.maybe_fail("update_investor_capital")?;
        self.capital_snapshots
            .lock()
            .unwrap()
            .push((investor.id, investor.capital_current));
        Ok(())
    }

    async fn insert_event_log(&self, event: &Event) -> Result<()> {
        self.maybe_fail("insert_event_log")?;
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn active_investors(&self) -> Result<Vec<(Investor, RiskConfig)>> {
        Ok(self.active.lock().unwrap().clone())
    }
}

/// In-memory signal store keyed by minute timestamp.
#[derive(Default)]
pub struct InMemorySignalSource {
    by_ts: Mutex<BTreeMap<i64, Vec<SignalRecord>>>,
}

impl InMemorySignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, signal: SignalRecord) {
        self.by_ts
            .lock()
            .unwrap()
            .entry(signal.timestamp)
            .or_default()
            .push(signal);
    }
}

#[async_trait]
impl SignalSource for InMemorySignalSource {
    async fn signals(&self, ts: i64) -> Result<Vec<SignalRecord>> {
        Ok(self.by_ts.lock().unwrap().get(&ts).cloned().unwrap_or_default())
    }
}

/// In-memory bar store keyed by `(ticker, minute)`.
#[derive(Default)]
pub struct InMemoryPriceSource {
    bars: Mutex<BTreeMap<(String, i64), PriceRecord>>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, bar: PriceRecord) {
        self.bars.lock().unwrap().insert((bar.ticker.clone(), bar.timestamp), bar);
    }
}

#[async_trait]
impl PriceSource for InMemoryPriceSource {
    async fn price(&self, ticker: &str, ts: i64) -> Result<Option<PriceRecord>> {
        Ok(self.bars.lock().unwrap().get(&(ticker.to_string(), ts)).cloned())
    }
}

/// In-memory strategy row store, for the lazy-loader fallback path.
#[derive(Default)]
pub struct InMemoryStrategyLoader {
    rows: Mutex<BTreeMap<i64, StrategyParams>>,
}

impl InMemoryStrategyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: i64, params: StrategyParams) {
        self.rows.lock().unwrap().insert(id, params);
    }
}

#[async_trait]
impl StrategyLoader for InMemoryStrategyLoader {
    async fn load(&self, id: i64) -> Result<StrategyParams> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .ok_or_else(|| anyhow!("no strategy row for id {id}"))
    }
}
