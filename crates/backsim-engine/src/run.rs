//! The per-investor Simulator Core (spec §4.7).

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde_json::json;

use backsim_audit::Logger;
use backsim_capital::sizing;
use backsim_closures::{evaluate as evaluate_closures, ClosureOutcome};
use backsim_dca::{apply_dca, DcaOutcome};
use backsim_db::{Persistence, PriceSource, SignalSource, StrategyLoader};
use backsim_models::{Event, EventKind, Investor, Operation, PriceRecord, RiskConfig, SignalRecord, Side, StrategyParams};
use backsim_strategy_cache::StrategyCache;

use crate::error::EngineError;
use crate::open::{evaluate_open, OpenCandidate, OpenDecision};

/// Drives one investor through `[ts_start, ts_end]`, minute by minute.
///
/// Holds no owned connections — `persistence`/`signals`/`prices`/`loader` are
/// borrowed trait objects the caller wires up once per run and reuses across
/// investors (spec §5 "Shared resources").
pub struct Simulator<'a> {
    investor: Investor,
    risk: RiskConfig,
    strategy_cache: StrategyCache,
    logger: Logger,
    persistence: &'a dyn Persistence,
    signals: &'a dyn SignalSource,
    prices: &'a dyn PriceSource,
    strategy_loader: &'a dyn StrategyLoader,
    open_ops: HashMap<i64, Operation>,
    index: HashMap<(String, Side), i64>,
    last_close: HashMap<String, f64>,
}

impl<'a> Simulator<'a> {
    pub fn new(
        investor: Investor,
        risk: RiskConfig,
        persistence: &'a dyn Persistence,
        signals: &'a dyn SignalSource,
        prices: &'a dyn PriceSource,
        strategy_loader: &'a dyn StrategyLoader,
    ) -> Self {
        Self {
            investor,
            risk,
            strategy_cache: StrategyCache::new(),
            logger: Logger::new(),
            persistence,
            signals,
            prices,
            strategy_loader,
            open_ops: HashMap::new(),
            index: HashMap::new(),
            last_close: HashMap::new(),
        }
    }

    pub fn investor(&self) -> &Investor {
        &self.investor
    }

    pub fn journal(&self) -> &[Event] {
        self.logger.journal()
    }

    pub fn open_operations(&self) -> impl Iterator<Item = &Operation> {
        self.open_ops.values()
    }

    /// Runs minutes `ts_start..=ts_end` in order, then finalizes once. Stops
    /// stepping early (without error) once the investor is `halted` or
    /// `desynchronized`; `finalize` still runs after the loop exits (it only
    /// skips itself when `desynchronized` — see [`Self::finalize`]), matching
    /// `original_source/run_simulacion.py`'s `sim.run(...)` followed by a
    /// single, separate `sim.finalizar(...)` call (spec §4.8's pairing and
    /// §8 scenario 6's singular "summary event").
    pub async fn run(&mut self, ts_start: i64, ts_end: i64) -> Result<()> {
        if ts_end < ts_start {
            return Err(EngineError::InvalidDateRange { ts_start, ts_end }.into());
        }

        let mut last_ts = ts_start;
        for ts in ts_start..=ts_end {
            if self.investor.halted || self.investor.desynchronized {
                break;
            }

            last_ts = ts;
            let day = ts.div_euclid(1440);
            self.investor.reset_day_if_changed(day);

            self.process_closures(ts).await?;
            self.ingest_signals(ts).await?;
        }

        self.finalize(last_ts).await?;

        Ok(())
    }

    /// Spec §4.7 step 3. Evaluates the closure cascade for every currently
    /// open operation against this minute's bar. A persistence failure halts
    /// the rest of this pass (not the whole run; the outer loop stops at the
    /// next `ts`). The drawdown-triggered halt is checked after each
    /// operation's events are applied and breaks the snapshot immediately —
    /// remaining operations in this minute are left unevaluated — matching
    /// `original_source/simulator_core.py::_procesar_cierres`, which returns
    /// mid-snapshot the instant `drawdown_activo` trips (spec §5: halted must
    /// cause "prompt termination ... between closure events within a minute").
    async fn process_closures(&mut self, ts: i64) -> Result<()> {
        let ids: Vec<i64> = self.open_ops.keys().copied().collect();

        for id in ids {
            if self.investor.desynchronized || self.investor.halted {
                break;
            }

            let mut op = match self.open_ops.get(&id) {
                Some(op) => op.clone(),
                None => continue,
            };

            let bar = match self.prices.price(&op.ticker, ts).await.context("fetch price bar for open operation")? {
                Some(bar) => bar,
                None => continue,
            };
            self.last_close.insert(op.ticker.clone(), bar.close);
            op.update_extremes(bar.high, bar.low);

            match evaluate_closures(&mut op, bar.high, bar.low, bar.close, &mut self.investor, ts) {
                None => {
                    self.open_ops.insert(id, op);
                }
                Some(ClosureOutcome::Total {
                    motive,
                    exec_price,
                    commission,
                    pnl_net,
                }) => match self.persistence.update_op_total_close(&op, motive, Some(bar.bar_id)).await {
                    Ok(()) => {
                        self.open_ops.remove(&id);
                        self.index.remove(&(op.ticker.clone(), op.side));
                        let detail = json!({
                            "motive": motive,
                            "exec_price": exec_price,
                            "commission": commission,
                            "pnl_net": pnl_net,
                        });
                        self.logger.log(EventKind::CierreTotal, ts, self.investor.id, Some(id), detail, self.persistence).await;
                    }
                    Err(err) => {
                        self.mark_persistence_error(ts, "update_op_total_close", &err).await;
                        break;
                    }
                },
                Some(ClosureOutcome::Partial {
                    motive,
                    exec_price,
                    commission,
                    pnl_net,
                    qty_liq,
                    capital_liq,
                    child,
                }) => match self.persistence.update_op_partial_close(&op, Some(bar.bar_id)).await {
                    Ok(()) => {
                        self.open_ops.remove(&id);
                        let mut child_op = *child;
                        let capital = self.investor.capital_current;
                        match self.persistence.insert_operation(&child_op, capital, capital).await {
                            Ok(child_id) => {
                                child_op.id = Some(child_id);
                                self.index.insert((child_op.ticker.clone(), child_op.side), child_id);
                                self.open_ops.insert(child_id, child_op);

                                let detail = json!({
                                    "motive": motive,
                                    "exec_price": exec_price,
                                    "commission": commission,
                                    "pnl_net": pnl_net,
                                    "qty_liq": qty_liq,
                                    "capital_liq": capital_liq,
                                });
                                self.logger.log(EventKind::CierreParcial, ts, self.investor.id, Some(id), detail, self.persistence).await;
                                self.logger
                                    .log(
                                        EventKind::AperturaHijaParcial,
                                        ts,
                                        self.investor.id,
                                        Some(child_id),
                                        json!({"parent_op_id": id}),
                                        self.persistence,
                                    )
                                    .await;
                            }
                            Err(err) => {
                                self.mark_persistence_error(ts, "insert_operation(child)", &err).await;
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        self.mark_persistence_error(ts, "update_op_partial_close", &err).await;
                        break;
                    }
                },
            }

            if self.investor.drawdown_active && !self.investor.halted {
                self.investor.halted = true;
                break;
            }
        }

        Ok(())
    }

    /// Spec §4.7 step 4.
    async fn ingest_signals(&mut self, ts: i64) -> Result<()> {
        let signals = self.signals.signals(ts).await.context("fetch signals")?;

        for signal in signals {
            if self.investor.desynchronized {
                break;
            }

            let key = (signal.ticker.clone(), signal.side);
            let existing = self.index.get(&key).copied();

            if signal.mult_sl_assigned <= 0.0 || signal.mult_tp_assigned <= 0.0 {
                match existing {
                    Some(op_id) => self.log_rejection_dca(ts, op_id, "multiplicadores_invalidos").await,
                    None => self.log_rejection_open(ts, &signal, "multiplicadores_invalidos").await,
                }
                continue;
            }

            let bar = match self.prices.price(&signal.ticker, ts).await.context("fetch price bar for signal")? {
                Some(bar) => bar,
                None => {
                    self.log_rejection_open(ts, &signal, "sin_precio_minuto").await;
                    continue;
                }
            };
            self.last_close.insert(signal.ticker.clone(), bar.close);

            match existing {
                Some(op_id) => self.handle_dca(ts, op_id, &signal, &bar).await?,
                None => self.handle_open(ts, &signal, &bar).await?,
            }
        }

        Ok(())
    }

    async fn handle_open(&mut self, ts: i64, signal: &SignalRecord, bar: &PriceRecord) -> Result<()> {
        let strategy = self.load_strategy(signal.strategy_fk).await?;
        let current_open = self.open_ops.len() as u32;

        match evaluate_open(&self.investor, &self.risk, current_open, signal, bar, strategy, ts) {
            OpenDecision::Rejected(motive) => {
                self.log_rejection_open(ts, signal, motive).await;
            }
            OpenDecision::Candidate(OpenCandidate { operation, amount, commission }) => {
                let total_debit = amount + commission;
                let available_after = self.investor.capital_current - total_debit;
                match self.persistence.insert_operation(&operation, self.investor.capital_current, available_after).await {
                    Ok(op_id) => {
                        let mut stored = operation;
                        stored.id = Some(op_id);
                        self.investor.debit(total_debit);
                        self.investor.operations_today += 1;
                        self.index.insert((stored.ticker.clone(), stored.side), op_id);

                        let detail = json!({
                            "ticker": stored.ticker,
                            "side": stored.side.as_str(),
                            "entry_price": stored.entry_price,
                            "quantity": stored.quantity,
                            "leverage": stored.leverage,
                            "invested_capital": stored.invested_capital,
                            "commission": commission,
                        });
                        self.open_ops.insert(op_id, stored);
                        self.logger.log(EventKind::Apertura, ts, self.investor.id, Some(op_id), detail, self.persistence).await;
                    }
                    Err(err) => {
                        self.mark_persistence_error(ts, "insert_operation", &err).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_dca(&mut self, ts: i64, op_id: i64, _signal: &SignalRecord, bar: &PriceRecord) -> Result<()> {
        let mut op = match self.open_ops.get(&op_id) {
            Some(op) => op.clone(),
            None => return Ok(()),
        };

        let amount = sizing(&self.investor, &self.risk);
        match apply_dca(&mut op, bar.close, amount, &mut self.investor, &self.risk) {
            DcaOutcome::Rejected { motive } => {
                self.log_rejection_dca(ts, op_id, motive).await;
            }
            DcaOutcome::Applied {
                exec_price,
                qty_extra,
                commission,
                new_entry,
            } => match self.persistence.update_op_exposure(&op).await {
                Ok(()) => {
                    self.open_ops.insert(op_id, op);
                    let detail = json!({
                        "exec_price": exec_price,
                        "qty_extra": qty_extra,
                        "commission": commission,
                        "new_entry": new_entry,
                        "amount": amount,
                    });
                    self.logger.log(EventKind::Dca, ts, self.investor.id, Some(op_id), detail, self.persistence).await;
                }
                Err(err) => {
                    self.mark_persistence_error(ts, "update_op_exposure", &err).await;
                }
            },
        }

        Ok(())
    }

    /// Spec §4.7 step 5. Skipped entirely when `desynchronized`; runs fully
    /// when only `halted` — see `original_source/simulator_core.py::finalizar`
    /// (SPEC_FULL.md §9 resolves the main-body prose's "if not halted" in
    /// favor of this, the more specific behavior).
    async fn finalize(&mut self, ts: i64) -> Result<()> {
        if self.investor.desynchronized {
            return Ok(());
        }

        let ids: Vec<i64> = self.open_ops.keys().copied().collect();
        for id in ids {
            let op = match self.open_ops.get(&id) {
                Some(op) => op.clone(),
                None => continue,
            };
            let mark = self.last_close.get(&op.ticker).copied().unwrap_or(op.entry_price);
            let pyg = op.unrealized_pnl(mark);

            let detail = json!({"mark_price": mark, "pyg_no_realizado": pyg});
            self.logger.log(EventKind::PnlNoRealizado, ts, self.investor.id, Some(id), detail, self.persistence).await;

            if let Err(err) = self.persistence.update_unrealized_pyg(&op, pyg).await {
                self.log_finalize_persistence_error(ts, Some(id), "update_unrealized_pyg", &err).await;
            }
        }

        let detail = json!({
            "capital_current": self.investor.capital_current,
            "operations_open": self.open_ops.len(),
        });
        self.logger
            .log(EventKind::FinalizacionInversionista, ts, self.investor.id, None, detail, self.persistence)
            .await;

        if let Err(err) = self.persistence.update_investor_capital(&self.investor).await {
            self.log_finalize_persistence_error(ts, None, "update_investor_capital", &err).await;
        }

        Ok(())
    }

    async fn load_strategy(&mut self, strategy_fk: i64) -> Result<StrategyParams> {
        self.strategy_cache
            .get_or_load(strategy_fk, self.strategy_loader)
            .await
            .map_err(|err| {
                EngineError::MissingStrategyRow {
                    strategy_fk,
                    cause: err.to_string(),
                }
                .into()
            })
    }

    /// A hard halt: rolls the investor to `desynchronized ∧ halted` and
    /// records `error_persistencia`. Does not propagate — the caller checks
    /// `investor.desynchronized`/`halted` at the next opportunity instead.
    async fn mark_persistence_error(&mut self, ts: i64, context: &str, err: &anyhow::Error) {
        self.investor.mark_desynchronized();
        let detail = json!({"context": context, "error": err.to_string()});
        self.logger
            .log(EventKind::ErrorPersistencia, ts, self.investor.id, None, detail, self.persistence)
            .await;
    }

    /// A `finalize`-scoped persistence failure: logged, does not halt or
    /// desynchronize, and does not abort the rest of `finalize`.
    async fn log_finalize_persistence_error(&mut self, ts: i64, op_id: Option<i64>, context: &str, err: &anyhow::Error) {
        let detail = json!({"context": context, "error": err.to_string()});
        self.logger
            .log(EventKind::ErrorPersistencia, ts, self.investor.id, op_id, detail, self.persistence)
            .await;
    }

    async fn log_rejection_open(&mut self, ts: i64, signal: &SignalRecord, motive: &'static str) {
        let detail = json!({"motive": motive, "ticker": signal.ticker, "side": signal.side.as_str(), "signal_id": signal.id});
        self.logger.log(EventKind::RejectionOpen, ts, self.investor.id, None, detail, self.persistence).await;
    }

    async fn log_rejection_dca(&mut self, ts: i64, op_id: i64, motive: &'static str) {
        let detail = json!({"motive": motive});
        self.logger.log(EventKind::RejectionDca, ts, self.investor.id, Some(op_id), detail, self.persistence).await;
    }
}
