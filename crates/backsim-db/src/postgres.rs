use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use backsim_models::{
    Event, Investor, LeveragePolicy, Operation, OperationState, PriceRecord, RiskConfig,
    SignalRecord, Side, StrategyParams,
};

use crate::percentages::{porc_sl, porc_tp};
use crate::traits::{Persistence, PriceSource, SignalSource, StrategyLoader};

pub const ENV_DB_URL: &str = "BACKSIM_DATABASE_URL";

/// Connects to Postgres at `url`.
pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Connects to Postgres using `BACKSIM_DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

/// Runs the embedded schema migration.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await.context("db migrate failed")
}

/// Connectivity + schema-presence check for `backsim db status`.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'investors'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_investors_table: exists,
    })
}

#[derive(Clone, Debug)]
pub struct DbStatus {
    pub ok: bool,
    pub has_investors_table: bool,
}

fn side_str(side: Side) -> &'static str {
    side.as_str()
}

fn side_from_str(s: &str) -> Side {
    if s.eq_ignore_ascii_case("SHORT") {
        Side::Short
    } else {
        Side::Long
    }
}

fn state_str(state: OperationState) -> &'static str {
    match state {
        OperationState::Open => "open",
        OperationState::ClosedTotal => "closed_total",
        OperationState::ClosedPartial => "closed_partial",
    }
}

/// `sqlx`-backed `Persistence` adapter. Each call below is its own
/// transaction: `commit` on success, implicit rollback if the driver
/// returns an error (spec §5 "Transactionality").
pub struct PgPersistence {
    pool: PgPool,
}

impl PgPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Persistence for PgPersistence {
    async fn insert_operation(
        &self,
        op: &Operation,
        investor_total_capital: f64,
        investor_available_capital: f64,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await.context("begin insert_operation")?;
        let row = sqlx::query(
            r#"
            insert into operations (
                investor_fk, strategy_fk, signal_fk, ticker_fk, side, timestamp_open,
                entry_price, take_profit, stop_loss, quantity, leverage,
                invested_capital, blocked_capital, state, price_max, price_min,
                opening_bar_id, mult_sl_assigned, mult_tp_assigned, porc_sl, porc_tp,
                investor_total_capital, investor_available_capital
            ) values (
                $1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23
            ) returning id
            "#,
        )
        .bind(op.investor_fk)
        .bind(op.strategy_fk)
        .bind(op.signal_fk)
        .bind(&op.ticker)
        .bind(side_str(op.side))
        .bind(op.timestamp_open)
        .bind(op.entry_price)
        .bind(op.take_profit)
        .bind(op.stop_loss)
        .bind(op.quantity)
        .bind(op.leverage)
        .bind(op.invested_capital)
        .bind(op.blocked_capital)
        .bind(state_str(op.state))
        .bind(op.price_max)
        .bind(op.price_min)
        .bind(op.opening_bar_id)
        .bind(op.mult_sl_assigned)
        .bind(op.mult_tp_assigned)
        .bind(porc_sl(op.side, op.entry_price, op.stop_loss))
        .bind(porc_tp(op.side, op.entry_price, op.take_profit))
        .bind(investor_total_capital)
        .bind(investor_available_capital)
        .fetch_one(&mut *tx)
        .await
        .context("insert_operation failed")?;

        tx.commit().await.context("commit insert_operation")?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn update_op_total_close(&self, op: &Operation, motive: &str, id_closing_bar: Option<i64>) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin update_op_total_close")?;
        sqlx::query(
            r#"
            update operations set
                state = $1, timestamp_close = $2, last_exec_close_price = $3,
                price_max = $4, price_min = $5, quantity = $6,
                accumulated_commissions = $7, realized_pnl = $8, closing_bar_id = $9
            where id = $10
            "#,
        )
        .bind(state_str(op.state))
        .bind(op.timestamp_close)
        .bind(op.last_exec_close_price)
        .bind(op.price_max)
        .bind(op.price_min)
        .bind(op.quantity)
        .bind(op.accumulated_commissions)
        .bind(op.realized_pnl)
        .bind(id_closing_bar)
        .bind(op.id.context("update_op_total_close on operation without id")?)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("update_op_total_close ({motive}) failed"))?;

        tx.commit().await.context("commit update_op_total_close")?;
        Ok(())
    }

    async fn update_op_partial_close(&self, op: &Operation, id_closing_bar: Option<i64>) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin update_op_partial_close")?;
        sqlx::query(
            r#"
            update operations set
                state = $1, timestamp_close = $2, last_exec_close_price = $3,
                price_max = $4, price_min = $5, quantity = $6, partials_done = $7,
                accumulated_commissions = $8, realized_pnl = $9, closing_bar_id = $10
            where id = $11
            "#,
        )
        .bind(state_str(op.state))
        .bind(op.timestamp_close)
        .bind(op.last_exec_close_price)
        .bind(op.price_max)
        .bind(op.price_min)
        .bind(op.quantity)
        .bind(op.partials_done as i32)
        .bind(op.accumulated_commissions)
        .bind(op.realized_pnl)
        .bind(id_closing_bar)
        .bind(op.id.context("update_op_partial_close on operation without id")?)
        .execute(&mut *tx)
        .await
        .context("update_op_partial_close failed")?;

        tx.commit().await.context("commit update_op_partial_close")?;
        Ok(())
    }

    async fn update_op_exposure(&self, op: &Operation) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin update_op_exposure")?;
        sqlx::query(
            r#"
            update operations set
                entry_price = $1, quantity = $2, invested_capital = $3, blocked_capital = $4,
                accumulated_commissions = $5, porc_sl = $6, porc_tp = $7,
                cnt_operaciones = cnt_operaciones + 1
            where id = $8
            "#,
        )
        .bind(op.entry_price)
        .bind(op.quantity)
        .bind(op.invested_capital)
        .bind(op.blocked_capital)
        .bind(op.accumulated_commissions)
        .bind(porc_sl(op.side, op.entry_price, op.stop_loss))
        .bind(porc_tp(op.side, op.entry_price, op.take_profit))
        .bind(op.id.context("update_op_exposure on operation without id")?)
        .execute(&mut *tx)
        .await
        .context("update_op_exposure failed")?;

        tx.commit().await.context("commit update_op_exposure")?;
        Ok(())
    }

    async fn update_unrealized_pyg(&self, op: &Operation, pyg: f64) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin update_unrealized_pyg")?;
        sqlx::query("update operations set unrealized_pnl = $1 where id = $2")
            .bind(pyg)
            .bind(op.id.context("update_unrealized_pyg on operation without id")?)
            .execute(&mut *tx)
            .await
            .context("update_unrealized_pyg failed")?;

        tx.commit().await.context("commit update_unrealized_pyg")?;
        Ok(())
    }

    async fn update_investor_capital(&self, investor: &Investor) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin update_investor_capital")?;
        sqlx::query("update investors set capital_current = $1 where id = $2")
            .bind(investor.capital_current)
            .bind(investor.id)
            .execute(&mut *tx)
            .await
            .context("update_investor_capital failed")?;

        tx.commit().await.context("commit update_investor_capital")?;
        Ok(())
    }

    async fn insert_event_log(&self, event: &Event) -> Result<()> {
        sqlx::query(
            "insert into event_log (ts_evento, investor_fk, op_id, tipo, detalle_json) values ($1, $2, $3, $4, $5)",
        )
        .bind(event.ts)
        .bind(event.investor_fk)
        .bind(event.op_id)
        .bind(event.kind.as_str())
        .bind(&event.detail)
        .execute(&self.pool)
        .await
        .context("insert_event_log failed")?;
        Ok(())
    }

    async fn active_investors(&self) -> Result<Vec<(Investor, RiskConfig)>> {
        let rows = sqlx::query(
            r#"
            select id, capital_initial, capital_current, max_daily, max_concurrent,
                   slippage_open_pct, slippage_close_pct, commission_pct, drawdown_max_pct,
                   use_signal_leverage, investor_leverage, max_leverage,
                   risk_max_pct, size_min, size_max
            from investors
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("active_investors query failed")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut investor = Investor::new(row.get("id"), row.get("capital_initial"));
            investor.capital_current = row.get("capital_current");
            investor.max_daily = row.get::<i32, _>("max_daily") as u32;
            investor.max_concurrent = row.get::<i32, _>("max_concurrent") as u32;
            investor.slippage_open_pct = row.get("slippage_open_pct");
            investor.slippage_close_pct = row.get("slippage_close_pct");
            investor.commission_pct = row.get("commission_pct");
            investor.drawdown_max_pct = row.get("drawdown_max_pct");
            investor.leverage_policy = if row.get::<bool, _>("use_signal_leverage") {
                LeveragePolicy::UseSignalLeverage
            } else {
                LeveragePolicy::Fixed
            };
            investor.investor_leverage = row.get("investor_leverage");
            investor.max_leverage = row.get("max_leverage");

            let risk = RiskConfig {
                risk_max_pct: row.get("risk_max_pct"),
                size_min: row.get("size_min"),
                size_max: row.get("size_max"),
            };
            out.push((investor, risk));
        }
        Ok(out)
    }
}

/// `sqlx`-backed `SignalSource`.
pub struct PgSignalSource {
    pool: PgPool,
}

impl PgSignalSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalSource for PgSignalSource {
    async fn signals(&self, ts: i64) -> Result<Vec<SignalRecord>> {
        let rows = sqlx::query(
            r#"
            select id, strategy_fk, ticker, ts, side, take_profit_price, stop_loss_price,
                   leverage_calculated, signal_price, mult_sl_assigned, mult_tp_assigned
            from signals where ts = $1
            "#,
        )
        .bind(ts)
        .fetch_all(&self.pool)
        .await
        .context("signals query failed")?;

        Ok(rows
            .into_iter()
            .map(|row| SignalRecord {
                id: row.get("id"),
                strategy_fk: row.get("strategy_fk"),
                ticker: row.get("ticker"),
                timestamp: row.get("ts"),
                side: side_from_str(row.get::<String, _>("side").as_str()),
                take_profit_price: row.try_get("take_profit_price").unwrap_or(0.0),
                stop_loss_price: row.try_get("stop_loss_price").unwrap_or(0.0),
                leverage_calculated: row.try_get::<i64, _>("leverage_calculated").unwrap_or(1),
                signal_price: row.try_get("signal_price").unwrap_or(0.0),
                mult_sl_assigned: row.try_get("mult_sl_assigned").unwrap_or(0.0),
                mult_tp_assigned: row.try_get("mult_tp_assigned").unwrap_or(0.0),
            })
            .collect())
    }
}

/// `sqlx`-backed `PriceSource`.
pub struct PgPriceSource {
    pool: PgPool,
}

impl PgPriceSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceSource for PgPriceSource {
    async fn price(&self, ticker: &str, ts: i64) -> Result<Option<PriceRecord>> {
        let row = sqlx::query("select bar_id, ticker, ts, open, high, low, close from price_bars where ticker = $1 and ts = $2")
            .bind(ticker)
            .bind(ts)
            .fetch_optional(&self.pool)
            .await
            .context("price query failed")?;

        Ok(row.map(|row| PriceRecord {
            bar_id: row.get("bar_id"),
            ticker: row.get("ticker"),
            timestamp: row.get("ts"),
            open: row.get("open"),
            high: row.get("high"),
            low: row.get("low"),
            close: row.get("close"),
        }))
    }
}

/// `sqlx`-backed `StrategyLoader`.
pub struct PgStrategyLoader {
    pool: PgPool,
}

impl PgStrategyLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StrategyLoader for PgStrategyLoader {
    async fn load(&self, id: i64) -> Result<StrategyParams> {
        let row = sqlx::query(
            r#"
            select min_advance_pct, protection_retrace_pct, partial_retrace_pct,
                   partial_liquidation_pct, no_advance_retrace_pct, max_partials,
                   enable_profit_protection, enable_partial, enable_retracement_without_advance
            from strategies where id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("strategy row {id} not found"))?;

        Ok(StrategyParams {
            min_advance_pct: row.get("min_advance_pct"),
            protection_retrace_pct: row.get("protection_retrace_pct"),
            partial_retrace_pct: row.get("partial_retrace_pct"),
            partial_liquidation_pct: row.get("partial_liquidation_pct"),
            no_advance_retrace_pct: row.get("no_advance_retrace_pct"),
            max_partials: row.get::<i32, _>("max_partials") as u32,
            enable_profit_protection: row.get("enable_profit_protection"),
            enable_partial: row.get("enable_partial"),
            enable_retracement_without_advance: row.get("enable_retracement_without_advance"),
        })
    }
}
