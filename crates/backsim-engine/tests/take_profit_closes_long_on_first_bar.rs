//! Spec §8 scenario 1: TP on LONG. The opening bar is flat at the signal
//! price so the open path's own execution (bar close, no slippage) doesn't
//! interact with the TP/SL check on the same minute it opens; TP fires on
//! the following bar.

use backsim_db::memory::{InMemoryPersistence, InMemoryPriceSource, InMemorySignalSource, InMemoryStrategyLoader};
use backsim_engine::Simulator;
use backsim_models::{EventKind, Investor, PriceRecord, RiskConfig, Side, SignalRecord, StrategyParams};

#[tokio::test]
async fn take_profit_closes_long_on_first_bar() {
    let persistence = InMemoryPersistence::new();
    let signals = InMemorySignalSource::new();
    let prices = InMemoryPriceSource::new();
    let loader = InMemoryStrategyLoader::new();
    loader.insert(1, StrategyParams::new(2.0, 50.0, 50.0, 50.0, 1.0));

    prices.push(PriceRecord {
        bar_id: 1,
        ticker: "BTC".into(),
        timestamp: 0,
        open: 100.0,
        high: 100.0,
        low: 100.0,
        close: 100.0,
    });
    prices.push(PriceRecord {
        bar_id: 2,
        ticker: "BTC".into(),
        timestamp: 1,
        open: 112.0,
        high: 120.0,
        low: 108.0,
        close: 118.0,
    });

    signals.push(SignalRecord {
        id: 1,
        strategy_fk: 1,
        ticker: "BTC".into(),
        timestamp: 0,
        side: Side::Long,
        take_profit_price: 110.0,
        stop_loss_price: 90.0,
        leverage_calculated: 1,
        signal_price: 100.0,
        mult_sl_assigned: 1.0,
        mult_tp_assigned: 1.0,
    });

    let investor = Investor::new(1, 10_000.0);
    let risk = RiskConfig {
        risk_max_pct: 2.0,
        size_min: 100.0,
        size_max: 500.0,
    };

    let mut sim = Simulator::new(investor, risk, &persistence, &signals, &prices, &loader);
    sim.run(0, 1).await.unwrap();

    assert_eq!(sim.investor().capital_current, 10_020.0);
    assert_eq!(sim.open_operations().count(), 0, "the operation closed on TP");

    let ops = persistence.operations();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].quantity, 0.0, "closed operations zero out quantity");
    assert_eq!(ops[0].last_exec_close_price, Some(110.0));

    let closes: Vec<_> = persistence
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::CierreTotal)
        .collect();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].detail["motive"], "Take Profit");

    let finalizations: Vec<_> = persistence
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::FinalizacionInversionista)
        .collect();
    assert_eq!(finalizations.len(), 1, "finalize runs exactly once per run, not once per minute");
}
