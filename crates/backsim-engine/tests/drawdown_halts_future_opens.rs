//! Spec §8 scenario 6: once cumulative realized loss crosses the drawdown
//! cap, the investor stops opening new positions but `finalize` still runs
//! (since the investor is merely `drawdown_active`/`halted`, not
//! `desynchronized`). Closures run before signals within a minute (spec §5),
//! so the SL that trips the drawdown and the signal that gets rejected by it
//! land in the *same* minute; by the following minute the investor is fully
//! `halted` and the run loop stops before any further signal is even fetched.

use backsim_db::memory::{InMemoryPersistence, InMemoryPriceSource, InMemorySignalSource, InMemoryStrategyLoader};
use backsim_engine::Simulator;
use backsim_models::{EventKind, Investor, LeveragePolicy, PriceRecord, RiskConfig, Side, SignalRecord, StrategyParams};

#[tokio::test]
async fn drawdown_trip_blocks_subsequent_opens_but_finalize_still_runs() {
    let persistence = InMemoryPersistence::new();
    let signals = InMemorySignalSource::new();
    let prices = InMemoryPriceSource::new();
    let loader = InMemoryStrategyLoader::new();
    loader.insert(1, StrategyParams::new(2.0, 50.0, 50.0, 50.0, 1.0));

    let bars = [
        (0_i64, 1_i64, 100.0, 100.0, 100.0, 100.0), // opens BTC LONG, 5x leverage
        (1, 2, 90.0, 90.0, 80.0, 80.0),             // SL hit, realized loss -100 == drawdown cap
    ];
    for (ts, bar_id, open, high, low, close) in bars {
        prices.push(PriceRecord {
            bar_id,
            ticker: "BTC".into(),
            timestamp: ts,
            open,
            high,
            low,
            close,
        });
    }
    prices.push(PriceRecord {
        bar_id: 3,
        ticker: "ETH".into(),
        timestamp: 1,
        open: 100.0,
        high: 101.0,
        low: 99.0,
        close: 100.0,
    });

    signals.push(SignalRecord {
        id: 1,
        strategy_fk: 1,
        ticker: "BTC".into(),
        timestamp: 0,
        side: Side::Long,
        take_profit_price: 200.0,
        stop_loss_price: 80.0,
        leverage_calculated: 5,
        signal_price: 100.0,
        mult_sl_assigned: 1.0,
        mult_tp_assigned: 1.0,
    });
    signals.push(SignalRecord {
        id: 2,
        strategy_fk: 1,
        ticker: "ETH".into(),
        timestamp: 1,
        side: Side::Long,
        take_profit_price: 120.0,
        stop_loss_price: 80.0,
        leverage_calculated: 5,
        signal_price: 100.0,
        mult_sl_assigned: 1.0,
        mult_tp_assigned: 1.0,
    });

    let mut investor = Investor::new(1, 1_000.0);
    investor.drawdown_max_pct = 10.0; // trips once realized loss >= 100
    investor.leverage_policy = LeveragePolicy::UseSignalLeverage;
    let risk = RiskConfig {
        risk_max_pct: 10.0,
        size_min: 10.0,
        size_max: 1_000.0,
    };

    let mut sim = Simulator::new(investor, risk, &persistence, &signals, &prices, &loader);
    sim.run(0, 1).await.unwrap();

    assert!(sim.investor().drawdown_active);
    assert!(sim.investor().halted);
    assert!(!sim.investor().desynchronized);

    let rejections: Vec<_> = persistence.events().into_iter().filter(|e| e.kind == EventKind::RejectionOpen).collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].detail["motive"], "investor_halted_drawdown");

    let finalizations: Vec<_> = persistence
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::FinalizacionInversionista)
        .collect();
    assert_eq!(finalizations.len(), 1, "finalize runs exactly once per run, not once per minute");
}
