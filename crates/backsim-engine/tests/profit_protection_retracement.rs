//! Spec §8 scenario 3: profit protection closes a LONG after price retraces
//! far enough from its peak, once the minimum advance has been reached.

use backsim_db::memory::{InMemoryPersistence, InMemoryPriceSource, InMemorySignalSource, InMemoryStrategyLoader};
use backsim_engine::Simulator;
use backsim_models::{EventKind, Investor, PriceRecord, RiskConfig, Side, SignalRecord, StrategyParams};

#[tokio::test]
async fn profit_protection_retracement_closes_long() {
    let persistence = InMemoryPersistence::new();
    let signals = InMemorySignalSource::new();
    let prices = InMemoryPriceSource::new();
    let loader = InMemoryStrategyLoader::new();
    loader.insert(1, StrategyParams::new(2.0, 50.0, 50.0, 50.0, 1.0));

    let bars = [
        (0_i64, 1_i64, 100.0, 100.0, 100.0, 100.0), // flat open bar
        (1, 2, 100.0, 120.0, 119.0, 119.0),         // drives price_max to 120, ratio 0.05 stays below threshold
        (2, 3, 115.0, 116.0, 108.0, 108.0),         // retro ratio 0.6 >= 0.5 -> profit protection
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

    signals.push(SignalRecord {
        id: 1,
        strategy_fk: 1,
        ticker: "BTC".into(),
        timestamp: 0,
        side: Side::Long,
        take_profit_price: 200.0,
        stop_loss_price: 50.0,
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
    sim.run(0, 2).await.unwrap();

    assert_eq!(sim.open_operations().count(), 0, "profit protection closed the position");

    let ops = persistence.operations();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].last_exec_close_price, Some(108.0));
    assert_eq!(ops[0].price_max, 120.0);

    let closes: Vec<_> = persistence.events().into_iter().filter(|e| e.kind == EventKind::CierreTotal).collect();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].detail["motive"], "Retroceso desde máximo");
}
