//! Spec §8 scenario 5: a signal with a non-positive multiplier is dropped
//! before any price lookup or capital check — logged as `rejection_open`
//! when there is no matching open operation, `rejection_dca` when there is.

use backsim_db::memory::{InMemoryPersistence, InMemoryPriceSource, InMemorySignalSource, InMemoryStrategyLoader};
use backsim_engine::Simulator;
use backsim_models::{EventKind, Investor, PriceRecord, RiskConfig, Side, SignalRecord, StrategyParams};

fn risk() -> RiskConfig {
    RiskConfig {
        risk_max_pct: 2.0,
        size_min: 100.0,
        size_max: 500.0,
    }
}

#[tokio::test]
async fn rejects_open_with_zero_multiplier_and_no_existing_operation() {
    let persistence = InMemoryPersistence::new();
    let signals = InMemorySignalSource::new();
    let prices = InMemoryPriceSource::new();
    let loader = InMemoryStrategyLoader::new();
    loader.insert(1, StrategyParams::new(2.0, 50.0, 50.0, 50.0, 1.0));

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
        mult_sl_assigned: 0.0,
        mult_tp_assigned: 1.0,
    });

    let mut sim = Simulator::new(Investor::new(1, 10_000.0), risk(), &persistence, &signals, &prices, &loader);
    sim.run(0, 0).await.unwrap();

    assert_eq!(sim.open_operations().count(), 0, "nothing should have opened");
    assert!(persistence.operations().is_empty(), "no price lookup or capital check should even occur");

    let rejections: Vec<_> = persistence.events().into_iter().filter(|e| e.kind == EventKind::RejectionOpen).collect();
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].detail["motive"], "multiplicadores_invalidos");
}

#[tokio::test]
async fn rejects_dca_with_zero_multiplier_when_operation_is_open() {
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
        take_profit_price: 110.0,
        stop_loss_price: 90.0,
        leverage_calculated: 1,
        signal_price: 100.0,
        mult_sl_assigned: 1.0,
        mult_tp_assigned: 1.0,
    });
    signals.push(SignalRecord {
        id: 2,
        strategy_fk: 1,
        ticker: "BTC".into(),
        timestamp: 1,
        side: Side::Long,
        take_profit_price: 110.0,
        stop_loss_price: 90.0,
        leverage_calculated: 1,
        signal_price: 100.0,
        mult_sl_assigned: 0.0,
        mult_tp_assigned: 1.0,
    });

    let mut sim = Simulator::new(Investor::new(1, 10_000.0), risk(), &persistence, &signals, &prices, &loader);
    sim.run(0, 1).await.unwrap();

    assert_eq!(sim.open_operations().count(), 1, "the first signal's operation is still open and untouched");

    let dca_rejections: Vec<_> = persistence.events().into_iter().filter(|e| e.kind == EventKind::RejectionDca).collect();
    assert_eq!(dca_rejections.len(), 1);
    assert_eq!(dca_rejections[0].detail["motive"], "multiplicadores_invalidos");
}
