use barreplay::engine::EventKind;
use barreplay::metrics::summary::{SHARPE_RATIO, TOTAL_COMMISSION, TOTAL_RETURN};
use barreplay::prelude::*;
use std::io::Write;
use std::sync::{Arc, Mutex};

const DAY: i64 = 86_400_000;

fn bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::flat(i as i64 * DAY, c))
        .collect()
}

fn feed(closes: &[f64]) -> DataFeed {
    let mut feed = DataFeed::new(["X"]);
    feed.add_source("X", bars(closes)).unwrap();
    feed
}

//emits a fixed strength on chosen ticks
struct Scripted {
    id: StrategyId,
    script: Vec<(usize, f64)>,
}

impl Scripted {
    fn new(script: &[(usize, f64)]) -> Self {
        Scripted {
            id: StrategyId::new("scripted"),
            script: script.to_vec(),
        }
    }
}

impl Strategy for Scripted {
    fn id(&self) -> &StrategyId {
        &self.id
    }

    fn calculate_signals(&mut self, feed: &DataFeed) -> Vec<Signal> {
        let tick = feed.ticks();
        let timestamp = feed.current_timestamp().unwrap_or_default();
        self.script
            .iter()
            .filter(|(at, _)| *at == tick)
            .map(|&(_, strength)| Signal::new(self.id.clone(), "X", timestamp, strength).unwrap())
            .collect()
    }
}

//records what the strategy could see on each tick
struct Probe {
    id: StrategyId,
    seen: Arc<Mutex<Vec<(usize, usize, i64, i64)>>>,
}

impl Strategy for Probe {
    fn id(&self) -> &StrategyId {
        &self.id
    }

    fn calculate_signals(&mut self, feed: &DataFeed) -> Vec<Signal> {
        let consumed = feed.consumed("X");
        let newest = consumed.iter().map(|b| b.timestamp).max().unwrap_or(i64::MIN);
        self.seen.lock().unwrap().push((
            feed.ticks(),
            consumed.len(),
            newest,
            feed.current_timestamp().unwrap_or_default(),
        ));
        Vec::new()
    }
}

fn run(closes: &[f64], capital: f64, strategy: Box<dyn Strategy>) -> (Backtest, BacktestReport) {
    let config = BacktestConfig::new(capital, &["X"]);
    let mut backtest = Backtest::new(
        config,
        feed(closes),
        vec![strategy],
        Box::new(SimulatedExecution::default()),
    )
    .unwrap();
    let report = backtest.run().unwrap();
    (backtest, report)
}

#[test]
fn flat_market_without_trades_keeps_capital() {
    let (_, report) = run(&[10.0; 5], 1000.0, Box::new(Scripted::new(&[])));

    assert_eq!(report.holdings.len(), 5);
    for snapshot in &report.holdings {
        assert_eq!(snapshot.total, 1000.0);
        assert_eq!(snapshot.returns, 0.0);
        assert_eq!(snapshot.positions["X"], 0.0);
    }

    let metrics = report.metrics.unwrap();
    assert_eq!(
        metrics.get(SHARPE_RATIO),
        Some(MetricValue::Undefined(Degeneracy::ZeroVolatility))
    );
    assert_eq!(metrics.value(TOTAL_RETURN), Some(0.0));
    assert_eq!(report.stats.fills, 0);
}

#[test]
fn single_buy_is_filled_at_the_close_and_marked_afterwards() {
    let closes = [10.0, 10.0, 10.0, 12.0, 11.0];
    let (backtest, report) = run(&closes, 1000.0, Box::new(Scripted::new(&[(3, 1.0)])));

    assert_eq!(report.positions["X"], 1.0);
    assert_eq!(report.stats.fills, 1);

    //nothing held before the fill
    assert_eq!(report.holdings[1].total, 1000.0);

    let after = &report.holdings[2];
    assert!((after.cash - 989.99).abs() < 1e-9);
    assert!((after.commission - 0.01).abs() < 1e-12);
    assert!((after.total - 999.99).abs() < 1e-9);

    assert!((report.holdings[3].total - 1001.99).abs() < 1e-9);
    assert!((report.holdings[4].total - 1000.99).abs() < 1e-9);
    assert!((backtest.portfolio().cash() - 989.99).abs() < 1e-9);

    let metrics = report.metrics.unwrap();
    assert!((metrics.value(TOTAL_COMMISSION).unwrap() - 0.01).abs() < 1e-12);
}

#[test]
fn each_tick_cascades_before_the_next_market_event() {
    let (backtest, report) = run(
        &[10.0, 10.0, 10.0, 10.0],
        1000.0,
        Box::new(Scripted::new(&[(2, 1.0)])),
    );

    let kinds: Vec<EventKind> = backtest.journal().iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Market,
            EventKind::Market,
            EventKind::Signal,
            EventKind::Order,
            EventKind::Fill,
            EventKind::Market,
            EventKind::Market,
        ]
    );

    //signal, order and fill all belong to the same order on the same tick
    let cascade = &backtest.journal()[2..5];
    assert!(cascade.iter().all(|r| r.tick == 2));
    assert!(cascade.iter().all(|r| r.order_id == cascade[0].order_id));
    assert!(cascade.iter().all(|r| r.symbol.as_deref() == Some("X")));

    let steps: Vec<usize> = backtest.journal().iter().map(|r| r.step).collect();
    assert_eq!(steps, (0..7).collect::<Vec<_>>());
    assert_eq!(report.stats.total(), 4 + 3);
}

#[test]
fn every_tick_dispatches_one_market_event_and_terminates() {
    let script = [(1, 1.0), (2, -1.0), (2, 1.0), (5, -1.0)];
    let (backtest, report) = run(&[10.0; 6], 1000.0, Box::new(Scripted::new(&script)));

    assert_eq!(backtest.state(), BacktestState::Drained);
    assert_eq!(report.stats.markets, 6);
    assert_eq!(report.stats.signals, 4);
    assert_eq!(report.stats.orders, 4);
    assert_eq!(report.stats.fills, 4);
    assert_eq!(report.stats.total(), backtest.journal().len());
    assert_eq!(report.positions["X"], 0.0);
}

#[test]
fn strategies_never_see_future_bars() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = Probe {
        id: StrategyId::new("probe"),
        seen: Arc::clone(&seen),
    };
    run(&[1.0, 2.0, 3.0, 4.0, 5.0], 1000.0, Box::new(probe));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    for (i, &(tick, consumed, newest, current)) in seen.iter().enumerate() {
        assert_eq!(tick, i + 1);
        assert_eq!(consumed, tick);
        assert_eq!(newest, current);
        assert_eq!(current, i as i64 * DAY);
    }
}

#[test]
fn cash_conserves_costs_across_a_round_trip() {
    let closes = [10.0, 10.0, 11.0, 12.0, 12.0];
    let (_, report) = run(
        &closes,
        1000.0,
        Box::new(Scripted::new(&[(2, 1.0), (4, -1.0)])),
    );

    let last = report.holdings.last().unwrap();
    //bought at 10, sold at 12, commission on both legs
    let expected_cash = 1000.0 - 10.0 + 12.0 - 0.01 - 0.012;
    assert!((last.cash - expected_cash).abs() < 1e-9);
    assert!((last.commission - 0.022).abs() < 1e-12);
    assert_eq!(last.positions["X"], 0.0);

    for snapshot in &report.holdings {
        let invested: f64 = snapshot.market_values.values().sum();
        assert!((snapshot.total - (snapshot.cash + invested)).abs() < 1e-9);
    }
}

#[test]
fn identical_inputs_replay_identically() {
    let closes: Vec<f64> = (0..60)
        .map(|i| 100.0 + 10.0 * (i as f64 / 4.0).sin())
        .collect();

    let replay = || {
        let config = BacktestConfig {
            indicator_window: 5,
            ..BacktestConfig::new(10_000.0, &["X"])
        };
        let strategy = config.threshold_strategy(
            StrategyId::new("rsi"),
            30.0,
            70.0,
            Box::new(Rsi { period: 5 }),
        );
        let mut backtest = Backtest::new(
            config,
            feed(&closes),
            vec![Box::new(strategy)],
            Box::new(SimulatedExecution::default()),
        )
        .unwrap();
        let report = backtest.run().unwrap();
        (report, backtest.journal().to_vec())
    };

    let (first, first_journal) = replay();
    let (second, second_journal) = replay();
    assert!(first.stats.fills > 0);
    assert_eq!(first.holdings, second.holdings);
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first_journal, second_journal);
}

fn dated(days: &[i64], closes: &[f64]) -> Vec<Bar> {
    days.iter()
        .zip(closes)
        .map(|(&day, &c)| Bar::flat(day * DAY, c))
        .collect()
}

fn run_pair(x: Vec<Bar>, y: Vec<Bar>, script: &[(usize, f64)]) -> (Backtest, BacktestReport) {
    let mut feed = DataFeed::new(["X", "Y"]);
    feed.add_source("X", x).unwrap();
    feed.add_source("Y", y).unwrap();

    let config = BacktestConfig::new(1000.0, &["X", "Y"]);
    let mut backtest = Backtest::new(
        config,
        feed,
        vec![Box::new(Scripted::new(script))],
        Box::new(SimulatedExecution::default()),
    )
    .unwrap();
    let report = backtest.run().unwrap();
    (backtest, report)
}

#[test]
fn shorter_symbol_is_carried_forward_to_the_end() {
    let (backtest, report) = run_pair(
        bars(&[10.0, 11.0, 12.0, 13.0]),
        bars(&[20.0, 21.0, 22.0]),
        &[(1, 1.0)],
    );

    assert_eq!(report.stats.markets, 4);
    let last = report.holdings.last().unwrap();
    assert_eq!(last.timestamp, 3 * DAY);
    assert_eq!(last.market_values["X"], 13.0);
    assert_eq!(last.market_values["Y"], 0.0);
    assert_eq!(backtest.feed().latest_bar("Y").unwrap().close, 22.0);
}

#[test]
fn misaligned_symbols_replay_on_the_union_of_timestamps() {
    let x_closes = [10.0, 11.0, 12.0, 13.0];
    let (backtest, report) = run_pair(
        dated(&[0, 1, 2, 3], &x_closes),
        dated(&[0, 2, 3], &[20.0, 22.0, 23.0]),
        &[(2, 1.0)],
    );

    assert_eq!(report.stats.markets, 4);
    assert_eq!(backtest.feed().consumed("X").len(), 4);
    assert_eq!(backtest.feed().consumed("Y").len(), 3);

    let timestamps: Vec<i64> = report.holdings.iter().map(|h| h.timestamp).collect();
    assert_eq!(timestamps, vec![0, DAY, 2 * DAY, 3 * DAY]);

    //filled at the day one close of X, not a later bar
    let after = &report.holdings[1];
    assert_eq!(after.positions["X"], 1.0);
    assert!((after.cash - (1000.0 - 11.0 - 0.011)).abs() < 1e-9);

    for (snapshot, &close) in report.holdings.iter().zip(&x_closes) {
        assert_eq!(snapshot.market_values["X"], snapshot.positions["X"] * close);
    }
}

#[test]
fn custom_cost_model_and_sizer_are_honoured() {
    let config = BacktestConfig::new(1000.0, &["X"]);
    let flat_fee = |_cost: f64| (1.0, 0.5);
    let mut backtest = Backtest::with_cost_model(
        config,
        feed(&[10.0, 10.0, 10.0]),
        vec![Box::new(Scripted::new(&[(1, 1.0)]))],
        Box::new(flat_fee),
    )
    .unwrap()
    .with_sizer(Box::new(
        FixedQuantity::new(1.0).with_override(StrategyId::new("scripted"), 3.0),
    ));

    let report = backtest.run().unwrap();
    let last = report.holdings.last().unwrap();
    assert_eq!(last.positions["X"], 3.0);
    assert!((last.cash - (1000.0 - 30.0 - 1.0 - 0.5)).abs() < 1e-9);
    assert_eq!(last.slippage, 0.5);
}

#[test]
fn malformed_csv_is_rejected_before_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    writeln!(file, "86400000,10,10,10,10,1").unwrap();
    writeln!(file, "0,10,10,10,10,1").unwrap();

    let mut configuration = BacktestConfiguration::default();
    configuration.data.insert("X".into(), path);
    assert!(matches!(
        configuration.load_feed(),
        Err(DataError::NonIncreasingTimestamp { previous: 86_400_000, current: 0, .. })
    ));
}

#[test]
fn configured_run_from_csv_produces_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    for i in 0..40 {
        let close = 50.0 + 5.0 * (i as f64 / 3.0).sin();
        writeln!(file, "{},{},{},{},{},100", i * DAY, close, close, close, close).unwrap();
    }

    let mut configuration = BacktestConfiguration::default();
    configuration.data.insert("X".into(), path);
    configuration.strategy_params = StrategyParams::Threshold(ThresholdParams {
        window: 4,
        oversold: 30.0,
        overbought: 70.0,
    });

    let mut backtest = Backtest::with_cost_model(
        configuration.backtest_config(),
        configuration.load_feed().unwrap(),
        vec![configuration.build_strategy().unwrap()],
        Box::new(configuration.cost_model()),
    )
    .unwrap();
    let report = backtest.run().unwrap();

    assert_eq!(report.holdings.len(), 40);
    let metrics = report.metrics.unwrap();
    assert!(metrics.get(TOTAL_RETURN).is_some());
}
