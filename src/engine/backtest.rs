use crate::data::{DataError, DataFeed};
use crate::engine::event::{Event, EventKind, EventQueue, MarketEvent, StrategyId};
use crate::engine::execution::{CostModel, ExecutionError, ExecutionHandler, SimulatedExecution};
use crate::metrics::{MetricsError, PerformanceMetrics};
use crate::portfolio::ledger::RESERVED_KEYS;
use crate::portfolio::{FixedQuantity, HoldingsSnapshot, Portfolio, PortfolioError, Sizer};
use crate::strategy::threshold_crossing::ThresholdCrossingStrategy;
use crate::strategy::{Indicator, Strategy};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Malformed bar source: {0}")]
    MalformedBarSource(#[from] DataError),
    #[error("Strategy {0} is registered more than once")]
    DuplicateStrategy(StrategyId),
    #[error("Event targets unregistered strategy {0}")]
    UnknownStrategy(StrategyId),
    #[error("Backtest has already been run")]
    AlreadyRun,
    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionError),
    #[error("Portfolio rejected event: {0}")]
    Portfolio(#[from] PortfolioError),
}

//configuration for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub symbols: Vec<String>,
    pub order_quantity: f64,
    pub indicator_window: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100000.0,
            symbols: Vec::new(),
            order_quantity: 1.0,
            indicator_window: 20,
        }
    }
}

impl BacktestConfig {
    pub fn new(initial_capital: f64, symbols: &[&str]) -> Self {
        BacktestConfig {
            initial_capital,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        let invalid = |msg: String| Err(BacktestError::InvalidConfig(msg));

        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return invalid(format!(
                "initial capital must be positive, got {}",
                self.initial_capital
            ));
        }
        if !(self.order_quantity.is_finite() && self.order_quantity > 0.0) {
            return invalid(format!(
                "order quantity must be positive, got {}",
                self.order_quantity
            ));
        }
        if self.indicator_window == 0 {
            return invalid("indicator window must be at least 1".to_string());
        }
        if self.symbols.is_empty() {
            return invalid("at least one symbol is required".to_string());
        }
        let unique: IndexSet<&str> = self.symbols.iter().map(String::as_str).collect();
        if unique.len() != self.symbols.len() {
            return invalid("symbols must be unique".to_string());
        }
        if let Some(reserved) = unique.iter().find(|s| RESERVED_KEYS.contains(*s)) {
            return invalid(format!("symbol '{}' is a reserved holdings key", reserved));
        }
        Ok(())
    }

    //the reference oscillator strategy over this configuration's symbols and window
    pub fn threshold_strategy(
        &self,
        id: StrategyId,
        oversold: f64,
        overbought: f64,
        indicator: Box<dyn Indicator>,
    ) -> ThresholdCrossingStrategy {
        ThresholdCrossingStrategy::new(
            id,
            self.symbols.iter().map(String::as_str),
            self.indicator_window,
            oversold,
            overbought,
            indicator,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktestState {
    NotStarted,
    Running,
    Drained,
}

//one dispatched event, in dispatch order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub step: usize,
    pub tick: usize,
    pub kind: EventKind,
    pub symbol: Option<String>,
    //order id handled or produced: the order a signal became, an order's own id, a fill's order
    pub order_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub markets: usize,
    pub signals: usize,
    pub orders: usize,
    pub fills: usize,
}

impl DispatchStats {
    pub fn total(&self) -> usize {
        self.markets + self.signals + self.orders + self.fills
    }

    fn count(&mut self, kind: EventKind) {
        match kind {
            EventKind::Market => self.markets += 1,
            EventKind::Signal => self.signals += 1,
            EventKind::Order => self.orders += 1,
            EventKind::Fill => self.fills += 1,
        }
    }
}

//result of a backtest
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub metrics: Result<PerformanceMetrics, MetricsError>,
    pub holdings: Vec<HoldingsSnapshot>,
    pub positions: IndexMap<String, f64>,
    pub stats: DispatchStats,
}

//owns every component of one run and drives the event loop
pub struct Backtest {
    config: BacktestConfig,
    feed: DataFeed,
    portfolio: Portfolio,
    execution: Box<dyn ExecutionHandler>,
    strategies: Vec<Box<dyn Strategy>>,
    registered: HashSet<StrategyId>,
    queue: EventQueue,
    state: BacktestState,
    stats: DispatchStats,
    journal: Vec<DispatchRecord>,
}

impl Backtest {
    //wires a run together, rejecting bad configuration before anything is replayed
    pub fn new(
        config: BacktestConfig,
        feed: DataFeed,
        strategies: Vec<Box<dyn Strategy>>,
        execution: Box<dyn ExecutionHandler>,
    ) -> Result<Self, BacktestError> {
        config.validate()?;

        let feed_symbols: Vec<&str> = feed.symbols().collect();
        if feed_symbols != config.symbols.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(BacktestError::InvalidConfig(format!(
                "feed tracks {:?} but configuration lists {:?}",
                feed_symbols, config.symbols
            )));
        }
        feed.ensure_loaded()?;

        if strategies.is_empty() {
            return Err(BacktestError::InvalidConfig(
                "at least one strategy is required".to_string(),
            ));
        }
        let mut registered = HashSet::new();
        for strategy in &strategies {
            if !registered.insert(strategy.id().clone()) {
                return Err(BacktestError::DuplicateStrategy(strategy.id().clone()));
            }
        }

        let start = feed
            .first_timestamp()
            .ok_or_else(|| BacktestError::InvalidConfig("no bars loaded".to_string()))?;
        let portfolio = Portfolio::new(
            config.symbols.iter().map(String::as_str),
            config.initial_capital,
            start,
        )
        .with_sizer(Box::new(FixedQuantity::new(config.order_quantity)));

        Ok(Backtest {
            config,
            feed,
            portfolio,
            execution,
            strategies,
            registered,
            queue: EventQueue::new(),
            state: BacktestState::NotStarted,
            stats: DispatchStats::default(),
            journal: Vec::new(),
        })
    }

    //a run with the simulated execution handler and the given cost model
    pub fn with_cost_model(
        config: BacktestConfig,
        feed: DataFeed,
        strategies: Vec<Box<dyn Strategy>>,
        cost_model: Box<dyn CostModel>,
    ) -> Result<Self, BacktestError> {
        Self::new(
            config,
            feed,
            strategies,
            Box::new(SimulatedExecution::new(cost_model)),
        )
    }

    //replaces the portfolio's sizing policy before the run starts
    pub fn with_sizer(mut self, sizer: Box<dyn Sizer>) -> Self {
        self.portfolio = self.portfolio.with_sizer(sizer);
        self
    }

    //replays every bar, then computes metrics exactly once
    pub fn run(&mut self) -> Result<BacktestReport, BacktestError> {
        if self.state != BacktestState::NotStarted {
            return Err(BacktestError::AlreadyRun);
        }

        info!(
            "starting backtest over {:?} with {} steps and capital {:.2}",
            self.config.symbols,
            self.feed.total_steps(),
            self.config.initial_capital
        );

        self.state = BacktestState::Running;
        self.step_feed();

        while self.state == BacktestState::Running {
            let mut marked = false;
            while let Some(event) = self.queue.pop() {
                marked |= event.kind() == EventKind::Market;
                self.dispatch(event)?;
            }

            //the tick's trades are settled, value them at this bar
            if marked {
                self.portfolio.update(&self.feed)?;
            }

            self.step_feed();
        }

        info!(
            "backtest drained after {} ticks: {} signals, {} orders, {} fills",
            self.stats.markets, self.stats.signals, self.stats.orders, self.stats.fills
        );

        let metrics = self.portfolio.get_metrics();
        if let Err(e) = &metrics {
            warn!("metrics unavailable: {}", e);
        }

        Ok(BacktestReport {
            metrics,
            holdings: self.portfolio.all_holdings().to_vec(),
            positions: self.portfolio.current_positions().clone(),
            stats: self.stats,
        })
    }

    //advances the feed, queuing a market tick or draining the run
    fn step_feed(&mut self) {
        if self.feed.advance() {
            if let Some(timestamp) = self.feed.current_timestamp() {
                self.queue.push(Event::Market(MarketEvent { timestamp }));
            }
        } else {
            self.state = BacktestState::Drained;
        }
    }

    fn ensure_registered(&self, event: &Event) -> Result<(), BacktestError> {
        match event.target() {
            Some(target) if !self.registered.contains(target) => {
                Err(BacktestError::UnknownStrategy(target.clone()))
            }
            _ => Ok(()),
        }
    }

    //routes one event to exactly one handler
    fn dispatch(&mut self, event: Event) -> Result<(), BacktestError> {
        self.ensure_registered(&event)?;

        let kind = event.kind();
        let (symbol, order_id) = match event {
            Event::Market(_) => {
                for strategy in self.strategies.iter_mut() {
                    for signal in strategy.calculate_signals(&self.feed) {
                        self.queue.push(Event::Signal(signal));
                    }
                }
                (None, None)
            }
            Event::Signal(signal) => {
                let order = self.portfolio.on_signal(&signal)?;
                let id = order.id;
                self.queue.push(Event::Order(order));
                (Some(signal.symbol), Some(id))
            }
            Event::Order(order) => {
                let fill = self.execution.execute_order(&order, &self.feed)?;
                self.queue.push(Event::Fill(fill));
                (Some(order.symbol), Some(order.id))
            }
            Event::Fill(fill) => {
                self.portfolio.on_fill(&fill)?;
                (Some(fill.symbol), Some(fill.order_id))
            }
        };

        debug!("dispatched {:?} {:?} at tick {}", kind, symbol, self.feed.ticks());
        self.stats.count(kind);
        self.journal.push(DispatchRecord {
            step: self.journal.len(),
            tick: self.feed.ticks(),
            kind,
            symbol,
            order_id,
        });
        Ok(())
    }

    pub fn state(&self) -> BacktestState {
        self.state
    }

    //returns a reference to the portfolio
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn feed(&self) -> &DataFeed {
        &self.feed
    }

    pub fn journal(&self) -> &[DispatchRecord] {
        &self.journal
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
