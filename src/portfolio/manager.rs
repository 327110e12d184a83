use crate::data::DataFeed;
use crate::engine::event::{EventError, Fill, Order, Signal};
use crate::metrics::{MetricsError, PerformanceMetrics};
use crate::portfolio::ledger::HoldingsSnapshot;
use crate::portfolio::sizing::{FixedQuantity, Sizer};
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("Fill {0} was already settled")]
    DuplicateFill(u64),
    #[error("Symbol {0} is not tracked by the portfolio")]
    UnknownSymbol(String),
    #[error("No consumed bar for {0} to mark against")]
    NoMarketData(String),
    #[error("Holdings timestamp {current} does not follow {previous}")]
    NonMonotonicTimestamp { previous: i64, current: i64 },
    #[error("Sizer produced an invalid order: {0}")]
    InvalidOrder(#[from] EventError),
}

//position and cash ledgers plus their timestamped history
pub struct Portfolio {
    initial_capital: f64,

    //symbol -> signed quantity, changed only by on_fill
    current_positions: IndexMap<String, f64>,

    //latest snapshot, consistent with the last history entry after every update
    current_holdings: HoldingsSnapshot,

    //append-only, strictly increasing timestamps
    all_holdings: Vec<HoldingsSnapshot>,

    settled_fills: HashSet<u64>,
    next_order_id: u64,
    sizer: Box<dyn Sizer>,
}

impl Portfolio {
    //creates a flat portfolio seeded at the first available bar timestamp
    pub fn new<'a, I>(symbols: I, initial_capital: f64, start_timestamp: i64) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let current_holdings =
            HoldingsSnapshot::seed(start_timestamp, symbols, initial_capital);

        Portfolio {
            initial_capital,
            current_positions: current_holdings.positions.clone(),
            current_holdings,
            all_holdings: Vec::new(),
            settled_fills: HashSet::new(),
            next_order_id: 1,
            sizer: Box::new(FixedQuantity::default()),
        }
    }

    //replaces the sizing policy
    pub fn with_sizer(mut self, sizer: Box<dyn Sizer>) -> Self {
        self.sizer = sizer;
        self
    }

    //maps a signal to exactly one market order, ledgers are untouched
    pub fn on_signal(&mut self, signal: &Signal) -> Result<Order, PortfolioError> {
        if !self.current_positions.contains_key(&signal.symbol) {
            return Err(PortfolioError::UnknownSymbol(signal.symbol.clone()));
        }

        let quantity = self.sizer.quantity(signal);
        let order = Order::market(
            self.next_order_id,
            signal.target.clone(),
            signal.symbol.clone(),
            quantity,
            signal.direction(),
        )?;
        self.next_order_id += 1;

        debug!(
            "order {} from signal {:+} on {}: {} {}",
            order.id, signal.strength, order.symbol, order.direction, order.quantity
        );
        Ok(order)
    }

    //settles a fill against the position and cash ledgers
    //a fill id seen before is rejected and leaves the ledgers unchanged
    pub fn on_fill(&mut self, fill: &Fill) -> Result<(), PortfolioError> {
        if self.settled_fills.contains(&fill.id) {
            warn!("rejected duplicate delivery of fill {}", fill.id);
            return Err(PortfolioError::DuplicateFill(fill.id));
        }

        let position = self
            .current_positions
            .get_mut(&fill.symbol)
            .ok_or_else(|| PortfolioError::UnknownSymbol(fill.symbol.clone()))?;
        *position += fill.signed_quantity();

        let holdings = &mut self.current_holdings;
        holdings.positions.insert(fill.symbol.clone(), *position);
        holdings.cash += fill.cash_delta();
        holdings.commission += fill.commission;
        holdings.slippage += fill.slippage;

        self.settled_fills.insert(fill.id);
        debug!(
            "settled fill {}: {} {} {}, cash {:.4}",
            fill.id, fill.direction, fill.quantity, fill.symbol, holdings.cash
        );
        Ok(())
    }

    //marks every symbol to its latest consumed close and appends a history entry
    pub fn update(&mut self, feed: &DataFeed) -> Result<&HoldingsSnapshot, PortfolioError> {
        let timestamp = feed
            .current_timestamp()
            .ok_or_else(|| PortfolioError::NoMarketData("*".to_string()))?;

        if let Some(previous) = self.all_holdings.last() {
            if timestamp <= previous.timestamp {
                return Err(PortfolioError::NonMonotonicTimestamp {
                    previous: previous.timestamp,
                    current: timestamp,
                });
            }
        }

        let mut market_values = IndexMap::with_capacity(self.current_positions.len());
        for (symbol, &quantity) in &self.current_positions {
            let close = feed
                .latest_bar(symbol)
                .map(|bar| bar.close)
                .ok_or_else(|| PortfolioError::NoMarketData(symbol.clone()))?;
            market_values.insert(symbol.clone(), quantity * close);
        }

        let holdings = &mut self.current_holdings;
        holdings.timestamp = timestamp;
        holdings.positions = self.current_positions.clone();
        holdings.market_values = market_values;
        holdings.total = holdings.cash + holdings.invested();

        match self.all_holdings.last() {
            Some(previous) => {
                holdings.returns = holdings.total / previous.total - 1.0;
                holdings.equity_curve =
                    (previous.equity_curve + 1.0) * (holdings.returns + 1.0) - 1.0;
            }
            None => {
                holdings.returns = 0.0;
                holdings.equity_curve = 0.0;
            }
        }

        self.all_holdings.push(holdings.clone());
        Ok(&self.current_holdings)
    }

    //performance statistics over the full history
    pub fn get_metrics(&self) -> Result<PerformanceMetrics, MetricsError> {
        PerformanceMetrics::from_history(&self.all_holdings, self.initial_capital)
    }

    pub fn position(&self, symbol: &str) -> f64 {
        self.current_positions.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn current_positions(&self) -> &IndexMap<String, f64> {
        &self.current_positions
    }

    pub fn current_holdings(&self) -> &HoldingsSnapshot {
        &self.current_holdings
    }

    pub fn all_holdings(&self) -> &[HoldingsSnapshot] {
        &self.all_holdings
    }

    pub fn cash(&self) -> f64 {
        self.current_holdings.cash
    }

    pub fn fill_count(&self) -> usize {
        self.settled_fills.len()
    }
}
