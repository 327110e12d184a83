//event-driven backtesting engine replaying historical bars through strategies and a portfolio

pub mod config;
pub mod data;
pub mod engine;
pub mod metrics;
pub mod portfolio;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BacktestConfiguration, SmaParams, StrategyParams, StrategyType, ThresholdParams,
    };
    pub use crate::data::{load_csv, read_csv, Bar, DataError, DataFeed};
    pub use crate::engine::{
        Backtest, BacktestConfig, BacktestError, BacktestReport, BacktestState, CostModel,
        Direction, Event, ExecutionHandler, Fill, Order, PercentageCostModel, Signal,
        SimulatedExecution, StrategyId,
    };
    pub use crate::metrics::{Degeneracy, MetricValue, MetricsError, PerformanceMetrics};
    pub use crate::portfolio::{FixedQuantity, HoldingsSnapshot, Portfolio, Sizer};
    pub use crate::strategy::{
        sma_crossover::SmaCrossoverStrategy, threshold_crossing::ThresholdCrossingStrategy,
        Indicator, Rsi, Strategy,
    };
}
