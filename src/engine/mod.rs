pub mod backtest;
pub mod event;
pub mod execution;

pub use backtest::{
    Backtest, BacktestConfig, BacktestError, BacktestReport, BacktestState, DispatchRecord,
    DispatchStats,
};
pub use event::{
    Direction, Event, EventError, EventKind, EventQueue, Fill, MarketEvent, Order, OrderType,
    Signal, StrategyId,
};
pub use execution::{
    CostModel, ExecutionError, ExecutionHandler, PercentageCostModel, SimulatedExecution,
    TransactionCosts,
};
