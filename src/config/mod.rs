pub mod backtest_config;

pub use backtest_config::{
    BacktestConfiguration, SmaParams, StrategyParams, StrategyType, ThresholdParams,
};
