use crate::data::{load_csv, DataError, DataFeed};
use crate::engine::{BacktestConfig, BacktestError, PercentageCostModel, StrategyId};
use crate::strategy::sma_crossover::SmaCrossoverStrategy;
use crate::strategy::threshold_crossing::ThresholdCrossingStrategy;
use crate::strategy::{Rsi, Strategy};
use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//strategy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    ThresholdCrossing,
    SmaCrossover,
}

impl StrategyType {
    //parse strategy type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rsi" | "threshold" | "threshold_crossing" => Some(StrategyType::ThresholdCrossing),
            "sma" | "sma_crossover" => Some(StrategyType::SmaCrossover),
            _ => None,
        }
    }

    pub fn id(&self) -> StrategyId {
        match self {
            StrategyType::ThresholdCrossing => StrategyId::new("threshold"),
            StrategyType::SmaCrossover => StrategyId::new("sma"),
        }
    }
}

//oscillator threshold parameters, rsi over the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub window: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        ThresholdParams {
            window: 20,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

//sma crossover strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmaParams {
    pub fast_window: usize,
    pub slow_window: usize,
}

impl Default for SmaParams {
    fn default() -> Self {
        SmaParams {
            fast_window: 20,
            slow_window: 50,
        }
    }
}

//strategy-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategyParams {
    Threshold(ThresholdParams),
    Sma(SmaParams),
}

impl StrategyParams {
    pub fn strategy_type(&self) -> StrategyType {
        match self {
            StrategyParams::Threshold(_) => StrategyType::ThresholdCrossing,
            StrategyParams::Sma(_) => StrategyType::SmaCrossover,
        }
    }

    //rejects parameters under which the strategy could never trade
    pub fn validate(&self) -> Result<(), BacktestError> {
        match self {
            StrategyParams::Threshold(p) => {
                if p.window == 0 {
                    return Err(BacktestError::InvalidConfig(
                        "oscillator window must be at least 1".to_string(),
                    ));
                }
                if !(p.oversold < p.overbought) {
                    return Err(BacktestError::InvalidConfig(format!(
                        "oversold band {} must be below overbought band {}",
                        p.oversold, p.overbought
                    )));
                }
            }
            StrategyParams::Sma(p) => {
                if !(p.fast_window > 0 && p.fast_window < p.slow_window) {
                    return Err(BacktestError::InvalidConfig(format!(
                        "sma windows need 0 < fast < slow, got fast {} slow {}",
                        p.fast_window, p.slow_window
                    )));
                }
            }
        }
        Ok(())
    }
}

//complete run configuration as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfiguration {
    //one csv file per symbol, replayed in this order
    pub data: IndexMap<String, PathBuf>,

    //account settings
    pub initial_capital: f64,
    pub order_quantity: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,

    //strategy
    pub strategy_params: StrategyParams,

    //optional output path for the holdings history
    pub output_holdings_csv: Option<PathBuf>,
}

impl Default for BacktestConfiguration {
    fn default() -> Self {
        let cost = PercentageCostModel::default();
        BacktestConfiguration {
            data: IndexMap::new(),
            initial_capital: 100000.0,
            order_quantity: 1.0,
            commission_rate: cost.commission_rate,
            slippage_rate: cost.slippage_rate,
            strategy_params: StrategyParams::Threshold(ThresholdParams::default()),
            output_holdings_csv: None,
        }
    }
}

impl BacktestConfiguration {
    //engine configuration for this run
    pub fn backtest_config(&self) -> BacktestConfig {
        let indicator_window = match &self.strategy_params {
            StrategyParams::Threshold(p) => p.window,
            StrategyParams::Sma(p) => p.slow_window,
        };

        BacktestConfig {
            initial_capital: self.initial_capital,
            symbols: self.data.keys().cloned().collect(),
            order_quantity: self.order_quantity,
            indicator_window,
        }
    }

    pub fn cost_model(&self) -> PercentageCostModel {
        PercentageCostModel::new(self.commission_rate, self.slippage_rate)
    }

    //a copy with the strategy's main window replaced, the slow window for sma
    pub fn with_window(&self, window: usize) -> Result<Self, BacktestError> {
        let mut configuration = self.clone();
        match &mut configuration.strategy_params {
            StrategyParams::Threshold(p) => p.window = window,
            StrategyParams::Sma(p) => p.slow_window = window,
        }
        configuration.strategy_params.validate()?;
        Ok(configuration)
    }

    //builds a fresh strategy instance, one per run
    pub fn build_strategy(&self) -> Result<Box<dyn Strategy>, BacktestError> {
        self.strategy_params.validate()?;

        let id = self.strategy_params.strategy_type().id();
        let symbols = self.data.keys().map(String::as_str);

        let strategy: Box<dyn Strategy> = match &self.strategy_params {
            StrategyParams::Threshold(p) => Box::new(ThresholdCrossingStrategy::new(
                id,
                symbols,
                p.window,
                p.oversold,
                p.overbought,
                Box::new(Rsi { period: p.window }),
            )),
            StrategyParams::Sma(p) => Box::new(SmaCrossoverStrategy::new(
                id,
                symbols,
                p.fast_window,
                p.slow_window,
            )),
        };
        Ok(strategy)
    }

    //loads every configured csv into a new data feed
    pub fn load_feed(&self) -> Result<DataFeed, DataError> {
        let mut feed = DataFeed::new(self.data.keys().cloned());
        for (symbol, path) in &self.data {
            let bars = load_csv(path)?;
            feed.add_source(symbol, bars)?;
        }
        Ok(feed)
    }

    //load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: BacktestConfiguration = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
