use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

//reserved holdings keys, everything else is a symbol
pub const CASH: &str = "cash";
pub const COMMISSION: &str = "commission";
pub const SLIPPAGE: &str = "slippage";
pub const TOTAL: &str = "total";
pub const RETURNS: &str = "returns";
pub const EQUITY_CURVE: &str = "equity_curve";

pub const RESERVED_KEYS: [&str; 6] = [CASH, COMMISSION, SLIPPAGE, TOTAL, RETURNS, EQUITY_CURVE];

//one timestamped valuation of the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    pub timestamp: i64,

    //signed quantity held per symbol
    pub positions: IndexMap<String, f64>,

    //position x last close per symbol
    pub market_values: IndexMap<String, f64>,

    pub cash: f64,

    //cumulative costs paid so far
    pub commission: f64,
    pub slippage: f64,

    //cash + sum of market values
    pub total: f64,

    //bar-to-bar return, zero on the first entry
    pub returns: f64,

    //compounded cumulative return
    pub equity_curve: f64,
}

impl HoldingsSnapshot {
    //a flat snapshot holding only cash
    pub fn seed<'a, I>(timestamp: i64, symbols: I, initial_capital: f64) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let positions: IndexMap<String, f64> =
            symbols.into_iter().map(|s| (s.to_string(), 0.0)).collect();
        let market_values = positions.clone();

        HoldingsSnapshot {
            timestamp,
            positions,
            market_values,
            cash: initial_capital,
            commission: 0.0,
            slippage: 0.0,
            total: initial_capital,
            returns: 0.0,
            equity_curve: 0.0,
        }
    }

    //looks up a reserved key or a symbol's market value
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            CASH => Some(self.cash),
            COMMISSION => Some(self.commission),
            SLIPPAGE => Some(self.slippage),
            TOTAL => Some(self.total),
            RETURNS => Some(self.returns),
            EQUITY_CURVE => Some(self.equity_curve),
            symbol => self.market_values.get(symbol).copied(),
        }
    }

    //sum of marked position values
    pub fn invested(&self) -> f64 {
        self.market_values.values().sum()
    }
}
