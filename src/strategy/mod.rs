pub mod sma_crossover;
pub mod threshold_crossing;

use crate::data::DataFeed;
use crate::engine::event::{Signal, StrategyId};

//strategy interface that all strategies must implement
//strategies only ever see bars the feed has already consumed
pub trait Strategy: Send {
    //identifier carried by every signal this strategy emits
    fn id(&self) -> &StrategyId;

    //called once per market tick, after the feed has advanced
    fn calculate_signals(&mut self, feed: &DataFeed) -> Vec<Signal>;
}

//an oscillator reading over a window of closes, oldest first
pub trait Indicator: Send {
    fn value(&self, closes: &[f64]) -> Option<f64>;
}

impl<F> Indicator for F
where
    F: Fn(&[f64]) -> Option<f64> + Send,
{
    fn value(&self, closes: &[f64]) -> Option<f64> {
        self(closes)
    }
}

//relative strength index over the whole supplied window
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    pub period: usize,
}

impl Indicator for Rsi {
    fn value(&self, closes: &[f64]) -> Option<f64> {
        rsi(closes, self.period)
    }
}

//helper function to calculate simple moving average
pub fn sma(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}

//helper function to calculate relative strength index
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &changes[changes.len() - period..];

    let avg_gain = recent.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let avg_loss = -recent.iter().filter(|c| **c < 0.0).sum::<f64>() / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}
