use crate::data::DataFeed;
use crate::engine::event::{Signal, StrategyId};
use crate::strategy::{sma, Strategy};
use indexmap::IndexMap;
use log::debug;

//sma crossover strategy
//goes long when the fast sma is above the slow sma, exits when it drops below
#[derive(Debug, Clone)]
pub struct SmaCrossoverStrategy {
    id: StrategyId,
    fast_window: usize,
    slow_window: usize,

    //state: in the market, per symbol
    invested: IndexMap<String, bool>,
}

impl SmaCrossoverStrategy {
    pub fn new<'a, I>(id: StrategyId, symbols: I, fast_window: usize, slow_window: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        SmaCrossoverStrategy {
            id,
            fast_window,
            slow_window,
            invested: symbols.into_iter().map(|s| (s.to_string(), false)).collect(),
        }
    }

    //returns +1 to enter, -1 to exit, none to hold
    fn crossover(&self, fast_sma: f64, slow_sma: f64, invested: bool) -> Option<f64> {
        if fast_sma > slow_sma && !invested {
            Some(1.0)
        } else if fast_sma < slow_sma && invested {
            Some(-1.0)
        } else {
            None
        }
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn id(&self) -> &StrategyId {
        &self.id
    }

    fn calculate_signals(&mut self, feed: &DataFeed) -> Vec<Signal> {
        let mut signals = Vec::new();
        let symbols: Vec<String> = self.invested.keys().cloned().collect();

        for symbol in symbols {
            //need at least slow_window bars to calculate
            let closes = feed.latest_closes(&symbol, self.slow_window);
            if closes.is_empty() {
                continue;
            }

            let fast_prices = &closes[closes.len().saturating_sub(self.fast_window)..];
            let (fast_sma, slow_sma) = match (sma(fast_prices), sma(&closes)) {
                (Some(fast), Some(slow)) => (fast, slow),
                _ => continue,
            };

            let invested = self.invested.get(&symbol).copied().unwrap_or(false);
            let strength = match self.crossover(fast_sma, slow_sma, invested) {
                Some(s) => s,
                None => continue,
            };

            let timestamp = match feed.latest_bar(&symbol) {
                Some(bar) => bar.timestamp,
                None => continue,
            };

            debug!(
                "{} crossover {:+} on {}: fast {:.4} slow {:.4}",
                self.id, strength, symbol, fast_sma, slow_sma
            );
            self.invested.insert(symbol.clone(), strength > 0.0);
            signals.push(Signal {
                target: self.id.clone(),
                symbol,
                timestamp,
                strength,
            });
        }

        signals
    }
}
