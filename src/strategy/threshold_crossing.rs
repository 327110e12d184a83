use crate::data::DataFeed;
use crate::engine::event::{Signal, StrategyId};
use crate::strategy::{Indicator, Rsi, Strategy};
use indexmap::IndexMap;
use log::debug;

//oscillator threshold strategy
//goes long when the oscillator reads oversold and exits when it reads overbought
pub struct ThresholdCrossingStrategy {
    id: StrategyId,
    window: usize,
    oversold: f64,
    overbought: f64,
    indicator: Box<dyn Indicator>,

    //state: currently long, per symbol
    long: IndexMap<String, bool>,
}

impl ThresholdCrossingStrategy {
    pub fn new<'a, I>(
        id: StrategyId,
        symbols: I,
        window: usize,
        oversold: f64,
        overbought: f64,
        indicator: Box<dyn Indicator>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        ThresholdCrossingStrategy {
            id,
            window,
            oversold,
            overbought,
            indicator,
            long: symbols.into_iter().map(|s| (s.to_string(), false)).collect(),
        }
    }

    //rsi over the window with the usual 30/70 bands
    pub fn rsi<'a, I>(id: StrategyId, symbols: I, window: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::new(id, symbols, window, 30.0, 70.0, Box::new(Rsi { period: window }))
    }

    pub fn is_long(&self, symbol: &str) -> bool {
        self.long.get(symbol).copied().unwrap_or(false)
    }
}

impl Strategy for ThresholdCrossingStrategy {
    fn id(&self) -> &StrategyId {
        &self.id
    }

    fn calculate_signals(&mut self, feed: &DataFeed) -> Vec<Signal> {
        let mut signals = Vec::new();

        for (symbol, long) in self.long.iter_mut() {
            //need window + 1 closes, otherwise not ready yet
            let closes = feed.latest_closes(symbol, self.window + 1);
            if closes.len() < self.window + 1 {
                continue;
            }

            let value = match self.indicator.value(&closes) {
                Some(v) => v,
                None => continue,
            };

            let strength = if value < self.oversold && !*long {
                1.0
            } else if value > self.overbought && *long {
                -1.0
            } else {
                continue;
            };

            let timestamp = match feed.latest_bar(symbol) {
                Some(bar) => bar.timestamp,
                None => continue,
            };

            *long = strength > 0.0;
            debug!(
                "{} signal {:+} on {} at {} (oscillator {:.2})",
                self.id, strength, symbol, timestamp, value
            );
            //strength is always +1 or -1 here
            signals.push(Signal {
                target: self.id.clone(),
                symbol: symbol.clone(),
                timestamp,
                strength,
            });
        }

        signals
    }
}
