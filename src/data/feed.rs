use crate::data::bar::{Bar, BarTuple};
use crate::data::error::DataError;
use indexmap::IndexMap;
use log::debug;

//one symbol's bars plus the replay cursor
//bars[..cursor] is the consumed history, nothing past cursor is ever exposed
#[derive(Debug, Clone, Default)]
struct Tape {
    bars: Vec<Bar>,
    cursor: usize,
    loaded: bool,
}

impl Tape {
    fn consumed(&self) -> &[Bar] {
        &self.bars[..self.cursor]
    }

    //exposes every bar stamped at or before the given time
    fn consume_until(&mut self, timestamp: i64) {
        while self
            .bars
            .get(self.cursor)
            .map_or(false, |bar| bar.timestamp <= timestamp)
        {
            self.cursor += 1;
        }
    }
}

//replays pre-loaded bars over the combined timestamp index of the tracked symbols
//a symbol with no bar at a step keeps its last bar, forward filled
#[derive(Debug, Clone)]
pub struct DataFeed {
    tapes: IndexMap<String, Tape>,
    //one entry per step, starting once every loaded symbol has a bar
    timeline: Vec<i64>,
    ticks: usize,
}

impl DataFeed {
    //creates an empty feed tracking the given symbols in order
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tapes = symbols
            .into_iter()
            .map(|s| (s.into(), Tape::default()))
            .collect();

        DataFeed {
            tapes,
            timeline: Vec::new(),
            ticks: 0,
        }
    }

    //attaches a bar source for a tracked symbol
    //timestamps must be strictly increasing, the source is rejected otherwise
    pub fn add_source(&mut self, symbol: &str, bars: Vec<Bar>) -> Result<(), DataError> {
        if self.ticks > 0 {
            return Err(DataError::ReplayStarted(symbol.to_string()));
        }

        let tape = self
            .tapes
            .get_mut(symbol)
            .ok_or_else(|| DataError::UnknownSymbol(symbol.to_string()))?;

        if tape.loaded {
            return Err(DataError::DuplicateSource(symbol.to_string()));
        }
        if bars.is_empty() {
            return Err(DataError::EmptySource(symbol.to_string()));
        }

        for pair in bars.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(DataError::NonIncreasingTimestamp {
                    symbol: symbol.to_string(),
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                });
            }
        }

        debug!("loaded {} bars for {}", bars.len(), symbol);
        tape.bars = bars;
        tape.cursor = 0;
        tape.loaded = true;
        self.rebuild_timeline();
        Ok(())
    }

    //union of all loaded timestamps from the latest first bar onwards
    //earlier bars become warm-up history consumed on the first step
    fn rebuild_timeline(&mut self) {
        let loaded = || self.tapes.values().filter(|tape| tape.loaded);
        let start = match loaded()
            .filter_map(|tape| tape.bars.first())
            .map(|bar| bar.timestamp)
            .max()
        {
            Some(start) => start,
            None => return,
        };

        let mut timeline: Vec<i64> = loaded()
            .flat_map(|tape| tape.bars.iter().map(|bar| bar.timestamp))
            .filter(|&ts| ts >= start)
            .collect();
        timeline.sort_unstable();
        timeline.dedup();
        self.timeline = timeline;
    }

    //ingestion hook for pre-parsed (timestamp, open, high, low, close, volume) tuples
    pub fn ingest<I>(&mut self, symbol: &str, rows: I) -> Result<(), DataError>
    where
        I: IntoIterator<Item = BarTuple>,
    {
        let bars = rows
            .into_iter()
            .map(|row| {
                Bar::try_from(row).map_err(|source| DataError::InvalidBar {
                    symbol: symbol.to_string(),
                    timestamp: row.0,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.add_source(symbol, bars)
    }

    //checks every tracked symbol has a source attached
    pub fn ensure_loaded(&self) -> Result<(), DataError> {
        match self.tapes.iter().find(|(_, tape)| !tape.loaded) {
            Some((symbol, _)) => Err(DataError::EmptySource(symbol.clone())),
            None => Ok(()),
        }
    }

    //true while the combined timeline has steps left
    pub fn has_more_data(&self) -> bool {
        self.ticks < self.timeline.len()
    }

    //moves to the next timestamp and exposes every bar up to it
    //returns false once the timeline is exhausted, which ends the replay
    pub fn advance(&mut self) -> bool {
        if !self.has_more_data() {
            return false;
        }
        let timestamp = self.timeline[self.ticks];

        for tape in self.tapes.values_mut() {
            tape.consume_until(timestamp);
        }
        self.ticks += 1;
        true
    }

    //the most recent n consumed bars, oldest first
    //empty when fewer than n bars have been consumed
    pub fn latest_bars(&self, symbol: &str, n: usize) -> &[Bar] {
        let consumed = self.consumed(symbol);
        if n == 0 || consumed.len() < n {
            return &[];
        }
        &consumed[consumed.len() - n..]
    }

    //close prices of the most recent n consumed bars, empty when not yet available
    pub fn latest_closes(&self, symbol: &str, n: usize) -> Vec<f64> {
        self.latest_bars(symbol, n).iter().map(|b| b.close).collect()
    }

    //the full consumed history for a symbol
    pub fn consumed(&self, symbol: &str) -> &[Bar] {
        self.tapes.get(symbol).map(Tape::consumed).unwrap_or(&[])
    }

    //returns the most recently consumed bar
    pub fn latest_bar(&self, symbol: &str) -> Option<&Bar> {
        self.consumed(symbol).last()
    }

    //timestamp of the current step, none before the first advance
    pub fn current_timestamp(&self) -> Option<i64> {
        self.ticks
            .checked_sub(1)
            .and_then(|step| self.timeline.get(step))
            .copied()
    }

    //timestamp of the first step
    pub fn first_timestamp(&self) -> Option<i64> {
        self.timeline.first().copied()
    }

    //tracked symbols in configuration order
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.tapes.keys().map(String::as_str)
    }

    //number of completed advances
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    //number of steps a full replay will take
    pub fn total_steps(&self) -> usize {
        self.timeline.len()
    }
}
