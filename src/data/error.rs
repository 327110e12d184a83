use crate::data::bar::BarError;
use thiserror::Error;

//failures of the external bar source, all fatal before the replay starts
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read bar source: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed bar source at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("Invalid bar for {symbol} at {timestamp}: {source}")]
    InvalidBar {
        symbol: String,
        timestamp: i64,
        #[source]
        source: BarError,
    },
    #[error("Timestamps for {symbol} must be strictly increasing: {current} follows {previous}")]
    NonIncreasingTimestamp {
        symbol: String,
        previous: i64,
        current: i64,
    },
    #[error("Symbol {0} is not tracked by the data feed")]
    UnknownSymbol(String),
    #[error("Symbol {0} was already loaded")]
    DuplicateSource(String),
    #[error("No bars loaded for symbol {0}")]
    EmptySource(String),
    #[error("Cannot attach a source for {0} after the replay has started")]
    ReplayStarted(String),
}
