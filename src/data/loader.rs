use crate::data::bar::Bar;
use crate::data::error::DataError;
use chrono::DateTime;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

//loads bars for one symbol from a csv file with a header row
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>, DataError> {
    let file = File::open(path.as_ref())?;
    read_csv(file)
}

//reads bars from any csv reader, rows stay in file order
//ordering is validated by the data feed on ingestion, never repaired here
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        //header is line 1
        let line = index + 2;
        let record: CsvRecord = result.map_err(|e| DataError::MalformedRow {
            line,
            reason: e.to_string(),
        })?;

        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| {
            DataError::MalformedRow {
                line,
                reason: format!("unparseable timestamp '{}'", record.timestamp),
            }
        })?;

        let bar = Bar::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        )
        .map_err(|e| DataError::MalformedRow {
            line,
            reason: e.to_string(),
        })?;

        bars.push(bar);
    }

    Ok(bars)
}

//accepts integer unix milliseconds or an rfc3339 string
fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
