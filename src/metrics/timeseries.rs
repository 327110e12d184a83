use crate::metrics::summary::MetricsError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

//bar spacing recognised for annualisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingFrequency {
    Daily,
    Hourly,
    Minute,
}

impl SamplingFrequency {
    //bars per year on a 365-day calendar
    pub fn periods_per_year(&self) -> f64 {
        match self {
            SamplingFrequency::Daily => 365.0,
            SamplingFrequency::Hourly => 365.0 * 24.0,
            SamplingFrequency::Minute => 365.0 * 24.0 * 60.0,
        }
    }

    pub fn from_spacing(spacing_ms: i64) -> Option<Self> {
        match spacing_ms {
            DAY_MS => Some(SamplingFrequency::Daily),
            HOUR_MS => Some(SamplingFrequency::Hourly),
            MINUTE_MS => Some(SamplingFrequency::Minute),
            _ => None,
        }
    }
}

impl fmt::Display for SamplingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingFrequency::Daily => f.write_str("daily"),
            SamplingFrequency::Hourly => f.write_str("hourly"),
            SamplingFrequency::Minute => f.write_str("minute"),
        }
    }
}

//infers the bar frequency from the smallest gap between consecutive timestamps
//larger gaps (weekends, sessions) do not change the bar size
pub fn infer_frequency(timestamps: &[i64]) -> Result<SamplingFrequency, MetricsError> {
    if timestamps.len() < 2 {
        return Err(MetricsError::InsufficientHistory {
            entries: timestamps.len(),
        });
    }

    let spacing = timestamps
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .min()
        .unwrap_or(0);

    SamplingFrequency::from_spacing(spacing)
        .ok_or(MetricsError::UnsupportedSamplingFrequency { spacing_ms: spacing })
}

//drawdown from the running peak, as a fraction of that peak
pub fn drawdowns(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&value| {
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                (peak - value) / peak
            } else {
                0.0
            }
        })
        .collect()
}

//calculates maximum drawdown from an equity series
pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdowns(equity).into_iter().fold(0.0, f64::max)
}

//longest run of consecutive bars spent below a prior peak
pub fn max_drawdown_duration(equity: &[f64]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for drawdown in drawdowns(equity) {
        if drawdown > 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
