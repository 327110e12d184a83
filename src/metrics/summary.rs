use crate::metrics::timeseries::{infer_frequency, max_drawdown, max_drawdown_duration};
use crate::portfolio::HoldingsSnapshot;
use indexmap::IndexMap;
use log::warn;
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use thiserror::Error;

//metric names, fixed for every run
pub const MEAN_RETURN: &str = "mean_return";
pub const ANNUALIZED_RETURN: &str = "annualized_return";
pub const VOLATILITY: &str = "volatility";
pub const DOWNSIDE_VOLATILITY: &str = "downside_volatility";
pub const SHARPE_RATIO: &str = "sharpe_ratio";
pub const SORTINO_RATIO: &str = "sortino_ratio";
pub const EQUITY_PEAK: &str = "equity_peak";
pub const EQUITY_TROUGH: &str = "equity_trough";
pub const FINAL_EQUITY: &str = "final_equity";
pub const TOTAL_RETURN: &str = "total_return";
pub const CAGR: &str = "cagr";
pub const PCT_POSITIVE_BARS: &str = "pct_positive_bars";
pub const MAX_DRAWDOWN: &str = "max_drawdown";
pub const MAX_DRAWDOWN_DURATION: &str = "max_drawdown_duration";
pub const TOTAL_COMMISSION: &str = "total_commission";
pub const TOTAL_SLIPPAGE: &str = "total_slippage";
pub const PERIODS_PER_YEAR: &str = "periods_per_year";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("Cannot infer an annualisation period from a bar spacing of {spacing_ms} ms")]
    UnsupportedSamplingFrequency { spacing_ms: i64 },
    #[error("Metrics need at least two holdings entries, found {entries}")]
    InsufficientHistory { entries: usize },
}

//why a metric has no value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Degeneracy {
    ZeroVolatility,
    TooFewObservations,
    NoNegativeReturns,
    ZeroElapsedTime,
    ZeroInitialCapital,
    NonFinite,
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Degeneracy::ZeroVolatility => "zero volatility",
            Degeneracy::TooFewObservations => "too few observations",
            Degeneracy::NoNegativeReturns => "no negative returns",
            Degeneracy::ZeroElapsedTime => "zero elapsed time",
            Degeneracy::ZeroInitialCapital => "zero initial capital",
            Degeneracy::NonFinite => "non-finite result",
        };
        f.write_str(reason)
    }
}

//a metric is either a finite number or explicitly undefined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Value(f64),
    Undefined(Degeneracy),
}

impl MetricValue {
    //wraps a computed value, non-finite results never escape as numbers
    fn finite(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Value(value)
        } else {
            MetricValue::Undefined(Degeneracy::NonFinite)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            MetricValue::Undefined(_) => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, MetricValue::Undefined(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Value(v) => write!(f, "{:.6}", v),
            MetricValue::Undefined(reason) => write!(f, "undefined ({})", reason),
        }
    }
}

//performance statistics computed once from the holdings history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    values: IndexMap<String, MetricValue>,
}

impl PerformanceMetrics {
    //derives every metric from the full holdings history
    pub fn from_history(
        history: &[HoldingsSnapshot],
        initial_capital: f64,
    ) -> Result<Self, MetricsError> {
        let timestamps: Vec<i64> = history.iter().map(|h| h.timestamp).collect();
        let periods = infer_frequency(&timestamps)?.periods_per_year();

        let equity: Vec<f64> = history.iter().map(|h| h.total).collect();
        //the first entry has no predecessor and carries no return
        let returns: Vec<f64> = history.iter().skip(1).map(|h| h.returns).collect();
        let negative: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();

        let mut values = IndexMap::new();
        let mut put = |name: &str, value: MetricValue| {
            values.insert(name.to_string(), value);
        };

        put(PERIODS_PER_YEAR, MetricValue::Value(periods));

        let mean = if returns.is_empty() {
            None
        } else {
            Some(returns.as_slice().mean())
        };
        put(MEAN_RETURN, observed(mean));
        put(
            ANNUALIZED_RETURN,
            observed(mean.map(|m| (1.0 + m).powf(periods) - 1.0)),
        );

        let annualise = (periods / 365.0).sqrt();
        let std_dev = sample_std_dev(&returns);
        let downside_std_dev = match negative.len() {
            0 => Err(Degeneracy::NoNegativeReturns),
            _ => sample_std_dev(&negative),
        };

        put(VOLATILITY, scaled(std_dev, annualise));
        put(DOWNSIDE_VOLATILITY, scaled(downside_std_dev, annualise));
        put(SHARPE_RATIO, ratio(mean, std_dev, periods));
        put(SORTINO_RATIO, ratio(mean, downside_std_dev, periods));

        let peak = equity.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let trough = equity.iter().copied().fold(f64::INFINITY, f64::min);
        let final_equity = equity.last().copied().unwrap_or(initial_capital);
        put(EQUITY_PEAK, MetricValue::finite(peak));
        put(EQUITY_TROUGH, MetricValue::finite(trough));
        put(FINAL_EQUITY, MetricValue::finite(final_equity));

        if initial_capital == 0.0 {
            put(TOTAL_RETURN, MetricValue::Undefined(Degeneracy::ZeroInitialCapital));
            put(CAGR, MetricValue::Undefined(Degeneracy::ZeroInitialCapital));
        } else {
            let growth = final_equity / initial_capital;
            put(TOTAL_RETURN, MetricValue::finite(growth - 1.0));

            let years = returns.len() as f64 / periods;
            if years > 0.0 {
                put(CAGR, MetricValue::finite(growth.powf(1.0 / years) - 1.0));
            } else {
                put(CAGR, MetricValue::Undefined(Degeneracy::ZeroElapsedTime));
            }
        }

        if returns.is_empty() {
            put(
                PCT_POSITIVE_BARS,
                MetricValue::Undefined(Degeneracy::TooFewObservations),
            );
        } else {
            let non_negative = returns.iter().filter(|&&r| r >= 0.0).count();
            put(
                PCT_POSITIVE_BARS,
                MetricValue::finite(100.0 * non_negative as f64 / returns.len() as f64),
            );
        }

        put(MAX_DRAWDOWN, MetricValue::finite(max_drawdown(&equity)));
        put(
            MAX_DRAWDOWN_DURATION,
            MetricValue::Value(max_drawdown_duration(&equity) as f64),
        );

        let last = history.last();
        put(
            TOTAL_COMMISSION,
            MetricValue::finite(last.map(|h| h.commission).unwrap_or(0.0)),
        );
        put(
            TOTAL_SLIPPAGE,
            MetricValue::finite(last.map(|h| h.slippage).unwrap_or(0.0)),
        );

        let metrics = PerformanceMetrics { values };
        for (name, value) in metrics.iter() {
            if let MetricValue::Undefined(reason) = value {
                warn!("metric {} is undefined: {}", name, reason);
            }
        }
        Ok(metrics)
    }

    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.values.get(name).copied()
    }

    //the numeric value of a metric, none when missing or undefined
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.value())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        for (name, value) in self.iter() {
            table.add_row(Row::new(vec![
                Cell::new(name),
                Cell::new(&value.to_string()),
            ]));
        }

        table.printstd();
    }
}

fn observed(value: Option<f64>) -> MetricValue {
    match value {
        Some(v) => MetricValue::finite(v),
        None => MetricValue::Undefined(Degeneracy::TooFewObservations),
    }
}

//sample standard deviation with n-1 degrees of freedom
fn sample_std_dev(values: &[f64]) -> Result<f64, Degeneracy> {
    if values.len() < 2 {
        return Err(Degeneracy::TooFewObservations);
    }
    Ok(values.std_dev())
}

fn scaled(std_dev: Result<f64, Degeneracy>, factor: f64) -> MetricValue {
    match std_dev {
        Ok(s) => MetricValue::finite(s * factor),
        Err(reason) => MetricValue::Undefined(reason),
    }
}

//sqrt(periods) * mean / per-bar deviation
fn ratio(mean: Option<f64>, std_dev: Result<f64, Degeneracy>, periods: f64) -> MetricValue {
    match (mean, std_dev) {
        (_, Err(reason)) => MetricValue::Undefined(reason),
        (None, _) => MetricValue::Undefined(Degeneracy::TooFewObservations),
        (Some(_), Ok(s)) if s == 0.0 => MetricValue::Undefined(Degeneracy::ZeroVolatility),
        (Some(m), Ok(s)) => MetricValue::finite(periods.sqrt() * m / s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400_000;

    //builds a history the way the portfolio does, from a series of totals
    fn history(totals: &[f64], spacing: i64) -> Vec<HoldingsSnapshot> {
        let mut out: Vec<HoldingsSnapshot> = Vec::new();
        for (i, &total) in totals.iter().enumerate() {
            let mut snap = HoldingsSnapshot::seed(i as i64 * spacing, ["X"], total);
            if let Some(prev) = out.last() {
                snap.returns = total / prev.total - 1.0;
                snap.equity_curve = (prev.equity_curve + 1.0) * (snap.returns + 1.0) - 1.0;
            }
            out.push(snap);
        }
        out
    }

    #[test]
    fn flat_equity_has_undefined_ratios() {
        let metrics =
            PerformanceMetrics::from_history(&history(&[1000.0; 5], DAY), 1000.0).unwrap();
        assert_eq!(metrics.value(MEAN_RETURN), Some(0.0));
        assert_eq!(
            metrics.get(SHARPE_RATIO),
            Some(MetricValue::Undefined(Degeneracy::ZeroVolatility))
        );
        assert!(metrics.get(SORTINO_RATIO).unwrap().is_undefined());
        assert_eq!(metrics.value(TOTAL_RETURN), Some(0.0));
        assert_eq!(metrics.value(PCT_POSITIVE_BARS), Some(100.0));
        assert_eq!(metrics.value(MAX_DRAWDOWN), Some(0.0));
    }

    #[test]
    fn daily_volatility_is_the_sample_deviation() {
        let h = history(&[100.0, 110.0, 99.0, 108.9], DAY);
        let metrics = PerformanceMetrics::from_history(&h, 100.0).unwrap();
        let returns: Vec<f64> = h.iter().skip(1).map(|s| s.returns).collect();

        //daily bars annualise by sqrt(365 / 365)
        assert!((metrics.value(VOLATILITY).unwrap() - sample_sd(&returns)).abs() < 1e-12);
        assert_eq!(
            metrics.get(DOWNSIDE_VOLATILITY),
            Some(MetricValue::Undefined(Degeneracy::TooFewObservations))
        );
        assert!((metrics.value(PCT_POSITIVE_BARS).unwrap() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn rising_equity_has_no_downside() {
        let metrics =
            PerformanceMetrics::from_history(&history(&[100.0, 101.0, 103.0], DAY), 100.0)
                .unwrap();
        assert!(metrics.value(SHARPE_RATIO).unwrap() > 0.0);
        assert_eq!(
            metrics.get(SORTINO_RATIO),
            Some(MetricValue::Undefined(Degeneracy::NoNegativeReturns))
        );
    }

    #[test]
    fn sharpe_and_sortino_are_annualised_by_sqrt_periods() {
        let totals = [100.0, 102.0, 101.0, 104.0, 102.0, 106.0];
        let metrics =
            PerformanceMetrics::from_history(&history(&totals, 3_600_000), 100.0).unwrap();
        let h = history(&totals, 3_600_000);
        let returns: Vec<f64> = h.iter().skip(1).map(|s| s.returns).collect();
        let negative: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let sd = sample_sd(&returns);
        let dsd = sample_sd(&negative);
        let periods = 8760.0;

        assert_eq!(metrics.value(PERIODS_PER_YEAR), Some(periods));
        assert!((metrics.value(SHARPE_RATIO).unwrap() - periods.sqrt() * mean / sd).abs() < 1e-9);
        assert!((metrics.value(SORTINO_RATIO).unwrap() - periods.sqrt() * mean / dsd).abs() < 1e-9);
        let annualise = (periods / 365.0).sqrt();
        assert!((metrics.value(VOLATILITY).unwrap() - sd * annualise).abs() < 1e-12);
        assert!((metrics.value(DOWNSIDE_VOLATILITY).unwrap() - dsd * annualise).abs() < 1e-12);
    }

    fn sample_sd(values: &[f64]) -> f64 {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        var.sqrt()
    }

    #[test]
    fn equity_extremes_total_return_and_cagr() {
        let totals = [100.0, 150.0, 80.0, 121.0];
        let metrics = PerformanceMetrics::from_history(&history(&totals, DAY), 100.0).unwrap();
        assert_eq!(metrics.value(EQUITY_PEAK), Some(150.0));
        assert_eq!(metrics.value(EQUITY_TROUGH), Some(80.0));
        assert_eq!(metrics.value(FINAL_EQUITY), Some(121.0));
        assert!((metrics.value(TOTAL_RETURN).unwrap() - 0.21).abs() < 1e-12);

        let years = 3.0 / 365.0;
        let expected = 1.21f64.powf(1.0 / years) - 1.0;
        match metrics.get(CAGR).unwrap() {
            MetricValue::Value(v) => assert!((v - expected).abs() / expected < 1e-9),
            MetricValue::Undefined(reason) => assert_eq!(reason, Degeneracy::NonFinite),
        }
        assert_eq!(metrics.value(MAX_DRAWDOWN_DURATION), Some(2.0));
    }

    #[test]
    fn zero_initial_capital_is_explicit() {
        let metrics = PerformanceMetrics::from_history(&history(&[0.0, 0.0], DAY), 0.0).unwrap();
        assert_eq!(
            metrics.get(TOTAL_RETURN),
            Some(MetricValue::Undefined(Degeneracy::ZeroInitialCapital))
        );
        assert_eq!(
            metrics.get(CAGR),
            Some(MetricValue::Undefined(Degeneracy::ZeroInitialCapital))
        );
        //0/0 returns never leak as nan
        for (_, value) in metrics.iter() {
            if let Some(v) = value.value() {
                assert!(v.is_finite());
            }
        }
    }

    #[test]
    fn single_return_observation_leaves_ratios_undefined() {
        let metrics =
            PerformanceMetrics::from_history(&history(&[100.0, 90.0], DAY), 100.0).unwrap();
        assert!(metrics.value(MEAN_RETURN).is_some());
        assert_eq!(
            metrics.get(SHARPE_RATIO),
            Some(MetricValue::Undefined(Degeneracy::TooFewObservations))
        );
        assert_eq!(
            metrics.get(DOWNSIDE_VOLATILITY),
            Some(MetricValue::Undefined(Degeneracy::TooFewObservations))
        );
    }

    #[test]
    fn history_failures_are_reported() {
        assert_eq!(
            PerformanceMetrics::from_history(&history(&[100.0], DAY), 100.0),
            Err(MetricsError::InsufficientHistory { entries: 1 })
        );
        assert_eq!(
            PerformanceMetrics::from_history(&history(&[100.0, 101.0], 1_000), 100.0),
            Err(MetricsError::UnsupportedSamplingFrequency { spacing_ms: 1_000 })
        );
    }
}
