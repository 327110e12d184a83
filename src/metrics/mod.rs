pub mod summary;
pub mod timeseries;

pub use summary::{Degeneracy, MetricValue, MetricsError, PerformanceMetrics};
pub use timeseries::{infer_frequency, max_drawdown, SamplingFrequency};
