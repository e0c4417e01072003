//! Temporal side of the groundwater retrieval core: period assignment,
//! per-period aggregation, whole-record statistics and trend fitting.

pub mod aggregate;
pub mod error;
pub mod period;
pub mod stats;
pub mod trend;

pub use aggregate::{
    aggregate, AggregatedRecord, AggregationConfig, PeriodStatistics, SamplingFrequency, Statistic,
};
pub use error::{Result, TemporalError};
pub use period::{assign_period, AggregationScheme, DateSpan, GrowingSeason, PeriodKey, PeriodKind};
pub use stats::{site_statistics, SiteStatistics};
pub use trend::{fit_trend, fit_trend_in_units, fit_trends, TrendDirection, TrendResult, DEFAULT_VALUE_UNIT};
