//! Shared data model for the nefi observability pipeline: the types that
//! cross every crate boundary in the agent and the collector.

pub mod dependency;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod histogram;
pub mod metric;

pub use dependency::DependencyLink;
pub use endpoint::Endpoint;
pub use error::Error;
pub use event::{ConnectionEvent, Event, HttpMethod, Protocol, RequestEvent};
pub use histogram::Histogram;
pub use metric::{MetricType, TimeSeriesPoint};
