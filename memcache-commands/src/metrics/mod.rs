//! Metrics backend: sharded counters, timers, the outstanding-requests
//! gauge, and a registry that names them and implements
//! [`Metrics`](crate::Metrics).
//!
//! Every metric implements [`metriken::Metric`]. The registry registers
//! each one as a dynamic metriken metric, so they show up in
//! [`metriken::metrics()`] next to statically declared metrics.

mod counter;
mod gauge;
mod registry;
mod timer;

pub use counter::{Counter, CounterGroup, set_thread_shard};
pub use gauge::{OutstandingRequests, OutstandingRequestsGauge};
pub use registry::MetricsRegistry;
pub use timer::{Timer, TimerContext};
