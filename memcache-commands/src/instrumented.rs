//! Completion instrumentation for result handles.
//!
//! [`instrument`] is the single wrapper used for every command kind: it asks
//! the [`Metrics`] surface for an [`Observer`] (which starts that kind's
//! timer), then attaches it to the handle. When the handle resolves, the
//! result is classified into an [`Outcome`] by reference and the observer
//! runs after the caller has been woken. The value or error the caller
//! receives is never touched.

use std::sync::Arc;

use crate::command::CommandKind;
use crate::metrics::OutstandingRequests;
use crate::promise::ResultHandle;
use crate::{MemcacheStatus, Value};

// ── Types ───────────────────────────────────────────────────────────────

/// Hit/miss counts observed in one successful read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lookup {
    pub hits: u64,
    pub misses: u64,
}

/// Classified completion of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handle resolved with a value. Reads carry their hit/miss counts.
    Success(Option<Lookup>),
    /// The handle resolved with an error, whatever its cause.
    Failure,
}

/// Finishes the accounting started by [`Metrics::start`]. Called exactly once.
pub type Observer = Box<dyn FnOnce(Outcome) + Send>;

/// Result types that can report hits and misses.
pub trait Lookups {
    /// Hit/miss counts for read results, `None` for everything else.
    fn lookups(&self) -> Option<Lookup>;
}

impl Lookups for Option<Value> {
    fn lookups(&self) -> Option<Lookup> {
        Some(match self {
            Some(_) => Lookup { hits: 1, misses: 0 },
            None => Lookup { hits: 0, misses: 1 },
        })
    }
}

impl Lookups for Vec<Option<Value>> {
    fn lookups(&self) -> Option<Lookup> {
        let hits = self.iter().filter(|v| v.is_some()).count() as u64;
        Some(Lookup {
            hits,
            misses: self.len() as u64 - hits,
        })
    }
}

impl Lookups for MemcacheStatus {
    fn lookups(&self) -> Option<Lookup> {
        None
    }
}

impl Lookups for Option<u64> {
    fn lookups(&self) -> Option<Lookup> {
        None
    }
}

// ── Metrics surface ─────────────────────────────────────────────────────

/// The reporting surface the client records into.
///
/// Implementations must tolerate `start` on one thread and the returned
/// observer running on another.
pub trait Metrics: Send + Sync {
    /// Start accounting for one command of `kind`.
    fn start(&self, kind: CommandKind) -> Observer;

    /// Install the provider read by the outstanding-requests gauge. The
    /// latest registration wins.
    fn register_outstanding_requests_gauge(&self, provider: Arc<dyn OutstandingRequests>);
}

/// A [`Metrics`] implementation that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn start(&self, _kind: CommandKind) -> Observer {
        Box::new(|_| {})
    }

    fn register_outstanding_requests_gauge(&self, _provider: Arc<dyn OutstandingRequests>) {}
}

/// Account for `handle` as one command of `kind`.
pub fn instrument<T>(metrics: &dyn Metrics, kind: CommandKind, handle: &ResultHandle<T>)
where
    T: Lookups + Send + 'static,
{
    let observer = metrics.start(kind);
    handle.observe(
        |result| match result {
            Ok(value) => Outcome::Success(value.lookups()),
            Err(_) => Outcome::Failure,
        },
        observer,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use futures::executor::block_on;
    use parking_lot::Mutex;

    use crate::Error;
    use crate::promise::result_handle;

    #[derive(Default)]
    struct Recording {
        events: Arc<Mutex<Vec<(CommandKind, Outcome)>>>,
    }

    impl Metrics for Recording {
        fn start(&self, kind: CommandKind) -> Observer {
            let events = self.events.clone();
            Box::new(move |outcome| events.lock().push((kind, outcome)))
        }

        fn register_outstanding_requests_gauge(&self, _provider: Arc<dyn OutstandingRequests>) {}
    }

    fn value(data: &'static str) -> Value {
        Value {
            data: Bytes::from_static(data.as_bytes()),
            flags: 0,
            cas: None,
        }
    }

    #[test]
    fn get_hit_and_miss() {
        let metrics = Recording::default();

        let (completer, handle) = result_handle::<Option<Value>>();
        instrument(&metrics, CommandKind::Get, &handle);
        assert!(metrics.events.lock().is_empty());
        completer.succeed(Some(value("v")));
        assert_eq!(block_on(handle).unwrap(), Some(value("v")));

        let (completer, handle) = result_handle::<Option<Value>>();
        instrument(&metrics, CommandKind::Get, &handle);
        completer.succeed(None);
        assert_eq!(block_on(handle).unwrap(), None);

        let hit = Outcome::Success(Some(Lookup { hits: 1, misses: 0 }));
        let miss = Outcome::Success(Some(Lookup { hits: 0, misses: 1 }));
        assert_eq!(
            *metrics.events.lock(),
            [(CommandKind::Get, hit), (CommandKind::Get, miss)]
        );
    }

    #[test]
    fn multiget_counts_in_one_observation() {
        let metrics = Recording::default();
        let (completer, handle) = result_handle::<Vec<Option<Value>>>();
        instrument(&metrics, CommandKind::MultiGet, &handle);
        completer.succeed(vec![Some(value("a")), None, None]);
        assert_eq!(block_on(handle).unwrap().len(), 3);
        assert_eq!(
            *metrics.events.lock(),
            [(
                CommandKind::MultiGet,
                Outcome::Success(Some(Lookup { hits: 1, misses: 2 }))
            )]
        );
    }

    #[test]
    fn failure_is_passed_through() {
        let metrics = Recording::default();
        let (completer, handle) = result_handle::<MemcacheStatus>();
        instrument(&metrics, CommandKind::Delete, &handle);
        completer.fail(Error::Memcache("SERVER_ERROR busy".into()));
        assert!(matches!(block_on(handle), Err(Error::Memcache(_))));
        assert_eq!(
            *metrics.events.lock(),
            [(CommandKind::Delete, Outcome::Failure)]
        );
    }

    #[test]
    fn status_results_carry_no_lookups() {
        let metrics = Recording::default();
        let handle = ResultHandle::ready(Ok(Some(3u64)));
        instrument(&metrics, CommandKind::IncrDecr, &handle);
        assert_eq!(
            *metrics.events.lock(),
            [(CommandKind::IncrDecr, Outcome::Success(None))]
        );
        assert_eq!(block_on(handle).unwrap(), Some(3));
    }

    #[test]
    fn noop_metrics() {
        let (completer, handle) = result_handle::<MemcacheStatus>();
        instrument(&NoopMetrics, CommandKind::Touch, &handle);
        completer.succeed(MemcacheStatus::Ok);
        assert_eq!(block_on(handle).unwrap(), MemcacheStatus::Ok);
    }
}
