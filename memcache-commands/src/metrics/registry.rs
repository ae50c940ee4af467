use std::collections::BTreeMap;
use std::sync::Arc;

use metriken::{DynBoxedMetric, MetricBuilder};

use super::{
    Counter, CounterGroup, OutstandingRequests, OutstandingRequestsGauge, Timer, TimerContext,
};
use crate::Error;
use crate::command::CommandKind;
use crate::config::MetricsConfig;
use crate::instrumented::{Metrics, Observer, Outcome};

// Slots in each kind's counter group.
const REQUESTS: usize = 0;
const SUCCESSES: usize = 1;
const FAILURES: usize = 2;

// Slots in the shared lookup group.
const HITS: usize = 0;
const MISSES: usize = 1;

/// Timer and counters of one command kind.
#[derive(Clone)]
struct KindMetrics {
    timer: Timer,
    successes: Counter,
    failures: Counter,
    /// Hit/miss counters, for read kinds only.
    lookups: Option<(Counter, Counter)>,
}

impl KindMetrics {
    fn finish(&self, context: TimerContext, outcome: Outcome) {
        match outcome {
            Outcome::Success(lookup) => {
                self.successes.increment();
                if let (Some(lookup), Some((hits, misses))) = (lookup, &self.lookups) {
                    hits.add(lookup.hits);
                    misses.add(lookup.misses);
                }
            }
            Outcome::Failure => self.failures.increment(),
        }
        context.stop();
    }
}

/// A metric registered with metriken under its full name. Unregistered on
/// drop.
enum Registered {
    Timer(DynBoxedMetric<Timer>),
    Counter(DynBoxedMetric<Counter>),
    Gauge(DynBoxedMetric<OutstandingRequestsGauge>),
}

impl Registered {
    fn timer(name: String, timer: &Timer) -> Self {
        Registered::Timer(MetricBuilder::new(name).build(timer.clone()))
    }

    fn counter(name: String, counter: &Counter) -> Self {
        Registered::Counter(MetricBuilder::new(name).build(counter.clone()))
    }

    fn gauge(name: String, gauge: &OutstandingRequestsGauge) -> Self {
        Registered::Gauge(MetricBuilder::new(name).build(gauge.clone()))
    }

    fn metric(&self) -> &dyn metriken::Metric {
        match self {
            Registered::Timer(timer) => &**timer,
            Registered::Counter(counter) => &**counter,
            Registered::Gauge(gauge) => &**gauge,
        }
    }

    fn read(&self) -> u64 {
        match self {
            Registered::Timer(timer) => timer.count(),
            Registered::Counter(counter) => counter.value(),
            Registered::Gauge(gauge) => gauge.read() as u64,
        }
    }
}

/// The built-in metrics backend.
///
/// Holds one timer plus success and failure counters per [`CommandKind`],
/// hit and miss counters shared by get and multi-get, and the
/// outstanding-requests gauge. Every metric is registered with metriken
/// under its name, `<namespace>.<operation>.<metric>`, for as long as the
/// registry lives:
///
/// | name | kind |
/// |------|------|
/// | `<ns>.<op>.requests` | timer (finished requests, latency) |
/// | `<ns>.<op>.successes` | counter |
/// | `<ns>.<op>.failures` | counter |
/// | `<ns>.get.hits` | counter |
/// | `<ns>.get.misses` | counter |
/// | `<ns>.outstandingRequests.count` | gauge |
///
/// where `<op>` is one of `get`, `multiget`, `set`, `delete`, `incrdecr`,
/// `touch`.
pub struct MetricsRegistry {
    namespace: String,
    kinds: Vec<KindMetrics>,
    hits: Counter,
    misses: Counter,
    outstanding: OutstandingRequestsGauge,
    names: BTreeMap<String, Registered>,
}

impl MetricsRegistry {
    /// Build the registry. Fails if the latency histogram shape is invalid.
    pub fn new(config: MetricsConfig) -> Result<Self, Error> {
        let lookups = Arc::new(CounterGroup::new());
        let hits = Counter::new(lookups.clone(), HITS);
        let misses = Counter::new(lookups, MISSES);

        let kinds = CommandKind::ALL
            .iter()
            .map(|&kind| {
                let group = Arc::new(CounterGroup::new());
                let timer = Timer::new(
                    Counter::new(group.clone(), REQUESTS),
                    config.latency_grouping_power,
                    config.latency_max_value_power,
                )?;
                Ok(KindMetrics {
                    timer,
                    successes: Counter::new(group.clone(), SUCCESSES),
                    failures: Counter::new(group, FAILURES),
                    lookups: matches!(kind, CommandKind::Get | CommandKind::MultiGet)
                        .then(|| (hits.clone(), misses.clone())),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let namespace = config.namespace;
        let outstanding = OutstandingRequestsGauge::new();
        let mut names = BTreeMap::new();
        for (kind, metrics) in CommandKind::ALL.into_iter().zip(&kinds) {
            let op = kind.name();
            let name = qualify(&namespace, op, "requests");
            names.insert(name.clone(), Registered::timer(name, &metrics.timer));
            let name = qualify(&namespace, op, "successes");
            names.insert(name.clone(), Registered::counter(name, &metrics.successes));
            let name = qualify(&namespace, op, "failures");
            names.insert(name.clone(), Registered::counter(name, &metrics.failures));
        }
        for (metric, counter) in [("hits", &hits), ("misses", &misses)] {
            let name = qualify(&namespace, "get", metric);
            names.insert(name.clone(), Registered::counter(name, counter));
        }
        let name = qualify(&namespace, "outstandingRequests", "count");
        names.insert(name.clone(), Registered::gauge(name, &outstanding));

        Ok(Self {
            namespace,
            kinds,
            hits,
            misses,
            outstanding,
            names,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Timer of `kind`. Its count is the number of finished requests.
    pub fn timer(&self, kind: CommandKind) -> &Timer {
        &self.kinds[kind.index()].timer
    }

    pub fn successes(&self, kind: CommandKind) -> &Counter {
        &self.kinds[kind.index()].successes
    }

    pub fn failures(&self, kind: CommandKind) -> &Counter {
        &self.kinds[kind.index()].failures
    }

    /// Hits across get and multi-get.
    pub fn hits(&self) -> &Counter {
        &self.hits
    }

    /// Misses across get and multi-get.
    pub fn misses(&self) -> &Counter {
        &self.misses
    }

    pub fn outstanding_requests_gauge(&self) -> &OutstandingRequestsGauge {
        &self.outstanding
    }

    /// Look up a metric by its full name.
    pub fn get(&self, name: &str) -> Option<&dyn metriken::Metric> {
        self.names.get(name).map(Registered::metric)
    }

    /// All metrics, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn metriken::Metric)> {
        self.names
            .iter()
            .map(|(name, registered)| (name.as_str(), registered.metric()))
    }

    /// Current value of every metric, keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.names
            .iter()
            .map(|(name, registered)| (name.clone(), registered.read()))
            .collect()
    }
}

impl Metrics for MetricsRegistry {
    fn start(&self, kind: CommandKind) -> Observer {
        let metrics = self.kinds[kind.index()].clone();
        let context = metrics.timer.time();
        Box::new(move |outcome| metrics.finish(context, outcome))
    }

    fn register_outstanding_requests_gauge(&self, provider: Arc<dyn OutstandingRequests>) {
        self.outstanding.register(provider);
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

fn qualify(namespace: &str, op: &str, metric: &str) -> String {
    if namespace.is_empty() {
        format!("{op}.{metric}")
    } else {
        format!("{namespace}.{op}.{metric}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use crate::instrumented::Lookup;

    fn registry() -> MetricsRegistry {
        MetricsRegistry::new(MetricsConfig::default()).unwrap()
    }

    #[test]
    fn metric_names() {
        let registry = registry();
        let names: Vec<&str> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names.len(), 6 * 3 + 3);
        for name in [
            "memcache.get.requests",
            "memcache.get.hits",
            "memcache.get.misses",
            "memcache.get.successes",
            "memcache.get.failures",
            "memcache.multiget.requests",
            "memcache.set.successes",
            "memcache.delete.failures",
            "memcache.incrdecr.requests",
            "memcache.touch.successes",
            "memcache.outstandingRequests.count",
        ] {
            assert!(names.contains(&name), "{name}");
        }
        assert!(registry.get("memcache.multiget.hits").is_none());
    }

    #[test]
    fn custom_and_empty_namespace() {
        let registry = MetricsRegistry::new(MetricsConfig::with_namespace("app")).unwrap();
        assert_eq!(registry.namespace(), "app");
        assert!(registry.get("app.set.requests").is_some());

        let registry = MetricsRegistry::new(MetricsConfig::with_namespace("")).unwrap();
        assert!(registry.get("touch.failures").is_some());
    }

    #[test]
    fn registered_with_metriken_while_alive() {
        let registry = MetricsRegistry::new(MetricsConfig::with_namespace("exported")).unwrap();
        registry.start(CommandKind::Get)(Outcome::Success(Some(Lookup { hits: 1, misses: 0 })));
        registry.register_outstanding_requests_gauge(Arc::new(|| 3usize));

        {
            let metrics = metriken::metrics();
            let value = |name: &str| {
                metrics
                    .iter()
                    .find(|entry| entry.name() == name)
                    .and_then(|entry| entry.metric().value())
            };
            assert!(matches!(
                value("exported.get.requests"),
                Some(metriken::Value::Counter(1))
            ));
            assert!(matches!(
                value("exported.get.hits"),
                Some(metriken::Value::Counter(1))
            ));
            assert!(matches!(
                value("exported.set.failures"),
                Some(metriken::Value::Counter(0))
            ));
            assert!(matches!(
                value("exported.outstandingRequests.count"),
                Some(metriken::Value::Gauge(3))
            ));
            let exported = metrics
                .iter()
                .filter(|entry| entry.name().starts_with("exported."))
                .count();
            assert_eq!(exported, registry.iter().count());
        }

        drop(registry);
        assert!(
            !metriken::metrics()
                .iter()
                .any(|entry| entry.name().starts_with("exported."))
        );
    }

    #[test]
    fn invalid_histogram_shape() {
        let config = MetricsConfig {
            latency_grouping_power: 64,
            ..MetricsConfig::default()
        };
        assert!(matches!(
            MetricsRegistry::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn get_success_counts_hit() {
        let registry = registry();
        let observer = registry.start(CommandKind::Get);
        assert_eq!(registry.timer(CommandKind::Get).count(), 0);
        observer(Outcome::Success(Some(Lookup { hits: 1, misses: 0 })));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot["memcache.get.requests"], 1);
        assert_eq!(snapshot["memcache.get.successes"], 1);
        assert_eq!(snapshot["memcache.get.hits"], 1);
        assert_eq!(snapshot["memcache.get.misses"], 0);
        assert_eq!(snapshot["memcache.get.failures"], 0);
    }

    #[test]
    fn multiget_shares_lookup_counters() {
        let registry = registry();
        let observer = registry.start(CommandKind::MultiGet);
        observer(Outcome::Success(Some(Lookup { hits: 1, misses: 1 })));

        assert_eq!(registry.hits().value(), 1);
        assert_eq!(registry.misses().value(), 1);
        assert_eq!(registry.successes(CommandKind::MultiGet).value(), 1);
        assert_eq!(registry.failures(CommandKind::MultiGet).value(), 0);
        assert_eq!(registry.successes(CommandKind::Get).value(), 0);
    }

    #[test]
    fn write_kinds_ignore_lookups() {
        let registry = registry();
        registry.start(CommandKind::Set)(Outcome::Success(Some(Lookup { hits: 4, misses: 4 })));
        assert_eq!(registry.hits().value(), 0);
        assert_eq!(registry.successes(CommandKind::Set).value(), 1);
    }

    #[test]
    fn failure_stops_timer() {
        let registry = registry();
        registry.start(CommandKind::Delete)(Outcome::Failure);
        assert_eq!(registry.failures(CommandKind::Delete).value(), 1);
        assert_eq!(registry.successes(CommandKind::Delete).value(), 0);
        assert_eq!(registry.timer(CommandKind::Delete).count(), 1);
    }

    #[test]
    fn gauge_follows_registration() {
        let registry = registry();
        assert_eq!(registry.snapshot()["memcache.outstandingRequests.count"], 0);
        registry.register_outstanding_requests_gauge(Arc::new(|| 5usize));
        assert_eq!(registry.outstanding_requests_gauge().read(), 5);
        registry.register_outstanding_requests_gauge(Arc::new(|| 0usize));
        assert_eq!(registry.outstanding_requests_gauge().read(), 0);
    }

    #[test]
    fn concurrent_observers() {
        let registry = Arc::new(registry());
        let per_thread = 500;

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let observers: Vec<Observer> = (0..per_thread)
                    .map(|_| registry.start(CommandKind::IncrDecr))
                    .collect();
                thread::spawn(move || {
                    for (n, observer) in observers.into_iter().enumerate() {
                        if (n + i) % 5 == 0 {
                            observer(Outcome::Failure);
                        } else {
                            observer(Outcome::Success(None));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let kind = CommandKind::IncrDecr;
        assert_eq!(registry.timer(kind).count(), 4 * per_thread as u64);
        assert_eq!(registry.failures(kind).value(), 4 * per_thread as u64 / 5);
        assert_eq!(
            registry.successes(kind).value() + registry.failures(kind).value(),
            registry.timer(kind).count()
        );
    }
}
