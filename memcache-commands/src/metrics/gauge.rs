use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Pull-based source of the number of in-flight commands.
pub trait OutstandingRequests: Send + Sync {
    fn outstanding_requests(&self) -> usize;
}

impl<F> OutstandingRequests for F
where
    F: Fn() -> usize + Send + Sync,
{
    fn outstanding_requests(&self) -> usize {
        self()
    }
}

// ArcSwap needs a sized pointee.
struct Provider(Arc<dyn OutstandingRequests>);

/// Gauge that forwards reads to the most recently registered provider.
///
/// Registration swaps the whole provider reference atomically; reads never
/// block and return 0 until something has been registered. Clones share
/// the same provider slot.
#[derive(Clone, Default)]
pub struct OutstandingRequestsGauge {
    provider: Arc<ArcSwapOption<Provider>>,
}

impl OutstandingRequestsGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the provider. The latest registration wins.
    pub fn register(&self, provider: Arc<dyn OutstandingRequests>) {
        self.provider.store(Some(Arc::new(Provider(provider))));
    }

    /// Current count from the registered provider, or 0.
    pub fn read(&self) -> usize {
        self.provider
            .load_full()
            .map_or(0, |provider| provider.0.outstanding_requests())
    }
}

impl std::fmt::Debug for OutstandingRequestsGauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutstandingRequestsGauge")
            .field("value", &self.read())
            .finish()
    }
}

impl metriken::Metric for OutstandingRequestsGauge {
    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn value(&self) -> Option<metriken::Value<'_>> {
        let value = i64::try_from(self.read()).unwrap_or(i64::MAX);
        Some(metriken::Value::Gauge(value))
    }
}
