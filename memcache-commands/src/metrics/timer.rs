use std::sync::Arc;
use std::time::{Duration, Instant};

use histogram::{AtomicHistogram, Histogram};

use super::Counter;
use crate::Error;

/// Request count plus a latency distribution in nanoseconds.
///
/// The count is incremented when a context is stopped, so it only includes
/// finished requests. Cloning yields another handle to the same timer.
#[derive(Clone)]
pub struct Timer {
    count: Counter,
    latency: Arc<AtomicHistogram>,
}

impl Timer {
    /// Create a timer counting into `count`, with a latency histogram of
    /// the given shape.
    pub fn new(count: Counter, grouping_power: u8, max_value_power: u8) -> Result<Self, Error> {
        let latency = AtomicHistogram::new(grouping_power, max_value_power)
            .map_err(|e| Error::InvalidConfig(format!("latency histogram: {e:?}")))?;
        Ok(Self {
            count,
            latency: Arc::new(latency),
        })
    }

    /// Start timing one request.
    pub fn time(&self) -> TimerContext {
        TimerContext {
            timer: self.clone(),
            start: Instant::now(),
        }
    }

    /// Record one finished request.
    pub fn record(&self, elapsed: Duration) {
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let _ = self.latency.increment(ns);
        self.count.increment();
    }

    /// Number of finished requests.
    pub fn count(&self) -> u64 {
        self.count.value()
    }

    /// Snapshot of the latency distribution.
    pub fn latency(&self) -> Histogram {
        self.latency.load()
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("count", &self.count())
            .finish()
    }
}

impl metriken::Metric for Timer {
    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn value(&self) -> Option<metriken::Value<'_>> {
        Some(metriken::Value::Counter(self.count()))
    }
}

/// A started measurement. Stopping consumes it, so it records at most once.
#[must_use = "a timer context records nothing unless stopped"]
pub struct TimerContext {
    timer: Timer,
    start: Instant,
}

impl TimerContext {
    /// Stop the measurement and record it. Returns the elapsed time.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.timer.record(elapsed);
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use crate::CounterGroup;

    fn timer() -> Timer {
        Timer::new(Counter::new(Arc::new(CounterGroup::new()), 0), 7, 64).unwrap()
    }

    fn samples(histogram: &Histogram) -> u64 {
        histogram.into_iter().map(|bucket| bucket.count()).sum()
    }

    #[test]
    fn counts_on_stop() {
        let timer = timer();
        let context = timer.time();
        assert_eq!(timer.count(), 0);
        context.stop();
        assert_eq!(timer.count(), 1);
        assert_eq!(samples(&timer.latency()), 1);
    }

    #[test]
    fn stops_on_another_thread() {
        let timer = timer();
        let context = timer.time();
        let elapsed = thread::spawn(move || {
            thread::sleep(Duration::from_millis(1));
            context.stop()
        })
        .join()
        .unwrap();
        assert!(elapsed >= Duration::from_millis(1));
        assert_eq!(timer.count(), 1);
    }

    #[test]
    fn rejects_bad_histogram_shape() {
        let count = Counter::new(Arc::new(CounterGroup::new()), 0);
        let err = Timer::new(count, 70, 64).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
