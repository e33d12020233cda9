use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::render::Response;
use crate::request::RequestContext;

/// Request counters kept with relaxed atomics.
///
/// Tracks the request count, cumulative latency, and responses per status class
/// (`1xx` to `5xx`).
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    by_class: [AtomicUsize; 5],
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: usize,
    pub average_latency_us: u64,
    /// Responses per status class, `[1xx, 2xx, 3xx, 4xx, 5xx]`
    pub by_class: [usize; 5],
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean latency over completed requests; zero before the first one.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count: usize = self.by_class.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count as u64)
        }
    }

    /// Responses seen with a status in `class * 100 .. class * 100 + 100`.
    #[must_use]
    pub fn status_class_count(&self, class: u16) -> usize {
        match class {
            1..=5 => self.by_class[usize::from(class - 1)].load(Ordering::Relaxed),
            _ => 0,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.request_count(),
            average_latency_us: self.average_latency().as_micros() as u64,
            by_class: std::array::from_fn(|i| self.by_class[i].load(Ordering::Relaxed)),
        }
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &RequestContext) -> Option<Response> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _req: &RequestContext, res: &mut Response, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if let 100..=599 = res.status {
            self.by_class[usize::from(res.status / 100 - 1)].fetch_add(1, Ordering::Relaxed);
        }
    }
}
