//! Process-wide counters, injected rather than global.
//!
//! The release-manager client, the GitHub client and the pipeline each take an
//! `Arc<dyn MetricsSink>` at construction. Tests pass [`NoopMetrics`] or inspect
//! an [`InMemoryMetrics`]; the server exposes the latter at `GET /metrics`.

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// The remote service an outbound request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutboundTarget {
    ReleaseManager,
    GitHub,
}

impl fmt::Display for OutboundTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundTarget::ReleaseManager => write!(f, "release_manager"),
            OutboundTarget::GitHub => write!(f, "github"),
        }
    }
}

/// Terminal state of one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryOutcome {
    Suppressed,
    Commented,
    Failed,
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Suppressed => write!(f, "suppressed"),
            DeliveryOutcome::Commented => write!(f, "commented"),
            DeliveryOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// GitHub's `X-RateLimit-*` headers from the latest API response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp at which the window resets.
    pub reset: u64,
}

/// Sink for observability counters.
///
/// Implementations must be safe to call concurrently from many deliveries.
pub trait MetricsSink: Send + Sync {
    /// Records the HTTP status code of an outbound response.
    fn outbound_status(&self, target: OutboundTarget, status_code: u16);

    /// Records how a delivery ended.
    fn delivery_outcome(&self, outcome: DeliveryOutcome);

    /// Records the rate-limit state GitHub reported on its latest response.
    fn github_rate_limit(&self, rate_limit: RateLimit);
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn outbound_status(&self, _target: OutboundTarget, _status_code: u16) {}

    fn delivery_outcome(&self, _outcome: DeliveryOutcome) {}

    fn github_rate_limit(&self, _rate_limit: RateLimit) {}
}

/// Counters held in memory and rendered in the Prometheus text format.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    outbound: Mutex<BTreeMap<(OutboundTarget, u16), u64>>,
    suppressed: AtomicU64,
    commented: AtomicU64,
    failed: AtomicU64,
    rate_limit: Mutex<RateLimit>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of outbound responses seen with this target and status.
    pub fn outbound_count(&self, target: OutboundTarget, status_code: u16) -> u64 {
        self.outbound
            .lock()
            .map(|counts| counts.get(&(target, status_code)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Returns the number of deliveries that ended with `outcome`.
    pub fn outcome_count(&self, outcome: DeliveryOutcome) -> u64 {
        self.outcome_counter(outcome).load(Ordering::Relaxed)
    }

    /// Returns the last rate-limit state GitHub reported.
    pub fn last_github_rate_limit(&self) -> RateLimit {
        self.rate_limit.lock().map(|r| *r).unwrap_or_default()
    }

    fn outcome_counter(&self, outcome: DeliveryOutcome) -> &AtomicU64 {
        match outcome {
            DeliveryOutcome::Suppressed => &self.suppressed,
            DeliveryOutcome::Commented => &self.commented,
            DeliveryOutcome::Failed => &self.failed,
        }
    }

    /// Renders all counters in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(
            "# HELP outbound_http_status_code_total Counter of HTTP status codes of outbound HTTP requests\n",
        );
        out.push_str("# TYPE outbound_http_status_code_total counter\n");
        if let Ok(counts) = self.outbound.lock() {
            for ((target, status_code), count) in counts.iter() {
                let _ = writeln!(
                    out,
                    "outbound_http_status_code_total{{target=\"{target}\",status_code=\"{status_code}\"}} {count}"
                );
            }
        }

        out.push_str("# HELP webhook_deliveries_total Counter of webhook deliveries by outcome\n");
        out.push_str("# TYPE webhook_deliveries_total counter\n");
        for outcome in [
            DeliveryOutcome::Suppressed,
            DeliveryOutcome::Commented,
            DeliveryOutcome::Failed,
        ] {
            let _ = writeln!(
                out,
                "webhook_deliveries_total{{outcome=\"{outcome}\"}} {}",
                self.outcome_count(outcome)
            );
        }

        let rate_limit = self.last_github_rate_limit();
        for (name, header, value) in [
            ("github_ratelimit_limit_info", "X-RateLimit-Limit", rate_limit.limit),
            ("github_ratelimit_remaining_info", "X-RateLimit-Remaining", rate_limit.remaining),
            ("github_ratelimit_reset_info", "X-RateLimit-Reset", rate_limit.reset),
        ] {
            let _ = writeln!(out, "# HELP {name} Gauge of Github {header} header");
            let _ = writeln!(out, "# TYPE {name} gauge");
            let _ = writeln!(out, "{name} {value}");
        }

        out
    }
}

impl MetricsSink for InMemoryMetrics {
    fn outbound_status(&self, target: OutboundTarget, status_code: u16) {
        // A poisoned lock only means another thread panicked mid-increment;
        // the map itself is still usable.
        let mut counts = match self.outbound.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counts.entry((target, status_code)).or_insert(0) += 1;
    }

    fn delivery_outcome(&self, outcome: DeliveryOutcome) {
        self.outcome_counter(outcome).fetch_add(1, Ordering::Relaxed);
    }

    fn github_rate_limit(&self, rate_limit: RateLimit) {
        let mut current = match self.rate_limit.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = rate_limit;
    }
}
