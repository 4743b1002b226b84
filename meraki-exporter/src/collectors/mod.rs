//! Per-domain collectors.
//!
//! Each collector turns a handful of dashboard calls into typed records and
//! then into [`MetricSample`]s, joining every record against the request's
//! [`TopologyIndex`]. Collectors never fail as a whole: upstream errors on
//! a sub-fetch are logged and recorded in the [`CollectorResult`], and the
//! samples that depend on it are simply absent.

pub mod device;
pub mod switch;
pub mod vpn;
pub mod wireless;

use std::future::Future;
use std::sync::Arc;

use meraki_dashboard::DashboardClient;
use thiserror::Error;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::config::CollectConfig;
use crate::sample::{LabelSet, MetricDomain, MetricSample};
use crate::topology::TopologyIndex;

/// A collector variant.
///
/// The declaration order is the order in which collector output is
/// concatenated by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectorKind {
    Device,
    Vpn,
    Switch,
    Wireless,
}

impl CollectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorKind::Device => "device",
            CollectorKind::Vpn => "vpn",
            CollectorKind::Switch => "switch",
            CollectorKind::Wireless => "wireless",
        }
    }

    /// Metric domain this collector is allowed to emit.
    pub fn domain(&self) -> MetricDomain {
        match self {
            CollectorKind::Device => MetricDomain::Device,
            CollectorKind::Vpn => MetricDomain::Vpn,
            CollectorKind::Switch => MetricDomain::Switch,
            CollectorKind::Wireless => MetricDomain::Wireless,
        }
    }

    /// Run this collector.
    pub async fn collect(self, ctx: &CollectContext) -> CollectorResult {
        let result = match self {
            CollectorKind::Device => device::collect(ctx).await,
            CollectorKind::Vpn => vpn::collect(ctx).await,
            CollectorKind::Switch => switch::collect(ctx).await,
            CollectorKind::Wireless => wireless::collect(ctx).await,
        };

        debug!(
            org_id = %ctx.org_id,
            collector = %self,
            samples = result.samples.len(),
            failures = result.failures.len(),
            dropped = result.dropped,
            "Collector finished"
        );
        result
    }
}

impl std::fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The collectors enabled for this process, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSet {
    kinds: Vec<CollectorKind>,
}

impl CollectorSet {
    /// Device status always runs; VPN and the usage collectors are opt-in.
    pub fn from_config(config: &CollectConfig) -> Self {
        let mut kinds = vec![CollectorKind::Device];
        if config.vpn {
            kinds.push(CollectorKind::Vpn);
        }
        if config.usage {
            kinds.push(CollectorKind::Switch);
            kinds.push(CollectorKind::Wireless);
        }
        Self { kinds }
    }

    pub fn kinds(&self) -> &[CollectorKind] {
        &self.kinds
    }

    pub fn contains(&self, kind: CollectorKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Request-scoped inputs shared by every collector of one scrape.
#[derive(Clone)]
pub struct CollectContext {
    pub client: DashboardClient,
    pub org_id: Arc<str>,
    pub topology: Arc<TopologyIndex>,
    pub options: Arc<CollectConfig>,
    pub deadline: Instant,
}

/// Why a sub-fetch produced nothing.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Upstream(#[from] meraki_dashboard::Error),
    #[error("scrape deadline reached")]
    Deadline,
}

impl CollectContext {
    /// Run one upstream call bounded by the scrape deadline.
    pub async fn fetch<T, F>(&self, call: F) -> Result<T, FetchError>
    where
        F: Future<Output = meraki_dashboard::Result<T>>,
    {
        match timeout_at(self.deadline, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(FetchError::Deadline),
        }
    }
}

/// Output of one collector run.
#[derive(Debug)]
pub struct CollectorResult {
    pub kind: CollectorKind,
    pub samples: Vec<MetricSample>,
    /// Sub-fetches that failed, as `"<what>: <error>"`.
    pub failures: Vec<String>,
    /// Records dropped because their device is not in the topology.
    pub dropped: usize,
    /// Values skipped because they map to no known state.
    pub unrecognized: usize,
    /// The collector did not finish before the deadline.
    pub timed_out: bool,
}

impl CollectorResult {
    pub fn new(kind: CollectorKind) -> Self {
        Self {
            kind,
            samples: Vec::new(),
            failures: Vec::new(),
            dropped: 0,
            unrecognized: 0,
            timed_out: false,
        }
    }

    /// Result for a collector cancelled at the deadline.
    pub fn timed_out(kind: CollectorKind) -> Self {
        Self {
            timed_out: true,
            ..Self::new(kind)
        }
    }

    pub fn push(&mut self, sample: MetricSample) {
        self.samples.push(sample);
    }

    /// Unwrap a sub-fetch, recording the failure.
    pub fn soft<T>(&mut self, what: &str, outcome: Result<T, FetchError>) -> Option<T> {
        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(collector = %self.kind, what, error = %e, "Sub-fetch failed");
                self.failures.push(format!("{what}: {e}"));
                None
            }
        }
    }

    /// Record a value with no known mapping.
    pub fn unrecognized(&mut self, what: &str, serial: &str, value: &str) {
        warn!(collector = %self.kind, what, serial, value, "Unrecognized value, sample skipped");
        self.unrecognized += 1;
    }

    /// Labels for a device serial, counting a drop when it does not resolve.
    pub fn labels<'t>(
        &mut self,
        topology: &'t TopologyIndex,
        serial: Option<&str>,
    ) -> Option<&'t Arc<LabelSet>> {
        let found = serial.and_then(|s| topology.labels(s));
        if found.is_none() {
            debug!(
                collector = %self.kind,
                serial = serial.unwrap_or("<none>"),
                "Dropping record for device outside the topology"
            );
            self.dropped += 1;
        }
        found
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_set_defaults() {
        let set = CollectorSet::from_config(&CollectConfig::default());
        assert_eq!(set.kinds(), &[CollectorKind::Device]);
    }

    #[test]
    fn test_collector_set_all_enabled() {
        let config = CollectConfig {
            vpn: true,
            usage: true,
            ..CollectConfig::default()
        };

        let set = CollectorSet::from_config(&config);
        assert_eq!(
            set.kinds(),
            &[
                CollectorKind::Device,
                CollectorKind::Vpn,
                CollectorKind::Switch,
                CollectorKind::Wireless
            ]
        );
        assert!(set.contains(CollectorKind::Switch));
    }

    #[test]
    fn test_soft_records_failure() {
        let mut result = CollectorResult::new(CollectorKind::Vpn);

        let ok: Option<u32> = result.soft("statuses", Ok(1));
        assert_eq!(ok, Some(1));

        let failed: Option<u32> = result.soft("statuses", Err(FetchError::Deadline));
        assert!(failed.is_none());
        assert_eq!(result.failures, vec!["statuses: scrape deadline reached"]);
    }

    #[test]
    fn test_labels_counts_drops() {
        let topology = test_support::topology(serde_json::json!([
            { "serial": "Q2SW-0001", "name": "SW1" }
        ]));
        let mut result = CollectorResult::new(CollectorKind::Device);

        assert!(result.labels(&topology, Some("Q2SW-0001")).is_some());
        assert!(result.labels(&topology, Some("Q2XX-9999")).is_none());
        assert!(result.labels(&topology, None).is_none());
        assert_eq!(result.dropped, 2);
    }
}
