//! One scrape of one organization: topology, collectors, aggregation.

use std::sync::Arc;
use std::time::Duration;

use meraki_dashboard::DashboardClient;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use crate::aggregator::{Aggregator, MetricFilter, SampleSet};
use crate::collectors::{CollectContext, CollectorKind, CollectorResult, CollectorSet};
use crate::config::{CollectConfig, ExporterConfig};
use crate::exposition;
use crate::topology;

/// Slack after the deadline before a collector is abandoned outright.
///
/// Collectors bound each sub-fetch by the deadline themselves and return
/// what they have; this only catches one that does not.
const COLLECTOR_GRACE: Duration = Duration::from_millis(250);

/// Failures that abort a whole scrape.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("dashboard rejected the API key: {0}")]
    Unauthorized(#[source] meraki_dashboard::Error),
    #[error("unknown organization: {0}")]
    UnknownOrganization(String),
}

/// Runs scrapes against the dashboard.
///
/// Holds only process-wide, read-only state; every scrape builds its own
/// topology and sample set.
pub struct Scraper {
    client: DashboardClient,
    collectors: CollectorSet,
    aggregator: Aggregator,
    options: Arc<CollectConfig>,
    timeout: Duration,
}

impl Scraper {
    pub fn new(client: DashboardClient, config: &ExporterConfig) -> Self {
        Self {
            client,
            collectors: CollectorSet::from_config(&config.collect),
            aggregator: Aggregator::new(MetricFilter::new(&config.filters)),
            options: Arc::new(config.collect.clone()),
            timeout: config.scrape.timeout(),
        }
    }

    pub fn client(&self) -> &DashboardClient {
        &self.client
    }

    pub fn collectors(&self) -> &CollectorSet {
        &self.collectors
    }

    /// Scrape an organization into a sample set.
    pub async fn scrape(&self, org_id: &str) -> Result<SampleSet, ScrapeError> {
        let started = std::time::Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;

        let topology = topology::resolve(&self.client, org_id, deadline).await?;

        let ctx = CollectContext {
            client: self.client.clone(),
            org_id: Arc::from(org_id),
            topology: Arc::new(topology),
            options: Arc::clone(&self.options),
            deadline,
        };

        let results = self.run_collectors(&ctx).await;
        let failures: usize = results.iter().map(|r| r.failures.len()).sum();
        let dropped: usize = results.iter().map(|r| r.dropped).sum();
        let unrecognized: usize = results.iter().map(|r| r.unrecognized).sum();

        let (set, stats) = self.aggregator.aggregate(results, started);

        info!(
            org_id,
            devices = ctx.topology.len(),
            samples = set.len(),
            failures,
            dropped,
            unrecognized,
            filtered = stats.filtered,
            duplicates = stats.duplicates,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scrape complete"
        );
        Ok(set)
    }

    /// Scrape an organization and render it in the text exposition format.
    pub async fn render(&self, org_id: &str) -> Result<String, ScrapeError> {
        let set = self.scrape(org_id).await?;
        Ok(exposition::render(&set))
    }

    async fn run_collectors(&self, ctx: &CollectContext) -> Vec<CollectorResult> {
        let backstop = ctx.deadline + COLLECTOR_GRACE;
        let mut tasks = JoinSet::new();

        for &kind in self.collectors.kinds() {
            let ctx = ctx.clone();
            tasks.spawn(async move {
                match timeout_at(backstop, kind.collect(&ctx)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(org_id = %ctx.org_id, collector = %kind, "Collector cancelled at deadline");
                        CollectorResult::timed_out(kind)
                    }
                }
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(org_id = %ctx.org_id, error = %e, "Collector task failed"),
            }
        }

        let finished: Vec<CollectorKind> = results.iter().map(|r| r.kind).collect();
        debug!(org_id = %ctx.org_id, collectors = ?finished, "Collectors joined");
        results
    }
}
