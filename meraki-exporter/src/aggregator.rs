//! Merges collector output into one immutable sample set.

use std::collections::HashSet;
use std::time::Instant;

use tracing::warn;

use crate::collectors::CollectorResult;
use crate::config::FilterConfig;
use crate::sample::{Metric, MetricSample};

/// Glob filter on metric names.
pub struct MetricFilter {
    include_metrics: Vec<glob::Pattern>,
    exclude_metrics: Vec<glob::Pattern>,
}

impl MetricFilter {
    /// Create a new filter from configuration. Invalid patterns are skipped.
    pub fn new(config: &FilterConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<glob::Pattern> {
            patterns
                .iter()
                .filter_map(|p| match glob::Pattern::new(p) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        warn!(pattern = %p, error = %e, "Ignoring invalid metric filter");
                        None
                    }
                })
                .collect()
        };

        Self {
            include_metrics: compile(&config.include_metrics),
            exclude_metrics: compile(&config.exclude_metrics),
        }
    }

    /// Check if a metric family should be exported.
    pub fn should_include(&self, metric: Metric) -> bool {
        if metric == Metric::RequestProcessingSeconds {
            return true;
        }

        let name = metric.name();
        if !self.include_metrics.is_empty() && !self.include_metrics.iter().any(|p| p.matches(name))
        {
            return false;
        }
        !self.exclude_metrics.iter().any(|p| p.matches(name))
    }
}

impl Default for MetricFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

/// The merged, de-duplicated samples of one scrape.
///
/// Immutable once built; rendering never goes back to the collectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<MetricSample>,
}

impl SampleSet {
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples of one metric family, in set order.
    pub fn family(&self, metric: Metric) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter().filter(move |s| s.metric == metric)
    }

    /// Wall-clock processing time recorded for this scrape.
    pub fn processing_seconds(&self) -> Option<f64> {
        self.family(Metric::RequestProcessingSeconds)
            .next()
            .map(|s| s.value)
    }
}

/// Per-scrape aggregation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub collected: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub foreign: usize,
}

/// Merges [`CollectorResult`]s.
#[derive(Default)]
pub struct Aggregator {
    filter: MetricFilter,
}

impl Aggregator {
    pub fn new(filter: MetricFilter) -> Self {
        Self { filter }
    }

    /// Merge collector results into a [`SampleSet`].
    ///
    /// Results are concatenated in collector order whatever order they
    /// finished in. A sample outside its collector's metric domain, or a
    /// second sample for an already-seen series, is dropped with a warning.
    /// `request_processing_seconds` is appended last, measured from
    /// `started`.
    pub fn aggregate(
        &self,
        mut results: Vec<CollectorResult>,
        started: Instant,
    ) -> (SampleSet, AggregateStats) {
        results.sort_by_key(|r| r.kind);

        let mut stats = AggregateStats::default();
        let mut merged: Vec<MetricSample> = Vec::new();

        for result in results {
            let domain = result.kind.domain();
            for sample in result.samples {
                stats.collected += 1;
                if sample.metric.domain() != domain {
                    warn!(
                        collector = %result.kind,
                        metric = %sample.metric,
                        "Dropping sample outside the collector's domain"
                    );
                    stats.foreign += 1;
                    continue;
                }
                if !self.filter.should_include(sample.metric) {
                    stats.filtered += 1;
                    continue;
                }
                merged.push(sample);
            }
        }

        let keep: Vec<bool> = {
            let mut seen = HashSet::with_capacity(merged.len());
            merged
                .iter()
                .map(|sample| {
                    let fresh = seen.insert(sample.series_key());
                    if !fresh {
                        warn!(metric = %sample.metric, "Dropping duplicate series");
                    }
                    fresh
                })
                .collect()
        };
        let mut keep = keep.into_iter();
        merged.retain(|_| keep.next().unwrap_or(false));
        stats.duplicates = stats.collected - stats.filtered - stats.foreign - merged.len();

        merged.push(MetricSample::global(
            Metric::RequestProcessingSeconds,
            started.elapsed().as_secs_f64(),
        ));

        (SampleSet { samples: merged }, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::CollectorKind;
    use crate::sample::LabelSet;
    use meraki_dashboard::ProductType;
    use std::sync::Arc;

    fn labels(serial: &str) -> Arc<LabelSet> {
        Arc::new(LabelSet {
            name: serial.to_string(),
            office: "HQ".to_string(),
            floor: String::new(),
            product_type: ProductType::Switch,
            serial: serial.to_string(),
        })
    }

    fn result(kind: CollectorKind, samples: Vec<MetricSample>) -> CollectorResult {
        CollectorResult {
            samples,
            ..CollectorResult::new(kind)
        }
    }

    #[test]
    fn test_concatenates_in_collector_order() {
        let l = labels("Q2SW-0001");
        let results = vec![
            result(
                CollectorKind::Switch,
                vec![
                    MetricSample::device(Metric::SwitchPortUsageTotalBytes, &l, 1000.0)
                        .with_label("portId", "1"),
                ],
            ),
            result(
                CollectorKind::Device,
                vec![MetricSample::device(Metric::DeviceStatus, &l, 1.0)],
            ),
        ];

        let (set, stats) = Aggregator::default().aggregate(results, Instant::now());

        let metrics: Vec<Metric> = set.samples().iter().map(|s| s.metric).collect();
        assert_eq!(
            metrics,
            vec![
                Metric::DeviceStatus,
                Metric::SwitchPortUsageTotalBytes,
                Metric::RequestProcessingSeconds
            ]
        );
        assert_eq!(stats.collected, 2);
        assert!(set.processing_seconds().unwrap() >= 0.0);
    }

    #[test]
    fn test_processing_time_has_no_labels() {
        let (set, _) = Aggregator::default().aggregate(Vec::new(), Instant::now());
        assert_eq!(set.len(), 1);
        assert!(set.samples()[0].labels.is_none());
        assert!(set.samples()[0].extra.is_empty());
    }

    #[test]
    fn test_duplicate_series_keeps_first() {
        let l = labels("Q2SW-0001");
        let results = vec![result(
            CollectorKind::Device,
            vec![
                MetricSample::device(Metric::DeviceStatus, &l, 1.0),
                MetricSample::device(Metric::DeviceStatus, &l, 0.0),
                MetricSample::device(Metric::DeviceStatus, &labels("Q2SW-0002"), 0.0),
            ],
        )];

        let (set, stats) = Aggregator::default().aggregate(results, Instant::now());

        let values: Vec<f64> = set.family(Metric::DeviceStatus).map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 0.0]);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_drops_foreign_metrics() {
        let l = labels("Q2SW-0001");
        let results = vec![result(
            CollectorKind::Vpn,
            vec![MetricSample::device(Metric::DeviceStatus, &l, 1.0)],
        )];

        let (set, stats) = Aggregator::default().aggregate(results, Instant::now());
        assert_eq!(set.family(Metric::DeviceStatus).count(), 0);
        assert_eq!(stats.foreign, 1);
    }

    #[test]
    fn test_metric_filter_glob_patterns() {
        let filter = MetricFilter::new(&FilterConfig {
            include_metrics: vec!["meraki_device_*".to_string()],
            exclude_metrics: vec!["*_latency".to_string(), "[".to_string()],
        });

        assert!(filter.should_include(Metric::DeviceStatus));
        assert!(!filter.should_include(Metric::DeviceLatency));
        assert!(!filter.should_include(Metric::VpnMode));
        assert!(filter.should_include(Metric::RequestProcessingSeconds));
    }

    #[test]
    fn test_filtered_samples_are_counted() {
        let l = labels("Q2SW-0001");
        let aggregator = Aggregator::new(MetricFilter::new(&FilterConfig {
            include_metrics: Vec::new(),
            exclude_metrics: vec!["meraki_device_status".to_string()],
        }));
        let results = vec![result(
            CollectorKind::Device,
            vec![MetricSample::device(Metric::DeviceStatus, &l, 1.0)],
        )];

        let (set, stats) = aggregator.aggregate(results, Instant::now());
        assert_eq!(set.len(), 1);
        assert_eq!(stats.filtered, 1);
    }
}
