//! Switch port usage for uplink ports and ports facing access points.

use std::collections::HashSet;

use meraki_dashboard::models::{
    SwitchPortStatus, SwitchPortUsageByDevice, SwitchPortUsageHistory, SwitchPortsBySwitch,
    TrafficSplit,
};
use tokio::task::JoinSet;
use tracing::warn;

use super::{CollectContext, CollectorKind, CollectorResult, FetchError};
use crate::sample::{Metric, MetricSample};
use crate::topology::TopologyIndex;

/// Usage figures from the dashboard are kilobytes.
pub const BYTES_PER_KILOBYTE: f64 = 1024.0;

/// Tag that marks a switch port as an uplink.
const UPLINK_TAG: &str = "uplink";

/// Latest usage of one switch port.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchPortUsageRecord {
    pub serial: String,
    pub port_id: String,
    /// Traffic in bytes.
    pub usage_bytes: Option<TrafficSplit>,
    pub bandwidth_kbps: Option<TrafficSplit>,
}

impl SwitchPortUsageRecord {
    /// Build a record from the most recent interval of a port's history.
    pub fn from_history(serial: &str, port: &SwitchPortUsageHistory) -> Option<Self> {
        let latest = port.intervals.last()?;
        let usage_bytes = latest.data.as_ref().map(|d| TrafficSplit {
            total: d.usage.total * BYTES_PER_KILOBYTE,
            upstream: d.usage.upstream * BYTES_PER_KILOBYTE,
            downstream: d.usage.downstream * BYTES_PER_KILOBYTE,
        });
        let bandwidth_kbps = latest.bandwidth.as_ref().map(|b| b.usage);

        if usage_bytes.is_none() && bandwidth_kbps.is_none() {
            return None;
        }

        Some(Self {
            serial: serial.to_string(),
            port_id: port.port_id.clone(),
            usage_bytes,
            bandwidth_kbps,
        })
    }
}

/// Ports whose usage is exported, as `(serial, port id)`.
#[derive(Debug, Default)]
pub struct PortSelection {
    ports: HashSet<(String, String)>,
}

impl PortSelection {
    /// Select every port tagged `uplink`.
    pub fn from_tags(switches: &[SwitchPortsBySwitch]) -> Self {
        let mut selection = Self::default();
        for switch in switches {
            let Some(serial) = switch.serial.as_deref() else {
                continue;
            };
            for port in &switch.ports {
                if port.tags.iter().any(|t| t.eq_ignore_ascii_case(UPLINK_TAG)) {
                    selection.insert(serial, &port.port_id);
                }
            }
        }
        selection
    }

    /// Select every port whose LLDP/CDP neighbor is a known access point.
    pub fn add_access_point_ports(
        &mut self,
        topology: &TopologyIndex,
        serial: &str,
        statuses: &[SwitchPortStatus],
    ) {
        for status in statuses {
            let lldp = status.lldp.as_ref();
            let cdp = status.cdp.as_ref();
            let neighbor = topology.find_access_point(
                lldp.and_then(|l| l.chassis_id.as_deref()),
                cdp.and_then(|c| c.device_id.as_deref()),
                lldp.and_then(|l| l.system_name.as_deref()),
            );
            if neighbor.is_some() {
                self.insert(serial, &status.port_id);
            }
        }
    }

    pub fn insert(&mut self, serial: &str, port_id: &str) {
        self.ports.insert((serial.to_string(), port_id.to_string()));
    }

    pub fn contains(&self, serial: &str, port_id: &str) -> bool {
        self.ports
            .contains(&(serial.to_string(), port_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Records for the selected ports, in upstream order.
pub fn usage_records(
    usage: &[SwitchPortUsageByDevice],
    selection: &PortSelection,
) -> Vec<SwitchPortUsageRecord> {
    usage
        .iter()
        .filter_map(|device| Some((device.serial.as_deref()?, device)))
        .flat_map(|(serial, device)| {
            device
                .ports
                .iter()
                .filter(move |port| selection.contains(serial, &port.port_id))
                .filter_map(move |port| SwitchPortUsageRecord::from_history(serial, port))
        })
        .collect()
}

/// Translate port usage records into samples.
pub fn emit(
    result: &mut CollectorResult,
    topology: &TopologyIndex,
    records: &[SwitchPortUsageRecord],
) {
    for record in records {
        let Some(labels) = result.labels(topology, Some(record.serial.as_str())) else {
            continue;
        };

        let mut series = Vec::with_capacity(6);
        if let Some(bytes) = record.usage_bytes {
            series.extend([
                (Metric::SwitchPortUsageTotalBytes, bytes.total),
                (Metric::SwitchPortUsageUpstreamBytes, bytes.upstream),
                (Metric::SwitchPortUsageDownstreamBytes, bytes.downstream),
            ]);
        }
        if let Some(kbps) = record.bandwidth_kbps {
            series.extend([
                (Metric::SwitchPortBandwidthTotalKbps, kbps.total),
                (Metric::SwitchPortBandwidthUpstreamKbps, kbps.upstream),
                (Metric::SwitchPortBandwidthDownstreamKbps, kbps.downstream),
            ]);
        }

        for (metric, value) in series {
            result.push(
                MetricSample::device(metric, labels, value).with_label("portId", &record.port_id),
            );
        }
    }
}

pub async fn collect(ctx: &CollectContext) -> CollectorResult {
    let mut result = CollectorResult::new(CollectorKind::Switch);
    let client = &ctx.client;

    let (usage, tags) = tokio::join!(
        ctx.fetch(client.get_organization_switch_ports_usage_history(
            &ctx.org_id,
            ctx.options.switch_usage_timespan_secs,
        )),
        ctx.fetch(client.get_organization_switch_ports_by_switch(&ctx.org_id)),
    );

    let Some(usage) = result.soft("switch port usage", usage) else {
        return result;
    };
    let tags = result.soft("switch port tags", tags).unwrap_or_default();
    let mut selection = PortSelection::from_tags(&tags);

    // Neighbor lookups only for switches that reported usage.
    let serials: Vec<String> = usage
        .iter()
        .filter(|d| d.ports.iter().any(|p| !p.intervals.is_empty()))
        .filter_map(|d| d.serial.clone())
        .filter(|serial| ctx.topology.get(serial).is_some())
        .collect();

    for (serial, outcome) in fetch_port_statuses(ctx, serials).await {
        if let Some(statuses) = result.soft(&format!("port statuses of {serial}"), outcome) {
            selection.add_access_point_ports(&ctx.topology, &serial, &statuses);
        }
    }

    let records = usage_records(&usage, &selection);
    emit(&mut result, &ctx.topology, &records);
    result
}

type PortStatuses = (String, Result<Vec<SwitchPortStatus>, FetchError>);

/// Fetch live port statuses of several switches concurrently.
async fn fetch_port_statuses(ctx: &CollectContext, serials: Vec<String>) -> Vec<PortStatuses> {
    let mut tasks = JoinSet::new();
    for serial in serials {
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let outcome = ctx
                .fetch(ctx.client.get_device_switch_port_statuses(&serial))
                .await;
            (serial, outcome)
        });
    }

    let mut statuses = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => statuses.push(entry),
            Err(e) => warn!(error = %e, "Port status task failed"),
        }
    }
    statuses.sort_by(|a, b| a.0.cmp(&b.0));
    statuses
}
