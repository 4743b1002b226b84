//! Access point traffic, clients, CPU load and memory.

use std::collections::BTreeMap;

use meraki_dashboard::ProductType;
use meraki_dashboard::models::{
    CpuLoadHistory, DeviceClient, MemoryUsageHistory, WirelessUsageInterval,
};
use tokio::task::JoinSet;
use tracing::warn;

use super::switch::BYTES_PER_KILOBYTE;
use super::{CollectContext, CollectorKind, CollectorResult, FetchError};
use crate::sample::{Metric, MetricSample};
use crate::topology::TopologyIndex;

/// Client traffic through an access point, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApTraffic {
    pub sent: f64,
    pub received: f64,
}

impl ApTraffic {
    pub fn total(&self) -> f64 {
        self.sent + self.received
    }
}

/// Latest bandwidth figures of an access point, in kbps.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApBandwidth {
    pub total: Option<f64>,
    pub sent: Option<f64>,
    pub received: Option<f64>,
}

/// Telemetry of one access point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WirelessApRecord {
    pub serial: String,
    pub usage: Option<ApTraffic>,
    pub client_count: Option<usize>,
    pub bandwidth: Option<ApBandwidth>,
    pub cpu_load_percent: Option<f64>,
    pub memory_used_percent: Option<f64>,
}

/// Sum client usage (kilobytes) into AP traffic in bytes.
pub fn client_traffic(clients: &[DeviceClient]) -> ApTraffic {
    clients
        .iter()
        .filter_map(|c| c.usage)
        .fold(ApTraffic::default(), |acc, usage| ApTraffic {
            sent: acc.sent + usage.sent * BYTES_PER_KILOBYTE,
            received: acc.received + usage.recv * BYTES_PER_KILOBYTE,
        })
}

/// Most recent interval that reports a total.
pub fn latest_bandwidth(history: &[WirelessUsageInterval]) -> Option<ApBandwidth> {
    history
        .iter()
        .rev()
        .find(|i| i.total_kbps.is_some())
        .map(|i| ApBandwidth {
            total: i.total_kbps,
            sent: i.sent_kbps,
            received: i.received_kbps,
        })
}

/// Latest 5-minute CPU load per serial.
pub fn cpu_loads(history: Vec<CpuLoadHistory>) -> Vec<(String, f64)> {
    history
        .into_iter()
        .filter_map(|h| {
            let load = h.series.iter().rev().find_map(|p| p.cpu_load5)?;
            Some((h.serial?, load))
        })
        .collect()
}

/// Latest maximum memory-used percentage per serial.
pub fn memory_used(history: Vec<MemoryUsageHistory>) -> Vec<(String, f64)> {
    history
        .into_iter()
        .filter_map(|h| {
            let used = h.intervals.iter().rev().find_map(|i| {
                i.memory
                    .as_ref()?
                    .used
                    .as_ref()?
                    .percentages
                    .as_ref()?
                    .maximum
            })?;
            Some((h.serial?, used))
        })
        .collect()
}

/// Translate access point records into samples.
pub fn emit(result: &mut CollectorResult, topology: &TopologyIndex, records: &[WirelessApRecord]) {
    for record in records {
        let Some(labels) = result.labels(topology, Some(record.serial.as_str())) else {
            continue;
        };

        let mut series: Vec<(Metric, Option<f64>)> = Vec::with_capacity(9);
        if let Some(usage) = record.usage {
            series.extend([
                (Metric::WirelessUsageTotalBytes, Some(usage.total())),
                (Metric::WirelessUsageSentBytes, Some(usage.sent)),
                (Metric::WirelessUsageReceivedBytes, Some(usage.received)),
            ]);
        }
        if let Some(bandwidth) = record.bandwidth {
            series.extend([
                (Metric::WirelessBandwidthTotalKbps, bandwidth.total),
                (Metric::WirelessBandwidthSentKbps, bandwidth.sent),
                (Metric::WirelessBandwidthReceivedKbps, bandwidth.received),
            ]);
        }
        series.extend([
            (
                Metric::WirelessClientCount,
                record.client_count.map(|n| n as f64),
            ),
            (Metric::WirelessApCpuLoad, record.cpu_load_percent),
            (Metric::WirelessApMemoryUsedPercent, record.memory_used_percent),
        ]);

        for (metric, value) in series {
            if let Some(value) = value {
                result.push(MetricSample::device(metric, labels, value));
            }
        }
    }
}

pub async fn collect(ctx: &CollectContext) -> CollectorResult {
    let mut result = CollectorResult::new(CollectorKind::Wireless);
    let timespan = ctx.options.wireless_timespan_secs;

    let aps: Vec<(String, String)> = ctx
        .topology
        .devices_of(ProductType::Wireless)
        .map(|d| (d.serial().to_string(), d.network_id.clone()))
        .collect();

    let (per_ap, cpu, memory) = tokio::join!(
        fetch_per_ap(ctx, aps),
        ctx.fetch(
            ctx.client
                .get_organization_wireless_cpu_load_history(&ctx.org_id, timespan)
        ),
        ctx.fetch(
            ctx.client
                .get_organization_wireless_memory_usage_history(&ctx.org_id, timespan)
        ),
    );

    let mut records: BTreeMap<String, WirelessApRecord> = BTreeMap::new();

    for fetched in per_ap {
        let serial = fetched.serial;
        if let Some(clients) = result.soft(&format!("clients of {serial}"), fetched.clients) {
            let entry = record_for(&mut records, serial.clone());
            entry.usage = Some(client_traffic(&clients));
            entry.client_count = Some(clients.len());
        }
        if let Some(history) = result.soft(&format!("usage history of {serial}"), fetched.history)
        {
            record_for(&mut records, serial).bandwidth = latest_bandwidth(&history);
        }
    }

    if let Some(history) = result.soft("AP CPU load", cpu) {
        for (serial, load) in cpu_loads(history) {
            record_for(&mut records, serial).cpu_load_percent = Some(load);
        }
    }

    if let Some(history) = result.soft("AP memory usage", memory) {
        for (serial, used) in memory_used(history) {
            record_for(&mut records, serial).memory_used_percent = Some(used);
        }
    }

    let records: Vec<WirelessApRecord> = records.into_values().collect();
    emit(&mut result, &ctx.topology, &records);
    result
}

fn record_for(
    records: &mut BTreeMap<String, WirelessApRecord>,
    serial: String,
) -> &mut WirelessApRecord {
    records
        .entry(serial.clone())
        .or_insert_with(|| WirelessApRecord {
            serial,
            ..WirelessApRecord::default()
        })
}

struct ApFetch {
    serial: String,
    clients: Result<Vec<DeviceClient>, FetchError>,
    history: Result<Vec<WirelessUsageInterval>, FetchError>,
}

/// Fetch clients and bandwidth history of every access point concurrently.
async fn fetch_per_ap(ctx: &CollectContext, aps: Vec<(String, String)>) -> Vec<ApFetch> {
    let timespan = ctx.options.wireless_timespan_secs;
    let mut tasks = JoinSet::new();

    for (serial, network_id) in aps {
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let (clients, history) = tokio::join!(
                ctx.fetch(ctx.client.get_device_clients(&serial, timespan)),
                ctx.fetch(ctx.client.get_network_wireless_usage_history(
                    &network_id,
                    &serial,
                    timespan,
                )),
            );
            ApFetch {
                serial,
                clients,
                history,
            }
        });
    }

    let mut fetched = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(ap) => fetched.push(ap),
            Err(e) => warn!(error = %e, "Access point task failed"),
        }
    }
    fetched.sort_by(|a, b| a.serial.cmp(&b.serial));
    fetched
}
