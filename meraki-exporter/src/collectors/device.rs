//! Device status, uplink state and uplink loss/latency.

use std::collections::HashMap;

use meraki_dashboard::models::{ApplianceUplinkStatus, DeviceStatus, UplinkLossAndLatency};

use super::{CollectContext, CollectorKind, CollectorResult};
use crate::sample::{Metric, MetricSample, flag};
use crate::topology::TopologyIndex;

/// Uplink state, exported as its discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkState {
    Active = 0,
    Ready = 1,
    Connecting = 2,
    NotConnected = 3,
    Failed = 4,
}

impl UplinkState {
    /// Parse the dashboard's status string.
    pub fn parse(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "active" => Some(UplinkState::Active),
            "ready" => Some(UplinkState::Ready),
            "connecting" => Some(UplinkState::Connecting),
            "not connected" | "not-connected" | "not_connected" => Some(UplinkState::NotConnected),
            "failed" => Some(UplinkState::Failed),
            _ => None,
        }
    }

    pub fn value(self) -> f64 {
        f64::from(self as u8)
    }
}

/// Online state of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatusRecord {
    pub serial: String,
    pub online: bool,
    pub using_cellular_failover: Option<bool>,
}

impl DeviceStatusRecord {
    fn from_status(status: DeviceStatus) -> Option<Self> {
        Some(Self {
            serial: status.serial?,
            online: status.status? == "online",
            using_cellular_failover: status.using_cellular_failover,
        })
    }
}

/// State and quality of one uplink interface of a device.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkRecord {
    pub serial: String,
    pub interface: String,
    pub status: Option<UplinkState>,
    /// Raw status string that [`UplinkState::parse`] did not recognize.
    pub unrecognized_status: Option<String>,
    pub latency_ms: Option<f64>,
    pub loss_percent: Option<f64>,
}

impl UplinkRecord {
    fn new(serial: String, interface: String) -> Self {
        Self {
            serial,
            interface,
            status: None,
            unrecognized_status: None,
            latency_ms: None,
            loss_percent: None,
        }
    }
}

/// Merge uplink statuses and loss/latency series into one record per
/// `(serial, interface)`, in first-seen order.
pub fn uplink_records(
    statuses: Vec<ApplianceUplinkStatus>,
    loss_and_latency: Vec<UplinkLossAndLatency>,
) -> Vec<UplinkRecord> {
    let mut records: Vec<UplinkRecord> = Vec::new();
    let mut positions: HashMap<(String, String), usize> = HashMap::new();

    let mut entry = |serial: String, interface: String| -> usize {
        *positions
            .entry((serial.clone(), interface.clone()))
            .or_insert_with(|| {
                records.push(UplinkRecord::new(serial, interface));
                records.len() - 1
            })
    };

    let mut updates: Vec<(usize, Update)> = Vec::new();

    for appliance in statuses {
        let Some(serial) = appliance.serial else {
            continue;
        };
        for uplink in appliance.uplinks {
            let position = entry(serial.clone(), uplink.interface);
            let status = UplinkState::parse(&uplink.status).ok_or(uplink.status);
            updates.push((position, Update::Status(status)));
        }
    }

    for series in loss_and_latency {
        let (Some(serial), Some(interface)) = (series.serial, series.uplink) else {
            continue;
        };
        // Most recent point that carries a value.
        let latency = series.time_series.iter().rev().find_map(|p| p.latency_ms);
        let loss = series.time_series.iter().rev().find_map(|p| p.loss_percent);
        let position = entry(serial, interface);
        updates.push((position, Update::Quality { latency, loss }));
    }

    for (position, update) in updates {
        let record = &mut records[position];
        match update {
            Update::Status(Ok(state)) => record.status = Some(state),
            Update::Status(Err(raw)) => record.unrecognized_status = Some(raw),
            Update::Quality { latency, loss } => {
                record.latency_ms = latency;
                record.loss_percent = loss;
            }
        }
    }

    records
}

enum Update {
    Status(Result<UplinkState, String>),
    Quality {
        latency: Option<f64>,
        loss: Option<f64>,
    },
}

/// Translate device records into samples.
pub fn emit(
    result: &mut CollectorResult,
    topology: &TopologyIndex,
    statuses: &[DeviceStatusRecord],
    uplinks: &[UplinkRecord],
) {
    for status in statuses {
        let Some(labels) = result.labels(topology, Some(status.serial.as_str())) else {
            continue;
        };
        result.push(MetricSample::device(
            Metric::DeviceStatus,
            labels,
            flag(status.online),
        ));
        if let Some(failover) = status.using_cellular_failover {
            result.push(MetricSample::device(
                Metric::DeviceUsingCellularFailover,
                labels,
                flag(failover),
            ));
        }
    }

    for uplink in uplinks {
        let Some(labels) = result.labels(topology, Some(uplink.serial.as_str())) else {
            continue;
        };
        if let Some(latency_ms) = uplink.latency_ms {
            result.push(
                MetricSample::device(Metric::DeviceLatency, labels, latency_ms / 1000.0)
                    .with_label("uplink", &uplink.interface),
            );
        }
        if let Some(loss) = uplink.loss_percent {
            result.push(
                MetricSample::device(Metric::DeviceLossPercent, labels, loss)
                    .with_label("uplink", &uplink.interface),
            );
        }
        if let Some(state) = uplink.status {
            result.push(
                MetricSample::device(Metric::DeviceUplinkStatus, labels, state.value())
                    .with_label("uplink", &uplink.interface),
            );
        } else if let Some(raw) = &uplink.unrecognized_status {
            result.unrecognized("uplink status", &uplink.serial, raw);
        }
    }
}

pub async fn collect(ctx: &CollectContext) -> CollectorResult {
    let mut result = CollectorResult::new(CollectorKind::Device);
    let client = &ctx.client;
    let options = &ctx.options;

    let (statuses, uplink_statuses, loss_and_latency) = tokio::join!(
        ctx.fetch(client.get_organization_devices_statuses(&ctx.org_id)),
        ctx.fetch(client.get_organization_appliance_uplink_statuses(&ctx.org_id)),
        ctx.fetch(client.get_organization_devices_uplinks_loss_and_latency(
            &ctx.org_id,
            &options.latency_probe_ip,
            options.latency_timespan_secs,
        )),
    );

    let statuses: Vec<DeviceStatusRecord> = result
        .soft("device statuses", statuses)
        .unwrap_or_default()
        .into_iter()
        .filter_map(DeviceStatusRecord::from_status)
        .collect();
    let uplink_statuses = result
        .soft("appliance uplink statuses", uplink_statuses)
        .unwrap_or_default();
    let loss_and_latency = result
        .soft("uplink loss and latency", loss_and_latency)
        .unwrap_or_default();

    let uplinks = uplink_records(uplink_statuses, loss_and_latency);
    emit(&mut result, &ctx.topology, &statuses, &uplinks);
    result
}
