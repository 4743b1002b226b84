//! Metric catalog and the typed samples collectors produce.
//!
//! Every exported metric is a [`Metric`] variant. Its name, help text and
//! owning collector are fixed here, and the variant order is the order in
//! which families appear in the exposition output.

use std::sync::Arc;

use meraki_dashboard::ProductType;

/// Collector that owns a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricDomain {
    Device,
    Vpn,
    Switch,
    Wireless,
    Exporter,
}

/// An exported metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    DeviceStatus,
    DeviceLatency,
    DeviceLossPercent,
    DeviceUsingCellularFailover,
    DeviceUplinkStatus,
    VpnMode,
    VpnExportedSubnets,
    VpnMerakiPeers,
    VpnThirdPartyPeers,
    SwitchPortUsageTotalBytes,
    SwitchPortUsageUpstreamBytes,
    SwitchPortUsageDownstreamBytes,
    SwitchPortBandwidthTotalKbps,
    SwitchPortBandwidthUpstreamKbps,
    SwitchPortBandwidthDownstreamKbps,
    WirelessUsageTotalBytes,
    WirelessUsageSentBytes,
    WirelessUsageReceivedBytes,
    WirelessBandwidthTotalKbps,
    WirelessBandwidthSentKbps,
    WirelessBandwidthReceivedKbps,
    WirelessClientCount,
    WirelessApCpuLoad,
    WirelessApMemoryUsedPercent,
    RequestProcessingSeconds,
}

impl Metric {
    /// Every metric in exposition order.
    pub const ALL: [Metric; 25] = [
        Metric::DeviceStatus,
        Metric::DeviceLatency,
        Metric::DeviceLossPercent,
        Metric::DeviceUsingCellularFailover,
        Metric::DeviceUplinkStatus,
        Metric::VpnMode,
        Metric::VpnExportedSubnets,
        Metric::VpnMerakiPeers,
        Metric::VpnThirdPartyPeers,
        Metric::SwitchPortUsageTotalBytes,
        Metric::SwitchPortUsageUpstreamBytes,
        Metric::SwitchPortUsageDownstreamBytes,
        Metric::SwitchPortBandwidthTotalKbps,
        Metric::SwitchPortBandwidthUpstreamKbps,
        Metric::SwitchPortBandwidthDownstreamKbps,
        Metric::WirelessUsageTotalBytes,
        Metric::WirelessUsageSentBytes,
        Metric::WirelessUsageReceivedBytes,
        Metric::WirelessBandwidthTotalKbps,
        Metric::WirelessBandwidthSentKbps,
        Metric::WirelessBandwidthReceivedKbps,
        Metric::WirelessClientCount,
        Metric::WirelessApCpuLoad,
        Metric::WirelessApMemoryUsedPercent,
        Metric::RequestProcessingSeconds,
    ];

    /// Exposition name.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::DeviceStatus => "meraki_device_status",
            Metric::DeviceLatency => "meraki_device_latency",
            Metric::DeviceLossPercent => "meraki_device_loss_percent",
            Metric::DeviceUsingCellularFailover => "meraki_device_using_cellular_failover",
            Metric::DeviceUplinkStatus => "meraki_device_uplink_status",
            Metric::VpnMode => "meraki_vpn_mode",
            Metric::VpnExportedSubnets => "meraki_vpn_exported_subnets",
            Metric::VpnMerakiPeers => "meraki_vpn_meraki_peers",
            Metric::VpnThirdPartyPeers => "meraki_vpn_third_party_peers",
            Metric::SwitchPortUsageTotalBytes => "meraki_switch_port_usage_total_bytes",
            Metric::SwitchPortUsageUpstreamBytes => "meraki_switch_port_usage_upstream_bytes",
            Metric::SwitchPortUsageDownstreamBytes => "meraki_switch_port_usage_downstream_bytes",
            Metric::SwitchPortBandwidthTotalKbps => "meraki_switch_port_bandwidth_total_kbps",
            Metric::SwitchPortBandwidthUpstreamKbps => "meraki_switch_port_bandwidth_upstream_kbps",
            Metric::SwitchPortBandwidthDownstreamKbps => {
                "meraki_switch_port_bandwidth_downstream_kbps"
            }
            Metric::WirelessUsageTotalBytes => "meraki_wireless_usage_total_bytes",
            Metric::WirelessUsageSentBytes => "meraki_wireless_usage_sent_bytes",
            Metric::WirelessUsageReceivedBytes => "meraki_wireless_usage_received_bytes",
            Metric::WirelessBandwidthTotalKbps => "meraki_wireless_bandwidth_total_kbps",
            Metric::WirelessBandwidthSentKbps => "meraki_wireless_bandwidth_sent_kbps",
            Metric::WirelessBandwidthReceivedKbps => "meraki_wireless_bandwidth_received_kbps",
            Metric::WirelessClientCount => "meraki_wireless_client_count",
            Metric::WirelessApCpuLoad => "meraki_wireless_ap_cpu_load",
            Metric::WirelessApMemoryUsedPercent => "meraki_wireless_ap_memory_used_percent",
            Metric::RequestProcessingSeconds => "request_processing_seconds",
        }
    }

    /// HELP text.
    pub fn help(&self) -> &'static str {
        match self {
            Metric::DeviceStatus => "Device online status (1 = online)",
            Metric::DeviceLatency => "Uplink latency towards the probe address in seconds",
            Metric::DeviceLossPercent => "Uplink packet loss towards the probe address in percent",
            Metric::DeviceUsingCellularFailover => "Device is using cellular failover (1 = yes)",
            Metric::DeviceUplinkStatus => {
                "Uplink status (0 = active, 1 = ready, 2 = connecting, 3 = not connected, 4 = failed)"
            }
            Metric::VpnMode => "Site-to-site VPN mode (1 = hub, 0 = spoke)",
            Metric::VpnExportedSubnets => "Subnet exported into the site-to-site VPN",
            Metric::VpnMerakiPeers => "Meraki VPN peer reachability (1 = reachable)",
            Metric::VpnThirdPartyPeers => "Third-party VPN peer reachability (1 = reachable)",
            Metric::SwitchPortUsageTotalBytes => "Switch port total traffic in bytes",
            Metric::SwitchPortUsageUpstreamBytes => "Switch port upstream traffic in bytes",
            Metric::SwitchPortUsageDownstreamBytes => "Switch port downstream traffic in bytes",
            Metric::SwitchPortBandwidthTotalKbps => "Switch port total bandwidth in kbps",
            Metric::SwitchPortBandwidthUpstreamKbps => "Switch port upstream bandwidth in kbps",
            Metric::SwitchPortBandwidthDownstreamKbps => "Switch port downstream bandwidth in kbps",
            Metric::WirelessUsageTotalBytes => "Access point client traffic in bytes",
            Metric::WirelessUsageSentBytes => "Access point client sent traffic in bytes",
            Metric::WirelessUsageReceivedBytes => "Access point client received traffic in bytes",
            Metric::WirelessBandwidthTotalKbps => "Access point total bandwidth in kbps",
            Metric::WirelessBandwidthSentKbps => "Access point sent bandwidth in kbps",
            Metric::WirelessBandwidthReceivedKbps => "Access point received bandwidth in kbps",
            Metric::WirelessClientCount => "Clients connected to the access point",
            Metric::WirelessApCpuLoad => "Access point 5-minute average CPU load in percent",
            Metric::WirelessApMemoryUsedPercent => "Access point memory used in percent",
            Metric::RequestProcessingSeconds => "Time spent processing the scrape request",
        }
    }

    /// TYPE of the family. Every exported family is a gauge.
    pub fn metric_type(&self) -> &'static str {
        "gauge"
    }

    /// Collector that owns this metric.
    pub fn domain(&self) -> MetricDomain {
        match self {
            Metric::DeviceStatus
            | Metric::DeviceLatency
            | Metric::DeviceLossPercent
            | Metric::DeviceUsingCellularFailover
            | Metric::DeviceUplinkStatus => MetricDomain::Device,
            Metric::VpnMode
            | Metric::VpnExportedSubnets
            | Metric::VpnMerakiPeers
            | Metric::VpnThirdPartyPeers => MetricDomain::Vpn,
            Metric::SwitchPortUsageTotalBytes
            | Metric::SwitchPortUsageUpstreamBytes
            | Metric::SwitchPortUsageDownstreamBytes
            | Metric::SwitchPortBandwidthTotalKbps
            | Metric::SwitchPortBandwidthUpstreamKbps
            | Metric::SwitchPortBandwidthDownstreamKbps => MetricDomain::Switch,
            Metric::WirelessUsageTotalBytes
            | Metric::WirelessUsageSentBytes
            | Metric::WirelessUsageReceivedBytes
            | Metric::WirelessBandwidthTotalKbps
            | Metric::WirelessBandwidthSentKbps
            | Metric::WirelessBandwidthReceivedKbps
            | Metric::WirelessClientCount
            | Metric::WirelessApCpuLoad
            | Metric::WirelessApMemoryUsedPercent => MetricDomain::Wireless,
            Metric::RequestProcessingSeconds => MetricDomain::Exporter,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Labels shared by every sample of one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelSet {
    pub name: String,
    pub office: String,
    pub floor: String,
    pub product_type: ProductType,
    pub serial: String,
}

impl LabelSet {
    /// Label pairs in exposition order.
    pub fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("name", &self.name),
            ("office", &self.office),
            ("floor", &self.floor),
            ("product_type", self.product_type.as_str()),
            ("serial", &self.serial),
        ]
    }
}

/// One value of a metric family.
///
/// Device samples share their [`LabelSet`] through an `Arc` taken from the
/// topology index; only `request_processing_seconds` has no device labels.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub metric: Metric,
    pub value: f64,
    pub labels: Option<Arc<LabelSet>>,
    /// Per-metric labels, rendered after the device labels in this order.
    pub extra: Vec<(&'static str, String)>,
}

impl MetricSample {
    /// A sample attached to a device.
    pub fn device(metric: Metric, labels: &Arc<LabelSet>, value: f64) -> Self {
        Self {
            metric,
            value,
            labels: Some(Arc::clone(labels)),
            extra: Vec::new(),
        }
    }

    /// A sample without device labels.
    pub fn global(metric: Metric, value: f64) -> Self {
        Self {
            metric,
            value,
            labels: None,
            extra: Vec::new(),
        }
    }

    /// Append an extra label.
    pub fn with_label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.extra.push((key, value.into()));
        self
    }

    /// All label pairs in exposition order.
    pub fn label_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = Vec::with_capacity(5 + self.extra.len());
        if let Some(labels) = &self.labels {
            pairs.extend(labels.pairs());
        }
        pairs.extend(self.extra.iter().map(|(k, v)| (*k, v.as_str())));
        pairs
    }

    /// Identity of the series this sample belongs to.
    pub fn series_key(&self) -> SeriesKey<'_> {
        SeriesKey {
            metric: self.metric,
            labels: self.labels.as_deref(),
            extra: &self.extra,
        }
    }
}

/// Metric name plus full label set; the value is not part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesKey<'a> {
    pub metric: Metric,
    pub labels: Option<&'a LabelSet>,
    pub extra: &'a [(&'static str, String)],
}

/// Bool to gauge value.
pub fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}
