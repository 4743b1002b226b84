//! Response models for the dashboard endpoints the exporter consumes.
//!
//! Fields use `#[serde(default)]` liberally: the dashboard omits keys instead
//! of sending `null` depending on product type and firmware. Anything that
//! does not match these shapes is reported as a malformed response by the
//! client rather than passed on as untyped JSON.

use serde::{Deserialize, Deserializer};

// ── Envelopes ────────────────────────────────────────────────────────

/// List body as returned by paginated endpoints.
///
/// Most endpoints return a bare JSON array; newer organization-wide
/// endpoints wrap the array in `{ "items": [...], "meta": {...} }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListBody<T> {
    Plain(Vec<T>),
    Enveloped { items: Vec<T> },
}

impl<T> ListBody<T> {
    pub(crate) fn into_items(self) -> Vec<T> {
        match self {
            ListBody::Plain(items) | ListBody::Enveloped { items } => items,
        }
    }
}

/// Accept either `"3"` or `3` for identifiers such as switch port ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

// ── Organizations & networks ─────────────────────────────────────────

/// Organization as returned by `/organizations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api: Option<OrganizationApi>,
}

impl Organization {
    /// Whether dashboard API access is enabled for this organization.
    ///
    /// Organizations that do not report the flag are assumed enabled.
    pub fn api_enabled(&self) -> bool {
        self.api.as_ref().is_none_or(|api| api.enabled)
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
    }
}

/// API access settings nested in [`Organization`].
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationApi {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Network as returned by `/organizations/{id}/networks`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub product_types: Vec<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Reference to a network embedded in organization-wide payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Floor plan as returned by `/networks/{id}/floorPlans`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlan {
    pub floor_plan_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub devices: Vec<FloorPlanDevice>,
}

/// Device placed on a floor plan.
#[derive(Debug, Clone, Deserialize)]
pub struct FloorPlanDevice {
    #[serde(default)]
    pub serial: Option<String>,
}

// ── Devices ──────────────────────────────────────────────────────────

/// Product family of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProductType {
    Appliance,
    Switch,
    Wireless,
    Other,
}

impl ProductType {
    /// Resolve the product type from the `productType` field, falling back to
    /// the model prefix for payloads that only carry `model`.
    pub fn resolve(product_type: Option<&str>, model: Option<&str>) -> Self {
        match product_type {
            Some("appliance") => return ProductType::Appliance,
            Some("switch") => return ProductType::Switch,
            Some("wireless") => return ProductType::Wireless,
            Some(other) if !other.is_empty() => return ProductType::Other,
            _ => {}
        }

        let model = model.unwrap_or_default().to_ascii_uppercase();
        if model.starts_with("MX") || model.starts_with('Z') {
            ProductType::Appliance
        } else if model.starts_with("MS") {
            ProductType::Switch
        } else if model.starts_with("MR") || model.starts_with("CW") {
            ProductType::Wireless
        } else {
            ProductType::Other
        }
    }

    /// Get the string representation used as a label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Appliance => "appliance",
            ProductType::Switch => "switch",
            ProductType::Wireless => "wireless",
            ProductType::Other => "other",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device as returned by `/networks/{id}/devices`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub floor_plan_id: Option<String>,
    #[serde(default)]
    pub lan_ip: Option<String>,
}

impl Device {
    /// Product family of this device.
    pub fn product(&self) -> ProductType {
        ProductType::resolve(self.product_type.as_deref(), self.model.as_deref())
    }
}

/// Entry of `/organizations/{id}/devices/statuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub using_cellular_failover: Option<bool>,
}

/// Entry of `/organizations/{id}/devices/uplinksLossAndLatency`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UplinkLossAndLatency {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub uplink: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub time_series: Vec<LossAndLatencyPoint>,
}

/// One point of an uplink loss/latency time series.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LossAndLatencyPoint {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub loss_percent: Option<f64>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
}

/// Entry of `/organizations/{id}/appliance/uplink/statuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceUplinkStatus {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub uplinks: Vec<ApplianceUplink>,
}

/// A single WAN/cellular uplink of an appliance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceUplink {
    pub interface: String,
    pub status: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
}

// ── VPN ──────────────────────────────────────────────────────────────

/// Entry of `/organizations/{id}/appliance/vpn/statuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnStatus {
    #[serde(default)]
    pub device_serial: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub network_name: Option<String>,
    #[serde(default)]
    pub device_status: Option<String>,
    #[serde(default)]
    pub vpn_mode: Option<String>,
    #[serde(default)]
    pub exported_subnets: Vec<ExportedSubnet>,
    #[serde(default)]
    pub meraki_vpn_peers: Vec<MerakiVpnPeer>,
    #[serde(default)]
    pub third_party_vpn_peers: Vec<ThirdPartyVpnPeer>,
}

/// Subnet advertised into the site-to-site VPN.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportedSubnet {
    pub subnet: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Meraki auto-VPN peer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerakiVpnPeer {
    pub network_id: String,
    #[serde(default)]
    pub network_name: Option<String>,
    #[serde(default)]
    pub reachability: Option<String>,
}

/// Non-Meraki (IPsec) VPN peer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThirdPartyVpnPeer {
    pub name: String,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub reachability: Option<String>,
}

// ── Switches ─────────────────────────────────────────────────────────

/// Entry of `/organizations/{id}/switch/ports/bySwitch`.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchPortsBySwitch {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network: Option<NetworkRef>,
    #[serde(default)]
    pub ports: Vec<SwitchPortConfig>,
}

/// Configuration of a single switch port.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPortConfig {
    #[serde(deserialize_with = "string_or_number")]
    pub port_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Entry of `/organizations/{id}/switch/ports/usage/history/byDevice/byInterval`.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchPortUsageByDevice {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network: Option<NetworkRef>,
    #[serde(default)]
    pub ports: Vec<SwitchPortUsageHistory>,
}

/// Usage history of one switch port.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPortUsageHistory {
    #[serde(deserialize_with = "string_or_number")]
    pub port_id: String,
    #[serde(default)]
    pub intervals: Vec<SwitchPortUsageInterval>,
}

/// One interval of switch port usage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPortUsageInterval {
    #[serde(default)]
    pub start_ts: Option<String>,
    #[serde(default)]
    pub end_ts: Option<String>,
    #[serde(default)]
    pub data: Option<UsageEnvelope>,
    #[serde(default)]
    pub bandwidth: Option<UsageEnvelope>,
}

/// `{ "usage": { total, upstream, downstream } }` wrapper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageEnvelope {
    #[serde(default)]
    pub usage: TrafficSplit,
}

/// Directional traffic figures. Units depend on the enclosing field:
/// kilobytes for `data`, kbps for `bandwidth`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct TrafficSplit {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub upstream: f64,
    #[serde(default)]
    pub downstream: f64,
}

/// Entry of `/devices/{serial}/switch/ports/statuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPortStatus {
    #[serde(deserialize_with = "string_or_number")]
    pub port_id: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_uplink: Option<bool>,
    #[serde(default)]
    pub lldp: Option<LldpNeighbor>,
    #[serde(default)]
    pub cdp: Option<CdpNeighbor>,
}

/// LLDP neighbor information of a switch port.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LldpNeighbor {
    #[serde(default)]
    pub system_name: Option<String>,
    #[serde(default)]
    pub chassis_id: Option<String>,
    #[serde(default)]
    pub port_id: Option<String>,
    #[serde(default)]
    pub management_address: Option<String>,
}

/// CDP neighbor information of a switch port.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdpNeighbor {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

// ── Wireless ─────────────────────────────────────────────────────────

/// Entry of `/devices/{serial}/clients`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceClient {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub usage: Option<ClientUsage>,
}

/// Client traffic in kilobytes.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ClientUsage {
    #[serde(default)]
    pub sent: f64,
    #[serde(default)]
    pub recv: f64,
}

/// Entry of `/networks/{id}/wireless/usageHistory`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirelessUsageInterval {
    #[serde(default)]
    pub start_ts: Option<String>,
    #[serde(default)]
    pub end_ts: Option<String>,
    #[serde(default)]
    pub total_kbps: Option<f64>,
    #[serde(default)]
    pub sent_kbps: Option<f64>,
    #[serde(default)]
    pub received_kbps: Option<f64>,
}

/// Entry of `/organizations/{id}/wireless/devices/system/cpu/load/history`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuLoadHistory {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default)]
    pub series: Vec<CpuLoadPoint>,
}

/// One CPU load sample; `cpu_load5` is the 5-minute average in percent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuLoadPoint {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub cpu_load5: Option<f64>,
}

/// Entry of `/organizations/{id}/devices/system/memory/usage/history/byInterval`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsageHistory {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub provisioned: Option<f64>,
    #[serde(default)]
    pub intervals: Vec<MemoryInterval>,
}

/// One interval of memory usage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInterval {
    #[serde(default)]
    pub start_ts: Option<String>,
    #[serde(default)]
    pub end_ts: Option<String>,
    #[serde(default)]
    pub memory: Option<MemoryStats>,
}

/// Memory statistics of an interval.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub used: Option<MemoryUsed>,
}

/// Used-memory figures of an interval.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryUsed {
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub percentages: Option<MemoryPercentages>,
}

/// Used memory as a percentage of provisioned memory.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryPercentages {
    #[serde(default)]
    pub maximum: Option<f64>,
}
