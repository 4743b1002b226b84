//! Per-request device topology.
//!
//! Resolves an organization's networks, floor plans and devices into a
//! read-only index keyed by device serial. Collectors join every telemetry
//! payload against this index; anything that does not resolve is dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use meraki_dashboard::models::{Device, FloorPlan, Network};
use meraki_dashboard::{DashboardClient, ErrorKind, ProductType};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::sample::LabelSet;
use crate::scrape::ScrapeError;

/// A device known to the topology.
#[derive(Debug, Clone)]
pub struct DeviceEntry {
    pub labels: Arc<LabelSet>,
    pub network_id: String,
    pub mac: Option<String>,
    pub product: ProductType,
}

impl DeviceEntry {
    pub fn serial(&self) -> &str {
        &self.labels.serial
    }
}

/// Devices of one network together with the network's floor plans.
#[derive(Debug, Clone)]
pub struct NetworkTopology {
    pub network: Network,
    pub devices: Vec<Device>,
    pub floor_plans: Vec<FloorPlan>,
}

/// Read-only label index for one scrape.
#[derive(Debug, Default)]
pub struct TopologyIndex {
    devices: BTreeMap<String, DeviceEntry>,
    by_mac: HashMap<String, String>,
}

impl TopologyIndex {
    /// Build the index from fetched networks.
    ///
    /// Label fallbacks: a device without a name is labelled with its MAC
    /// (then its serial), a network without a name with its id, and a device
    /// without a floor plan gets an empty `floor`. The first occurrence of a
    /// serial wins.
    pub fn build(networks: impl IntoIterator<Item = NetworkTopology>) -> Self {
        let mut index = Self::default();

        for topology in networks {
            let office = non_empty(topology.network.name.as_deref())
                .unwrap_or(&topology.network.id)
                .to_string();

            let floors = floor_names(&topology.floor_plans);

            for device in topology.devices {
                if index.devices.contains_key(&device.serial) {
                    debug!(serial = %device.serial, "Duplicate device in topology, keeping first");
                    continue;
                }

                let floor = device
                    .floor_plan_id
                    .as_deref()
                    .and_then(|id| floors.by_plan.get(id))
                    .or_else(|| floors.by_serial.get(device.serial.as_str()))
                    .cloned()
                    .unwrap_or_default();

                let name = non_empty(device.name.as_deref())
                    .or_else(|| non_empty(device.mac.as_deref()))
                    .unwrap_or(&device.serial)
                    .to_string();

                let product = device.product();
                let labels = Arc::new(LabelSet {
                    name,
                    office: office.clone(),
                    floor,
                    product_type: product,
                    serial: device.serial.clone(),
                });

                if let Some(mac) = device.mac.as_deref().and_then(normalize_mac) {
                    index.by_mac.insert(mac, device.serial.clone());
                }

                index.devices.insert(
                    device.serial.clone(),
                    DeviceEntry {
                        labels,
                        network_id: device
                            .network_id
                            .unwrap_or_else(|| topology.network.id.clone()),
                        mac: device.mac,
                        product,
                    },
                );
            }
        }

        index
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Look up a device by serial.
    pub fn get(&self, serial: &str) -> Option<&DeviceEntry> {
        self.devices.get(serial)
    }

    /// Labels of a device, if it is known.
    pub fn labels(&self, serial: &str) -> Option<&Arc<LabelSet>> {
        self.devices.get(serial).map(|d| &d.labels)
    }

    /// All devices, ordered by serial.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.devices.values()
    }

    /// Devices of one product family, ordered by serial.
    pub fn devices_of(&self, product: ProductType) -> impl Iterator<Item = &DeviceEntry> {
        self.devices.values().filter(move |d| d.product == product)
    }

    /// Look up a device by MAC address in any common notation.
    pub fn find_by_mac(&self, mac: &str) -> Option<&DeviceEntry> {
        let mac = normalize_mac(mac)?;
        self.by_mac.get(&mac).and_then(|serial| self.devices.get(serial))
    }

    /// Resolve a switch-port neighbor to a wireless access point.
    ///
    /// Candidates are tried in order: LLDP chassis id and CDP device id as
    /// MAC addresses, then the LLDP system name against device names.
    pub fn find_access_point(
        &self,
        lldp_chassis_id: Option<&str>,
        cdp_device_id: Option<&str>,
        lldp_system_name: Option<&str>,
    ) -> Option<&DeviceEntry> {
        let by_mac = [lldp_chassis_id, cdp_device_id]
            .into_iter()
            .flatten()
            .filter_map(|id| self.find_by_mac(id))
            .find(|d| d.product == ProductType::Wireless);
        if by_mac.is_some() {
            return by_mac;
        }

        let name = non_empty(lldp_system_name)?;
        self.devices_of(ProductType::Wireless)
            .find(|d| d.labels.name == name)
    }
}

struct FloorNames<'a> {
    by_plan: HashMap<&'a str, String>,
    by_serial: HashMap<&'a str, String>,
}

fn floor_names(plans: &[FloorPlan]) -> FloorNames<'_> {
    let mut by_plan = HashMap::new();
    let mut by_serial = HashMap::new();

    for plan in plans {
        let name = non_empty(plan.name.as_deref())
            .unwrap_or(&plan.floor_plan_id)
            .to_string();
        for serial in plan.devices.iter().filter_map(|d| d.serial.as_deref()) {
            by_serial.entry(serial).or_insert_with(|| name.clone());
        }
        by_plan.insert(plan.floor_plan_id.as_str(), name);
    }

    FloorNames { by_plan, by_serial }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Normalize a MAC address to 12 lowercase hex digits.
///
/// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-...`, `aabb.ccdd.eeff` and bare hex.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let hex: String = mac
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_ascii_lowercase())
        .collect();

    (hex.len() == 12 && hex.chars().all(|c| c.is_ascii_hexdigit())).then_some(hex)
}

// ── Resolution ───────────────────────────────────────────────────────

/// Fetch the topology of an organization.
///
/// Fatal only when the organization's network list is rejected for
/// credentials or the organization does not exist. Any other failure
/// yields a partial (possibly empty) index.
pub async fn resolve(
    client: &DashboardClient,
    org_id: &str,
    deadline: Instant,
) -> Result<TopologyIndex, ScrapeError> {
    let networks = match timeout_at(deadline, client.get_organization_networks(org_id)).await {
        Ok(Ok(networks)) => networks,
        Ok(Err(e)) if e.is_auth_failure() => return Err(ScrapeError::Unauthorized(e)),
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
            return Err(ScrapeError::UnknownOrganization(org_id.to_string()));
        }
        Ok(Err(e)) => {
            warn!(org_id, error = %e, "Failed to list networks");
            return Ok(TopologyIndex::default());
        }
        Err(_) => {
            warn!(org_id, "Deadline reached while listing networks");
            return Ok(TopologyIndex::default());
        }
    };

    let mut tasks = JoinSet::new();
    for (position, network) in networks.into_iter().enumerate() {
        let client = client.clone();
        tasks.spawn(async move { (position, fetch_network(&client, network, deadline).await) });
    }

    let mut fetched = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => fetched.push(entry),
            Err(e) => warn!(org_id, error = %e, "Network enumeration task failed"),
        }
    }
    fetched.sort_by_key(|(position, _)| *position);
    let network_count = fetched.len();

    let index = TopologyIndex::build(fetched.into_iter().map(|(_, topology)| topology));
    debug!(
        org_id,
        networks = network_count,
        devices = index.len(),
        "Resolved topology"
    );
    Ok(index)
}

async fn fetch_network(
    client: &DashboardClient,
    network: Network,
    deadline: Instant,
) -> NetworkTopology {
    let (devices, floor_plans) = tokio::join!(
        timeout_at(deadline, client.get_network_devices(&network.id)),
        timeout_at(deadline, client.get_network_floor_plans(&network.id)),
    );

    let devices = match devices {
        Ok(Ok(devices)) => devices,
        Ok(Err(e)) => {
            warn!(network_id = %network.id, error = %e, "Failed to list network devices");
            Vec::new()
        }
        Err(_) => {
            warn!(network_id = %network.id, "Deadline reached while listing network devices");
            Vec::new()
        }
    };

    // Floor plans only refine the `floor` label.
    let floor_plans = match floor_plans {
        Ok(Ok(plans)) => plans,
        Ok(Err(e)) => {
            debug!(network_id = %network.id, error = %e, "No floor plans for network");
            Vec::new()
        }
        Err(_) => Vec::new(),
    };

    NetworkTopology {
        network,
        devices,
        floor_plans,
    }
}
