// Endpoint methods on `DashboardClient`.
//
// One method per upstream call shape. Organization-wide listings are
// paginated; device- and network-scoped ones return a single array.
// Ids are passed as whole path segments and encoded by the URL builder.

use crate::client::DashboardClient;
use crate::error::Result;
use crate::models::{
    ApplianceUplinkStatus, CpuLoadHistory, Device, DeviceClient, DeviceStatus, FloorPlan,
    MemoryUsageHistory, Network, Organization, SwitchPortStatus, SwitchPortUsageByDevice,
    SwitchPortsBySwitch, UplinkLossAndLatency, VpnStatus, WirelessUsageInterval,
};

impl DashboardClient {
    // ── Organizations & topology ─────────────────────────────────────

    /// List organizations the API key can access.
    pub async fn get_organizations(&self) -> Result<Vec<Organization>> {
        self.get_list(&["organizations"], &[]).await
    }

    /// List networks of an organization.
    pub async fn get_organization_networks(&self, org_id: &str) -> Result<Vec<Network>> {
        self.get_list(&["organizations", org_id, "networks"], &[])
            .await
    }

    /// List floor plans of a network.
    pub async fn get_network_floor_plans(&self, network_id: &str) -> Result<Vec<FloorPlan>> {
        self.get_json(&["networks", network_id, "floorPlans"], &[])
            .await
    }

    /// List devices of a network.
    pub async fn get_network_devices(&self, network_id: &str) -> Result<Vec<Device>> {
        self.get_json(&["networks", network_id, "devices"], &[])
            .await
    }

    // ── Device status & uplinks ──────────────────────────────────────

    /// Online/offline status of every device in an organization.
    pub async fn get_organization_devices_statuses(
        &self,
        org_id: &str,
    ) -> Result<Vec<DeviceStatus>> {
        self.get_list(&["organizations", org_id, "devices", "statuses"], &[])
            .await
    }

    /// Loss and latency towards `ip` for every uplink over `timespan_secs`.
    pub async fn get_organization_devices_uplinks_loss_and_latency(
        &self,
        org_id: &str,
        ip: &str,
        timespan_secs: u64,
    ) -> Result<Vec<UplinkLossAndLatency>> {
        self.get_json(
            &["organizations", org_id, "devices", "uplinksLossAndLatency"],
            &[("ip", ip.to_string()), ("timespan", timespan_secs.to_string())],
        )
        .await
    }

    /// Uplink statuses of every appliance in an organization.
    pub async fn get_organization_appliance_uplink_statuses(
        &self,
        org_id: &str,
    ) -> Result<Vec<ApplianceUplinkStatus>> {
        self.get_list(
            &["organizations", org_id, "appliance", "uplink", "statuses"],
            &[],
        )
        .await
    }

    // ── VPN ──────────────────────────────────────────────────────────

    /// Site-to-site VPN status of every appliance in an organization.
    pub async fn get_organization_appliance_vpn_statuses(
        &self,
        org_id: &str,
    ) -> Result<Vec<VpnStatus>> {
        self.get_list(
            &["organizations", org_id, "appliance", "vpn", "statuses"],
            &[],
        )
        .await
    }

    // ── Switches ─────────────────────────────────────────────────────

    /// Port configuration (including tags) of every switch.
    pub async fn get_organization_switch_ports_by_switch(
        &self,
        org_id: &str,
    ) -> Result<Vec<SwitchPortsBySwitch>> {
        self.get_list(&["organizations", org_id, "switch", "ports", "bySwitch"], &[])
            .await
    }

    /// Per-port usage history of every switch over `timespan_secs`.
    pub async fn get_organization_switch_ports_usage_history(
        &self,
        org_id: &str,
        timespan_secs: u64,
    ) -> Result<Vec<SwitchPortUsageByDevice>> {
        self.get_list(
            &[
                "organizations",
                org_id,
                "switch",
                "ports",
                "usage",
                "history",
                "byDevice",
                "byInterval",
            ],
            &[("timespan", timespan_secs.to_string())],
        )
        .await
    }

    /// Live port statuses of one switch, including LLDP/CDP neighbors.
    pub async fn get_device_switch_port_statuses(
        &self,
        serial: &str,
    ) -> Result<Vec<SwitchPortStatus>> {
        self.get_json(&["devices", serial, "switch", "ports", "statuses"], &[])
            .await
    }

    // ── Wireless ─────────────────────────────────────────────────────

    /// Clients seen by a device over `timespan_secs`.
    pub async fn get_device_clients(
        &self,
        serial: &str,
        timespan_secs: u64,
    ) -> Result<Vec<DeviceClient>> {
        self.get_json(
            &["devices", serial, "clients"],
            &[("timespan", timespan_secs.to_string())],
        )
        .await
    }

    /// Bandwidth history of one access point.
    pub async fn get_network_wireless_usage_history(
        &self,
        network_id: &str,
        serial: &str,
        timespan_secs: u64,
    ) -> Result<Vec<WirelessUsageInterval>> {
        self.get_json(
            &["networks", network_id, "wireless", "usageHistory"],
            &[
                ("deviceSerial", serial.to_string()),
                ("timespan", timespan_secs.to_string()),
                ("resolution", timespan_secs.to_string()),
            ],
        )
        .await
    }

    /// CPU load history of every access point.
    pub async fn get_organization_wireless_cpu_load_history(
        &self,
        org_id: &str,
        timespan_secs: u64,
    ) -> Result<Vec<CpuLoadHistory>> {
        self.get_list(
            &[
                "organizations",
                org_id,
                "wireless",
                "devices",
                "system",
                "cpu",
                "load",
                "history",
            ],
            &[("timespan", timespan_secs.to_string())],
        )
        .await
    }

    /// Memory usage history of every access point.
    pub async fn get_organization_wireless_memory_usage_history(
        &self,
        org_id: &str,
        timespan_secs: u64,
    ) -> Result<Vec<MemoryUsageHistory>> {
        self.get_list(
            &[
                "organizations",
                org_id,
                "devices",
                "system",
                "memory",
                "usage",
                "history",
                "byInterval",
            ],
            &[
                ("timespan", timespan_secs.to_string()),
                ("productTypes[]", "wireless".to_string()),
            ],
        )
        .await
    }
}
