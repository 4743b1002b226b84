//! Site-to-site VPN mode, exported subnets and peer reachability.

use std::collections::HashSet;

use meraki_dashboard::models::VpnStatus;

use super::{CollectContext, CollectorKind, CollectorResult};
use crate::config::PeerAggregation;
use crate::sample::{Metric, MetricSample, flag};
use crate::topology::TopologyIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpnMode {
    Hub,
    Spoke,
}

impl VpnMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode.to_ascii_lowercase().as_str() {
            "hub" => Some(VpnMode::Hub),
            "spoke" => Some(VpnMode::Spoke),
            _ => None,
        }
    }
}

/// Reachability of one VPN peer plus the labels that identify it.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerStatus {
    pub labels: Vec<(&'static str, String)>,
    pub reachable: bool,
}

/// VPN state of one appliance.
#[derive(Debug, Clone, PartialEq)]
pub struct VpnPeerRecord {
    pub serial: String,
    pub mode: Option<VpnMode>,
    pub exported_subnets: Vec<String>,
    pub meraki_peers: Vec<PeerStatus>,
    pub third_party_peers: Vec<PeerStatus>,
}

impl VpnPeerRecord {
    pub fn from_status(status: VpnStatus) -> Option<Self> {
        let serial = status.device_serial?;

        let meraki_peers = status
            .meraki_vpn_peers
            .into_iter()
            .map(|peer| {
                let reachability = peer.reachability.unwrap_or_default();
                let name = peer.network_name.unwrap_or_else(|| peer.network_id.clone());
                PeerStatus {
                    reachable: is_reachable(&reachability),
                    labels: vec![
                        ("peer_network_id", peer.network_id),
                        ("peer_network_name", name),
                        ("reachability", reachability),
                    ],
                }
            })
            .collect();

        let third_party_peers = status
            .third_party_vpn_peers
            .into_iter()
            .map(|peer| {
                let reachability = peer.reachability.unwrap_or_default();
                PeerStatus {
                    reachable: is_reachable(&reachability),
                    labels: vec![
                        ("peer_name", peer.name),
                        ("peer_public_ip", peer.public_ip.unwrap_or_default()),
                        ("reachability", reachability),
                    ],
                }
            })
            .collect();

        // Same subnet under two names would be two identical series.
        let mut seen = HashSet::new();
        let exported_subnets = status
            .exported_subnets
            .into_iter()
            .map(|s| s.subnet)
            .filter(|subnet| seen.insert(subnet.clone()))
            .collect();

        Some(Self {
            serial,
            mode: status.vpn_mode.as_deref().and_then(VpnMode::parse),
            exported_subnets,
            meraki_peers,
            third_party_peers,
        })
    }
}

fn is_reachable(reachability: &str) -> bool {
    reachability.eq_ignore_ascii_case("reachable")
}

/// Translate VPN records into samples.
pub fn emit(
    result: &mut CollectorResult,
    topology: &TopologyIndex,
    records: &[VpnPeerRecord],
    policy: PeerAggregation,
) {
    for record in records {
        let Some(labels) = result.labels(topology, Some(record.serial.as_str())) else {
            continue;
        };

        if let Some(mode) = record.mode {
            result.push(MetricSample::device(
                Metric::VpnMode,
                labels,
                flag(mode == VpnMode::Hub),
            ));
        }

        for subnet in &record.exported_subnets {
            result.push(
                MetricSample::device(Metric::VpnExportedSubnets, labels, 1.0)
                    .with_label("subnet", subnet),
            );
        }

        for (metric, peers) in [
            (Metric::VpnMerakiPeers, &record.meraki_peers),
            (Metric::VpnThirdPartyPeers, &record.third_party_peers),
        ] {
            match policy {
                PeerAggregation::PerDevice => {
                    if !peers.is_empty() {
                        let all_reachable = peers.iter().all(|p| p.reachable);
                        result.push(MetricSample::device(metric, labels, flag(all_reachable)));
                    }
                }
                PeerAggregation::PerPeer => {
                    for peer in peers {
                        let mut sample = MetricSample::device(metric, labels, flag(peer.reachable));
                        sample.extra.extend(peer.labels.iter().cloned());
                        result.push(sample);
                    }
                }
            }
        }
    }
}

pub async fn collect(ctx: &CollectContext) -> CollectorResult {
    let mut result = CollectorResult::new(CollectorKind::Vpn);

    let statuses = ctx
        .fetch(ctx.client.get_organization_appliance_vpn_statuses(&ctx.org_id))
        .await;
    let records: Vec<VpnPeerRecord> = result
        .soft("VPN statuses", statuses)
        .unwrap_or_default()
        .into_iter()
        .filter_map(VpnPeerRecord::from_status)
        .collect();

    emit(&mut result, &ctx.topology, &records, ctx.options.vpn_peers);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::test_support::topology;

    fn record() -> VpnPeerRecord {
        let status: VpnStatus = serde_json::from_value(serde_json::json!({
            "deviceSerial": "Q2MX-0001",
            "networkId": "N_1",
            "vpnMode": "hub",
            "exportedSubnets": [
                { "subnet": "10.0.0.0/24", "name": "LAN" },
                { "subnet": "10.0.1.0/24", "name": "Voice" },
                { "subnet": "10.0.2.0/24", "name": "Guest" }
            ],
            "merakiVpnPeers": [
                { "networkId": "N_2", "networkName": "Branch", "reachability": "reachable" },
                { "networkId": "N_3", "reachability": "unreachable" }
            ],
            "thirdPartyVpnPeers": [
                { "name": "AWS", "publicIp": "203.0.113.1", "reachability": "reachable" }
            ]
        }))
        .unwrap();
        VpnPeerRecord::from_status(status).unwrap()
    }

    fn mx_topology() -> TopologyIndex {
        topology(serde_json::json!([
            { "serial": "Q2MX-0001", "name": "MX1", "model": "MX68" }
        ]))
    }

    #[test]
    fn test_record_from_status() {
        let record = record();
        assert_eq!(record.mode, Some(VpnMode::Hub));
        assert_eq!(record.exported_subnets.len(), 3);
        assert!(record.meraki_peers[0].reachable);
        assert!(!record.meraki_peers[1].reachable);
        assert_eq!(
            record.meraki_peers[1].labels[1],
            ("peer_network_name", "N_3".to_string())
        );
    }

    #[test]
    fn test_one_sample_per_exported_subnet() {
        let mut result = CollectorResult::new(CollectorKind::Vpn);
        emit(
            &mut result,
            &mx_topology(),
            &[record()],
            PeerAggregation::PerDevice,
        );

        let subnets: Vec<_> = result
            .samples
            .iter()
            .filter(|s| s.metric == Metric::VpnExportedSubnets)
            .collect();
        assert_eq!(subnets.len(), 3);
        assert!(subnets.iter().all(|s| s.value == 1.0));
        assert_eq!(subnets[0].extra, vec![("subnet", "10.0.0.0/24".to_string())]);
    }

    #[test]
    fn test_duplicate_exported_subnets_collapse() {
        let status: VpnStatus = serde_json::from_value(serde_json::json!({
            "deviceSerial": "Q2MX-0001",
            "vpnMode": "spoke",
            "exportedSubnets": [
                { "subnet": "10.0.1.0/24", "name": "Voice" },
                { "subnet": "10.0.0.0/24", "name": "LAN" },
                { "subnet": "10.0.1.0/24", "name": "Phones" }
            ]
        }))
        .unwrap();
        let record = VpnPeerRecord::from_status(status).unwrap();
        assert_eq!(record.exported_subnets, vec!["10.0.1.0/24", "10.0.0.0/24"]);

        let mut result = CollectorResult::new(CollectorKind::Vpn);
        emit(&mut result, &mx_topology(), &[record], PeerAggregation::PerDevice);

        let subnets: Vec<&str> = result
            .samples
            .iter()
            .filter(|s| s.metric == Metric::VpnExportedSubnets)
            .map(|s| s.extra[0].1.as_str())
            .collect();
        assert_eq!(subnets, vec!["10.0.1.0/24", "10.0.0.0/24"]);
    }

    #[test]
    fn test_per_device_peers() {
        let mut result = CollectorResult::new(CollectorKind::Vpn);
        emit(
            &mut result,
            &mx_topology(),
            &[record()],
            PeerAggregation::PerDevice,
        );

        let value = |metric: Metric| {
            let samples: Vec<_> = result.samples.iter().filter(|s| s.metric == metric).collect();
            assert_eq!(samples.len(), 1);
            assert!(samples[0].extra.is_empty());
            samples[0].value
        };
        assert_eq!(value(Metric::VpnMode), 1.0);
        assert_eq!(value(Metric::VpnMerakiPeers), 0.0);
        assert_eq!(value(Metric::VpnThirdPartyPeers), 1.0);
    }

    #[test]
    fn test_per_peer_samples() {
        let mut result = CollectorResult::new(CollectorKind::Vpn);
        emit(
            &mut result,
            &mx_topology(),
            &[record()],
            PeerAggregation::PerPeer,
        );

        let peers: Vec<_> = result
            .samples
            .iter()
            .filter(|s| s.metric == Metric::VpnMerakiPeers)
            .collect();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].value, 1.0);
        assert_eq!(peers[1].value, 0.0);
        assert_eq!(peers[0].extra[0], ("peer_network_id", "N_2".to_string()));

        let third: Vec<_> = result
            .samples
            .iter()
            .filter(|s| s.metric == Metric::VpnThirdPartyPeers)
            .collect();
        assert_eq!(third[0].extra[1], ("peer_public_ip", "203.0.113.1".to_string()));
    }

    #[test]
    fn test_no_peers_no_samples() {
        let mut record = record();
        record.meraki_peers.clear();
        record.third_party_peers.clear();
        record.mode = None;

        let mut result = CollectorResult::new(CollectorKind::Vpn);
        emit(&mut result, &mx_topology(), &[record], PeerAggregation::PerDevice);

        assert!(
            result
                .samples
                .iter()
                .all(|s| s.metric == Metric::VpnExportedSubnets)
        );
    }
}
