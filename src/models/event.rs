//! This module defines the `FirewallEvent` structure, a single firewall log
//! record describing one network decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single firewall log record produced by an external event source.
///
/// Events are immutable once ingested. Identity is the storage-assigned
/// sequence `id`; the ordering key is `timestamp`, which may arrive out of
/// strict order across reporting devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallEvent {
    /// Storage-assigned sequence identifier.
    pub id: i64,

    /// Time at which the firewall recorded the decision.
    pub timestamp: DateTime<Utc>,

    /// Source IP address (IPv4 or IPv6).
    pub source_ip: String,

    /// Source port, if applicable for the protocol.
    #[serde(default)]
    pub source_port: Option<u16>,

    /// Destination IP address (IPv4 or IPv6).
    pub destination_ip: String,

    /// Destination port, if applicable for the protocol.
    #[serde(default)]
    pub destination_port: Option<u16>,

    /// Network protocol (e.g. TCP, UDP, ICMP).
    pub protocol: String,

    /// Decision taken by the firewall (ALLOW/DENY/DROP).
    pub action: String,

    /// Traffic direction (INBOUND/OUTBOUND).
    pub direction: String,

    /// Severity assigned by the device (INFO/LOW/MEDIUM/HIGH/CRITICAL).
    pub severity: String,

    /// Classified threat type, if any (e.g. malware, dos, scan).
    #[serde(default)]
    pub threat_type: Option<String>,

    /// Bytes sent over the connection.
    #[serde(default)]
    pub bytes_sent: Option<i64>,

    /// Bytes received over the connection.
    #[serde(default)]
    pub bytes_received: Option<i64>,

    /// Number of packets observed.
    #[serde(default)]
    pub packet_count: Option<i64>,

    /// Identifier of the reporting firewall device.
    #[serde(default)]
    pub log_source: Option<String>,

    /// Free-text description or raw log excerpt.
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserializes_with_optional_fields_absent() {
        let json = r#"{
            "id": 1,
            "timestamp": "2026-08-25T10:00:00Z",
            "source_ip": "192.168.1.10",
            "destination_ip": "10.0.0.1",
            "protocol": "TCP",
            "action": "DENY",
            "direction": "INBOUND",
            "severity": "HIGH"
        }"#;

        let event: FirewallEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, 1);
        assert_eq!(event.source_port, None);
        assert_eq!(event.threat_type, None);
        assert_eq!(event.action, "DENY");
    }
}
