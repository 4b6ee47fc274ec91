//! Builder for `FirewallEvent` test fixtures.

use chrono::{DateTime, Utc};

use crate::models::FirewallEvent;

/// Builds firewall events with sensible defaults for tests.
#[derive(Debug)]
pub struct EventBuilder {
    event: FirewallEvent,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuilder {
    /// Creates a builder for an inbound TCP DENY event.
    pub fn new() -> Self {
        Self {
            event: FirewallEvent {
                id: 0,
                timestamp: Utc::now(),
                source_ip: "192.168.1.10".to_string(),
                source_port: Some(51234),
                destination_ip: "10.0.0.1".to_string(),
                destination_port: Some(443),
                protocol: "TCP".to_string(),
                action: "DENY".to_string(),
                direction: "INBOUND".to_string(),
                severity: "INFO".to_string(),
                threat_type: None,
                bytes_sent: None,
                bytes_received: None,
                packet_count: None,
                log_source: None,
                description: None,
            },
        }
    }

    /// Sets the event id.
    pub fn id(mut self, id: i64) -> Self {
        self.event.id = id;
        self
    }

    /// Sets the event timestamp.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    /// Sets the source IP.
    pub fn source_ip(mut self, ip: &str) -> Self {
        self.event.source_ip = ip.to_string();
        self
    }

    /// Sets the destination IP.
    pub fn destination_ip(mut self, ip: &str) -> Self {
        self.event.destination_ip = ip.to_string();
        self
    }

    /// Sets the destination port.
    pub fn destination_port(mut self, port: u16) -> Self {
        self.event.destination_port = Some(port);
        self
    }

    /// Sets the protocol.
    pub fn protocol(mut self, protocol: &str) -> Self {
        self.event.protocol = protocol.to_string();
        self
    }

    /// Sets the firewall action.
    pub fn action(mut self, action: &str) -> Self {
        self.event.action = action.to_string();
        self
    }

    /// Sets the traffic direction.
    pub fn direction(mut self, direction: &str) -> Self {
        self.event.direction = direction.to_string();
        self
    }

    /// Sets the severity.
    pub fn severity(mut self, severity: &str) -> Self {
        self.event.severity = severity.to_string();
        self
    }

    /// Sets the threat type.
    pub fn threat_type(mut self, threat_type: &str) -> Self {
        self.event.threat_type = Some(threat_type.to_string());
        self
    }

    /// Sets the reporting device identifier.
    pub fn log_source(mut self, log_source: &str) -> Self {
        self.event.log_source = Some(log_source.to_string());
        self
    }

    /// Finalizes the event.
    pub fn build(self) -> FirewallEvent {
        self.event
    }
}
