//! This module defines the condition matcher: a pure, stateless test of a
//! firewall event against a compiled condition specification.
//!
//! Condition specifications are a closed mapping from a fixed set of event
//! field names to a scalar or set of accepted values. All specified fields
//! must match; unspecified fields are wildcards. Specifications are validated
//! eagerly when a rule is registered, so matching itself cannot fail.

use std::{collections::BTreeMap, net::IpAddr, str::FromStr};

use serde_json::Value;
use thiserror::Error;

use crate::models::FirewallEvent;

/// Errors produced while compiling a condition specification. These are
/// configuration errors surfaced at rule registration, never at match time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    /// The specification is not a JSON object.
    #[error("Condition specification must be a JSON object, got: {0}")]
    NotAnObject(String),

    /// The specification has no keys. An empty specification would match
    /// nothing and is rejected outright.
    #[error("Condition specification must contain at least one field")]
    Empty,

    /// A key does not name a matchable event field.
    #[error("Unknown event field in condition specification: '{0}'")]
    UnknownField(String),

    /// A value is neither a scalar nor an array of scalars.
    #[error("Unsupported value for field '{field}': expected string, number, or array thereof")]
    UnsupportedValue {
        /// The field whose value was rejected.
        field: String,
    },

    /// A field was mapped to an empty set of accepted values.
    #[error("Field '{0}' is mapped to an empty set of accepted values")]
    EmptyValueSet(String),
}

/// The closed set of event fields a condition specification may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventField {
    /// Source IP address.
    SourceIp,
    /// Source port.
    SourcePort,
    /// Destination IP address.
    DestinationIp,
    /// Destination port.
    DestinationPort,
    /// Network protocol.
    Protocol,
    /// Firewall action.
    Action,
    /// Traffic direction.
    Direction,
    /// Event severity.
    Severity,
    /// Classified threat type.
    ThreatType,
    /// Reporting device identifier.
    LogSource,
}

impl FromStr for EventField {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source_ip" => Ok(Self::SourceIp),
            "source_port" => Ok(Self::SourcePort),
            "destination_ip" => Ok(Self::DestinationIp),
            "destination_port" => Ok(Self::DestinationPort),
            "protocol" => Ok(Self::Protocol),
            "action" => Ok(Self::Action),
            "direction" => Ok(Self::Direction),
            "severity" => Ok(Self::Severity),
            "threat_type" => Ok(Self::ThreatType),
            "log_source" => Ok(Self::LogSource),
            other => Err(ConditionError::UnknownField(other.to_string())),
        }
    }
}

impl EventField {
    /// Extracts the normalized value of this field from an event. Returns
    /// `None` when the event does not carry the field (e.g. no threat type),
    /// in which case any condition on the field fails to match.
    fn value_of(&self, event: &FirewallEvent) -> Option<String> {
        match self {
            Self::SourceIp => Some(normalize_ip(&event.source_ip)),
            Self::SourcePort => event.source_port.map(|p| p.to_string()),
            Self::DestinationIp => Some(normalize_ip(&event.destination_ip)),
            Self::DestinationPort => event.destination_port.map(|p| p.to_string()),
            Self::Protocol => Some(normalize_string(&event.protocol)),
            Self::Action => Some(normalize_string(&event.action)),
            Self::Direction => Some(normalize_string(&event.direction)),
            Self::Severity => Some(normalize_string(&event.severity)),
            Self::ThreatType => event.threat_type.as_deref().map(normalize_string),
            Self::LogSource => event.log_source.as_deref().map(normalize_string),
        }
    }

    /// Normalizes an accepted value from a condition specification the same
    /// way the corresponding event field is normalized.
    fn normalize_condition_value(&self, raw: &str) -> String {
        match self {
            Self::SourceIp | Self::DestinationIp => normalize_ip(raw),
            _ => normalize_string(raw),
        }
    }
}

/// Firewall devices vary in casing, so string fields compare
/// case-insensitively.
fn normalize_string(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

/// IP fields are compared as normalized strings: parseable addresses go
/// through the standard library's canonical formatting (collapsing IPv6
/// zero runs and casing), anything else falls back to string normalization.
fn normalize_ip(s: &str) -> String {
    match s.trim().parse::<IpAddr>() {
        Ok(addr) => addr.to_string(),
        Err(_) => normalize_string(s),
    }
}

/// Accepted values for a single field: a scalar or a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueMatcher {
    /// The event field must equal this value.
    Scalar(String),
    /// The event field must be a member of this set.
    OneOf(Vec<String>),
}

impl ValueMatcher {
    fn accepts(&self, candidate: &str) -> bool {
        match self {
            Self::Scalar(expected) => expected == candidate,
            Self::OneOf(expected) => expected.iter().any(|v| v == candidate),
        }
    }
}

/// A compiled, validated condition specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSet {
    fields: BTreeMap<EventField, ValueMatcher>,
}

impl ConditionSet {
    /// Compiles a raw JSON condition specification, validating field names and
    /// value shapes eagerly.
    pub fn parse(spec: &Value) -> Result<Self, ConditionError> {
        let map = spec
            .as_object()
            .ok_or_else(|| ConditionError::NotAnObject(spec.to_string()))?;

        if map.is_empty() {
            return Err(ConditionError::Empty);
        }

        let mut fields = BTreeMap::new();
        for (key, value) in map {
            let field: EventField = key.parse()?;
            let matcher = match value {
                Value::Array(items) => {
                    if items.is_empty() {
                        return Err(ConditionError::EmptyValueSet(key.clone()));
                    }
                    let values = items
                        .iter()
                        .map(|item| scalar_to_string(field, item, key))
                        .collect::<Result<Vec<_>, _>>()?;
                    ValueMatcher::OneOf(values)
                }
                other => ValueMatcher::Scalar(scalar_to_string(field, other, key)?),
            };
            fields.insert(field, matcher);
        }

        Ok(Self { fields })
    }

    /// Tests an event against this specification. All specified fields must
    /// match; unspecified fields are wildcards. Pure and safe for unlimited
    /// concurrent invocation.
    pub fn matches(&self, event: &FirewallEvent) -> bool {
        self.fields.iter().all(|(field, matcher)| {
            field.value_of(event).is_some_and(|value| matcher.accepts(&value))
        })
    }
}

/// Converts a scalar JSON value into its normalized string form for the given
/// field. Numbers are accepted so ports can be written unquoted.
fn scalar_to_string(
    field: EventField,
    value: &Value,
    key: &str,
) -> Result<String, ConditionError> {
    match value {
        Value::String(s) => Ok(field.normalize_condition_value(s)),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ConditionError::UnsupportedValue { field: key.to_string() }),
    }
}
