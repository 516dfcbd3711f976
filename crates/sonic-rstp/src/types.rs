//! Identifiers, enumerations and time parameters shared by every part of
//! the engine.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State machine ticks per second.
pub const TICKS_PER_SEC: u32 = 5;

/// Length of one tick in milliseconds.
pub const TICK_MS: u64 = 1000 / TICKS_PER_SEC as u64;

/// Converts whole seconds into ticks.
pub const fn secs_to_ticks(secs: u16) -> u32 {
    secs as u32 * TICKS_PER_SEC
}

/// True when two tick counts are at least one second apart.
///
/// Guards comparing a running timer with its reload value use this so a
/// state is re-entered once per second rather than on every tick.
pub(crate) fn differs_by_second(a: u32, b: u32) -> bool {
    a.abs_diff(b) >= TICKS_PER_SEC
}

/// A 48-bit Ethernet address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Bridge group address all BPDUs are sent to.
    pub const BRIDGE_GROUP: MacAddress = MacAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x00]);

    /// All-zero address.
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Twelve hex digits without separators, as used inside bridge ids.
    pub fn to_compact_string(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn parse_compact(s: &str) -> Option<Self> {
        if s.len() != 12 || !s.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 6];
        for (slot, i) in bytes.iter_mut().zip((0..12).step_by(2)) {
            *slot = u8::from_str_radix(&s[i..i + 2], 16).ok()?;
        }
        Some(MacAddress(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());
        let mut bytes = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for slot in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 2 {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

/// Bridge identifier: priority followed by the bridge MAC address.
///
/// Field order gives the derived ordering the same result as comparing
/// the eight wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct BridgeId {
    pub priority: u16,
    pub address: MacAddress,
}

impl BridgeId {
    pub const fn new(priority: u16, address: MacAddress) -> Self {
        Self { priority, address }
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}.{}", self.priority, self.address.to_compact_string())
    }
}

impl FromStr for BridgeId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidBridgeId(s.to_string());
        let (prio, mac) = s.split_once('.').ok_or_else(invalid)?;
        let priority = u16::from_str_radix(prio, 16).map_err(|_| invalid())?;
        let address = MacAddress::parse_compact(mac).ok_or_else(invalid)?;
        Ok(BridgeId { priority, address })
    }
}

/// Port identifier: priority byte followed by the port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct PortId {
    pub priority: u8,
    pub number: u8,
}

impl PortId {
    pub const fn new(priority: u8, number: u8) -> Self {
        Self { priority, number }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}", self.priority, self.number)
    }
}

/// Port role assigned by role selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Disabled,
    Root,
    Designated,
    Alternate,
    Backup,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Disabled => "disabled",
            Role::Root => "root",
            Role::Designated => "designated",
            Role::Alternate => "alternate",
            Role::Backup => "backup",
        }
    }

    /// Root and Designated ports are the ones allowed to forward.
    pub fn is_forwarding_role(&self) -> bool {
        matches!(self, Role::Root | Role::Designated)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of the information held in a port's priority vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoType {
    #[default]
    Disabled,
    Aged,
    Mine,
    Received,
}

/// Classification of a received BPDU against the port's current vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RcvdInfo {
    SuperiorDesignated,
    RepeatedDesignated,
    InferiorDesignated,
    InferiorRootAlternate,
    #[default]
    Other,
}

/// Timer values carried in BPDUs, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeParams {
    pub message_age: u16,
    pub max_age: u16,
    pub hello_time: u16,
    pub forward_delay: u16,
}

impl TimeParams {
    pub const fn new(message_age: u16, max_age: u16, hello_time: u16, forward_delay: u16) -> Self {
        Self {
            message_age,
            max_age,
            hello_time,
            forward_delay,
        }
    }
}

/// Protocol the bridge is forced to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    /// Legacy 802.1D spanning tree.
    Stp,
    /// Rapid spanning tree.
    #[default]
    Rstp,
}

impl ProtocolVersion {
    pub const fn as_u8(self) -> u8 {
        match self {
            ProtocolVersion::Stp => 0,
            ProtocolVersion::Rstp => 2,
        }
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ProtocolVersion::Stp),
            2 => Ok(ProtocolVersion::Rstp),
            other => Err(ParseError::InvalidValue {
                kind: "protocol version",
                value: other.to_string(),
            }),
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> u8 {
        version.as_u8()
    }
}

/// Administrative point-to-point setting of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminP2p {
    ForceFalse,
    ForceTrue,
    /// Derived from the link's duplex.
    #[default]
    Auto,
}

impl AdminP2p {
    /// Operational point-to-point value for a link with the given duplex.
    pub fn resolve(self, full_duplex: bool) -> bool {
        match self {
            AdminP2p::ForceFalse => false,
            AdminP2p::ForceTrue => true,
            AdminP2p::Auto => full_duplex,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminP2p::ForceFalse => "force_false",
            AdminP2p::ForceTrue => "force_true",
            AdminP2p::Auto => "auto",
        }
    }
}

impl FromStr for AdminP2p {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "force_false" | "false" | "no" => Ok(AdminP2p::ForceFalse),
            "force_true" | "true" | "yes" => Ok(AdminP2p::ForceTrue),
            "auto" => Ok(AdminP2p::Auto),
            _ => Err(ParseError::InvalidValue {
                kind: "point-to-point mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Per-port forwarding state programmed into the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardingState {
    /// Link down or spanning tree not running on the port.
    Disabled,
    /// Discarding: neither learning nor forwarding.
    Blocked,
    Learning,
    Forwarding,
}

/// Observed link attributes reported by the link monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub up: bool,
    /// Speed in Mb/s, 0 when unknown.
    pub speed_mbps: u32,
    pub full_duplex: bool,
}

impl LinkStatus {
    pub const fn up(speed_mbps: u32, full_duplex: bool) -> Self {
        Self {
            up: true,
            speed_mbps,
            full_duplex,
        }
    }

    pub const fn down() -> Self {
        Self {
            up: false,
            speed_mbps: 0,
            full_duplex: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mac_parse_and_display() {
        let mac: MacAddress = "AA-bb-cc-00-11-22".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:00:11:22");
        assert_eq!(mac.to_compact_string(), "aabbcc001122");
        assert!("aa:bb:cc:00:11".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:00:11:22:33".parse::<MacAddress>().is_err());
        assert!("aa:bb:cc:00:11:zz".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_mac_serde_as_string() {
        let mac = MacAddress::new([0x02, 0, 0, 0, 0, 0x01]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"02:00:00:00:00:01\"");
        let back: MacAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }

    #[test]
    fn test_bridge_id_format() {
        let id = BridgeId::new(0x8000, "00:10:a1:02:03:04".parse().unwrap());
        assert_eq!(id.to_string(), "8000.0010a1020304");
        assert_eq!("8000.0010a1020304".parse::<BridgeId>().unwrap(), id);
        assert!("8000-0010a1020304".parse::<BridgeId>().is_err());
    }

    #[test]
    fn test_bridge_id_orders_priority_first() {
        let low_mac = MacAddress::new([0, 0, 0, 0, 0, 1]);
        let high_mac = MacAddress::new([0xff; 6]);
        assert!(BridgeId::new(0x1000, high_mac) < BridgeId::new(0x8000, low_mac));
        assert!(BridgeId::new(0x8000, low_mac) < BridgeId::new(0x8000, high_mac));
    }

    #[test]
    fn test_port_id_display() {
        assert_eq!(PortId::new(0x80, 3).to_string(), "8003");
    }

    #[test]
    fn test_protocol_version_conversion() {
        assert_eq!(ProtocolVersion::try_from(0).unwrap(), ProtocolVersion::Stp);
        assert_eq!(ProtocolVersion::try_from(2).unwrap(), ProtocolVersion::Rstp);
        assert!(ProtocolVersion::try_from(1).is_err());
    }

    #[test]
    fn test_admin_p2p_resolve() {
        assert!(AdminP2p::Auto.resolve(true));
        assert!(!AdminP2p::Auto.resolve(false));
        assert!(AdminP2p::ForceTrue.resolve(false));
        assert!(!AdminP2p::ForceFalse.resolve(true));
        assert_eq!("auto".parse::<AdminP2p>().unwrap(), AdminP2p::Auto);
    }

    #[test]
    fn test_differs_by_second() {
        assert!(!differs_by_second(15, 11));
        assert!(differs_by_second(15, 10));
        assert!(differs_by_second(0, TICKS_PER_SEC));
    }
}
