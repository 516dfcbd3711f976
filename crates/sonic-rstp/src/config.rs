//! Bridge and port configuration.
//!
//! Values follow the ranges 802.1D-2004 allows. Every setter on
//! [`Bridge`](crate::Bridge) runs the same checks as [`BridgeConfig::validate`].

use crate::error::{RstpError, RstpResult};
use crate::types::{AdminP2p, MacAddress, ProtocolVersion};
use serde::{Deserialize, Serialize};

/// Path cost of a 1 Mb/s link; faster links scale down from it.
pub const PATH_COST_BASE: u32 = 20_000_000;
/// Path cost of a port whose speed is unknown, and the admin maximum.
pub const MAX_PATH_COST: u32 = PATH_COST_BASE * 10;

/// Largest number of ports one bridge may have.
pub const MAX_PORTS: usize = 64;

pub const DEFAULT_BRIDGE_PRIORITY: u16 = 0x8000;
pub const DEFAULT_PORT_PRIORITY: u8 = 0x80;
pub const DEFAULT_HELLO_TIME: u16 = 2;
pub const DEFAULT_MAX_AGE: u16 = 20;
pub const DEFAULT_FORWARD_DELAY: u16 = 15;
pub const DEFAULT_TX_HOLD_COUNT: u32 = 6;
/// Seconds a port waits before changing protocol version or edge status.
pub const MIGRATE_TIME: u16 = 3;

/// Path cost for a link of `speed_mbps`; unknown speed (0) costs the most.
pub fn path_cost(speed_mbps: u32) -> u32 {
    match speed_mbps {
        0 => MAX_PATH_COST,
        s => (PATH_COST_BASE / s).max(1),
    }
}

/// Checks the relationships between bridge timers.
///
/// Used both for administrative changes and for times received in BPDUs.
pub fn check_times(hello_time: u16, max_age: u16, forward_delay: u16) -> RstpResult<()> {
    if !(6..=40).contains(&max_age) {
        return Err(RstpError::invalid_config(
            "max_age",
            format!("{max_age} not between 6 and 40"),
        ));
    }
    if !(4..=30).contains(&forward_delay) {
        return Err(RstpError::invalid_config(
            "forward_delay",
            format!("{forward_delay} not between 4 and 30"),
        ));
    }
    if 2 * (u32::from(forward_delay) - 1) < u32::from(max_age) {
        return Err(RstpError::invalid_config(
            "forward_delay",
            format!("2 * ({forward_delay} - 1) is less than max_age {max_age}"),
        ));
    }
    if u32::from(max_age) < 2 * (u32::from(hello_time) + 1) {
        return Err(RstpError::invalid_config(
            "max_age",
            format!("{max_age} is less than 2 * (hello_time {hello_time} + 1)"),
        ));
    }
    Ok(())
}

pub(crate) fn times_are_valid(hello_time: u16, max_age: u16, forward_delay: u16) -> bool {
    check_times(hello_time, max_age, forward_delay).is_ok()
}

pub fn check_hello_time(hello_time: u16) -> RstpResult<()> {
    if hello_time != DEFAULT_HELLO_TIME {
        return Err(RstpError::invalid_config(
            "hello_time",
            format!("{hello_time} is not supported, hello time is fixed at 2"),
        ));
    }
    Ok(())
}

pub fn check_bridge_priority(priority: u16) -> RstpResult<()> {
    if priority & !0xf000 != 0 {
        return Err(RstpError::invalid_config(
            "bridge priority",
            format!("{priority:#06x} is not a multiple of 4096"),
        ));
    }
    Ok(())
}

pub fn check_port_priority(priority: u8) -> RstpResult<()> {
    if priority & !0xf0 != 0 {
        return Err(RstpError::invalid_config(
            "port priority",
            format!("{priority:#04x} is not a multiple of 16"),
        ));
    }
    Ok(())
}

pub fn check_tx_hold_count(count: u32) -> RstpResult<()> {
    if !(1..=10).contains(&count) {
        return Err(RstpError::invalid_config(
            "tx_hold_count",
            format!("{count} not between 1 and 10"),
        ));
    }
    Ok(())
}

pub fn check_admin_path_cost(cost: u32) -> RstpResult<()> {
    if cost > MAX_PATH_COST {
        return Err(RstpError::invalid_config(
            "admin_path_cost",
            format!("{cost} exceeds {MAX_PATH_COST}"),
        ));
    }
    Ok(())
}

/// Administrative settings of one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Zero-based port index.
    pub index: usize,

    #[serde(default = "default_port_priority")]
    pub priority: u8,

    /// Fixed path cost, 0 to derive it from link speed.
    #[serde(default)]
    pub admin_path_cost: u32,

    #[serde(default)]
    pub admin_edge: bool,

    #[serde(default = "default_auto_edge")]
    pub auto_edge: bool,

    #[serde(default)]
    pub admin_p2p: AdminP2p,

    /// Run the protocol on this port. An excluded port is never
    /// programmed, sends and accepts no BPDUs and counts as a synced
    /// Disabled port.
    #[serde(default = "default_stp_enabled")]
    pub stp_enabled: bool,
}

impl PortConfig {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            priority: default_port_priority(),
            admin_path_cost: 0,
            admin_edge: false,
            auto_edge: default_auto_edge(),
            admin_p2p: AdminP2p::default(),
            stp_enabled: default_stp_enabled(),
        }
    }

    pub fn validate(&self) -> RstpResult<()> {
        check_port_priority(self.priority)?;
        check_admin_path_cost(self.admin_path_cost)
    }
}

/// Bridge-wide settings plus per-port overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge MAC address.
    #[serde(default)]
    pub address: MacAddress,

    #[serde(default = "default_bridge_priority")]
    pub priority: u16,

    #[serde(default = "default_hello_time")]
    pub hello_time: u16,

    #[serde(default = "default_max_age")]
    pub max_age: u16,

    #[serde(default = "default_forward_delay")]
    pub forward_delay: u16,

    #[serde(default = "default_tx_hold_count")]
    pub tx_hold_count: u32,

    #[serde(default)]
    pub force_protocol_version: ProtocolVersion,

    #[serde(default = "default_port_count")]
    pub port_count: usize,

    /// Ports that differ from the defaults.
    #[serde(default, rename = "port")]
    pub ports: Vec<PortConfig>,
}

fn default_bridge_priority() -> u16 {
    DEFAULT_BRIDGE_PRIORITY
}

fn default_hello_time() -> u16 {
    DEFAULT_HELLO_TIME
}

fn default_max_age() -> u16 {
    DEFAULT_MAX_AGE
}

fn default_forward_delay() -> u16 {
    DEFAULT_FORWARD_DELAY
}

fn default_tx_hold_count() -> u32 {
    DEFAULT_TX_HOLD_COUNT
}

fn default_port_count() -> usize {
    4
}

fn default_port_priority() -> u8 {
    DEFAULT_PORT_PRIORITY
}

fn default_auto_edge() -> bool {
    true
}

fn default_stp_enabled() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: MacAddress::ZERO,
            priority: default_bridge_priority(),
            hello_time: default_hello_time(),
            max_age: default_max_age(),
            forward_delay: default_forward_delay(),
            tx_hold_count: default_tx_hold_count(),
            force_protocol_version: ProtocolVersion::default(),
            port_count: default_port_count(),
            ports: Vec::new(),
        }
    }
}

impl BridgeConfig {
    pub fn new(address: MacAddress, port_count: usize) -> Self {
        Self {
            address,
            port_count,
            ..Self::default()
        }
    }

    /// Settings for port `index`, defaults when not listed.
    pub fn port(&self, index: usize) -> PortConfig {
        self.ports
            .iter()
            .find(|p| p.index == index)
            .cloned()
            .unwrap_or_else(|| PortConfig::new(index))
    }

    pub fn validate(&self) -> RstpResult<()> {
        if self.port_count == 0 || self.port_count > MAX_PORTS {
            return Err(RstpError::invalid_config(
                "port_count",
                format!("{} not between 1 and {MAX_PORTS}", self.port_count),
            ));
        }
        check_bridge_priority(self.priority)?;
        check_hello_time(self.hello_time)?;
        check_times(self.hello_time, self.max_age, self.forward_delay)?;
        check_tx_hold_count(self.tx_hold_count)?;
        for port in &self.ports {
            if port.index >= self.port_count {
                return Err(RstpError::invalid_config(
                    "port",
                    format!("index {} beyond port_count {}", port.index, self.port_count),
                ));
            }
            port.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_path_cost() {
        assert_eq!(path_cost(0), 200_000_000);
        assert_eq!(path_cost(10), 2_000_000);
        assert_eq!(path_cost(1000), 20_000);
        assert_eq!(path_cost(100_000_000), 1);
    }

    #[test]
    fn test_check_times() {
        assert!(check_times(2, 20, 15).is_ok());
        assert!(check_times(2, 5, 15).is_err());
        assert!(check_times(2, 41, 30).is_err());
        assert!(check_times(2, 20, 3).is_err());
        assert!(check_times(2, 30, 15).is_err());
        assert!(check_times(2, 6, 4).is_ok());
    }

    #[test]
    fn test_priority_steps() {
        assert!(check_bridge_priority(0x1000).is_ok());
        assert!(check_bridge_priority(0xf000).is_ok());
        assert!(check_bridge_priority(0x8001).is_err());
        assert!(check_port_priority(0xf0).is_ok());
        assert!(check_port_priority(0x81).is_err());
    }

    #[test]
    fn test_tx_hold_and_cost_ranges() {
        assert!(check_tx_hold_count(0).is_err());
        assert!(check_tx_hold_count(10).is_ok());
        assert!(check_tx_hold_count(11).is_err());
        assert!(check_admin_path_cost(MAX_PATH_COST).is_ok());
        assert!(check_admin_path_cost(MAX_PATH_COST + 1).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.priority, 0x8000);
        assert_eq!(config.tx_hold_count, 6);
        assert_eq!(config.port(1), PortConfig::new(1));
    }

    #[test]
    fn test_port_override_beyond_count_rejected() {
        let mut config = BridgeConfig::new(MacAddress::ZERO, 2);
        config.ports.push(PortConfig::new(2));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{
            "address": "02:00:00:00:00:01",
            "priority": 4096,
            "force_protocol_version": 0,
            "port": [{ "index": 1, "admin_edge": true, "admin_p2p": "force_true" }]
        }"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.priority, 0x1000);
        assert_eq!(config.force_protocol_version, ProtocolVersion::Stp);
        assert_eq!(config.max_age, 20);
        let port = config.port(1);
        assert!(port.admin_edge);
        assert!(port.auto_edge);
        assert_eq!(port.admin_p2p, AdminP2p::ForceTrue);
        assert_eq!(port.priority, 0x80);
        assert!(port.stp_enabled);
    }

    #[test]
    fn test_deserialize_excluded_port() {
        let json = r#"{ "port": [{ "index": 3, "stp_enabled": false }] }"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();
        assert!(!config.port(3).stp_enabled);
        assert!(config.port(2).stp_enabled);
    }
}
