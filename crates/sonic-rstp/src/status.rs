//! Read-only snapshots of protocol state.

use crate::bridge::{Bridge, BridgeStats};
use crate::error::RstpResult;
use crate::types::{AdminP2p, ForwardingState, InfoType, Role};
use serde::Serialize;

/// Bridge-wide protocol state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeStatus {
    pub enabled: bool,
    pub bridge_id: String,
    pub root_id: String,
    pub root_path_cost: u32,
    /// Index of the root port, absent when this bridge is root.
    pub root_port: Option<usize>,
    pub max_age: u16,
    pub hello_time: u16,
    pub forward_delay: u16,
    pub bridge_max_age: u16,
    pub bridge_hello_time: u16,
    pub bridge_forward_delay: u16,
    pub tx_hold_count: u32,
    pub force_protocol_version: u8,
    pub topology_change: bool,
    pub time_since_tc: u64,
    pub tc_count: u64,
    pub stats: BridgeStats,
}

/// Protocol state of one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortStatus {
    pub index: usize,
    pub port_id: String,
    pub enabled: bool,
    pub stp_enabled: bool,
    pub role: Role,
    pub state: ForwardingState,
    pub info_is: InfoType,
    pub path_cost: u32,
    pub admin_path_cost: u32,
    pub admin_edge: bool,
    pub auto_edge: bool,
    pub oper_edge: bool,
    pub admin_p2p: AdminP2p,
    pub oper_p2p: bool,
    pub send_rstp: bool,
    pub designated_root: String,
    pub designated_cost: u32,
    pub designated_bridge: String,
    pub designated_port: String,
    pub topology_change: bool,
    pub tc_detected: bool,
    pub tx_count: u32,
}

impl Bridge {
    pub fn bridge_status(&self) -> BridgeStatus {
        let br = self.state();
        BridgeStatus {
            enabled: br.enabled,
            bridge_id: br.bridge_id.to_string(),
            root_id: br.root_priority.root_id.to_string(),
            root_path_cost: br.root_priority.root_path_cost,
            root_port: br.root_port,
            max_age: br.root_times.max_age,
            hello_time: br.root_times.hello_time,
            forward_delay: br.root_times.forward_delay,
            bridge_max_age: br.bridge_times.max_age,
            bridge_hello_time: br.bridge_times.hello_time,
            bridge_forward_delay: br.bridge_times.forward_delay,
            tx_hold_count: br.tx_hold_count,
            force_protocol_version: br.force_protocol_version.as_u8(),
            topology_change: br.topology_change(),
            time_since_tc: br.time_since_tc,
            tc_count: br.tc_count,
            stats: br.stats,
        }
    }

    /// Snapshot of `port`. The designated fields show what the port
    /// currently believes about its segment.
    pub fn port_status(&self, port: usize) -> RstpResult<PortStatus> {
        let p = self.port(port)?;
        Ok(PortStatus {
            index: p.index,
            port_id: p.port_id.to_string(),
            enabled: p.port_enabled,
            stp_enabled: p.stp_enabled,
            role: p.role,
            state: p.forwarding_state(),
            info_is: p.info_is,
            path_cost: p.path_cost,
            admin_path_cost: p.admin_path_cost,
            admin_edge: p.admin_edge,
            auto_edge: p.auto_edge,
            oper_edge: p.oper_edge,
            admin_p2p: p.admin_p2p,
            oper_p2p: p.oper_p2p,
            send_rstp: p.send_rstp,
            designated_root: p.port_priority.root_id.to_string(),
            designated_cost: p.port_priority.root_path_cost,
            designated_bridge: p.port_priority.bridge_id.to_string(),
            designated_port: p.port_priority.port_id.to_string(),
            topology_change: p.timers.tc_while != 0,
            tc_detected: p.timers.tc_detected != 0,
            tx_count: p.tx_count,
        })
    }
}
