//! Bridge state and administration.
//!
//! [`Bridge`] owns the per-bridge protocol variables, the port arena and
//! the switch adapter. Administrative setters validate and store the new
//! value, asking for role reselection where the protocol requires it;
//! they never run the state machines themselves. Call
//! [`Bridge::run`] afterwards.

use crate::bpdu::{self, ParsedBpdu};
use crate::config::{
    check_admin_path_cost, check_bridge_priority, check_hello_time, check_port_priority,
    check_times, check_tx_hold_count, BridgeConfig, MIGRATE_TIME,
};
use crate::error::{RstpError, RstpResult};
use crate::machines::RoleSelectionState;
use crate::ops::{FlushScope, HwSection, SwitchOps};
use crate::port::PortState;
use crate::priority::PriorityVector;
use crate::scheduler::{RunReport, TxGate};
use crate::types::{
    secs_to_ticks, AdminP2p, BridgeId, ForwardingState, LinkStatus, MacAddress, PortId,
    ProtocolVersion, TimeParams, TICKS_PER_SEC,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// BPDUs held per port while the previous one is still being processed.
pub const RX_QUEUE_DEPTH: usize = 32;

/// Counters kept by the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Invocations of [`Bridge::run`] on an enabled bridge.
    pub runs: u64,
    pub passes: u64,
    pub bpdus_received: u64,
    pub bpdus_rejected: u64,
    pub bpdus_queued: u64,
    pub bpdus_sent: u64,
    pub tx_failures: u64,
    /// Runs whose transmit phase was skipped.
    pub tx_suppressed: u64,
}

/// Per-bridge protocol variables (802.1D-2004 17.18).
#[derive(Debug, Clone)]
pub struct BridgeState {
    pub bridge_id: BridgeId,
    pub bridge_priority: PriorityVector,
    pub root_priority: PriorityVector,
    pub root_port_id: PortId,
    /// Index of the root port, `None` while this bridge is root.
    pub root_port: Option<usize>,
    pub root_times: TimeParams,
    /// Times this bridge advertises when it is root.
    pub bridge_times: TimeParams,

    /// Seconds since the last topology change started.
    pub time_since_tc: u64,
    pub tc_count: u64,
    /// Ports with `tcWhile` running, one bit per port.
    pub(crate) tc_ports: u64,

    /// In ticks.
    pub migrate_time: u32,
    pub tx_hold_count: u32,
    pub force_protocol_version: ProtocolVersion,

    pub(crate) role_selection: RoleSelectionState,
    pub enabled: bool,
    pub(crate) pass: u64,
    pub stats: BridgeStats,
}

impl BridgeState {
    pub fn new(config: &BridgeConfig) -> Self {
        let bridge_id = BridgeId::new(config.priority, config.address);
        let bridge_priority = PriorityVector::for_bridge(bridge_id);
        let bridge_times =
            TimeParams::new(0, config.max_age, config.hello_time, config.forward_delay);
        Self {
            bridge_id,
            bridge_priority,
            root_priority: bridge_priority,
            root_port_id: PortId::default(),
            root_port: None,
            root_times: bridge_times,
            bridge_times,
            time_since_tc: 0,
            tc_count: 0,
            tc_ports: 0,
            migrate_time: secs_to_ticks(MIGRATE_TIME),
            tx_hold_count: config.tx_hold_count,
            force_protocol_version: config.force_protocol_version,
            role_selection: RoleSelectionState::default(),
            enabled: false,
            pass: 0,
            stats: BridgeStats::default(),
        }
    }

    /// `rstpVersion`: the bridge is not forced down to legacy STP.
    pub fn rstp_version(&self) -> bool {
        self.force_protocol_version == ProtocolVersion::Rstp
    }

    /// Some port has `tcWhile` running.
    pub fn topology_change(&self) -> bool {
        self.tc_ports != 0
    }

    pub fn is_root(&self) -> bool {
        self.root_port.is_none()
    }
}

/// A spanning tree bridge: protocol state plus the switch it drives.
pub struct Bridge {
    pub(crate) state: BridgeState,
    pub(crate) ports: Vec<PortState>,
    rx_queues: Vec<VecDeque<ParsedBpdu>>,
    pub(crate) ops: Arc<dyn SwitchOps>,
    /// Transmission is held back while a receive backlog drains.
    pub(crate) skip_tx: bool,
    pub(crate) tx_gate: TxGate,
    ticks: u64,
}

impl Bridge {
    /// Creates a disabled bridge. Call [`enable`](Self::enable) to start
    /// the protocol.
    pub fn new(config: &BridgeConfig, ops: Arc<dyn SwitchOps>) -> RstpResult<Self> {
        config.validate()?;
        let ports = (0..config.port_count)
            .map(|i| PortState::new(&config.port(i)))
            .collect();
        Ok(Self {
            state: BridgeState::new(config),
            ports,
            rx_queues: vec![VecDeque::new(); config.port_count],
            ops,
            skip_tx: false,
            tx_gate: TxGate::new(),
            ticks: 0,
        })
    }

    /// Starts the protocol: every participating port is programmed
    /// Disabled and every machine restarts from BEGIN.
    pub fn enable(&mut self) {
        if self.state.enabled {
            return;
        }
        {
            let _hw = HwSection::new(self.ops.as_ref());
            for p in self.ports.iter().filter(|p| p.stp_enabled) {
                self.ops.set_port_state(p.index, ForwardingState::Disabled);
            }
        }
        self.state.enabled = true;
        self.state_init();
        info!(
            bridge = %self.state.bridge_id,
            ports = self.ports.len(),
            "spanning tree enabled"
        );
    }

    /// Stops the protocol, leaves every participating port forwarding and
    /// forgets every received BPDU.
    pub fn disable(&mut self) {
        if !self.state.enabled {
            return;
        }
        {
            let _hw = HwSection::new(self.ops.as_ref());
            for p in self.ports.iter().filter(|p| p.stp_enabled) {
                self.ops.set_port_state(p.index, ForwardingState::Forwarding);
            }
            self.ops.flush_fdb(FlushScope::All);
        }
        self.state.enabled = false;
        self.skip_tx = false;
        self.rx_queues.iter_mut().for_each(VecDeque::clear);
        self.ports.iter_mut().for_each(PortState::clear_received);
        info!(bridge = %self.state.bridge_id, "spanning tree disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    /// Puts every machine back to BEGIN, clears every timer and
    /// deselects every port.
    pub fn state_init(&mut self) {
        self.state.role_selection = RoleSelectionState::default();
        self.ports.iter_mut().for_each(PortState::reset_machines);
        debug!(bridge = %self.state.bridge_id, "state machines reset");
    }

    /// Advances protocol time by one 200 ms tick.
    pub fn tick(&mut self) {
        if !self.state.enabled {
            return;
        }
        self.ports
            .iter_mut()
            .filter(|p| p.stp_enabled)
            .for_each(|p| p.tick = true);
        self.ticks += 1;
        if self.ticks % u64::from(TICKS_PER_SEC) == 0 {
            self.state.time_since_tc += 1;
        }
    }

    fn check_port(&self, port: usize) -> RstpResult<()> {
        if port >= self.ports.len() {
            return Err(RstpError::PortNotFound(port));
        }
        Ok(())
    }

    /// Refuses frames the protocol is not listening for, before any
    /// counter or port changes.
    fn check_rx(&self, port: usize) -> RstpResult<()> {
        self.check_port(port)?;
        if !self.state.enabled {
            debug!(port, "spanning tree disabled, bpdu dropped");
            return Err(RstpError::Disabled);
        }
        if !self.ports[port].stp_enabled {
            debug!(port, "port excluded from spanning tree, bpdu dropped");
            return Err(RstpError::PortExcluded(port));
        }
        Ok(())
    }

    fn parse_frame(&mut self, port: usize, frame: &[u8]) -> RstpResult<ParsedBpdu> {
        self.check_rx(port)?;
        bpdu::parse(frame).map_err(|e| {
            self.state.stats.bpdus_rejected += 1;
            debug!(port, len = frame.len(), error = %e, "dropped malformed bpdu");
            RstpError::from(e)
        })
    }

    fn stage(&mut self, port: usize, bpdu: ParsedBpdu) {
        trace!(port, kind = ?bpdu.kind, "bpdu staged");
        self.state.stats.bpdus_received += 1;
        let p = &mut self.ports[port];
        p.last_bpdu = Some(bpdu);
        p.rcvd_bpdu = true;
    }

    /// Validates a received frame and hands it to the port's receive
    /// machine. A rejected frame leaves every port untouched, as does any
    /// frame while the bridge is disabled or on an excluded port.
    pub fn receive_frame(&mut self, port: usize, frame: &[u8]) -> RstpResult<()> {
        let bpdu = self.parse_frame(port, frame)?;
        self.stage(port, bpdu);
        Ok(())
    }

    /// Receives a frame and runs the machines.
    ///
    /// When the port still holds an unconsumed BPDU, or earlier frames
    /// are waiting, the frame is queued behind them and the whole backlog
    /// is processed with transmission held back until it is empty.
    pub fn handle_frame(&mut self, port: usize, frame: &[u8]) -> RstpResult<RunReport> {
        self.check_rx(port)?;
        if self.ports[port].rcvd_bpdu || self.has_rx_backlog() {
            self.queue_frame(port, frame)?;
            return Ok(self.process_rx_backlog());
        }
        self.receive_frame(port, frame)?;
        Ok(self.run())
    }

    /// Validates a frame and appends it to the port's receive backlog.
    /// The oldest frame is dropped when the backlog is full.
    pub fn queue_frame(&mut self, port: usize, frame: &[u8]) -> RstpResult<()> {
        let bpdu = self.parse_frame(port, frame)?;
        let queue = &mut self.rx_queues[port];
        if queue.len() >= RX_QUEUE_DEPTH {
            queue.pop_front();
            warn!(port, "receive backlog full, dropping oldest bpdu");
        }
        queue.push_back(bpdu);
        self.state.stats.bpdus_queued += 1;
        Ok(())
    }

    pub fn has_rx_backlog(&self) -> bool {
        self.rx_queues.iter().any(|q| !q.is_empty())
    }

    /// Stages the next queued BPDU of every port whose previous one has
    /// been consumed. Returns whether any backlog remains in flight.
    pub fn drain_rx_queues(&mut self) -> bool {
        let mut pending = false;
        for port in 0..self.ports.len() {
            if self.ports[port].rcvd_bpdu {
                pending |= !self.rx_queues[port].is_empty();
                continue;
            }
            if let Some(bpdu) = self.rx_queues[port].pop_front() {
                self.stage(port, bpdu);
                pending = true;
            }
        }
        pending
    }

    /// Applies every queued BPDU in arrival order, one per port per run,
    /// with transmission suppressed, then runs once more with
    /// transmission allowed.
    pub fn process_rx_backlog(&mut self) -> RunReport {
        if !self.state.enabled {
            self.rx_queues.iter_mut().for_each(VecDeque::clear);
            return RunReport::default();
        }
        let mut report = RunReport::default();
        let mut rounds = 0;
        while self.drain_rx_queues() {
            self.skip_tx = true;
            report.merge(self.run());
            rounds += 1;
            if rounds >= 2 * RX_QUEUE_DEPTH {
                warn!(rounds, "receive backlog did not drain");
                break;
            }
        }
        self.skip_tx = false;
        report.merge(self.run());
        report
    }

    /// Applies a link report for `port`. Returns whether anything the
    /// protocol looks at changed.
    pub fn set_link(&mut self, port: usize, link: LinkStatus) -> RstpResult<bool> {
        self.check_port(port)?;
        let was_up = self.ports[port].port_enabled;
        let changed = self.ports[port].apply_link(link);
        if was_up != link.up {
            info!(
                port,
                up = link.up,
                speed = link.speed_mbps,
                full_duplex = link.full_duplex,
                "link changed"
            );
            if self.state.enabled && self.ports[port].stp_enabled {
                let state = if link.up {
                    ForwardingState::Blocked
                } else {
                    ForwardingState::Disabled
                };
                let _hw = HwSection::new(self.ops.as_ref());
                self.ops.set_port_state(port, state);
            }
        }
        Ok(changed)
    }

    /// Forces every port through role selection again.
    pub fn reselect_all(&mut self) {
        for p in self.ports.iter_mut() {
            p.reselect = true;
            p.selected = false;
        }
    }

    /// Changes the bridge MAC address. Returns whether it changed.
    pub fn set_address(&mut self, address: MacAddress) -> bool {
        if self.state.bridge_id.address == address {
            return false;
        }
        self.state.bridge_id.address = address;
        self.state.bridge_priority = PriorityVector::for_bridge(self.state.bridge_id);
        self.reselect_all();
        info!(bridge = %self.state.bridge_id, "bridge address changed");
        true
    }

    pub fn set_bridge_priority(&mut self, priority: u16) -> RstpResult<bool> {
        check_bridge_priority(priority)?;
        if self.state.bridge_id.priority == priority {
            return Ok(false);
        }
        self.state.bridge_id.priority = priority;
        self.state.bridge_priority = PriorityVector::for_bridge(self.state.bridge_id);
        self.reselect_all();
        info!(bridge = %self.state.bridge_id, "bridge priority changed");
        Ok(true)
    }

    /// Sets all three bridge times at once; they are checked together.
    pub fn set_times(&mut self, hello_time: u16, max_age: u16, forward_delay: u16) -> RstpResult<bool> {
        check_hello_time(hello_time)?;
        check_times(hello_time, max_age, forward_delay)?;
        let times = TimeParams::new(0, max_age, hello_time, forward_delay);
        if times == self.state.bridge_times {
            return Ok(false);
        }
        self.state.bridge_times = times;
        self.reselect_all();
        info!(hello_time, max_age, forward_delay, "bridge times changed");
        Ok(true)
    }

    pub fn set_forward_delay(&mut self, forward_delay: u16) -> RstpResult<bool> {
        let t = self.state.bridge_times;
        self.set_times(t.hello_time, t.max_age, forward_delay)
    }

    pub fn set_max_age(&mut self, max_age: u16) -> RstpResult<bool> {
        let t = self.state.bridge_times;
        self.set_times(t.hello_time, max_age, t.forward_delay)
    }

    pub fn set_hello_time(&mut self, hello_time: u16) -> RstpResult<bool> {
        let t = self.state.bridge_times;
        self.set_times(hello_time, t.max_age, t.forward_delay)
    }

    /// Changes `TxHoldCount` and restarts every port's transmit budget.
    pub fn set_tx_hold_count(&mut self, count: u32) -> RstpResult<bool> {
        check_tx_hold_count(count)?;
        if self.state.tx_hold_count == count {
            return Ok(false);
        }
        self.state.tx_hold_count = count;
        self.ports.iter_mut().for_each(|p| p.tx_count = 0);
        self.reselect_all();
        Ok(true)
    }

    /// Forces the protocol version. Every machine restarts, even when the
    /// version is unchanged.
    pub fn set_force_protocol_version(&mut self, version: ProtocolVersion) -> bool {
        let changed = self.state.force_protocol_version != version;
        self.state.force_protocol_version = version;
        self.reselect_all();
        if self.state.enabled {
            self.state_init();
        }
        info!(version = version.as_u8(), "protocol version forced");
        changed
    }

    pub fn set_port_priority(&mut self, port: usize, priority: u8) -> RstpResult<bool> {
        self.check_port(port)?;
        check_port_priority(priority)?;
        let p = &mut self.ports[port];
        if p.port_id.priority == priority {
            return Ok(false);
        }
        p.port_id.priority = priority;
        p.reselect = true;
        p.selected = false;
        Ok(true)
    }

    /// Fixes the port's path cost; 0 derives it from link speed again.
    pub fn set_admin_path_cost(&mut self, port: usize, cost: u32) -> RstpResult<bool> {
        self.check_port(port)?;
        check_admin_path_cost(cost)?;
        let p = &mut self.ports[port];
        p.admin_path_cost = cost;
        Ok(p.update_path_cost())
    }

    pub fn set_admin_edge(&mut self, port: usize, edge: bool) -> RstpResult<bool> {
        self.check_port(port)?;
        let p = &mut self.ports[port];
        let changed = p.admin_edge != edge;
        p.admin_edge = edge;
        Ok(changed)
    }

    pub fn set_auto_edge(&mut self, port: usize, auto: bool) -> RstpResult<bool> {
        self.check_port(port)?;
        let p = &mut self.ports[port];
        let changed = p.auto_edge != auto;
        p.auto_edge = auto;
        Ok(changed)
    }

    /// Requests a protocol migration check on the port.
    pub fn set_mcheck(&mut self, port: usize, mcheck: bool) -> RstpResult<bool> {
        self.check_port(port)?;
        let p = &mut self.ports[port];
        let changed = p.mcheck != mcheck;
        p.mcheck = mcheck;
        Ok(changed)
    }

    pub fn set_admin_p2p(&mut self, port: usize, mode: AdminP2p) -> RstpResult<bool> {
        self.check_port(port)?;
        let p = &mut self.ports[port];
        p.admin_p2p = mode;
        Ok(p.update_p2p())
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn ports(&self) -> &[PortState] {
        &self.ports
    }

    pub fn port(&self, port: usize) -> RstpResult<&PortState> {
        self.ports.get(port).ok_or(RstpError::PortNotFound(port))
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.state.stats
    }

    /// Handle to the gate that holds back transmission from outside.
    pub fn tx_gate(&self) -> TxGate {
        self.tx_gate.clone()
    }
}
