//! Per-port protocol state.

use crate::bpdu::ParsedBpdu;
use crate::config::{path_cost, PortConfig};
use crate::machines::Cursors;
use crate::priority::{is_better_or_same, PriorityVector};
use crate::types::{
    secs_to_ticks, AdminP2p, ForwardingState, InfoType, LinkStatus, PortId, RcvdInfo, Role,
    TimeParams,
};

/// The ten protocol timers of a port, counted in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortTimers {
    pub edge_delay_while: u32,
    pub fd_while: u32,
    pub hello_when: u32,
    pub mdelay_while: u32,
    pub rb_while: u32,
    pub rcvd_info_while: u32,
    pub rr_while: u32,
    pub tc_while: u32,
    pub tc_detected: u32,
    pub tc_prop_while: u32,
}

impl PortTimers {
    /// Counts every running timer down by one tick.
    pub(crate) fn decrement(&mut self) {
        for timer in [
            &mut self.edge_delay_while,
            &mut self.fd_while,
            &mut self.hello_when,
            &mut self.mdelay_while,
            &mut self.rb_while,
            &mut self.rcvd_info_while,
            &mut self.rr_while,
            &mut self.tc_while,
            &mut self.tc_detected,
            &mut self.tc_prop_while,
        ] {
            *timer = timer.saturating_sub(1);
        }
    }
}

/// State of one bridge port.
///
/// Field names follow the variables of 802.1D-2004 clause 17.19.
#[derive(Debug, Clone)]
pub struct PortState {
    pub index: usize,
    pub port_id: PortId,
    /// Cleared for ports left out of the protocol.
    pub stp_enabled: bool,

    // Administrative and operational link parameters.
    pub admin_edge: bool,
    pub auto_edge: bool,
    pub admin_path_cost: u32,
    pub admin_p2p: AdminP2p,
    pub oper_p2p: bool,
    pub path_cost: u32,
    pub speed_mbps: u32,
    pub full_duplex: bool,

    pub agree: bool,
    pub agreed: bool,
    pub disputed: bool,
    pub fdb_flush: bool,
    pub forward: bool,
    pub forwarding: bool,
    pub learn: bool,
    pub learning: bool,
    pub mcheck: bool,
    pub new_info: bool,
    pub oper_edge: bool,
    pub port_enabled: bool,
    pub proposed: bool,
    pub proposing: bool,
    pub rcvd_bpdu: bool,
    pub rcvd_msg: bool,
    pub rcvd_rstp: bool,
    pub rcvd_stp: bool,
    pub rcvd_tc: bool,
    pub rcvd_tc_ack: bool,
    pub rcvd_tcn: bool,
    pub re_root: bool,
    pub reselect: bool,
    pub selected: bool,
    pub send_rstp: bool,
    pub sync: bool,
    pub synced: bool,
    pub tc_ack: bool,
    pub tc_prop: bool,
    pub updt_info: bool,
    pub tick: bool,

    pub info_is: InfoType,
    pub rcvd_info: RcvdInfo,
    pub role: Role,
    pub selected_role: Role,

    pub timers: PortTimers,
    pub tx_count: u32,
    /// Ticks since `tx_count` last decayed.
    pub(crate) second_ticks: u32,

    pub port_priority: PriorityVector,
    pub port_times: TimeParams,
    pub designated_priority: PriorityVector,
    pub designated_times: TimeParams,
    pub msg_priority: PriorityVector,
    pub msg_times: TimeParams,

    /// Last BPDU accepted on this port.
    pub last_bpdu: Option<ParsedBpdu>,

    pub cursors: Cursors,
}

impl PortState {
    pub fn new(config: &PortConfig) -> Self {
        let mut port = Self {
            index: config.index,
            port_id: PortId::new(config.priority, (config.index + 1) as u8),
            stp_enabled: config.stp_enabled,
            admin_edge: config.admin_edge,
            auto_edge: config.auto_edge,
            admin_path_cost: config.admin_path_cost,
            admin_p2p: config.admin_p2p,
            oper_p2p: false,
            path_cost: match config.admin_path_cost {
                0 => path_cost(0),
                admin => admin,
            },
            speed_mbps: 0,
            full_duplex: false,
            agree: false,
            agreed: false,
            disputed: false,
            fdb_flush: false,
            forward: false,
            forwarding: false,
            learn: false,
            learning: false,
            mcheck: false,
            new_info: false,
            oper_edge: false,
            port_enabled: false,
            proposed: false,
            proposing: false,
            rcvd_bpdu: false,
            rcvd_msg: false,
            rcvd_rstp: false,
            rcvd_stp: false,
            rcvd_tc: false,
            rcvd_tc_ack: false,
            rcvd_tcn: false,
            re_root: false,
            reselect: false,
            selected: false,
            send_rstp: false,
            sync: false,
            synced: !config.stp_enabled,
            tc_ack: false,
            tc_prop: false,
            updt_info: false,
            tick: false,
            info_is: InfoType::Disabled,
            rcvd_info: RcvdInfo::Other,
            role: Role::Disabled,
            selected_role: Role::Disabled,
            timers: PortTimers::default(),
            tx_count: 0,
            second_ticks: 0,
            port_priority: PriorityVector::default(),
            port_times: TimeParams::default(),
            designated_priority: PriorityVector::default(),
            designated_times: TimeParams::default(),
            msg_priority: PriorityVector::default(),
            msg_times: TimeParams::default(),
            last_bpdu: None,
            cursors: Cursors::default(),
        };
        port.update_p2p();
        port
    }

    /// Puts every machine back to BEGIN.
    pub(crate) fn reset_machines(&mut self) {
        self.cursors = Cursors::default();
        self.timers = PortTimers::default();
        self.second_ticks = 0;
        self.selected = false;
    }

    /// Forgets every BPDU the port has seen.
    pub(crate) fn clear_received(&mut self) {
        self.rcvd_bpdu = false;
        self.rcvd_msg = false;
        self.rcvd_rstp = false;
        self.rcvd_stp = false;
        self.rcvd_tc = false;
        self.rcvd_tc_ack = false;
        self.rcvd_tcn = false;
        self.rcvd_info = RcvdInfo::Other;
        self.last_bpdu = None;
    }

    /// FwdDelay of the designated times, in ticks.
    pub fn fwd_delay(&self) -> u32 {
        secs_to_ticks(self.designated_times.forward_delay)
    }

    pub fn hello_time(&self) -> u32 {
        secs_to_ticks(self.designated_times.hello_time)
    }

    pub fn max_age(&self) -> u32 {
        secs_to_ticks(self.designated_times.max_age)
    }

    /// Delay between discarding, learning and forwarding.
    pub fn forward_delay(&self) -> u32 {
        if self.send_rstp {
            self.hello_time()
        } else {
            self.fwd_delay()
        }
    }

    /// Time a designated port waits for a BPDU before becoming an edge.
    pub fn edge_delay(&self, migrate_time: u32) -> u32 {
        if self.oper_p2p {
            migrate_time
        } else {
            self.max_age()
        }
    }

    pub fn can_change(&self) -> bool {
        self.selected && !self.updt_info
    }

    pub fn can_send(&self, tx_hold_count: u32) -> bool {
        self.new_info && self.tx_count < tx_hold_count && self.timers.hello_when != 0
    }

    /// Whether the stored information of kind `new_info_is` is at least
    /// as good as the port's current priority.
    pub(crate) fn better_or_same_info(&self, new_info_is: InfoType) -> bool {
        match (new_info_is, self.info_is) {
            (InfoType::Received, InfoType::Received) => {
                is_better_or_same(&self.msg_priority, &self.port_priority)
            }
            (InfoType::Mine, InfoType::Mine) => {
                is_better_or_same(&self.designated_priority, &self.port_priority)
            }
            _ => false,
        }
    }

    /// Recomputes the operational point-to-point flag. Returns whether it
    /// changed.
    pub(crate) fn update_p2p(&mut self) -> bool {
        let p2p = self.admin_p2p.resolve(self.full_duplex);
        let changed = p2p != self.oper_p2p;
        self.oper_p2p = p2p;
        changed
    }

    /// Recomputes the path cost from admin cost or link speed, asking for
    /// role reselection when it changes.
    pub(crate) fn update_path_cost(&mut self) -> bool {
        let cost = match self.admin_path_cost {
            0 => path_cost(self.speed_mbps),
            admin => admin,
        };
        if cost == self.path_cost {
            return false;
        }
        self.path_cost = cost;
        self.reselect = true;
        self.selected = false;
        true
    }

    /// Applies a link report. Returns whether anything changed.
    pub(crate) fn apply_link(&mut self, link: LinkStatus) -> bool {
        let mut changed = false;
        if self.port_enabled != link.up {
            self.port_enabled = link.up;
            changed = true;
        }
        if link.up {
            self.speed_mbps = link.speed_mbps;
            self.full_duplex = link.full_duplex;
            changed |= self.update_path_cost();
            changed |= self.update_p2p();
        }
        changed
    }

    /// Forwarding state as currently programmed by the state transition
    /// machine.
    pub fn forwarding_state(&self) -> ForwardingState {
        if !self.port_enabled {
            ForwardingState::Disabled
        } else if self.forwarding {
            ForwardingState::Forwarding
        } else if self.learning {
            ForwardingState::Learning
        } else {
            ForwardingState::Blocked
        }
    }
}
