//! Topology Change state machine (17.31).
//!
//! Detects topology changes on forwarding ports, propagates changes
//! heard from neighbours to every other port, and flushes learned
//! addresses when a port stops forwarding or is told the tree changed.

use super::{PortCtx, StateMachine};
use crate::ops::{FlushScope, HwSection};
use crate::types::{secs_to_ticks, Role, TICKS_PER_SEC};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopologyState {
    #[default]
    Begin,
    Inactive,
    Learning,
    Detected,
    Active,
    Acknowledged,
    Propagating,
    NotifiedTc,
    NotifiedTcn,
}

pub struct TopologyChange;

impl TopologyChange {
    /// Flushes the port's learned addresses unless it is an edge port.
    fn flush(ctx: &mut PortCtx<'_>) {
        let i = ctx.i;
        if !ctx.port().oper_edge {
            let _hw = HwSection::new(ctx.hw);
            ctx.hw.flush_fdb(FlushScope::Port(i));
            debug!(port = i, "flushed learned addresses");
        }
        ctx.port_mut().fdb_flush = false;
    }

    /// Time a topology change stays signalled when running STP.
    fn legacy_tc_time(ctx: &PortCtx<'_>) -> u32 {
        let times = ctx.br.root_times;
        secs_to_ticks(times.max_age + times.forward_delay)
    }

    /// Starts `tcWhile` if it is not already running.
    fn new_tc_while(ctx: &mut PortCtx<'_>) {
        let i = ctx.i;
        if ctx.port().timers.tc_while != 0 {
            return;
        }
        let legacy = Self::legacy_tc_time(ctx);
        let p = ctx.port_mut();
        if p.send_rstp {
            p.timers.tc_while = p.hello_time() + TICKS_PER_SEC;
            p.new_info = true;
        } else {
            p.timers.tc_while = legacy;
        }
        if ctx.br.tc_ports == 0 {
            ctx.br.time_since_tc = 0;
            ctx.br.tc_count += 1;
        }
        ctx.br.tc_ports |= 1u64 << i;
    }

    /// Starts `tcDetected` and tells the switch, once per change.
    fn new_tc_detected(ctx: &mut PortCtx<'_>) {
        let i = ctx.i;
        if ctx.port().timers.tc_detected != 0 {
            return;
        }
        let legacy = Self::legacy_tc_time(ctx);
        let p = ctx.port_mut();
        p.timers.tc_detected = if p.send_rstp {
            secs_to_ticks(p.port_times.hello_time + 1)
        } else {
            legacy
        };
        ctx.hw.topology_change_detected(i);
    }

    fn any_notification(ctx: &PortCtx<'_>) -> bool {
        let p = ctx.port();
        p.rcvd_tc || p.rcvd_tcn || p.rcvd_tc_ack || p.tc_prop
    }
}

impl<'a> StateMachine<PortCtx<'a>> for TopologyChange {
    type State = TopologyState;

    const NAME: &'static str = "topology_change";
    const BEGIN: TopologyState = TopologyState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut TopologyState {
        &mut ctx.port_mut().cursors.topology_change
    }

    fn initial(_ctx: &PortCtx<'a>) -> TopologyState {
        TopologyState::Inactive
    }

    fn enter(ctx: &mut PortCtx<'a>, state: TopologyState) {
        match state {
            TopologyState::Begin => {}
            TopologyState::Inactive => {
                ctx.port_mut().fdb_flush = true;
                Self::flush(ctx);
                let p = ctx.port_mut();
                p.timers.tc_detected = 0;
                p.timers.tc_while = 0;
                p.timers.tc_prop_while = 0;
                p.tc_ack = false;
            }
            TopologyState::Learning => {
                let p = ctx.port_mut();
                p.rcvd_tc = false;
                p.rcvd_tcn = false;
                p.rcvd_tc_ack = false;
                p.tc_prop = false;
            }
            TopologyState::Detected => {
                Self::new_tc_while(ctx);
                ctx.set_tc_prop_tree();
                Self::new_tc_detected(ctx);
                ctx.port_mut().new_info = true;
                debug!(port = ctx.i, "topology change detected");
            }
            TopologyState::Acknowledged => {
                let p = ctx.port_mut();
                p.timers.tc_while = 0;
                p.timers.tc_prop_while = 0;
                p.rcvd_tc_ack = false;
            }
            TopologyState::Propagating => {
                Self::new_tc_while(ctx);
                ctx.port_mut().fdb_flush = true;
                Self::flush(ctx);
                ctx.port_mut().tc_prop = false;
            }
            TopologyState::NotifiedTc => {
                let p = ctx.port_mut();
                p.rcvd_tc = false;
                p.rcvd_tcn = false;
                if p.role == Role::Designated {
                    p.tc_ack = true;
                }
                ctx.set_tc_prop_tree();
            }
            TopologyState::NotifiedTcn => Self::new_tc_while(ctx),
            TopologyState::Active => {}
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: TopologyState) -> Option<TopologyState> {
        let p = ctx.port();
        let forwarding_role = p.role.is_forwarding_role();
        match state {
            TopologyState::Begin => None,
            TopologyState::Inactive => {
                (p.learn && !p.fdb_flush).then_some(TopologyState::Learning)
            }
            TopologyState::Learning => {
                if forwarding_role && p.forward && !p.oper_edge {
                    Some(TopologyState::Detected)
                } else if Self::any_notification(ctx) {
                    Some(TopologyState::Learning)
                } else if !forwarding_role && !p.learn && !p.learning {
                    Some(TopologyState::Inactive)
                } else {
                    None
                }
            }
            TopologyState::Detected
            | TopologyState::Acknowledged
            | TopologyState::Propagating
            | TopologyState::NotifiedTc => Some(TopologyState::Active),
            TopologyState::NotifiedTcn => Some(TopologyState::NotifiedTc),
            TopologyState::Active => {
                if !forwarding_role || p.oper_edge {
                    Some(TopologyState::Learning)
                } else if p.rcvd_tc_ack {
                    Some(TopologyState::Acknowledged)
                } else if p.tc_prop && !p.oper_edge {
                    Some(TopologyState::Propagating)
                } else if p.rcvd_tc {
                    Some(TopologyState::NotifiedTc)
                } else if p.rcvd_tcn {
                    Some(TopologyState::NotifiedTcn)
                } else {
                    None
                }
            }
        }
    }
}
