//! Port Transmit state machine (17.26).
//!
//! Sends periodic hellos and any new information, limited to
//! `TxHoldCount` BPDUs per second.

use super::{PortCtx, StateMachine};
use crate::bpdu::{self, BpduFlags, BpduKind, BpduRole};
use crate::types::Role;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransmitState {
    #[default]
    Begin,
    Init,
    Periodic,
    Config,
    Tcn,
    Rstp,
    Idle,
}

pub struct PortTransmit;

impl PortTransmit {
    fn flags(ctx: &PortCtx<'_>, kind: BpduKind) -> BpduFlags {
        let p = ctx.port();
        let mut flags = BpduFlags::empty();
        flags.set(BpduFlags::TOPOLOGY_CHANGE, p.timers.tc_while != 0);
        flags.set(BpduFlags::TOPOLOGY_CHANGE_ACK, p.tc_ack);
        if kind == BpduKind::Rstp {
            flags = flags.with_role(BpduRole::from(p.role));
            flags.set(BpduFlags::AGREEMENT, p.agree);
            flags.set(BpduFlags::PROPOSAL, p.proposing);
            flags.set(BpduFlags::LEARNING, p.learning);
            flags.set(BpduFlags::FORWARDING, p.forwarding);
        }
        flags
    }

    fn send(ctx: &mut PortCtx<'_>, kind: BpduKind) {
        let i = ctx.i;
        let flags = Self::flags(ctx, kind);
        let p = ctx.port();
        let payload = bpdu::build(kind, &p.designated_priority, &p.designated_times, flags);
        let frame = bpdu::build_frame(ctx.br.bridge_id.address, &payload);

        match ctx.hw.transmit(i, &frame) {
            Ok(()) => {
                trace!(port = i, ?kind, flags = flags.bits(), "bpdu sent");
                ctx.br.stats.bpdus_sent += 1;
            }
            Err(e) => {
                warn!(port = i, ?kind, error = %e, "failed to send bpdu");
                ctx.br.stats.tx_failures += 1;
            }
        }
    }
}

impl<'a> StateMachine<PortCtx<'a>> for PortTransmit {
    type State = TransmitState;

    const NAME: &'static str = "transmit";
    const BEGIN: TransmitState = TransmitState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut TransmitState {
        &mut ctx.port_mut().cursors.transmit
    }

    fn initial(_ctx: &PortCtx<'a>) -> TransmitState {
        TransmitState::Init
    }

    fn enter(ctx: &mut PortCtx<'a>, state: TransmitState) {
        match state {
            TransmitState::Begin => {}
            TransmitState::Init => ctx.port_mut().tx_count = 0,
            TransmitState::Periodic => {
                let p = ctx.port_mut();
                p.new_info = p.new_info
                    || p.role == Role::Designated
                    || (p.role == Role::Root && p.timers.tc_while != 0);
            }
            TransmitState::Config => {
                ctx.port_mut().new_info = false;
                Self::send(ctx, BpduKind::Config);
                let p = ctx.port_mut();
                p.tx_count += 1;
                p.tc_ack = false;
            }
            TransmitState::Tcn => {
                ctx.port_mut().new_info = false;
                Self::send(ctx, BpduKind::Tcn);
                ctx.port_mut().tx_count += 1;
            }
            TransmitState::Rstp => {
                ctx.port_mut().new_info = false;
                Self::send(ctx, BpduKind::Rstp);
                let p = ctx.port_mut();
                p.tx_count += 1;
                p.tc_ack = false;
            }
            TransmitState::Idle => {
                let p = ctx.port_mut();
                p.timers.hello_when = p.hello_time();
            }
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: TransmitState) -> Option<TransmitState> {
        let tx_hold = ctx.br.tx_hold_count;
        let p = ctx.port();
        match state {
            TransmitState::Begin => None,
            TransmitState::Init
            | TransmitState::Periodic
            | TransmitState::Config
            | TransmitState::Tcn
            | TransmitState::Rstp => Some(TransmitState::Idle),
            TransmitState::Idle => {
                if !p.can_change() {
                    return None;
                }
                if p.timers.hello_when == 0 {
                    return Some(TransmitState::Periodic);
                }
                if !p.can_send(tx_hold) {
                    return None;
                }
                if p.send_rstp {
                    Some(TransmitState::Rstp)
                } else if p.role == Role::Root {
                    Some(TransmitState::Tcn)
                } else if p.role == Role::Designated {
                    Some(TransmitState::Config)
                } else {
                    None
                }
            }
        }
    }
}
