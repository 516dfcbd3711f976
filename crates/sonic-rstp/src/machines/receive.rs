//! Port Receive state machine (17.23).

use super::{PortCtx, StateMachine};
use crate::bpdu::BpduKind;
use crate::types::differs_by_second;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiveState {
    #[default]
    Begin,
    Discard,
    Receive,
}

pub struct PortReceive;

impl PortReceive {
    /// Notes which protocol the peer speaks.
    fn update_bpdu_version(ctx: &mut PortCtx<'_>) {
        let p = ctx.port_mut();
        let Some(bpdu) = p.last_bpdu else {
            return;
        };
        match bpdu.kind {
            BpduKind::Config | BpduKind::Tcn if bpdu.version < 2 => p.rcvd_stp = true,
            BpduKind::Rstp => p.rcvd_rstp = true,
            _ => {}
        }
    }
}

impl<'a> StateMachine<PortCtx<'a>> for PortReceive {
    type State = ReceiveState;

    const NAME: &'static str = "receive";
    const BEGIN: ReceiveState = ReceiveState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut ReceiveState {
        &mut ctx.port_mut().cursors.receive
    }

    fn initial(_ctx: &PortCtx<'a>) -> ReceiveState {
        ReceiveState::Discard
    }

    fn global(ctx: &mut PortCtx<'a>) -> Option<ReceiveState> {
        let migrate = ctx.br.migrate_time;
        let p = ctx.port();
        let stale = p.rcvd_bpdu || differs_by_second(p.timers.edge_delay_while, migrate);
        (stale && !p.port_enabled).then_some(ReceiveState::Discard)
    }

    fn enter(ctx: &mut PortCtx<'a>, state: ReceiveState) {
        let migrate = ctx.br.migrate_time;
        match state {
            ReceiveState::Begin => {}
            ReceiveState::Discard => {
                let p = ctx.port_mut();
                p.rcvd_bpdu = false;
                p.rcvd_rstp = false;
                p.rcvd_stp = false;
                p.rcvd_msg = false;
                p.timers.edge_delay_while = migrate;
            }
            ReceiveState::Receive => {
                Self::update_bpdu_version(ctx);
                let p = ctx.port_mut();
                p.oper_edge = false;
                p.rcvd_bpdu = false;
                p.rcvd_msg = true;
                p.timers.edge_delay_while = migrate;
            }
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: ReceiveState) -> Option<ReceiveState> {
        let p = ctx.port();
        match state {
            ReceiveState::Discard if p.rcvd_bpdu && p.port_enabled => Some(ReceiveState::Receive),
            ReceiveState::Receive if p.rcvd_bpdu && p.port_enabled && !p.rcvd_msg => {
                Some(ReceiveState::Receive)
            }
            _ => None,
        }
    }
}
