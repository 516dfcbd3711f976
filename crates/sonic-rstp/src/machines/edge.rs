//! Bridge Detection state machine (17.25), deciding whether a port is an
//! edge port.

use super::{PortCtx, StateMachine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeState {
    #[default]
    Begin,
    Edge,
    NotEdge,
}

pub struct EdgeDetection;

impl<'a> StateMachine<PortCtx<'a>> for EdgeDetection {
    type State = EdgeState;

    const NAME: &'static str = "edge";
    const BEGIN: EdgeState = EdgeState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut EdgeState {
        &mut ctx.port_mut().cursors.edge
    }

    fn initial(ctx: &PortCtx<'a>) -> EdgeState {
        if ctx.port().admin_edge {
            EdgeState::Edge
        } else {
            EdgeState::NotEdge
        }
    }

    fn enter(ctx: &mut PortCtx<'a>, state: EdgeState) {
        match state {
            EdgeState::Begin => {}
            EdgeState::Edge => ctx.port_mut().oper_edge = true,
            EdgeState::NotEdge => ctx.port_mut().oper_edge = false,
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: EdgeState) -> Option<EdgeState> {
        let p = ctx.port();
        match state {
            EdgeState::Edge => ((!p.port_enabled && !p.admin_edge) || !p.oper_edge)
                .then_some(EdgeState::NotEdge),
            EdgeState::NotEdge => {
                let auto = p.timers.edge_delay_while == 0
                    && p.auto_edge
                    && p.send_rstp
                    && p.proposing;
                ((!p.port_enabled && p.admin_edge) || auto).then_some(EdgeState::Edge)
            }
            EdgeState::Begin => None,
        }
    }
}
