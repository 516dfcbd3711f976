//! Port State Transition state machine (17.30).
//!
//! Follows the `learn` and `forward` decisions of role transitions and
//! programs the switch port accordingly.

use super::{PortCtx, StateMachine};
use crate::ops::HwSection;
use crate::types::ForwardingState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateTransState {
    #[default]
    Begin,
    Discarding,
    Learning,
    Forwarding,
}

pub struct PortStateTransition;

impl PortStateTransition {
    fn program(ctx: &PortCtx<'_>, state: ForwardingState) {
        let _hw = HwSection::new(ctx.hw);
        ctx.hw.set_port_state(ctx.i, state);
    }
}

impl<'a> StateMachine<PortCtx<'a>> for PortStateTransition {
    type State = StateTransState;

    const NAME: &'static str = "state_transition";
    const BEGIN: StateTransState = StateTransState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut StateTransState {
        &mut ctx.port_mut().cursors.state_transition
    }

    fn initial(_ctx: &PortCtx<'a>) -> StateTransState {
        StateTransState::Discarding
    }

    fn enter(ctx: &mut PortCtx<'a>, state: StateTransState) {
        match state {
            StateTransState::Begin => {}
            StateTransState::Discarding => {
                if ctx.port().port_enabled {
                    Self::program(ctx, ForwardingState::Blocked);
                }
                let p = ctx.port_mut();
                p.learning = false;
                p.forwarding = false;
            }
            StateTransState::Learning => {
                Self::program(ctx, ForwardingState::Learning);
                ctx.port_mut().learning = true;
            }
            StateTransState::Forwarding => {
                Self::program(ctx, ForwardingState::Forwarding);
                ctx.port_mut().forwarding = true;
            }
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: StateTransState) -> Option<StateTransState> {
        let p = ctx.port();
        match state {
            StateTransState::Discarding => p.learn.then_some(StateTransState::Learning),
            StateTransState::Learning if !p.learn => Some(StateTransState::Discarding),
            StateTransState::Learning => p.forward.then_some(StateTransState::Forwarding),
            StateTransState::Forwarding => (!p.forward).then_some(StateTransState::Discarding),
            StateTransState::Begin => None,
        }
    }
}
