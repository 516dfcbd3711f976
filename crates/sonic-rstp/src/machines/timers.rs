//! Port Timers state machine (17.22).

use super::{PortCtx, StateMachine};
use crate::types::TICKS_PER_SEC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimersState {
    #[default]
    Begin,
    OneSecond,
    Tick,
}

pub struct PortTimersMachine;

impl<'a> StateMachine<PortCtx<'a>> for PortTimersMachine {
    type State = TimersState;

    const NAME: &'static str = "timers";
    const BEGIN: TimersState = TimersState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut TimersState {
        &mut ctx.port_mut().cursors.timers
    }

    fn initial(_ctx: &PortCtx<'a>) -> TimersState {
        TimersState::OneSecond
    }

    fn enter(ctx: &mut PortCtx<'a>, state: TimersState) {
        let i = ctx.i;
        let p = &mut ctx.ports[i];
        match state {
            TimersState::Begin => {}
            TimersState::OneSecond => p.tick = false,
            TimersState::Tick => {
                p.timers.decrement();
                if p.timers.tc_while == 0 {
                    ctx.br.tc_ports &= !(1u64 << i);
                }
                p.second_ticks += 1;
                if p.second_ticks >= TICKS_PER_SEC {
                    p.second_ticks = 0;
                    p.tx_count = p.tx_count.saturating_sub(1);
                }
            }
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: TimersState) -> Option<TimersState> {
        match state {
            TimersState::OneSecond if ctx.port().tick => Some(TimersState::Tick),
            TimersState::Tick => Some(TimersState::OneSecond),
            _ => None,
        }
    }
}
