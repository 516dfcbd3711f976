//! Port Protocol Migration state machine (17.24).

use super::{PortCtx, StateMachine};
use crate::types::differs_by_second;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationState {
    #[default]
    Begin,
    CheckingRstp,
    SelectingStp,
    Sensing,
}

pub struct ProtocolMigration;

impl<'a> StateMachine<PortCtx<'a>> for ProtocolMigration {
    type State = MigrationState;

    const NAME: &'static str = "migration";
    const BEGIN: MigrationState = MigrationState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut MigrationState {
        &mut ctx.port_mut().cursors.migration
    }

    fn initial(_ctx: &PortCtx<'a>) -> MigrationState {
        MigrationState::CheckingRstp
    }

    fn enter(ctx: &mut PortCtx<'a>, state: MigrationState) {
        let migrate = ctx.br.migrate_time;
        let rstp = ctx.rstp_version();
        let p = ctx.port_mut();
        match state {
            MigrationState::Begin => {}
            MigrationState::CheckingRstp => {
                p.mcheck = false;
                p.send_rstp = rstp;
                p.timers.mdelay_while = migrate;
            }
            MigrationState::SelectingStp => {
                p.send_rstp = false;
                p.timers.mdelay_while = migrate;
            }
            MigrationState::Sensing => {
                p.rcvd_rstp = false;
                p.rcvd_stp = false;
            }
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: MigrationState) -> Option<MigrationState> {
        let migrate = ctx.br.migrate_time;
        let rstp = ctx.rstp_version();
        let p = ctx.port();
        match state {
            MigrationState::CheckingRstp => {
                if p.timers.mdelay_while == 0 {
                    Some(MigrationState::Sensing)
                } else if differs_by_second(p.timers.mdelay_while, migrate) && !p.port_enabled {
                    Some(MigrationState::CheckingRstp)
                } else {
                    None
                }
            }
            MigrationState::SelectingStp => {
                (p.timers.mdelay_while == 0 || !p.port_enabled || p.mcheck)
                    .then_some(MigrationState::Sensing)
            }
            MigrationState::Sensing => {
                if !p.port_enabled || p.mcheck || (rstp && !p.send_rstp && p.rcvd_rstp) {
                    Some(MigrationState::CheckingRstp)
                } else if p.send_rstp && p.rcvd_stp {
                    Some(MigrationState::SelectingStp)
                } else {
                    None
                }
            }
            MigrationState::Begin => None,
        }
    }
}
