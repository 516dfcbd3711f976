//! Port Role Transitions state machine (17.29).
//!
//! Moves a port into its selected role and runs the proposal/agreement
//! handshake that lets point-to-point links skip the forward delay.
//! Sub-states of each role do their work on entry and fall straight
//! back to the role's main state.

use super::{PortCtx, StateMachine};
use crate::types::{differs_by_second, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleTransState {
    #[default]
    Begin,
    InitPort,
    DisablePort,
    DisabledPort,

    RootPort,
    RootProposed,
    RootAgreed,
    RootSynced,
    Reroot,
    Rerooted,
    RootLearn,
    RootForward,

    DesignatedPort,
    DesignatedPropose,
    DesignatedSynced,
    DesignatedRetired,
    DesignatedDiscard,
    DesignatedLearn,
    DesignatedForward,

    BlockPort,
    AlternatePort,
    AlternateProposed,
    AlternateAgreed,
    BackupPort,
}

pub struct RoleTransitions;

impl RoleTransitions {
    fn root_guards(ctx: &PortCtx<'_>) -> Option<RoleTransState> {
        let p = ctx.port();
        if !p.can_change() {
            return None;
        }
        if p.proposed && !p.agree {
            return Some(RoleTransState::RootProposed);
        }
        if (ctx.all_synced() && !p.agree) || (p.proposed && p.agree) {
            return Some(RoleTransState::RootAgreed);
        }
        if (p.agreed && !p.synced) || (p.sync && p.synced) {
            return Some(RoleTransState::RootSynced);
        }
        if !p.forward && !p.re_root {
            return Some(RoleTransState::Reroot);
        }
        if p.re_root && p.forward {
            return Some(RoleTransState::Rerooted);
        }
        let may_advance = p.timers.fd_while == 0
            || (ctx.re_rooted() && p.timers.rb_while == 0 && ctx.rstp_version());
        if may_advance && !p.learn {
            return Some(RoleTransState::RootLearn);
        }
        if may_advance && p.learn && !p.forward {
            return Some(RoleTransState::RootForward);
        }
        differs_by_second(p.timers.rr_while, p.fwd_delay()).then_some(RoleTransState::RootPort)
    }

    fn designated_guards(ctx: &PortCtx<'_>) -> Option<RoleTransState> {
        let p = ctx.port();
        if !p.can_change() {
            return None;
        }
        if !p.forward && !p.agreed && !p.proposing && !p.oper_edge {
            return Some(RoleTransState::DesignatedPropose);
        }
        if (!p.learning && !p.forwarding && !p.synced)
            || (p.agreed && !p.synced)
            || (p.oper_edge && !p.synced)
            || (p.sync && p.synced)
        {
            return Some(RoleTransState::DesignatedSynced);
        }
        if p.re_root && p.timers.rr_while == 0 {
            return Some(RoleTransState::DesignatedRetired);
        }
        if ((p.sync && !p.synced) || (p.re_root && p.timers.rr_while != 0) || p.disputed)
            && !p.oper_edge
            && (p.learn || p.forward)
        {
            return Some(RoleTransState::DesignatedDiscard);
        }
        let may_advance = (p.timers.fd_while == 0 || p.agreed || p.oper_edge)
            && (p.timers.rr_while == 0 || !p.re_root)
            && !p.sync;
        if may_advance && !p.learn {
            return Some(RoleTransState::DesignatedLearn);
        }
        (may_advance && p.learn && !p.forward).then_some(RoleTransState::DesignatedForward)
    }

    fn alternate_guards(ctx: &PortCtx<'_>) -> Option<RoleTransState> {
        let p = ctx.port();
        if !p.can_change() {
            return None;
        }
        if p.proposed && !p.agree {
            return Some(RoleTransState::AlternateProposed);
        }
        if (ctx.all_synced() && !p.agree) || (p.proposed && p.agree) {
            return Some(RoleTransState::AlternateAgreed);
        }
        if differs_by_second(p.timers.rb_while, 2 * p.hello_time()) && p.role == Role::Backup {
            return Some(RoleTransState::BackupPort);
        }
        (differs_by_second(p.timers.fd_while, p.forward_delay())
            || p.sync
            || p.re_root
            || !p.synced)
            .then_some(RoleTransState::AlternatePort)
    }
}

impl<'a> StateMachine<PortCtx<'a>> for RoleTransitions {
    type State = RoleTransState;

    const NAME: &'static str = "role_transitions";
    const BEGIN: RoleTransState = RoleTransState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut RoleTransState {
        &mut ctx.port_mut().cursors.role_transitions
    }

    fn initial(_ctx: &PortCtx<'a>) -> RoleTransState {
        RoleTransState::InitPort
    }

    fn global(ctx: &mut PortCtx<'a>) -> Option<RoleTransState> {
        let p = ctx.port();
        if !p.can_change() || p.role == p.selected_role {
            return None;
        }
        Some(match p.selected_role {
            Role::Disabled => RoleTransState::DisablePort,
            Role::Root => RoleTransState::RootPort,
            Role::Designated => RoleTransState::DesignatedPort,
            Role::Alternate | Role::Backup => RoleTransState::BlockPort,
        })
    }

    fn enter(ctx: &mut PortCtx<'a>, state: RoleTransState) {
        use RoleTransState::*;

        match state {
            Begin => {}
            InitPort => {
                let p = ctx.port_mut();
                p.role = Role::Disabled;
                p.learn = false;
                p.forward = false;
                p.synced = false;
                p.sync = true;
                p.re_root = true;
                p.timers.rr_while = p.fwd_delay();
                p.timers.fd_while = p.max_age();
                p.timers.rb_while = 0;
            }
            DisablePort => {
                ctx.change_role(Role::Disabled);
                let p = ctx.port_mut();
                p.learn = false;
                p.forward = false;
                p.new_info = false;
            }
            DisabledPort => {
                let p = ctx.port_mut();
                p.timers.fd_while = p.max_age();
                p.synced = true;
                p.timers.rr_while = 0;
                p.sync = false;
                p.re_root = false;
            }

            RootPort => {
                ctx.change_role(Role::Root);
                let p = ctx.port_mut();
                p.timers.rr_while = p.fwd_delay();
            }
            RootProposed => {
                ctx.set_sync_tree();
                ctx.port_mut().proposed = false;
            }
            RootAgreed => {
                let p = ctx.port_mut();
                p.proposed = false;
                p.sync = false;
                p.agree = true;
                p.new_info = true;
            }
            RootSynced => {
                let p = ctx.port_mut();
                p.synced = true;
                p.sync = false;
            }
            Reroot => ctx.set_re_root_tree(),
            Rerooted => ctx.port_mut().re_root = false,
            RootLearn => {
                let p = ctx.port_mut();
                p.timers.fd_while = p.forward_delay();
                p.learn = true;
            }
            RootForward => {
                let p = ctx.port_mut();
                p.timers.fd_while = 0;
                p.forward = true;
            }

            DesignatedPort => ctx.change_role(Role::Designated),
            DesignatedPropose => {
                let migrate_time = ctx.br.migrate_time;
                let p = ctx.port_mut();
                p.proposing = true;
                p.timers.edge_delay_while = p.edge_delay(migrate_time);
                p.new_info = true;
            }
            DesignatedSynced => {
                let p = ctx.port_mut();
                p.timers.rr_while = 0;
                p.synced = true;
                p.sync = false;
            }
            DesignatedRetired => ctx.port_mut().re_root = false,
            DesignatedDiscard => {
                let p = ctx.port_mut();
                p.learn = false;
                p.forward = false;
                p.disputed = false;
                p.timers.fd_while = p.forward_delay();
            }
            DesignatedLearn => {
                let p = ctx.port_mut();
                p.learn = true;
                p.timers.fd_while = p.forward_delay();
            }
            DesignatedForward => {
                let p = ctx.port_mut();
                p.forward = true;
                p.timers.fd_while = 0;
                p.agreed = p.send_rstp;
                p.proposing = false;
            }

            BlockPort => {
                let role = ctx.port().selected_role;
                ctx.change_role(role);
                let p = ctx.port_mut();
                p.learn = false;
                p.forward = false;
            }
            AlternatePort => {
                let p = ctx.port_mut();
                p.timers.fd_while = p.forward_delay();
                p.synced = true;
                p.timers.rr_while = 0;
                p.sync = false;
                p.re_root = false;
            }
            AlternateProposed => {
                ctx.set_sync_tree();
                ctx.port_mut().proposed = false;
            }
            AlternateAgreed => {
                let p = ctx.port_mut();
                p.proposed = false;
                p.agree = true;
                p.new_info = true;
            }
            BackupPort => {
                let p = ctx.port_mut();
                p.timers.rb_while = 2 * p.hello_time();
            }
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: RoleTransState) -> Option<RoleTransState> {
        use RoleTransState::*;

        let p = ctx.port();
        match state {
            Begin => None,
            InitPort => Some(DisablePort),
            DisablePort => (!p.learning && !p.forwarding && p.can_change()).then_some(DisabledPort),
            DisabledPort => ((differs_by_second(p.timers.fd_while, p.max_age())
                || p.sync
                || p.re_root
                || !p.synced)
                && p.can_change())
            .then_some(DisabledPort),

            RootPort => Self::root_guards(ctx),
            RootProposed | RootAgreed | RootSynced | Reroot | Rerooted | RootLearn
            | RootForward => Some(RootPort),

            DesignatedPort => Self::designated_guards(ctx),
            DesignatedPropose | DesignatedSynced | DesignatedRetired | DesignatedDiscard
            | DesignatedLearn | DesignatedForward => Some(DesignatedPort),

            BlockPort => (!p.learning && !p.forwarding && p.can_change()).then_some(AlternatePort),
            AlternatePort => Self::alternate_guards(ctx),
            AlternateProposed | AlternateAgreed | BackupPort => Some(AlternatePort),
        }
    }
}
