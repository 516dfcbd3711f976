//! The ten RSTP state machines.
//!
//! Every machine follows one pattern: a persisted cursor, an
//! [`enter`](StateMachine::enter) action fired once per entry into a
//! state, and a [`next`](StateMachine::next) guard chain where the first
//! matching guard wins. Some machines also have guards that apply from
//! any state ([`global`](StateMachine::global)); they are checked once,
//! before the current state's own guards. A cursor at `BEGIN` enters the
//! machine's initial state. [`step`] keeps entering states until no
//! guard fires.

mod edge;
mod information;
mod migration;
mod receive;
mod role_selection;
mod role_transitions;
mod state_transition;
mod timers;
mod topology_change;
mod transmit;

pub use edge::{EdgeDetection, EdgeState};
pub use information::{InfoState, PortInformation};
pub use migration::{MigrationState, ProtocolMigration};
pub use receive::{PortReceive, ReceiveState};
pub use role_selection::{PortRoleSelection, RoleSelectionState};
pub use role_transitions::{RoleTransState, RoleTransitions};
pub use state_transition::{PortStateTransition, StateTransState};
pub use timers::{PortTimersMachine, TimersState};
pub use topology_change::{TopologyChange, TopologyState};
pub use transmit::{PortTransmit, TransmitState};

use crate::bridge::BridgeState;
use crate::ops::SwitchOps;
use crate::port::PortState;
use crate::types::Role;
use std::fmt;
use tracing::{info, trace, warn};

/// Entries a single machine may make in one [`step`].
const MAX_SETTLE_STEPS: u32 = 64;

/// Cursor of every per-port machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursors {
    pub timers: TimersState,
    pub receive: ReceiveState,
    pub migration: MigrationState,
    pub edge: EdgeState,
    pub information: InfoState,
    pub role_transitions: RoleTransState,
    pub state_transition: StateTransState,
    pub topology_change: TopologyState,
    pub transmit: TransmitState,
}

/// Where a machine runs, for tracing.
pub(crate) trait MachineCtx {
    fn pass(&self) -> u64;
    fn port_index(&self) -> Option<usize>;
}

pub(crate) trait StateMachine<C: MachineCtx> {
    type State: Copy + PartialEq + fmt::Debug;

    const NAME: &'static str;
    const BEGIN: Self::State;

    fn cursor(ctx: &mut C) -> &mut Self::State;

    fn initial(ctx: &C) -> Self::State;

    fn global(_ctx: &mut C) -> Option<Self::State> {
        None
    }

    fn enter(ctx: &mut C, state: Self::State);

    fn next(ctx: &mut C, state: Self::State) -> Option<Self::State>;
}

/// Runs machine `M` until it settles. Returns the number of transitions.
pub(crate) fn step<C: MachineCtx, M: StateMachine<C>>(ctx: &mut C) -> u32 {
    let mut state = *M::cursor(ctx);
    let mut pending = if state == M::BEGIN {
        Some(M::initial(ctx))
    } else {
        M::global(ctx).or_else(|| M::next(ctx, state))
    };
    let mut transitions = 0;

    while let Some(new_state) = pending {
        trace!(
            pass = ctx.pass(),
            port = ?ctx.port_index(),
            machine = M::NAME,
            from = ?state,
            to = ?new_state,
            "state transition"
        );
        *M::cursor(ctx) = new_state;
        state = new_state;
        M::enter(ctx, state);
        transitions += 1;
        if transitions >= MAX_SETTLE_STEPS {
            warn!(
                port = ?ctx.port_index(),
                machine = M::NAME,
                ?state,
                "state machine did not settle"
            );
            break;
        }
        pending = M::next(ctx, state);
    }
    transitions
}

/// Context of a per-port machine: the bridge, every port, and which
/// port is running.
pub(crate) struct PortCtx<'a> {
    pub br: &'a mut BridgeState,
    pub ports: &'a mut [PortState],
    pub i: usize,
    pub hw: &'a dyn SwitchOps,
}

impl<'a> PortCtx<'a> {
    pub fn new(
        br: &'a mut BridgeState,
        ports: &'a mut [PortState],
        i: usize,
        hw: &'a dyn SwitchOps,
    ) -> Self {
        Self { br, ports, i, hw }
    }

    pub fn port(&self) -> &PortState {
        &self.ports[self.i]
    }

    pub fn port_mut(&mut self) -> &mut PortState {
        &mut self.ports[self.i]
    }

    pub fn rstp_version(&self) -> bool {
        self.br.rstp_version()
    }

    /// Every port other than this one has stopped its recent-root timer.
    pub fn re_rooted(&self) -> bool {
        self.ports
            .iter()
            .enumerate()
            .all(|(j, q)| j == self.i || q.timers.rr_while == 0)
    }

    /// Every port agrees with its selected role and is synced. A
    /// designated port ignores itself; other roles ignore root ports.
    pub fn all_synced(&self) -> bool {
        let me = self.port();
        self.ports.iter().enumerate().all(|(j, q)| {
            if !q.selected || q.role != q.selected_role || q.updt_info {
                return false;
            }
            let skipped = match me.role {
                Role::Designated => j == self.i,
                Role::Disabled => false,
                _ => q.role == Role::Root,
            };
            skipped || q.synced
        })
    }

    pub fn set_sync_tree(&mut self) {
        self.ports.iter_mut().for_each(|q| q.sync = true);
    }

    pub fn set_re_root_tree(&mut self) {
        self.ports.iter_mut().for_each(|q| q.re_root = true);
    }

    /// Asks every other port to propagate a topology change. Under RSTP
    /// this is rate limited by `tcPropWhile`.
    pub fn set_tc_prop_tree(&mut self) {
        let i = self.i;
        let p = &mut self.ports[i];
        if p.send_rstp {
            if p.timers.tc_prop_while != 0 {
                return;
            }
            p.timers.tc_prop_while = p.hello_time() + crate::types::TICKS_PER_SEC;
        }
        for (j, q) in self.ports.iter_mut().enumerate() {
            if j != i {
                q.tc_prop = true;
            }
        }
    }

    /// Changes this port's role, telling the switch when it differs.
    pub fn change_role(&mut self, role: Role) {
        let i = self.i;
        let old = self.ports[i].role;
        if old == role {
            return;
        }
        info!(port = i, from = %old, to = %role, "port role changed");
        self.hw.role_changed(i, old, role);
        self.ports[i].role = role;
    }
}

impl MachineCtx for PortCtx<'_> {
    fn pass(&self) -> u64 {
        self.br.pass
    }

    fn port_index(&self) -> Option<usize> {
        Some(self.i)
    }
}

/// Context of the bridge-wide role selection machine.
pub(crate) struct BridgeCtx<'a> {
    pub br: &'a mut BridgeState,
    pub ports: &'a mut [PortState],
}

impl MachineCtx for BridgeCtx<'_> {
    fn pass(&self) -> u64 {
        self.br.pass
    }

    fn port_index(&self) -> Option<usize> {
        None
    }
}
