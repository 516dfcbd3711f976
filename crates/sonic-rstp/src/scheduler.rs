//! Drives the state machines to a fixed point.
//!
//! One pass runs, in order: the receive-side machines of every port
//! (timers, receive, migration, edge, information), role selection for
//! the bridge, the role-side machines of every port (role transitions,
//! state transition, topology change), and finally transmit on every
//! port. Passes repeat until no machine moves. Ports left out of the
//! protocol run no machine at all.

use crate::bridge::Bridge;
use crate::machines::{
    step, BridgeCtx, EdgeDetection, PortCtx, PortInformation, PortReceive, PortRoleSelection,
    PortStateTransition, PortTimersMachine, PortTransmit, ProtocolMigration, RoleTransitions,
    TopologyChange,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Passes one [`Bridge::run`] may make before giving up.
const MAX_PASSES: u32 = 1024;

/// Shared switch that holds back the transmit phase.
///
/// Held by whoever queues BPDUs while a run is in flight, so nothing is
/// sent before those BPDUs have been looked at.
#[derive(Debug, Clone, Default)]
pub struct TxGate(Arc<AtomicBool>);

impl TxGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of one [`Bridge::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub passes: u32,
    pub transitions: u32,
    /// The transmit phase was skipped at least once.
    pub tx_suppressed: bool,
}

impl RunReport {
    pub fn merge(&mut self, other: RunReport) {
        self.passes += other.passes;
        self.transitions += other.transitions;
        self.tx_suppressed |= other.tx_suppressed;
    }
}

impl Bridge {
    /// Runs every state machine until none of them changes state.
    ///
    /// Does nothing while the bridge is disabled. When transmission is
    /// held back the run ends before the first transmit phase.
    pub fn run(&mut self) -> RunReport {
        let mut report = RunReport::default();
        if !self.state.enabled {
            return report;
        }
        self.state.stats.runs += 1;

        loop {
            self.state.pass += 1;
            report.passes += 1;

            let mut transitions = self.run_receive_phase();
            transitions += self.run_role_phase();

            if self.skip_tx || self.tx_gate.is_held() {
                report.transitions += transitions;
                report.tx_suppressed = true;
                self.state.stats.tx_suppressed += 1;
                break;
            }
            transitions += self.run_transmit_phase();
            report.transitions += transitions;

            if transitions == 0 {
                break;
            }
            if report.passes >= MAX_PASSES {
                warn!(
                    passes = report.passes,
                    transitions = report.transitions,
                    "state machines did not settle"
                );
                break;
            }
        }

        self.state.stats.passes += u64::from(report.passes);
        trace!(
            passes = report.passes,
            transitions = report.transitions,
            suppressed = report.tx_suppressed,
            "run complete"
        );
        report
    }

    fn run_receive_phase(&mut self) -> u32 {
        let hw = self.ops.as_ref();
        let br = &mut self.state;
        let ports = self.ports.as_mut_slice();
        let mut transitions = 0;
        for i in 0..ports.len() {
            if !ports[i].stp_enabled {
                continue;
            }
            let mut ctx = PortCtx::new(br, ports, i, hw);
            transitions += step::<_, PortTimersMachine>(&mut ctx);
            transitions += step::<_, PortReceive>(&mut ctx);
            transitions += step::<_, ProtocolMigration>(&mut ctx);
            transitions += step::<_, EdgeDetection>(&mut ctx);
            transitions += step::<_, PortInformation>(&mut ctx);
        }
        transitions
    }

    fn run_role_phase(&mut self) -> u32 {
        let hw = self.ops.as_ref();
        let br = &mut self.state;
        let ports = self.ports.as_mut_slice();

        let mut transitions = step::<_, PortRoleSelection>(&mut BridgeCtx {
            br: &mut *br,
            ports: &mut *ports,
        });
        for i in 0..ports.len() {
            if !ports[i].stp_enabled {
                continue;
            }
            let mut ctx = PortCtx::new(br, ports, i, hw);
            transitions += step::<_, RoleTransitions>(&mut ctx);
            transitions += step::<_, PortStateTransition>(&mut ctx);
            transitions += step::<_, TopologyChange>(&mut ctx);
        }
        transitions
    }

    fn run_transmit_phase(&mut self) -> u32 {
        let hw = self.ops.as_ref();
        let br = &mut self.state;
        let ports = self.ports.as_mut_slice();
        let mut transitions = 0;
        for i in 0..ports.len() {
            if !ports[i].stp_enabled {
                continue;
            }
            transitions += step::<_, PortTransmit>(&mut PortCtx::new(br, ports, i, hw));
        }
        transitions
    }
}
