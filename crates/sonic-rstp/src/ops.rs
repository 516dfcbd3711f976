//! Seam between the protocol engine and the switch it controls.

use crate::error::TransmitError;
use crate::types::{ForwardingState, Role};

/// Which dynamic address table entries to flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushScope {
    Port(usize),
    All,
}

/// Switch operations the engine drives.
///
/// Ports are addressed by their zero-based index in the bridge. All
/// calls are made from inside the bridge's critical section; register
/// accesses are bracketed by [`acquire`](Self::acquire) and
/// [`release`](Self::release).
pub trait SwitchOps: Send + Sync {
    /// Takes exclusive access to the switch registers.
    fn acquire(&self) {}

    /// Gives back exclusive access taken by [`acquire`](Self::acquire).
    fn release(&self) {}

    fn set_port_state(&self, port: usize, state: ForwardingState);

    fn flush_fdb(&self, scope: FlushScope);

    /// A topology change was detected on `port`.
    fn topology_change_detected(&self, _port: usize) {}

    /// `port` changed role. Redundancy protocols sharing the switch hook
    /// in here.
    fn role_changed(&self, _port: usize, _from: Role, _to: Role) {}

    /// Queues a complete frame for transmission on `port`.
    fn transmit(&self, port: usize, frame: &[u8]) -> Result<(), TransmitError>;
}

/// Holds switch access for its lifetime.
pub(crate) struct HwSection<'a> {
    ops: &'a dyn SwitchOps,
}

impl<'a> HwSection<'a> {
    pub(crate) fn new(ops: &'a dyn SwitchOps) -> Self {
        ops.acquire();
        Self { ops }
    }
}

impl Drop for HwSection<'_> {
    fn drop(&mut self) {
        self.ops.release();
    }
}
