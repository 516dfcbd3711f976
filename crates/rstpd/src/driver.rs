//! Switch programming seam of the daemon.

use crate::transport::OutboundFrame;
use sonic_rstp::{FlushScope, ForwardingState, Role, SwitchOps, TransmitError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

/// Hardware programming the spanning tree needs from the platform.
pub trait SwitchDriver: Send + Sync {
    fn set_port_state(&self, port: usize, state: ForwardingState);

    fn flush_fdb(&self, scope: FlushScope);

    fn topology_change(&self, _port: usize) {}

    fn role_changed(&self, _port: usize, _from: Role, _to: Role) {}
}

/// Driver that only logs what it would program.
#[derive(Debug, Default)]
pub struct LoggingDriver;

impl SwitchDriver for LoggingDriver {
    fn set_port_state(&self, port: usize, state: ForwardingState) {
        info!(port, ?state, "set port state");
    }

    fn flush_fdb(&self, scope: FlushScope) {
        debug!(?scope, "flush fdb");
    }

    fn topology_change(&self, port: usize) {
        info!(port, "topology change");
    }
}

/// [`SwitchOps`] handed to the engine: hardware calls go straight to the
/// driver, frames go to the sender task's queue.
pub struct DaemonOps {
    driver: Arc<dyn SwitchDriver>,
    tx: mpsc::Sender<OutboundFrame>,
}

impl DaemonOps {
    pub fn new(driver: Arc<dyn SwitchDriver>, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self { driver, tx }
    }
}

impl SwitchOps for DaemonOps {
    fn set_port_state(&self, port: usize, state: ForwardingState) {
        self.driver.set_port_state(port, state);
    }

    fn flush_fdb(&self, scope: FlushScope) {
        self.driver.flush_fdb(scope);
    }

    fn topology_change_detected(&self, port: usize) {
        self.driver.topology_change(port);
    }

    fn role_changed(&self, port: usize, from: Role, to: Role) {
        self.driver.role_changed(port, from, to);
    }

    fn transmit(&self, port: usize, frame: &[u8]) -> Result<(), TransmitError> {
        let frame = OutboundFrame {
            port,
            frame: frame.to_vec(),
        };
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => TransmitError::Busy { port },
            TrySendError::Closed(_) => TransmitError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<String>>,
    }

    impl SwitchDriver for RecordingDriver {
        fn set_port_state(&self, port: usize, state: ForwardingState) {
            self.calls.lock().push(format!("state {port} {state:?}"));
        }

        fn flush_fdb(&self, scope: FlushScope) {
            self.calls.lock().push(format!("flush {scope:?}"));
        }

        fn role_changed(&self, port: usize, from: Role, to: Role) {
            self.calls.lock().push(format!("role {port} {from} {to}"));
        }
    }

    #[test]
    fn test_hardware_calls_reach_driver() {
        let driver = Arc::new(RecordingDriver::default());
        let (tx, _rx) = mpsc::channel(1);
        let ops = DaemonOps::new(driver.clone(), tx);

        ops.set_port_state(1, ForwardingState::Learning);
        ops.flush_fdb(FlushScope::Port(1));
        ops.topology_change_detected(1);
        assert_eq!(
            *driver.calls.lock(),
            vec!["state 1 Learning", "flush Port(1)"]
        );
    }

    #[test]
    fn test_full_queue_reports_busy() {
        let (tx, mut rx) = mpsc::channel(1);
        let ops = DaemonOps::new(Arc::new(LoggingDriver), tx);

        assert_eq!(ops.transmit(3, &[1, 2, 3]), Ok(()));
        assert_eq!(ops.transmit(3, &[4]), Err(TransmitError::Busy { port: 3 }));

        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.port, 3);
        assert_eq!(queued.frame, vec![1, 2, 3]);
    }

    #[test]
    fn test_closed_queue_reports_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let ops = DaemonOps::new(Arc::new(LoggingDriver), tx);
        assert_eq!(ops.transmit(0, &[0]), Err(TransmitError::Closed));
    }
}
