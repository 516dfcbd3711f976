//! The running spanning tree: one bridge behind one lock, driven by a
//! periodic tick and by received BPDUs.

use crate::config_file::DaemonConfig;
use crate::driver::{DaemonOps, SwitchDriver};
use crate::error::{Result, RstpdError};
use crate::transport::{spawn_sender, FrameTransport, RetryPolicy};
use parking_lot::Mutex;
use sonic_rstp::{Bridge, BridgeStatus, LinkStatus, PortStatus, TxGate};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Shared {
    bridge: Mutex<Bridge>,
    /// Frames that arrived while the bridge was busy.
    inbox: Mutex<VecDeque<(usize, Vec<u8>)>>,
    rx_ready: Notify,
    gate: TxGate,
    cancel: CancellationToken,
}

/// Spanning tree service of one bridge.
pub struct StpService {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StpService {
    /// Validates `config`, enables the bridge and spawns the tick, receive
    /// and sender tasks. Must be called inside a tokio runtime.
    pub fn start(
        config: &DaemonConfig,
        driver: Arc<dyn SwitchDriver>,
        transport: Arc<dyn FrameTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.daemon.tx_queue_depth);
        let ops = Arc::new(DaemonOps::new(driver, tx));
        let mut bridge = Bridge::new(&config.bridge, ops)?;
        let gate = bridge.tx_gate();
        bridge.enable();
        bridge.run();

        let shared = Arc::new(Shared {
            bridge: Mutex::new(bridge),
            inbox: Mutex::new(VecDeque::new()),
            rx_ready: Notify::new(),
            gate,
            cancel: CancellationToken::new(),
        });

        let policy = RetryPolicy {
            interval: config.tx_retry_interval(),
            attempts: config.daemon.tx_retry_attempts,
        };
        let tasks = vec![
            spawn_sender(rx, transport, policy, shared.cancel.clone()),
            tokio::spawn(tick_task(shared.clone(), config.tick_interval())),
            tokio::spawn(rx_worker(shared.clone())),
        ];

        info!(
            bridge = %config.bridge.address,
            ports = config.bridge.port_count,
            "spanning tree service started"
        );
        Ok(Self {
            shared,
            tasks: Mutex::new(tasks),
        })
    }

    /// Hands a received frame to the bridge.
    ///
    /// When the bridge is busy, or earlier frames are still waiting, the
    /// frame goes to the inbox and transmission is held back until the
    /// receive worker has applied it.
    pub fn handle_frame(&self, port: usize, frame: &[u8]) -> Result<()> {
        if self.shared.cancel.is_cancelled() {
            return Err(RstpdError::ShutDown);
        }
        if let Some(mut bridge) = self.shared.bridge.try_lock() {
            if self.shared.inbox.lock().is_empty() {
                bridge.handle_frame(port, frame)?;
                return Ok(());
            }
        }
        self.shared.gate.hold();
        self.shared.inbox.lock().push_back((port, frame.to_vec()));
        self.shared.rx_ready.notify_one();
        debug!(port, "bridge busy, bpdu deferred");
        Ok(())
    }

    /// Applies a link report and runs the machines.
    pub fn set_link(&self, port: usize, link: LinkStatus) -> Result<bool> {
        let mut bridge = self.shared.bridge.lock();
        let changed = bridge.set_link(port, link)?;
        bridge.run();
        Ok(changed)
    }

    /// Runs `f` against the bridge, then the machines.
    pub fn configure<R>(&self, f: impl FnOnce(&mut Bridge) -> R) -> R {
        let mut bridge = self.shared.bridge.lock();
        let result = f(&mut bridge);
        bridge.run();
        result
    }

    pub fn bridge_status(&self) -> BridgeStatus {
        self.shared.bridge.lock().bridge_status()
    }

    pub fn port_status(&self, port: usize) -> Result<PortStatus> {
        Ok(self.shared.bridge.lock().port_status(port)?)
    }

    pub fn tx_gate(&self) -> TxGate {
        self.shared.gate.clone()
    }

    /// Stops every task, waits for an in-flight run and disables the
    /// bridge.
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "service task failed");
            }
        }
        self.shared.inbox.lock().clear();
        self.shared.bridge.lock().disable();
        info!("spanning tree service stopped");
    }
}

async fn tick_task(shared: Arc<Shared>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = interval.tick() => {
                let mut bridge = shared.bridge.lock();
                bridge.tick();
                bridge.run();
            }
        }
    }
    debug!("tick task stopped");
}

async fn rx_worker(shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = shared.rx_ready.notified() => drain_inbox(&shared),
        }
    }
    debug!("receive worker stopped");
}

/// Moves the inbox into the bridge's receive backlog and processes it.
/// The gate is released before the inbox is taken, so a frame deferred
/// after that point holds it again.
fn drain_inbox(shared: &Shared) {
    let mut bridge = shared.bridge.lock();
    shared.gate.release();
    let frames: Vec<_> = shared.inbox.lock().drain(..).collect();
    for (port, frame) in frames {
        if let Err(e) = bridge.queue_frame(port, &frame) {
            debug!(port, error = %e, "deferred frame rejected");
        }
    }
    let report = bridge.process_rx_backlog();
    if report.tx_suppressed && shared.gate.is_held() {
        shared.rx_ready.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LoggingDriver;
    use crate::transport::LoggingTransport;
    use pretty_assertions::assert_eq;
    use sonic_rstp::{MacAddress, Role};

    fn config() -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.bridge.address = MacAddress::new([0x02, 0, 0, 0, 0, 0x01]);
        config.bridge.port_count = 2;
        config
    }

    fn start() -> StpService {
        StpService::start(&config(), Arc::new(LoggingDriver), Arc::new(LoggingTransport)).unwrap()
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let result = StpService::start(
            &DaemonConfig::default(),
            Arc::new(LoggingDriver),
            Arc::new(LoggingTransport),
        );
        assert!(matches!(result, Err(RstpdError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_up_makes_port_designated() {
        let service = start();
        assert!(service.set_link(0, LinkStatus::up(1000, true)).unwrap());
        assert_eq!(service.port_status(0).unwrap().role, Role::Designated);
        assert!(service.bridge_status().enabled);
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_runs_machines() {
        let service = start();
        service.set_link(0, LinkStatus::up(1000, true)).unwrap();
        let changed = service.configure(|b| b.set_bridge_priority(0x1000)).unwrap();
        assert!(changed);
        assert_eq!(service.bridge_status().bridge_id, "1000.020000000001");
        assert_eq!(service.bridge_status().root_id, "1000.020000000001");
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disables_bridge() {
        let service = start();
        service.shutdown().await;
        assert!(!service.bridge_status().enabled);
        assert!(matches!(
            service.handle_frame(0, &[0u8; 60]),
            Err(RstpdError::ShutDown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_port_is_rejected() {
        let service = start();
        assert!(matches!(
            service.set_link(5, LinkStatus::up(1000, true)),
            Err(RstpdError::Engine(_))
        ));
        service.shutdown().await;
    }
}
