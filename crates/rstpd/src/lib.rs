//! rstpd - Rapid Spanning Tree daemon
//!
//! Runs the [`sonic_rstp`] engine for one bridge:
//!
//! - a 200 ms tick task driving the protocol timers
//! - a receive path that applies BPDUs immediately, or defers them with
//!   transmission held back when the bridge is busy
//! - a sender task moving built frames to the [`FrameTransport`] with
//!   bounded retry
//!
//! Hardware programming goes through a [`SwitchDriver`]; link state comes
//! from the platform through [`StpService::set_link`].

pub mod config_file;
pub mod driver;
pub mod error;
pub mod service;
pub mod transport;

pub use config_file::{DaemonConfig, DaemonSection, DEFAULT_CONFIG_PATH};
pub use driver::{DaemonOps, LoggingDriver, SwitchDriver};
pub use error::{Result, RstpdError};
pub use service::StpService;
pub use transport::{
    send_with_retry, spawn_sender, FrameTransport, LoggingTransport, OutboundFrame, RetryPolicy,
    SendError,
};
