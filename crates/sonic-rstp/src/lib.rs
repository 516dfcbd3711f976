//! Rapid Spanning Tree Protocol engine (IEEE 802.1D-2004 clause 17).
//!
//! This crate provides the protocol itself, free of any runtime:
//!
//! - [`bpdu`]: Config, RSTP and TCN frame encoding and validation
//! - [`Bridge`]: bridge state, port arena, administration and receive path
//! - [`Bridge::run`]: drives the ten state machines to a fixed point
//! - [`SwitchOps`]: the seam to the switch (port states, address table
//!   flushes, role and topology change events, frame transmission)
//! - [`config`]: serde configuration with the ranges the standard allows
//!
//! # Driving the engine
//!
//! The owner serialises every call, typically behind one mutex:
//!
//! 1. [`Bridge::tick`] every 200 ms, then [`Bridge::run`]
//! 2. [`Bridge::handle_frame`] for every frame addressed to the bridge
//!    group address
//! 3. [`Bridge::set_link`] when a port's link changes, then [`Bridge::run`]
//!
//! ```ignore
//! use sonic_rstp::{Bridge, BridgeConfig, LinkStatus, MacAddress};
//!
//! let config = BridgeConfig::new("02:00:00:00:00:01".parse()?, 4);
//! let mut bridge = Bridge::new(&config, ops)?;
//! bridge.enable();
//! bridge.set_link(0, LinkStatus::up(1000, true))?;
//! bridge.run();
//! ```

pub mod bpdu;
pub mod bridge;
pub mod config;
pub mod error;
pub mod machines;
pub mod ops;
pub mod port;
pub mod priority;
pub mod scheduler;
pub mod status;
pub mod types;

pub use bpdu::{BpduFlags, BpduKind, BpduRole, ParsedBpdu};
pub use bridge::{Bridge, BridgeState, BridgeStats, RX_QUEUE_DEPTH};
pub use config::{BridgeConfig, PortConfig};
pub use error::*;
pub use ops::{FlushScope, SwitchOps};
pub use port::{PortState, PortTimers};
pub use priority::PriorityVector;
pub use scheduler::{RunReport, TxGate};
pub use status::{BridgeStatus, PortStatus};
pub use types::*;
