//! Simulated network of bridges joined by point-to-point links.

#![allow(dead_code)]

use sonic_rstp::bpdu;
use sonic_rstp::{
    Bridge, BridgeConfig, FlushScope, ForwardingState, LinkStatus, MacAddress, ParsedBpdu, Role,
    SwitchOps, TransmitError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Rounds of frame delivery before a network is declared unstable.
const MAX_DELIVERY_ROUNDS: usize = 256;

/// Switch that records what the engine asks of it.
#[derive(Default)]
pub struct CaptureOps {
    pub outbox: Mutex<Vec<(usize, Vec<u8>)>>,
    pub states: Mutex<HashMap<usize, ForwardingState>>,
    pub flushes: Mutex<Vec<FlushScope>>,
    pub tc_events: Mutex<Vec<usize>>,
    pub role_changes: Mutex<Vec<(usize, Role, Role)>>,
}

impl SwitchOps for CaptureOps {
    fn set_port_state(&self, port: usize, state: ForwardingState) {
        self.states.lock().unwrap().insert(port, state);
    }

    fn flush_fdb(&self, scope: FlushScope) {
        self.flushes.lock().unwrap().push(scope);
    }

    fn topology_change_detected(&self, port: usize) {
        self.tc_events.lock().unwrap().push(port);
    }

    fn role_changed(&self, port: usize, from: Role, to: Role) {
        self.role_changes.lock().unwrap().push((port, from, to));
    }

    fn transmit(&self, port: usize, frame: &[u8]) -> Result<(), TransmitError> {
        self.outbox.lock().unwrap().push((port, frame.to_vec()));
        Ok(())
    }
}

pub struct Node {
    pub bridge: Bridge,
    pub ops: Arc<CaptureOps>,
}

/// A BPDU put on the wire.
#[derive(Debug, Clone, Copy)]
pub struct Sent {
    pub node: usize,
    pub port: usize,
    pub tick: u64,
    pub bpdu: ParsedBpdu,
}

#[derive(Default)]
pub struct Network {
    pub nodes: Vec<Node>,
    links: Vec<((usize, usize), (usize, usize))>,
    pub sent: Vec<Sent>,
    pub ticks: u64,
}

pub fn mac(byte: u8) -> MacAddress {
    MacAddress::new([byte; 6])
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an enabled bridge with default settings and no links up.
    pub fn add_bridge(&mut self, address: MacAddress, port_count: usize) -> usize {
        let ops = Arc::new(CaptureOps::default());
        let config = BridgeConfig::new(address, port_count);
        let mut bridge = Bridge::new(&config, ops.clone()).unwrap();
        bridge.enable();
        bridge.run();
        self.nodes.push(Node { bridge, ops });
        self.nodes.len() - 1
    }

    pub fn bridge(&self, node: usize) -> &Bridge {
        &self.nodes[node].bridge
    }

    pub fn bridge_mut(&mut self, node: usize) -> &mut Bridge {
        &mut self.nodes[node].bridge
    }

    pub fn role(&self, node: usize, port: usize) -> Role {
        self.bridge(node).ports()[port].role
    }

    pub fn forwarding_state(&self, node: usize, port: usize) -> ForwardingState {
        self.bridge(node).ports()[port].forwarding_state()
    }

    /// Joins two ports with a full-duplex gigabit link and lets the
    /// bridges react.
    pub fn connect(&mut self, a: (usize, usize), b: (usize, usize)) {
        self.links.push((a, b));
        for (node, port) in [a, b] {
            self.nodes[node]
                .bridge
                .set_link(port, LinkStatus::up(1000, true))
                .unwrap();
        }
        for (node, _) in [a, b] {
            self.nodes[node].bridge.run();
        }
        self.deliver();
    }

    /// Takes the link down on both ends and lets the bridges react.
    pub fn disconnect(&mut self, a: (usize, usize), b: (usize, usize)) {
        self.cut(a, b);
        for (node, port) in [a, b] {
            self.nodes[node]
                .bridge
                .set_link(port, LinkStatus::down())
                .unwrap();
        }
        for (node, _) in [a, b] {
            self.nodes[node].bridge.run();
        }
        self.deliver();
    }

    /// Stops carrying frames between two ports while both keep link.
    pub fn cut(&mut self, a: (usize, usize), b: (usize, usize)) {
        self.links.retain(|&link| link != (a, b) && link != (b, a));
    }

    fn peer(&self, node: usize, port: usize) -> Option<(usize, usize)> {
        self.links.iter().find_map(|&(a, b)| {
            if a == (node, port) {
                Some(b)
            } else if b == (node, port) {
                Some(a)
            } else {
                None
            }
        })
    }

    /// Moves frames across links until every bridge is quiet. Returns the
    /// number of frames delivered.
    pub fn deliver(&mut self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_DELIVERY_ROUNDS {
            let mut in_flight = Vec::new();
            for (node, n) in self.nodes.iter().enumerate() {
                for (port, frame) in n.ops.outbox.lock().unwrap().drain(..) {
                    in_flight.push((node, port, frame));
                }
            }
            if in_flight.is_empty() {
                return delivered;
            }
            for (node, port, frame) in in_flight {
                self.sent.push(Sent {
                    node,
                    port,
                    tick: self.ticks,
                    bpdu: bpdu::parse(&frame).unwrap(),
                });
                if let Some((peer, peer_port)) = self.peer(node, port) {
                    self.nodes[peer]
                        .bridge
                        .handle_frame(peer_port, &frame)
                        .unwrap();
                    delivered += 1;
                }
            }
        }
        panic!("network did not settle after {MAX_DELIVERY_ROUNDS} delivery rounds");
    }

    /// Advances every bridge by one 200 ms tick.
    pub fn tick(&mut self) {
        self.ticks += 1;
        for n in self.nodes.iter_mut() {
            n.bridge.tick();
            n.bridge.run();
        }
        self.deliver();
    }

    pub fn run_ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Ports, over every bridge, in the Alternate or Backup role.
    pub fn blocked_roles(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.bridge.ports())
            .filter(|p| matches!(p.role, Role::Alternate | Role::Backup))
            .count()
    }

    /// Linked ports that are not forwarding.
    pub fn discarding_linked_ports(&self) -> usize {
        self.links
            .iter()
            .flat_map(|&(a, b)| [a, b])
            .filter(|&(node, port)| {
                self.forwarding_state(node, port) != ForwardingState::Forwarding
            })
            .count()
    }
}
