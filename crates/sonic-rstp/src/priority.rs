//! Priority vector ordering.
//!
//! A priority vector is compared field by field, root identifier first.
//! Numerically smaller is better.

use crate::types::{BridgeId, PortId};
use serde::Serialize;
use std::cmp::Ordering;

/// (root id, root path cost, designated bridge id, designated port id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct PriorityVector {
    pub root_id: BridgeId,
    pub root_path_cost: u32,
    pub bridge_id: BridgeId,
    pub port_id: PortId,
}

impl PriorityVector {
    /// Vector a bridge advertises while it believes itself to be root.
    pub fn for_bridge(bridge_id: BridgeId) -> Self {
        Self {
            root_id: bridge_id,
            root_path_cost: 0,
            bridge_id,
            port_id: PortId::default(),
        }
    }

    /// Same designated bridge MAC and designated port number, priority
    /// components ignored.
    pub fn same_designated_port(&self, other: &Self) -> bool {
        self.bridge_id.address == other.bridge_id.address
            && self.port_id.number == other.port_id.number
    }
}

pub fn compare(a: &PriorityVector, b: &PriorityVector) -> Ordering {
    a.cmp(b)
}

/// True when a received `msg` must replace the port's current vector.
///
/// Besides a strictly better vector this accepts an identical one and
/// any vector from the same designated bridge and port, even a worse
/// one: the bridge that sent `mine` has changed what it advertises.
pub fn is_superior(msg: &PriorityVector, mine: &PriorityVector) -> bool {
    match msg.cmp(mine) {
        Ordering::Less | Ordering::Equal => true,
        Ordering::Greater => msg.same_designated_port(mine),
    }
}

pub fn is_better_or_same(a: &PriorityVector, b: &PriorityVector) -> bool {
    a <= b
}

/// Candidate path to the root: a port's vector with its path cost added,
/// tie-broken by the id of the port it was received on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RootPath {
    pub priority: PriorityVector,
    pub rx_port: PortId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MacAddress;
    use pretty_assertions::assert_eq;

    fn bid(prio: u16, last: u8) -> BridgeId {
        BridgeId::new(prio, MacAddress::new([0, 0, 0, 0, 0, last]))
    }

    fn vector(root: u8, cost: u32, bridge: u8, port: u8) -> PriorityVector {
        PriorityVector {
            root_id: bid(0x8000, root),
            root_path_cost: cost,
            bridge_id: bid(0x8000, bridge),
            port_id: PortId::new(0x80, port),
        }
    }

    fn sample() -> Vec<PriorityVector> {
        let mut out = Vec::new();
        for root in [1, 2] {
            for cost in [0, 4, 19] {
                for bridge in [1, 3] {
                    for port in [1, 2] {
                        out.push(vector(root, cost, bridge, port));
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_compare_is_strict_total_order() {
        let vs = sample();
        for a in &vs {
            assert_eq!(compare(a, a), Ordering::Equal);
            assert!(is_better_or_same(a, a));
            for b in &vs {
                assert_eq!(compare(a, b), compare(b, a).reverse());
                if a != b {
                    assert_ne!(compare(a, b), Ordering::Equal);
                }
                for c in &vs {
                    if compare(a, b) == Ordering::Less && compare(b, c) == Ordering::Less {
                        assert_eq!(compare(a, c), Ordering::Less);
                    }
                }
            }
        }
    }

    #[test]
    fn test_root_id_dominates_cost() {
        assert!(vector(1, 1000, 9, 9) < vector(2, 0, 1, 1));
        assert!(vector(1, 4, 9, 9) < vector(1, 19, 1, 1));
    }

    #[test]
    fn test_priority_matches_wire_byte_order() {
        let a = PriorityVector {
            root_id: BridgeId::new(0x1000, MacAddress::new([0xff; 6])),
            ..Default::default()
        };
        let b = PriorityVector {
            root_id: BridgeId::new(0x8000, MacAddress::ZERO),
            ..Default::default()
        };
        assert!(a < b);
    }

    #[test]
    fn test_superior_when_better_or_equal() {
        let mine = vector(2, 19, 3, 1);
        assert!(is_superior(&vector(1, 19, 3, 1), &mine));
        assert!(is_superior(&mine, &mine));
        assert!(!is_superior(&vector(2, 19, 4, 1), &mine));
    }

    #[test]
    fn test_superior_from_same_designated_port_even_if_worse() {
        let mine = vector(1, 4, 3, 2);
        let worse_same_origin = vector(1, 38, 3, 2);
        assert!(worse_same_origin > mine);
        assert!(is_superior(&worse_same_origin, &mine));

        let mut repriced = worse_same_origin;
        repriced.port_id.priority = 0x90;
        assert!(is_superior(&repriced, &mine));

        let other_port = vector(1, 38, 3, 3);
        assert!(!is_superior(&other_port, &mine));
    }

    #[test]
    fn test_root_path_tie_break_on_rx_port() {
        let v = vector(1, 19, 3, 1);
        let a = RootPath { priority: v, rx_port: PortId::new(0x80, 1) };
        let b = RootPath { priority: v, rx_port: PortId::new(0x80, 2) };
        assert!(a < b);
    }
}
