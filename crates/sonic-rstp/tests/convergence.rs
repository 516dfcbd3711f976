//! Multi-bridge behaviour over simulated point-to-point links.

mod common;

use common::{mac, CaptureOps, Network};
use pretty_assertions::assert_eq;
use sonic_rstp::bpdu::{self, BpduFlags, BpduKind, BpduRole};
use sonic_rstp::{
    Bridge, BridgeConfig, BridgeId, BpduError, ForwardingState, InfoType, LinkStatus, PortId,
    PriorityVector, ProtocolVersion, Role, RstpError, TimeParams,
};
use std::sync::Arc;

fn two_bridges() -> Network {
    let mut net = Network::new();
    let a = net.add_bridge(mac(0xaa), 2);
    let b = net.add_bridge(mac(0xbb), 2);
    net.connect((a, 0), (b, 0));
    net
}

#[test]
fn test_lower_address_wins_root() {
    let mut net = two_bridges();
    net.run_ticks(50);

    assert!(net.bridge(0).state().is_root());
    assert!(!net.bridge(1).state().is_root());
    assert_eq!(net.role(0, 0), Role::Designated);
    assert_eq!(net.role(1, 0), Role::Root);
    assert_eq!(net.bridge(1).state().root_port, Some(0));
    assert_eq!(
        net.bridge(1).state().root_priority.root_id,
        BridgeId::new(0x8000, mac(0xaa))
    );
    assert_eq!(net.bridge(1).state().root_priority.root_path_cost, 20_000);

    assert_eq!(net.forwarding_state(0, 0), ForwardingState::Forwarding);
    assert_eq!(net.forwarding_state(1, 0), ForwardingState::Forwarding);
    assert!(!net.bridge(0).ports()[0].oper_edge);
}

#[test]
fn test_proposal_agreement_forwards_without_forward_delay() {
    let net = two_bridges();
    // Nothing has ticked yet: only the handshake can have opened the link.
    assert_eq!(net.ticks, 0);
    assert_eq!(net.forwarding_state(0, 0), ForwardingState::Forwarding);
    assert_eq!(net.forwarding_state(1, 0), ForwardingState::Forwarding);

    let agreement = net
        .sent
        .iter()
        .find(|s| s.node == 1 && s.bpdu.flags.contains(BpduFlags::AGREEMENT))
        .expect("root port sent an agreement");
    assert_eq!(agreement.bpdu.kind, BpduKind::Rstp);
    assert_eq!(agreement.bpdu.role, BpduRole::Root);
}

#[test]
fn test_ring_blocks_exactly_one_port() {
    let mut net = Network::new();
    let a = net.add_bridge(mac(0xaa), 2);
    let b = net.add_bridge(mac(0xbb), 2);
    let c = net.add_bridge(mac(0xcc), 2);
    net.connect((a, 0), (b, 0));
    net.connect((b, 1), (c, 0));
    net.connect((c, 1), (a, 1));
    net.run_ticks(100);

    assert!(net.bridge(a).state().is_root());
    assert_eq!(net.role(b, 0), Role::Root);
    assert_eq!(net.role(c, 1), Role::Root);
    // Equal cost on the b-c segment: the lower bridge id designates it.
    assert_eq!(net.role(b, 1), Role::Designated);
    assert_eq!(net.role(c, 0), Role::Alternate);

    assert_eq!(net.blocked_roles(), 1);
    assert_eq!(net.discarding_linked_ports(), 1);
    assert_eq!(net.forwarding_state(c, 0), ForwardingState::Blocked);
}

#[test]
fn test_ring_link_failure_unblocks_alternate() {
    let mut net = Network::new();
    let a = net.add_bridge(mac(0xaa), 2);
    let b = net.add_bridge(mac(0xbb), 2);
    let c = net.add_bridge(mac(0xcc), 2);
    net.connect((a, 0), (b, 0));
    net.connect((b, 1), (c, 0));
    net.connect((c, 1), (a, 1));
    net.run_ticks(100);
    assert_eq!(net.role(c, 0), Role::Alternate);

    net.disconnect((c, 1), (a, 1));
    // Well inside the forward delay: the alternate takes over at once.
    net.run_ticks(2);
    assert_eq!(net.role(c, 1), Role::Disabled);
    assert_eq!(net.role(c, 0), Role::Root);
    assert_eq!(net.forwarding_state(c, 0), ForwardingState::Forwarding);
    assert_eq!(net.bridge(c).state().root_port, Some(0));
    assert_eq!(net.bridge(c).state().root_priority.root_path_cost, 40_000);

    net.run_ticks(30);
    assert!(net.bridge(a).state().is_root());
    assert_eq!(net.role(b, 1), Role::Designated);
    assert_eq!(net.blocked_roles(), 0);
    assert_eq!(net.discarding_linked_ports(), 0);
}

#[test]
fn test_silent_root_ages_out() {
    let mut net = two_bridges();
    net.run_ticks(20);
    assert_eq!(net.role(1, 0), Role::Root);
    let received = net.bridge(1).stats().bpdus_received;

    net.cut((0, 0), (1, 0));
    net.run_ticks(15);
    // Still inside three hello times since the last BPDU.
    assert_eq!(net.role(1, 0), Role::Root);
    assert!(!net.bridge(1).state().is_root());

    net.run_ticks(30);
    let bridge = net.bridge(1);
    assert!(bridge.state().is_root());
    assert_eq!(
        bridge.state().root_priority.root_id,
        BridgeId::new(0x8000, mac(0xbb))
    );
    let port = &bridge.ports()[0];
    assert_eq!(port.role, Role::Designated);
    assert_eq!(port.info_is, InfoType::Mine);
    assert_eq!(bridge.stats().bpdus_received, received);
}

#[test]
fn test_looped_ports_elect_backup() {
    let mut net = Network::new();
    let a = net.add_bridge(mac(0x0a), 1);
    let b = net.add_bridge(mac(0x0b), 3);
    net.connect((a, 0), (b, 0));
    net.connect((b, 1), (b, 2));
    net.run_ticks(100);

    assert!(net.bridge(a).state().is_root());
    assert_eq!(net.role(b, 0), Role::Root);
    // Both ends carry b's own vector; the lower port id designates.
    assert_eq!(net.role(b, 1), Role::Designated);
    assert_eq!(net.role(b, 2), Role::Backup);
    assert_eq!(net.forwarding_state(b, 1), ForwardingState::Forwarding);
    assert_eq!(net.forwarding_state(b, 2), ForwardingState::Blocked);
    assert_eq!(net.blocked_roles(), 1);
    assert_eq!(net.discarding_linked_ports(), 1);
}

#[test]
fn test_converged_network_is_a_fixed_point() {
    let mut net = Network::new();
    let a = net.add_bridge(mac(0x10), 3);
    let b = net.add_bridge(mac(0x20), 3);
    let c = net.add_bridge(mac(0x30), 3);
    net.connect((a, 0), (b, 0));
    net.connect((a, 1), (c, 0));
    net.connect((b, 1), (c, 1));
    net.run_ticks(60);

    for node in [a, b, c] {
        let report = net.bridge_mut(node).run();
        assert_eq!(report.transitions, 0, "bridge {node} still moving");
        assert_eq!(report.passes, 1);
    }
}

#[test]
fn test_better_root_takes_over() {
    let mut net = two_bridges();
    net.run_ticks(20);
    assert!(net.bridge(0).state().is_root());

    net.bridge_mut(1).set_bridge_priority(0x1000).unwrap();
    net.bridge_mut(1).run();
    net.deliver();
    net.run_ticks(50);

    assert!(net.bridge(1).state().is_root());
    assert_eq!(net.role(0, 0), Role::Root);
    assert_eq!(net.role(1, 0), Role::Designated);
    assert_eq!(
        net.bridge(0).state().root_priority.root_id,
        BridgeId::new(0x1000, mac(0xbb))
    );
}

#[test]
fn test_new_forwarding_port_propagates_topology_change() {
    let mut net = Network::new();
    let a = net.add_bridge(mac(0x0a), 3);
    let b = net.add_bridge(mac(0x0b), 1);
    let c = net.add_bridge(mac(0x0c), 1);
    let d = net.add_bridge(mac(0x0d), 1);
    net.connect((a, 0), (b, 0));
    net.connect((a, 1), (c, 0));
    net.run_ticks(50);

    for port in [0, 1] {
        assert_eq!(net.forwarding_state(a, port), ForwardingState::Forwarding);
        assert_eq!(net.bridge(a).ports()[port].timers.tc_while, 0);
    }
    let before = net.sent.len();
    let tc_events = net.nodes[a].ops.tc_events.lock().unwrap().len();

    net.connect((a, 2), (d, 0));
    assert_eq!(net.forwarding_state(a, 2), ForwardingState::Forwarding);
    assert!(net.nodes[a].ops.tc_events.lock().unwrap().len() > tc_events);

    for port in [0, 1] {
        assert!(net.bridge(a).ports()[port].timers.tc_while > 0);
        assert!(
            net.sent[before..].iter().any(|s| s.node == a
                && s.port == port
                && s.bpdu.flags.contains(BpduFlags::TOPOLOGY_CHANGE)),
            "no topology change sent on port {port}"
        );
    }
    assert!(net.bridge(a).state().topology_change());
}

#[test]
fn test_silent_link_becomes_edge() {
    let mut net = Network::new();
    let a = net.add_bridge(mac(0x42), 1);
    net.bridge_mut(a)
        .set_link(0, LinkStatus::up(1000, true))
        .unwrap();
    net.bridge_mut(a).run();
    assert!(!net.bridge(a).ports()[0].oper_edge);

    net.run_ticks(25);
    let port = &net.bridge(a).ports()[0];
    assert!(port.oper_edge);
    assert_eq!(port.role, Role::Designated);
    assert_eq!(port.forwarding_state(), ForwardingState::Forwarding);
}

#[test]
fn test_legacy_neighbour_moves_port_to_stp() {
    let mut net = Network::new();
    let root = net.add_bridge(mac(0x11), 1);
    let rstp = net.add_bridge(mac(0xaa), 1);
    assert!(net
        .bridge_mut(root)
        .set_force_protocol_version(ProtocolVersion::Stp));
    net.connect((root, 0), (rstp, 0));
    net.run_ticks(50);

    assert!(net
        .sent
        .iter()
        .filter(|s| s.node == root)
        .all(|s| s.bpdu.kind != BpduKind::Rstp));
    let port = &net.bridge(rstp).ports()[0];
    assert_eq!(port.role, Role::Root);
    assert!(!port.send_rstp);
}

fn lone_bridge() -> (Bridge, Arc<CaptureOps>) {
    let ops = Arc::new(CaptureOps::default());
    let config = BridgeConfig::new(mac(0x55), 2);
    let mut bridge = Bridge::new(&config, ops.clone()).unwrap();
    bridge.enable();
    bridge.set_link(0, LinkStatus::up(1000, true)).unwrap();
    bridge.run();
    (bridge, ops)
}

fn designated_frame(root_priority: u16) -> Vec<u8> {
    let sender = BridgeId::new(0x8000, mac(0x01));
    let priority = PriorityVector {
        root_id: BridgeId::new(root_priority, mac(0x01)),
        root_path_cost: 0,
        bridge_id: sender,
        port_id: PortId::new(0x80, 1),
    };
    let flags = BpduFlags::empty().with_role(BpduRole::Designated) | BpduFlags::FORWARDING;
    let payload = bpdu::build(BpduKind::Rstp, &priority, &TimeParams::new(0, 20, 2, 15), flags);
    bpdu::build_frame(mac(0x01), &payload)
}

#[test]
fn test_short_payload_is_rejected_untouched() {
    let (mut bridge, _) = lone_bridge();
    let frame = bpdu::build_frame(mac(0x01), &[0x00, 0x00, 0x02]);

    let err = bridge.handle_frame(0, &frame).unwrap_err();
    assert_eq!(
        err,
        RstpError::Bpdu(BpduError::Truncated { len: 3, min: 4 })
    );
    assert!(bridge.ports().iter().all(|p| !p.rcvd_bpdu));
    assert_eq!(bridge.stats().bpdus_rejected, 1);
    assert_eq!(bridge.stats().bpdus_received, 0);
}

#[test]
fn test_backlog_applies_bpdus_in_arrival_order() {
    let (mut bridge, ops) = lone_bridge();
    ops.outbox.lock().unwrap().clear();

    // The first BPDU is staged but not yet consumed when the second lands.
    bridge.receive_frame(0, &designated_frame(0x1000)).unwrap();
    let report = bridge.handle_frame(0, &designated_frame(0x2000)).unwrap();

    assert!(report.tx_suppressed);
    assert!(!bridge.has_rx_backlog());
    assert_eq!(bridge.stats().bpdus_received, 2);
    assert_eq!(bridge.stats().bpdus_queued, 1);

    let port = &bridge.ports()[0];
    assert!(!port.rcvd_bpdu);
    assert_eq!(port.role, Role::Root);
    assert_eq!(port.port_priority.root_id, BridgeId::new(0x2000, mac(0x01)));
    // The final run after the backlog is allowed to answer.
    assert!(!ops.outbox.lock().unwrap().is_empty());
}

#[test]
fn test_held_gate_defers_answers() {
    let (mut bridge, ops) = lone_bridge();
    ops.outbox.lock().unwrap().clear();

    let gate = bridge.tx_gate();
    gate.hold();
    let report = bridge.handle_frame(0, &designated_frame(0x1000)).unwrap();
    assert!(report.tx_suppressed);
    assert!(ops.outbox.lock().unwrap().is_empty());
    assert_eq!(bridge.ports()[0].role, Role::Root);

    gate.release();
    bridge.run();
    assert!(!ops.outbox.lock().unwrap().is_empty());
}

#[test]
fn test_set_times_enforces_relations() {
    let (mut bridge, _) = lone_bridge();
    assert!(matches!(
        bridge.set_times(2, 5, 15),
        Err(RstpError::InvalidConfig { .. })
    ));
    assert_eq!(bridge.set_times(2, 20, 15), Ok(false));
    // 2 * (forward_delay - 1) must cover max_age.
    assert!(matches!(
        bridge.set_times(2, 30, 10),
        Err(RstpError::InvalidConfig { .. })
    ));
    // Hello time is fixed at two seconds.
    assert!(matches!(
        bridge.set_times(1, 20, 15),
        Err(RstpError::InvalidConfig { .. })
    ));
    assert_eq!(bridge.state().bridge_times.max_age, 20);

    assert_eq!(bridge.set_times(2, 12, 8), Ok(true));
    assert_eq!(bridge.set_times(2, 12, 8), Ok(false));
    assert_eq!(bridge.state().bridge_times.max_age, 12);
    assert_eq!(bridge.state().bridge_times.forward_delay, 8);
}

#[test]
fn test_disabled_bridge_forwards_everything() {
    let (mut bridge, ops) = lone_bridge();
    bridge.disable();
    assert!(!bridge.is_enabled());
    let states = ops.states.lock().unwrap();
    assert_eq!(states.get(&0), Some(&ForwardingState::Forwarding));
    assert_eq!(states.get(&1), Some(&ForwardingState::Forwarding));
}
