//! Port Role Selection state machine (17.28).
//!
//! The only bridge-wide machine. It elects the root port from the
//! vectors received on every port and assigns each port the role it
//! should move to.

use super::{BridgeCtx, StateMachine};
use crate::bridge::BridgeState;
use crate::port::PortState;
use crate::priority::{PriorityVector, RootPath};
use crate::types::{InfoType, PortId, Role};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleSelectionState {
    #[default]
    Begin,
    InitBridge,
    RoleSelection,
}

pub struct PortRoleSelection;

impl<'a> StateMachine<BridgeCtx<'a>> for PortRoleSelection {
    type State = RoleSelectionState;

    const NAME: &'static str = "role_selection";
    const BEGIN: RoleSelectionState = RoleSelectionState::Begin;

    fn cursor<'c>(ctx: &'c mut BridgeCtx<'a>) -> &'c mut RoleSelectionState {
        &mut ctx.br.role_selection
    }

    fn initial(_ctx: &BridgeCtx<'a>) -> RoleSelectionState {
        RoleSelectionState::InitBridge
    }

    fn enter(ctx: &mut BridgeCtx<'a>, state: RoleSelectionState) {
        match state {
            RoleSelectionState::Begin => {}
            RoleSelectionState::InitBridge => {
                ctx.ports
                    .iter_mut()
                    .for_each(|p| p.selected_role = Role::Disabled);
            }
            RoleSelectionState::RoleSelection => {
                ctx.ports.iter_mut().for_each(|p| p.reselect = false);
                update_roles(ctx.br, ctx.ports);
                if !ctx.ports.iter().any(|p| p.reselect) {
                    ctx.ports.iter_mut().for_each(|p| p.selected = true);
                }
            }
        }
    }

    fn next(ctx: &mut BridgeCtx<'a>, state: RoleSelectionState) -> Option<RoleSelectionState> {
        match state {
            RoleSelectionState::InitBridge => Some(RoleSelectionState::RoleSelection),
            RoleSelectionState::RoleSelection if ctx.ports.iter().any(|p| p.reselect) => {
                Some(RoleSelectionState::RoleSelection)
            }
            _ => None,
        }
    }
}

/// Elects the root and computes every port's designated vector and
/// selected role.
pub(crate) fn update_roles(br: &mut BridgeState, ports: &mut [PortState]) {
    let own_address = br.bridge_id.address;
    let own = RootPath {
        priority: br.bridge_priority,
        rx_port: PortId::default(),
    };

    let mut best = own;
    let mut root_port = None;
    for (i, p) in ports.iter().enumerate() {
        if p.info_is != InfoType::Received || p.port_priority.bridge_id.address == own_address {
            continue;
        }
        let mut candidate = RootPath {
            priority: p.port_priority,
            rx_port: p.port_id,
        };
        candidate.priority.root_path_cost =
            candidate.priority.root_path_cost.saturating_add(p.path_cost);
        if candidate < best {
            best = candidate;
            root_port = Some(i);
        }
    }

    if root_port != br.root_port || best.priority.root_id != br.root_priority.root_id {
        info!(
            root = %best.priority.root_id,
            cost = best.priority.root_path_cost,
            root_port = ?root_port,
            "root elected"
        );
    }
    br.root_priority = best.priority;
    br.root_port_id = best.rx_port;
    br.root_port = root_port;
    br.root_times = match root_port {
        Some(i) => {
            let mut times = ports[i].port_times;
            times.message_age += 1;
            times
        }
        None => br.bridge_times,
    };

    for (i, p) in ports.iter_mut().enumerate() {
        p.designated_priority = PriorityVector {
            bridge_id: br.bridge_id,
            port_id: p.port_id,
            ..br.root_priority
        };
        p.designated_times = br.root_times;
        p.designated_times.hello_time = br.bridge_times.hello_time;

        match p.info_is {
            InfoType::Disabled => p.selected_role = Role::Disabled,
            InfoType::Aged => {
                p.selected_role = Role::Designated;
                p.updt_info = true;
            }
            InfoType::Mine => {
                p.selected_role = Role::Designated;
                if p.port_priority != p.designated_priority
                    || p.port_times != p.designated_times
                {
                    p.updt_info = true;
                }
            }
            InfoType::Received if root_port == Some(i) => {
                p.selected_role = Role::Root;
                p.updt_info = false;
            }
            InfoType::Received if p.designated_priority >= p.port_priority => {
                p.selected_role = if p.port_priority.bridge_id.address != own_address {
                    Role::Alternate
                } else {
                    Role::Backup
                };
                p.updt_info = false;
            }
            InfoType::Received => {
                p.selected_role = Role::Designated;
                p.updt_info = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machines::step;
    use crate::machines::testing::fixture;
    use crate::types::{BridgeId, MacAddress, TimeParams};
    use pretty_assertions::assert_eq;

    fn received(p: &mut PortState, root_last: u8, cost: u32, bridge_last: u8, port_num: u8) {
        p.info_is = InfoType::Received;
        p.port_priority = PriorityVector {
            root_id: BridgeId::new(0x8000, MacAddress::new([0, 0, 0, 0, 0, root_last])),
            root_path_cost: cost,
            bridge_id: BridgeId::new(0x8000, MacAddress::new([0, 0, 0, 0, 0, bridge_last])),
            port_id: PortId::new(0x80, port_num),
        };
        p.port_times = TimeParams::new(1, 20, 2, 15);
        p.path_cost = 20_000;
    }

    #[test]
    fn test_bridge_is_root_without_received_info() {
        let (mut br, mut ports) = fixture(2);
        ports[0].info_is = InfoType::Aged;
        update_roles(&mut br, &mut ports);
        assert_eq!(br.root_port, None);
        assert_eq!(br.root_priority, br.bridge_priority);
        assert_eq!(br.root_times, br.bridge_times);
        assert_eq!(ports[0].selected_role, Role::Designated);
        assert!(ports[0].updt_info);
        assert_eq!(ports[1].selected_role, Role::Disabled);
        assert_eq!(ports[0].designated_priority.port_id, ports[0].port_id);
    }

    #[test]
    fn test_best_received_vector_becomes_root_port() {
        let (mut br, mut ports) = fixture(3);
        received(&mut ports[0], 0x01, 40_000, 0x05, 1);
        received(&mut ports[1], 0x01, 20_000, 0x06, 1);
        received(&mut ports[2], 0x01, 20_000, 0x06, 2);
        update_roles(&mut br, &mut ports);

        assert_eq!(br.root_port, Some(1));
        assert_eq!(br.root_priority.root_path_cost, 40_000);
        assert_eq!(br.root_times.message_age, 2);
        assert_eq!(ports[1].selected_role, Role::Root);
        assert_eq!(ports[0].selected_role, Role::Alternate);
        assert_eq!(ports[2].selected_role, Role::Alternate);
        assert_eq!(ports[0].designated_times.hello_time, 2);
    }

    #[test]
    fn test_worse_neighbour_gets_designated_port() {
        let (mut br, mut ports) = fixture(2);
        received(&mut ports[0], 0x01, 0, 0x01, 1);
        received(&mut ports[1], 0x01, 90_000, 0x30, 1);
        update_roles(&mut br, &mut ports);
        assert_eq!(ports[0].selected_role, Role::Root);
        assert_eq!(ports[1].selected_role, Role::Designated);
        assert!(ports[1].updt_info);
    }

    #[test]
    fn test_own_bpdu_on_other_port_is_backup() {
        let (mut br, mut ports) = fixture(2);
        let own = br.bridge_id.address.octets()[5];
        ports[0].info_is = InfoType::Mine;
        received(&mut ports[1], own, 0, own, 1);
        ports[1].port_priority.root_id = br.bridge_id;
        ports[1].port_priority.bridge_id = br.bridge_id;
        update_roles(&mut br, &mut ports);
        assert_eq!(br.root_port, None);
        assert_eq!(ports[1].selected_role, Role::Backup);
    }

    #[test]
    fn test_machine_selects_every_port() {
        let (mut br, mut ports) = fixture(2);
        ports[0].reselect = true;
        let mut ctx = BridgeCtx {
            br: &mut br,
            ports: &mut ports,
        };
        assert_eq!(step::<_, PortRoleSelection>(&mut ctx), 2);
        assert!(ctx.ports.iter().all(|p| p.selected && !p.reselect));
        assert_eq!(ctx.br.role_selection, RoleSelectionState::RoleSelection);
    }
}
