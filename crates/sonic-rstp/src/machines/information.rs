//! Port Information state machine (17.27).
//!
//! Classifies each received message against the port's current vector
//! and records the result. Local information is installed in UPDATE when
//! role selection asks for it (`updtInfo`).

use super::{PortCtx, StateMachine};
use crate::bpdu::{BpduFlags, BpduKind, BpduRole};
use crate::config::times_are_valid;
use crate::priority::is_superior;
use crate::types::{secs_to_ticks, InfoType, RcvdInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfoState {
    #[default]
    Begin,
    Disabled,
    Aged,
    Update,
    SuperiorDesignated,
    RepeatedDesignated,
    InferiorDesignated,
    NotDesignated,
    Other,
    Current,
    Receive,
}

pub struct PortInformation;

impl PortInformation {
    /// Decides what kind of information the received message carries.
    fn classify(ctx: &mut PortCtx<'_>) -> RcvdInfo {
        let p = ctx.port_mut();
        let Some(bpdu) = p.last_bpdu else {
            return RcvdInfo::Other;
        };
        if bpdu.kind == BpduKind::Tcn {
            p.rcvd_tcn = true;
            return RcvdInfo::Other;
        }
        p.msg_priority = bpdu.priority;
        p.msg_times = bpdu.times;

        match bpdu.role {
            BpduRole::Designated => {
                if p.msg_priority == p.port_priority && p.msg_times == p.port_times {
                    RcvdInfo::RepeatedDesignated
                } else if is_superior(&p.msg_priority, &p.port_priority) {
                    RcvdInfo::SuperiorDesignated
                } else {
                    RcvdInfo::InferiorDesignated
                }
            }
            BpduRole::Root | BpduRole::AlternateBackup
                if p.msg_priority >= p.port_priority =>
            {
                RcvdInfo::InferiorRootAlternate
            }
            _ => RcvdInfo::Other,
        }
    }

    fn flags(ctx: &PortCtx<'_>) -> BpduFlags {
        ctx.port()
            .last_bpdu
            .map(|b| b.flags)
            .unwrap_or_default()
    }

    fn record_proposal(ctx: &mut PortCtx<'_>) {
        let Some(bpdu) = ctx.port().last_bpdu else {
            return;
        };
        if bpdu.role == BpduRole::Designated && bpdu.flags.contains(BpduFlags::PROPOSAL) {
            ctx.port_mut().proposed = true;
        }
    }

    fn record_agreement(ctx: &mut PortCtx<'_>) {
        let rstp = ctx.rstp_version();
        let flags = Self::flags(ctx);
        let p = ctx.port_mut();
        if rstp && p.oper_p2p && flags.contains(BpduFlags::AGREEMENT) {
            p.agreed = true;
            p.proposing = false;
        } else {
            p.agreed = false;
        }
    }

    fn record_dispute(ctx: &mut PortCtx<'_>) {
        if Self::flags(ctx).contains(BpduFlags::LEARNING) {
            let p = ctx.port_mut();
            p.disputed = true;
            p.agreed = false;
        }
    }

    fn set_tc_flags(ctx: &mut PortCtx<'_>) {
        let flags = Self::flags(ctx);
        let p = ctx.port_mut();
        if flags.contains(BpduFlags::TOPOLOGY_CHANGE) {
            p.rcvd_tc = true;
        }
        if flags.contains(BpduFlags::TOPOLOGY_CHANGE_ACK) {
            p.rcvd_tc_ack = true;
        }
    }

    /// Takes the sender's timers when they are sane, otherwise only its
    /// message age.
    fn record_times(ctx: &mut PortCtx<'_>) {
        let p = ctx.port_mut();
        let msg = p.msg_times;
        if times_are_valid(2, msg.max_age, msg.forward_delay) {
            p.port_times = msg;
            p.port_times.hello_time = p.port_times.hello_time.max(1);
        } else {
            p.port_times.message_age = msg.message_age;
        }
    }

    fn update_rcvd_info_while(ctx: &mut PortCtx<'_>) {
        let p = ctx.port_mut();
        let times = p.port_times;
        p.timers.rcvd_info_while = if times.message_age + 1 <= times.max_age {
            secs_to_ticks(3 * times.hello_time)
        } else {
            0
        };
    }
}

impl<'a> StateMachine<PortCtx<'a>> for PortInformation {
    type State = InfoState;

    const NAME: &'static str = "information";
    const BEGIN: InfoState = InfoState::Begin;

    fn cursor<'c>(ctx: &'c mut PortCtx<'a>) -> &'c mut InfoState {
        &mut ctx.port_mut().cursors.information
    }

    fn initial(_ctx: &PortCtx<'a>) -> InfoState {
        InfoState::Disabled
    }

    fn global(ctx: &mut PortCtx<'a>) -> Option<InfoState> {
        let p = ctx.port();
        (!p.port_enabled && p.info_is != InfoType::Disabled).then_some(InfoState::Disabled)
    }

    fn enter(ctx: &mut PortCtx<'a>, state: InfoState) {
        match state {
            InfoState::Begin | InfoState::Current => {}
            InfoState::Disabled => {
                let p = ctx.port_mut();
                p.rcvd_msg = false;
                p.proposing = false;
                p.proposed = false;
                p.agree = false;
                p.agreed = false;
                p.timers.rcvd_info_while = 0;
                p.info_is = InfoType::Disabled;
                p.reselect = true;
                p.selected = false;
            }
            InfoState::Aged => {
                let p = ctx.port_mut();
                p.info_is = InfoType::Aged;
                p.reselect = true;
                p.selected = false;
            }
            InfoState::Update => {
                let p = ctx.port_mut();
                p.proposing = false;
                p.proposed = false;
                p.agreed = p.agreed && p.better_or_same_info(InfoType::Mine);
                if p.forward {
                    p.agreed = p.send_rstp;
                }
                p.synced = p.synced && p.agreed;
                p.port_priority = p.designated_priority;
                p.port_times = p.designated_times;
                p.updt_info = false;
                p.info_is = InfoType::Mine;
                p.new_info = true;
            }
            InfoState::SuperiorDesignated => {
                {
                    let p = ctx.port_mut();
                    p.agreed = false;
                    p.proposing = false;
                }
                Self::record_proposal(ctx);
                Self::set_tc_flags(ctx);
                let p = ctx.port_mut();
                p.agree = p.agree && p.better_or_same_info(InfoType::Received);
                p.port_priority = p.msg_priority;
                Self::record_times(ctx);
                Self::update_rcvd_info_while(ctx);
                let p = ctx.port_mut();
                p.info_is = InfoType::Received;
                p.reselect = true;
                p.selected = false;
                p.rcvd_msg = false;
            }
            InfoState::RepeatedDesignated => {
                Self::record_proposal(ctx);
                Self::set_tc_flags(ctx);
                Self::update_rcvd_info_while(ctx);
                ctx.port_mut().rcvd_msg = false;
            }
            InfoState::InferiorDesignated => {
                Self::record_dispute(ctx);
                ctx.port_mut().rcvd_msg = false;
            }
            InfoState::NotDesignated => {
                Self::record_agreement(ctx);
                Self::set_tc_flags(ctx);
                ctx.port_mut().rcvd_msg = false;
            }
            InfoState::Other => ctx.port_mut().rcvd_msg = false,
            InfoState::Receive => {
                let info = Self::classify(ctx);
                ctx.port_mut().rcvd_info = info;
            }
        }
    }

    fn next(ctx: &mut PortCtx<'a>, state: InfoState) -> Option<InfoState> {
        let p = ctx.port();
        match state {
            InfoState::Begin => None,
            InfoState::Disabled => {
                if p.port_enabled {
                    Some(InfoState::Aged)
                } else if p.rcvd_msg {
                    Some(InfoState::Disabled)
                } else {
                    None
                }
            }
            InfoState::Aged => (p.selected && p.updt_info).then_some(InfoState::Update),
            InfoState::Update
            | InfoState::SuperiorDesignated
            | InfoState::RepeatedDesignated
            | InfoState::InferiorDesignated
            | InfoState::NotDesignated
            | InfoState::Other => Some(InfoState::Current),
            InfoState::Current => {
                if p.selected && p.updt_info {
                    Some(InfoState::Update)
                } else if p.info_is == InfoType::Received
                    && p.timers.rcvd_info_while == 0
                    && !p.updt_info
                    && !p.rcvd_msg
                {
                    Some(InfoState::Aged)
                } else if p.rcvd_msg && !p.updt_info {
                    Some(InfoState::Receive)
                } else {
                    None
                }
            }
            InfoState::Receive => Some(match p.rcvd_info {
                RcvdInfo::SuperiorDesignated => InfoState::SuperiorDesignated,
                RcvdInfo::RepeatedDesignated => InfoState::RepeatedDesignated,
                RcvdInfo::InferiorDesignated => InfoState::InferiorDesignated,
                RcvdInfo::InferiorRootAlternate => InfoState::NotDesignated,
                RcvdInfo::Other => InfoState::Other,
            }),
        }
    }
}
