//! BPDU encoding and decoding.
//!
//! Frames are 802.3 with an LLC header (SAP 0x42, UI control). Three
//! BPDU kinds exist: topology change notification (4 bytes), legacy
//! configuration (35 bytes) and rapid spanning tree (36 bytes). Times are
//! carried in 1/256 second units.

use crate::error::BpduError;
use crate::priority::PriorityVector;
use crate::types::{BridgeId, MacAddress, PortId, Role, TimeParams};
use byteorder::{BigEndian, ByteOrder};
use std::ops::BitOr;

/// LLC service access point for spanning tree.
pub const LLC_SAP_STP: u8 = 0x42;
/// LLC unnumbered information control byte.
pub const LLC_CONTROL_UI: u8 = 0x03;

const ETH_ADDRS_LEN: usize = 12;
const ETH_HEADER_LEN: usize = 14;
const LLC_HEADER_LEN: usize = 3;
const MAX_8023_LENGTH: u16 = 1500;

/// Shortest frame put on the wire; BPDU frames are padded up to it.
pub const MIN_FRAME_LEN: usize = 60;

pub const TCN_BPDU_LEN: usize = 4;
pub const CONFIG_BPDU_LEN: usize = 35;
pub const RSTP_BPDU_LEN: usize = 36;

const RSTP_VERSION: u8 = 2;

/// BPDU type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BpduKind {
    Config,
    Rstp,
    Tcn,
}

impl BpduKind {
    pub fn from_type(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(BpduKind::Config),
            0x02 => Some(BpduKind::Rstp),
            0x80 => Some(BpduKind::Tcn),
            _ => None,
        }
    }

    pub const fn type_byte(self) -> u8 {
        match self {
            BpduKind::Config => 0x00,
            BpduKind::Rstp => 0x02,
            BpduKind::Tcn => 0x80,
        }
    }

    pub const fn wire_len(self) -> usize {
        match self {
            BpduKind::Config => CONFIG_BPDU_LEN,
            BpduKind::Rstp => RSTP_BPDU_LEN,
            BpduKind::Tcn => TCN_BPDU_LEN,
        }
    }

    const fn version(self) -> u8 {
        match self {
            BpduKind::Rstp => RSTP_VERSION,
            BpduKind::Config | BpduKind::Tcn => 0,
        }
    }
}

/// Port role encoded in bits 2-3 of the RSTP flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BpduRole {
    #[default]
    Unknown,
    AlternateBackup,
    Root,
    Designated,
}

impl BpduRole {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => BpduRole::AlternateBackup,
            2 => BpduRole::Root,
            3 => BpduRole::Designated,
            _ => BpduRole::Unknown,
        }
    }

    const fn bits(self) -> u8 {
        match self {
            BpduRole::Unknown => 0,
            BpduRole::AlternateBackup => 1,
            BpduRole::Root => 2,
            BpduRole::Designated => 3,
        }
    }
}

impl From<Role> for BpduRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Disabled => BpduRole::Unknown,
            Role::Alternate | Role::Backup => BpduRole::AlternateBackup,
            Role::Root => BpduRole::Root,
            Role::Designated => BpduRole::Designated,
        }
    }
}

/// BPDU flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BpduFlags(u8);

impl BpduFlags {
    pub const TOPOLOGY_CHANGE: BpduFlags = BpduFlags(0x01);
    pub const PROPOSAL: BpduFlags = BpduFlags(0x02);
    pub const LEARNING: BpduFlags = BpduFlags(0x10);
    pub const FORWARDING: BpduFlags = BpduFlags(0x20);
    pub const AGREEMENT: BpduFlags = BpduFlags(0x40);
    pub const TOPOLOGY_CHANGE_ACK: BpduFlags = BpduFlags(0x80);

    const ROLE_SHIFT: u8 = 2;
    const ROLE_MASK: u8 = 0x0c;
    /// Only flags a legacy configuration BPDU carries.
    const CONFIG_MASK: u8 = 0x81;

    pub const fn empty() -> Self {
        BpduFlags(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        BpduFlags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: BpduFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets or clears `flag`.
    pub fn set(&mut self, flag: BpduFlags, on: bool) {
        if on {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }

    pub const fn role(self) -> BpduRole {
        BpduRole::from_bits((self.0 & Self::ROLE_MASK) >> Self::ROLE_SHIFT)
    }

    pub const fn with_role(self, role: BpduRole) -> Self {
        BpduFlags((self.0 & !Self::ROLE_MASK) | (role.bits() << Self::ROLE_SHIFT))
    }
}

impl BitOr for BpduFlags {
    type Output = BpduFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        BpduFlags(self.0 | rhs.0)
    }
}

/// A validated BPDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedBpdu {
    /// Protocol version, clamped to 2.
    pub version: u8,
    pub kind: BpduKind,
    pub flags: BpduFlags,
    /// Role of the sending port. Configuration BPDUs always come from a
    /// designated port.
    pub role: BpduRole,
    pub priority: PriorityVector,
    pub times: TimeParams,
}

/// Wire time (1/256 s) to whole seconds, rounding up.
pub fn decode_time(raw: u16) -> u16 {
    ((u32::from(raw) + 255) / 256) as u16
}

/// Whole seconds to wire time, saturating past 255 s.
pub fn encode_time(secs: u16) -> u16 {
    if secs < 256 {
        secs * 256
    } else {
        u16::MAX
    }
}

/// Parses a whole 802.3 frame as received from the switch.
pub fn parse(frame: &[u8]) -> Result<ParsedBpdu, BpduError> {
    let header = ETH_HEADER_LEN + LLC_HEADER_LEN;
    if frame.len() < header {
        return Err(BpduError::Truncated {
            len: frame.len(),
            min: header,
        });
    }
    let length = BigEndian::read_u16(&frame[ETH_ADDRS_LEN..ETH_HEADER_LEN]);
    if length > MAX_8023_LENGTH {
        return Err(BpduError::NotLlc(length));
    }
    let (dsap, ssap, control) = (frame[14], frame[15], frame[16]);
    if dsap != LLC_SAP_STP || ssap != LLC_SAP_STP || control != LLC_CONTROL_UI {
        return Err(BpduError::BadLlc {
            dsap,
            ssap,
            control,
        });
    }
    let payload_len = usize::from(length)
        .saturating_sub(LLC_HEADER_LEN)
        .min(frame.len() - header);
    parse_bpdu(&frame[header..header + payload_len])
}

/// Parses the BPDU that follows the LLC header.
pub fn parse_bpdu(payload: &[u8]) -> Result<ParsedBpdu, BpduError> {
    if payload.len() < TCN_BPDU_LEN {
        return Err(BpduError::Truncated {
            len: payload.len(),
            min: TCN_BPDU_LEN,
        });
    }
    let protocol = BigEndian::read_u16(&payload[0..2]);
    if protocol != 0 {
        return Err(BpduError::BadProtocolId(protocol));
    }
    let version = payload[2].min(RSTP_VERSION);
    let kind = BpduKind::from_type(payload[3]).ok_or(BpduError::UnknownType(payload[3]))?;
    if payload.len() < kind.wire_len() {
        return Err(BpduError::Truncated {
            len: payload.len(),
            min: kind.wire_len(),
        });
    }
    if kind == BpduKind::Rstp && version < RSTP_VERSION {
        return Err(BpduError::BadRstpVersion(payload[2]));
    }

    if kind == BpduKind::Tcn {
        return Ok(ParsedBpdu {
            version,
            kind,
            flags: BpduFlags::empty(),
            role: BpduRole::Unknown,
            priority: PriorityVector::default(),
            times: TimeParams::default(),
        });
    }

    let raw_flags = payload[4];
    let (flags, role) = match kind {
        BpduKind::Config => (
            BpduFlags(raw_flags & BpduFlags::CONFIG_MASK),
            BpduRole::Designated,
        ),
        _ => (BpduFlags(raw_flags), BpduFlags(raw_flags).role()),
    };
    let priority = PriorityVector {
        root_id: read_bridge_id(&payload[5..13]),
        root_path_cost: BigEndian::read_u32(&payload[13..17]),
        bridge_id: read_bridge_id(&payload[17..25]),
        port_id: PortId::new(payload[25], payload[26]),
    };
    let times = TimeParams {
        message_age: decode_time(BigEndian::read_u16(&payload[27..29])),
        max_age: decode_time(BigEndian::read_u16(&payload[29..31])),
        hello_time: decode_time(BigEndian::read_u16(&payload[31..33])),
        forward_delay: decode_time(BigEndian::read_u16(&payload[33..35])),
    };

    let expired = match kind {
        BpduKind::Config => times.message_age >= times.max_age,
        _ => times.message_age > times.max_age,
    };
    if expired {
        return Err(BpduError::Expired {
            message_age: times.message_age,
            max_age: times.max_age,
        });
    }

    Ok(ParsedBpdu {
        version,
        kind,
        flags,
        role,
        priority,
        times,
    })
}

/// Builds the BPDU payload that follows the LLC header.
pub fn build(
    kind: BpduKind,
    priority: &PriorityVector,
    times: &TimeParams,
    flags: BpduFlags,
) -> Vec<u8> {
    let mut buf = vec![0u8; kind.wire_len()];
    buf[2] = kind.version();
    buf[3] = kind.type_byte();
    if kind == BpduKind::Tcn {
        return buf;
    }
    buf[4] = flags.bits();
    write_bridge_id(&mut buf[5..13], &priority.root_id);
    BigEndian::write_u32(&mut buf[13..17], priority.root_path_cost);
    write_bridge_id(&mut buf[17..25], &priority.bridge_id);
    buf[25] = priority.port_id.priority;
    buf[26] = priority.port_id.number;
    BigEndian::write_u16(&mut buf[27..29], encode_time(times.message_age));
    BigEndian::write_u16(&mut buf[29..31], encode_time(times.max_age));
    BigEndian::write_u16(&mut buf[31..33], encode_time(times.hello_time));
    BigEndian::write_u16(&mut buf[33..35], encode_time(times.forward_delay));
    // Version 1 length stays zero for RSTP.
    buf
}

/// Wraps a BPDU payload into a padded 802.3/LLC frame.
pub fn build_frame(source: MacAddress, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MIN_FRAME_LEN.max(ETH_HEADER_LEN + LLC_HEADER_LEN + payload.len()));
    frame.extend_from_slice(&MacAddress::BRIDGE_GROUP.octets());
    frame.extend_from_slice(&source.octets());
    let mut length = [0u8; 2];
    BigEndian::write_u16(&mut length, (payload.len() + LLC_HEADER_LEN) as u16);
    frame.extend_from_slice(&length);
    frame.extend_from_slice(&[LLC_SAP_STP, LLC_SAP_STP, LLC_CONTROL_UI]);
    frame.extend_from_slice(payload);
    if frame.len() < MIN_FRAME_LEN {
        frame.resize(MIN_FRAME_LEN, 0);
    }
    frame
}

fn read_bridge_id(bytes: &[u8]) -> BridgeId {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&bytes[2..8]);
    BridgeId::new(BigEndian::read_u16(&bytes[0..2]), MacAddress::new(mac))
}

fn write_bridge_id(bytes: &mut [u8], id: &BridgeId) {
    BigEndian::write_u16(&mut bytes[0..2], id.priority);
    bytes[2..8].copy_from_slice(&id.address.octets());
}
