//! Wire packet types and the fixed constants of the MTFTP protocol.
//!
//! The byte layout here is authoritative and not versioned: every field is
//! little-endian, every struct densely packed with no padding. See
//! `crate::codec` for the actual (de)serialization.

use std::fmt;

macro_rules! protocol_newtype {
    ($name:ident, $inner:ty, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub $inner);

        impl From<$inner> for $name {
            fn from(val: $inner) -> Self {
                $name(val)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

protocol_newtype!(
    FileIndex,
    u16,
    "Identifies which indexed file a transfer reads or writes."
);
protocol_newtype!(FileOffset, u32, "Byte offset into the target file.");
protocol_newtype!(
    WindowSize,
    u16,
    "Number of blocks the server streams before awaiting ACK/RTX."
);

/// Length of the fixed header of a DATA packet (opcode + block_no), in bytes.
pub const LEN_DATA_HEADER: usize = 3;
/// Length of the fixed header of an RTX packet (opcode + num_elements), in bytes.
pub const LEN_RTX_HEADER: usize = 2;
/// Length of an RRQ packet: opcode + file_index + file_offset + window_size.
pub const LEN_RRQ: usize = 9;
/// Length of an ACK packet: opcode + block_no.
pub const LEN_ACK: usize = 3;
/// Length of an ERR packet: opcode + err_kind.
pub const LEN_ERR: usize = 2;

/// Compile-time ceiling on the client's reordering buffer, in blocks.
///
/// `MtftpConfig` validates that the configured `buffer_blocks` (which may be
/// smaller, per transfer) does not exceed this.
pub const MAX_BUFFER_BLOCKS: usize = 256;
/// Number of 64-bit words needed to track [`MAX_BUFFER_BLOCKS`] missing-block bits.
pub const BITSET_WORDS: usize = MAX_BUFFER_BLOCKS.div_ceil(64);

/// The sole defined `err_kind`: the server's `read_file` callback failed.
pub const ERR_FILE_READ_FAILED: u8 = 0;

/// The wire opcode byte occupying byte 0 of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Rrq = 1,
    Data = 2,
    Rtx = 3,
    Ack = 4,
    Err = 5,
}

impl Opcode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Opcode::Rrq),
            2 => Some(Opcode::Data),
            3 => Some(Opcode::Rtx),
            4 => Some(Opcode::Ack),
            5 => Some(Opcode::Err),
            _ => None,
        }
    }
}

/// A decoded MTFTP packet of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Rrq {
        file_index: FileIndex,
        file_offset: FileOffset,
        window_size: WindowSize,
    },
    Data {
        block_no: u16,
        payload: Vec<u8>,
    },
    Rtx {
        block_nos: Vec<u16>,
    },
    Ack {
        block_no: u16,
    },
    Err {
        err_kind: u8,
    },
}

impl Packet {
    pub fn opcode(&self) -> Opcode {
        match self {
            Packet::Rrq { .. } => Opcode::Rrq,
            Packet::Data { .. } => Opcode::Data,
            Packet::Rtx { .. } => Opcode::Rtx,
            Packet::Ack { .. } => Opcode::Ack,
            Packet::Err { .. } => Opcode::Err,
        }
    }
}
