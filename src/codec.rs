//! Byte-exact (de)serialization of [`crate::protocol::Packet`] against the
//! wire layout: opcode in byte 0, all multi-byte fields little-endian,
//! structs densely packed with no padding.

use crate::error::DecodeError;
use crate::protocol::{
    FileIndex, FileOffset, LEN_ACK, LEN_DATA_HEADER, LEN_ERR, LEN_RRQ, LEN_RTX_HEADER, Opcode,
    Packet, WindowSize,
};

/// Encodes a packet into its wire representation.
pub fn encode(packet: &Packet) -> Vec<u8> {
    match packet {
        Packet::Rrq {
            file_index,
            file_offset,
            window_size,
        } => {
            let mut buf = Vec::with_capacity(LEN_RRQ);
            buf.push(Opcode::Rrq as u8);
            buf.extend_from_slice(&file_index.0.to_le_bytes());
            buf.extend_from_slice(&file_offset.0.to_le_bytes());
            buf.extend_from_slice(&window_size.0.to_le_bytes());
            buf
        }
        Packet::Data { block_no, payload } => {
            let mut buf = Vec::with_capacity(LEN_DATA_HEADER + payload.len());
            buf.push(Opcode::Data as u8);
            buf.extend_from_slice(&block_no.to_le_bytes());
            buf.extend_from_slice(payload);
            buf
        }
        Packet::Rtx { block_nos } => {
            let mut buf = Vec::with_capacity(LEN_RTX_HEADER + 2 * block_nos.len());
            buf.push(Opcode::Rtx as u8);
            buf.push(block_nos.len() as u8);
            for bn in block_nos {
                buf.extend_from_slice(&bn.to_le_bytes());
            }
            buf
        }
        Packet::Ack { block_no } => {
            let mut buf = Vec::with_capacity(LEN_ACK);
            buf.push(Opcode::Ack as u8);
            buf.extend_from_slice(&block_no.to_le_bytes());
            buf
        }
        Packet::Err { err_kind } => {
            vec![Opcode::Err as u8, *err_kind]
        }
    }
}

/// Decodes a raw datagram into a [`Packet`].
///
/// For RTX, a length mismatch against the declared `num_elements` is
/// tolerated: trailing padding is ignored and a truncated list is read as
/// far as the bytes allow, per the codec's compatibility note.
pub fn decode(bytes: &[u8]) -> Result<Packet, DecodeError> {
    let opcode_byte = *bytes.first().ok_or(DecodeError::BadLength(bytes.len()))?;
    let opcode = Opcode::from_byte(opcode_byte).ok_or(DecodeError::BadOpcode(opcode_byte))?;

    match opcode {
        Opcode::Rrq => {
            if bytes.len() != LEN_RRQ {
                return Err(DecodeError::BadLength(bytes.len()));
            }
            let file_index = FileIndex(u16::from_le_bytes([bytes[1], bytes[2]]));
            let file_offset = FileOffset(u32::from_le_bytes([
                bytes[3], bytes[4], bytes[5], bytes[6],
            ]));
            let window_size = WindowSize(u16::from_le_bytes([bytes[7], bytes[8]]));
            Ok(Packet::Rrq {
                file_index,
                file_offset,
                window_size,
            })
        }
        Opcode::Data => {
            if bytes.len() < LEN_DATA_HEADER {
                return Err(DecodeError::BadLength(bytes.len()));
            }
            let block_no = u16::from_le_bytes([bytes[1], bytes[2]]);
            let payload = bytes[LEN_DATA_HEADER..].to_vec();
            Ok(Packet::Data { block_no, payload })
        }
        Opcode::Rtx => {
            if bytes.len() < LEN_RTX_HEADER {
                return Err(DecodeError::BadLength(bytes.len()));
            }
            let num_elements = bytes[1] as usize;
            let expected_len = LEN_RTX_HEADER + 2 * num_elements;
            if bytes.len() != expected_len {
                tracing::debug!(
                    declared = num_elements,
                    actual_len = bytes.len(),
                    expected_len,
                    "RTX length mismatch, tolerating"
                );
            }
            let available = (bytes.len().saturating_sub(LEN_RTX_HEADER)) / 2;
            let n = num_elements.min(available);
            let mut block_nos = Vec::with_capacity(n);
            for i in 0..n {
                let off = LEN_RTX_HEADER + 2 * i;
                block_nos.push(u16::from_le_bytes([bytes[off], bytes[off + 1]]));
            }
            Ok(Packet::Rtx { block_nos })
        }
        Opcode::Ack => {
            if bytes.len() != LEN_ACK {
                return Err(DecodeError::BadLength(bytes.len()));
            }
            let block_no = u16::from_le_bytes([bytes[1], bytes[2]]);
            Ok(Packet::Ack { block_no })
        }
        Opcode::Err => {
            if bytes.len() != LEN_ERR {
                return Err(DecodeError::BadLength(bytes.len()));
            }
            Ok(Packet::Err {
                err_kind: bytes[1],
            })
        }
    }
}
