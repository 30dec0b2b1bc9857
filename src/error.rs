use thiserror::Error;

/// Errors returned while decoding a raw datagram into a [`crate::protocol::Packet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("packet too short or malformed for its opcode: {0} bytes")]
    BadLength(usize),
    #[error("unrecognized opcode byte: {0}")]
    BadOpcode(u8),
}

/// Errors constructing an [`crate::config::MtftpConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("block_len must be nonzero")]
    ZeroBlockLen,
    #[error("buffer_blocks ({buffer_blocks}) must be >= window_max ({window_max})")]
    BufferTooSmall {
        buffer_blocks: usize,
        window_max: usize,
    },
    #[error("buffer_blocks ({0}) exceeds the compiled-in ceiling ({1})")]
    BufferExceedsCeiling(usize, usize),
    #[error("rtx_max derived from mtu ({mtu}) and block_len ({block_len}) is zero")]
    RtxMaxIsZero { mtu: usize, block_len: usize },
}

/// Diagnostic outcome of feeding a received packet to a state machine.
///
/// These are not thrown: they describe why a packet was accepted, ignored,
/// or rejected, for logging and test assertions. A non-`Ok` result never
/// unwinds the transfer by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvResult {
    /// The packet was accepted and processed normally.
    Ok,
    /// The packet was too short, too long, or otherwise malformed for its opcode.
    BadLength,
    /// The packet's opcode is not valid in the peer's current state.
    BadState,
    /// The opcode byte did not decode to any known [`crate::protocol::Opcode`].
    BadOpcode,
    /// An ACK arrived while the peer was not awaiting one.
    BadAfterAck,
    /// The block number referenced by the packet is out of range for the
    /// current window or reordering buffer.
    BadBlockNo,
}

impl std::fmt::Display for RecvResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecvResult::Ok => "ok",
            RecvResult::BadLength => "bad length",
            RecvResult::BadState => "bad state",
            RecvResult::BadOpcode => "bad opcode",
            RecvResult::BadAfterAck => "bad after ack",
            RecvResult::BadBlockNo => "bad block number",
        };
        f.write_str(s)
    }
}
