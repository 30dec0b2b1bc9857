//! The compile/init-time constants of a transfer, validated once at
//! construction rather than re-checked on every hot-path call.

use crate::error::ConfigError;
use crate::protocol::MAX_BUFFER_BLOCKS;

/// Validated configuration shared by [`crate::client::MtftpClient`] and
/// [`crate::server::MtftpServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtftpConfig {
    /// Bytes of payload in a full DATA packet.
    pub block_len: u16,
    /// Maximum blocks per window.
    pub window_max: u16,
    /// Capacity, in blocks, of the client's reordering buffer.
    pub buffer_blocks: usize,
    /// Maximum missing-block entries in one RTX packet.
    pub rtx_max: usize,
    /// Inactivity timeout, in microseconds.
    pub timeout_us: u64,
}

impl MtftpConfig {
    /// Builds a config from the datagram MTU, deriving `rtx_max` as
    /// `(mtu - 2) / 2` per the wire format's RTX header size.
    pub fn new(
        block_len: u16,
        window_max: u16,
        buffer_blocks: usize,
        mtu: usize,
        timeout_us: u64,
    ) -> Result<Self, ConfigError> {
        if block_len == 0 {
            return Err(ConfigError::ZeroBlockLen);
        }
        if buffer_blocks < window_max as usize {
            return Err(ConfigError::BufferTooSmall {
                buffer_blocks,
                window_max: window_max as usize,
            });
        }
        if buffer_blocks > MAX_BUFFER_BLOCKS {
            return Err(ConfigError::BufferExceedsCeiling(
                buffer_blocks,
                MAX_BUFFER_BLOCKS,
            ));
        }
        let rtx_max = mtu.saturating_sub(2) / 2;
        if rtx_max == 0 {
            return Err(ConfigError::RtxMaxIsZero { mtu, block_len: block_len as usize });
        }
        Ok(Self {
            block_len,
            window_max,
            buffer_blocks,
            rtx_max,
            timeout_us,
        })
    }
}
