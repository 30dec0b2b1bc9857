//! # MTFTP
//!
//! A windowed, unreliable-datagram file-transfer protocol for memory-constrained
//! embedded nodes.
//!
//! A server streams contiguous byte ranges of indexed files to a client that
//! writes them to local storage. The server sends a full window of
//! fixed-size blocks before waiting for acknowledgement; the client recovers
//! any loss with a single selective-retransmit request naming the missing
//! blocks.
//!
//! ## Architecture
//!
//! - **Packet codec**: a fixed, byte-exact little-endian wire layout for the
//!   five packet kinds (RRQ, DATA, RTX, ACK, ERR).
//! - **Peer state machines**: [`client::MtftpClient`] drives a read and
//!   detects loss; [`server::MtftpServer`] answers a request and streams
//!   blocks.
//! - **Host integration**: callers supply [`callbacks::ClientCallbacks`] /
//!   [`callbacks::ServerCallbacks`] implementations for file I/O, packet
//!   transmission, and transfer completion notification.

pub mod bitset;
pub mod callbacks;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod time;

pub use bitset::BitSet;
pub use callbacks::{ClientCallbacks, PacketQueue, ServerCallbacks};
pub use client::MtftpClient;
pub use config::MtftpConfig;
pub use error::{ConfigError, DecodeError, RecvResult};
pub use protocol::{FileIndex, FileOffset, Opcode, Packet, WindowSize};
pub use server::MtftpServer;
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
