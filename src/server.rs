//! The server sender state machine: accepts a read request, streams a
//! window of blocks, honours a selective retransmit request, and advances
//! its file offset on each clean ACK.

use crate::callbacks::ServerCallbacks;
use crate::codec::{decode, encode};
use crate::config::MtftpConfig;
use crate::error::{DecodeError, RecvResult};
use crate::protocol::{ERR_FILE_READ_FAILED, FileIndex, FileOffset, Packet};
use crate::time::{SystemTimeProvider, TimeProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Transfer,
    Rtx,
    AwaitResponse,
}

/// Streams one file transfer at a time to an [`crate::client::MtftpClient`].
pub struct MtftpServer<T: TimeProvider = SystemTimeProvider> {
    config: MtftpConfig,
    time: T,
    state: ServerState,
    file_index: FileIndex,
    file_offset: u32,
    window_size: u16,
    block_no: u16,
    largest_block_no: i32,
    len_largest: u16,
    rtx_block_nos: Vec<u16>,
    rtx_index: usize,
    num_rtx: usize,
    time_last_packet: std::time::Instant,
}

impl MtftpServer<SystemTimeProvider> {
    pub fn new(config: MtftpConfig) -> Self {
        Self::with_time_provider(config, SystemTimeProvider)
    }
}

impl<T: TimeProvider> MtftpServer<T> {
    pub fn with_time_provider(config: MtftpConfig, time: T) -> Self {
        let now = time.now_instant();
        Self {
            config,
            time,
            state: ServerState::Idle,
            file_index: FileIndex(0),
            file_offset: 0,
            window_size: 0,
            block_no: 0,
            largest_block_no: -1,
            len_largest: 0,
            rtx_block_nos: Vec::new(),
            rtx_index: 0,
            num_rtx: 0,
            time_last_packet: now,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    fn on_window_start(&mut self) {
        self.block_no = 0;
        self.largest_block_no = -1;
        self.len_largest = 0;
    }

    /// Accepts RRQ in `IDLE`, RTX and ACK in `AWAIT_RESPONSE`; any other
    /// combination of opcode and state returns `BadState`.
    pub fn on_packet_recv<C: ServerCallbacks>(&mut self, bytes: &[u8], cb: &mut C) -> RecvResult {
        let packet = match decode(bytes) {
            Ok(p) => p,
            Err(DecodeError::BadLength(_)) => return RecvResult::BadLength,
            Err(DecodeError::BadOpcode(_)) => return RecvResult::BadOpcode,
        };
        let result = match (self.state, &packet) {
            (
                ServerState::Idle,
                Packet::Rrq {
                    file_index,
                    file_offset,
                    window_size,
                },
            ) => {
                self.file_index = *file_index;
                self.file_offset = file_offset.0;
                self.window_size = window_size.0;
                self.on_window_start();
                self.state = ServerState::Transfer;
                RecvResult::Ok
            }
            (ServerState::AwaitResponse, Packet::Rtx { block_nos }) => {
                let n = block_nos.len().min(self.config.rtx_max);
                self.rtx_block_nos = block_nos[..n].to_vec();
                self.rtx_index = 0;
                self.num_rtx = n;
                self.state = ServerState::Rtx;
                RecvResult::Ok
            }
            (ServerState::AwaitResponse, Packet::Ack { block_no }) => {
                self.on_ack(*block_no);
                RecvResult::Ok
            }
            _ => RecvResult::BadState,
        };
        if result == RecvResult::Ok {
            self.time_last_packet = self.time.now_instant();
        }
        result
    }

    fn on_ack(&mut self, ack_block_no: u16) {
        if ack_block_no == self.block_no && self.len_largest < self.config.block_len {
            self.state = ServerState::Idle;
            return;
        }
        let block_len = self.config.block_len as u32;
        let mut advance = ack_block_no as u32 * block_len;
        advance += if ack_block_no as i32 == self.largest_block_no {
            self.len_largest as u32
        } else {
            block_len
        };
        self.file_offset += advance;
        self.on_window_start();
        self.state = ServerState::Transfer;
    }

    /// Reads and emits block `bn`. On a `read_file` failure, emits
    /// `ERR(FILE_READ_FAILED)` and returns `None`; the caller transitions to
    /// `IDLE`.
    fn send_block<C: ServerCallbacks>(&mut self, bn: u16, cb: &mut C) -> Option<u16> {
        let block_len = self.config.block_len;
        let mut buf = vec![0u8; block_len as usize];
        let offset = self.file_offset + bn as u32 * block_len as u32;
        match cb.read_file(self.file_index, FileOffset(offset), &mut buf, block_len) {
            Some(br) => {
                let br = br.min(block_len);
                cb.send_packet(&encode(&Packet::Data {
                    block_no: bn,
                    payload: buf[..br as usize].to_vec(),
                }));
                if bn as i32 > self.largest_block_no {
                    self.largest_block_no = bn as i32;
                    self.len_largest = br;
                }
                Some(br)
            }
            None => {
                cb.send_packet(&encode(&Packet::Err {
                    err_kind: ERR_FILE_READ_FAILED,
                }));
                None
            }
        }
    }

    /// Drives transmission and timeout detection. Must be called frequently
    /// while not `IDLE`.
    pub fn tick<C: ServerCallbacks>(&mut self, cb: &mut C) {
        if self.state == ServerState::Idle {
            return;
        }
        let elapsed = self.time.now_instant().duration_since(self.time_last_packet);
        if elapsed.as_micros() as u64 > self.config.timeout_us {
            cb.on_timeout();
            self.state = ServerState::Idle;
            cb.on_idle();
            return;
        }

        match self.state {
            ServerState::Transfer => {
                let bn = self.block_no;
                match self.send_block(bn, cb) {
                    None => self.state = ServerState::Idle,
                    Some(br) => {
                        self.time_last_packet = self.time.now_instant();
                        if br < self.config.block_len || bn == self.window_size.saturating_sub(1) {
                            self.state = ServerState::AwaitResponse;
                        } else {
                            self.block_no += 1;
                        }
                    }
                }
            }
            ServerState::Rtx => {
                let bn = self.rtx_block_nos[self.rtx_index];
                match self.send_block(bn, cb) {
                    None => self.state = ServerState::Idle,
                    Some(_) => {
                        self.time_last_packet = self.time.now_instant();
                        self.rtx_index += 1;
                        if self.rtx_index >= self.num_rtx {
                            self.state = ServerState::AwaitResponse;
                        }
                    }
                }
            }
            ServerState::Idle | ServerState::AwaitResponse => {}
        }
    }
}
