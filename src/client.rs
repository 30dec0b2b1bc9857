//! The client receiver state machine: drives a read, receives a window,
//! detects loss via a sliding reordering buffer, and commits bytes to
//! storage exactly once, in block order.

use crate::bitset::BitSet;
use crate::callbacks::ClientCallbacks;
use crate::codec::{decode, encode};
use crate::config::MtftpConfig;
use crate::error::{DecodeError, RecvResult};
use crate::protocol::{BITSET_WORDS, FileIndex, FileOffset, Packet, WindowSize};
use crate::time::{SystemTimeProvider, TimeProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Transfer,
    AwaitRtx,
    AckSent,
}

/// Receives one file transfer at a time from an [`crate::server::MtftpServer`].
pub struct MtftpClient<T: TimeProvider = SystemTimeProvider> {
    config: MtftpConfig,
    time: T,
    state: ClientState,
    file_index: FileIndex,
    file_offset: u32,
    window_size: u16,
    last_in_order_block: i32,
    largest_block_no: i32,
    len_largest: u16,
    buffer_base: i32,
    buffer: Vec<u8>,
    missing: BitSet<BITSET_WORDS>,
    num_missing: usize,
    time_last_packet: std::time::Instant,
}

impl MtftpClient<SystemTimeProvider> {
    pub fn new(config: MtftpConfig) -> Self {
        Self::with_time_provider(config, SystemTimeProvider)
    }
}

impl<T: TimeProvider> MtftpClient<T> {
    pub fn with_time_provider(config: MtftpConfig, time: T) -> Self {
        let buffer = vec![0u8; config.buffer_blocks * config.block_len as usize];
        let now = time.now_instant();
        Self {
            config,
            time,
            state: ClientState::Idle,
            file_index: FileIndex(0),
            file_offset: 0,
            window_size: 0,
            last_in_order_block: -1,
            largest_block_no: -1,
            len_largest: 0,
            buffer_base: -1,
            buffer,
            missing: BitSet::new(),
            num_missing: 0,
            time_last_packet: now,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Starts a read of `file_index` at `file_offset`. Only valid in `IDLE`;
    /// a no-op (logged) in any other state.
    pub fn begin_read<C: ClientCallbacks>(
        &mut self,
        file_index: FileIndex,
        file_offset: FileOffset,
        window_size: WindowSize,
        cb: &mut C,
    ) {
        if self.state != ClientState::Idle {
            tracing::warn!(state = ?self.state, "begin_read called while not idle, ignoring");
            return;
        }
        self.file_index = file_index;
        self.file_offset = file_offset.0;
        self.window_size = window_size.0;
        self.on_window_start();
        self.state = ClientState::Transfer;
        cb.send_packet(&encode(&Packet::Rrq {
            file_index,
            file_offset,
            window_size,
        }));
        self.time_last_packet = self.time.now_instant();
    }

    fn on_window_start(&mut self) {
        self.last_in_order_block = -1;
        self.largest_block_no = -1;
        self.len_largest = 0;
        self.buffer_base = -1;
        self.missing.clear();
        self.num_missing = 0;
    }

    /// Feeds one received datagram to the state machine.
    pub fn on_packet_recv<C: ClientCallbacks>(&mut self, bytes: &[u8], cb: &mut C) -> RecvResult {
        if self.state == ClientState::Idle {
            return RecvResult::BadState;
        }
        let packet = match decode(bytes) {
            Ok(p) => p,
            Err(DecodeError::BadLength(_)) => return RecvResult::BadLength,
            Err(DecodeError::BadOpcode(_)) => return RecvResult::BadOpcode,
        };
        let result = match packet {
            Packet::Data { block_no, payload } => self.on_data(block_no, &payload, cb),
            Packet::Err { .. } => {
                self.state = ClientState::Idle;
                cb.on_idle();
                RecvResult::Ok
            }
            Packet::Rrq { .. } | Packet::Rtx { .. } | Packet::Ack { .. } => RecvResult::BadState,
        };
        if result == RecvResult::Ok {
            self.time_last_packet = self.time.now_instant();
        }
        result
    }

    fn on_data<C: ClientCallbacks>(&mut self, block_no: u16, payload: &[u8], cb: &mut C) -> RecvResult {
        let len_block = payload.len() as u16;

        if self.state == ClientState::AckSent {
            if block_no != 0 {
                self.state = ClientState::Idle;
                return RecvResult::BadAfterAck;
            }
            self.on_window_start();
            self.state = ClientState::Transfer;
        }

        if block_no >= self.window_size {
            self.state = ClientState::Idle;
            return RecvResult::BadBlockNo;
        }

        if block_no as i32 > self.largest_block_no {
            self.largest_block_no = block_no as i32;
            self.len_largest = len_block;
        }

        if self.state == ClientState::Transfer && self.num_missing == 0 {
            if block_no as i32 == self.last_in_order_block + 1 {
                if !self.commit(payload, cb) {
                    return RecvResult::Ok;
                }
                self.last_in_order_block = block_no as i32;
                return self.maybe_end_window(len_block, block_no, cb);
            }
            self.buffer_base = self.last_in_order_block + 1;
        }

        let offset_in_buffer = block_no as i32 - self.buffer_base;
        if offset_in_buffer < 0 || offset_in_buffer as usize >= self.config.buffer_blocks {
            self.state = ClientState::Idle;
            return RecvResult::BadBlockNo;
        }
        let slot = offset_in_buffer as usize;
        let block_len = self.config.block_len as usize;
        self.buffer[slot * block_len..slot * block_len + payload.len()].copy_from_slice(payload);

        if self.state == ClientState::AwaitRtx {
            if !self.missing.get(slot) {
                self.state = ClientState::Idle;
                return RecvResult::BadBlockNo;
            }
            self.missing.unset(slot);
            self.num_missing -= 1;
        } else {
            for b in (self.last_in_order_block + 1)..(block_no as i32) {
                let gap_slot = (b - self.buffer_base) as usize;
                if self.missing.set(gap_slot) {
                    self.num_missing += 1;
                }
            }
            self.last_in_order_block = block_no as i32;
        }

        self.maybe_end_window(len_block, block_no, cb)
    }

    /// Commits `payload` at the running `file_offset`, advancing it on
    /// success. On failure, aborts the transfer locally per the error
    /// handling design (a failed write is never surfaced on the wire).
    fn commit<C: ClientCallbacks>(&mut self, payload: &[u8], cb: &mut C) -> bool {
        if !cb.write_file(self.file_index, FileOffset(self.file_offset), payload) {
            tracing::warn!(
                file_index = self.file_index.0,
                file_offset = self.file_offset,
                "write_file failed, aborting transfer"
            );
            self.state = ClientState::Idle;
            cb.on_idle();
            return false;
        }
        self.file_offset += payload.len() as u32;
        true
    }

    fn maybe_end_window<C: ClientCallbacks>(
        &mut self,
        len_block: u16,
        block_no: u16,
        cb: &mut C,
    ) -> RecvResult {
        match self.state {
            ClientState::Transfer => {
                if len_block < self.config.block_len || block_no == self.window_size.saturating_sub(1) {
                    self.on_window_end(cb);
                }
                RecvResult::Ok
            }
            ClientState::AwaitRtx => {
                if self.num_missing == 0 {
                    let block_len = self.config.block_len as usize;
                    let commit_len =
                        (self.largest_block_no - self.buffer_base) as usize * block_len
                            + self.len_largest as usize;
                    if self.commit(&self.buffer[..commit_len].to_vec(), cb) {
                        self.last_in_order_block = self.largest_block_no;
                        self.on_window_end(cb);
                    }
                }
                RecvResult::Ok
            }
            _ => RecvResult::Ok,
        }
    }

    fn on_window_end<C: ClientCallbacks>(&mut self, cb: &mut C) {
        if self.num_missing > 0 {
            let block_nos = self.collect_missing_block_nos();
            cb.send_packet(&encode(&Packet::Rtx { block_nos }));
            self.state = ClientState::AwaitRtx;
        } else {
            let last_in_order_block = self.last_in_order_block.max(0) as u16;
            cb.send_packet(&encode(&Packet::Ack {
                block_no: last_in_order_block,
            }));
            if self.len_largest < self.config.block_len {
                self.state = ClientState::Idle;
                cb.on_transfer_end();
            } else {
                self.state = ClientState::AckSent;
            }
        }
    }

    /// Block numbers currently marked missing, in ascending order: block
    /// numbers only ever enter `missing` in increasing order within one
    /// window, so a low-to-high scan of the bitset reproduces the insertion
    /// order the wire's RTX packing requires.
    fn collect_missing_block_nos(&self) -> Vec<u16> {
        let mut result = Vec::with_capacity(self.num_missing);
        let mut idx = 0usize;
        let limit = self.config.buffer_blocks;
        while let Some(found) = self.missing.next_one(idx, limit) {
            result.push((self.buffer_base + found as i32) as u16);
            idx = found + 1;
        }
        result
    }

    /// Drives timeout detection. Must be called frequently while not `IDLE`.
    pub fn tick<C: ClientCallbacks>(&mut self, cb: &mut C) {
        if self.state == ClientState::Idle {
            return;
        }
        let elapsed = self.time.now_instant().duration_since(self.time_last_packet);
        if elapsed.as_micros() as u64 > self.config.timeout_us {
            cb.on_timeout();
            self.state = ClientState::Idle;
            cb.on_idle();
        }
    }
}
