//! Client state-machine tests against a `RecordingCallbacks` test double
//! (grounded in `test/helpers.cpp`'s stats-tracking callback structs),
//! plus `MtftpConfig`'s construction-time validation.

use mtftp::client::{ClientState, MtftpClient};
use mtftp::codec::{decode, encode};
use mtftp::protocol::{FileIndex, FileOffset, MAX_BUFFER_BLOCKS, Packet, WindowSize};
use mtftp::time::ManualTimeProvider;
use mtftp::{ClientCallbacks, ConfigError, MtftpConfig, RecvResult};
use std::time::Instant;

#[derive(Default)]
struct RecordingCallbacks {
    sent: Vec<Vec<u8>>,
    written: Vec<(u32, Vec<u8>)>,
    idle_count: u32,
    timeout_count: u32,
    transfer_end_count: u32,
}

impl ClientCallbacks for RecordingCallbacks {
    fn send_packet(&mut self, bytes: &[u8]) {
        self.sent.push(bytes.to_vec());
    }
    fn write_file(&mut self, _file_index: FileIndex, file_offset: FileOffset, data: &[u8]) -> bool {
        self.written.push((file_offset.0, data.to_vec()));
        true
    }
    fn on_idle(&mut self) {
        self.idle_count += 1;
    }
    fn on_timeout(&mut self) {
        self.timeout_count += 1;
    }
    fn on_transfer_end(&mut self) {
        self.transfer_end_count += 1;
    }
}

fn client() -> MtftpClient {
    let config = MtftpConfig::new(4, 4, 8, 512, 1_000_000).unwrap();
    MtftpClient::new(config)
}

fn data(block_no: u16, payload: &[u8]) -> Vec<u8> {
    encode(&Packet::Data {
        block_no,
        payload: payload.to_vec(),
    })
}

#[test]
fn clean_window_then_short_final_block() {
    let mut c = client();
    let mut cb = RecordingCallbacks::default();
    c.begin_read(FileIndex(0), FileOffset(0), WindowSize(4), &mut cb);
    assert_eq!(c.state(), ClientState::Transfer);

    for bn in 0..4u16 {
        let r = c.on_packet_recv(&data(bn, &[1, 2, 3, 4]), &mut cb);
        assert_eq!(r, RecvResult::Ok);
    }
    assert_eq!(c.state(), ClientState::AckSent);
    assert_eq!(cb.written.len(), 4);

    let r = c.on_packet_recv(&data(0, &[1, 2, 3]), &mut cb);
    assert_eq!(r, RecvResult::Ok);
    assert_eq!(c.state(), ClientState::Idle);
    assert_eq!(cb.transfer_end_count, 1);
    assert_eq!(cb.written.last().unwrap().1, vec![1, 2, 3]);
}

#[test]
fn single_loss_triggers_rtx_then_commits_buffered_range() {
    let mut c = client();
    let mut cb = RecordingCallbacks::default();
    c.begin_read(FileIndex(0), FileOffset(0), WindowSize(4), &mut cb);

    c.on_packet_recv(&data(0, &[1, 2, 3, 4]), &mut cb);
    c.on_packet_recv(&data(1, &[5, 6, 7, 8]), &mut cb);
    // block 2 dropped
    c.on_packet_recv(&data(3, &[13, 14, 15, 16]), &mut cb);
    assert_eq!(c.state(), ClientState::AwaitRtx);
    let rtx = cb.sent.last().unwrap();
    assert_eq!(decode(rtx).unwrap(), Packet::Rtx { block_nos: vec![2] });

    c.on_packet_recv(&data(2, &[9, 10, 11, 12]), &mut cb);
    assert_eq!(c.state(), ClientState::AckSent);
    assert_eq!(cb.written.last().unwrap().1, vec![9, 10, 11, 12, 13, 14, 15, 16]);
}

#[test]
fn two_non_adjacent_losses_rtx_in_order() {
    let config = MtftpConfig::new(4, 8, 8, 512, 1_000_000).unwrap();
    let mut c = MtftpClient::new(config);
    let mut cb = RecordingCallbacks::default();
    c.begin_read(FileIndex(0), FileOffset(0), WindowSize(8), &mut cb);

    for bn in [0u16, 1, 2, 4, 6, 7] {
        c.on_packet_recv(&data(bn, &[1, 2, 3, 4]), &mut cb);
    }
    assert_eq!(c.state(), ClientState::AwaitRtx);
    let rtx = cb.sent.last().unwrap();
    assert_eq!(
        decode(rtx).unwrap(),
        Packet::Rtx {
            block_nos: vec![3, 5]
        }
    );
}

#[test]
fn invalid_first_block_after_ack_goes_idle() {
    let mut c = client();
    let mut cb = RecordingCallbacks::default();
    c.begin_read(FileIndex(0), FileOffset(0), WindowSize(4), &mut cb);
    for bn in 0..4u16 {
        c.on_packet_recv(&data(bn, &[1, 2, 3, 4]), &mut cb);
    }
    assert_eq!(c.state(), ClientState::AckSent);

    let r = c.on_packet_recv(&data(2, &[1, 2, 3, 4]), &mut cb);
    assert_eq!(r, RecvResult::BadAfterAck);
    assert_eq!(c.state(), ClientState::Idle);
    assert_eq!(cb.written.len(), 4);
}

#[test]
fn block_beyond_window_is_bad_block_no() {
    let mut c = client();
    let mut cb = RecordingCallbacks::default();
    c.begin_read(FileIndex(0), FileOffset(0), WindowSize(4), &mut cb);
    let r = c.on_packet_recv(&data(7, &[1, 2, 3, 4]), &mut cb);
    assert_eq!(r, RecvResult::BadBlockNo);
    assert_eq!(c.state(), ClientState::Idle);
}

#[test]
fn timeout_fires_idle_and_timeout_callbacks() {
    let config = MtftpConfig::new(4, 4, 8, 512, 100).unwrap();
    let time = std::sync::Arc::new(ManualTimeProvider::new(Instant::now(), 0));
    let mut c = MtftpClient::with_time_provider(config, time.clone());
    let mut cb = RecordingCallbacks::default();
    c.begin_read(FileIndex(0), FileOffset(0), WindowSize(4), &mut cb);

    c.tick(&mut cb);
    assert_eq!(cb.timeout_count, 0);
    assert_eq!(c.state(), ClientState::Transfer);

    time.advance(std::time::Duration::from_micros(200));
    c.tick(&mut cb);
    assert_eq!(cb.timeout_count, 1);
    assert_eq!(cb.idle_count, 1);
    assert_eq!(c.state(), ClientState::Idle);
}

#[test]
fn config_rejects_zero_block_len() {
    assert_eq!(
        MtftpConfig::new(0, 4, 8, 512, 1_000_000),
        Err(ConfigError::ZeroBlockLen)
    );
}

#[test]
fn config_rejects_buffer_smaller_than_window() {
    assert_eq!(
        MtftpConfig::new(240, 8, 4, 512, 1_000_000),
        Err(ConfigError::BufferTooSmall {
            buffer_blocks: 4,
            window_max: 8
        })
    );
}

#[test]
fn config_rejects_buffer_above_ceiling() {
    assert_eq!(
        MtftpConfig::new(240, 4, MAX_BUFFER_BLOCKS + 1, 512, 1_000_000),
        Err(ConfigError::BufferExceedsCeiling(
            MAX_BUFFER_BLOCKS + 1,
            MAX_BUFFER_BLOCKS
        ))
    );
}

#[test]
fn config_derives_rtx_max_from_mtu() {
    let cfg = MtftpConfig::new(240, 4, 8, 512, 1_000_000).unwrap();
    assert_eq!(cfg.rtx_max, 255);
}
