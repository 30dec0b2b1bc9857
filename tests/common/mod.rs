//! Shared in-process transport test double used by the integration and
//! property tests: a selectively-lossy, one-directional channel plus the
//! callback implementations needed to drive a full client/server transfer.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use mtftp::protocol::{FileIndex, FileOffset};
use mtftp::{ClientCallbacks, MtftpClient, MtftpConfig, MtftpServer, ServerCallbacks};

#[derive(Default)]
pub struct Wire {
    pub queue: VecDeque<Vec<u8>>,
    pub sent_count: usize,
    pub drop_indices: Vec<usize>,
}

impl Wire {
    pub fn send(&mut self, bytes: &[u8]) {
        let idx = self.sent_count;
        self.sent_count += 1;
        if self.drop_indices.contains(&idx) {
            return;
        }
        self.queue.push_back(bytes.to_vec());
    }
}

pub struct ServerSide {
    pub to_client: Rc<RefCell<Wire>>,
    pub file: Vec<u8>,
}

impl ServerCallbacks for ServerSide {
    fn send_packet(&mut self, bytes: &[u8]) {
        self.to_client.borrow_mut().send(bytes);
    }

    fn read_file(
        &mut self,
        _file_index: FileIndex,
        file_offset: FileOffset,
        buf: &mut [u8],
        want: u16,
    ) -> Option<u16> {
        let start = file_offset.0 as usize;
        if start >= self.file.len() {
            return Some(0);
        }
        let end = (start + want as usize).min(self.file.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.file[start..end]);
        Some(n as u16)
    }
}

#[derive(Default)]
pub struct ClientSide {
    pub to_server: Option<Rc<RefCell<Wire>>>,
    pub received: Vec<u8>,
    pub transfer_ended: bool,
}

impl ClientCallbacks for ClientSide {
    fn send_packet(&mut self, bytes: &[u8]) {
        self.to_server.as_ref().unwrap().borrow_mut().send(bytes);
    }

    fn write_file(&mut self, _file_index: FileIndex, file_offset: FileOffset, data: &[u8]) -> bool {
        let end = file_offset.0 as usize + data.len();
        if self.received.len() < end {
            self.received.resize(end, 0);
        }
        self.received[file_offset.0 as usize..end].copy_from_slice(data);
        true
    }

    fn on_transfer_end(&mut self) {
        self.transfer_ended = true;
    }
}

pub fn make_pair(
    block_len: u16,
    window_size: u16,
) -> (
    MtftpClient,
    ClientSide,
    MtftpServer,
    ServerSide,
    Rc<RefCell<Wire>>,
    Rc<RefCell<Wire>>,
) {
    let config =
        MtftpConfig::new(block_len, window_size, (window_size as usize) * 2, 512, 1_000_000).unwrap();
    let to_client = Rc::new(RefCell::new(Wire::default()));
    let to_server = Rc::new(RefCell::new(Wire::default()));
    let client = MtftpClient::new(config);
    let server = MtftpServer::new(config);
    let client_cb = ClientSide {
        to_server: Some(to_server.clone()),
        ..Default::default()
    };
    let server_cb = ServerSide {
        to_client: to_client.clone(),
        file: Vec::new(),
    };
    (client, client_cb, server, server_cb, to_client, to_server)
}

/// Drains both wires alternately and ticks both endpoints each round, until
/// the client returns to `IDLE` after a completed transfer, or a round
/// budget is exhausted.
pub fn run_transfer(
    client: &mut MtftpClient,
    client_cb: &mut ClientSide,
    server: &mut MtftpServer,
    server_cb: &mut ServerSide,
    to_client: &Rc<RefCell<Wire>>,
    to_server: &Rc<RefCell<Wire>>,
) {
    for _ in 0..10_000 {
        server.tick(server_cb);
        client.tick(client_cb);

        while let Some(pkt) = to_server.borrow_mut().queue.pop_front() {
            server.on_packet_recv(&pkt, server_cb);
        }
        while let Some(pkt) = to_client.borrow_mut().queue.pop_front() {
            client.on_packet_recv(&pkt, client_cb);
        }

        if client.state() == mtftp::client::ClientState::Idle && client_cb.transfer_ended {
            return;
        }
    }
    panic!("transfer did not complete within the round budget");
}
