//! Drives a real client and server over two loopback UDP sockets, transferring
//! a file given on the command line, and prints progress via `tracing`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::UdpSocket;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mtftp::protocol::{FileIndex, FileOffset, WindowSize};
use mtftp::{ClientCallbacks, MtftpClient, MtftpConfig, MtftpServer, ServerCallbacks};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Transfers a file over MTFTP between two loopback UDP sockets")]
struct Args {
    /// File to serve.
    input: PathBuf,
    /// Where to write the transferred copy.
    output: PathBuf,
    /// Bytes of payload per DATA block.
    #[arg(long, default_value_t = 240)]
    block_len: u16,
    /// Blocks per window.
    #[arg(long, default_value_t = 8)]
    window_size: u16,
    /// Datagram MTU, used to derive RTX_MAX.
    #[arg(long, default_value_t = 512)]
    mtu: usize,
    /// Inactivity timeout, in microseconds.
    #[arg(long, default_value_t = 2_000_000)]
    timeout_us: u64,
}

struct ServerSide {
    socket: UdpSocket,
    file: File,
}

impl ServerCallbacks for ServerSide {
    fn send_packet(&mut self, bytes: &[u8]) {
        let _ = self.socket.send(bytes);
    }

    fn read_file(
        &mut self,
        _file_index: FileIndex,
        file_offset: FileOffset,
        buf: &mut [u8],
        want: u16,
    ) -> Option<u16> {
        self.file.seek(SeekFrom::Start(file_offset.0 as u64)).ok()?;
        let mut taken = self.file.try_clone().ok()?.take(want as u64);
        let n = taken.read(buf).ok()?;
        Some(n as u16)
    }
}

struct ClientSide {
    socket: UdpSocket,
    file: File,
    bytes_written: u64,
}

impl ClientCallbacks for ClientSide {
    fn send_packet(&mut self, bytes: &[u8]) {
        let _ = self.socket.send(bytes);
    }

    fn write_file(&mut self, _file_index: FileIndex, file_offset: FileOffset, data: &[u8]) -> bool {
        if self.file.seek(SeekFrom::Start(file_offset.0 as u64)).is_err() {
            return false;
        }
        if self.file.write_all(data).is_err() {
            return false;
        }
        self.bytes_written += data.len() as u64;
        true
    }

    fn on_transfer_end(&mut self) {
        info!(bytes_written = self.bytes_written, "transfer complete");
    }

    fn on_timeout(&mut self) {
        tracing::warn!("client timed out waiting for data");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .compact()
        .init();

    let args = Args::parse();

    let server_socket = UdpSocket::bind("127.0.0.1:0").expect("bind server socket");
    let client_socket = UdpSocket::bind("127.0.0.1:0").expect("bind client socket");
    server_socket
        .connect(client_socket.local_addr().unwrap())
        .expect("connect server to client");
    client_socket
        .connect(server_socket.local_addr().unwrap())
        .expect("connect client to server");
    server_socket.set_nonblocking(true).unwrap();
    client_socket.set_nonblocking(true).unwrap();

    let input_len = std::fs::metadata(&args.input).expect("stat input file").len();
    let buffer_blocks = (args.window_size as usize).max(1) * 2;

    let config = MtftpConfig::new(
        args.block_len,
        args.window_size,
        buffer_blocks,
        args.mtu,
        args.timeout_us,
    )
    .expect("valid config");

    let mut server = MtftpServer::new(config);
    let mut client = MtftpClient::new(config);

    let mut server_side = ServerSide {
        socket: server_socket,
        file: File::open(&args.input).expect("open input file"),
    };
    let mut client_side = ClientSide {
        socket: client_socket,
        file: File::create(&args.output).expect("create output file"),
        bytes_written: 0,
    };

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        input_len,
        "starting transfer"
    );

    client.begin_read(FileIndex(0), FileOffset(0), WindowSize(args.window_size), &mut client_side);

    let mut recv_buf = [0u8; 65536];
    loop {
        if client.state() == mtftp::client::ClientState::Idle {
            break;
        }

        server.tick(&mut server_side);
        client.tick(&mut client_side);

        if let Ok(n) = server_side.socket.recv(&mut recv_buf) {
            server.on_packet_recv(&recv_buf[..n], &mut server_side);
        }
        if let Ok(n) = client_side.socket.recv(&mut recv_buf) {
            client.on_packet_recv(&recv_buf[..n], &mut client_side);
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}
