// minimal single-peer event loop driving the engine over a real UDP socket
// with process stdin/stdout as the local stream. src/bin/client.rs and
// src/bin/server.rs are thin wrappers around run().

use std::io::{self, Read, Write};
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use log::{info, warn};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags};

use crate::codec::Packet;
use crate::err::Error;
use crate::io::{DatagramSink, LocalInput, LocalOutput};
use crate::registry::SessionRegistry;
use crate::session::Session;

struct UdpDatagramSink<'a> {
    socket: &'a UdpSocket,
    peer: SocketAddr,
}

impl DatagramSink for UdpDatagramSink<'_> {
    fn send_datagram(&mut self, bytes: &[u8]) -> Result<usize, ()> {
        self.socket.send_to(bytes, self.peer).map_err(|e| {
            warn!("send_to {}: {e}", self.peer);
        })
    }
}

struct StdinInput;

impl LocalInput for StdinInput {
    fn read_input(&mut self, buf: &mut [u8]) -> Option<usize> {
        match io::stdin().lock().read(buf) {
            Ok(0) => None,
            Ok(n) => Some(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Some(0),
            Err(e) => {
                warn!("stdin read error: {e}");
                Some(0)
            }
        }
    }
}

struct StdoutOutput;

impl LocalOutput for StdoutOutput {
    fn output_space(&self) -> usize {
        // treated as unbounded for this demo driver
        Packet::MAX_PAYLOAD
    }

    fn write_output(&mut self, buf: &[u8]) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(buf) {
            warn!("stdout write error: {e}");
        }
        let _ = stdout.flush();
    }
}

fn set_nonblocking(fd: std::os::fd::RawFd) -> Result<(), Error> {
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

// drives a single session against known_peer (client mode, peer known up
// front) or against whichever peer's datagram arrives first (server mode,
// known_peer is None). returns once that session tears down.
pub fn run(
    local_addr: SocketAddr,
    known_peer: Option<SocketAddr>,
    window: usize,
    timeout: Duration,
) -> Result<(), Error> {
    let socket = UdpSocket::bind(local_addr)?;
    socket.set_nonblocking(true)?;
    set_nonblocking(io::stdin().as_raw_fd())?;

    info!("listening on {} (window={window}, timeout={timeout:?})", socket.local_addr()?);

    let mut registry: SessionRegistry<SocketAddr> = SessionRegistry::new();
    let mut stdin_input = StdinInput;
    let mut stdout_output = StdoutOutput;
    let mut active_peer = known_peer;

    if let Some(peer) = known_peer {
        registry.insert(peer, Session::new(window, timeout));
    }

    let tick_interval = (timeout / 5).max(Duration::from_millis(10));
    let mut recv_buf = vec![0u8; Packet::MAX_LEN];

    loop {
        let mut fds = [
            PollFd::new(socket.as_raw_fd(), PollFlags::POLLIN),
            PollFd::new(io::stdin().as_raw_fd(), PollFlags::POLLIN),
        ];
        poll(&mut fds, tick_interval.as_millis() as i32)?;

        let socket_readable = fds[0]
            .revents()
            .is_some_and(|e| e.contains(PollFlags::POLLIN));
        let stdin_readable = fds[1]
            .revents()
            .is_some_and(|e| e.contains(PollFlags::POLLIN));

        if socket_readable {
            loop {
                match socket.recv_from(&mut recv_buf) {
                    Ok((n, peer)) => {
                        if !registry.contains(&peer) {
                            if known_peer.is_some() {
                                // Client mode: only the configured peer is valid.
                                continue;
                            }
                            if active_peer.is_some() {
                                // Single-peer demo driver: ignore other sources.
                                continue;
                            }
                            info!("accepted new peer {peer}");
                            registry.insert(peer, Session::new(window, timeout));
                            active_peer = Some(peer);
                        }

                        let mut sink = UdpDatagramSink { socket: &socket, peer };
                        if let Some(session) = registry.get_mut(&peer) {
                            session.on_datagram_arrived(
                                &recv_buf[..n],
                                &mut stdin_input,
                                &mut stdout_output,
                                &mut sink,
                            );
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!("recv_from error: {e}");
                        break;
                    }
                }
            }
        }

        if stdin_readable {
            if let Some(peer) = active_peer {
                let mut sink = UdpDatagramSink { socket: &socket, peer };
                if let Some(session) = registry.get_mut(&peer) {
                    session.on_input_readable(&mut stdin_input, &mut sink);
                }
            }
        }

        registry.on_tick(Instant::now(), |peer| {
            Box::new(UdpDatagramSink {
                socket: &socket,
                peer: *peer,
            })
        });

        if active_peer.is_some() && registry.is_empty() {
            info!("session torn down, exiting");
            return Ok(());
        }
    }
}
