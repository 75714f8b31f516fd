//! Per-connection state: receive/send buffers and the read-ready /
//! write-ready handling that drives the command router.
//!
//! ```text
//! ACCEPTED -> READING <-> RESPONDING -> CLOSED
//! ```
//! A fatal I/O error, EOF with an empty `recv_buf`, or a protocol decode
//! error moves a connection to CLOSED; any buffered response bytes are
//! discarded along with it.

use crate::frame;
use crate::router::Router;
use bytes::{Buf, BytesMut};
use kvforge_core::Error;
use mio::net::TcpStream;
use mio::Interest;
use std::io::{self, Read, Write};

/// Bytes read from the socket per read-ready event. Unspecified by the
/// wire format; chosen generously enough that a single readiness
/// notification usually drains a full request.
const MAX_MSG: usize = 64 * 1024;

pub struct Connection {
    stream: TcpStream,
    recv_buf: BytesMut,
    send_buf: BytesMut,
    closed: bool,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            recv_buf: BytesMut::new(),
            send_buf: BytesMut::new(),
            closed: false,
        }
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Which readiness this connection currently wants registered: always
    /// read, write only while there is buffered output.
    pub fn interests(&self) -> Interest {
        if self.send_buf.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }

    /// Drains as much as the socket offers, decodes every complete frame
    /// it finds, and queues each response. Returns `Ok(())` even when the
    /// connection has been marked closed — callers check [`Self::is_closed`].
    pub fn on_readable(&mut self, router: &mut Router) -> io::Result<()> {
        loop {
            let mut chunk = [0u8; MAX_MSG];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    if self.recv_buf.is_empty() {
                        self.closed = true;
                    }
                    break;
                }
                Ok(n) => {
                    self.recv_buf.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("connection read failed: {e}");
                    self.closed = true;
                    return Err(e);
                }
            }
        }

        loop {
            match frame::decode(&self.recv_buf) {
                Ok(Some((args, consumed))) => {
                    self.recv_buf.advance(consumed);
                    let (status, payload) = router.dispatch(&args);
                    self.send_buf.unsplit(frame::encode(status, &payload));
                }
                Ok(None) => break,
                Err(Error::Protocol(msg)) => {
                    log::warn!("closing connection on malformed frame: {msg}");
                    self.closed = true;
                    self.send_buf.clear();
                    break;
                }
                Err(e) => {
                    log::warn!("closing connection on decode error: {e}");
                    self.closed = true;
                    self.send_buf.clear();
                    break;
                }
            }
        }

        Ok(())
    }

    /// Writes as much of `send_buf` as the socket currently accepts.
    pub fn on_writable(&mut self) -> io::Result<()> {
        while !self.send_buf.is_empty() {
            match self.stream.write(&self.send_buf) {
                Ok(0) => break,
                Ok(n) => {
                    self.send_buf.advance(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("connection write failed: {e}");
                    self.closed = true;
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvforge_core::SyncMode;
    use kvforge_store::persistence::AppendLog;
    use kvforge_store::UnifiedStore;
    use mio::net::TcpListener;
    use std::io::Write as _;
    use std::net::TcpStream as StdTcpStream;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_router() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let log = AppendLog::open(dir.path().join("t.aof"), SyncMode::None).unwrap();
        (Router::new(UnifiedStore::new(100), log), dir)
    }

    fn request_bytes(args: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(args.len() as u32).to_be_bytes());
        for a in args {
            buf.extend_from_slice(&(a.len() as u32).to_be_bytes());
            buf.extend_from_slice(a.as_bytes());
        }
        buf
    }

    /// Accepts one loopback connection for a test, pairing it with the
    /// standard-library client socket that dialed it.
    fn accept_loopback_pair() -> (Connection, StdTcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = StdTcpStream::connect(addr).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        (Connection::new(accepted), client)
    }

    #[test]
    fn end_to_end_request_produces_queued_response() {
        let (mut conn, mut client) = accept_loopback_pair();
        client.write_all(&request_bytes(&["SET", "k", "v"])).unwrap();

        let (mut router, _dir) = test_router();
        // A fresh loopback write usually lands before the first read, but
        // give the kernel a few retries rather than assume it always does.
        for _ in 0..50 {
            conn.on_readable(&mut router).unwrap();
            if !conn.send_buf.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!conn.send_buf.is_empty());
    }

    #[test]
    fn interests_drop_writable_once_send_buf_is_empty() {
        let (mut conn, _client) = accept_loopback_pair();
        assert_eq!(conn.interests(), Interest::READABLE);
        conn.send_buf.extend_from_slice(b"queued");
        assert_eq!(conn.interests(), Interest::READABLE | Interest::WRITABLE);
    }

    #[test]
    fn malformed_frame_closes_the_connection() {
        let (mut conn, mut client) = accept_loopback_pair();
        // NArgs over the protocol limit.
        client
            .write_all(&((kvforge_core::MAX_ARGS as u32) + 1).to_be_bytes())
            .unwrap();

        let (mut router, _dir) = test_router();
        for _ in 0..50 {
            conn.on_readable(&mut router).unwrap();
            if conn.is_closed() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(conn.is_closed());
    }
}
