//! The single-threaded `mio` reactor: accepts connections, drives their
//! readiness events, and ticks a periodic housekeeping callback between
//! polls.

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::router::Router;
use kvforge_core::Result;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token as MioToken};
use socket2::{Domain, Socket, Type};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Reserved for the listening socket; connection tokens start at 1.
const LISTENER: MioToken = MioToken(0);

/// Binds a listening socket through `socket2` so `SO_REUSEADDR` is set
/// before `bind`, then hands it to `mio` as a non-blocking listener.
fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(TcpListener::from_std(socket.into()))
}

/// Installs a `ctrlc` handler that flips an `AtomicBool` rather than
/// terminating the process directly, so the event loop gets a chance to
/// flush the append-only log and close sockets before exiting.
fn install_shutdown_signal() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| kvforge_core::Error::Config(format!("failed to install signal handler: {e}")))?;
    Ok(shutdown)
}

/// Runs the accept/readiness loop until a shutdown signal arrives.
///
/// `router` already has the append-only log replayed and open; this
/// function owns it for the lifetime of the server and drops it (closing
/// the log file) on the way out.
pub fn run(config: &ServerConfig, mut router: Router) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| kvforge_core::Error::Config(format!("invalid listen address: {e}")))?;

    let mut listener = bind_listener(addr)?;
    log::info!("listening on {addr}");

    let mut poll = Poll::new()?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)?;

    let mut events = Events::with_capacity(1024);
    let mut connections: HashMap<usize, Connection> = HashMap::new();
    let mut next_token = 1usize;

    let shutdown = install_shutdown_signal()?;
    let poll_timeout = Duration::from_millis(config.poll_timeout_ms);

    while !shutdown.load(Ordering::SeqCst) {
        match poll.poll(&mut events, Some(poll_timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }

        if events.is_empty() {
            log::trace!("poll tick: {} connections open", connections.len());
            continue;
        }

        for event in events.iter() {
            if event.token() == LISTENER {
                accept_all(&mut listener, &poll, &mut connections, &mut next_token)?;
                continue;
            }

            let token = event.token().0;
            let Some(conn) = connections.get_mut(&token) else {
                continue;
            };

            if event.is_readable() {
                let _ = conn.on_readable(&mut router);
            }
            if !conn.is_closed() && event.is_writable() {
                let _ = conn.on_writable();
            }

            if conn.is_closed() {
                if let Some(mut conn) = connections.remove(&token) {
                    let _ = poll.registry().deregister(conn.stream_mut());
                }
            } else {
                let interests = conn.interests();
                let _ = poll
                    .registry()
                    .reregister(conn.stream_mut(), MioToken(token), interests);
            }
        }
    }

    log::info!("shutting down, {} connections open", connections.len());
    Ok(())
}

fn accept_all(
    listener: &mut TcpListener,
    poll: &Poll,
    connections: &mut HashMap<usize, Connection>,
    next_token: &mut usize,
) -> Result<()> {
    loop {
        match listener.accept() {
            Ok((mut stream, peer)) => {
                let token = *next_token;
                *next_token += 1;
                poll.registry()
                    .register(&mut stream, MioToken(token), Interest::READABLE)?;
                log::debug!("accepted connection {peer} as token {token}");
                connections.insert(token, Connection::new(stream));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
