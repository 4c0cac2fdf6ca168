//! TCP server for hosting rooms
//!
//! One thread per connection reads requests and dispatches them straight
//! into the shared [`Registry`]. Replies and broadcasts go out through the
//! [`Hub`], which owns the writing half of every live connection.

use super::dispatch::{self, Delivery, Outbound};
use super::peer::Peer;
use super::protocol::Message;
use crate::config::Config;
use crate::game::ConnectionId;
use crate::registry::Registry;
use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Writing halves of all live connections
#[derive(Default)]
struct Hub {
    peers: Mutex<HashMap<ConnectionId, Peer>>,
}

impl Hub {
    fn peers(&self) -> MutexGuard<'_, HashMap<ConnectionId, Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, peer: Peer) {
        self.peers().insert(peer.id, peer);
    }

    fn remove(&self, id: ConnectionId) -> Option<Peer> {
        self.peers().remove(&id)
    }

    /// Send one delivery (serializes once)
    fn deliver(&self, delivery: &Delivery) {
        let bytes = match delivery.message.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode message");
                return;
            }
        };
        let peers = self.peers();
        for id in &delivery.to {
            // Connections that closed in the meantime are skipped
            if let Some(peer) = peers.get(id) {
                let _ = peer.send_raw(bytes.clone());
            }
        }
    }
}

/// State shared by every connection thread
struct Shared {
    registry: Arc<Registry>,
    hub: Hub,
    reveal_delay: Duration,
}

impl Shared {
    fn send(self: &Arc<Self>, outbound: Outbound) {
        for delivery in &outbound.immediate {
            self.hub.deliver(delivery);
        }
        if outbound.deferred.is_empty() {
            return;
        }
        let shared = Arc::clone(self);
        let deferred = outbound.deferred;
        thread::spawn(move || {
            thread::sleep(shared.reveal_delay);
            for delivery in &deferred {
                shared.hub.deliver(delivery);
            }
        });
    }
}

/// A game server that accepts client connections
pub struct Server {
    listener: TcpListener,
    /// Local address the server is bound to
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl Server {
    /// Bind to the configured address.
    ///
    /// If the port is taken, the following `port_range` ports are tried
    /// in turn.
    pub fn bind(config: &Config, registry: Arc<Registry>) -> io::Result<Self> {
        let last_port = config.port.saturating_add(config.port_range);
        let mut port = config.port;
        let listener = loop {
            match TcpListener::bind((config.bind, port)) {
                Ok(l) => break l,
                Err(e) if e.kind() == ErrorKind::AddrInUse && port < last_port => {
                    port += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let addr = listener.local_addr()?;
        if port != config.port {
            info!(requested = config.port, port, "configured port in use");
        }

        Ok(Server {
            listener,
            addr,
            shared: Arc::new(Shared {
                registry,
                hub: Hub::default(),
                reveal_delay: config.vote_reveal_delay(),
            }),
        })
    }

    /// Get the address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the port the server is listening on
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Accept connections until the listener fails
    pub fn run(self) -> io::Result<()> {
        info!(addr = %self.addr, "listening");
        let mut next_id = 0u64;
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    next_id += 1;
                    let id = ConnectionId(next_id);
                    let shared = Arc::clone(&self.shared);
                    thread::spawn(move || serve(shared, id, stream));
                    debug!(connection_id = %id, %addr, "accepted");
                }
                Err(e) if is_transient(&e) => {
                    warn!(error = %e, "accept failed");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
    )
}

/// Read requests from one connection until it closes.
fn serve(shared: Arc<Shared>, id: ConnectionId, stream: TcpStream) {
    let (peer, mut reader) = match Peer::new(id, stream) {
        Ok(parts) => parts,
        Err(e) => {
            warn!(connection_id = %id, error = %e, "failed to set up connection");
            return;
        }
    };
    info!(connection_id = %id, addr = %peer.addr, "client connected");
    shared.hub.insert(peer);

    loop {
        let frame = match Message::read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "closing connection");
                break;
            }
        };
        let outbound = match Message::from_json(&frame) {
            Ok(message) => {
                debug!(connection_id = %id, ?message, "request");
                dispatch::dispatch(&shared.registry, id, message)
            }
            Err(e) => {
                debug!(connection_id = %id, error = %e, "undecodable frame");
                dispatch::malformed(id)
            }
        };
        shared.send(outbound);
    }

    shared.hub.remove(id);
    let room = shared.registry.room_of(id);
    shared.send(dispatch::disconnect(&shared.registry, id));
    info!(
        connection_id = %id,
        room = ?room,
        rooms = shared.registry.room_count(),
        "client disconnected"
    );
}
