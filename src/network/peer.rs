//! Peer connection handling

use crate::game::ConnectionId;
use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::{channel, Sender};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// The sending half of a connected client
pub struct Peer {
    /// Server-assigned connection id
    pub id: ConnectionId,
    /// Peer's address
    pub addr: SocketAddr,
    /// Channel to the writer thread
    tx: Sender<Vec<u8>>,
}

impl Peer {
    /// Split an accepted stream into a peer and the stream to read from.
    ///
    /// Writes go through a dedicated thread so a slow client never blocks
    /// whoever is broadcasting to its room.
    pub fn new(id: ConnectionId, stream: TcpStream) -> io::Result<(Self, TcpStream)> {
        let addr = stream.peer_addr()?;

        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(Duration::from_secs(5)))?;

        let (tx, rx) = channel::<Vec<u8>>();

        // Clone stream for writer thread
        let read_stream = stream.try_clone()?;
        let mut write_stream = stream;

        // Writer thread, exits once the peer is dropped
        thread::spawn(move || {
            while let Ok(bytes) = rx.recv() {
                if let Err(e) = write_stream.write_all(&bytes).and_then(|_| write_stream.flush()) {
                    debug!(connection_id = %id, error = %e, "write failed");
                    break;
                }
            }
        });

        Ok((Peer { id, addr, tx }, read_stream))
    }

    /// Queue an already-framed message
    pub fn send_raw(&self, bytes: Vec<u8>) -> io::Result<()> {
        self.tx
            .send(bytes)
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "peer disconnected"))
    }
}
