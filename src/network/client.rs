//! Minimal TCP client for exercising a running server

use super::protocol::Message;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use std::time::Duration;

/// How long to wait for a message before giving up
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A client connection with a background reader
pub struct Client {
    stream: TcpStream,
    rx: Receiver<Message>,
}

impl Client {
    /// Connect to a server at the given address
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, RECV_TIMEOUT)?;
        let mut read_stream = stream.try_clone()?;
        let (tx, rx) = channel();

        thread::spawn(move || {
            while let Ok(msg) = Message::read_from(&mut read_stream) {
                if tx.send(msg).is_err() {
                    break;
                }
            }
        });

        Ok(Client { stream, rx })
    }

    /// Send a message to the server
    pub fn send(&mut self, msg: &Message) -> io::Result<()> {
        msg.write_to(&mut self.stream)
    }

    /// Send an arbitrary JSON body as one frame
    pub fn send_raw(&mut self, body: &[u8]) -> io::Result<()> {
        self.stream.write_all(&(body.len() as u32).to_be_bytes())?;
        self.stream.write_all(body)?;
        self.stream.flush()
    }

    /// Wait for the next message
    pub fn recv(&self) -> Option<Message> {
        self.rx.recv_timeout(RECV_TIMEOUT).ok()
    }

    /// Wait for the next message matching `pred`, skipping others
    pub fn recv_until(&self, pred: impl Fn(&Message) -> bool) -> Option<Message> {
        while let Some(msg) = self.recv() {
            if pred(&msg) {
                return Some(msg);
            }
        }
        None
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // The reader thread holds a clone of the socket
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
