use super::ServerEvent;
use super::codec::{self, Command};
use crate::receiver::coordinator::ConnectionControl;
use crate::receiver::registry::ConnectionId;
use crate::utils::error::Result;
use async_std::channel::{self, Receiver, Sender};
use async_std::io::BufReader;
use async_std::net::{TcpListener, TcpStream};
use async_std::prelude::*;
use async_std::task;
use std::collections::HashMap;
use std::net::{IpAddr, Shutdown, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Book-keeping for one accepted connection
///
/// The entry outlives the socket: once the reader stops, `stream` is taken,
/// and the entry stays until the coordinator releases it after handling the
/// disconnect, so commands still queued for it can resolve the peer.
struct ConnectionEntry {
    peer: SocketAddr,
    stream: Option<TcpStream>,
    closing: bool,
}

/// Cloneable view of the server's connections
#[derive(Clone, Default)]
pub struct ServerHandle {
    connections: Arc<Mutex<HashMap<ConnectionId, ConnectionEntry>>>,
}

impl ServerHandle {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionEntry>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, id: ConnectionId, peer: SocketAddr, stream: TcpStream) {
        self.lock().insert(
            id,
            ConnectionEntry {
                peer,
                stream: Some(stream),
                closing: false,
            },
        );
    }

    /// Drop the socket of a connection whose reader has stopped
    fn finish(&self, id: ConnectionId) {
        let stream = self
            .lock()
            .get_mut(&id)
            .and_then(|entry| entry.stream.take());
        if let Some(stream) = stream {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Full remote socket address of a connection not yet released
    pub fn peer_socket_address(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.lock().get(&id).map(|entry| entry.peer)
    }

    /// Whether the connection still has a socket and is not being closed
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.lock()
            .get(&id)
            .is_some_and(|entry| entry.stream.is_some() && !entry.closing)
    }

    /// Number of connections that still have a socket
    pub fn connection_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.stream.is_some())
            .count()
    }
}

impl ConnectionControl for ServerHandle {
    fn peer_address(&self, id: ConnectionId) -> Option<IpAddr> {
        self.peer_socket_address(id)
            .map(|peer| peer.ip().to_canonical())
    }

    fn close_connection(&self, id: ConnectionId) {
        let mut connections = self.lock();
        let Some(entry) = connections.get_mut(&id) else {
            return;
        };
        if entry.closing {
            return;
        }
        entry.closing = true;
        // Wakes the reader, which drops the socket and reports the disconnect
        if let Some(stream) = &entry.stream {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("Shutdown of connection {} failed: {}", id, e);
            }
        }
        info!("Closing connection {} from {}", id, entry.peer);
    }

    fn is_closing(&self, id: ConnectionId) -> bool {
        self.lock().get(&id).is_some_and(|entry| entry.closing)
    }

    fn release(&self, id: ConnectionId) {
        self.lock().remove(&id);
    }
}

/// TCP command server for receiver sessions
pub struct CommandServer {
    listener: TcpListener,
    handle: ServerHandle,
    events: Sender<ServerEvent>,
    next_id: u64,
    max_line_length: usize,
}

impl CommandServer {
    /// Bind the listener and create the event channel
    ///
    /// # Returns
    /// * The server, to be driven with [`CommandServer::run`], and the receiving
    ///   end of its event stream
    pub async fn bind(
        addr: SocketAddr,
        max_line_length: usize,
    ) -> Result<(Self, Receiver<ServerEvent>)> {
        let listener = TcpListener::bind(addr).await?;
        let (events, events_rx) = channel::unbounded();

        Ok((
            CommandServer {
                listener,
                handle: ServerHandle::default(),
                events,
                next_id: 1,
                max_line_length,
            },
            events_rx,
        ))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Accept connections until the task is dropped
    pub async fn run(mut self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => self.accept(stream, peer),
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    task::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    fn accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        self.handle.insert(id, peer, stream.clone());
        info!(
            "Accepted connection {} from {} ({} open)",
            id,
            peer,
            self.handle.connection_count()
        );

        task::spawn(read_commands(
            id,
            stream,
            self.handle.clone(),
            self.events.clone(),
            self.max_line_length,
        ));
    }
}

/// Frame lines from one connection and forward them as events
///
/// Stops on EXIT, on a protocol error, on end of stream or when the
/// connection is force-closed, then reports the disconnect.
async fn read_commands(
    id: ConnectionId,
    stream: TcpStream,
    handle: ServerHandle,
    events: Sender<ServerEvent>,
    max_line_length: usize,
) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        line.clear();
        let limit = max_line_length as u64 + 1;
        match (&mut reader).take(limit).read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!("Connection {} reached end of stream", id);
                break;
            }
            Ok(_) if line.last() != Some(&b'\n') => {
                if line.len() > max_line_length {
                    warn!(
                        "Protocol error on connection {}: {}",
                        id,
                        codec::ProtocolError::LineTooLong(max_line_length)
                    );
                } else {
                    debug!("Connection {} closed mid-line", id);
                }
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Read error on connection {}: {}", id, e);
                break;
            }
        }

        if !handle.is_open(id) {
            break;
        }

        match codec::decode_line(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => {
                debug!("Connection {} sent {}", id, command.kind());
                let exit = command == Command::Exit;
                if events
                    .send(ServerEvent::CommandReceived { id, command })
                    .await
                    .is_err()
                {
                    break;
                }
                if exit {
                    break;
                }
            }
            Err(e) => {
                warn!("Protocol error on connection {}: {}", id, e);
                break;
            }
        }
    }

    handle.finish(id);
    info!("Connection {} disconnected", id);
    let _ = events.send(ServerEvent::Disconnected { id }).await;
}
