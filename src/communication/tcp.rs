// src/communication/tcp.rs
//! Newline-delimited JSON broadcaster over TCP

use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::communication::TrialResult;
use crate::error::{CommunicationProtocol, ErdError, ErdErrorBuilder, ErdResult};

const ACCEPT_POLL: Duration = Duration::from_millis(20);
const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Lines waiting for the writer thread before new results are dropped
const OUTBOUND_QUEUE: usize = 1024;

type Clients = Arc<Mutex<Vec<(SocketAddr, TcpStream)>>>;

/// Accepts any number of clients and writes every result to all of them.
///
/// `publish` only queues the serialised line; a writer thread owns the
/// socket writes, so a slow client never stalls the caller.
#[derive(Debug)]
pub struct TcpBroadcaster {
    local_addr: SocketAddr,
    clients: Clients,
    running: Arc<AtomicBool>,
    outbound: Option<Sender<String>>,
    accept_thread: Option<JoinHandle<()>>,
    writer_thread: Option<JoinHandle<()>>,
}

impl TcpBroadcaster {
    pub fn bind(address: &str) -> ErdResult<Self> {
        let error = |reason: String| {
            ErdErrorBuilder::new("tcp_broadcaster", "bind").communication(CommunicationProtocol::Tcp, reason)
        };
        let listener = TcpListener::bind(address).map_err(|e| error(format!("{}: {}", address, e)))?;
        listener.set_nonblocking(true).map_err(|e| error(e.to_string()))?;
        let local_addr = listener.local_addr().map_err(|e| error(e.to_string()))?;

        let clients: Clients = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));
        let (outbound, lines) = bounded(OUTBOUND_QUEUE);

        let accept_thread = {
            let clients = Arc::clone(&clients);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("erd-broadcast-accept".to_string())
                .spawn(move || accept_loop(listener, clients, running))
                .map_err(|e| error(e.to_string()))?
        };
        let writer_thread = {
            let clients = Arc::clone(&clients);
            thread::Builder::new()
                .name("erd-broadcast-writer".to_string())
                .spawn(move || writer_loop(lines, clients))
                .map_err(|e| error(e.to_string()))?
        };

        info!(address = %local_addr, "Broadcasting ERD results");
        Ok(Self {
            local_addr,
            clients,
            running,
            outbound: Some(outbound),
            accept_thread: Some(accept_thread),
            writer_thread: Some(writer_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Queue one JSON line for every client. A full queue drops the line.
    pub fn publish(&self, result: &TrialResult) -> ErdResult<()> {
        let closed = || -> ErdError {
            ErdErrorBuilder::new("tcp_broadcaster", "publish")
                .communication(CommunicationProtocol::Tcp, "Broadcaster is closed")
        };
        let outbound = self.outbound.as_ref().ok_or_else(closed)?;
        let line = result.to_json_line()?;
        match outbound.try_send(line) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(marker = %result.marker_description, "Broadcast queue full, result dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(closed()),
        }
    }

    /// Stop accepting, deliver queued lines and disconnect every client
    pub fn close(&mut self) -> ErdResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.outbound.take();
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                warn!("Broadcast accept thread panicked");
            }
        }
        if let Some(handle) = self.writer_thread.take() {
            if handle.join().is_err() {
                warn!("Broadcast writer thread panicked");
            }
        }
        self.clients.lock().clear();
        Ok(())
    }
}

impl Drop for TcpBroadcaster {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn writer_loop(lines: Receiver<String>, clients: Clients) {
    for line in lines {
        let mut clients = clients.lock();
        clients.retain_mut(|(peer, stream)| match stream.write_all(line.as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                warn!(client = %peer, error = %e, "Dropping broadcast client");
                false
            }
        });
        debug!(clients = clients.len(), "Result broadcast");
    }
}

fn accept_loop(listener: TcpListener, clients: Clients, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = configure_client(&stream) {
                    warn!(client = %peer, error = %e, "Rejecting broadcast client");
                    continue;
                }
                info!(client = %peer, "Broadcast client connected");
                clients.lock().push((peer, stream));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                warn!(error = %e, "Accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn configure_client(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(CLIENT_WRITE_TIMEOUT))
}
