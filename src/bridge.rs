//! A TCP bridge to an external visualiser that renders simulation frames.
//!
//! The bridge accepts a single connection. Once connected, a reader thread
//! splits the socket into lines and a coordinator thread owns all writes,
//! choosing between queued messages, incoming lines and the stop signal.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::util::lock;
use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub use protocol::{decode_reply, encode, FrameReply, FrameRequest};

mod protocol;

/// The lifecycle of a [VisualisationBridge].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    /// Created, not yet listening.
    Idle,
    /// Bound to its address, waiting for the visualiser.
    Listening,
    /// Exchanging messages with the visualiser.
    Connected,
    /// Stopping; flushing queued messages before closing the socket.
    Draining,
    /// Closed. A bridge never reconnects.
    Disconnected,
}

/// A frame request waiting for its acknowledgement.
struct PendingFrame {
    token: u64,
    reply: Sender<BridgeResult<String>>,
}

/// The single-slot table of outstanding frame requests.
#[derive(Default)]
struct PendingSlot {
    frame: Option<PendingFrame>,
    /// Acknowledgements still owed to requests that timed out. Each one is
    /// dropped on arrival instead of settling a later request.
    stale_acks: u32,
    /// Set once the connection has closed; no new request may wait after this.
    closed: bool,
}

/// State shared between the bridge and its worker threads.
struct Shared {
    state: Mutex<BridgeState>,
    connected: AtomicBool,
    pending: Mutex<PendingSlot>,
}

impl Shared {
    fn set_state(&self, state: BridgeState) {
        log::debug!("bridge state: {:?}", state);
        *lock(&self.state) = state;
    }

    /// Settles the outstanding frame request with a line sent by the visualiser.
    fn handle_line(&self, line: &str) {
        log::debug!("received: {}", line);
        let pending = {
            let mut slot = lock(&self.pending);
            if slot.stale_acks > 0 {
                slot.stale_acks -= 1;
                log::warn!("discarding late acknowledgement: {}", line);
                return;
            }
            slot.frame.take()
        };
        let result = decode_reply(line).map(|reply| {
            if Path::new(&reply.filepath).exists() {
                log::debug!("frame {:?} exists", reply.filepath);
            } else {
                log::debug!("frame {:?} not found locally", reply.filepath);
            }
            reply.filepath
        });
        match (pending, result) {
            (Some(pending), result) => {
                if let Err(err) = &result {
                    log::error!("frame request {} failed: {}", pending.token, err);
                }
                // The requester may have timed out and gone
                let _ = pending.reply.send(result);
            }
            (None, Ok(filepath)) => log::warn!("unsolicited frame acknowledgement: {}", filepath),
            (None, Err(err)) => log::error!("unable to parse message: {}", err),
        }
    }

    /// Marks the connection closed and fails any outstanding frame request.
    fn close(&self) {
        let pending = {
            let mut slot = lock(&self.pending);
            slot.closed = true;
            slot.frame.take()
        };
        if let Some(pending) = pending {
            let _ = pending.reply.send(Err(BridgeError::Disconnected));
        }
        self.connected.store(false, Ordering::SeqCst);
        self.set_state(BridgeState::Disconnected);
    }
}

/// The channels and threads of a live connection.
struct Connection {
    outgoing: Sender<Vec<u8>>,
    coordinator: JoinHandle<()>,
}

/// A TCP server that streams simulation frames to an external visualiser
/// and collects the paths of the images it renders.
pub struct VisualisationBridge {
    config: BridgeConfig,
    shared: Arc<Shared>,
    listener: Mutex<Option<TcpListener>>,
    local_addr: Mutex<Option<SocketAddr>>,
    connection: Mutex<Option<Connection>>,
    /// Dropped to close the stop signal; closing it twice is a no-op.
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    /// Serialises frame requests so only one is ever outstanding.
    frame_lock: Mutex<()>,
    next_token: AtomicU64,
    visualiser: Mutex<Option<Child>>,
}

impl VisualisationBridge {
    /// Creates a bridge. Nothing is bound until [bind](Self::bind) or
    /// [start_server](Self::start_server) is called.
    pub fn new(config: BridgeConfig) -> Self {
        let (stop_tx, stop_rx) = bounded(0);
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(BridgeState::Idle),
                connected: AtomicBool::new(false),
                pending: Mutex::new(PendingSlot::default()),
            }),
            listener: Mutex::new(None),
            local_addr: Mutex::new(None),
            connection: Mutex::new(None),
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
            frame_lock: Mutex::new(()),
            next_token: AtomicU64::new(0),
            visualiser: Mutex::new(None),
        }
    }

    /// Resolves and binds the configured address, returning the bound address.
    /// Binding port 0 picks a free port.
    pub fn bind(&self) -> BridgeResult<SocketAddr> {
        match self.state() {
            BridgeState::Idle => {}
            BridgeState::Listening => {
                if let Some(addr) = self.local_addr() {
                    return Ok(addr);
                }
            }
            _ => return Err(BridgeError::AlreadyStarted),
        }
        let address = &self.config.address;
        let addr = address
            .to_socket_addrs()
            .map_err(|_| BridgeError::Resolve(address.clone()))?
            .next()
            .ok_or_else(|| BridgeError::Resolve(address.clone()))?;
        let listener = TcpListener::bind(addr).map_err(|source| BridgeError::Bind {
            addr: address.clone(),
            source,
        })?;
        let local = listener.local_addr()?;
        log::info!("listening on {}", local);
        *lock(&self.listener) = Some(listener);
        *lock(&self.local_addr) = Some(local);
        self.shared.set_state(BridgeState::Listening);
        Ok(local)
    }

    /// Binds if needed, launches the visualiser if one is configured, then
    /// blocks until the visualiser connects.
    ///
    /// Failed accepts are logged and retried. Once connected, the worker
    /// threads are started and this returns.
    pub fn start_server(&self) -> BridgeResult<()> {
        self.bind()?;
        let listener = lock(&self.listener)
            .take()
            .ok_or(BridgeError::AlreadyStarted)?;

        if let Some(path) = &self.config.visualiser {
            self.launch_visualiser(path);
        }

        let (stream, peer) = loop {
            match listener.accept() {
                Ok(accepted) => break accepted,
                Err(err) => log::warn!("unable to accept a connection: {}", err),
            }
        };
        log::info!("connection established: {}", peer);
        self.connect(stream)
    }

    /// Starts the reader and coordinator threads for an accepted connection.
    fn connect(&self, stream: TcpStream) -> BridgeResult<()> {
        let reader = stream.try_clone()?;
        let (outgoing_tx, outgoing_rx) = unbounded();
        let (incoming_tx, incoming_rx) = unbounded();

        self.shared.connected.store(true, Ordering::SeqCst);
        self.shared.set_state(BridgeState::Connected);

        std::thread::spawn(move || read_lines(reader, incoming_tx));
        let shared = self.shared.clone();
        let stop_rx = self.stop_rx.clone();
        let coordinator = std::thread::spawn(move || {
            coordinate(stream, outgoing_rx, incoming_rx, stop_rx, &shared);
            shared.close();
        });

        *lock(&self.connection) = Some(Connection {
            outgoing: outgoing_tx,
            coordinator,
        });
        Ok(())
    }

    fn launch_visualiser(&self, path: &Path) {
        log::info!("starting visualiser: {}", path.display());
        match Command::new(path).spawn() {
            Ok(child) => *lock(&self.visualiser) = Some(child),
            Err(err) => log::warn!("unable to start visualiser {}: {}", path.display(), err),
        }
    }

    /// Queues a raw payload to send to the visualiser. Payloads are written
    /// in the order they are queued; a newline is appended if missing.
    pub fn send_message(&self, payload: impl Into<Vec<u8>>) -> BridgeResult<()> {
        let mut payload = payload.into();
        if payload.last() != Some(&b'\n') {
            payload.push(b'\n');
        }
        log::debug!("adding to outgoing: {} bytes", payload.len());
        let connection = lock(&self.connection);
        let connection = connection.as_ref().ok_or(BridgeError::NotConnected)?;
        connection
            .outgoing
            .send(payload)
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Sends a frame request and blocks until the visualiser acknowledges it,
    /// returning the path of the rendered frame.
    ///
    /// Concurrent callers take turns. The wait ends early if the connection
    /// closes, or after the configured frame timeout.
    pub fn send_simulation_frame(&self, request: &FrameRequest) -> BridgeResult<String> {
        let _turn = lock(&self.frame_lock);
        if !self.connected() {
            return Err(BridgeError::NotConnected);
        }
        let payload = encode(request)?;
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let (reply_tx, reply_rx) = bounded(1);
        {
            let mut slot = lock(&self.shared.pending);
            if slot.closed {
                return Err(BridgeError::Disconnected);
            }
            slot.frame = Some(PendingFrame {
                token,
                reply: reply_tx,
            });
        }
        log::debug!("sending frame request {} for tick {}", token, request.tick);
        if let Err(err) = self.send_message(payload) {
            self.clear_pending(token);
            return Err(err);
        }

        let result = match self.config.frame_timeout() {
            Some(timeout) => reply_rx.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => BridgeError::Timeout,
                RecvTimeoutError::Disconnected => BridgeError::Disconnected,
            }),
            None => reply_rx.recv().map_err(|_| BridgeError::Disconnected),
        };
        let result = match result {
            Err(BridgeError::Timeout) => self.abandon_pending(token, &reply_rx),
            result => result,
        };
        let filepath = result??;
        log::debug!("frame request {} rendered to {}", token, filepath);
        Ok(filepath)
    }

    /// Gives up on a timed-out request. If its acknowledgement is still to
    /// come, it is marked stale; if it arrived meanwhile, it is returned.
    fn abandon_pending(
        &self,
        token: u64,
        reply: &Receiver<BridgeResult<String>>,
    ) -> Result<BridgeResult<String>, BridgeError> {
        let mut slot = lock(&self.shared.pending);
        if slot.frame.as_ref().map(|frame| frame.token) == Some(token) {
            slot.frame = None;
            slot.stale_acks += 1;
            log::warn!("frame request {} timed out", token);
            return Err(BridgeError::Timeout);
        }
        reply.try_recv().map_err(|_| BridgeError::Timeout)
    }

    /// Empties the pending slot if it still holds the given request.
    fn clear_pending(&self, token: u64) {
        let mut slot = lock(&self.shared.pending);
        if slot.frame.as_ref().map(|frame| frame.token) == Some(token) {
            slot.frame = None;
        }
    }

    /// Stops the bridge: flushes queued messages, closes the connection and
    /// fails any outstanding frame request. Safe to call more than once.
    pub fn stop_server(&self) {
        if lock(&self.stop_tx).take().is_none() {
            return;
        }
        log::info!("stopping visualisation bridge");
        lock(&self.listener).take();

        let connection = lock(&self.connection).take();
        match connection {
            Some(Connection {
                outgoing,
                coordinator,
            }) => {
                drop(outgoing);
                if coordinator.join().is_err() {
                    log::error!("bridge coordinator panicked");
                }
            }
            None => self.shared.close(),
        }
        // The coordinator may have panicked before closing
        self.shared.close();

        if let Some(mut child) = lock(&self.visualiser).take() {
            match shutdown_visualiser(&mut child) {
                Ok(status) => log::debug!("visualiser exited: {}", status),
                Err(err) => log::warn!("unable to stop visualiser {}: {}", child.id(), err),
            }
        }

        if self.config.remove_frames_on_shutdown {
            if let Some(dir) = &self.config.frame_dir {
                remove_frames(dir);
            }
        }
    }

    /// Whether the visualiser is connected. Never blocks.
    pub fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> BridgeState {
        *lock(&self.shared.state)
    }

    /// The address the bridge is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }
}

impl Drop for VisualisationBridge {
    fn drop(&mut self) {
        self.stop_server();
    }
}

/// Reads newline-delimited messages until the socket closes or fails.
fn read_lines(stream: TcpStream, incoming: Sender<String>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                log::info!("visualiser closed the connection");
                break;
            }
            Ok(_) => {
                let message = line.trim();
                if message.is_empty() {
                    continue;
                }
                if incoming.send(message.to_string()).is_err() {
                    break;
                }
            }
            Err(err) => {
                log::error!("error reading socket: {}", err);
                break;
            }
        }
    }
}

/// Owns the socket's write half: writes queued messages, hands incoming lines
/// to the pending request, and closes the socket on stop or disconnect.
fn coordinate(
    mut stream: TcpStream,
    outgoing: Receiver<Vec<u8>>,
    incoming: Receiver<String>,
    stop: Receiver<()>,
    shared: &Shared,
) {
    loop {
        select! {
            recv(stop) -> _ => {
                shared.set_state(BridgeState::Draining);
                for payload in outgoing.try_iter() {
                    if write_payload(&mut stream, &payload).is_err() {
                        break;
                    }
                }
                break;
            }
            recv(outgoing) -> payload => match payload {
                Ok(payload) => {
                    if let Err(err) = write_payload(&mut stream, &payload) {
                        log::error!("error sending message: {}", err);
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(incoming) -> line => match line {
                Ok(line) => shared.handle_line(&line),
                Err(_) => break,
            },
        }
    }
    log::info!("disconnecting visualiser");
    let _ = stream.shutdown(Shutdown::Both);
}

fn write_payload(stream: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
    stream.write_all(payload)?;
    stream.flush()
}

/// Deletes the `.png` files directly inside `dir`. Failures are logged.
fn remove_frames(dir: &Path) {
    log::info!("removing frames in {}", dir.display());
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::error!("unable to read {}: {}", dir.display(), err);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_png = path.extension().map_or(false, |ext| ext == "png");
        if is_png && path.is_file() {
            if let Err(err) = std::fs::remove_file(&path) {
                log::error!("unable to remove {}: {}", path.display(), err);
            }
        }
    }
}

/// Kills the visualiser process, if still running, and reaps it.
fn shutdown_visualiser(child: &mut Child) -> std::io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }
    log::debug!("killing visualiser {}", child.id());
    // Fails only if the process has already exited
    if let Err(err) = child.kill() {
        log::debug!("visualiser {} already gone: {}", child.id(), err);
    }
    child.wait()
}
