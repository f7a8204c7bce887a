use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use flexlink_frame::{FrameError, FrameWriter, Packet, StreamReassembler};
use flexlink_transport::{DeviceStream, TcpTransport};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ClientError, Result};
use crate::queue::PacketQueue;
use crate::requests::stop_log;
use crate::stats::{ConnectionStats, StatsSnapshot};

/// Lifecycle of a [`ConnectionManager`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Running,
    ShuttingDown,
    Closed,
}

/// State shared between the caller and the worker thread.
#[derive(Debug)]
struct Shared {
    state: Mutex<ConnectionState>,
    outbound: PacketQueue<Packet>,
    inbound: PacketQueue<Packet>,
    shutdown: AtomicBool,
    /// Set once the stop request is in `outbound` (or failed to get there).
    stop_queued: AtomicBool,
    cancel: AtomicBool,
    stats: ConnectionStats,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

/// One TCP session with a receiver.
///
/// [`start`](Self::start) connects and hands the socket to a dedicated worker
/// thread, which is the only code that reads from or writes to it. Each loop
/// iteration the worker:
///
/// 1. reads whatever the socket has (waiting at most `poll_interval`) and
///    feeds it to the reassembler;
/// 2. drains the inbound queue and dispatches each packet in arrival order,
///    unless shutdown has been requested;
/// 3. drains the outbound queue and writes each packet in enqueue order.
///
/// [`request_shutdown`](Self::request_shutdown) queues a stop request for the
/// configured log and lets the worker keep flushing for `shutdown_grace`
/// before it closes the socket. Inbound packets are no longer dispatched from
/// that point on. A transport or framing failure ends the loop with
/// [`ClientError::Connection`]; there is no reconnect.
pub struct ConnectionManager {
    config: ClientConfig,
    dispatcher: Arc<Dispatcher>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            shared: Arc::new(Shared {
                state: Mutex::new(ConnectionState::Disconnected),
                outbound: PacketQueue::new(),
                inbound: PacketQueue::new(),
                shutdown: AtomicBool::new(false),
                stop_queued: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
                stats: ConnectionStats::new(),
            }),
            worker: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Connect and launch the worker loop.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != ConnectionState::Disconnected {
            return Err(ClientError::InvalidState("connection already started"));
        }
        self.config.validate_strict()?;

        self.shared.set_state(ConnectionState::Connecting);
        let stream = match self.connect() {
            Ok(stream) => stream,
            Err(err) => {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(err);
            }
        };

        let writer =
            FrameWriter::with_config_device(stream.try_clone()?, self.config.frame_config())?;
        let worker = Worker {
            addr: self.config.address.clone(),
            stream,
            writer,
            reassembler: StreamReassembler::with_max_frame_size(self.config.max_frame_size),
            receive_buffer: vec![0u8; self.config.receive_buffer_size],
            verify_checksum: self.config.verify_checksum,
            shutdown_grace: self.config.shutdown_grace,
            dispatcher: Arc::clone(&self.dispatcher),
            shared: Arc::clone(&self.shared),
        };

        self.shared.set_state(ConnectionState::Running);
        let handle = thread::Builder::new()
            .name("flexlink-worker".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.shared.set_state(ConnectionState::Closed);
                ClientError::Transport(e.into())
            })?;
        self.worker = Some(handle);
        info!(addr = %self.config.address, "connection running");
        Ok(())
    }

    fn connect(&self) -> Result<DeviceStream> {
        let stream =
            TcpTransport::connect_timeout(&self.config.address, Some(self.config.connect_timeout))?;
        stream.set_read_timeout(Some(self.config.poll_interval))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Queue a building packet for sending. Packets queued before
    /// [`start`](Self::start) go out on the first loop iteration.
    pub fn send(&self, packet: Packet) -> Result<()> {
        match self.state() {
            ConnectionState::ShuttingDown | ConnectionState::Closed => {
                return Err(ClientError::InvalidState("connection is shutting down"));
            }
            _ => {}
        }
        if packet.is_sealed() {
            return Err(FrameError::CodecState(flexlink_frame::CodecState::Locked).into());
        }
        self.shared.outbound.push(packet)
    }

    /// Stop the configured log, flush for the grace period, close the socket
    /// and wait for the worker.
    ///
    /// Returns the worker's result, so a connection that had already failed
    /// reports its error here.
    pub fn request_shutdown(&mut self) -> Result<()> {
        match self.state() {
            ConnectionState::Running => {
                info!(addr = %self.config.address, "shutdown requested");
                let stop = stop_log(self.config.port_address, self.config.stop_log)?;
                self.shared.set_state(ConnectionState::ShuttingDown);
                self.shared.shutdown.store(true, Ordering::Release);
                let queued = self.shared.outbound.push(stop);
                self.shared.stop_queued.store(true, Ordering::Release);
                queued?;
            }
            ConnectionState::Disconnected => {
                self.shared.set_state(ConnectionState::Closed);
                return Ok(());
            }
            _ => {}
        }
        self.wait()
    }

    /// Abort the worker without sending a stop request.
    pub fn cancel(&mut self) -> Result<()> {
        self.shared.cancel.store(true, Ordering::Release);
        self.wait()
    }

    /// Block until the worker exits and return its result.
    pub fn wait(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        handle
            .join()
            .map_err(|_| ClientError::InvalidState("worker thread panicked"))?
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shared.cancel.store(true, Ordering::Release);
            let _ = self.wait();
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("address", &self.config.address)
            .field("state", &self.state())
            .finish()
    }
}

/// Owns the socket for the lifetime of the session.
struct Worker {
    addr: String,
    stream: DeviceStream,
    writer: FrameWriter<DeviceStream>,
    reassembler: StreamReassembler,
    receive_buffer: Vec<u8>,
    verify_checksum: bool,
    shutdown_grace: std::time::Duration,
    dispatcher: Arc<Dispatcher>,
    shared: Arc<Shared>,
}

impl Worker {
    fn run(mut self) -> Result<()> {
        let result = self.run_loop();
        if let Err(err) = self.stream.shutdown() {
            debug!(error = %err, "socket shutdown failed");
        }
        self.shared.set_state(ConnectionState::Closed);
        self.shared.stats.log_stats();

        match result {
            Ok(()) => {
                info!(addr = %self.addr, "connection closed");
                Ok(())
            }
            Err(err) => {
                error!(addr = %self.addr, error = %err, "connection failed");
                Err(ClientError::Connection {
                    addr: self.addr,
                    source: Box::new(err),
                })
            }
        }
    }

    fn run_loop(&mut self) -> Result<()> {
        let mut deadline: Option<Instant> = None;
        loop {
            if self.shared.cancel.load(Ordering::Acquire) {
                debug!("worker cancelled");
                return Ok(());
            }
            let shutting_down = self.shared.shutdown.load(Ordering::Acquire);
            if shutting_down {
                let deadline = *deadline.get_or_insert_with(|| Instant::now() + self.shutdown_grace);
                if Instant::now() >= deadline && self.shared.stop_queued.load(Ordering::Acquire) {
                    // The stop request is written even when the grace has run out.
                    return self.flush_outbound();
                }
            }

            if !self.receive(shutting_down)? {
                return Ok(());
            }
            self.dispatch(shutting_down)?;
            if let Some(err) = self.reassembler.take_error() {
                return Err(err.into());
            }
            self.flush_outbound()?;
        }
    }

    /// Returns false when the peer closed the connection during shutdown.
    fn receive(&mut self, shutting_down: bool) -> Result<bool> {
        let read = match self.stream.read(&mut self.receive_buffer) {
            Ok(0) if shutting_down => return Ok(false),
            Ok(0) => return Err(FrameError::ConnectionClosed.into()),
            Ok(n) => n,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                return Ok(true)
            }
            Err(err) => return Err(FrameError::Io(err).into()),
        };

        let stats = &self.shared.stats;
        stats.bytes_in(read);
        for frame in self.reassembler.feed(&self.receive_buffer[..read])? {
            stats.frame_received();
            if self.verify_checksum {
                if let Err(err) = frame.verify_checksum() {
                    warn!(opcode = frame.opcode(), error = %err, "dropping frame");
                    stats.frame_dropped();
                    continue;
                }
            }
            self.shared.inbound.push(Packet::from_frame(&frame)?)?;
        }
        Ok(true)
    }

    fn dispatch(&mut self, shutting_down: bool) -> Result<()> {
        for mut packet in self.shared.inbound.drain()? {
            if shutting_down {
                debug!(opcode = packet.opcode(), "shutting down, not dispatching");
                continue;
            }
            match self.dispatcher.process(&mut packet) {
                Ok(true) => self.shared.stats.packet_dispatched(),
                Ok(false) => {}
                Err(err) => warn!(opcode = packet.opcode(), error = %err, "handler failed"),
            }
        }
        Ok(())
    }

    fn flush_outbound(&mut self) -> Result<()> {
        for packet in self.shared.outbound.drain()? {
            match self.writer.write_packet(&packet) {
                Ok(written) => {
                    debug!(opcode = packet.opcode(), bytes = written, "packet sent");
                    self.shared.stats.packet_sent(written);
                }
                Err(err @ (FrameError::Io(_) | FrameError::ConnectionClosed)) => {
                    return Err(err.into());
                }
                Err(err) => warn!(opcode = packet.opcode(), error = %err, "dropping outbound packet"),
            }
        }
        Ok(())
    }
}
