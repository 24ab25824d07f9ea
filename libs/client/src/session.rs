//! RTMA Client Session
//!
//! ## Purpose
//!
//! One module's connection to the Message Manager. The session owns the
//! transport, stamps every outgoing header (sequence number, timestamp,
//! source identity) and implements the acknowledgement protocol used by the
//! connect handshake and subscription control.
//!
//! ## State Machine
//!
//! ```text
//!                connect()                ACKNOWLEDGE
//! Unconnected ───────────▶ Connecting ─────────────────▶ Connected
//!      ▲                        │ timeout / error            │
//!      └────────────────────────┘                            │ disconnect()
//!                                                            ▼
//!                         Connecting ◀──── connect() ─── Disconnected
//! ```
//!
//! A failed connect leaves the session with its unconnected defaults, so the
//! same `Client` can try again.
//!
//! ## Sequencing
//!
//! The counter is pre-incremented per send and only committed once the
//! message is fully written, so the peer sees 1, 2, 3... with no gaps from
//! rejected or timed-out sends. It restarts at 0 on every connection.

use crate::error::{ClientError, Result};
use rtma_codec::{
    host_ids, ConnectData, ControlVerb, HostId, Message, MessageDefinition, MessageHeader,
    MessageType, ModuleId, ModuleReady, Payload, ProtocolError, SubscriptionControl, MAX_HOSTS,
    MAX_MODULES,
};
use rtma_config::ClientConfig;
use rtma_network::{
    Direction, Readiness, SystemClock, TcpTransport, TimeSource, Timeout, Transport,
    TransportStats,
};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use zerocopy::AsBytes;

/// Default bound on an acknowledgement wait
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Longest single receive inside an acknowledgement wait
const MAX_ACK_PROBE: Duration = Duration::from_secs(3);

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unconnected,
    Connecting,
    Connected,
    Disconnected,
}

/// Outcome of a request that expects an ACKNOWLEDGE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Acknowledged,
    TimedOut,
}

impl AckStatus {
    pub fn is_acknowledged(self) -> bool {
        self == AckStatus::Acknowledged
    }
}

/// One module's session with the Message Manager
///
/// Every operation takes `&mut self`; share a session across threads only
/// behind a lock.
pub struct Client {
    transport: Option<Box<dyn Transport>>,
    clock: Box<dyn TimeSource>,
    server_addr: Option<SocketAddr>,

    requested_module_id: ModuleId,
    module_id: ModuleId,
    host_id: HostId,
    pid: i32,

    start_time: f64,
    msg_count: i32,
    state: ClientState,

    ack_timeout: Duration,
    send_timeout: Timeout,
    connect_data: ConnectData,
}

impl Client {
    /// Unconnected session; `module_id` 0 requests a broker-assigned id
    pub fn new(module_id: ModuleId, host_id: HostId) -> Self {
        Self {
            transport: None,
            clock: Box::new(SystemClock::global()),
            server_addr: None,
            requested_module_id: module_id,
            module_id,
            host_id,
            pid: std::process::id() as i32,
            start_time: 0.0,
            msg_count: 0,
            state: ClientState::Unconnected,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            send_timeout: Timeout::Blocking,
            connect_data: ConnectData::default(),
        }
    }

    /// Unconnected session configured from `config`
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut client = Self::new(config.module_id, config.host_id);
        client.ack_timeout = config.ack_timeout();
        client.send_timeout = Timeout::from(config.send_timeout_secs);
        client.connect_data = ConnectData {
            logger_status: i16::from(config.logger_status),
            daemon_status: i16::from(config.daemon_status),
        };
        Ok(client)
    }

    /// Replace the header timestamp source
    pub fn with_time_source(mut self, clock: impl TimeSource + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn set_ack_timeout(&mut self, timeout: Duration) {
        self.ack_timeout = timeout;
    }

    /// Write readiness bound used by every send without an explicit timeout
    pub fn set_send_timeout(&mut self, timeout: impl Into<Timeout>) {
        self.send_timeout = timeout.into();
    }

    /// Flags carried in the CONNECT payload
    pub fn set_connect_flags(&mut self, logger_status: bool, daemon_status: bool) {
        self.connect_data = ConnectData {
            logger_status: i16::from(logger_status),
            daemon_status: i16::from(daemon_status),
        };
    }

    // ---------------------------------------------------------------------
    // Connection lifecycle
    // ---------------------------------------------------------------------

    /// Connect to a numeric server address and port
    pub fn connect(&mut self, server: &str, port: u16) -> Result<()> {
        let ip: IpAddr = server
            .parse()
            .map_err(|e| ClientError::invalid_address(server, e))?;
        self.connect_addr(SocketAddr::new(ip, port))
    }

    /// Connect to a numeric `host:port` string
    pub fn connect_to(&mut self, addr: &str) -> Result<()> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| ClientError::invalid_address(addr, e))?;
        self.connect_addr(addr)
    }

    pub fn connect_addr(&mut self, addr: SocketAddr) -> Result<()> {
        self.ensure_not_connected()?;
        let transport = TcpTransport::connect(addr).inspect_err(|e| {
            error!(%addr, error = %e, "Failed to open connection to message manager");
        })?;
        self.connect_with(Box::new(transport))
    }

    /// Run the CONNECT handshake over an already open transport
    pub fn connect_with(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        self.ensure_not_connected()?;

        self.server_addr = transport.peer_addr();
        self.transport = Some(transport);
        self.module_id = self.requested_module_id;
        self.msg_count = 0;
        self.start_time = self.clock.now();
        self.state = ClientState::Connecting;

        match self.handshake() {
            Ok(()) => {
                self.state = ClientState::Connected;
                info!(
                    module_id = self.module_id,
                    host_id = self.host_id,
                    peer = ?self.server_addr,
                    "Connected to message manager"
                );
                Ok(())
            }
            Err(e) => {
                warn!(peer = ?self.server_addr, error = %e, "Connect handshake failed");
                self.teardown(ClientState::Unconnected);
                Err(e)
            }
        }
    }

    fn handshake(&mut self) -> Result<()> {
        let payload = Payload::from_struct(&self.connect_data)?;
        let header = self.broadcast_header(ControlVerb::Connect);
        if self
            .send_message(Message::new(header, payload), self.send_timeout)?
            .is_none()
        {
            return Err(ClientError::AckTimeout {
                operation: "connect",
                timeout: self.ack_timeout,
            });
        }

        let ack = self
            .wait_for_ack(self.ack_timeout)?
            .ok_or(ClientError::AckTimeout {
                operation: "connect",
                timeout: self.ack_timeout,
            })?;

        if self.requested_module_id == 0 {
            self.module_id = ack.header.dest_mod_id;
            debug!(module_id = self.module_id, "Adopted dynamic module id");
        }
        Ok(())
    }

    /// Send DISCONNECT and close the connection; no-op unless connected
    ///
    /// The session is torn down even when the farewell cannot be written,
    /// in which case that error is returned.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state != ClientState::Connected {
            return Ok(());
        }

        let farewell = self.send_signal(ControlVerb::Disconnect);
        if let Err(e) = &farewell {
            warn!(error = %e, "Failed to send DISCONNECT");
        }

        self.teardown(ClientState::Disconnected);
        info!("Disconnected from message manager");
        farewell.map(|_| ())
    }

    fn ensure_not_connected(&self) -> Result<()> {
        if self.state == ClientState::Connected {
            return Err(ClientError::AlreadyConnected {
                peer: self.server_addr,
            });
        }
        Ok(())
    }

    /// Close the transport and reset connection-scoped fields
    fn teardown(&mut self, next: ClientState) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.shutdown() {
                debug!(error = %e, "Transport shutdown failed");
            }
        }
        self.server_addr = None;
        self.module_id = self.requested_module_id;
        self.msg_count = 0;
        self.start_time = 0.0;
        self.state = next;
    }

    // ---------------------------------------------------------------------
    // Sending
    // ---------------------------------------------------------------------

    /// Broadcast `payload` as `msg_type`
    ///
    /// Returns the bytes written, or `None` if the socket did not become
    /// writable within the send timeout.
    pub fn send(&mut self, msg_type: impl Into<MessageType>, payload: &[u8]) -> Result<Option<usize>> {
        let timeout = self.send_timeout;
        self.send_with_timeout(msg_type, payload, 0, 0, timeout)
    }

    /// Send to a specific module and host
    pub fn send_to(
        &mut self,
        msg_type: impl Into<MessageType>,
        payload: &[u8],
        dest_mod_id: ModuleId,
        dest_host_id: HostId,
    ) -> Result<Option<usize>> {
        let timeout = self.send_timeout;
        self.send_with_timeout(msg_type, payload, dest_mod_id, dest_host_id, timeout)
    }

    /// Broadcast a zero-length message
    pub fn send_signal(&mut self, msg_type: impl Into<MessageType>) -> Result<Option<usize>> {
        self.send(msg_type, &[])
    }

    pub fn send_signal_to(
        &mut self,
        msg_type: impl Into<MessageType>,
        dest_mod_id: ModuleId,
        dest_host_id: HostId,
    ) -> Result<Option<usize>> {
        self.send_to(msg_type, &[], dest_mod_id, dest_host_id)
    }

    /// Broadcast a typed control message under its own verb
    pub fn send_struct<T: MessageDefinition>(&mut self, data: &T) -> Result<Option<usize>> {
        self.send(T::VERB, data.as_bytes())
    }

    /// Announce this module's process id
    pub fn send_module_ready(&mut self) -> Result<Option<usize>> {
        let ready = ModuleReady { pid: self.pid };
        self.send_struct(&ready)
    }

    pub fn send_with_timeout(
        &mut self,
        msg_type: impl Into<MessageType>,
        payload: &[u8],
        dest_mod_id: ModuleId,
        dest_host_id: HostId,
        timeout: impl Into<Timeout>,
    ) -> Result<Option<usize>> {
        if self.state != ClientState::Connected {
            return Err(ClientError::NotConnected);
        }
        validate_destination(dest_mod_id, dest_host_id)?;
        let payload = Payload::copy_from_slice(payload)?;

        let mut header = self.broadcast_header(msg_type);
        header.dest_mod_id = dest_mod_id;
        header.dest_host_id = dest_host_id;

        self.send_message(Message::new(header, payload), timeout.into())
    }

    fn broadcast_header(&self, msg_type: impl Into<MessageType>) -> MessageHeader {
        let mut header = MessageHeader::new(msg_type);
        header.src_mod_id = self.module_id;
        header.src_host_id = self.host_id;
        header
    }

    /// Stamp sequence number and send time, then write the whole message
    fn send_message(&mut self, mut message: Message, timeout: Timeout) -> Result<Option<usize>> {
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;

        if transport.wait_ready(Direction::Write, timeout)? == Readiness::TimedOut {
            trace!(msg_type = %message.message_type(), "Socket not writable before timeout");
            return Ok(None);
        }

        let seq = self.msg_count.wrapping_add(1);
        message.header.msg_count = seq;
        message.header.send_time = self.clock.now();

        let written = transport.send_all(&message.encode()).inspect_err(|e| {
            error!(msg_type = %message.message_type(), seq, error = %e, "Send failed");
        })?;
        self.msg_count = seq;

        debug!(msg_type = %message.message_type(), seq, bytes = written, "Sent message");
        Ok(Some(written))
    }

    // ---------------------------------------------------------------------
    // Receiving
    // ---------------------------------------------------------------------

    /// Wait up to `timeout` for the next message
    ///
    /// A negative timeout blocks, zero polls once. Once a header has been
    /// read the payload is read to completion regardless of the timeout.
    pub fn receive(&mut self, timeout: impl Into<Timeout>) -> Result<Option<Message>> {
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;

        if transport.wait_ready(Direction::Read, timeout.into())? == Readiness::TimedOut {
            return Ok(None);
        }

        let mut raw = [0u8; MessageHeader::SIZE];
        transport.recv_exact(&mut raw, "recv header").inspect_err(|e| {
            error!(error = %e, "Failed to read message header");
        })?;
        let mut header = MessageHeader::decode(&raw)?;

        let len = header.payload_len().inspect_err(|e| {
            error!(error = %e, "Corrupt header from message manager");
        })?;
        let mut body = vec![0u8; len];
        if len > 0 {
            transport.recv_exact(&mut body, "recv payload").inspect_err(|e| {
                error!(msg_type = header.msg_type, error = %e, "Failed to read payload");
            })?;
        }

        header.recv_time = self.clock.now();
        let message = Message::new(header, Payload::try_from(body)?);

        debug!(
            msg_type = %message.message_type(),
            seq = header.msg_count,
            bytes = len,
            src = header.src_mod_id,
            "Received message"
        );
        Ok(Some(message))
    }

    /// Wait for an ACKNOWLEDGE, discarding anything else that arrives
    ///
    /// The deadline is fixed when the call starts; discarded messages do not
    /// extend it. At least one receive is always attempted.
    pub fn wait_for_ack(&mut self, timeout: Duration) -> Result<Option<Message>> {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => MAX_ACK_PROBE,
            };

            if let Some(message) = self.receive(remaining.min(MAX_ACK_PROBE))? {
                if message.message_type().is(ControlVerb::Acknowledge) {
                    debug!(seq = message.header.msg_count, "Received ACKNOWLEDGE");
                    return Ok(Some(message));
                }
                trace!(msg_type = %message.message_type(), "Discarding while waiting for ACKNOWLEDGE");
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(None);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Subscription control
    // ---------------------------------------------------------------------

    pub fn subscribe(&mut self, msg_type: impl Into<MessageType>) -> Result<AckStatus> {
        self.subscription_control(ControlVerb::Subscribe, msg_type.into())
    }

    pub fn unsubscribe(&mut self, msg_type: impl Into<MessageType>) -> Result<AckStatus> {
        self.subscription_control(ControlVerb::Unsubscribe, msg_type.into())
    }

    pub fn pause_subscription(&mut self, msg_type: impl Into<MessageType>) -> Result<AckStatus> {
        self.subscription_control(ControlVerb::PauseSubscription, msg_type.into())
    }

    pub fn resume_subscription(&mut self, msg_type: impl Into<MessageType>) -> Result<AckStatus> {
        self.subscription_control(ControlVerb::ResumeSubscription, msg_type.into())
    }

    fn subscription_control(&mut self, verb: ControlVerb, msg_type: MessageType) -> Result<AckStatus> {
        let request = SubscriptionControl {
            msg_type: msg_type.raw(),
        };
        if self.send(verb, request.as_bytes())?.is_none() {
            trace!(verb = verb.name(), %msg_type, "Subscription request not sent before timeout");
            return Ok(AckStatus::TimedOut);
        }

        let timeout = self.ack_timeout;
        match self.wait_for_ack(timeout)? {
            Some(_) => Ok(AckStatus::Acknowledged),
            None => {
                trace!(verb = verb.name(), %msg_type, ?timeout, "No ACKNOWLEDGE");
                Ok(AckStatus::TimedOut)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Current module id; broker-assigned after a dynamic connect
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Sequence number of the last message sent on this connection
    pub fn msg_count(&self) -> i32 {
        self.msg_count
    }

    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    /// Timestamp taken when the current connection was opened, 0 when unconnected
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    pub fn send_timeout(&self) -> Timeout {
        self.send_timeout
    }

    pub fn transport_stats(&self) -> Option<TransportStats> {
        self.transport.as_ref().map(|t| t.stats())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.transport.is_some() {
            debug!(module_id = self.module_id, "Dropping connected session without DISCONNECT");
            self.teardown(ClientState::Disconnected);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("server_addr", &self.server_addr)
            .field("module_id", &self.module_id)
            .field("host_id", &self.host_id)
            .field("msg_count", &self.msg_count)
            .finish_non_exhaustive()
    }
}

fn validate_destination(dest_mod_id: ModuleId, dest_host_id: HostId) -> Result<()> {
    if !(0..=MAX_MODULES).contains(&dest_mod_id) {
        return Err(ProtocolError::InvalidDestination {
            field: "dest_mod_id",
            value: i32::from(dest_mod_id),
            allowed: "0..=200",
        }
        .into());
    }
    if !(0..=MAX_HOSTS).contains(&dest_host_id) && dest_host_id != host_ids::ALL_HOSTS {
        return Err(ProtocolError::InvalidDestination {
            field: "dest_host_id",
            value: i32::from(dest_host_id),
            allowed: "0..=5 or ALL_HOSTS",
        }
        .into());
    }
    Ok(())
}
