//! RCON client over a Tokio TCP stream.
//!
//! Each [`RconClient::execute`] opens a fresh connection, authenticates,
//! runs one command and drops the socket. Commands are rare (a handful
//! per restart), so holding a long-lived authenticated session would buy
//! nothing and would have to survive server restarts.

use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};
use warden_rcon::{Packet, PacketKind, RconCodec};

use crate::ControlError;

/// Client for one RCON endpoint.
#[derive(Debug, Clone)]
pub struct RconClient {
    addr: String,
    password: String,
    timeout: Duration,
}

impl RconClient {
    /// Creates a client. Nothing is connected until the first command.
    pub fn new(addr: impl Into<String>, password: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            password: password.into(),
            timeout,
        }
    }

    /// The `host:port` this client talks to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Runs `command` and returns the server's response body.
    ///
    /// The whole exchange (connect, auth, command, reply) is bounded by
    /// the client timeout.
    pub async fn execute(&self, command: &str) -> Result<String, ControlError> {
        tokio::time::timeout(self.timeout, self.exchange(command))
            .await
            .map_err(|_| ControlError::Timeout(self.timeout))?
    }

    async fn exchange(&self, command: &str) -> Result<String, ControlError> {
        let mut conn = RconConnection::connect(&self.addr).await?;
        conn.authenticate(&self.password).await?;
        let body = conn.command(command).await?;
        debug!(addr = %self.addr, command, "RCON command executed");
        Ok(body)
    }
}

/// One authenticated-or-not TCP session.
struct RconConnection {
    stream: TcpStream,
    buf: Vec<u8>,
    next_id: i32,
}

impl RconConnection {
    async fn connect(addr: &str) -> Result<Self, ControlError> {
        let stream = TcpStream::connect(addr).await?;
        // Random starting id so replies from a previous, half-closed
        // session can't be mistaken for ours.
        let next_id = rand::rng().random_range(1..0x3fff_ffff);
        Ok(Self {
            stream,
            buf: Vec::with_capacity(512),
            next_id,
        })
    }

    fn allocate_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    async fn authenticate(&mut self, password: &str) -> Result<(), ControlError> {
        let id = self.allocate_id();
        self.send(&Packet::auth(id, password)).await?;

        // Source servers send an empty RESPONSE_VALUE before the real
        // AUTH_RESPONSE; skip anything that isn't the auth answer.
        loop {
            let reply = self.recv().await?;
            if reply.kind != PacketKind::AUTH_RESPONSE {
                trace!(kind = %reply.kind, "skipping pre-auth packet");
                continue;
            }
            if reply.is_auth_failure() {
                return Err(ControlError::AuthFailed);
            }
            return Ok(());
        }
    }

    async fn command(&mut self, command: &str) -> Result<String, ControlError> {
        let id = self.allocate_id();
        self.send(&Packet::command(id, command)).await?;

        loop {
            let reply = self.recv().await?;
            if reply.id == id && reply.kind == PacketKind::RESPONSE_VALUE {
                return Ok(reply.body);
            }
            trace!(id = reply.id, kind = %reply.kind, "skipping unrelated packet");
        }
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), ControlError> {
        let frame = RconCodec.encode(packet)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Packet, ControlError> {
        loop {
            if let Some((packet, used)) = RconCodec.decode_frame(&self.buf)? {
                self.buf.drain(..used);
                return Ok(packet);
            }
            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(ControlError::ConnectionClosed);
            }
        }
    }
}
