//! Transport layer: raw byte streams to the device CLI.
//!
//! Telnet is the conventional carrier for OLT management; SSH is offered
//! for devices that have it enabled. Both are hidden behind [`Transport`]
//! so the session layer only ever sees bytes.

pub mod config;
mod ssh;
mod telnet;

pub use config::{AuthMethod, ConnectParams, HostKeyVerification, SshConfig, SshOptions, TransportKind};
pub use ssh::SshTransport;
pub use telnet::{TelnetCodec, TelnetTransport};

use std::future::Future;

use bytes::Bytes;
use tokio::net::TcpStream;

use crate::error::TransportError;

/// A bidirectional byte stream to one device.
///
/// Strictly half-duplex from the caller's point of view: the session layer
/// writes a line, then reads until a prompt. Implementations are never
/// shared between tasks.
pub trait Transport: Send {
    /// Write raw bytes.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read the next chunk of application data. `None` means end of stream.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Bytes>, TransportError>> + Send;

    /// Release the connection.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether credentials were already checked by the transport itself,
    /// making the in-band Username/Password prompts unnecessary.
    fn is_authenticated(&self) -> bool {
        false
    }
}

/// Opens transports from connection parameters.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Open a transport to the device described by `params`.
    fn connect(
        &self,
        params: &ConnectParams,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// Either of the network transports.
pub enum DeviceTransport {
    Telnet(TelnetTransport<TcpStream>),
    Ssh(SshTransport),
}

impl Transport for DeviceTransport {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            DeviceTransport::Telnet(t) => t.send(data).await,
            DeviceTransport::Ssh(t) => t.send(data).await,
        }
    }

    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self {
            DeviceTransport::Telnet(t) => t.recv().await,
            DeviceTransport::Ssh(t) => t.recv().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self {
            DeviceTransport::Telnet(t) => t.close().await,
            DeviceTransport::Ssh(t) => t.close().await,
        }
    }

    fn is_authenticated(&self) -> bool {
        match self {
            DeviceTransport::Telnet(t) => t.is_authenticated(),
            DeviceTransport::Ssh(t) => t.is_authenticated(),
        }
    }
}

/// Connector for real devices over the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetConnector;

impl Connector for NetConnector {
    type Transport = DeviceTransport;

    async fn connect(&self, params: &ConnectParams) -> Result<DeviceTransport, TransportError> {
        match params.kind {
            TransportKind::Telnet => {
                TelnetTransport::connect(&params.host, params.port, params.timeout)
                    .await
                    .map(DeviceTransport::Telnet)
            }
            TransportKind::Ssh => SshTransport::connect(params.ssh_config())
                .await
                .map(DeviceTransport::Ssh),
        }
    }
}
