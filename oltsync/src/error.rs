//! Error types for oltsync.
//!
//! Parse problems are deliberately absent: parsers absorb malformed lines
//! into sentinel values (`NaN`, `0`, `"-"`) instead of failing.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for oltsync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Login handshake failed or timed out
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// A command never completed or the device rejected a mandatory command
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// A mutating script hit an error marker and stopped
    #[error("Script aborted: {0}")]
    ScriptAborted(#[from] ScriptAbortedError),

    /// The poll snapshot could not be committed
    #[error("Reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),

    /// Persistence outside the snapshot transaction
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An earlier target in the same batch already polls this host
    #[error("{host} is already polled by an earlier target in this batch")]
    DuplicateTarget { host: String },
}

/// Transport layer errors (TCP/telnet, SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key not present in known_hosts (strict mode)
    #[error("Unknown host key for {host}:{port}")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (prompt matching over a transport).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern matching timed out
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Peer closed the stream before the pattern appeared
    #[error("Channel closed")]
    Closed,

    /// Underlying transport failed
    #[error("Channel transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Line to send contains a carriage return or newline
    #[error("Refusing to send a line containing a line break")]
    LineBreak,
}

/// Step of the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Username,
    Password,
    ShellPrompt,
    DisablePaging,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            LoginStage::Username => "username prompt",
            LoginStage::Password => "password prompt",
            LoginStage::ShellPrompt => "shell prompt",
            LoginStage::DisablePaging => "paging disable",
        };
        f.write_str(stage)
    }
}

/// Failure to establish an authenticated CLI session.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Transport could not be opened
    #[error("Cannot reach {host}:{port}: {source}")]
    Unreachable {
        host: String,
        port: u16,
        #[source]
        source: TransportError,
    },

    /// A handshake step did not see its expected pattern
    #[error("Login to {host} failed at {stage}: {source}")]
    Handshake {
        host: String,
        stage: LoginStage,
        #[source]
        source: ChannelError,
    },
}

/// Failure of a single command exchange.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The prompt never reappeared or the transport dropped
    #[error("Command '{command}' failed: {source}")]
    Channel {
        command: String,
        #[source]
        source: ChannelError,
    },

    /// A mandatory command was answered with a device error
    #[error("Command '{command}' rejected by device: {message}")]
    Rejected {
        command: String,
        message: String,
        output: String,
    },
}

impl CommandError {
    /// Whether the exchange left the session out of step with the device.
    ///
    /// A refused line never reached the device, so the session stays usable.
    pub fn poisons_session(&self) -> bool {
        !matches!(
            self,
            CommandError::Rejected { .. }
                | CommandError::Channel {
                    source: ChannelError::LineBreak,
                    ..
                }
        )
    }
}

/// A mutating command script observed an error marker and stopped.
///
/// Scripts are not transactional on the device: every command before
/// `command` has already been applied.
#[derive(Error, Debug)]
#[error("'{command}' answered with an error: {output}")]
pub struct ScriptAbortedError {
    /// The command whose response carried the marker.
    pub command: String,

    /// The offending device output.
    pub output: String,
}

/// The poll snapshot transaction failed and was rolled back.
#[derive(Error, Debug)]
#[error("Snapshot for {host} rolled back: {source}")]
pub struct ReconciliationError {
    pub host: String,
    #[source]
    pub source: sqlx::Error,
}

/// Persistence errors outside the snapshot transaction.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Requested device row does not exist
    #[error("Device {0} not found")]
    DeviceNotFound(i64),
}

/// Settings errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed
    #[error("Invalid value '{value}' for {key}")]
    Invalid { key: String, value: String },
}

/// Result type alias using oltsync's Error.
pub type Result<T> = std::result::Result<T, Error>;
