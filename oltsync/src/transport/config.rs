//! Connection parameters for device transports.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Which byte stream carries the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Raw telnet, credentials typed in-band at the login prompts.
    #[default]
    Telnet,

    /// SSH with a PTY shell, credentials checked during the SSH handshake.
    Ssh,
}

impl TransportKind {
    /// Conventional port for this transport.
    pub fn default_port(self) -> u16 {
        match self {
            TransportKind::Telnet => 23,
            TransportKind::Ssh => 22,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Telnet => "telnet",
            TransportKind::Ssh => "ssh",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telnet" => Ok(TransportKind::Telnet),
            "ssh" => Ok(TransportKind::Ssh),
            other => Err(other.to_string()),
        }
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking.
    Disabled,
}

/// Authentication method for SSH connections.
#[derive(Debug)]
pub enum AuthMethod {
    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}

/// SSH-only knobs. Ignored for telnet.
#[derive(Debug, Clone, Default)]
pub struct SshOptions {
    /// Use this key instead of the password.
    pub private_key: Option<PathBuf>,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

/// Everything needed to open one CLI session against one OLT.
#[derive(Debug)]
pub struct ConnectParams {
    /// Target host (hostname or IP address).
    pub host: String,

    /// TCP port.
    pub port: u16,

    /// Login username.
    pub username: String,

    /// Login password.
    pub password: SecretString,

    /// Transport flavour.
    pub kind: TransportKind,

    /// Bound for every login stage and every command.
    pub timeout: Duration,

    /// SSH specifics.
    pub ssh: SshOptions,
}

impl ConnectParams {
    /// Telnet parameters with the conventional port and a 30s timeout.
    pub fn telnet(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: TransportKind::Telnet.default_port(),
            username: username.into(),
            password: SecretString::from(password.into()),
            kind: TransportKind::Telnet,
            timeout: Duration::from_secs(30),
            ssh: SshOptions::default(),
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the SSH transport configuration.
    pub fn ssh_config(&self) -> SshConfig {
        let auth = match &self.ssh.private_key {
            Some(path) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: None,
            },
            None => AuthMethod::Password(SecretString::from(
                self.password.expose_secret().to_owned(),
            )),
        };

        SshConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth,
            timeout: self.timeout,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: self.ssh.host_key_verification.clone(),
            known_hosts_path: self.ssh.known_hosts_path.clone(),
        }
    }
}

/// SSH connection configuration.
#[derive(Debug)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,

    /// Connection timeout.
    pub timeout: Duration,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}
