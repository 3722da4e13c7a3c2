//! CLI session: login handshake, prompt-framed command execution, release.
//!
//! A [`Session`] owns one transport for its whole life and serves exactly
//! one caller. The protocol is half-duplex, so `execute` takes `&mut self`
//! and the borrow checker rules out interleaving two commands.
//!
//! Every `execute` queues exactly one audit entry on the session's
//! [`AuditLog`]. If a command times out or the transport drops, the session
//! tears its transport down and every later call fails fast: a late prompt
//! from the abandoned command would otherwise be read as the next
//! command's output.

mod audit;
mod response;

pub use audit::{AuditLog, AuditSink};
pub use response::Response;

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use log::{debug, warn};
use regex::Regex;
use secrecy::ExposeSecret;

use crate::channel::{Channel, ChannelConfig};
use crate::error::{ChannelError, CommandError, ConnectError, LoginStage};
use crate::model::{CommandLogEntry, CommandStatus};
use crate::platform::OltPlatform;
use crate::transport::{ConnectParams, Transport};

static PASSWORD_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\bpassword\s+)\S+").unwrap());

/// Mask inline passwords for log lines.
pub(crate) fn redact(command: &str) -> Cow<'_, str> {
    PASSWORD_ARG.replace_all(command, "${1}******")
}

/// An authenticated CLI session on one device.
pub struct Session<T> {
    channel: Channel<T>,
    platform: Arc<OltPlatform>,
    host: String,
    audit: AuditLog,
    closed: bool,
}

impl<T: Transport> Session<T> {
    /// Log in over an open transport.
    ///
    /// Waits for the username and password prompts (skipped when the
    /// transport already authenticated, as SSH does), then the shell
    /// prompt, then disables paging. Each stage is bounded by
    /// `params.timeout`. On failure the transport is released before the
    /// error is returned.
    pub async fn open(
        transport: T,
        params: &ConnectParams,
        platform: Arc<OltPlatform>,
        audit: AuditLog,
    ) -> Result<Self, ConnectError> {
        let config = ChannelConfig {
            timeout: params.timeout,
            search_depth: platform.search_depth,
        };
        let authenticated = transport.is_authenticated();

        let mut session = Self {
            channel: Channel::new(transport, config),
            platform,
            host: params.host.clone(),
            audit,
            closed: false,
        };

        if let Err(e) = session.login(params, authenticated).await {
            session.release().await;
            return Err(e);
        }

        debug!("{}: session open", session.host);
        Ok(session)
    }

    async fn login(&mut self, params: &ConnectParams, authenticated: bool) -> Result<(), ConnectError> {
        let platform = Arc::clone(&self.platform);

        if !authenticated {
            debug!("{}: waiting for username prompt", self.host);
            self.channel
                .read_until(&platform.login_pattern)
                .await
                .map_err(|e| self.handshake(LoginStage::Username, e))?;
            self.channel
                .write_line(&params.username)
                .await
                .map_err(|e| self.handshake(LoginStage::Username, e))?;

            debug!("{}: waiting for password prompt", self.host);
            self.channel
                .read_until(&platform.password_pattern)
                .await
                .map_err(|e| self.handshake(LoginStage::Password, e))?;
            self.channel
                .write_line(params.password.expose_secret())
                .await
                .map_err(|e| self.handshake(LoginStage::Password, e))?;
        }

        debug!("{}: waiting for shell prompt", self.host);
        self.channel
            .read_until(&platform.prompt_pattern)
            .await
            .map_err(|e| self.handshake(LoginStage::ShellPrompt, e))?;

        if !platform.paging_command.is_empty() {
            debug!("{}: disabling paging", self.host);
            self.channel
                .write_line(&platform.paging_command)
                .await
                .map_err(|e| self.handshake(LoginStage::DisablePaging, e))?;
            self.channel
                .read_until(&platform.prompt_pattern)
                .await
                .map_err(|e| self.handshake(LoginStage::DisablePaging, e))?;
        }

        Ok(())
    }

    fn handshake(&self, stage: LoginStage, source: ChannelError) -> ConnectError {
        ConnectError::Handshake {
            host: self.host.clone(),
            stage,
            source,
        }
    }

    /// Device host this session is connected to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Platform driving this session.
    pub fn platform(&self) -> &OltPlatform {
        &self.platform
    }

    /// Whether the session can still execute commands.
    pub fn is_open(&self) -> bool {
        !self.closed && self.channel.is_open()
    }

    /// Send `command` and read until the shell prompt reappears.
    ///
    /// A device rejection (a failure pattern in the output) is still
    /// `Ok`; check [`Response::is_success`] or call [`Response::require`].
    /// `Err` means the exchange itself failed, after which the session is
    /// unusable. The exception is a command containing a line break, which
    /// is refused without touching the device.
    pub async fn execute(&mut self, command: &str) -> Result<Response, CommandError> {
        let result = self.exchange(command).await;

        let entry = match &result {
            Ok(response) => {
                let status = if response.is_success() {
                    CommandStatus::Success
                } else {
                    CommandStatus::Error
                };
                CommandLogEntry::new(&self.host, command, &response.raw, status)
            }
            Err(e) => CommandLogEntry::new(&self.host, command, e.to_string(), CommandStatus::Error),
        };
        self.audit.record(entry);

        if result.as_ref().is_err_and(CommandError::poisons_session) {
            self.release().await;
        }
        result
    }

    async fn exchange(&mut self, command: &str) -> Result<Response, CommandError> {
        let channel_err = |source| CommandError::Channel {
            command: command.to_string(),
            source,
        };

        if self.closed {
            return Err(channel_err(ChannelError::Closed));
        }

        debug!("{}: executing '{}'", self.host, redact(command));
        let start = Instant::now();

        self.channel.write_line(command).await.map_err(channel_err)?;
        let data = self
            .channel
            .read_until(&self.platform.prompt_pattern)
            .await
            .map_err(channel_err)?;

        let elapsed = start.elapsed();
        let raw = String::from_utf8_lossy(&data).into_owned();

        let prompt = self
            .platform
            .prompt_pattern
            .find(&data)
            .map(|m| String::from_utf8_lossy(m.as_bytes()).trim().to_string())
            .unwrap_or_default();

        let output = self.platform.normalize_output(&raw, command);
        let response = Response::new(command, output, raw, prompt, elapsed);

        match self.platform.detect_failure(&response.output) {
            Some(pattern) => {
                debug!("{}: '{}' rejected ({})", self.host, redact(command), pattern);
                let pattern = pattern.to_string();
                Ok(response.with_failure(pattern))
            }
            None => Ok(response),
        }
    }

    /// Close the session and release the transport.
    pub async fn close(mut self) {
        self.release().await;
        debug!("{}: session closed", self.host);
    }

    async fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.channel.shutdown().await {
            debug!("{}: error while releasing transport: {}", self.host, e);
        }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        if !self.closed {
            // The transport is dropped with the session, which closes the
            // socket; only the orderly logout is skipped.
            warn!("{}: session dropped without close", self.host);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::platform::vendors::zte;
    use crate::testing::{FakeOlt, FakeTransport, Reply, connect_params};

    async fn open(olt: &FakeOlt) -> Session<FakeTransport> {
        Session::open(
            olt.transport(),
            &connect_params(),
            Arc::new(zte::platform()),
            AuditLog::disabled(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_and_execute() {
        let olt = FakeOlt::new().reply("show card", "Rack Shelf Slot\r\n1    1     1    GTGO");
        let mut session = open(&olt).await;

        let response = session.execute("show card").await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.output, "Rack Shelf Slot\n1    1     1    GTGO");
        assert_eq!(response.prompt, "ZXAN#");

        session.close().await;
        assert_eq!(olt.received(), vec!["terminal length 0", "show card"]);
    }

    #[tokio::test]
    async fn test_rejected_command_is_ok_with_failure() {
        let olt = FakeOlt::new();
        let mut session = open(&olt).await;

        let response = session.execute("show nonsense").await.unwrap();
        assert!(!response.is_success());
        assert_eq!(response.failure_message.as_deref(), Some("%Error"));
        assert!(session.is_open());
        session.close().await;
    }

    #[tokio::test]
    async fn test_login_stalls_at_password() {
        let olt = FakeOlt::new().without_password_prompt();
        let mut params = connect_params();
        params.timeout = Duration::from_millis(100);

        let err = Session::open(
            olt.transport(),
            &params,
            Arc::new(zte::platform()),
            AuditLog::disabled(),
        )
        .await
        .err()
        .unwrap();

        match err {
            ConnectError::Handshake { stage, .. } => assert_eq!(stage, LoginStage::Password),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hangup_poisons_session() {
        let olt = FakeOlt::new().respond("show running", Reply::Hangup);
        let mut session = open(&olt).await;

        let err = session.execute("show running").await.unwrap_err();
        assert!(matches!(err, CommandError::Channel { .. }));
        assert!(!session.is_open());

        let err = session.execute("show card").await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Channel {
                source: ChannelError::Closed,
                ..
            }
        ));
        session.close().await;
    }

    #[tokio::test]
    async fn test_silent_device_times_out_and_poisons() {
        let olt = FakeOlt::new().respond("show running", Reply::Silent);
        let mut params = connect_params();
        params.timeout = Duration::from_millis(200);

        let mut session = Session::open(
            olt.transport(),
            &params,
            Arc::new(zte::platform()),
            AuditLog::disabled(),
        )
        .await
        .unwrap();

        let err = session.execute("show running").await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Channel {
                source: ChannelError::PatternTimeout(_),
                ..
            }
        ));
        assert!(!session.is_open());

        let err = session.execute("show card").await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Channel {
                source: ChannelError::Closed,
                ..
            }
        ));
        session.close().await;
        assert!(olt.wait_all_closed().await);
        assert_eq!(olt.received(), vec!["terminal length 0", "show running"]);
    }

    #[tokio::test]
    async fn test_line_break_refused_without_poisoning() {
        let olt = FakeOlt::new().reply("show card", "1 1 1 GTGO");
        let mut session = open(&olt).await;

        let err = session.execute("show card\nwrite").await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Channel {
                source: ChannelError::LineBreak,
                ..
            }
        ));
        assert!(session.is_open());

        let response = session.execute("show card").await.unwrap();
        assert_eq!(response.output, "1 1 1 GTGO");
        session.close().await;
        assert_eq!(olt.received(), vec!["terminal length 0", "show card"]);
    }

    #[tokio::test]
    async fn test_audit_entry_per_execute() {
        let sink = crate::testing::MemoryAudit::default();
        let audit = AuditLog::spawn(sink.clone());
        let olt = FakeOlt::new().reply("show card", "1 1 1 GTGO");

        let mut session = Session::open(
            olt.transport(),
            &connect_params(),
            Arc::new(zte::platform()),
            audit.clone(),
        )
        .await
        .unwrap();
        session.execute("show card").await.unwrap();
        session.execute("show nonsense").await.unwrap();
        session.close().await;
        audit.flush().await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, "show card");
        assert_eq!(entries[0].status, CommandStatus::Success);
        assert_eq!(entries[1].status, CommandStatus::Error);
    }

    #[test]
    fn test_redact() {
        assert_eq!(
            redact("wan-ip 1 mode pppoe username u1 password p1 vlan-profile v100"),
            "wan-ip 1 mode pppoe username u1 password ****** vlan-profile v100"
        );
        assert_eq!(redact("show card"), "show card");
    }
}
