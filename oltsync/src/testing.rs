//! Test fixtures: a scripted fake OLT served over in-memory duplex pipes,
//! a connector for it, an in-memory store and an audit sink.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf};

use crate::config::Settings;
use crate::controller::Controller;
use crate::error::{StoreError, TransportError};
use crate::model::CommandLogEntry;
use crate::platform::vendors::zte;
use crate::session::AuditSink;
use crate::store::Store;
use crate::transport::{ConnectParams, Connector, TelnetTransport};

/// How the fake device answers one command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Print this output followed by the prompt.
    Output(String),
    /// Drop the connection without answering.
    Hangup,
    /// Never answer.
    Silent,
}

#[derive(Default)]
struct FakeState {
    exact: HashMap<String, Reply>,
    prefixes: Vec<(String, Reply)>,
    received: Vec<String>,
    connections: usize,
    closed: usize,
    active: usize,
    peak: usize,
    unreachable: bool,
}

impl FakeState {
    fn lookup(&self, command: &str) -> Option<Reply> {
        if let Some(reply) = self.exact.get(command) {
            return Some(reply.clone());
        }
        self.prefixes
            .iter()
            .rev()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply.clone())
    }
}

/// Scripted ZXAN lookalike.
///
/// Unscripted `show ...` commands get `%Error 20203: Unknown command.`;
/// any other unscripted command is accepted silently, which is how the
/// device treats configuration lines.
#[derive(Clone)]
pub struct FakeOlt {
    state: Arc<Mutex<FakeState>>,
    password_prompt: bool,
    latency: Duration,
}

impl FakeOlt {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            password_prompt: true,
            latency: Duration::ZERO,
        }
    }

    /// Wait `latency` before answering each command.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer `command` with `output`.
    pub fn reply(self, command: &str, output: &str) -> Self {
        self.set_reply(command, Reply::Output(output.to_string()));
        self
    }

    /// Answer `command` with `reply`.
    pub fn respond(self, command: &str, reply: Reply) -> Self {
        self.set_reply(command, reply);
        self
    }

    /// Answer every command starting with `prefix` with `output`.
    pub fn reply_prefix(self, prefix: &str, output: &str) -> Self {
        self.lock()
            .prefixes
            .push((prefix.to_string(), Reply::Output(output.to_string())));
        self
    }

    /// Replace the reply for `command` on a running fake.
    pub fn set_reply(&self, command: &str, reply: Reply) {
        self.lock().exact.insert(command.to_string(), reply);
    }

    /// Never show the password prompt.
    pub fn without_password_prompt(mut self) -> Self {
        self.password_prompt = false;
        self
    }

    /// Refuse connections from [`FakeConnector`].
    pub fn unreachable(self) -> Self {
        self.lock().unreachable = true;
        self
    }

    /// Commands received after login, in order.
    pub fn received(&self) -> Vec<String> {
        self.lock().received.clone()
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Most client connections open at the same time so far.
    pub fn peak_connections(&self) -> usize {
        self.lock().peak
    }

    /// Wait until every accepted connection has been closed by the client.
    pub async fn wait_all_closed(&self) -> bool {
        for _ in 0..200 {
            {
                let state = self.lock();
                if state.closed == state.connections {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    /// Open a new connection and return the client end.
    pub fn transport(&self) -> FakeTransport {
        let (client, device) = tokio::io::duplex(64 * 1024);
        {
            let mut state = self.lock();
            state.connections += 1;
            state.active += 1;
            state.peak = state.peak.max(state.active);
        }
        tokio::spawn(serve(
            Arc::clone(&self.state),
            device,
            self.password_prompt,
            self.latency,
        ));
        TelnetTransport::new(FakeStream {
            inner: client,
            state: Arc::clone(&self.state),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

/// Client end of a fake connection. Counts as open until dropped.
pub struct FakeStream {
    inner: DuplexStream,
    state: Arc<Mutex<FakeState>>,
}

pub type FakeTransport = TelnetTransport<FakeStream>;

impl Drop for FakeStream {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.active -= 1;
        }
    }
}

impl AsyncRead for FakeStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for FakeStream {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

fn prompt_after(command: &str, current: &str) -> String {
    if command == "conf t" || command == "configure terminal" {
        "ZXAN(config)#".to_string()
    } else if command == "end" {
        "ZXAN#".to_string()
    } else if command.starts_with("interface ") {
        "ZXAN(config-if)#".to_string()
    } else if command.starts_with("pon-onu-mng ") {
        "ZXAN(gpon-onu-mng)#".to_string()
    } else if command == "exit" && current != "ZXAN#" {
        "ZXAN(config)#".to_string()
    } else {
        current.to_string()
    }
}

async fn serve(state: Arc<Mutex<FakeState>>, device: DuplexStream, password_prompt: bool, latency: Duration) {
    let (read, mut write) = tokio::io::split(device);
    let mut lines = BufReader::new(read).lines();

    let mark_closed = |state: &Arc<Mutex<FakeState>>| state.lock().unwrap().closed += 1;

    if write.write_all(b"\r\n\r\nUsername:").await.is_err() {
        return mark_closed(&state);
    }
    if lines.next_line().await.ok().flatten().is_none() {
        return mark_closed(&state);
    }

    if !password_prompt {
        while let Ok(Some(_)) = lines.next_line().await {}
        return mark_closed(&state);
    }

    if write.write_all(b"Password:").await.is_err()
        || lines.next_line().await.ok().flatten().is_none()
    {
        return mark_closed(&state);
    }

    let mut prompt = "ZXAN#".to_string();
    if write.write_all(b"\r\n\r\nZXAN#").await.is_err() {
        return mark_closed(&state);
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let command = line.trim().to_string();
        let reply = {
            let mut state = state.lock().unwrap();
            state.received.push(command.clone());
            state.lookup(&command)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let output = match reply {
            Some(Reply::Output(output)) => output,
            Some(Reply::Hangup) => break,
            Some(Reply::Silent) => continue,
            None if command.starts_with("show ") => "%Error 20203: Unknown command.".to_string(),
            None => String::new(),
        };

        prompt = prompt_after(&command, &prompt);
        let mut frame = format!("{}\r\n", command);
        if !output.is_empty() {
            frame.push_str(&output.replace('\n', "\r\n").replace("\r\r\n", "\r\n"));
            frame.push_str("\r\n");
        }
        frame.push_str(&prompt);

        if write.write_all(frame.as_bytes()).await.is_err() {
            break;
        }
    }

    mark_closed(&state);
}

/// Connector handing out connections to a [`FakeOlt`].
#[derive(Clone)]
pub struct FakeConnector {
    pub olt: FakeOlt,
}

impl Connector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(&self, params: &ConnectParams) -> Result<Self::Transport, TransportError> {
        if self.olt.lock().unreachable {
            return Err(TransportError::ConnectionFailed {
                host: params.host.clone(),
                port: params.port,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        Ok(self.olt.transport())
    }
}

/// Telnet parameters for the fake device.
pub fn connect_params() -> ConnectParams {
    let mut params = ConnectParams::telnet("olt.test", "admin", "secret");
    params.timeout = Duration::from_secs(2);
    params
}

/// Single-connection in-memory store with the schema applied.
pub async fn memory_store() -> Store {
    Store::in_memory().await.unwrap()
}

/// Controller driving `olt` with defaults pointing at it and a fresh
/// in-memory store.
pub async fn controller(olt: &FakeOlt) -> Controller<FakeConnector> {
    controller_with(olt, |_| {}).await
}

/// Like [`controller`], with `adjust` applied to the settings.
pub async fn controller_with(olt: &FakeOlt, adjust: impl FnOnce(&mut Settings)) -> Controller<FakeConnector> {
    let mut settings = Settings::default();
    settings.defaults.host = "olt.test".to_string();
    settings.defaults.password = "secret".to_string().into();
    settings.command_timeout = Duration::from_secs(2);
    adjust(&mut settings);
    Controller::new(
        memory_store().await,
        FakeConnector { olt: olt.clone() },
        zte::platform(),
        settings,
    )
}

/// Audit sink collecting entries in memory.
#[derive(Clone, Default)]
pub struct MemoryAudit {
    entries: Arc<Mutex<Vec<CommandLogEntry>>>,
}

impl MemoryAudit {
    pub fn entries(&self) -> Vec<CommandLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl AuditSink for MemoryAudit {
    async fn append(&self, entry: &CommandLogEntry) -> Result<(), StoreError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Install a test logger once.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
