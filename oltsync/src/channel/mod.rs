//! Channel layer: prompt-framed reads over a transport.
//!
//! A [`Channel`] owns the transport and a [`PatternBuffer`]. Every read is
//! "until this pattern appears at the tail, or the deadline passes".

mod buffer;
mod patterns;

pub use buffer::PatternBuffer;
pub use patterns::{compile_login_pattern, compile_prompt_pattern};

use std::time::Duration;

use log::trace;
use regex::bytes::Regex;
use tokio::time::Instant;

use crate::error::ChannelError;
use crate::transport::Transport;

/// Configuration for channel behavior.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Default timeout for read operations.
    pub timeout: Duration,

    /// Search depth for pattern matching.
    pub search_depth: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            search_depth: 1000,
        }
    }
}

/// Prompt-framed channel over one transport.
pub struct Channel<T> {
    transport: T,
    config: ChannelConfig,
    buffer: PatternBuffer,
    is_open: bool,
}

impl<T: Transport> Channel<T> {
    /// Create a new channel around an open transport.
    pub fn new(transport: T, config: ChannelConfig) -> Self {
        Self {
            buffer: PatternBuffer::new(config.search_depth),
            transport,
            config,
            is_open: true,
        }
    }

    /// Check if the channel is open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Get the default timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Access the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `line` followed by a newline.
    ///
    /// A line that itself contains `\r` or `\n` is refused before anything
    /// is written: the device would run each part as its own command.
    pub async fn write_line(&mut self, line: &str) -> Result<(), ChannelError> {
        if !self.is_open {
            return Err(ChannelError::Closed);
        }
        if line.contains(['\r', '\n']) {
            return Err(ChannelError::LineBreak);
        }
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.transport.send(&data).await?;
        Ok(())
    }

    /// Read until `pattern` matches the buffer tail, using the default timeout.
    pub async fn read_until(&mut self, pattern: &Regex) -> Result<Vec<u8>, ChannelError> {
        let timeout = self.config.timeout;
        self.read_until_timeout(pattern, timeout).await
    }

    /// Read until `pattern` matches the buffer tail.
    ///
    /// Returns everything received up to and including the match.
    pub async fn read_until_timeout(
        &mut self,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<Vec<u8>, ChannelError> {
        if !self.is_open {
            return Err(ChannelError::Closed);
        }

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(data) = self.buffer.take_through(pattern) {
                return Ok(data);
            }

            let chunk = tokio::time::timeout_at(deadline, self.transport.recv())
                .await
                .map_err(|_| ChannelError::PatternTimeout(timeout))??;

            match chunk {
                Some(bytes) => {
                    trace!("channel: received {} bytes", bytes.len());
                    self.buffer.extend(&bytes);
                }
                None => {
                    self.is_open = false;
                    return Err(ChannelError::Closed);
                }
            }
        }
    }

    /// Release the transport. Further reads and writes fail with `Closed`.
    pub async fn shutdown(&mut self) -> Result<(), ChannelError> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;
        self.buffer.clear();
        self.transport.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TelnetTransport;

    fn prompt() -> Regex {
        compile_prompt_pattern(r"ZXAN.*#").unwrap()
    }

    #[tokio::test]
    async fn test_read_until_across_chunks() {
        let mock = tokio_test::io::Builder::new()
            .read(b"show card\r\nRack Shelf")
            .read(b" Slot\r\nZX")
            .read(b"AN#")
            .build();
        let mut channel = Channel::new(TelnetTransport::new(mock), ChannelConfig::default());

        let data = channel.read_until(&prompt()).await.unwrap();
        let text = String::from_utf8(data).unwrap();
        assert!(text.starts_with("show card"));
        assert!(text.ends_with("ZXAN#"));
    }

    #[tokio::test]
    async fn test_read_until_closed() {
        let mock = tokio_test::io::Builder::new().read(b"partial output").build();
        let mut channel = Channel::new(TelnetTransport::new(mock), ChannelConfig::default());

        let err = channel.read_until(&prompt()).await.unwrap_err();
        assert!(matches!(err, ChannelError::Closed));
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn test_write_line_refuses_line_breaks() {
        let mock = tokio_test::io::Builder::new().write(b"show card\n").build();
        let mut channel = Channel::new(TelnetTransport::new(mock), ChannelConfig::default());

        let err = channel.write_line("name alice\nwrite").await.unwrap_err();
        assert!(matches!(err, ChannelError::LineBreak));
        let err = channel.write_line("show card\r").await.unwrap_err();
        assert!(matches!(err, ChannelError::LineBreak));

        assert!(channel.is_open());
        channel.write_line("show card").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_until_timeout() {
        let (client, _device) = tokio::io::duplex(1024);
        let mut channel = Channel::new(TelnetTransport::new(client), ChannelConfig::default());

        let err = channel
            .read_until_timeout(&prompt(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::PatternTimeout(_)));
    }
}
