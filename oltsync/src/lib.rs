//! # oltsync
//!
//! Async automation for GPON OLTs driven over their text CLI.
//!
//! oltsync logs into an OLT over telnet (or SSH), scrapes its state with a
//! fixed command sequence, and reconciles what it sees into SQLite. It also
//! pushes short configuration scripts, such as declaring a new ONU, and
//! answers on-demand lookups like optical levels or alarm logs.
//!
//! ## Features
//!
//! - Telnet with option negotiation, or SSH via russh
//! - Prompt-framed command execution with per-command timeouts
//! - Defensive parsers: a malformed line degrades a field, never a poll
//! - One transaction per poll snapshot; ONUs keyed globally by serial
//! - Fire-and-forget audit log of every command sent
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oltsync::{Controller, DeviceTarget, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), oltsync::Error> {
//!     let settings = Settings::from_env()?;
//!     let controller = Controller::from_settings(settings).await?;
//!
//!     let report = controller.poll_device(&DeviceTarget::Defaults).await?;
//!     println!("{} ONUs on {} ports", report.snapshot.onus.len(), report.snapshot.ports.len());
//!
//!     controller.audit().flush().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod parse;
pub mod platform;
pub mod poll;
pub mod provision;
pub mod query;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{Settings, UplinkFallback};
pub use controller::{Controller, DeviceTarget};
pub use error::{Error, Result};
pub use model::{DeviceSnapshot, OnuRecord, PortHealth};
pub use platform::OltPlatform;
pub use poll::PollReport;
pub use provision::{ConfigScript, OnuProvisioning, PppoeCredentials, Provisioned};
pub use session::{AuditLog, Response, Session};
pub use store::Store;
pub use transport::{ConnectParams, NetConnector, TransportKind};
