//! Shared context for device operations.
//!
//! A [`Controller`] owns everything a poll or a provisioning run needs
//! besides the session itself: the store, a way to open transports, the
//! platform definition, the resolved [`Settings`] and the audit writer.
//! Sessions are only ever handed out through [`Controller::with_session`],
//! which closes them on every exit path.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::debug;
use secrecy::{ExposeSecret, SecretString};

use crate::config::Settings;
use crate::error::{ConnectError, Error, Result};
use crate::model::DeviceRecord;
use crate::platform::OltPlatform;
use crate::platform::vendors::zte;
use crate::session::{AuditLog, Session};
use crate::store::Store;
use crate::transport::{ConnectParams, Connector, NetConnector, SshOptions};

/// Which device an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceTarget {
    /// A stored device row. Falls back to the default device when the row
    /// does not exist.
    Id(i64),
    /// The default device from settings.
    Defaults,
}

/// Device operations context.
pub struct Controller<C: Connector = NetConnector> {
    pub(crate) store: Store,
    connector: C,
    platform: Arc<OltPlatform>,
    pub(crate) settings: Arc<Settings>,
    audit: AuditLog,
}

impl Controller<NetConnector> {
    /// Connect the store named in `settings` and drive ZXAN devices over
    /// the network, auditing every command into the store.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let store = Store::connect(&settings.database_url).await?;
        Ok(Self::new(store, NetConnector, zte::platform(), settings))
    }
}

impl<C: Connector> Controller<C> {
    /// Create a controller. Spawns the audit writer on the current runtime.
    pub fn new(store: Store, connector: C, platform: OltPlatform, settings: Settings) -> Self {
        let audit = AuditLog::spawn(store.clone());
        Self {
            store,
            connector,
            platform: Arc::new(platform),
            settings: Arc::new(settings),
            audit,
        }
    }

    /// Replace the audit writer.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn platform(&self) -> &OltPlatform {
        &self.platform
    }

    /// Handle to the audit writer, e.g. to flush it.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Connection parameters for `target`.
    pub async fn resolve_params(&self, target: &DeviceTarget) -> Result<ConnectParams> {
        let timeout = self.settings.command_timeout;
        match target {
            DeviceTarget::Id(id) => match self.store.device_by_id(*id).await? {
                Some(device) => Ok(device_params(&device, timeout)),
                None => {
                    debug!("device {} not stored, using defaults", id);
                    Ok(self.settings.defaults.connect_params(timeout))
                }
            },
            DeviceTarget::Defaults => Ok(self.settings.defaults.connect_params(timeout)),
        }
    }

    /// Open a transport and log in.
    ///
    /// Prefer [`with_session`](Self::with_session), which guarantees the
    /// session is closed.
    pub async fn open_session(
        &self,
        params: &ConnectParams,
    ) -> std::result::Result<Session<C::Transport>, ConnectError> {
        let transport = self
            .connector
            .connect(params)
            .await
            .map_err(|source| ConnectError::Unreachable {
                host: params.host.clone(),
                port: params.port,
                source,
            })?;

        Session::open(transport, params, Arc::clone(&self.platform), self.audit.clone()).await
    }

    /// Open a session, run `f` on it, and close it whatever `f` returned.
    ///
    /// If `f` panics the session is dropped during unwinding, which drops
    /// the transport and with it the connection.
    ///
    /// ```rust,no_run
    /// # use oltsync::{Controller, DeviceTarget};
    /// # async fn example(controller: Controller) -> oltsync::Result<()> {
    /// let params = controller.resolve_params(&DeviceTarget::Defaults).await?;
    /// let output = controller
    ///     .with_session(&params, |session| {
    ///         Box::pin(async move { Ok(session.execute("show card").await?.require()?.output) })
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_session<R, F>(&self, params: &ConnectParams, f: F) -> Result<R>
    where
        F: for<'s> FnOnce(&'s mut Session<C::Transport>) -> BoxFuture<'s, Result<R>>,
    {
        let mut session = self.open_session(params).await.map_err(Error::from)?;
        let result = f(&mut session).await;
        session.close().await;
        result
    }
}

/// Connection parameters for a stored device.
fn device_params(device: &DeviceRecord, timeout: std::time::Duration) -> ConnectParams {
    ConnectParams {
        host: device.host.clone(),
        port: device.port,
        username: device.username.clone(),
        password: SecretString::from(device.password.expose_secret().to_string()),
        kind: device.transport,
        timeout,
        ssh: SshOptions::default(),
    }
}
