//! Device-side configuration scripts and ONU provisioning.
//!
//! Scripts are not transactional on the device. Every command runs as
//! soon as it is sent; when a later command aborts the script, the earlier
//! ones stay applied in the running configuration (they are only lost if
//! the device restarts before the next `write`). Callers should treat an
//! aborted provisioning run as "partially configured" and let the next
//! poll report what the device actually holds.
//!
//! After a successful run, the provisioned ONU is written to the store
//! from a detached task. That write is best effort: it is never awaited
//! by the provisioning call and its failure is only logged, because the
//! next poll reconciles the ONU authoritatively.

use chrono::Utc;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;

use crate::controller::{Controller, DeviceTarget};
use crate::error::{ConfigError, Result, ScriptAbortedError};
use crate::model::OnuRecord;
use crate::platform::vendors::zte::commands;
use crate::session::{Response, Session, redact};
use crate::transport::{Connector, Transport};

/// RAII guard for a configuration-mode script.
///
/// Holds `&mut Session`, so nothing else can use the session while the
/// script runs. [`commit`](Self::commit) and [`abort`](Self::abort)
/// consume the guard.
pub struct ConfigScript<'a, T: Transport> {
    session: &'a mut Session<T>,
    sent: usize,
    consumed: bool,
}

impl<'a, T: Transport> ConfigScript<'a, T> {
    /// Enter configuration mode.
    pub async fn enter(session: &'a mut Session<T>) -> Result<Self> {
        let response = session.execute(commands::CONFIGURE).await?;
        inspect(session, commands::CONFIGURE, response)?;
        Ok(Self {
            session,
            sent: 0,
            consumed: false,
        })
    }

    /// Send one configuration command.
    ///
    /// A response carrying an error marker, or one the device rejected
    /// outright, stops the script with [`ScriptAbortedError`].
    pub async fn send(&mut self, command: &str) -> Result<Response> {
        let response = self.session.execute(command).await?;
        self.sent += 1;
        inspect(self.session, command, response)
    }

    /// Number of commands sent so far, excluding mode changes.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Leave configuration mode and persist the running configuration.
    pub async fn commit(mut self) -> Result<()> {
        self.consumed = true;
        let response = self.session.execute(commands::END).await?;
        inspect(self.session, commands::END, response)?;

        let response = self.session.execute(commands::WRITE).await?;
        inspect(self.session, commands::WRITE, response)?;
        debug!("{}: configuration saved", self.session.host());
        Ok(())
    }

    /// Leave configuration mode without saving.
    pub async fn abort(mut self) -> Result<()> {
        self.consumed = true;
        let response = self.session.execute(commands::END).await?;
        inspect(self.session, commands::END, response)?;
        Ok(())
    }
}

/// Fail with [`ScriptAbortedError`] when `response` was rejected or carries
/// a script error marker.
fn inspect<T: Transport>(session: &Session<T>, command: &str, response: Response) -> Result<Response> {
    if response.is_success() && !session.platform().has_error_marker(&response.output) {
        return Ok(response);
    }

    warn!(
        "{}: script aborted at '{}': {}",
        session.host(),
        redact(command),
        response.output.trim()
    );
    Err(ScriptAbortedError {
        command: command.to_string(),
        output: response.output,
    }
    .into())
}

impl<T: Transport> Drop for ConfigScript<'_, T> {
    fn drop(&mut self) {
        if !self.consumed {
            warn!(
                "{}: config script dropped without commit or abort",
                self.session.host()
            );
        }
    }
}

/// PPPoE WAN credentials pushed to the ONU.
#[derive(Debug, Clone)]
pub struct PppoeCredentials {
    pub username: String,
    pub password: SecretString,
    pub vlan_profile: String,
}

/// Everything needed to bring a new ONU into service.
#[derive(Debug, Clone)]
pub struct OnuProvisioning {
    /// PON port such as `1/2/3`.
    pub port: String,
    pub onu_id: u32,
    pub onu_type: String,
    pub serial: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tcont_profile: String,
    pub vlan: u16,
    pub pppoe: Option<PppoeCredentials>,
}

impl OnuProvisioning {
    /// Reject input that cannot be sent as part of one command line.
    ///
    /// Fields sent as a single CLI word must be non-empty with no
    /// whitespace or control characters. Name and description may contain
    /// spaces but no control characters, so nothing can smuggle in a line
    /// break.
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let invalid = |key: &str, value: &str| ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        };

        let mut words = vec![
            ("port", self.port.as_str()),
            ("onu_type", self.onu_type.as_str()),
            ("serial", self.serial.as_str()),
            ("tcont_profile", self.tcont_profile.as_str()),
        ];
        if let Some(pppoe) = &self.pppoe {
            words.push(("pppoe.username", pppoe.username.as_str()));
            words.push(("pppoe.vlan_profile", pppoe.vlan_profile.as_str()));
            if !is_word(pppoe.password.expose_secret()) {
                return Err(invalid("pppoe.password", "******"));
            }
        }
        if let Some((key, value)) = words.into_iter().find(|(_, value)| !is_word(value)) {
            return Err(invalid(key, value));
        }

        for (key, value) in [("name", &self.name), ("description", &self.description)] {
            if let Some(value) = value {
                if value.trim().is_empty() || value.contains(char::is_control) {
                    return Err(invalid(key, value));
                }
            }
        }

        if !(1..=4094).contains(&self.vlan) {
            return Err(invalid("vlan", &self.vlan.to_string()));
        }
        Ok(())
    }

    /// Commands sent inside configuration mode, in order.
    pub fn script(&self) -> Vec<String> {
        let mut lines = vec![
            commands::enter_interface(&commands::olt_interface(&self.port)),
            commands::declare_onu(self.onu_id, &self.onu_type, &self.serial),
            commands::EXIT.to_string(),
            commands::enter_interface(&commands::onu_interface(&self.port, self.onu_id)),
        ];
        if let Some(name) = &self.name {
            lines.push(format!("name {}", name));
        }
        if let Some(description) = &self.description {
            lines.push(format!("description {}", description));
        }
        lines.extend([
            commands::tcont(&self.tcont_profile),
            commands::GEMPORT.to_string(),
            commands::service_port(self.vlan),
            commands::EXIT.to_string(),
            commands::onu_management(&self.port, self.onu_id),
            commands::onu_service(self.vlan),
        ]);
        if let Some(pppoe) = &self.pppoe {
            lines.push(commands::wan_ip_pppoe(
                &pppoe.username,
                pppoe.password.expose_secret(),
                &pppoe.vlan_profile,
            ));
        }
        lines.push(commands::EXIT.to_string());
        lines
    }

    /// The ONU as it will look after the next poll.
    fn record(&self) -> OnuRecord {
        OnuRecord {
            serial: self.serial.clone(),
            port: self.port.clone(),
            onu_id: self.onu_id,
            onu_type: self.onu_type.clone(),
            vlan: Some(self.vlan),
            pppoe_user: self.pppoe.as_ref().map(|p| p.username.clone()),
            pppoe_pass: self
                .pppoe
                .as_ref()
                .map(|p| p.password.expose_secret().to_string()),
            tcont_profile: Some(self.tcont_profile.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            phase_state: crate::parse::UNKNOWN.to_string(),
            online: false,
            last_sync: Utc::now(),
        }
    }
}

fn is_word(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// A provisioned ONU and its pending local write.
#[derive(Debug)]
pub struct Provisioned {
    pub onu: OnuRecord,
    /// The optimistic store write. Awaiting it is optional; it never fails.
    pub local_write: JoinHandle<()>,
}

/// Run `script` in configuration mode, committing only if every command
/// went through.
pub async fn run_script<T: Transport>(session: &mut Session<T>, script: &[String]) -> Result<()> {
    let mut config = ConfigScript::enter(session).await?;

    for command in script {
        if let Err(e) = config.send(command).await {
            if let Err(exit) = config.abort().await {
                debug!("leaving configuration mode failed: {}", exit);
            }
            return Err(e);
        }
    }

    config.commit().await
}

impl<C: Connector> Controller<C> {
    /// Declare and configure a new ONU on the device, then record it
    /// locally without waiting for the next poll.
    pub async fn provision_onu(&self, target: &DeviceTarget, request: OnuProvisioning) -> Result<Provisioned> {
        request.validate()?;
        let params = self.resolve_params(target).await?;
        let script = request.script();

        info!(
            "{}: provisioning {} on {}:{}",
            params.host, request.serial, request.port, request.onu_id
        );
        self.with_session(&params, move |session| {
            Box::pin(async move { run_script(session, &script).await })
        })
        .await?;
        info!("{}: {} provisioned", params.host, request.serial);

        let onu = request.record();
        let store = self.store.clone();
        let pending = onu.clone();
        let local_write = tokio::spawn(async move {
            let result = async {
                let device_id = store.ensure_device(&params).await?;
                store.upsert_onu(device_id, &pending).await
            }
            .await;
            if let Err(e) = result {
                warn!(
                    "{}: optimistic write of {} failed: {}",
                    params.host, pending.serial, e
                );
            }
        });

        Ok(Provisioned { onu, local_write })
    }
}
