//! On-demand lookups.
//!
//! These run on an already open session, between or instead of polls.
//! Lookups that feed status displays ([`Session::attenuation`],
//! [`Controller::signal`]) never fail: anything that goes wrong yields an
//! `Unknown` reading.

use log::warn;

use crate::controller::{Controller, DeviceTarget};
use crate::error::CommandError;
use crate::parse::{
    self, AlarmEntry, AttenuationReading, OnuDetail, TcontProfile, UnconfiguredOnu, VlanProfile,
};
use crate::platform::vendors::zte::commands;
use crate::session::Session;
use crate::transport::{Connector, Transport};

type QueryResult<T> = Result<T, CommandError>;

impl<T: Transport> Session<T> {
    async fn query(&mut self, command: &str) -> QueryResult<String> {
        Ok(self.execute(command).await?.require()?.output)
    }

    /// Optical levels of one ONU. Unknown when the device will not say.
    pub async fn attenuation(&mut self, port: &str, onu_id: u32) -> AttenuationReading {
        match self.query(&commands::attenuation(port, onu_id)).await {
            Ok(output) => AttenuationReading::parse(&output),
            Err(e) => {
                warn!("{}: attenuation for {}:{} unavailable: {}", self.host(), port, onu_id, e);
                AttenuationReading::unknown()
            }
        }
    }

    /// ONUs seen on the PON but not yet declared.
    pub async fn unconfigured_onus(&mut self) -> QueryResult<Vec<UnconfiguredOnu>> {
        let output = self.query(commands::SHOW_ONU_UNCFG).await?;
        Ok(parse::parse_unconfigured(&output))
    }

    pub async fn onu_detail(&mut self, port: &str, onu_id: u32) -> QueryResult<OnuDetail> {
        let output = self.query(&commands::onu_detail(port, onu_id)).await?;
        Ok(parse::parse_onu_detail(&output))
    }

    pub async fn tcont_profiles(&mut self) -> QueryResult<Vec<TcontProfile>> {
        let output = self.query(commands::SHOW_TCONT_PROFILES).await?;
        Ok(parse::parse_tcont_profiles(&output))
    }

    pub async fn vlan_profiles(&mut self) -> QueryResult<Vec<VlanProfile>> {
        let output = self.query(commands::SHOW_VLAN_PROFILES).await?;
        Ok(parse::parse_vlan_profiles(&output))
    }

    /// Configured VLAN ids, ascending.
    pub async fn vlans(&mut self) -> QueryResult<Vec<u16>> {
        let output = self.query(commands::SHOW_VLAN_SUMMARY).await?;
        Ok(parse::parse_vlan_summary(&output))
    }

    /// Alarm log, newest first.
    pub async fn alarms(&mut self) -> QueryResult<Vec<AlarmEntry>> {
        let output = self.query(commands::SHOW_ALARMS).await?;
        Ok(parse::parse_alarms(&output))
    }
}

impl<C: Connector> Controller<C> {
    /// Optical levels of one ONU in a session of its own. Any failure,
    /// including an unreachable device, yields an unknown reading.
    pub async fn signal(&self, target: &DeviceTarget, port: &str, onu_id: u32) -> AttenuationReading {
        let params = match self.resolve_params(target).await {
            Ok(params) => params,
            Err(e) => {
                warn!("signal lookup for {}:{} failed: {}", port, onu_id, e);
                return AttenuationReading::unknown();
            }
        };

        let port = port.to_string();
        let reading = self
            .with_session(&params, move |session| {
                Box::pin(async move { Ok(session.attenuation(&port, onu_id).await) })
            })
            .await;

        reading.unwrap_or_else(|e| {
            warn!("{}: signal lookup failed: {}", params.host, e);
            AttenuationReading::unknown()
        })
    }
}
