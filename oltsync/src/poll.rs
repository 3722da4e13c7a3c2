//! Device poll orchestrator.
//!
//! One poll opens one session, runs a fixed command sequence, builds a
//! [`DeviceSnapshot`] and hands it to [`Store::apply_snapshot`]:
//!
//! 1. `show running`, `show gpon onu state`, `show system-group` and
//!    `show card`. All four must succeed.
//! 2. Card detail for every card not reported offline. Best effort.
//! 3. The temperature table. Best effort; zero on failure.
//! 4. Uplink discovery through `show interface port-status`, falling back
//!    to [`UplinkFallback`] when discovery fails or finds nothing.
//! 5. `show interface <name>` per candidate, kept only when the output
//!    carries rate counters.
//!
//! Any failure marks the device OFFLINE outside the snapshot transaction.
//!
//! [`Store::apply_snapshot`]: crate::store::Store::apply_snapshot

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::config::{Settings, UplinkFallback};
use crate::controller::{Controller, DeviceTarget};
use crate::error::{CommandError, Error, Result};
use crate::model::{CardRecord, DeviceObservation, DeviceSnapshot, OnuRecord, TrafficSample};
use crate::parse::{
    self, CardDetail, CardRow, LinkState, OnuConfig, OnuStateRow, SystemInfo,
};
use crate::platform::vendors::zte::commands;
use crate::session::{Response, Session};
use crate::transport::{ConnectParams, Connector, Transport};

/// Result of a successful poll.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub device_id: i64,
    pub snapshot: DeviceSnapshot,
}

impl<C: Connector> Controller<C> {
    /// Poll one device and reconcile what it reports.
    pub async fn poll_device(&self, target: &DeviceTarget) -> Result<PollReport> {
        let params = self.resolve_params(target).await?;
        self.poll_params(&params).await
    }

    /// Poll several devices, at most `poll_concurrency` at a time and never
    /// the same host twice.
    ///
    /// Every target gets exactly one result. A target resolving to a host
    /// an earlier target already covers is not polled again and reports
    /// [`Error::DuplicateTarget`]. Polled results come back in completion
    /// order, followed by targets that failed to resolve or were duplicates.
    ///
    /// [`Error::DuplicateTarget`]: crate::Error::DuplicateTarget
    pub async fn poll_devices(
        &self,
        targets: impl IntoIterator<Item = DeviceTarget>,
    ) -> Vec<(DeviceTarget, Result<PollReport>)> {
        let mut resolved = Vec::new();
        let mut failed = Vec::new();
        let mut hosts = HashSet::new();

        for target in targets {
            match self.resolve_params(&target).await {
                Ok(params) => {
                    if hosts.insert(params.host.clone()) {
                        resolved.push((target, params));
                    } else {
                        debug!("{}: already scheduled, skipping {:?}", params.host, target);
                        failed.push((target, Err(Error::DuplicateTarget { host: params.host })));
                    }
                }
                Err(e) => failed.push((target, Err(e))),
            }
        }

        let concurrency = self.settings.poll_concurrency.max(1);
        let mut results: Vec<_> = stream::iter(resolved)
            .map(|(target, params)| async move {
                let result = self.poll_params(&params).await;
                (target, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.append(&mut failed);
        results
    }

    async fn poll_params(&self, params: &ConnectParams) -> Result<PollReport> {
        info!("{}: poll started", params.host);

        let settings = Arc::clone(&self.settings);
        let collected = self
            .with_session(params, move |session| {
                Box::pin(async move { collect(session, &settings).await })
            })
            .await;

        let result: Result<PollReport> = match collected {
            Ok(snapshot) => self
                .store
                .apply_snapshot(params, &snapshot)
                .await
                .map(|device_id| PollReport {
                    device_id,
                    snapshot,
                })
                .map_err(Into::into),
            Err(e) => Err(e),
        };

        match &result {
            Ok(report) => info!(
                "{}: poll complete ({} onus on {} ports)",
                params.host,
                report.snapshot.onus.len(),
                report.snapshot.ports.len()
            ),
            Err(e) => {
                warn!("{}: poll failed: {}", params.host, e);
                if let Err(mark) = self.store.mark_offline(params).await {
                    warn!("{}: could not mark device offline: {}", params.host, mark);
                }
            }
        }

        result
    }
}

/// Run the whole command sequence on an open session.
async fn collect<T: Transport>(session: &mut Session<T>, settings: &Settings) -> Result<DeviceSnapshot> {
    let running = required(session, commands::SHOW_RUNNING).await?;
    let state = required(session, commands::SHOW_ONU_STATE).await?;
    let system = required(session, commands::SHOW_SYSTEM_GROUP).await?;
    let inventory = required(session, commands::SHOW_CARD).await?;

    let onu_configs = parse::parse_onu_inventory(&running.output);
    let state_rows = parse::parse_onu_state(&state.output);
    let system = parse::parse_system_group(&system.output);
    let card_rows = parse::parse_card_inventory(&inventory.output);

    let mut details = Vec::with_capacity(card_rows.len());
    for row in &card_rows {
        let detail = if row.is_offline() {
            CardDetail::default()
        } else {
            card_detail(session, row).await
        };
        details.push(detail);
    }

    let temperatures = temperatures(session).await;
    let cards: Vec<CardRecord> = card_rows
        .iter()
        .zip(details)
        .map(|(row, detail)| card_record(row, detail, &temperatures))
        .collect();

    let candidates = uplink_candidates(session, &settings.uplink_fallback).await;
    let traffic = sample_traffic(session, &candidates).await;

    Ok(DeviceSnapshot {
        host: session.host().to_string(),
        device: observation(system, &cards),
        ports: parse::port_occupancy(&state_rows),
        onus: onu_records(onu_configs, &state_rows),
        cards,
        traffic,
    })
}

async fn required<T: Transport>(
    session: &mut Session<T>,
    command: &str,
) -> std::result::Result<Response, CommandError> {
    session.execute(command).await?.require()
}

/// Detail for one card; zeroed when the device will not say.
async fn card_detail<T: Transport>(session: &mut Session<T>, row: &CardRow) -> CardDetail {
    let command = commands::card_detail(row.rack, row.shelf, row.slot);
    match session.execute(&command).await {
        Ok(response) if response.is_success() => parse::parse_card_detail(&response.output),
        Ok(response) => {
            warn!(
                "{}: no detail for slot {}: {}",
                session.host(),
                row.slot,
                response.failure_message.unwrap_or_default()
            );
            CardDetail::default()
        }
        Err(e) => {
            warn!("{}: no detail for slot {}: {}", session.host(), row.slot, e);
            CardDetail::default()
        }
    }
}

/// Temperatures keyed by (rack, shelf, slot); empty when unavailable.
async fn temperatures<T: Transport>(session: &mut Session<T>) -> HashMap<(u32, u32, u32), f64> {
    match session.execute(commands::SHOW_CARD_TEMPERATURE).await {
        Ok(response) if response.is_success() => parse::parse_card_temperature(&response.output)
            .into_iter()
            .map(|t| ((t.rack, t.shelf, t.slot), t.celsius))
            .collect(),
        Ok(_) => {
            warn!("{}: temperature table unavailable", session.host());
            HashMap::new()
        }
        Err(e) => {
            warn!("{}: temperature table unavailable: {}", session.host(), e);
            HashMap::new()
        }
    }
}

fn card_record(row: &CardRow, detail: CardDetail, temperatures: &HashMap<(u32, u32, u32), f64>) -> CardRecord {
    CardRecord {
        rack: row.rack,
        shelf: row.shelf,
        slot: row.slot,
        cfg_type: row.cfg_type.clone(),
        real_type: row.real_type.clone(),
        status: row.status.clone(),
        cpu_percent: detail.cpu_percent,
        memory_percent: detail.memory_percent,
        temperature: temperatures
            .get(&(row.rack, row.shelf, row.slot))
            .copied()
            .unwrap_or(0.0),
        serial: detail.serial,
        uptime: detail.uptime,
        last_restart_reason: detail.last_restart_reason,
    }
}

/// Uplink interfaces to sample.
///
/// Discovery keeps port-status rows that are up and whose naming prefix is
/// one of the fallback prefixes. An empty result is treated like a failed
/// discovery.
async fn uplink_candidates<T: Transport>(session: &mut Session<T>, fallback: &UplinkFallback) -> Vec<String> {
    let discovered: Vec<String> = match session.execute(commands::SHOW_PORT_STATUS).await {
        Ok(response) if response.is_success() => parse::parse_port_status(&response.output)
            .into_iter()
            .filter(|row| row.state == LinkState::Up && is_uplink_name(&row.interface, fallback))
            .map(|row| row.interface)
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            warn!("{}: uplink discovery failed: {}", session.host(), e);
            Vec::new()
        }
    };

    if discovered.is_empty() {
        debug!("{}: using fallback uplink candidates", session.host());
        fallback.candidates()
    } else {
        discovered
    }
}

fn is_uplink_name(interface: &str, fallback: &UplinkFallback) -> bool {
    interface
        .split_once('_')
        .is_some_and(|(prefix, _)| fallback.prefixes.iter().any(|p| p.eq_ignore_ascii_case(prefix)))
}

/// Probe every candidate in turn. A candidate without rate counters does
/// not exist on this device and is skipped.
async fn sample_traffic<T: Transport>(session: &mut Session<T>, candidates: &[String]) -> Vec<TrafficSample> {
    let mut samples = Vec::new();

    for name in candidates {
        let response = match session.execute(&commands::interface(name)).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{}: probing {} failed: {}", session.host(), name, e);
                continue;
            }
        };
        if !response.is_success() || !parse::has_rate_marker(&response.output) {
            debug!("{}: {} has no counters", session.host(), name);
            continue;
        }

        let rates = parse::parse_interface_rates(&response.output);
        samples.push(TrafficSample {
            interface: name.clone(),
            sampled_at: Utc::now(),
            rx_mbps: rates.rx_mbps,
            tx_mbps: rates.tx_mbps,
        });
    }

    samples
}

fn observation(system: SystemInfo, cards: &[CardRecord]) -> DeviceObservation {
    DeviceObservation {
        hostname: system.hostname,
        description: system.description,
        contact: system.contact,
        location: system.location,
        uptime: system.uptime,
        max_cpu: cards.iter().map(|c| c.cpu_percent).max().unwrap_or(0),
        max_memory: cards.iter().map(|c| c.memory_percent).max().unwrap_or(0),
        max_temperature: cards.iter().map(|c| c.temperature).fold(0.0, f64::max),
    }
}

/// Join configured ONUs with the state table on (port, id).
fn onu_records(configs: Vec<OnuConfig>, states: &[OnuStateRow]) -> Vec<OnuRecord> {
    let by_position: HashMap<(&str, u32), &OnuStateRow> = states
        .iter()
        .map(|row| ((row.port.as_str(), row.onu_id), row))
        .collect();
    let now = Utc::now();

    configs
        .into_iter()
        .filter(|config| !config.serial.is_empty())
        .map(|config| {
            let state = by_position.get(&(config.port.as_str(), config.onu_id));
            OnuRecord {
                phase_state: state
                    .map(|s| s.phase_state.clone())
                    .unwrap_or_else(|| parse::UNKNOWN.to_string()),
                online: state.is_some_and(|s| s.is_online()),
                serial: config.serial,
                port: config.port,
                onu_id: config.onu_id,
                onu_type: config.onu_type,
                vlan: config.vlan,
                pppoe_user: config.pppoe_user,
                pppoe_pass: config.pppoe_pass,
                tcont_profile: config.tcont_profile,
                name: config.name,
                description: config.description,
                last_sync: now,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::DeviceStatus;
    use crate::testing::{FakeOlt, Reply, controller, controller_with, init_logging};

    const RUNNING: &str = "\
Building configuration...
interface gpon-olt_1/2/1
  onu 1 type ZTE-F660 sn ZTEGC0000001
  onu 2 type ZTE-F660 sn ZTEGC0000002
!
interface gpon-onu_1/2/1:1
  name alice
  tcont 1 profile 20M
!
pon-onu-mng gpon-onu_1/2/1:1
  service 1 gemport 1 vlan 100
  wan-ip 1 mode pppoe username alice password s3cret vlan-profile PPPOE host 1
!
end";

    const ONU_STATE: &str = "\
OnuIndex   Admin State  OMCC State  Phase State  Channel
---------------------------------------------------------
1/2/1:1    enable       enable      working      1(GPON)
1/2/1:2    enable       disable     LOS          1(GPON)
ONU Number: 2/2";

    const SYSTEM_GROUP: &str = "\
System Description: ZXA10 C320 Software V2.1.0
System ObjectId: .1.3.6.1.4.1.3902.1082.1001.320.2.1
Started before: 10 days, 4 hours, 12 minutes
Contact with: noc@example.net
System name: ZXAN
Location: Rack 4";

    const CARDS: &str = "\
Rack Shelf Slot CfgType RealType Port  HardVer SoftVer         Status
-------------------------------------------------------------------------
1    1     2    GTGO    GTGO     8     V1.0    V2.1.0          INSERVICE
1    1     4    SMXA    SMXA     3     V1.0    V2.1.0          INSERVICE
1    1     6    GTGO     OFFLINE";

    const CARD_DETAIL: &str = "\
Status            : INSERVICE
Serial-Number     : 210000001
CPU Usage         : 23%      Memory Usage      : 61%
Uptime            : 10 Days 4 Hours 12 Minutes";

    const RATES: &str = "\
gei_1/4/1 is up, line protocol is up
  Input rate :  125 Mbps   13000 pps
  Output rate:  36 Mbps    4200 pps";

    fn healthy_olt() -> FakeOlt {
        FakeOlt::new()
            .reply(commands::SHOW_RUNNING, RUNNING)
            .reply(commands::SHOW_ONU_STATE, ONU_STATE)
            .reply(commands::SHOW_SYSTEM_GROUP, SYSTEM_GROUP)
            .reply(commands::SHOW_CARD, CARDS)
            .reply_prefix("show card rack", CARD_DETAIL)
    }

    #[tokio::test]
    async fn test_poll_degrades_without_temperature_and_discovery() {
        init_logging();
        let olt = healthy_olt().reply("show interface gei_1/4/1", RATES);
        let controller = controller(&olt).await;

        let report = controller.poll_device(&DeviceTarget::Defaults).await.unwrap();
        let snapshot = &report.snapshot;

        assert_eq!(snapshot.cards.len(), 3);
        assert!(snapshot.cards.iter().all(|c| c.temperature == 0.0));
        assert_eq!(snapshot.cards[0].cpu_percent, 23);
        assert_eq!(snapshot.cards[2].cpu_percent, 0);
        assert_eq!(snapshot.device.max_cpu, 23);
        assert_eq!(snapshot.device.max_memory, 61);
        assert_eq!(snapshot.device.hostname, "ZXAN");
        assert_eq!(snapshot.device.location, "Rack 4");
        assert_eq!(snapshot.device.contact, "noc@example.net");

        assert_eq!(snapshot.traffic.len(), 1);
        assert_eq!(snapshot.traffic[0].interface, "gei_1/4/1");
        assert_eq!(snapshot.traffic[0].rx_mbps, 125.0);

        let received = olt.received();
        for candidate in controller.settings().uplink_fallback.candidates() {
            assert!(received.contains(&commands::interface(&candidate)));
        }
        // No detail request for the offline card.
        assert!(!received.contains(&commands::card_detail(1, 1, 6)));
        assert!(olt.wait_all_closed().await);

        let store = controller.store();
        assert_eq!(store.cards(report.device_id).await.unwrap().len(), 3);
        assert_eq!(store.traffic_samples(report.device_id).await.unwrap().len(), 1);
        let device = store.device_by_id(report.device_id).await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn test_poll_joins_onu_state() {
        let olt = healthy_olt();
        let controller = controller(&olt).await;

        let report = controller.poll_device(&DeviceTarget::Defaults).await.unwrap();
        let onus = &report.snapshot.onus;

        assert_eq!(onus.len(), 2);
        assert!(onus[0].online);
        assert_eq!(onus[0].vlan, Some(100));
        assert_eq!(onus[0].pppoe_user.as_deref(), Some("alice"));
        assert!(!onus[1].online);
        assert_eq!(onus[1].phase_state, "LOS");

        let ports = &report.snapshot.ports;
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].registered, 2);
        assert_eq!(ports[0].online, 1);

        let stored = controller
            .store()
            .onu_by_serial("ZTEGC0000001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.tcont_profile.as_deref(), Some("20M"));
    }

    #[tokio::test]
    async fn test_poll_fails_on_running_config() {
        init_logging();
        let olt = healthy_olt().reply(commands::SHOW_RUNNING, "%Error 20200: Access denied.");
        let controller = controller(&olt).await;

        let err = controller.poll_device(&DeviceTarget::Defaults).await.unwrap_err();
        assert!(matches!(err, Error::Command(CommandError::Rejected { .. })));
        assert!(olt.wait_all_closed().await);

        let store = controller.store();
        let device = store.device_by_host("olt.test").await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Offline);
        assert!(store.cards(device.id).await.unwrap().is_empty());
        assert!(store.pon_ports(device.id).await.unwrap().is_empty());
        assert_eq!(store.onu_count().await.unwrap(), 0);
        assert_eq!(olt.received(), vec!["terminal length 0", commands::SHOW_RUNNING]);
    }

    #[tokio::test]
    async fn test_poll_hangup_marks_offline() {
        let olt = healthy_olt().respond(commands::SHOW_CARD, Reply::Hangup);
        let controller = controller(&olt).await;

        let err = controller.poll_device(&DeviceTarget::Defaults).await.unwrap_err();
        assert!(matches!(err, Error::Command(CommandError::Channel { .. })));

        let device = controller.store().device_by_host("olt.test").await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn test_poll_unreachable_marks_offline() {
        let olt = FakeOlt::new().unreachable();
        let controller = controller(&olt).await;

        let err = controller.poll_device(&DeviceTarget::Defaults).await.unwrap_err();
        assert!(matches!(err, Error::Connect(_)));
        let device = controller.store().device_by_host("olt.test").await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn test_discovered_uplinks_replace_fallback() {
        let olt = healthy_olt()
            .reply(
                commands::SHOW_PORT_STATUS,
                "Interface      AdminStatus  PhyStatus\n\
                 xgei_1/3/1     enable       up\n\
                 xgei_1/3/2     enable       down\n\
                 gpon-olt_1/2/1 enable       up",
            )
            .reply("show interface xgei_1/3/1", RATES);
        let controller = controller(&olt).await;

        let report = controller.poll_device(&DeviceTarget::Defaults).await.unwrap();
        assert_eq!(report.snapshot.traffic.len(), 1);
        assert_eq!(report.snapshot.traffic[0].interface, "xgei_1/3/1");

        let probes: Vec<_> = olt
            .received()
            .into_iter()
            .filter(|c| c.starts_with("show interface ") && c != commands::SHOW_PORT_STATUS)
            .collect();
        assert_eq!(probes, vec!["show interface xgei_1/3/1".to_string()]);
    }

    #[tokio::test]
    async fn test_poll_devices_dedupes_hosts() {
        let olt = healthy_olt();
        let controller = controller(&olt).await;

        let results = controller
            .poll_devices([DeviceTarget::Defaults, DeviceTarget::Id(99), DeviceTarget::Defaults])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(olt.connections(), 1);

        let polled: Vec<_> = results.iter().filter(|(_, r)| r.is_ok()).collect();
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].0, DeviceTarget::Defaults);

        let duplicates: Vec<_> = results
            .iter()
            .filter(|(_, r)| matches!(r, Err(Error::DuplicateTarget { host }) if host == "olt.test"))
            .map(|(target, _)| target.clone())
            .collect();
        assert_eq!(duplicates, vec![DeviceTarget::Id(99), DeviceTarget::Defaults]);
    }

    #[tokio::test]
    async fn test_poll_devices_bounded_concurrency() {
        let olt = healthy_olt().with_latency(Duration::from_millis(5));
        let controller = controller(&olt).await;
        assert_eq!(controller.settings().poll_concurrency, 2);

        let mut targets = Vec::new();
        for n in 1..=4 {
            let params = ConnectParams::telnet(format!("olt-{n}.test"), "admin", "secret");
            let id = controller.store().upsert_device(&params, None).await.unwrap();
            targets.push(DeviceTarget::Id(id));
        }

        let results = controller.poll_devices(targets).await;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(olt.connections(), 4);
        assert_eq!(olt.peak_connections(), 2);
    }

    #[tokio::test]
    async fn test_poll_timeout_marks_offline() {
        let olt = healthy_olt().respond(commands::SHOW_ONU_STATE, Reply::Silent);
        let controller = controller_with(&olt, |settings| {
            settings.command_timeout = Duration::from_millis(200);
        })
        .await;

        let err = controller.poll_device(&DeviceTarget::Defaults).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Command(CommandError::Channel {
                source: crate::error::ChannelError::PatternTimeout(_),
                ..
            })
        ));
        assert!(olt.wait_all_closed().await);

        let store = controller.store();
        let device = store.device_by_host("olt.test").await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Offline);
        assert!(store.cards(device.id).await.unwrap().is_empty());
        assert!(store.pon_ports(device.id).await.unwrap().is_empty());
        assert!(store.traffic_samples(device.id).await.unwrap().is_empty());
        assert_eq!(store.onu_count().await.unwrap(), 0);
        assert_eq!(
            olt.received(),
            vec!["terminal length 0", commands::SHOW_RUNNING, commands::SHOW_ONU_STATE]
        );
    }
}
