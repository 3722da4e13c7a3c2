//! ZXAN command surface.

/// Full running configuration.
pub const SHOW_RUNNING: &str = "show running";

/// ONU admin/OMCC/phase state table.
pub const SHOW_ONU_STATE: &str = "show gpon onu state";

/// System identity block.
pub const SHOW_SYSTEM_GROUP: &str = "show system-group";

/// Card inventory.
pub const SHOW_CARD: &str = "show card";

/// Card temperature table.
pub const SHOW_CARD_TEMPERATURE: &str = "show card-temperature";

/// Interface link status overview, used for uplink discovery.
pub const SHOW_PORT_STATUS: &str = "show interface port-status";

/// ONUs seen on the PON but not yet declared.
pub const SHOW_ONU_UNCFG: &str = "show gpon onu uncfg";

/// T-CONT bandwidth profiles.
pub const SHOW_TCONT_PROFILES: &str = "show gpon profile tcont";

/// VLAN profiles.
pub const SHOW_VLAN_PROFILES: &str = "show gpon profile vlan";

/// Configured VLANs.
pub const SHOW_VLAN_SUMMARY: &str = "show vlan summary";

/// Alarm log.
pub const SHOW_ALARMS: &str = "show logging alarm";

/// Enter configuration mode.
pub const CONFIGURE: &str = "conf t";

/// Leave the current configuration sub-mode.
pub const EXIT: &str = "exit";

/// Leave configuration mode.
pub const END: &str = "end";

/// Persist the running configuration.
pub const WRITE: &str = "write";

/// Detail for one card.
pub fn card_detail(rack: u32, shelf: u32, slot: u32) -> String {
    format!("show card rack {} shelf {} slot {}", rack, shelf, slot)
}

/// Counters for one interface.
pub fn interface(name: &str) -> String {
    format!("show interface {}", name)
}

/// `gpon-onu_<port>:<id>` interface name.
pub fn onu_interface(port: &str, onu_id: u32) -> String {
    format!("gpon-onu_{}:{}", port, onu_id)
}

/// `gpon-olt_<port>` interface name.
pub fn olt_interface(port: &str) -> String {
    format!("gpon-olt_{}", port)
}

/// Optical power and attenuation for one ONU.
pub fn attenuation(port: &str, onu_id: u32) -> String {
    format!("show pon power attenuation {}", onu_interface(port, onu_id))
}

/// Detail for one ONU.
pub fn onu_detail(port: &str, onu_id: u32) -> String {
    format!("show gpon onu detail-info {}", onu_interface(port, onu_id))
}

/// `interface <name>`, entering the interface sub-mode.
pub fn enter_interface(name: &str) -> String {
    format!("interface {}", name)
}

/// Declare an ONU on the current `gpon-olt` interface.
pub fn declare_onu(onu_id: u32, onu_type: &str, serial: &str) -> String {
    format!("onu {} type {} sn {}", onu_id, onu_type, serial)
}

/// Bind T-CONT 1 to a bandwidth profile.
pub fn tcont(profile: &str) -> String {
    format!("tcont 1 profile {}", profile)
}

/// GEM port 1 on T-CONT 1.
pub const GEMPORT: &str = "gemport 1 tcont 1";

/// Service port 1 carrying `vlan` untranslated.
pub fn service_port(vlan: u16) -> String {
    format!("service-port 1 vport 1 user-vlan {} vlan {}", vlan, vlan)
}

/// `pon-onu-mng gpon-onu_<port>:<id>`, entering ONU management.
pub fn onu_management(port: &str, onu_id: u32) -> String {
    format!("pon-onu-mng {}", onu_interface(port, onu_id))
}

/// Map GEM port 1 to `vlan` on the ONU side.
pub fn onu_service(vlan: u16) -> String {
    format!("service 1 gemport 1 vlan {}", vlan)
}

/// PPPoE WAN on the ONU.
pub fn wan_ip_pppoe(username: &str, password: &str, vlan_profile: &str) -> String {
    format!(
        "wan-ip 1 mode pppoe username {} password {} vlan-profile {} host 1",
        username, password, vlan_profile
    )
}
