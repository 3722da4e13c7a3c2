//! ZTE ZXAN platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! Username:                          # telnet login
//! Password:
//! ZXAN#                              # privileged exec
//! ZXAN(config)#                      # configuration mode
//! ZXAN(config-if)#                   # interface / pon-onu-mng sub-modes
//! ```
//!
//! One prompt pattern covers every mode: the session never needs to know
//! which mode it is in, only where a response ends.

use crate::platform::OltPlatform;

/// Name of the ZTE platform.
pub const PLATFORM_NAME: &str = "zte_zxan";

/// Create the ZTE ZXAN platform definition.
pub fn platform() -> OltPlatform {
    OltPlatform::new(PLATFORM_NAME, r"ZXAN.*#")
        .expect("static ZXAN prompt pattern")
        .with_paging_command("terminal length 0")
        .with_failure_pattern("%Error")
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("%Unknown command")
        .with_failure_pattern("% Unknown command")
        .with_failure_pattern("%Ambiguous command")
        .with_failure_pattern("%Incomplete command")
        .with_script_error_marker("%")
        .with_script_error_marker("error")
        .with_search_depth(1000)
}
