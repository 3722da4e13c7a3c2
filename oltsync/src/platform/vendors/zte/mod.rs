//! ZTE ZXA10 (C300/C320/C600 "ZXAN") platform support.

pub mod commands;
mod platform;

pub use platform::{PLATFORM_NAME, platform};
