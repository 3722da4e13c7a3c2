//! Built-in vendor platforms.

pub mod zte;
