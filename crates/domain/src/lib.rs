//! `ih-domain` — types shared by every iHuman SDK crate: the error
//! taxonomy, client configuration, and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
