//! # paramvault
//!
//! Avatar parameter snapshot service for OSCQuery-capable hosts:
//! - discovers the remote control endpoint over DNS-SD
//! - tracks the active avatar via a UDP change listener
//! - captures readwrite parameters into per-avatar snapshots
//! - replays snapshots as OSC value-set datagrams
//! - exposes a small HTTP control surface for save/apply/list

pub mod api;
pub mod avatar;
pub mod config;
pub mod error;
pub mod osc;
pub mod oscquery;
pub mod service;
pub mod store;

pub use api::{build_router, AppState};
pub use error::{Error, Result};
