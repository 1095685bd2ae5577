//! Library crate for lan-inventory-rs: LAN discovery capabilities, the scan
//! orchestrator, the shared device inventory, and the HTTP API around them.
pub mod command;
pub mod config;
pub mod error;
pub mod export;
pub mod hostname;
pub mod inventory;
pub mod neighbors;
pub mod netdetect;
pub mod orchestrator;
pub mod ports;
pub mod prober;
pub mod server;
pub mod types;
pub mod vendor;
