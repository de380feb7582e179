//! EDV HTTP server.
//!
//! Wires the vault collection and a storage provider into an Axum router
//! serving the encrypted data vault REST API. The router only translates
//! between HTTP and `edv-core`; every rule about vaults and documents lives
//! in the core.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
