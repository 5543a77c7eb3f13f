//! Pinged realtime gateway library.
//!
//! Exposes the gateway server for use in tests and embedding. The gateway
//! terminates authenticated WebSocket connections, tracks which users are
//! online, persists every direct message, and pushes messages and read
//! receipts to recipients' live connections.

pub mod auth;
pub mod config;
pub mod delivery;
pub mod gateway;
pub mod http;
pub mod presence;
pub mod store;
