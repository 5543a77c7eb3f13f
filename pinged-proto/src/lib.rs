//! Wire protocol library for the Pinged realtime gateway.
//!
//! Defines the identity, timestamp, and message types shared by the
//! gateway and its clients, the client/server event enums, and the
//! postcard codec that turns them into WebSocket binary frames.

pub mod codec;
pub mod event;
pub mod message;
