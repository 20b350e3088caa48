//! WebSocket chat feed

pub mod handler;
pub mod protocol;
