//! MunBoT gateway library: channel adapters (WhatsApp bridge socket, WhatsApp Cloud webhook,
//! browser widget socket), the responder chain, message history, and the event log.

pub mod chain;
pub mod channels;
pub mod complaints;
pub mod config;
pub mod events;
pub mod gateway;
pub mod history;
pub mod responders;
pub mod session;
