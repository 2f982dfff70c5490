//! Chat-facing layer: command parsing, message texts, transport,
//! per-user dispatch.

pub mod commands;
pub mod dispatcher;
pub mod messages;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use commands::{ChatUpdate, Command};
pub use dispatcher::Dispatcher;
pub use transport::{ChatTransport, TelegramTransport, TransportError};
