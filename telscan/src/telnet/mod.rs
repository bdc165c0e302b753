//! Telnet protocol support: pure command codec, option negotiation state
//! machine, and the async client built on top of them.

pub mod client;
pub mod codec;
pub mod negotiator;
pub mod options;

pub use client::{ClientError, TelnetClient, TelnetClientGuard};
pub use negotiator::{initial_negotiation, Negotiator};
pub use options::TerminalProfile;
