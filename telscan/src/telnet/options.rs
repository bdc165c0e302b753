//! Option acceptance policy and the terminal profile used to answer
//! TERMINAL_TYPE / NAWS subnegotiations.

use super::codec::opt;

/// Options we accept unconditionally: Suppress Go-Ahead, Echo, Binary.
pub const COMMON: [u8; 3] = [opt::SGA, opt::ECHO, opt::BINARY];

/// Options we accept and additionally drive a dedicated responder for:
/// Terminal Type (RFC 1091) and window size (RFC 1073).
pub const ADVANCED: [u8; 2] = [opt::TERMINAL_TYPE, opt::NAWS];

/// Whether the local peer agrees to perform `option`, the union of
/// [`COMMON`] and [`ADVANCED`].
pub fn is_acceptable(option: u8) -> bool {
    COMMON.contains(&option) || ADVANCED.contains(&option)
}

/// Terminal identity advertised during negotiation: the string returned for
/// a TERMINAL_TYPE SEND request, and the dimensions reported via NAWS.
///
/// Set at construction and read-only thereafter. These shape every
/// response the negotiator sends but are never mutated by the wire
/// protocol itself.
#[derive(Debug, Clone)]
pub struct TerminalProfile {
    pub terminal_type: String,
    pub width: u16,
    pub height: u16,
}

impl Default for TerminalProfile {
    /// VT100 at 132x100, wide and tall enough that servers which paginate
    /// on terminal height rarely do, per the reference client's own
    /// rationale for choosing these defaults.
    fn default() -> Self {
        Self {
            terminal_type: "VT100".to_owned(),
            width: 132,
            height: 100,
        }
    }
}
