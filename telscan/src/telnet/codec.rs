//! Telnet command byte constants and pure encode/decode helpers.
//!
//! Corresponds to `TelnetCommand`/`TelnetSequence`/`NegotiationResponse` in
//! the Python reference implementation this crate follows. Every function
//! here is a pure `[u8]` transform with no I/O and no parser state.

/// Interpret As Command. Starts every Telnet command sequence.
pub const IAC: u8 = 255;
/// Subnegotiation Begin.
pub const SB: u8 = 250;
/// Subnegotiation End.
pub const SE: u8 = 240;
/// WILL: sender will enable the option.
pub const WILL: u8 = 251;
/// WONT: sender will not enable the option.
pub const WONT: u8 = 252;
/// DO: sender requests the receiver to enable the option.
pub const DO: u8 = 253;
/// DONT: sender requests the receiver to disable the option.
pub const DONT: u8 = 254;

/// Well-known Telnet option numbers this crate negotiates or recognises.
pub mod opt {
    pub const BINARY: u8 = 0;
    pub const ECHO: u8 = 1;
    pub const SGA: u8 = 3;
    pub const STATUS: u8 = 5;
    pub const TIMING_MARK: u8 = 6;
    pub const TERMINAL_TYPE: u8 = 24;
    pub const NAWS: u8 = 31;
    pub const TERMINAL_SPEED: u8 = 32;
    pub const LINEMODE: u8 = 34;
    pub const NEW_ENVIRON: u8 = 39;
}

/// True for the four negotiation verbs (DO/DONT/WILL/WONT).
pub fn is_negotiation(b: u8) -> bool {
    matches!(b, DO | DONT | WILL | WONT)
}

/// The verb to reply with when accepting a negotiation: DO↦WILL, DONT↦WONT,
/// WILL↦DO, WONT↦DONT. Returns `None` for any other byte.
pub fn response_for(cmd: u8) -> Option<u8> {
    match cmd {
        DO => Some(WILL),
        DONT => Some(WONT),
        WILL => Some(DO),
        WONT => Some(DONT),
        _ => None,
    }
}

/// Build a 3-byte `IAC <cmd> <option>` sequence.
pub fn encode_command(cmd: u8, option: u8) -> Vec<u8> {
    vec![IAC, cmd, option]
}

/// Build an `IAC SB <option> <payload> IAC SE` subnegotiation frame.
///
/// `payload` is written verbatim; this function does not IAC-escape it.
/// Callers either keep payloads free of `0xFF`, or escape them first.
pub fn encode_subneg(option: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + payload.len());
    buf.extend_from_slice(&[IAC, SB, option]);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&[IAC, SE]);
    buf
}

/// The positive response to a received `cmd option`, following the
/// DO↦WILL / DONT↦WONT / WILL↦DO / WONT↦DONT table.
pub fn accept_response(cmd: u8, option: u8) -> Vec<u8> {
    let resp_cmd = response_for(cmd).unwrap_or(cmd);
    encode_command(resp_cmd, option)
}

/// The negative response to a received `cmd option`.
///
/// DO is refused with WONT, WILL is refused with DONT. DONT and WONT are
/// never refused; they are always honored, so this falls back to
/// [`accept_response`] for those two.
pub fn reject_response(cmd: u8, option: u8) -> Vec<u8> {
    match cmd {
        DO => encode_command(WONT, option),
        WILL => encode_command(DONT, option),
        _ => accept_response(cmd, option),
    }
}
