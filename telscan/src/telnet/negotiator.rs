//! Telnet byte-stream parser and RFC 854/855/1091/1073 option negotiation.
//!
//! [`Negotiator::handle_command`] is the single entry point: feed it raw
//! bytes from the wire, get back the user-data portion (IAC sequences
//! stripped, `IAC IAC` collapsed to a literal `0xFF`) and the reply frames
//! that must be written back. Parser state, which byte of an escape
//! sequence we're in, the in-flight command byte, the sub-negotiation
//! option and payload, lives on the struct so a sequence split across two
//! `read()` calls parses the same as one delivered whole.

use std::collections::HashMap;

use super::codec::{self, accept_response, encode_command, encode_subneg, opt, reject_response, IAC, SB, SE};
use super::options::{self, TerminalProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Data,
    Iac,
    Command,
    Subneg,
    SubnegIac,
}

/// Tracks option negotiation state and decodes the Telnet byte stream.
///
/// `our_options` is what the local peer has agreed to perform (set by
/// DO/DONT); `their_options` is what the remote peer has announced it will
/// perform (set by WILL/WONT). An option absent from a map counts as
/// "not set", equivalent to `false`.
#[derive(Debug)]
pub struct Negotiator {
    state: ParserState,
    cmd: u8,
    subneg_option: Option<u8>,
    subneg_buffer: Vec<u8>,
    our_options: HashMap<u8, bool>,
    their_options: HashMap<u8, bool>,
    profile: TerminalProfile,
}

impl Default for Negotiator {
    fn default() -> Self {
        Self::new(TerminalProfile::default())
    }
}

impl Negotiator {
    pub fn new(profile: TerminalProfile) -> Self {
        Self {
            state: ParserState::Data,
            cmd: 0,
            subneg_option: None,
            subneg_buffer: Vec::new(),
            our_options: HashMap::new(),
            their_options: HashMap::new(),
            profile,
        }
    }

    /// Whether *we* have agreed to perform `option` (a DO was accepted).
    pub fn is_our_option(&self, option: u8) -> bool {
        self.our_options.get(&option).copied().unwrap_or(false)
    }

    /// Whether the remote peer has announced it will perform `option`.
    pub fn is_their_option(&self, option: u8) -> bool {
        self.their_options.get(&option).copied().unwrap_or(false)
    }

    /// Consume a chunk of raw stream bytes.
    ///
    /// Returns `(data, replies)`: `data` is the de-escaped user payload,
    /// `replies` is zero or more frames to write back to the server, in
    /// the order they must be sent.
    pub fn handle_command(&mut self, chunk: &[u8]) -> (Vec<u8>, Vec<Vec<u8>>) {
        let mut data = Vec::with_capacity(chunk.len());
        let mut replies = Vec::new();

        for &b in chunk {
            self.step(b, &mut data, &mut replies);
        }

        (data, replies)
    }

    fn step(&mut self, b: u8, data: &mut Vec<u8>, replies: &mut Vec<Vec<u8>>) {
        match self.state {
            ParserState::Data => {
                if b == IAC {
                    self.state = ParserState::Iac;
                } else {
                    data.push(b);
                }
            }
            ParserState::Iac => match b {
                IAC => {
                    data.push(0xFF);
                    self.state = ParserState::Data;
                }
                SB => {
                    self.subneg_option = None;
                    self.subneg_buffer.clear();
                    self.state = ParserState::Subneg;
                }
                _ if codec::is_negotiation(b) => {
                    self.cmd = b;
                    self.state = ParserState::Command;
                }
                _ => {
                    // Unknown command byte after IAC, silently dropped.
                    self.state = ParserState::Data;
                }
            },
            ParserState::Command => {
                if let Some(reply) = self.negotiate(self.cmd, b) {
                    if !reply.is_empty() {
                        replies.push(reply);
                    }
                }
                self.state = ParserState::Data;
            }
            ParserState::Subneg => {
                if b == IAC {
                    self.state = ParserState::SubnegIac;
                } else if self.subneg_option.is_none() {
                    self.subneg_option = Some(b);
                } else {
                    self.subneg_buffer.push(b);
                }
            }
            ParserState::SubnegIac => match b {
                SE => {
                    let option = self.subneg_option.unwrap_or(0);
                    let payload = std::mem::take(&mut self.subneg_buffer);
                    if let Some(reply) = self.handle_subneg(option, &payload) {
                        if !reply.is_empty() {
                            replies.push(reply);
                        }
                    }
                    self.state = ParserState::Data;
                }
                IAC => {
                    self.subneg_buffer.push(0xFF);
                    self.state = ParserState::Subneg;
                }
                _ => {
                    // Malformed: IAC inside subneg not followed by SE or IAC.
                    self.subneg_buffer.push(IAC);
                    self.subneg_buffer.push(b);
                    self.state = ParserState::Subneg;
                }
            },
        }
    }

    /// Dispatch a received `IAC cmd option`. `None` means no reply.
    fn negotiate(&mut self, cmd: u8, option: u8) -> Option<Vec<u8>> {
        match option {
            opt::TERMINAL_TYPE => self.handle_terminal_type_cmd(cmd),
            opt::NAWS => self.handle_naws_cmd(cmd),
            _ => Some(self.default_negotiate(cmd, option)),
        }
    }

    /// The policy for options with no dedicated responder.
    fn default_negotiate(&mut self, cmd: u8, option: u8) -> Vec<u8> {
        match cmd {
            codec::DO => {
                let ok = options::is_acceptable(option);
                self.our_options.insert(option, ok);
                if ok { accept_response(cmd, option) } else { reject_response(cmd, option) }
            }
            codec::WILL => {
                let ok = options::is_acceptable(option);
                self.their_options.insert(option, ok);
                if ok { accept_response(cmd, option) } else { reject_response(cmd, option) }
            }
            codec::DONT => {
                self.our_options.insert(option, false);
                accept_response(cmd, option)
            }
            codec::WONT => {
                self.their_options.insert(option, false);
                accept_response(cmd, option)
            }
            _ => Vec::new(),
        }
    }

    fn handle_terminal_type_cmd(&mut self, cmd: u8) -> Option<Vec<u8>> {
        if cmd == codec::DO {
            self.our_options.insert(opt::TERMINAL_TYPE, true);
            Some(encode_command(codec::WILL, opt::TERMINAL_TYPE))
        } else {
            None
        }
    }

    fn handle_naws_cmd(&mut self, cmd: u8) -> Option<Vec<u8>> {
        if cmd == codec::DO {
            self.our_options.insert(opt::NAWS, true);
            let mut reply = encode_command(codec::WILL, opt::NAWS);
            reply.extend(naws_payload(self.profile.width, self.profile.height));
            Some(reply)
        } else {
            None
        }
    }

    /// Dispatch a completed `IAC SB option ... IAC SE` sequence.
    fn handle_subneg(&mut self, option: u8, payload: &[u8]) -> Option<Vec<u8>> {
        match option {
            opt::TERMINAL_TYPE => {
                // byte 0 == 1 is SEND; respond with IS <terminal-type>.
                if payload.first() == Some(&1) {
                    let mut response = vec![0u8]; // IS
                    response.extend_from_slice(self.profile.terminal_type.as_bytes());
                    Some(encode_subneg(opt::TERMINAL_TYPE, &response))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Build an `IAC SB NAWS <w-hi> <w-lo> <h-hi> <h-lo> IAC SE` frame.
fn naws_payload(width: u16, height: u16) -> Vec<u8> {
    let data = [
        (width >> 8) as u8,
        width as u8,
        (height >> 8) as u8,
        height as u8,
    ];
    encode_subneg(opt::NAWS, &data)
}

/// The opening bytes a client should send immediately on connect:
/// `WILL SGA`, `DO SGA`, `WONT ECHO`, `WILL TERMINAL_TYPE`, `WILL NAWS`.
pub fn initial_negotiation() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(encode_command(codec::WILL, opt::SGA));
    out.extend(encode_command(codec::DO, opt::SGA));
    out.extend(encode_command(codec::WONT, opt::ECHO));
    out.extend(encode_command(codec::WILL, opt::TERMINAL_TYPE));
    out.extend(encode_command(codec::WILL, opt::NAWS));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::codec::{DO, DONT, WILL, WONT};

    fn feed(n: &mut Negotiator, bytes: &[u8]) -> (Vec<u8>, Vec<Vec<u8>>) {
        n.handle_command(bytes)
    }

    #[test]
    fn plain_data_passes_through_untouched() {
        let mut n = Negotiator::default();
        let (data, replies) = feed(&mut n, b"hello world");
        assert_eq!(data, b"hello world");
        assert!(replies.is_empty());
    }

    #[test]
    fn iac_iac_collapses_to_single_0xff() {
        let mut n = Negotiator::default();
        let (data, _) = feed(&mut n, &[b'x', IAC, IAC, b'y']);
        assert_eq!(data, vec![b'x', 0xFF, b'y']);
    }

    #[test]
    fn initial_negotiation_frame_matches_scenario() {
        let bytes = initial_negotiation();
        assert_eq!(
            bytes,
            vec![
                0xFF, 0xFB, 0x03, // WILL SGA
                0xFF, 0xFD, 0x03, // DO SGA
                0xFF, 0xFC, 0x01, // WONT ECHO
                0xFF, 0xFB, 0x18, // WILL TERMINAL_TYPE
                0xFF, 0xFB, 0x1F, // WILL NAWS
            ]
        );
    }

    #[test]
    fn common_option_do_is_accepted() {
        let mut n = Negotiator::default();
        let (_, replies) = feed(&mut n, &[IAC, DO, opt::ECHO]);
        assert_eq!(replies, vec![vec![IAC, WILL, opt::ECHO]]);
        assert!(n.is_our_option(opt::ECHO));
    }

    #[test]
    fn common_option_will_is_accepted() {
        let mut n = Negotiator::default();
        let (_, replies) = feed(&mut n, &[IAC, WILL, opt::SGA]);
        assert_eq!(replies, vec![vec![IAC, DO, opt::SGA]]);
        assert!(n.is_their_option(opt::SGA));
    }

    #[test]
    fn unsupported_option_do_is_rejected() {
        let mut n = Negotiator::default();
        let (_, replies) = feed(&mut n, &[IAC, DO, opt::LINEMODE]);
        assert_eq!(replies, vec![vec![IAC, WONT, opt::LINEMODE]]);
        assert!(!n.is_our_option(opt::LINEMODE));
    }

    #[test]
    fn unsupported_option_will_is_rejected() {
        let mut n = Negotiator::default();
        let (_, replies) = feed(&mut n, &[IAC, WILL, opt::NEW_ENVIRON]);
        assert_eq!(replies, vec![vec![IAC, DONT, opt::NEW_ENVIRON]]);
        assert!(!n.is_their_option(opt::NEW_ENVIRON));
    }

    #[test]
    fn dont_and_wont_are_always_honored() {
        let mut n = Negotiator::default();
        n.our_options.insert(opt::ECHO, true);
        n.their_options.insert(opt::SGA, true);

        let (_, r1) = feed(&mut n, &[IAC, DONT, opt::ECHO]);
        assert_eq!(r1, vec![vec![IAC, WONT, opt::ECHO]]);
        assert!(!n.is_our_option(opt::ECHO));

        let (_, r2) = feed(&mut n, &[IAC, WONT, opt::SGA]);
        assert_eq!(r2, vec![vec![IAC, DONT, opt::SGA]]);
        assert!(!n.is_their_option(opt::SGA));
    }

    #[test]
    fn terminal_type_do_then_send_scenario() {
        // IAC DO TTYPE, IAC SB TTYPE SEND(1) IAC SE
        let mut n = Negotiator::default();
        let bytes = [IAC, DO, opt::TERMINAL_TYPE, IAC, SB, opt::TERMINAL_TYPE, 1, IAC, SE];
        let (data, replies) = feed(&mut n, &bytes);
        assert!(data.is_empty());
        assert_eq!(replies[0], vec![IAC, WILL, opt::TERMINAL_TYPE]);
        let mut expected = vec![IAC, SB, opt::TERMINAL_TYPE, 0];
        expected.extend_from_slice(b"VT100");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(replies[1], expected);
        assert!(n.is_our_option(opt::TERMINAL_TYPE));
    }

    #[test]
    fn naws_do_sends_will_then_size() {
        let mut n = Negotiator::default();
        let (_, replies) = feed(&mut n, &[IAC, DO, opt::NAWS]);
        assert_eq!(replies.len(), 1); // both frames batched into a single reply entry per step, but WILL happens in Command state only
        // handle_naws_cmd concatenates WILL + SB into one reply frame.
        let mut expected = vec![IAC, WILL, opt::NAWS];
        expected.extend(encode_subneg(opt::NAWS, &[0, 132, 0, 100]));
        assert_eq!(replies[0], expected);
        assert!(n.is_our_option(opt::NAWS));
    }

    #[test]
    fn subneg_split_across_chunks_matches_one_shot() {
        let full = [IAC, DO, opt::TERMINAL_TYPE, IAC, SB, opt::TERMINAL_TYPE, 1, IAC, SE];

        let mut one_shot = Negotiator::default();
        let (d1, r1) = feed(&mut one_shot, &full);

        let mut incremental = Negotiator::default();
        let mut d2 = Vec::new();
        let mut r2 = Vec::new();
        for &b in &full {
            let (d, r) = feed(&mut incremental, &[b]);
            d2.extend(d);
            r2.extend(r);
        }

        assert_eq!(d1, d2);
        assert_eq!(r1, r2);
    }

    #[test]
    fn unknown_command_byte_after_iac_is_dropped_not_raised() {
        let mut n = Negotiator::default();
        // IAC 245 (an unrecognised single-byte command) then plain data.
        let (data, replies) = feed(&mut n, &[IAC, 245, b'x']);
        assert_eq!(data, b"x");
        assert!(replies.is_empty());
    }

    #[test]
    fn no_iac_bytes_parse_identically_to_the_input() {
        let s = b"the quick brown fox";
        let mut n = Negotiator::default();
        let (data, replies) = feed(&mut n, s);
        assert_eq!(data, s);
        assert!(replies.is_empty());
    }
}
