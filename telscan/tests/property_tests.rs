use proptest::prelude::*;
use telscan::telnet::negotiator::Negotiator;
use telscan::telnet::codec::IAC;

proptest! {
    /// Feeding a byte string one byte at a time must yield the same
    /// (data, replies) pair as feeding it in one shot, for arbitrary bytes.
    #[test]
    fn byte_by_byte_feeding_matches_one_shot(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut one_shot = Negotiator::default();
        let (data_one, replies_one) = one_shot.handle_command(&bytes);

        let mut incremental = Negotiator::default();
        let mut data_many = Vec::new();
        let mut replies_many = Vec::new();
        for &b in &bytes {
            let (d, r) = incremental.handle_command(&[b]);
            data_many.extend(d);
            replies_many.extend(r);
        }

        prop_assert_eq!(data_one, data_many);
        prop_assert_eq!(replies_one, replies_many);
    }

    /// Bytes containing no IAC pass through the parser untouched and
    /// produce no replies.
    #[test]
    fn iac_free_bytes_pass_through_unchanged(bytes in prop::collection::vec(0u8..255, 0..256)) {
        // 0u8..255 excludes 0xFF (IAC), matching the invariant's precondition.
        let mut n = Negotiator::default();
        let (data, replies) = n.handle_command(&bytes);
        prop_assert_eq!(data, bytes);
        prop_assert!(replies.is_empty());
    }
}

/// A second, independent parser fed the IAC-escaped form of arbitrary bytes
/// recovers exactly the original bytes as user data.
proptest! {
    #[test]
    fn write_escaping_round_trips_through_the_parser(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut escaped = Vec::with_capacity(bytes.len() + 8);
        for &b in &bytes {
            escaped.push(b);
            if b == IAC {
                escaped.push(IAC);
            }
        }

        let mut n = Negotiator::default();
        let (data, replies) = n.handle_command(&escaped);
        prop_assert_eq!(data, bytes);
        prop_assert!(replies.is_empty());
    }
}
