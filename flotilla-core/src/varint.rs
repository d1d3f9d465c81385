//! Embeds a send timestamp into the first bytes of a producer's message
//! buffer, and reads it back out on the consumer side (ยง4.3, ยง4.4).
//!
//! The encoding is a zig-zag signed varint, the same shape produced by
//! Go's `encoding/binary.PutVarint`/`Varint` in the historical source this
//! harness is modeled on; any signed 64-bit nanosecond timestamp round-trips
//! losslessly through it.

use integer_encoding::VarInt;

use crate::error::CoreError;

/// Encodes `timestamp_ns` as a varint into the head of `buffer`.
///
/// `buffer` must be at least [`crate::model::MIN_MESSAGE_SIZE`] bytes; the
/// varint never exceeds 9 bytes for an `i64`, so the minimum message size
/// always has room. Bytes past the varint are left untouched (producer
/// padding).
pub fn encode_timestamp(buffer: &mut [u8], timestamp_ns: i64) -> usize {
    timestamp_ns.encode_var(buffer)
}

/// Decodes the varint-encoded timestamp from the head of `buffer`.
pub fn decode_timestamp(buffer: &[u8]) -> Result<i64, CoreError> {
    i64::decode_var(buffer)
        .map(|(value, _consumed)| value)
        .ok_or_else(|| CoreError::decode("truncated varint timestamp"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips() {
        let mut buffer = vec![0u8; 16];
        let written = encode_timestamp(&mut buffer, 1_700_000_000_123_456_789);
        assert!(written <= 9);
        assert_eq!(decode_timestamp(&buffer).unwrap(), 1_700_000_000_123_456_789);
    }

    #[test]
    fn zero_round_trips() {
        let mut buffer = vec![0u8; 9];
        encode_timestamp(&mut buffer, 0);
        assert_eq!(decode_timestamp(&buffer).unwrap(), 0);
    }

    #[test]
    fn negative_timestamp_round_trips() {
        let mut buffer = vec![0u8; 16];
        encode_timestamp(&mut buffer, -42);
        assert_eq!(decode_timestamp(&buffer).unwrap(), -42);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        // All continuation bits set, no terminating byte.
        let buffer = [0xffu8; 1];
        assert!(decode_timestamp(&buffer).is_err());
    }

    #[test]
    fn padding_past_the_varint_is_left_alone() {
        let mut buffer = vec![0xABu8; 16];
        encode_timestamp(&mut buffer, 5);
        assert_eq!(buffer[15], 0xAB);
    }

    proptest::proptest! {
        #[test]
        fn any_i64_round_trips(timestamp_ns: i64) {
            let mut buffer = vec![0u8; 16];
            encode_timestamp(&mut buffer, timestamp_ns);
            proptest::prop_assert_eq!(decode_timestamp(&buffer).unwrap(), timestamp_ns);
        }
    }
}
