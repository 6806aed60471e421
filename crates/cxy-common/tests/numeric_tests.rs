//! Round-trip tests for the 128-bit numeric helpers.

use cxy_common::numeric::{formati128, formatu128, strtoi128, strtou128};

#[test]
fn format_parse_round_trip_signed_extremes() {
    for value in [
        i128::MIN,
        i128::MIN + 1,
        i64::MIN as i128,
        -1,
        0,
        1,
        i64::MAX as i128,
        i128::MAX,
    ] {
        assert_eq!(strtoi128(&formati128(value)), Some(value), "value {value}");
    }
}

#[test]
fn format_parse_round_trip_unsigned_extremes() {
    for value in [0u128, 1, u8::MAX as u128, u64::MAX as u128, u128::MAX] {
        assert_eq!(strtou128(&formatu128(value), 10), Some(value), "value {value}");
    }
}
