// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! # Response nonces
//!
//! OpenID 2.0 providers put a `openid.response_nonce` into every positive
//! assertion. It is an UTC timestamp in the `YYYY-MM-DDTHH:MM:SSZ` form
//! followed by arbitrary printable salt characters. The relying party
//! accepts every nonce at most once and only while its timestamp is within
//! the allowed clock skew, which makes it possible to forget nonces older
//! than the skew.
use chrono::{DateTime, NaiveDateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use thiserror::Error;

/// Length of the timestamp part of the nonce.
const TIME_STR_LEN: usize = "1970-01-01T00:00:00Z".len();
const TIME_FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Length of the salt generated by [make_nonce].
const SALT_LEN: usize = 6;

/// Default allowed clock skew (seconds).
pub const DEFAULT_SKEW: i64 = 300;

/// Nonce parsing error.
#[derive(Debug, Error, PartialEq)]
pub enum NonceError {
    /// Timestamp prefix is not in the expected format.
    #[error("invalid nonce timestamp in {0:?}")]
    InvalidTimestamp(String),

    /// Timestamp precedes the UNIX epoch.
    #[error("nonce timestamp {0} is before the epoch")]
    BeforeEpoch(String),
}

/// Split the nonce into the UNIX timestamp and the salt.
pub fn split_nonce(nonce: &str) -> Result<(i64, &str), NonceError> {
    let (time_str, salt) = nonce
        .split_at_checked(TIME_STR_LEN)
        .ok_or_else(|| NonceError::InvalidTimestamp(nonce.to_string()))?;
    // chrono is lenient on the field widths, the format is not.
    let well_formed = time_str.bytes().enumerate().all(|(idx, b)| match idx {
        4 | 7 => b == b'-',
        10 => b == b'T',
        13 | 16 => b == b':',
        19 => b == b'Z',
        _ => b.is_ascii_digit(),
    });
    if !well_formed {
        return Err(NonceError::InvalidTimestamp(nonce.to_string()));
    }
    let timestamp = NaiveDateTime::parse_from_str(time_str, TIME_FMT)
        .map_err(|_| NonceError::InvalidTimestamp(nonce.to_string()))?
        .and_utc()
        .timestamp();
    if timestamp < 0 {
        return Err(NonceError::BeforeEpoch(time_str.to_string()));
    }
    Ok((timestamp, salt))
}

/// Whether the timestamp is within `skew` seconds of `now` in either
/// direction. A negative skew accepts nothing.
pub fn within_skew(timestamp: i64, skew: i64, now: i64) -> bool {
    u64::try_from(skew).is_ok_and(|skew| timestamp.abs_diff(now) <= skew)
}

/// Check the timestamp of the nonce against the allowed skew.
///
/// Unparseable nonces are simply not acceptable.
pub fn check_timestamp(nonce: &str, skew: i64, now: i64) -> bool {
    match split_nonce(nonce) {
        Ok((timestamp, _)) => within_skew(timestamp, skew, now),
        Err(_) => false,
    }
}

/// Generate a fresh nonce for the given time.
pub fn make_nonce(now: DateTime<Utc>) -> String {
    format!(
        "{}{}",
        now.format(TIME_FMT),
        Alphanumeric.sample_string(&mut rand::rng(), SALT_LEN)
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(
            (0, "abcdef"),
            split_nonce("1970-01-01T00:00:00Zabcdef").unwrap()
        );
        assert_eq!(
            (1_000_000_000, ""),
            split_nonce("2001-09-09T01:46:40Z").unwrap()
        );
    }

    #[test]
    fn test_split_rejects() {
        for bad in [
            "",
            "1970-01-01T00:00:00+1:00",
            "1969-12-31T23:59:59Z",
            "1970-01-01 00:00:00Zsalt",
            "1970-1-01T00:00:00Zsalt!",
            "2001-13-09T01:46:40Zsalt",
            "1970.01-01T00:00:00Z",
        ] {
            assert!(split_nonce(bad).is_err(), "{bad} should not be accepted");
        }
        assert_eq!(
            Err(NonceError::BeforeEpoch("1969-12-31T23:59:59Z".into())),
            split_nonce("1969-12-31T23:59:59Z")
        );
    }

    #[test]
    fn test_check_timestamp() {
        let nonce = "2001-09-09T01:46:40Zsalt";
        assert!(check_timestamp(nonce, 0, 1_000_000_000));
        assert!(check_timestamp(nonce, 300, 1_000_000_300));
        assert!(check_timestamp(nonce, 300, 999_999_700));
        assert!(!check_timestamp(nonce, 300, 1_000_000_301));
        assert!(!check_timestamp(nonce, 300, 999_999_699));
        assert!(!check_timestamp("garbage", 300, 1_000_000_000));
    }

    #[test]
    fn test_within_skew_extremes() {
        assert!(!within_skew(i64::MIN, 300, 1_000));
        assert!(!within_skew(i64::MAX, 300, -1_000));
        assert!(!within_skew(1_000, -1, 1_000));
        assert!(within_skew(i64::MAX, i64::MAX, 1));
    }

    #[test]
    fn test_make_nonce() {
        let now = Utc.timestamp_opt(1_000_000_000, 0).unwrap();
        let nonce = make_nonce(now);
        let (ts, salt) = split_nonce(&nonce).unwrap();
        assert_eq!(1_000_000_000, ts);
        assert_eq!(SALT_LEN, salt.len());
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(nonce, make_nonce(now));
    }
}
