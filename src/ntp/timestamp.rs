//! NTP fixed-point timestamp (§3 `NtpTimestamp`).
//!
//! Grounded in the teacher's codec idiom (`byteorder` primitives over a
//! `Cursor`, mirroring `io::DNSReadExt`), generalised from the DNS message
//! layout to the NTP 64-bit fixed-point timestamp and its epoch-aware
//! conversion to/from `chrono::DateTime<Utc>`.

use std::io;

use byteorder::{ReadBytesExt, WriteBytesExt, BE};
use chrono::{DateTime, TimeZone, Utc};

use crate::ntp::error::Error;

/// Seconds between the NTP epoch (1900-01-01 00:00:00 UTC) and the Unix
/// epoch (1970-01-01 00:00:00 UTC).
const NTP_TO_UNIX_SECONDS: i64 = 2_208_988_800;

/// Length, in seconds, of one 32-bit NTP era (2^32 seconds, ~136 years).
const ERA_SECONDS: i64 = 1i64 << 32;

/// A quarter-epoch, ~34 years: the maximum tolerated skew between the
/// local clock and a decoded timestamp's nearest era (§3, §8).
const QUARTER_ERA_SECONDS: i64 = ERA_SECONDS / 4;

/// 64-bit NTP timestamp: 32-bit seconds since the NTP epoch, 32-bit binary
/// fraction of a second.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NtpTimestamp {
    pub seconds: u32,
    pub fraction: u32,
}

impl NtpTimestamp {
    pub const ZERO: NtpTimestamp = NtpTimestamp {
        seconds: 0,
        fraction: 0,
    };

    pub fn read<R: io::Read>(r: &mut R) -> io::Result<NtpTimestamp> {
        let seconds = r.read_u32::<BE>()?;
        let fraction = r.read_u32::<BE>()?;
        Ok(NtpTimestamp { seconds, fraction })
    }

    pub fn write<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<BE>(self.seconds)?;
        w.write_u32::<BE>(self.fraction)
    }

    /// Converts `dt` to its nearest NTP representation, wrapping into
    /// whichever 32-bit era the encoded seconds fall into (§3).
    pub fn from_datetime(dt: DateTime<Utc>) -> NtpTimestamp {
        let ntp_seconds = dt.timestamp() + NTP_TO_UNIX_SECONDS;
        let seconds = ntp_seconds as u64 as u32; // wraps into the current era, as the wire format does.

        let nanos = dt.timestamp_subsec_nanos() as u64;
        let fraction = ((nanos << 32) / 1_000_000_000) as u32;

        NtpTimestamp { seconds, fraction }
    }

    /// Converts this timestamp back to wall-clock time by choosing the
    /// 32-bit era whose represented instant is nearest `reference` (§3
    /// "epoch window aligned on quarter-epoch boundaries"). Fails if even
    /// the nearest era is still more than a quarter-epoch away from
    /// `reference` — i.e. the reference clock itself is unusably far off.
    pub fn to_datetime(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
        let reference_ntp = reference.timestamp() + NTP_TO_UNIX_SECONDS;

        // Candidate absolute NTP-epoch seconds nearest `reference` that
        // reduce (mod 2^32) to `self.seconds`.
        let era = (reference_ntp - self.seconds as i64).div_euclid(ERA_SECONDS);
        let mut candidate = self.seconds as i64 + era * ERA_SECONDS;

        // `div_euclid` rounds toward the era below; also check the era
        // above and pick whichever is actually closest to `reference`.
        let above = candidate + ERA_SECONDS;
        if (above - reference_ntp).abs() < (candidate - reference_ntp).abs() {
            candidate = above;
        }

        if (candidate - reference_ntp).abs() > QUARTER_ERA_SECONDS {
            return Err(Error::ClockOutOfRange);
        }

        let unix_seconds = candidate - NTP_TO_UNIX_SECONDS;
        let nanos = ((self.fraction as u64) * 1_000_000_000 / (1u64 << 32)) as u32;

        Utc.timestamp_opt(unix_seconds, nanos)
            .single()
            .ok_or(Error::ClockOutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn round_trips_the_current_time() {
        let now = Utc::now();
        let ts = NtpTimestamp::from_datetime(now);
        let back = ts.to_datetime(now).unwrap();

        assert!((back - now).num_milliseconds().abs() < 10);
    }

    #[test]
    fn round_trips_a_far_future_time() {
        let t = Utc.with_ymd_and_hms(2090, 6, 15, 12, 0, 0).unwrap();
        let ts = NtpTimestamp::from_datetime(t);
        let back = ts.to_datetime(t).unwrap();

        assert!((back - t).num_milliseconds().abs() < 10);
    }

    #[test]
    fn fails_when_reference_is_far_from_the_timestamp() {
        let t = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let ts = NtpTimestamp::from_datetime(t);

        let unrelated = t + Duration::days(365 * 60); // ~60 years away
        assert!(ts.to_datetime(unrelated).is_err());
    }

    #[test]
    fn wire_round_trip() {
        let ts = NtpTimestamp {
            seconds: 0xdead_beef,
            fraction: 0x0123_4567,
        };
        let mut buf = Vec::new();
        ts.write(&mut buf).unwrap();
        let parsed = NtpTimestamp::read(&mut io::Cursor::new(&buf)).unwrap();
        assert_eq!(ts, parsed);
    }
}
