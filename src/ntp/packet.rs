//! Fixed 48-byte SNTP packet layout (§3 `NtpPacket`, §6 RFC 2030).

use std::io;
use std::io::Read;
use std::net::Ipv4Addr;

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use crate::ntp::error::Error;
use crate::ntp::timestamp::NtpTimestamp;

/// Leap-indicator, 2 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LeapIndicator {
    NoWarning = 0,
    LastMinute61 = 1,
    LastMinute59 = 2,
    /// Unsynchronized / alarm condition ("unknown" per RFC 2030 §4).
    Alarm = 3,
}

impl LeapIndicator {
    fn from_bits(b: u8) -> LeapIndicator {
        match b {
            0 => LeapIndicator::NoWarning,
            1 => LeapIndicator::LastMinute61,
            2 => LeapIndicator::LastMinute59,
            _ => LeapIndicator::Alarm,
        }
    }
}

/// Association mode, 3 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Reserved = 0,
    SymmetricActive = 1,
    SymmetricPassive = 2,
    Client = 3,
    Server = 4,
    Broadcast = 5,
    ControlMessage = 6,
    Private = 7,
}

impl Mode {
    fn from_bits(b: u8) -> Result<Mode, Error> {
        Ok(match b {
            0 => Mode::Reserved,
            1 => Mode::SymmetricActive,
            2 => Mode::SymmetricPassive,
            3 => Mode::Client,
            4 => Mode::Server,
            5 => Mode::Broadcast,
            6 => Mode::ControlMessage,
            7 => Mode::Private,
            other => return Err(Error::MalformedPacket(format!("mode {} out of range", other))),
        })
    }
}

/// The 4-byte reference identifier: a FourCC kiss-code for stratum ≤ 1, an
/// IPv4 address for stratum ≥ 2 under NTPv3, or the low-order 32 bits of
/// the latest transmit timestamp for stratum ≥ 2 under NTPv4 (§6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReferenceId(pub [u8; 4]);

impl ReferenceId {
    pub const LOCL: ReferenceId = ReferenceId::four_cc(b"LOCL");
    pub const GPS: ReferenceId = ReferenceId::four_cc(b"GPS\0");
    pub const GOES: ReferenceId = ReferenceId::four_cc(b"GOES");
    pub const ACTS: ReferenceId = ReferenceId::four_cc(b"ACTS");
    pub const PPS: ReferenceId = ReferenceId::four_cc(b"PPS\0");
    pub const DCF: ReferenceId = ReferenceId::four_cc(b"DCF\0");
    pub const MSF: ReferenceId = ReferenceId::four_cc(b"MSF\0");
    pub const WWV: ReferenceId = ReferenceId::four_cc(b"WWV\0");
    pub const WWVB: ReferenceId = ReferenceId::four_cc(b"WWVB");
    pub const WWVH: ReferenceId = ReferenceId::four_cc(b"WWVH");
    pub const CHU: ReferenceId = ReferenceId::four_cc(b"CHU\0");
    pub const LORC: ReferenceId = ReferenceId::four_cc(b"LORC");
    pub const OMEG: ReferenceId = ReferenceId::four_cc(b"OMEG");
    pub const PTB: ReferenceId = ReferenceId::four_cc(b"PTB\0");
    pub const TDF: ReferenceId = ReferenceId::four_cc(b"TDF\0");
    pub const USNO: ReferenceId = ReferenceId::four_cc(b"USNO");

    pub const fn four_cc(code: &[u8; 4]) -> ReferenceId {
        ReferenceId(*code)
    }

    pub fn ipv4(addr: Ipv4Addr) -> ReferenceId {
        ReferenceId(addr.octets())
    }

    pub fn from_transmit_timestamp(ts: NtpTimestamp) -> ReferenceId {
        ReferenceId(ts.fraction.to_be_bytes())
    }
}

/// 16.16 signed fixed-point seconds (root delay).
fn read_fixed_i32<R: io::Read>(r: &mut R) -> io::Result<f64> {
    Ok(r.read_i32::<BE>()? as f64 / 65536.0)
}

fn write_fixed_i32<W: io::Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_i32::<BE>((v * 65536.0).round() as i32)
}

/// 16.16 unsigned fixed-point seconds (root dispersion).
fn read_fixed_u32<R: io::Read>(r: &mut R) -> io::Result<f64> {
    Ok(r.read_u32::<BE>()? as f64 / 65536.0)
}

fn write_fixed_u32<W: io::Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_u32::<BE>((v.max(0.0) * 65536.0).round() as u32)
}

/// Fixed 48-byte SNTPv3/v4 packet (§3 `NtpPacket`, RFC 2030).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NtpPacket {
    pub leap_indicator: LeapIndicator,
    pub version: u8,
    pub mode: Mode,
    pub stratum: u8,
    /// Poll interval, log2 seconds (poll=6 => 64s, per §8 boundary tests).
    pub poll: i8,
    /// Clock precision, log2 seconds.
    pub precision: i8,
    pub root_delay: f64,
    pub root_dispersion: f64,
    pub reference_id: ReferenceId,
    pub reference_timestamp: NtpTimestamp,
    pub originate_timestamp: NtpTimestamp,
    pub receive_timestamp: NtpTimestamp,
    pub transmit_timestamp: NtpTimestamp,
}

/// Wire size in bytes of [`NtpPacket`] (RFC 2030 §4).
pub const PACKET_LEN: usize = 48;

impl NtpPacket {
    pub fn from_slice(buf: &[u8]) -> Result<NtpPacket, Error> {
        if buf.len() < PACKET_LEN {
            return Err(Error::MalformedPacket(format!(
                "packet is {} bytes, need at least {}",
                buf.len(),
                PACKET_LEN
            )));
        }

        let mut cur = io::Cursor::new(buf);

        let b = cur.read_u8().map_err(Error::Io)?;
        let leap_indicator = LeapIndicator::from_bits((b & 0b1100_0000) >> 6);
        let version = (b & 0b0011_1000) >> 3;
        let mode = Mode::from_bits(b & 0b0000_0111)?;

        let stratum = cur.read_u8().map_err(Error::Io)?;
        let poll = cur.read_i8().map_err(Error::Io)?;
        let precision = cur.read_i8().map_err(Error::Io)?;

        let root_delay = read_fixed_i32(&mut cur).map_err(Error::Io)?;
        let root_dispersion = read_fixed_u32(&mut cur).map_err(Error::Io)?;

        let mut ref_id = [0u8; 4];
        cur.read_exact(&mut ref_id).map_err(Error::Io)?;

        let reference_timestamp = NtpTimestamp::read(&mut cur).map_err(Error::Io)?;
        let originate_timestamp = NtpTimestamp::read(&mut cur).map_err(Error::Io)?;
        let receive_timestamp = NtpTimestamp::read(&mut cur).map_err(Error::Io)?;
        let transmit_timestamp = NtpTimestamp::read(&mut cur).map_err(Error::Io)?;

        Ok(NtpPacket {
            leap_indicator,
            version,
            mode,
            stratum,
            poll,
            precision,
            root_delay,
            root_dispersion,
            reference_id: ReferenceId(ref_id),
            reference_timestamp,
            originate_timestamp,
            receive_timestamp,
            transmit_timestamp,
        })
    }

    pub fn to_vec(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(PACKET_LEN);

        let b = ((self.leap_indicator as u8) << 6) | ((self.version & 0x07) << 3) | (self.mode as u8);
        buf.write_u8(b)?;
        buf.write_u8(self.stratum)?;
        buf.write_i8(self.poll)?;
        buf.write_i8(self.precision)?;

        write_fixed_i32(&mut buf, self.root_delay)?;
        write_fixed_u32(&mut buf, self.root_dispersion)?;

        buf.extend_from_slice(&self.reference_id.0);

        self.reference_timestamp.write(&mut buf)?;
        self.originate_timestamp.write(&mut buf)?;
        self.receive_timestamp.write(&mut buf)?;
        self.transmit_timestamp.write(&mut buf)?;

        debug_assert_eq!(buf.len(), PACKET_LEN);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NtpPacket {
        NtpPacket {
            leap_indicator: LeapIndicator::NoWarning,
            version: 4,
            mode: Mode::Client,
            stratum: 0,
            poll: 6,
            precision: -6,
            root_delay: 0.0,
            root_dispersion: 0.0,
            reference_id: ReferenceId::LOCL,
            reference_timestamp: NtpTimestamp::ZERO,
            originate_timestamp: NtpTimestamp::ZERO,
            receive_timestamp: NtpTimestamp::ZERO,
            transmit_timestamp: NtpTimestamp {
                seconds: 3_900_000_000,
                fraction: 42,
            },
        }
    }

    #[test]
    fn round_trips_wire_form() {
        let pkt = sample();
        let wire = pkt.to_vec().unwrap();
        assert_eq!(wire.len(), PACKET_LEN);

        let parsed = NtpPacket::from_slice(&wire).unwrap();
        assert_eq!(parsed, pkt);
    }

    #[test]
    fn rejects_short_buffers() {
        assert!(NtpPacket::from_slice(&[0u8; 10]).is_err());
    }

    #[test]
    fn poll_boundary_values_are_log2_seconds() {
        // §8: poll=4 => 16s, poll=6 => 64s, poll=14 => 16384s.
        assert_eq!(1i64 << 4, 16);
        assert_eq!(1i64 << 6, 64);
        assert_eq!(1i64 << 14, 16384);
    }

    #[test]
    fn root_delay_fixed_point_round_trips() {
        let mut pkt = sample();
        pkt.root_delay = 1.5;
        pkt.root_dispersion = 2.25;

        let wire = pkt.to_vec().unwrap();
        let parsed = NtpPacket::from_slice(&wire).unwrap();

        assert!((parsed.root_delay - 1.5).abs() < 1e-4);
        assert!((parsed.root_dispersion - 2.25).abs() < 1e-4);
    }
}
