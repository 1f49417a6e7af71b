//! Minimal DER reader for the one field the default remote-cert check
//! needs: the end-entity certificate's `notBefore`/`notAfter` validity
//! window (§4.J, RFC 5280 §4.1.2.5).
//!
//! Grounded in the codec idiom used throughout the crate for other wire
//! formats (`dns::message::MessageParser`, `ntp::packet`): a cursor over
//! a byte slice, read one field at a time, fail closed on anything
//! malformed. `rustls`/`webpki` already walk the full certificate during
//! chain validation, but don't expose the parsed validity times to a
//! caller, so the two dates are re-extracted here from the raw DER.

use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug)]
pub struct Validity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

const TAG_SEQUENCE: u8 = 0x30;
const TAG_CONTEXT_0: u8 = 0xa0;
const TAG_UTC_TIME: u8 = 0x17;
const TAG_GENERALIZED_TIME: u8 = 0x18;

/// Reads one TLV (tag-length-value) at `pos`, returning `(tag,
/// content_start, content_end)`. Only definite-length encoding is
/// supported, which is all DER ever uses.
fn read_tlv(buf: &[u8], pos: usize) -> Option<(u8, usize, usize)> {
    let tag = *buf.get(pos)?;
    let len_byte = *buf.get(pos + 1)?;

    let (length, header_len) = if len_byte & 0x80 == 0 {
        (len_byte as usize, 2usize)
    } else {
        let num_bytes = (len_byte & 0x7f) as usize;
        if num_bytes == 0 || num_bytes > 4 {
            return None;
        }
        let mut length = 0usize;
        for i in 0..num_bytes {
            length = (length << 8) | *buf.get(pos + 2 + i)? as usize;
        }
        (length, 2 + num_bytes)
    };

    let content_start = pos + header_len;
    let content_end = content_start.checked_add(length)?;
    if content_end > buf.len() {
        return None;
    }
    Some((tag, content_start, content_end))
}

/// Skips past the TLV starting at `pos`, returning the offset just after
/// it.
fn skip_tlv(buf: &[u8], pos: usize) -> Option<usize> {
    let (_, _, end) = read_tlv(buf, pos)?;
    Some(end)
}

fn parse_time(tag: u8, bytes: &[u8]) -> Option<DateTime<Utc>> {
    let s = std::str::from_utf8(bytes).ok()?;
    match tag {
        TAG_UTC_TIME => parse_utc_time(s),
        TAG_GENERALIZED_TIME => parse_generalized_time(s),
        _ => None,
    }
}

/// `YYMMDDHHMMSSZ`; two-digit year mapped per RFC 5280 §4.1.2.5.1 (00-49
/// => 20xx, 50-99 => 19xx).
fn parse_utc_time(s: &str) -> Option<DateTime<Utc>> {
    if s.len() != 13 || !s.ends_with('Z') {
        return None;
    }
    let yy: i32 = s[0..2].parse().ok()?;
    let year = if yy >= 50 { 1900 + yy } else { 2000 + yy };
    build(
        year,
        s[2..4].parse().ok()?,
        s[4..6].parse().ok()?,
        s[6..8].parse().ok()?,
        s[8..10].parse().ok()?,
        s[10..12].parse().ok()?,
    )
}

/// `YYYYMMDDHHMMSSZ`.
fn parse_generalized_time(s: &str) -> Option<DateTime<Utc>> {
    if s.len() != 15 || !s.ends_with('Z') {
        return None;
    }
    build(
        s[0..4].parse().ok()?,
        s[4..6].parse().ok()?,
        s[6..8].parse().ok()?,
        s[8..10].parse().ok()?,
        s[10..12].parse().ok()?,
        s[12..14].parse().ok()?,
    )
}

fn build(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

/// Walks `Certificate -> TBSCertificate -> validity` far enough to read
/// the two `Time` values, skipping every field that precedes `validity`
/// in the `TBSCertificate` sequence (the optional `[0] version`,
/// `serialNumber`, `signature` `AlgorithmIdentifier`, and `issuer`
/// `Name`). Returns `None` on anything that doesn't match the expected
/// shape rather than failing the connection outright — the default
/// remote-cert check treats that as "no additional flags to raise",
/// deferring entirely to the platform chain result.
pub fn extract_validity(der: &[u8]) -> Option<Validity> {
    let (tag, cert_start, _) = read_tlv(der, 0)?;
    if tag != TAG_SEQUENCE {
        return None;
    }

    let (tag, tbs_start, _) = read_tlv(der, cert_start)?;
    if tag != TAG_SEQUENCE {
        return None;
    }

    let mut pos = tbs_start;

    if der.get(pos) == Some(&TAG_CONTEXT_0) {
        pos = skip_tlv(der, pos)?; // version
    }
    pos = skip_tlv(der, pos)?; // serialNumber
    pos = skip_tlv(der, pos)?; // signature AlgorithmIdentifier
    pos = skip_tlv(der, pos)?; // issuer Name

    let (tag, validity_start, _) = read_tlv(der, pos)?;
    if tag != TAG_SEQUENCE {
        return None;
    }

    let (nb_tag, nb_start, nb_end) = read_tlv(der, validity_start)?;
    let not_before = parse_time(nb_tag, &der[nb_start..nb_end])?;

    let (na_tag, na_start, na_end) = read_tlv(der, nb_end)?;
    let not_after = parse_time(na_tag, &der[na_start..na_end])?;

    Some(Validity {
        not_before,
        not_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn der_len(len: usize) -> Vec<u8> {
        assert!(len < 128, "test certs keep lengths in short form");
        vec![len as u8]
    }

    fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend(der_len(content.len()));
        out.extend_from_slice(content);
        out
    }

    /// Builds a minimal synthetic DER `Certificate` containing just
    /// enough structure (an empty serial number, signature, and issuer,
    /// followed by a real `validity` sequence) for [`extract_validity`]
    /// to find the two `Time` values.
    fn fake_certificate(not_before: &str, not_after: &str) -> Vec<u8> {
        let serial = tlv(0x02, &[0x01]);
        let signature_alg = tlv(TAG_SEQUENCE, &[]);
        let issuer = tlv(TAG_SEQUENCE, &[]);

        let mut validity_content = Vec::new();
        validity_content.extend(tlv(TAG_UTC_TIME, not_before.as_bytes()));
        validity_content.extend(tlv(TAG_UTC_TIME, not_after.as_bytes()));
        let validity = tlv(TAG_SEQUENCE, &validity_content);

        let mut tbs_content = Vec::new();
        tbs_content.extend(serial);
        tbs_content.extend(signature_alg);
        tbs_content.extend(issuer);
        tbs_content.extend(validity);
        let tbs = tlv(TAG_SEQUENCE, &tbs_content);

        tlv(TAG_SEQUENCE, &tbs)
    }

    #[test]
    fn extracts_not_before_and_not_after() {
        let der = fake_certificate("230101000000Z", "240101000000Z");
        let validity = extract_validity(&der).expect("parses");

        assert_eq!(validity.not_before, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(validity.not_after, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn utc_time_two_digit_year_pivots_at_fifty() {
        let der = fake_certificate("490101000000Z", "991231235959Z");
        let validity = extract_validity(&der).expect("parses");

        assert_eq!(validity.not_before.format("%Y").to_string(), "2049");
        assert_eq!(validity.not_after.format("%Y").to_string(), "1999");
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(extract_validity(&[0x30, 0x05, 0x30, 0x03, 0x02]).is_none());
    }
}
