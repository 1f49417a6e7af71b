//! Modified UTF-7 codec for IMAP mailbox names (RFC 3501 §5.1.3).
//!
//! Not sourced from a crate: the ecosystem has no small, actively
//! maintained modified-UTF-7 codec worth a dependency for ~80 lines, so
//! this is hand-rolled the way the teacher hand-rolls `util::hexdump`
//! rather than reach for a crate over a self-contained concern. Differs
//! from standard RFC 2152 UTF-7 in two ways: `&` is the shift character
//! (not `+`), and the modified base64 alphabet substitutes `,` for `/`
//! and omits padding.

use crate::imap::error::Error;

const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+,";

pub fn encode(s: &str) -> String {
    let mut out = String::new();
    let mut run: Vec<u16> = Vec::new();

    for c in s.chars() {
        if c == '&' {
            flush_run(&mut out, &mut run);
            out.push_str("&-");
        } else if (' '..='~').contains(&c) {
            flush_run(&mut out, &mut run);
            out.push(c);
        } else {
            let mut buf = [0u16; 2];
            run.extend_from_slice(c.encode_utf16(&mut buf));
        }
    }
    flush_run(&mut out, &mut run);
    out
}

fn flush_run(out: &mut String, run: &mut Vec<u16>) {
    if run.is_empty() {
        return;
    }
    out.push('&');
    let mut bytes = Vec::with_capacity(run.len() * 2);
    for unit in run.iter() {
        bytes.push((unit >> 8) as u8);
        bytes.push((*unit & 0xff) as u8);
    }
    out.push_str(&base64_encode(&bytes));
    out.push('-');
    run.clear();
}

fn base64_encode(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut bits: u32 = 0;
    let mut nbits = 0u32;
    for &b in bytes {
        bits = (bits << 8) | b as u32;
        nbits += 8;
        while nbits >= 6 {
            nbits -= 6;
            out.push(ALPHABET[((bits >> nbits) & 0x3f) as usize] as char);
        }
    }
    if nbits > 0 {
        out.push(ALPHABET[((bits << (6 - nbits)) & 0x3f) as usize] as char);
    }
    out
}

fn base64_decode(s: &str) -> Result<Vec<u8>, Error> {
    let mut bits: u32 = 0;
    let mut nbits = 0u32;
    let mut out = Vec::new();
    for c in s.chars() {
        let v = ALPHABET
            .iter()
            .position(|&x| x as char == c)
            .ok_or_else(|| Error::BadResponse(format!("invalid modified-UTF-7 byte: {:?}", c)))?
            as u32;
        bits = (bits << 6) | v;
        nbits += 6;
        if nbits >= 8 {
            nbits -= 8;
            out.push(((bits >> nbits) & 0xff) as u8);
        }
    }
    Ok(out)
}

pub fn decode(s: &str) -> Result<String, Error> {
    let mut out = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }

        let mut run = String::new();
        while let Some(&next) = chars.peek() {
            if next == '-' {
                chars.next();
                break;
            }
            run.push(next);
            chars.next();
        }

        if run.is_empty() {
            out.push('&'); // "&-" encodes a literal ampersand.
            continue;
        }

        let bytes = base64_decode(&run)?;
        if bytes.len() % 2 != 0 {
            return Err(Error::BadResponse(
                "modified-UTF-7 run has an odd byte count".into(),
            ));
        }
        let units: Vec<u16> = bytes.chunks(2).map(|c| ((c[0] as u16) << 8) | c[1] as u16).collect();
        let decoded = String::from_utf16(&units)
            .map_err(|_| Error::BadResponse("invalid UTF-16 in modified-UTF-7 run".into()))?;
        out.push_str(&decoded);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_ascii() {
        assert_eq!(encode("INBOX"), "INBOX");
        assert_eq!(decode("INBOX").unwrap(), "INBOX");
    }

    #[test]
    fn encodes_ampersand_as_shift_minus() {
        assert_eq!(encode("A&B"), "A&-B");
        assert_eq!(decode("A&-B").unwrap(), "A&B");
    }

    #[test]
    fn round_trips_non_ascii_mailbox_name() {
        let name = "Entw\u{00fc}rfe"; // "Entwürfe" (German "Drafts").
        let encoded = encode(name);
        assert_eq!(decode(&encoded).unwrap(), name);
    }
}
