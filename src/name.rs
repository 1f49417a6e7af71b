//! Domain names (§4.B / §3 `DomainName`).
//!
//! Grounded in the teacher's `io::DNSReadExt::read_qname` pointer-following
//! label reader and its stale `name::Name` sibling, merged into one type
//! with equality, hashing, and the reverse-lookup-zone helper spec.md asks
//! for.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::io::{Read, Seek, SeekFrom};
use std::net::IpAddr;
use std::str::FromStr;

use byteorder::ReadBytesExt;
use rand::Rng;
use thiserror::Error;

/// Maximum length of a single label, per RFC 1035 §3.1.
const MAX_LABEL_LEN: usize = 63;

/// Maximum total length of a name (sum of label lengths plus length octets).
const MAX_NAME_LEN: usize = 255;

#[derive(Error, Debug)]
pub enum NameError {
    #[error("label '{0}' is longer than 63 bytes")]
    LabelTooLong(String),

    #[error("domain name is longer than 255 bytes")]
    NameTooLong,

    #[error("empty label in domain name '{0}'")]
    EmptyLabel(String),

    #[error("unsupported extended label kind (length octet {0:#04x})")]
    UnsupportedExtendedLabel(u8),

    #[error("invalid characters in label '{0}'")]
    InvalidLabel(String),

    #[error("idna error: {0}")]
    Idna(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An ordered sequence of labels. The root domain is the empty sequence.
///
/// Each label is stored in its ACE (Punycode, `xn--`-prefixed) form when it
/// contains non-ASCII characters, so that `Eq`/`Hash`/wire serialisation
/// never have to special-case Unicode.
#[derive(Clone, Debug, Default)]
pub struct DomainName {
    labels: Vec<String>,
}

impl DomainName {
    /// The root domain name (the empty label sequence), serialises to a
    /// single zero octet.
    pub fn root() -> DomainName {
        DomainName { labels: Vec::new() }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Parses a free-form name (`"www.example.com"` or `"www.example.com."`)
    /// per RFC 1035 §3.1, puny-encoding any non-ASCII label via the IDNA
    /// collaborator (§6).
    pub fn try_parse(s: &str) -> Result<DomainName, NameError> {
        if s.is_empty() || s == "." {
            return Ok(DomainName::root());
        }

        let mut labels = Vec::new();
        for raw in s.split_terminator('.') {
            if raw.is_empty() {
                return Err(NameError::EmptyLabel(s.to_string()));
            }

            let label = if raw.is_ascii() {
                raw.to_string()
            } else {
                idna::domain_to_ascii(raw).map_err(|e| NameError::Idna(format!("{:?}", e)))?
            };

            if label.len() > MAX_LABEL_LEN {
                return Err(NameError::LabelTooLong(label));
            }

            labels.push(label);
        }

        let total: usize = labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
        if total > MAX_NAME_LEN {
            return Err(NameError::NameTooLong);
        }

        Ok(DomainName { labels })
    }

    /// Parses a name from a DNS message, following compression pointers per
    /// RFC 1035 §4.1.4. `reader` must be positioned at the start of the
    /// name; on return it is positioned just after the name's own encoding
    /// (a pointer counts as two bytes, regardless of what it points to).
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<DomainName, NameError> {
        let mut labels = Vec::new();
        Self::parse_into(reader, &mut labels, 0)?;
        Ok(DomainName { labels })
    }

    fn parse_into<R: Read + Seek>(
        reader: &mut R,
        labels: &mut Vec<String>,
        depth: u32,
    ) -> Result<(), NameError> {
        // RFC 1035 messages are at most 64KiB; a pointer chain can't
        // legally be longer than that many hops.
        if depth > 128 {
            return Err(NameError::InvalidLabel("pointer recursion too deep".into()));
        }

        let start = reader.stream_position()?;

        loop {
            let len = reader.read_u8()?;
            if len == 0 {
                return Ok(());
            }

            match len & 0xC0 {
                0x00 => {
                    let len = len as usize;
                    let mut buf = vec![0u8; len];
                    reader.read_exact(&mut buf)?;

                    let label = std::str::from_utf8(&buf)
                        .map_err(|_| NameError::InvalidLabel(format!("{:?}", buf)))?;

                    if !label.is_ascii() {
                        return Err(NameError::InvalidLabel(label.to_string()));
                    }

                    labels.push(label.to_string());
                }

                0xC0 => {
                    let lo = reader.read_u8()? as u16;
                    let ptr = (((len as u16) & 0x3F) << 8) | lo;

                    if ptr as u64 >= start {
                        return Err(NameError::InvalidLabel(
                            "compression pointer points forward".into(),
                        ));
                    }

                    let here = reader.stream_position()?;
                    reader.seek(SeekFrom::Start(ptr as u64))?;
                    Self::parse_into(reader, labels, depth + 1)?;
                    reader.seek(SeekFrom::Start(here))?;

                    return Ok(());
                }

                // len & 0xC0 == 0x40 is the EDNS0 binary label (RFC 2673),
                // preserved textually rather than interpreted.
                0x40 => {
                    if len == 0x41 {
                        let bit_count = reader.read_u8()?;
                        let byte_count = ((bit_count as usize) + 7) / 8;
                        let mut buf = vec![0u8; byte_count];
                        reader.read_exact(&mut buf)?;

                        let hex: String = buf.iter().map(|b| format!("{:02x}", b)).collect();
                        labels.push(format!("\\[x{}/{}]", hex, bit_count));
                    } else {
                        return Err(NameError::UnsupportedExtendedLabel(len));
                    }
                }

                _ => return Err(NameError::UnsupportedExtendedLabel(len)),
            }
        }
    }

    /// Encodes this name onto `buf` in wire form, without compression.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<(), NameError> {
        for label in &self.labels {
            if label.len() > MAX_LABEL_LEN {
                return Err(NameError::LabelTooLong(label.clone()));
            }
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);
        Ok(())
    }

    /// Appends `suffix`'s labels after this name's own, e.g.
    /// `"www".join("example.com.")` -> `www.example.com.`. Used by the
    /// resolver's search-suffix expansion (§4.D).
    pub fn join(&self, suffix: &DomainName) -> DomainName {
        let mut labels = self.labels.clone();
        labels.extend(suffix.labels.iter().cloned());
        DomainName { labels }
    }

    /// Returns a copy of this name with each alphabetic character's case
    /// flipped pseudo-randomly, for draft-vixie-dns0x20 spoofing resistance
    /// (§4.D `use_random_case`).
    pub(crate) fn randomized_case(&self, rng: &mut impl rand::Rng) -> DomainName {
        let labels = self
            .labels
            .iter()
            .map(|label| {
                label
                    .chars()
                    .map(|c| {
                        if c.is_ascii_alphabetic() && rng.gen::<bool>() {
                            if c.is_ascii_lowercase() {
                                c.to_ascii_uppercase()
                            } else {
                                c.to_ascii_lowercase()
                            }
                        } else {
                            c
                        }
                    })
                    .collect()
            })
            .collect();
        DomainName { labels }
    }

    /// Exact, case-sensitive label comparison. The default [`PartialEq`]
    /// impl is case-insensitive per spec.md §3; dns0x20 verification needs
    /// the stricter form to detect a server that didn't echo our case back.
    pub fn eq_exact(&self, other: &DomainName) -> bool {
        self.labels == other.labels
    }

    /// `<reversed-octets>.in-addr.arpa.` for IPv4, or
    /// `<reversed-nibbles>.ip6.arpa.` for IPv6, per RFC 1035 §3.5 / RFC 3596 §2.5.
    pub fn reverse_lookup_zone(ip: IpAddr) -> DomainName {
        let labels = match ip {
            IpAddr::V4(v4) => {
                let mut labels: Vec<String> =
                    v4.octets().iter().rev().map(|o| o.to_string()).collect();
                labels.push("in-addr".to_string());
                labels.push("arpa".to_string());
                labels
            }
            IpAddr::V6(v6) => {
                let mut labels = Vec::with_capacity(32 + 2);
                for byte in v6.octets().iter().rev() {
                    labels.push(format!("{:x}", byte & 0x0F));
                    labels.push(format!("{:x}", byte >> 4));
                }
                labels.push("ip6".to_string());
                labels.push("arpa".to_string());
                labels
            }
        };

        DomainName { labels }
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, "{}.", label)?;
        }
        Ok(())
    }
}

impl FromStr for DomainName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainName::try_parse(s)
    }
}

/// Case-insensitive over the joined form, per spec.md §3.
impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for DomainName {}

impl Hash for DomainName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in &self.labels {
            label.to_ascii_lowercase().hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn try_parse_round_trips_simple_names() {
        assert_eq!(DomainName::try_parse("").unwrap().to_string(), ".");
        assert_eq!(DomainName::try_parse("com").unwrap().to_string(), "com.");
        assert_eq!(DomainName::try_parse("com.").unwrap().to_string(), "com.");
        assert_eq!(DomainName::try_parse("a.b.com").unwrap().to_string(), "a.b.com.");
        assert_eq!(DomainName::try_parse("a.b.com.").unwrap().to_string(), "a.b.com.");
    }

    #[test]
    fn equality_is_case_insensitive() {
        let a = DomainName::try_parse("Example.COM").unwrap();
        let b = DomainName::try_parse("example.com").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_labels() {
        assert!(DomainName::try_parse("a..b").is_err());
    }

    #[test]
    fn rejects_overlong_label() {
        let label = "a".repeat(64);
        assert!(DomainName::try_parse(&label).is_err());
    }

    #[test]
    fn parse_follows_compression_pointer() {
        // Message layout: [root-level "example.com" at offset 0] [pointer to 0 at offset 14]
        let mut buf = Vec::new();
        DomainName::try_parse("example.com").unwrap().write(&mut buf).unwrap();
        let ptr_offset = buf.len();
        buf.extend_from_slice(&[0xC0, 0x00]);

        let mut cur = Cursor::new(&buf[..]);
        cur.set_position(ptr_offset as u64);
        let parsed = DomainName::parse(&mut cur).unwrap();
        assert_eq!(parsed, DomainName::try_parse("example.com").unwrap());
    }

    #[test]
    fn reverse_lookup_zone_v4() {
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        let zone = DomainName::reverse_lookup_zone(ip);
        assert_eq!(zone.to_string(), "1.2.0.192.in-addr.arpa.");
    }

    #[test]
    fn reverse_lookup_zone_v6() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        let zone = DomainName::reverse_lookup_zone(ip);
        assert!(zone.to_string().ends_with("ip6.arpa."));
        assert_eq!(zone.labels().len(), 32 + 2);
    }
}
