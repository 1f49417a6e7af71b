//! `FromStr` impls that parse the text (`dig`-style) representation of a
//! resource record back into a [`Resource`].
// Refer to https://github.com/tigeli/bind-utils/blob/master/bin/dig/dig.c for reference.

use core::num::ParseIntError;
use core::str::FromStr;
use std::net::AddrParseError;

use regex::Regex;
use thiserror::Error;

use crate::dns::types::{Mx, Resource, Soa, Type};
use crate::name::{DomainName, NameError};

#[derive(Error, Debug)]
pub enum FromStrError {
    #[error("that resource type doesn't have a text representation")]
    UnsupportedType,

    #[error("string doesn't match expected format")]
    InvalidFormat,

    #[error(transparent)]
    ParseIntError(#[from] ParseIntError),

    #[error(transparent)]
    AddrParseError(#[from] AddrParseError),

    #[error(transparent)]
    Name(#[from] NameError),
}

impl Resource {
    /// Parses the text representation of a resource record. Unlike
    /// `FromStr`, this needs the record's `Type` since the representations
    /// are otherwise ambiguous (e.g. a bare name could be NS, CNAME, or PTR).
    pub fn from_str(r#type: Type, s: &str) -> Result<Self, FromStrError> {
        Ok(match r#type {
            Type::A => Resource::A(s.parse()?),
            Type::AAAA => Resource::AAAA(s.parse()?),

            Type::NS => Resource::NS(DomainName::try_parse(s)?),
            Type::CNAME => Resource::CNAME(DomainName::try_parse(s)?),
            Type::PTR => Resource::PTR(DomainName::try_parse(s)?),

            Type::MX => Resource::MX(s.parse()?),
            Type::SOA => Resource::SOA(s.parse()?),

            Type::TXT => {
                lazy_static! {
                    static ref RE: Regex = Regex::new(r#""(.*?)""#).unwrap();
                }
                let mut txts = Vec::new();
                for caps in RE.captures_iter(s) {
                    txts.push(caps[1].as_bytes().to_vec());
                }

                if txts.is_empty() {
                    return Err(FromStrError::InvalidFormat);
                }

                Resource::TXT(txts)
            }

            Type::Reserved | Type::OPT | Type::ANY | Type::SRV => {
                return Err(FromStrError::UnsupportedType)
            }
        })
    }
}

impl FromStr for Soa {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            // "ns1.google.com. dns-admin.google.com. 376337657 900 900 1800 60"
            static ref RE: Regex = Regex::new(r"^(\S+) (\S+) (\d+) (\d+) (\d+) (\d+) (\d+)$").unwrap();
        }

        if let Some(caps) = RE.captures(s) {
            Ok(Soa {
                mname: DomainName::try_parse(&caps[1])?,
                rname: DomainName::try_parse(&caps[2])?,
                serial: caps[3].parse()?,
                refresh: caps[4].parse()?,
                retry: caps[5].parse()?,
                expire: caps[6].parse()?,
                minimum: caps[7].parse()?,
            })
        } else {
            Err(FromStrError::InvalidFormat)
        }
    }
}

impl FromStr for Mx {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            // "10 aspmx.l.google.com."
            static ref RE: Regex = Regex::new(r"^(\d+) (.+)$").unwrap();
        }
        if let Some(caps) = RE.captures(s) {
            Ok(Mx {
                preference: caps[1].parse()?,
                exchange: DomainName::try_parse(&caps[2])?,
            })
        } else {
            Err(FromStrError::InvalidFormat)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mx() {
        let mx: Mx = "10 aspmx.l.google.com.".parse().unwrap();
        assert_eq!(mx.preference, 10);
        assert_eq!(mx.exchange.to_string(), "aspmx.l.google.com.");
    }

    #[test]
    fn parses_soa() {
        let soa: Soa = "ns1.google.com. dns-admin.google.com. 376337657 900 900 1800 60"
            .parse()
            .unwrap();
        assert_eq!(soa.serial, 376337657);
        assert_eq!(soa.minimum, 60);
    }

    #[test]
    fn resource_from_str_dispatches_on_type() {
        let r = Resource::from_str(Type::A, "192.0.2.1").unwrap();
        assert_eq!(r, Resource::A("192.0.2.1".parse().unwrap()));
    }
}
