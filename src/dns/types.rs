//! DNS message data model (§3 `DnsRecord`/`DnsQuery`/`DnsResponse`, §4.C).

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Instant, SystemTime};

use strum_macros::{Display, EnumString};

use crate::name::DomainName;

/// DNS Message: the root of both DNS requests and responses.
///
/// # Examples
///
/// ```rust
/// use netcore::dns::{Message, Type, Class};
///
/// let mut m = Message::default();
/// m.add_question("bramp.net", Type::A, Class::Internet);
/// let wire = m.to_vec().expect("failed to encode DNS request");
/// assert!(wire.len() <= 512);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// 16-bit identifier assigned by the program that generates the query.
    /// Copied verbatim into the response.
    pub id: u16,

    /// Recursion Desired.
    pub rd: bool,

    /// Truncation - this message was truncated.
    pub tc: bool,

    /// Authoritative Answer.
    pub aa: bool,

    pub opcode: Opcode,

    /// Query (0) or Response (1).
    pub qr: QR,

    pub rcode: Rcode,

    /// Checking Disabled. See RFC4035/RFC6840.
    pub cd: bool,

    /// Authentic Data. See RFC4035/RFC6840.
    pub ad: bool,

    /// Z - reserved, must be 0.
    pub z: bool,

    /// Recursion Available.
    pub ra: bool,

    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authoritys: Vec<Record>,
    pub additionals: Vec<Record>,

    pub extension: Option<Extension>,

    /// The server that answered this message, filled in by the client after
    /// a successful exchange. `None` for freshly-constructed queries.
    pub sender: Option<SocketAddr>,

    /// Optional stats about this request, populated by the DNS client.
    pub stats: Option<Stats>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Question {
    pub name: DomainName,
    pub r#type: Type,
    pub class: Class,
}

/// Resource Record (RR) returned by DNS servers in answer to a question.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub name: DomainName,
    pub class: Class,

    /// Seconds the RR may be cached before the source must be re-consulted.
    /// Signed per RFC 1035 §3.2.1, though only zero and positive values are
    /// meaningful.
    pub ttl: i32,

    pub resource: Resource,
}

impl Record {
    pub fn r#type(&self) -> Type {
        self.resource.r#type()
    }
}

/// EDNS(0) extension record, RFC 2671 / RFC 6891.
#[derive(Clone, Debug, PartialEq)]
pub struct Extension {
    pub payload_size: u16,
    pub extend_rcode: u8,
    pub version: u8,
    pub dnssec_ok: bool,
}

impl Default for Extension {
    fn default() -> Self {
        Extension {
            payload_size: 4096,
            extend_rcode: 0,
            version: 0,
            dnssec_ok: false,
        }
    }
}

/// Stats about a single query/response exchange, populated by the client.
#[derive(Clone, Debug, PartialEq)]
pub struct Stats {
    pub start: SystemTime,
    pub duration: std::time::Duration,
    pub server: SocketAddr,
    pub request_size: usize,
    pub response_size: usize,
}

pub(crate) struct StatsBuilder {
    start: SystemTime,
    timer: Instant,
    request_size: usize,
}

impl StatsBuilder {
    pub fn start(request_size: usize) -> StatsBuilder {
        StatsBuilder {
            start: SystemTime::now(),
            timer: Instant::now(),
            request_size,
        }
    }

    pub fn end(self, server: SocketAddr, response_size: usize) -> Stats {
        Stats {
            start: self.start,
            duration: self.timer.elapsed(),
            request_size: self.request_size,
            server,
            response_size,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumString, PartialEq, Eq)]
pub enum QR {
    Query = 0,
    Response = 1,
}

impl Default for QR {
    fn default() -> Self {
        QR::Query
    }
}

impl QR {
    pub fn from_bool(b: bool) -> QR {
        match b {
            false => QR::Query,
            true => QR::Response,
        }
    }

    pub fn to_bool(self) -> bool {
        matches!(self, QR::Response)
    }
}

#[derive(Copy, Clone, Debug, Display, EnumString, FromPrimitive, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
#[repr(u8)]
pub enum Opcode {
    Query = 0,
    IQuery = 1,
    Status = 2,
    Notify = 4,
    Update = 5,
    DSO = 6,
}

impl Default for Opcode {
    fn default() -> Self {
        Opcode::Query
    }
}

/// Response codes, RFC 1035 + DNS Parameters registry.
#[derive(Copy, Clone, Debug, Display, EnumString, FromPrimitive, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
#[repr(u16)]
pub enum Rcode {
    NoError = 0,
    FormErr = 1,
    ServFail = 2,
    NXDomain = 3,
    NotImp = 4,
    Refused = 5,
    YXDomain = 6,
    YXRRSet = 7,
    NXRRSet = 8,
    NotAuth = 9,
    NotZone = 10,
    DSOTYPENI = 11,
}

impl Default for Rcode {
    fn default() -> Self {
        Rcode::NoError
    }
}

/// Resource record type, e.g. A, CNAME or SOA.
#[derive(Copy, Clone, Debug, Display, EnumString, FromPrimitive, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
#[repr(u16)]
pub enum Type {
    Reserved = 0,
    A = 1,
    NS = 2,
    CNAME = 5,
    SOA = 6,
    PTR = 12,
    MX = 15,
    TXT = 16,
    AAAA = 28,
    SRV = 33,
    OPT = 41,
    ANY = 255,
}

impl Default for Type {
    fn default() -> Self {
        Type::ANY
    }
}

/// Resource record class, e.g. Internet.
#[derive(Copy, Clone, Debug, Display, EnumString, FromPrimitive, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Class {
    Reserved = 0,

    #[strum(serialize = "IN")]
    Internet = 1,

    #[strum(serialize = "CS")]
    CsNet = 2,

    #[strum(serialize = "CH")]
    Chaos = 3,

    #[strum(serialize = "HS")]
    Hesiod = 4,

    None = 254,

    #[strum(serialize = "*")]
    Any = 255,
}

impl Default for Class {
    fn default() -> Self {
        Class::Internet
    }
}

/// SOA rdata. RFC 1035 §3.3.13.
#[derive(Clone, Debug, PartialEq)]
pub struct Soa {
    pub mname: DomainName,
    pub rname: DomainName,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// MX rdata. RFC 1035 §3.3.9.
#[derive(Clone, Debug, PartialEq)]
pub struct Mx {
    pub preference: u16,
    pub exchange: DomainName,
}

/// Resource record definitions, dispatched on `Type` during parsing.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Resource {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),

    CNAME(DomainName),
    NS(DomainName),
    PTR(DomainName),

    /// One or more length-prefixed character-strings, per RFC 1035 §3.3.14;
    /// RFC 4408 (SPF) further splits long strings across multiple of these.
    TXT(Vec<Vec<u8>>),

    MX(Mx),
    SOA(Soa),

    /// A type this crate doesn't dispatch on specially. The raw rdata
    /// octets are preserved so the record can still be re-emitted.
    Unknown(Type, Vec<u8>),
}

impl Resource {
    pub fn r#type(&self) -> Type {
        match self {
            Resource::A(_) => Type::A,
            Resource::AAAA(_) => Type::AAAA,
            Resource::CNAME(_) => Type::CNAME,
            Resource::NS(_) => Type::NS,
            Resource::PTR(_) => Type::PTR,
            Resource::TXT(_) => Type::TXT,
            Resource::MX(_) => Type::MX,
            Resource::SOA(_) => Type::SOA,
            Resource::Unknown(t, _) => *t,
        }
    }
}
