//! Wire encoding/decoding of [`Message`] (§4.C).

use std::io;
use std::io::{BufRead, Cursor, Read};

use byteorder::{ReadBytesExt, BE};
use num_traits::FromPrimitive;
use rand::Rng;

use crate::bail;
use crate::dns::types::*;
use crate::io::SeekExt;
use crate::name::DomainName;

#[derive(Copy, Clone, PartialEq)]
enum RecordSection {
    Answers,
    Authorities,
    Additionals,
}

/// Holds state while a [`Message`] is being decoded from its wire form.
pub(crate) struct MessageParser<'a> {
    cur: Cursor<&'a [u8]>,
    m: Message,
}

impl<'a> MessageParser<'a> {
    fn new(buf: &'a [u8]) -> MessageParser<'a> {
        MessageParser {
            cur: Cursor::new(buf),
            m: Message::default(),
        }
    }

    fn parse(mut self) -> io::Result<Message> {
        self.m.id = self.cur.read_u16::<BE>()?;

        let b = self.cur.read_u8()?;
        self.m.qr = QR::from_bool(0b1000_0000 & b != 0);
        let opcode = (0b0111_1000 & b) >> 3;
        self.m.aa = (0b0000_0100 & b) != 0;
        self.m.tc = (0b0000_0010 & b) != 0;
        self.m.rd = (0b0000_0001 & b) != 0;

        self.m.opcode = match FromPrimitive::from_u8(opcode) {
            Some(t) => t,
            None => bail!(InvalidData, "invalid Opcode({})", opcode),
        };

        let b = self.cur.read_u8()?;
        self.m.ra = (0b1000_0000 & b) != 0;
        self.m.z = (0b0100_0000 & b) != 0;
        self.m.ad = (0b0010_0000 & b) != 0;
        self.m.cd = (0b0001_0000 & b) != 0;
        let rcode = 0b0000_1111 & b;

        self.m.rcode = match FromPrimitive::from_u16(rcode as u16) {
            Some(t) => t,
            None => bail!(InvalidData, "invalid RCode({})", rcode),
        };

        let qd_count = self.cur.read_u16::<BE>()?;
        let an_count = self.cur.read_u16::<BE>()?;
        let ns_count = self.cur.read_u16::<BE>()?;
        let ar_count = self.cur.read_u16::<BE>()?;

        self.read_questions(qd_count)?;
        self.read_records(an_count, RecordSection::Answers)?;
        self.read_records(ns_count, RecordSection::Authorities)?;
        self.read_records(ar_count, RecordSection::Additionals)?;

        if self.cur.remaining()? > 0 {
            bail!(
                Other,
                "finished parsing with {} bytes left over",
                self.cur.remaining()?
            );
        }

        Ok(self.m)
    }

    fn read_name(&mut self) -> io::Result<DomainName> {
        DomainName::parse(&mut self.cur).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read_type(&mut self) -> io::Result<Type> {
        let t = self.cur.read_u16::<BE>()?;
        FromPrimitive::from_u16(t).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("unknown Type({})", t))
        })
    }

    fn read_class(&mut self) -> io::Result<Class> {
        let c = self.cur.read_u16::<BE>()?;
        FromPrimitive::from_u16(c).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("unknown Class({})", c))
        })
    }

    fn read_questions(&mut self, count: u16) -> io::Result<()> {
        self.m.questions.reserve_exact(count.into());

        for _ in 0..count {
            let name = self.read_name()?;
            let r#type = self.read_type()?;
            let class = self.read_class()?;

            self.m.questions.push(Question {
                name,
                r#type,
                class,
            });
        }

        Ok(())
    }

    fn read_records(&mut self, count: u16, section: RecordSection) -> io::Result<()> {
        for _ in 0..count {
            let name = self.read_name()?;
            let r#type = self.read_type()?;

            if section == RecordSection::Additionals && r#type == Type::OPT {
                if self.m.extension.is_some() {
                    bail!(
                        InvalidData,
                        "multiple EDNS(0) extensions. Expected only one."
                    );
                }

                if !name.is_root() {
                    bail!(
                        InvalidData,
                        "expected root domain for EDNS(0) extension, got '{}'",
                        name
                    );
                }

                let payload_size = self.cur.read_u16::<BE>()?;
                let extend_rcode = self.cur.read_u8()?;
                let version = self.cur.read_u8()?;
                let b = self.cur.read_u8()?;
                let dnssec_ok = b & 0b1000_0000 == 0b1000_0000;
                let _z = self.cur.read_u8()?;
                let rd_len = self.cur.read_u16::<BE>()?;
                self.cur.consume(rd_len.into());

                self.m.extension = Some(Extension {
                    payload_size,
                    extend_rcode,
                    version,
                    dnssec_ok,
                });

                continue;
            }

            let class = self.read_class()?;
            let ttl = self.cur.read_i32::<BE>()?;
            let rd_len = self.cur.read_u16::<BE>()? as usize;

            let pos = self.cur.position() as usize;
            let resource = Self::parse_resource(&mut self.cur, r#type, rd_len)?;
            self.cur.set_position((pos + rd_len) as u64);

            let record = Record {
                name,
                class,
                ttl,
                resource,
            };

            match section {
                RecordSection::Answers => self.m.answers.push(record),
                RecordSection::Authorities => self.m.authoritys.push(record),
                RecordSection::Additionals => self.m.additionals.push(record),
            }
        }

        Ok(())
    }

    fn parse_resource(
        cur: &mut Cursor<&'a [u8]>,
        r#type: Type,
        rd_len: usize,
    ) -> io::Result<Resource> {
        Ok(match r#type {
            Type::A => {
                let ip = cur.read_u32::<BE>()?;
                Resource::A(std::net::Ipv4Addr::from(ip))
            }
            Type::AAAA => {
                let mut octets = [0u8; 16];
                cur.read_exact(&mut octets)?;
                Resource::AAAA(std::net::Ipv6Addr::from(octets))
            }
            Type::NS => Resource::NS(DomainName::parse(cur).map_err(to_io)?),
            Type::CNAME => Resource::CNAME(DomainName::parse(cur).map_err(to_io)?),
            Type::PTR => Resource::PTR(DomainName::parse(cur).map_err(to_io)?),
            Type::MX => {
                let preference = cur.read_u16::<BE>()?;
                let exchange = DomainName::parse(cur).map_err(to_io)?;
                Resource::MX(Mx {
                    preference,
                    exchange,
                })
            }
            Type::SOA => {
                let mname = DomainName::parse(cur).map_err(to_io)?;
                let rname = DomainName::parse(cur).map_err(to_io)?;
                let serial = cur.read_u32::<BE>()?;
                let refresh = cur.read_u32::<BE>()?;
                let retry = cur.read_u32::<BE>()?;
                let expire = cur.read_u32::<BE>()?;
                let minimum = cur.read_u32::<BE>()?;
                Resource::SOA(Soa {
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                })
            }
            Type::TXT => {
                let start = cur.position() as usize;
                let end = start + rd_len;
                let mut txts = Vec::new();
                while (cur.position() as usize) < end {
                    let len = cur.read_u8()? as usize;
                    let mut buf = vec![0u8; len];
                    cur.read_exact(&mut buf)?;
                    txts.push(buf);
                }
                Resource::TXT(txts)
            }
            other => {
                let mut buf = vec![0u8; rd_len];
                cur.read_exact(&mut buf)?;
                Resource::Unknown(other, buf)
            }
        })
    }
}

fn to_io(e: crate::name::NameError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

impl Default for Message {
    fn default() -> Self {
        Message {
            id: Message::random_id(),
            rd: true,
            tc: false,
            aa: false,
            opcode: Opcode::Query,
            qr: QR::Query,
            rcode: Rcode::NoError,
            cd: false,
            ad: true,
            z: false,
            ra: false,

            questions: Vec::default(),
            answers: Vec::default(),
            authoritys: Vec::default(),
            additionals: Vec::default(),

            extension: None,
            sender: None,
            stats: None,
        }
    }
}

impl Message {
    /// Returns a random u16 suitable for the [`Message`] id field, drawn
    /// from the thread-local CSPRNG.
    pub fn random_id() -> u16 {
        rand::thread_rng().gen()
    }

    /// Decodes the supplied buffer and returns a [`Message`].
    pub fn from_slice(buf: &[u8]) -> io::Result<Message> {
        MessageParser::new(buf).parse()
    }

    /// Adds a question to the message.
    pub fn add_question(&mut self, domain: &str, r#type: Type, class: Class) {
        let name = DomainName::try_parse(domain).expect("invalid domain name");

        let q = Question {
            name,
            r#type,
            class,
        };

        self.questions.push(q);
    }

    /// Adds an EDNS(0) extension record, RFC 6891.
    pub fn add_extension(&mut self, ext: Extension) {
        self.extension = Some(ext);
    }

    /// Encodes this DNS [`Message`] as a [`Vec<u8>`] ready to be sent, RFC 1035.
    pub fn to_vec(&self) -> io::Result<Vec<u8>> {
        let mut req = Vec::<u8>::with_capacity(512);

        req.extend_from_slice(&self.id.to_be_bytes());

        let mut b = 0_u8;
        b |= if self.qr.to_bool() { 0b1000_0000 } else { 0 };
        b |= ((self.opcode as u8) << 3) & 0b0111_1000;
        b |= if self.aa { 0b0000_0100 } else { 0 };
        b |= if self.tc { 0b0000_0010 } else { 0 };
        b |= if self.rd { 0b0000_0001 } else { 0 };
        req.push(b);

        let mut b = 0_u8;
        b |= if self.ra { 0b1000_0000 } else { 0 };
        b |= if self.z { 0b0100_0000 } else { 0 };
        b |= if self.ad { 0b0010_0000 } else { 0 };
        b |= if self.cd { 0b0001_0000 } else { 0 };
        b |= (self.rcode as u16 as u8) & 0b0000_1111;
        req.push(b);

        let ar_count = self.additionals.len() as u16 + self.extension.is_some() as u16;

        req.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        req.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        req.extend_from_slice(&(self.authoritys.len() as u16).to_be_bytes());
        req.extend_from_slice(&ar_count.to_be_bytes());

        for question in &self.questions {
            question
                .name
                .write(&mut req)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            req.extend_from_slice(&(question.r#type as u16).to_be_bytes());
            req.extend_from_slice(&(question.class as u16).to_be_bytes());
        }

        for record in self
            .answers
            .iter()
            .chain(self.authoritys.iter())
            .chain(self.additionals.iter())
        {
            record.write(&mut req)?;
        }

        if let Some(e) = &self.extension {
            e.write(&mut req)?
        }

        Ok(req)
    }
}

impl Record {
    fn write(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        self.name
            .write(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        buf.extend_from_slice(&(self.r#type() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.class as u16).to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());

        let mut rdata = Vec::new();
        match &self.resource {
            Resource::A(ip) => rdata.extend_from_slice(&ip.octets()),
            Resource::AAAA(ip) => rdata.extend_from_slice(&ip.octets()),
            Resource::NS(name) | Resource::CNAME(name) | Resource::PTR(name) => name
                .write(&mut rdata)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Resource::MX(mx) => {
                rdata.extend_from_slice(&mx.preference.to_be_bytes());
                mx.exchange
                    .write(&mut rdata)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            }
            Resource::SOA(soa) => {
                soa.mname
                    .write(&mut rdata)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                soa.rname
                    .write(&mut rdata)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                rdata.extend_from_slice(&soa.serial.to_be_bytes());
                rdata.extend_from_slice(&soa.refresh.to_be_bytes());
                rdata.extend_from_slice(&soa.retry.to_be_bytes());
                rdata.extend_from_slice(&soa.expire.to_be_bytes());
                rdata.extend_from_slice(&soa.minimum.to_be_bytes());
            }
            Resource::TXT(txts) => {
                for txt in txts {
                    rdata.push(txt.len() as u8);
                    rdata.extend_from_slice(txt);
                }
            }
            Resource::Unknown(_, raw) => rdata.extend_from_slice(raw),
        }

        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(&rdata);

        Ok(())
    }
}

impl Extension {
    pub(crate) fn write(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.push(0); // root domain
        buf.extend_from_slice(&(Type::OPT as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload_size.to_be_bytes());

        buf.push(self.extend_rcode);
        buf.push(self.version);

        let mut b = 0_u8;
        b |= if self.dnssec_ok { 0b1000_0000 } else { 0 };
        buf.push(b);
        buf.push(0);

        buf.push(0);
        buf.push(0);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_simple_query() {
        let mut m = Message::default();
        m.add_question("bramp.net", Type::A, Class::Internet);

        let wire = m.to_vec().unwrap();
        let parsed = Message::from_slice(&wire).unwrap();

        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].r#type, Type::A);
        assert_eq!(parsed.id, m.id);
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut m = Message::default();
        m.add_question("bramp.net", Type::A, Class::Internet);
        let mut wire = m.to_vec().unwrap();
        wire.push(0xFF);

        assert!(Message::from_slice(&wire).is_err());
    }
}
