//! Wire round-trip and `Display` coverage for `dns::Message`, exercised as
//! an external consumer of the public API would use it.

use std::net::{Ipv4Addr, Ipv6Addr};

use netcore::dns::{Class, Extension, Message, Mx, Opcode, Rcode, Record, Resource, Soa, Type, QR};
use netcore::DomainName;

#[test]
fn round_trips_a_question_only_query() {
    let mut query = Message::default();
    query.add_question("bramp.net", Type::A, Class::Internet);

    let wire = query.to_vec().expect("encode");
    assert!(wire.len() <= 512);

    let parsed = Message::from_slice(&wire).expect("decode");
    assert_eq!(parsed.id, query.id);
    assert_eq!(parsed.qr, QR::Query);
    assert_eq!(parsed.opcode, Opcode::Query);
    assert_eq!(parsed.rcode, Rcode::NoError);
    assert_eq!(parsed.questions.len(), 1);
    assert_eq!(parsed.questions[0].r#type, Type::A);
    assert_eq!(parsed.questions[0].class, Class::Internet);
    assert_eq!(
        parsed.questions[0].name,
        DomainName::try_parse("bramp.net").unwrap()
    );
}

#[test]
fn round_trips_a_response_with_every_record_kind() {
    let mut query = Message::default();
    query.add_question("example.com", Type::ANY, Class::Internet);

    let mut response = query.clone();
    response.qr = QR::Response;
    response.aa = true;
    response.rcode = Rcode::NoError;

    let name = DomainName::try_parse("example.com").unwrap();

    response.answers.push(Record {
        name: name.clone(),
        class: Class::Internet,
        ttl: 300,
        resource: Resource::A(Ipv4Addr::new(93, 184, 216, 34)),
    });
    response.answers.push(Record {
        name: name.clone(),
        class: Class::Internet,
        ttl: 300,
        resource: Resource::AAAA(Ipv6Addr::new(
            0x2606, 0x2800, 0x220, 1, 0x248, 0x1893, 0x25c8, 0x1946,
        )),
    });
    response.answers.push(Record {
        name: name.clone(),
        class: Class::Internet,
        ttl: 3600,
        resource: Resource::MX(Mx {
            preference: 10,
            exchange: DomainName::try_parse("mail.example.com").unwrap(),
        }),
    });
    response.answers.push(Record {
        name: name.clone(),
        class: Class::Internet,
        ttl: 3600,
        resource: Resource::TXT(vec![b"v=spf1 -all".to_vec()]),
    });
    response.authoritys.push(Record {
        name: name.clone(),
        class: Class::Internet,
        ttl: 86400,
        resource: Resource::SOA(Soa {
            mname: DomainName::try_parse("ns.example.com").unwrap(),
            rname: DomainName::try_parse("hostmaster.example.com").unwrap(),
            serial: 2026072701,
            refresh: 7200,
            retry: 3600,
            expire: 1209600,
            minimum: 3600,
        }),
    });

    let wire = response.to_vec().expect("encode");
    let parsed = Message::from_slice(&wire).expect("decode");

    assert_eq!(parsed.answers.len(), 4);
    assert_eq!(parsed.authoritys.len(), 1);
    assert!(matches!(parsed.answers[0].resource, Resource::A(ip) if ip == Ipv4Addr::new(93, 184, 216, 34)));
    assert!(matches!(parsed.answers[1].resource, Resource::AAAA(_)));
    assert!(matches!(&parsed.answers[2].resource, Resource::MX(mx) if mx.preference == 10));
    assert!(
        matches!(&parsed.answers[3].resource, Resource::TXT(txts) if txts[0] == b"v=spf1 -all")
    );
    assert!(
        matches!(&parsed.authoritys[0].resource, Resource::SOA(soa) if soa.serial == 2026072701)
    );
}

#[test]
fn round_trips_edns0_extension() {
    let mut query = Message::default();
    query.add_question("bramp.net", Type::A, Class::Internet);
    query.add_extension(Extension {
        payload_size: 1232,
        extend_rcode: 0,
        version: 0,
        dnssec_ok: true,
    });

    let wire = query.to_vec().expect("encode");
    let parsed = Message::from_slice(&wire).expect("decode");

    let ext = parsed.extension.expect("extension round-tripped");
    assert_eq!(ext.payload_size, 1232);
    assert!(ext.dnssec_ok);
}

#[test]
fn rejects_messages_with_trailing_bytes() {
    let mut query = Message::default();
    query.add_question("bramp.net", Type::A, Class::Internet);
    let mut wire = query.to_vec().unwrap();
    wire.push(0);

    assert!(Message::from_slice(&wire).is_err());
}

#[test]
fn multiple_questions_round_trip_independently() {
    let mut query = Message::default();
    query.add_question("www.example.com", Type::A, Class::Internet);
    query.add_question("mail.example.com", Type::A, Class::Internet);

    let wire = query.to_vec().expect("encode");
    let parsed = Message::from_slice(&wire).expect("decode");

    assert_eq!(parsed.questions.len(), 2);
    assert_eq!(
        parsed.questions[0].name,
        DomainName::try_parse("www.example.com").unwrap()
    );
    assert_eq!(
        parsed.questions[1].name,
        DomainName::try_parse("mail.example.com").unwrap()
    );
}

#[test]
fn displays_types_and_rcodes_by_their_wire_name() {
    assert_eq!(Type::AAAA.to_string(), "AAAA");
    assert_eq!(Rcode::NXDomain.to_string(), "NXDomain");
    assert_eq!(Class::Internet.to_string(), "IN");
}
