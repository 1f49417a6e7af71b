//! Resolver races against loopback mock DNS servers, so no real network
//! access or `/etc/resolv.conf` contents are required.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;

use netcore::dns::{Class, Message, Rcode, Record, Resolver, ResolverConfig, Resource, Type};

/// Spawns a UDP server on loopback that answers every question for `qname`
/// with `rcode`/`answers`, echoing the request id and question back
/// (mirroring real server behaviour, and required by `run_attempt`'s
/// echo check). Runs until the test process exits.
async fn spawn_mock_server(
    qname: &'static str,
    rcode: Rcode,
    answers: Vec<Record>,
) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind mock server");
    let addr = socket.local_addr().expect("local_addr");

    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };

            let query = match Message::from_slice(&buf[..len]) {
                Ok(m) => m,
                Err(_) => continue,
            };

            let mut response = query.clone();
            response.rcode = Rcode::NXDomain;
            if query
                .questions
                .first()
                .map(|q| q.name.to_string().trim_end_matches('.') == qname)
                .unwrap_or(false)
            {
                response.rcode = rcode;
                response.answers = answers.clone();
            }

            if let Ok(wire) = response.to_vec() {
                let _ = socket.send_to(&wire, peer).await;
            }
        }
    });

    addr
}

fn a_record(name: &str, ip: Ipv4Addr) -> Record {
    Record {
        name: netcore::DomainName::try_parse(name).unwrap(),
        class: Class::Internet,
        ttl: 300,
        resource: Resource::A(ip),
    }
}

fn aaaa_record(name: &str, ip: Ipv6Addr) -> Record {
    Record {
        name: netcore::DomainName::try_parse(name).unwrap(),
        class: Class::Internet,
        ttl: 300,
        resource: Resource::AAAA(ip),
    }
}

fn udp_only_config(servers: Vec<SocketAddr>) -> ResolverConfig {
    ResolverConfig {
        servers,
        use_udp: true,
        use_tcp: false,
        query_timeout: Duration::from_millis(500),
        ..ResolverConfig::default()
    }
}

#[tokio::test]
async fn resolve_returns_the_first_no_error_response() {
    let answer = a_record("bramp.net", Ipv4Addr::new(127, 0, 0, 1));
    let server = spawn_mock_server("bramp.net", Rcode::NoError, vec![answer]).await;

    let resolver = Resolver::new(udp_only_config(vec![server]));

    let mut query = Message::default();
    query.add_question("bramp.net", Type::A, Class::Internet);

    let response = resolver.resolve(&query).await.expect("resolve");
    assert_eq!(response.rcode, Rcode::NoError);
    assert_eq!(response.answers.len(), 1);
    assert!(matches!(response.answers[0].resource, Resource::A(ip) if ip == Ipv4Addr::new(127, 0, 0, 1)));
}

#[tokio::test]
async fn resolve_races_multiple_servers_and_prefers_no_error() {
    let dead = spawn_mock_server("bramp.net", Rcode::ServFail, vec![]).await;
    let good = spawn_mock_server(
        "bramp.net",
        Rcode::NoError,
        vec![a_record("bramp.net", Ipv4Addr::new(9, 9, 9, 9))],
    )
    .await;

    let resolver = Resolver::new(udp_only_config(vec![dead, good]));

    let mut query = Message::default();
    query.add_question("bramp.net", Type::A, Class::Internet);

    let response = resolver.resolve(&query).await.expect("resolve");
    assert_eq!(response.rcode, Rcode::NoError);
}

#[tokio::test]
async fn resolve_with_accepts_a_custom_predicate() {
    let server = spawn_mock_server("bramp.net", Rcode::NXDomain, vec![]).await;
    let resolver = Resolver::new(udp_only_config(vec![server]));

    let mut query = Message::default();
    query.add_question("bramp.net", Type::A, Class::Internet);

    let response = resolver
        .resolve_with(&query, |m| m.rcode == Rcode::NXDomain)
        .await
        .expect("resolve_with");
    assert_eq!(response.rcode, Rcode::NXDomain);
}

#[tokio::test]
async fn resolve_sequential_tries_servers_in_order_and_skips_malformed() {
    let bad = spawn_mock_server("other.invalid", Rcode::NoError, vec![]).await; // answers nothing relevant
    let good = spawn_mock_server(
        "bramp.net",
        Rcode::NoError,
        vec![a_record("bramp.net", Ipv4Addr::new(1, 2, 3, 4))],
    )
    .await;

    let resolver = Resolver::new(udp_only_config(vec![bad, good]));

    let mut query = Message::default();
    query.add_question("bramp.net", Type::A, Class::Internet);

    let response = resolver
        .resolve_sequential(&query)
        .await
        .expect("resolve_sequential");
    assert_eq!(response.rcode, Rcode::NoError);
}

#[tokio::test]
async fn resolve_fails_with_aggregated_errors_when_no_server_responds() {
    // Binding then immediately dropping the socket frees the port but
    // leaves nothing listening, so sends there time out (or are refused).
    let placeholder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = placeholder.local_addr().unwrap();
    drop(placeholder);

    let resolver = Resolver::new(udp_only_config(vec![dead_addr]));

    let mut query = Message::default();
    query.add_question("bramp.net", Type::A, Class::Internet);

    let err = resolver.resolve(&query).await.unwrap_err();
    assert!(matches!(err, netcore::dns::Error::AllServersFailed(_)));
}

#[tokio::test]
async fn lookup_host_yields_both_address_families() {
    // `spawn_mock_server` answers every query type identically, but A and
    // AAAA need different rdata, so this test runs its own server loop
    // that switches on the question type.
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            let query = match Message::from_slice(&buf[..len]) {
                Ok(m) => m,
                Err(_) => continue,
            };
            let mut response = query.clone();
            response.rcode = Rcode::NoError;
            if let Some(q) = query.questions.first() {
                response.answers = match q.r#type {
                    Type::A => vec![a_record("dual.bramp.net", Ipv4Addr::new(10, 0, 0, 1))],
                    Type::AAAA => vec![aaaa_record(
                        "dual.bramp.net",
                        Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
                    )],
                    _ => vec![],
                };
            }
            if let Ok(wire) = response.to_vec() {
                let _ = socket.send_to(&wire, peer).await;
            }
        }
    });

    let resolver = Resolver::new(udp_only_config(vec![addr]));
    let mut lookup = resolver.lookup_host("dual.bramp.net").expect("lookup_host");

    let mut found: Vec<IpAddr> = Vec::new();
    while let Some(result) = lookup.next().await {
        found.push(result.expect("address resolved"));
    }
    found.sort();

    let mut want = vec![
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
        IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
    ];
    want.sort();
    assert_eq!(found, want);
}

#[tokio::test]
async fn resolve_with_search_expands_single_label_names() {
    let server = spawn_mock_server(
        "host.bramp.net",
        Rcode::NoError,
        vec![a_record("host.bramp.net", Ipv4Addr::new(172, 16, 0, 5))],
    )
    .await;

    let mut config = udp_only_config(vec![server]);
    config.search_suffixes = vec![netcore::DomainName::try_parse("bramp.net").unwrap()];

    let resolver = Resolver::new(config);
    let response = resolver
        .resolve_with_search("host", Type::A, Class::Internet)
        .await
        .expect("resolve_with_search");

    assert_eq!(response.rcode, Rcode::NoError);
    assert_eq!(response.answers.len(), 1);
}

#[tokio::test]
async fn resolve_with_search_queries_directly_when_name_has_multiple_labels() {
    let server = spawn_mock_server(
        "host.bramp.net",
        Rcode::NoError,
        vec![a_record("host.bramp.net", Ipv4Addr::new(172, 16, 0, 5))],
    )
    .await;

    let mut config = udp_only_config(vec![server]);
    config.search_suffixes = vec![netcore::DomainName::try_parse("example.com").unwrap()];

    let resolver = Resolver::new(config);
    let response = resolver
        .resolve_with_search("host.bramp.net", Type::A, Class::Internet)
        .await
        .expect("resolve_with_search");

    assert_eq!(response.rcode, Rcode::NoError);
}
