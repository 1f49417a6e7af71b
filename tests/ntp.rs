//! Loopback SNTP client/server exchange.

use std::sync::Arc;

use netcore::ntp::{query, ClockSource, FixedClock, Mode, ReferenceId, Server};

use std::time::Duration;

fn test_clock() -> Arc<dyn ClockSource> {
    Arc::new(FixedClock {
        stratum: 1,
        poll: 4,
        precision: -20,
        root_delay: 0.0,
        root_dispersion: 0.0,
        reference_id: ReferenceId::GPS,
        reference_timestamp: netcore::ntp::NtpTimestamp::ZERO,
    })
}

#[tokio::test]
async fn client_queries_a_loopback_server_and_gets_a_server_mode_answer() {
    let mut server = Server::bind("127.0.0.1:0".parse().unwrap(), test_clock())
        .await
        .expect("bind");
    let addr = server.local_addr().expect("local_addr");

    tokio::spawn(async move {
        let _ = server.serve().await;
    });

    let answer = query(addr, Duration::from_secs(2)).await.expect("query");

    assert_eq!(answer.mode, Mode::Server);
    assert_eq!(answer.stratum, 1);
    assert_eq!(answer.packet.reference_id, ReferenceId::GPS);
}

#[tokio::test]
async fn on_answer_hook_fires_even_though_no_request_hook_is_registered() {
    let mut server = Server::bind("127.0.0.1:0".parse().unwrap(), test_clock())
        .await
        .expect("bind");
    let addr = server.local_addr().expect("local_addr");

    let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let fired_clone = fired.clone();
    server.on_answer(Arc::new(move |_packet| {
        fired_clone.store(true, std::sync::atomic::Ordering::SeqCst);
        true
    }));

    tokio::spawn(async move {
        let _ = server.serve().await;
    });

    let _ = query(addr, Duration::from_secs(2)).await.expect("query");
    assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn on_request_hook_can_drop_a_request_by_returning_false() {
    let mut server = Server::bind("127.0.0.1:0".parse().unwrap(), test_clock())
        .await
        .expect("bind");
    let addr = server.local_addr().expect("local_addr");

    server.on_request(Arc::new(|_packet| false));

    tokio::spawn(async move {
        let _ = server.serve().await;
    });

    let result = query(addr, Duration::from_millis(300)).await;
    assert!(result.is_err(), "dropped request should time out");
}
