//! SELECT/FETCH/LOGOUT against a scripted mock IMAP server, speaking
//! plain TCP through `Client::connect_plain` (production always dials
//! TLS; the protocol dialog itself doesn't need encryption to exercise).

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use netcore::imap::{Client, ImapMailboxInfo};
use netcore::tcp::ClientOptions;

/// Runs one scripted IMAP session: greets, accepts LOGIN, SELECT, FETCH,
/// and LOGOUT, each with a canned response.
async fn spawn_mock_server(listener: TcpListener) {
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);

        write_half
            .write_all(b"* OK IMAP4rev1 Service Ready\r\n")
            .await
            .unwrap();

        let mut line = String::new();

        // LOGIN
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let tag = line.split_whitespace().next().unwrap().to_string();
        assert!(line.contains("LOGIN"));
        write_half
            .write_all(format!("{} OK LOGIN completed\r\n", tag).as_bytes())
            .await
            .unwrap();

        // SELECT "INBOX"
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let tag = line.split_whitespace().next().unwrap().to_string();
        assert!(line.contains("SELECT"));
        write_half
            .write_all(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
            .await
            .unwrap();
        write_half.write_all(b"* 2 EXISTS\r\n").await.unwrap();
        write_half.write_all(b"* 1 RECENT\r\n").await.unwrap();
        write_half
            .write_all(b"* OK [UIDVALIDITY 999] UIDs valid\r\n")
            .await
            .unwrap();
        write_half
            .write_all(b"* OK [UIDNEXT 3] Predicted next UID\r\n")
            .await
            .unwrap();
        write_half
            .write_all(
                b"* OK [PERMANENTFLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)] \
                   Limited\r\n",
            )
            .await
            .unwrap();
        write_half
            .write_all(format!("{} OK [READ-WRITE] SELECT completed\r\n", tag).as_bytes())
            .await
            .unwrap();

        // FETCH 1 BODY[]
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let tag = line.split_whitespace().next().unwrap().to_string();
        assert!(line.contains("FETCH"));
        let body = b"Subject: hi\r\n\r\nhello world";
        write_half
            .write_all(format!("* 1 FETCH (BODY[] {{{}}}\r\n", body.len()).as_bytes())
            .await
            .unwrap();
        write_half.write_all(body).await.unwrap();
        write_half.write_all(b")\r\n").await.unwrap();
        write_half
            .write_all(format!("{} OK FETCH completed\r\n", tag).as_bytes())
            .await
            .unwrap();

        // LOGOUT
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        let tag = line.split_whitespace().next().unwrap().to_string();
        assert!(line.contains("LOGOUT"));
        write_half.write_all(b"* BYE logging out\r\n").await.unwrap();
        write_half
            .write_all(format!("{} OK LOGOUT completed\r\n", tag).as_bytes())
            .await
            .unwrap();
    });
}

#[tokio::test]
async fn login_select_fetch_logout_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    spawn_mock_server(listener).await;

    let client = Client::connect_plain(&addr.ip().to_string(), addr.port(), ClientOptions::default())
        .await
        .expect("connect_plain");

    client.login("user", "pass").await.expect("login");

    let info = client.select("INBOX").await.expect("select");
    let expected = ImapMailboxInfo {
        name: "INBOX".to_string(),
        exists: 2,
        recent: 1,
        uid_validity: 999,
        uid_next: 3,
        unseen: None,
        flags: vec![
            "\\Answered".to_string(),
            "\\Flagged".to_string(),
            "\\Deleted".to_string(),
            "\\Seen".to_string(),
            "\\Draft".to_string(),
        ],
        permanent_flags: vec![
            "\\Answered".to_string(),
            "\\Flagged".to_string(),
            "\\Deleted".to_string(),
            "\\Seen".to_string(),
            "\\Draft".to_string(),
        ],
    };
    assert_eq!(info, expected);

    // `ImapMailboxInfo::eq`/`Hash` are satisfied by a second identical
    // instance, per the field-equality contract in SPEC_FULL.md §9.
    assert_eq!(info.clone(), expected.clone());

    let body = client.get_message(1).await.expect("fetch");
    assert_eq!(body, b"Subject: hi\r\n\r\nhello world".to_vec());

    client.logout().await.expect("logout");
}
