//! IMAP4rev1 client: line/literal framing over a TLS (or, for testing, a
//! plain TCP) connection (§4.K).
//!
//! New component, grounded in the teacher's line-oriented parsing idioms
//! in `from_str.rs` (regex-based structured parsing of wire text into
//! typed Rust values) and its tagged-error taxonomy in
//! `errors.rs`/`from_str.rs`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex as AsyncMutex;

use crate::imap::error::Error;
use crate::imap::search::ImapSearch;
use crate::imap::types::{ImapMailboxInfo, ImapMailboxListing};
use crate::imap::utf7;
use crate::tcp;
use crate::tls;

/// Number of retries for a `FETCH` literal read that comes back empty or
/// short (§4.K `get_message`/`get_message_header`).
const FETCH_RETRIES: u32 = 3;

/// Either side of the connection this client can run over: production
/// code always goes through TLS (the `imap` feature depends on `tls`),
/// but the protocol logic itself doesn't need encryption, so tests can
/// exercise it against a plaintext mock server via `Client::connect_plain`.
enum Connection {
    Tls(tls::TlsStream),
    Plain(tcp::Stream),
}

impl Connection {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), Error> {
        match self {
            Connection::Tls(s) => Ok(s.write_all(data).await?),
            Connection::Plain(s) => {
                s.write(data).await?;
                s.flush().await?;
                Ok(())
            }
        }
    }

    async fn read_until(&mut self, delimiter: u8) -> Result<Vec<u8>, Error> {
        match self {
            Connection::Tls(s) => Ok(s.read_until(delimiter).await?),
            Connection::Plain(s) => Ok(s.read_until(delimiter).await?),
        }
    }

    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        match self {
            Connection::Tls(s) => Ok(s.read_exact(n).await?),
            Connection::Plain(s) => Ok(s.read_exact(n).await?),
        }
    }
}

/// Monotonic two-hex-digit tag counter (§4.K: "wrap is a fatal error —
/// implementer may widen").
struct TagGenerator {
    next: AtomicU32,
}

impl TagGenerator {
    fn new() -> Self {
        TagGenerator {
            next: AtomicU32::new(0),
        }
    }

    fn next_tag(&self) -> Result<String, Error> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        if n > 0xff {
            return Err(Error::TagCounterExhausted);
        }
        Ok(format!("{:02x}", n))
    }
}

/// An IMAP4rev1 session. Commands are serialised: each `run_command`
/// call holds the connection lock for the full request/response round
/// trip.
pub struct Client {
    conn: AsyncMutex<Connection>,
    tags: TagGenerator,
    greeted: AtomicBool,
}

fn ensure_ascii(s: &str) -> Result<(), Error> {
    if s.is_ascii() {
        Ok(())
    } else {
        Err(Error::NotAscii(s.to_string()))
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn decode_line(raw: &[u8]) -> String {
    // ISO-8859-1 maps bytes directly onto the first 256 Unicode code
    // points, so this is a lossless decode of the wire line.
    let trimmed = raw.strip_suffix(b"\n").unwrap_or(raw);
    let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    trimmed.iter().map(|&b| b as char).collect()
}

fn parse_tagged(line: &str, tag: &str) -> Option<Result<String, Error>> {
    let rest = line.strip_prefix(&format!("{} ", tag))?;
    let rest = rest.trim_end();
    if let Some(msg) = rest.strip_prefix("OK") {
        Some(Ok(msg.trim_start().to_string()))
    } else {
        Some(Err(Error::CommandFailed {
            tag: tag.to_string(),
            line: rest.to_string(),
        }))
    }
}

fn parse_bracketed_number(line: &str, key: &str) -> Option<u32> {
    let marker = format!("{} ", key);
    let start = line.find(&marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find(']')?;
    rest[..end].trim().parse().ok()
}

fn parse_paren_list(line: &str) -> Vec<String> {
    match (line.find('('), line.rfind(')')) {
        (Some(start), Some(end)) if end > start => line[start + 1..end]
            .split_whitespace()
            .map(|s| s.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_literal_size(line: &str) -> Option<usize> {
    let start = line.rfind('{')? + 1;
    let end = line[start..].find('}')? + start;
    line[start..end].parse().ok()
}

lazy_static! {
    static ref LIST_RE: Regex =
        Regex::new(r#"^\* LIST \(([^)]*)\) "([^"]*)" "?([^"\r\n]*)"?$"#).unwrap();
}

fn parse_list_line(line: &str) -> Result<Option<ImapMailboxListing>, Error> {
    let caps = match LIST_RE.captures(line) {
        Some(c) => c,
        None => return Ok(None),
    };
    let flags = caps[1]
        .split_whitespace()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    let delimiter = caps[2].chars().next();
    let name = utf7::decode(&caps[3])?;
    Ok(Some(ImapMailboxListing {
        flags,
        delimiter,
        name,
    }))
}

impl Client {
    /// Connects and handshakes over TLS (the production path; `imap`
    /// always pulls in `tls`).
    pub async fn connect(
        host: &str,
        port: u16,
        tls_options: tls::TlsOptions,
        connect_timeout: Duration,
    ) -> Result<Client, Error> {
        let stream = tls::Client::connect(host, port, tls_options, connect_timeout).await?;
        Ok(Client {
            conn: AsyncMutex::new(Connection::Tls(stream)),
            tags: TagGenerator::new(),
            greeted: AtomicBool::new(false),
        })
    }

    /// Connects over plain TCP, for exercising the protocol logic
    /// against a scripted mock server that doesn't speak TLS.
    pub async fn connect_plain(
        host: &str,
        port: u16,
        options: tcp::ClientOptions,
    ) -> Result<Client, Error> {
        let tcp_client = tcp::Client::connect(host, port, options).await?;
        let stream = tcp_client.get_stream();
        Ok(Client {
            conn: AsyncMutex::new(Connection::Plain(stream)),
            tags: TagGenerator::new(),
            greeted: AtomicBool::new(false),
        })
    }

    async fn read_greeting(&self) -> Result<(), Error> {
        let mut conn = self.conn.lock().await;
        let raw = conn.read_until(b'\n').await?;
        let line = decode_line(&raw);
        if line.starts_with("* OK") || line.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(Error::BadResponse(line))
        }
    }

    async fn run_command(&self, command: &str) -> Result<(String, Vec<String>), Error> {
        let tag = self.tags.next_tag()?;
        let mut conn = self.conn.lock().await;

        let line = format!("{} {}\r\n", tag, command);
        conn.write_all(line.as_bytes()).await?;

        let mut untagged = Vec::new();
        loop {
            let raw = conn.read_until(b'\n').await?;
            let line = decode_line(&raw);
            if let Some(result) = parse_tagged(&line, &tag) {
                return result.map(|msg| (msg, untagged));
            }
            untagged.push(line);
        }
    }

    /// Reads the greeting (once, on the first call) then issues `LOGIN`,
    /// rejecting non-ASCII credentials before anything goes over the
    /// wire (§4.K).
    pub async fn login(&self, user: &str, password: &str) -> Result<(), Error> {
        if !self.greeted.swap(true, Ordering::SeqCst) {
            self.read_greeting().await?;
        }

        ensure_ascii(user)?;
        ensure_ascii(password)?;

        let command = format!("LOGIN {} {}", quote(user), quote(password));
        match self.run_command(&command).await {
            Ok(_) => Ok(()),
            Err(Error::CommandFailed { .. }) => Err(Error::BadCredentials),
            Err(e) => Err(e),
        }
    }

    pub async fn logout(&self) -> Result<(), Error> {
        self.run_command("LOGOUT").await.map(|_| ())
    }

    pub async fn list_mailboxes(&self) -> Result<Vec<ImapMailboxListing>, Error> {
        let (_, untagged) = self.run_command("LIST \"\" \"*\"").await?;
        let mut out = Vec::with_capacity(untagged.len());
        for line in untagged {
            if let Some(listing) = parse_list_line(&line)? {
                out.push(listing);
            }
        }
        Ok(out)
    }

    pub async fn select(&self, mailbox: &str) -> Result<ImapMailboxInfo, Error> {
        self.select_or_examine(mailbox, "SELECT").await
    }

    pub async fn examine(&self, mailbox: &str) -> Result<ImapMailboxInfo, Error> {
        self.select_or_examine(mailbox, "EXAMINE").await
    }

    async fn select_or_examine(&self, mailbox: &str, verb: &str) -> Result<ImapMailboxInfo, Error> {
        let encoded = utf7::encode(mailbox);
        let command = format!("{} {}", verb, quote(&encoded));
        let (_, untagged) = self.run_command(&command).await?;

        let mut info = ImapMailboxInfo {
            name: mailbox.to_string(),
            exists: 0,
            recent: 0,
            uid_validity: 0,
            uid_next: 0,
            unseen: None,
            flags: Vec::new(),
            permanent_flags: Vec::new(),
        };

        for line in &untagged {
            let rest = match line.strip_prefix("* ") {
                Some(rest) => rest,
                None => continue,
            };

            if let Some(n) = rest.strip_suffix(" EXISTS") {
                info.exists = n.trim().parse().unwrap_or(0);
            } else if let Some(n) = rest.strip_suffix(" RECENT") {
                info.recent = n.trim().parse().unwrap_or(0);
            } else if rest.starts_with("OK [UIDVALIDITY") {
                info.uid_validity = parse_bracketed_number(rest, "UIDVALIDITY").unwrap_or(0);
            } else if rest.starts_with("OK [UIDNEXT") {
                info.uid_next = parse_bracketed_number(rest, "UIDNEXT").unwrap_or(0);
            } else if rest.starts_with("OK [UNSEEN") {
                info.unseen = parse_bracketed_number(rest, "UNSEEN");
            } else if rest.starts_with("OK [PERMANENTFLAGS") {
                info.permanent_flags = parse_paren_list(rest);
            } else if rest.starts_with("FLAGS") {
                info.flags = parse_paren_list(rest);
            }
        }
        Ok(info)
    }

    pub async fn search(&self, query: &ImapSearch) -> Result<Vec<u32>, Error> {
        let command = format!("SEARCH {}", query.to_query());
        let (_, untagged) = self.run_command(&command).await?;
        let mut numbers = Vec::new();
        for line in untagged {
            if let Some(rest) = line.strip_prefix("* SEARCH") {
                numbers.extend(rest.split_whitespace().filter_map(|tok| tok.parse().ok()));
            }
        }
        Ok(numbers)
    }

    pub async fn store(&self, n: u32, flags_expr: &str) -> Result<(), Error> {
        self.run_command(&format!("STORE {} {}", n, flags_expr))
            .await
            .map(|_| ())
    }

    pub async fn expunge(&self) -> Result<(), Error> {
        self.run_command("EXPUNGE").await.map(|_| ())
    }

    pub async fn create(&self, mailbox: &str) -> Result<(), Error> {
        let encoded = utf7::encode(mailbox);
        self.run_command(&format!("CREATE {}", quote(&encoded)))
            .await
            .map(|_| ())
    }

    pub async fn get_message(&self, n: u32) -> Result<Vec<u8>, Error> {
        self.fetch_literal(n, "BODY[]").await
    }

    pub async fn get_message_header(&self, n: u32) -> Result<Vec<u8>, Error> {
        self.fetch_literal(n, "BODY[HEADER]").await
    }

    async fn fetch_literal(&self, n: u32, item: &str) -> Result<Vec<u8>, Error> {
        let mut last_err = None;
        for _ in 0..FETCH_RETRIES {
            match self.fetch_literal_once(n, item).await {
                Ok(data) if !data.is_empty() => return Ok(data),
                Ok(_) => last_err = Some(Error::BadResponse("empty FETCH literal".into())),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::BadResponse("FETCH failed".into())))
    }

    async fn fetch_literal_once(&self, n: u32, item: &str) -> Result<Vec<u8>, Error> {
        let tag = self.tags.next_tag()?;
        let mut conn = self.conn.lock().await;

        let command = format!("{} FETCH {} {}\r\n", tag, n, item);
        conn.write_all(command.as_bytes()).await?;

        // "* n FETCH (BODY[] {123}" — the literal announcement line.
        let header_raw = conn.read_until(b'\n').await?;
        let header = decode_line(&header_raw);
        let size = parse_literal_size(&header).ok_or_else(|| Error::BadResponse(header.clone()))?;

        let payload = conn.read_exact(size).await?;

        // The rest of the FETCH response line (closing paren) is
        // discarded, then drain untagged lines until tagged completion.
        let _ = conn.read_until(b'\n').await?;
        loop {
            let raw = conn.read_until(b'\n').await?;
            let line = decode_line(&raw);
            if let Some(result) = parse_tagged(&line, &tag) {
                return result.map(|_| payload);
            }
        }
    }

    /// `APPEND "mbox" (\Seen) {<len>}` followed by the literal bytes
    /// (§4.K). Waits for the server's `+` continuation before writing
    /// the literal.
    pub async fn upload_message(
        &self,
        mailbox: &str,
        flags: &str,
        message: &[u8],
    ) -> Result<(), Error> {
        let tag = self.tags.next_tag()?;
        let encoded = utf7::encode(mailbox);
        let mut conn = self.conn.lock().await;

        let command = format!(
            "{} APPEND {} ({}) {{{}}}\r\n",
            tag,
            quote(&encoded),
            flags,
            message.len()
        );
        conn.write_all(command.as_bytes()).await?;

        let cont_raw = conn.read_until(b'\n').await?;
        let cont = decode_line(&cont_raw);
        if !cont.starts_with('+') {
            return Err(Error::BadResponse(cont));
        }

        conn.write_all(message).await?;
        conn.write_all(b"\r\n").await?;

        loop {
            let raw = conn.read_until(b'\n').await?;
            let line = decode_line(&raw);
            if let Some(result) = parse_tagged(&line, &tag) {
                return result.map(|_| ());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_response_with_utf7_mailbox_name() {
        let line = r#"* LIST (\HasNoChildren) "/" "INBOX""#;
        let listing = parse_list_line(line).unwrap().unwrap();
        assert_eq!(listing.name, "INBOX");
        assert_eq!(listing.delimiter, Some('/'));
        assert_eq!(listing.flags, vec!["\\HasNoChildren".to_string()]);
    }

    #[test]
    fn parses_bracketed_numbers_and_paren_lists() {
        let line = "OK [UIDVALIDITY 999] UIDs valid";
        assert_eq!(parse_bracketed_number(line, "UIDVALIDITY"), Some(999));

        let line = "FLAGS (\\Answered \\Flagged \\Deleted)";
        assert_eq!(
            parse_paren_list(line),
            vec!["\\Answered", "\\Flagged", "\\Deleted"]
        );
    }

    #[test]
    fn parses_literal_announcement_size() {
        assert_eq!(
            parse_literal_size("* 3 FETCH (BODY[HEADER] {128}"),
            Some(128)
        );
    }

    #[test]
    fn tag_generator_zero_pads_two_hex_digits_and_rejects_wrap() {
        let tags = TagGenerator::new();
        assert_eq!(tags.next_tag().unwrap(), "00");
        assert_eq!(tags.next_tag().unwrap(), "01");

        let tags = TagGenerator {
            next: AtomicU32::new(0x100),
        };
        assert!(matches!(tags.next_tag(), Err(Error::TagCounterExhausted)));
    }
}
