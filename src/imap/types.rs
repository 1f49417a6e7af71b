//! Response types for the IMAP client (§4.K).

use std::hash::{Hash, Hasher};

/// The state returned by `SELECT`/`EXAMINE` (§4.K).
///
/// Equality and hashing are defined purely by field equality (no
/// reference/base-class component, since Rust has no such concept) per
/// the REDESIGN note in `SPEC_FULL.md` §9.
#[derive(Clone, Debug)]
pub struct ImapMailboxInfo {
    pub name: String,
    pub exists: u32,
    pub recent: u32,
    pub uid_validity: u32,
    pub uid_next: u32,
    pub unseen: Option<u32>,
    pub flags: Vec<String>,
    pub permanent_flags: Vec<String>,
}

impl PartialEq for ImapMailboxInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.exists == other.exists
            && self.recent == other.recent
            && self.uid_validity == other.uid_validity
            && self.uid_next == other.uid_next
            && self.unseen == other.unseen
            && self.flags == other.flags
            && self.permanent_flags == other.permanent_flags
    }
}

impl Eq for ImapMailboxInfo {}

impl Hash for ImapMailboxInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.exists.hash(state);
        self.recent.hash(state);
        self.uid_validity.hash(state);
        self.uid_next.hash(state);
        self.unseen.hash(state);
        self.flags.hash(state);
        self.permanent_flags.hash(state);
    }
}

/// One entry in a `LIST` response.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImapMailboxListing {
    pub flags: Vec<String>,
    pub delimiter: Option<char>,
    pub name: String,
}
