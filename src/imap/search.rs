//! Composite IMAP SEARCH expression builder (§4.K, §6).

use chrono::{Datelike, NaiveDate};

/// A SEARCH key or boolean combination of keys. Conjunction is space
/// juxtaposition (`And`); disjunction is the explicit `OR a b` form.
#[derive(Clone, Debug)]
pub enum ImapSearch {
    All,
    Answered,
    Bcc,
    Before(NaiveDate),
    Body(String),
    Cc(String),
    Deleted,
    Draft,
    Flagged,
    From(String),
    Header(String, String),
    Keyword(String),
    Larger(u64),
    New,
    Not(Box<ImapSearch>),
    Old,
    On(NaiveDate),
    Or(Box<ImapSearch>, Box<ImapSearch>),
    Recent,
    Seen,
    SentBefore(NaiveDate),
    SentOn(NaiveDate),
    SentSince(NaiveDate),
    Since(NaiveDate),
    Smaller(u64),
    Subject(String),
    Text(String),
    To(String),
    Uid(String),
    Unanswered,
    Undeleted,
    Undraft,
    Unflagged,
    Unkeyword(String),
    Unseen,
    And(Vec<ImapSearch>),
}

impl ImapSearch {
    pub fn and(terms: Vec<ImapSearch>) -> ImapSearch {
        ImapSearch::And(terms)
    }

    pub fn or(a: ImapSearch, b: ImapSearch) -> ImapSearch {
        ImapSearch::Or(Box::new(a), Box::new(b))
    }

    pub fn not(inner: ImapSearch) -> ImapSearch {
        ImapSearch::Not(Box::new(inner))
    }

    /// Serialises this expression into the wire form following `SEARCH`.
    pub fn to_query(&self) -> String {
        match self {
            ImapSearch::All => "ALL".to_string(),
            ImapSearch::Answered => "ANSWERED".to_string(),
            ImapSearch::Bcc => "BCC".to_string(),
            ImapSearch::Before(d) => format!("BEFORE {}", format_date(*d)),
            ImapSearch::Body(s) => format!("BODY {}", quote(s)),
            ImapSearch::Cc(s) => format!("CC {}", quote(s)),
            ImapSearch::Deleted => "DELETED".to_string(),
            ImapSearch::Draft => "DRAFT".to_string(),
            ImapSearch::Flagged => "FLAGGED".to_string(),
            ImapSearch::From(s) => format!("FROM {}", quote(s)),
            ImapSearch::Header(field, text) => format!("HEADER {} {}", quote(field), quote(text)),
            ImapSearch::Keyword(k) => format!("KEYWORD {}", k),
            ImapSearch::Larger(n) => format!("LARGER {}", n),
            ImapSearch::New => "NEW".to_string(),
            ImapSearch::Not(inner) => format!("NOT {}", inner.to_query()),
            ImapSearch::Old => "OLD".to_string(),
            ImapSearch::On(d) => format!("ON {}", format_date(*d)),
            ImapSearch::Or(a, b) => format!("OR {} {}", a.to_query(), b.to_query()),
            ImapSearch::Recent => "RECENT".to_string(),
            ImapSearch::Seen => "SEEN".to_string(),
            ImapSearch::SentBefore(d) => format!("SENTBEFORE {}", format_date(*d)),
            ImapSearch::SentOn(d) => format!("SENTON {}", format_date(*d)),
            ImapSearch::SentSince(d) => format!("SENTSINCE {}", format_date(*d)),
            ImapSearch::Since(d) => format!("SINCE {}", format_date(*d)),
            ImapSearch::Smaller(n) => format!("SMALLER {}", n),
            ImapSearch::Subject(s) => format!("SUBJECT {}", quote(s)),
            ImapSearch::Text(s) => format!("TEXT {}", quote(s)),
            ImapSearch::To(s) => format!("TO {}", quote(s)),
            ImapSearch::Uid(range) => format!("UID {}", range),
            ImapSearch::Unanswered => "UNANSWERED".to_string(),
            ImapSearch::Undeleted => "UNDELETED".to_string(),
            ImapSearch::Undraft => "UNDRAFT".to_string(),
            ImapSearch::Unflagged => "UNFLAGGED".to_string(),
            ImapSearch::Unkeyword(k) => format!("UNKEYWORD {}", k),
            ImapSearch::Unseen => "UNSEEN".to_string(),
            ImapSearch::And(terms) => terms
                .iter()
                .map(ImapSearch::to_query)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// `d-mmm-yyyy` with an RFC 3501-correct capitalised month abbreviation
/// (e.g. `"27-Jul-2026"`). Per the REDESIGN note in `SPEC_FULL.md` §9,
/// this corrects the lowercase month the upstream this crate is modelled
/// on emits.
fn format_date(date: NaiveDate) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    format!(
        "{}-{}-{}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_rfc3501_date_with_capitalised_month() {
        let date = NaiveDate::from_ymd(2026, 7, 27);
        assert_eq!(format_date(date), "27-Jul-2026");
    }

    #[test]
    fn and_joins_with_spaces_or_uses_explicit_keyword() {
        let expr = ImapSearch::and(vec![ImapSearch::Seen, ImapSearch::Unflagged]);
        assert_eq!(expr.to_query(), "SEEN UNFLAGGED");

        let expr = ImapSearch::or(ImapSearch::Deleted, ImapSearch::Draft);
        assert_eq!(expr.to_query(), "OR DELETED DRAFT");
    }

    #[test]
    fn quotes_and_escapes_string_arguments() {
        let expr = ImapSearch::Subject("say \"hi\"".to_string());
        assert_eq!(expr.to_query(), r#"SUBJECT "say \"hi\"""#);
    }
}
